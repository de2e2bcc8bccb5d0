//! Hook: injectable observer for checkout lifecycle stages.
//!
//! This is where customer notifications (confirmation and cancellation
//! emails) attach; the checkout flow itself never sends anything.

use crate::error::Result;
use crate::logger::Logger;
use crate::money::Money;
use crate::state::Booking;

/// Trait-based hook called by `Checkout` at each stage.
///
/// Pre-hooks can block (return Err before the processor is contacted).
/// Post-hooks are for recording and notification.
pub trait CheckoutHook {
    /// Called before a payment is created with the processor. Return Err to block.
    fn before_charge(&mut self, _booking: &Booking, _amount: Money) -> Result<()> {
        Ok(())
    }

    /// Called after a booking reaches Paid.
    fn on_booking_paid(&mut self, _booking: &Booking) -> Result<()> {
        Ok(())
    }

    /// Called after a booking is cancelled, expired or refunded.
    fn on_booking_closed(&mut self, _booking: &Booking) -> Result<()> {
        Ok(())
    }
}

/// No-op hook: default.
#[derive(Debug, Clone, Default)]
pub struct NoOpHook;

impl CheckoutHook for NoOpHook {}

/// Writes a log line per stage; used by the CLI.
#[derive(Debug, Clone, Default)]
pub struct LoggingHook;

impl CheckoutHook for LoggingHook {
    fn before_charge(&mut self, booking: &Booking, amount: Money) -> Result<()> {
        Logger::debug(&format!(
            "charging {} for booking {} (customer {})",
            amount, booking.id, booking.customer_id
        ));
        Ok(())
    }

    fn on_booking_paid(&mut self, booking: &Booking) -> Result<()> {
        Logger::info(&format!(
            "booking {} paid: gross {}, discount {}, credits {}, charged {}",
            booking.id,
            booking.gross_amount,
            booking.discount_amount,
            booking.credits_used,
            booking.amount_to_pay
        ));
        Ok(())
    }

    fn on_booking_closed(&mut self, booking: &Booking) -> Result<()> {
        Logger::info(&format!("booking {} closed as {:?}", booking.id, booking.status));
        Ok(())
    }
}
