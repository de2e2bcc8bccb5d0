//! Checkout flow around the settlement calculator.
//!
//! `Checkout` turns a settlement into user-facing errors, talks to the
//! payment processor, and moves booking records through their lifecycle.
//! Credits are held as soon as a booking is recorded and come back if it is
//! cancelled or expires. Single-use coupons are redeemed only when a booking
//! reaches Paid.

pub mod payment;
pub mod poll;

pub use payment::{
    OfflinePixProcessor, PaymentInit, PaymentProcessor, PaymentRequest, PaymentStatus,
    PaymentStatusSource,
};
pub use poll::{poll_payment, PollOutcome, PollPolicy};

use crate::error::{Error, Result};
use crate::logger::Logger;
use crate::money::Money;
use crate::pricing::{
    settle, CouponCatalog, CouponOutcome, SettlementRequest, SettlementResult, UsagePolicy,
};
use crate::state::{
    Booking, BookingKind, BookingRecords, BookingStatus, CheckoutHook, CouponUsage, CreditLedger,
    Ledger, NoOpHook,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Smallest PIX charge the processor accepts, in centavos.
pub const PIX_MINIMUM_CHARGE: Money = Money::from_cents(100);

/// A checkout submission as received from the booking form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub booking_id: String,
    pub customer_id: String,
    /// Room the booking (or the purchased credits) belongs to
    pub context: String,
    pub kind: BookingKind,
    pub gross_amount: Money,
    /// Whatever the form sent; may be blank or irrelevant.
    pub coupon_code: Option<String>,
}

impl CheckoutRequest {
    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("booking id", &self.booking_id),
            ("customer id", &self.customer_id),
            ("context", &self.context),
        ] {
            if value.trim().is_empty() {
                return Err(Error::InvalidRequest(format!("{} must not be empty", name)));
            }
        }
        if self.gross_amount.is_zero() {
            return Err(Error::InvalidRequest(
                "Gross amount must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CheckoutOutcome {
    /// Nothing left to charge, or the processor confirmed synchronously.
    Paid { booking: Booking },
    /// Customer must complete payment at `payment_url`.
    AwaitingPayment { booking: Booking, payment_url: String },
}

impl CheckoutOutcome {
    pub fn booking(&self) -> &Booking {
        match self {
            CheckoutOutcome::Paid { booking } => booking,
            CheckoutOutcome::AwaitingPayment { booking, .. } => booking,
        }
    }
}

pub struct Checkout<'a, P: PaymentProcessor, H: CheckoutHook = NoOpHook> {
    catalog: &'a CouponCatalog,
    minimum_charge: Money,
    processor: P,
    hook: H,
}

impl<'a, P: PaymentProcessor> Checkout<'a, P, NoOpHook> {
    pub fn new(catalog: &'a CouponCatalog, minimum_charge: Money, processor: P) -> Self {
        Checkout {
            catalog,
            minimum_charge,
            processor,
            hook: NoOpHook,
        }
    }
}

impl<'a, P: PaymentProcessor, H: CheckoutHook> Checkout<'a, P, H> {
    pub fn with_hook<H2: CheckoutHook>(self, hook: H2) -> Checkout<'a, P, H2> {
        Checkout {
            catalog: self.catalog,
            minimum_charge: self.minimum_charge,
            processor: self.processor,
            hook,
        }
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    pub fn processor_mut(&mut self) -> &mut P {
        &mut self.processor
    }

    pub fn hook(&self) -> &H {
        &self.hook
    }

    /// Settle the request against the customer's credits and surface the
    /// checkout errors. With credits covering everything the coupon is never
    /// looked up, so none of the coupon errors can fire.
    pub fn quote<L>(&self, ledger: &L, request: &CheckoutRequest) -> Result<SettlementResult>
    where
        L: CreditLedger + CouponUsage + ?Sized,
    {
        request.validate()?;

        let available_credits = match request.kind {
            BookingKind::RoomBooking => {
                ledger.available_credits(&request.customer_id, &request.context)
            }
            BookingKind::CreditPurchase => Money::ZERO,
        };
        let settlement = settle(
            self.catalog,
            &SettlementRequest {
                gross_amount: request.gross_amount,
                available_credits,
                coupon_code: request.coupon_code.clone(),
            },
        );

        match &settlement.coupon {
            CouponOutcome::Invalid { code } => {
                return Err(Error::CouponInvalid(code.clone()));
            }
            CouponOutcome::Applied {
                code,
                policy: UsagePolicy::SingleUsePerCustomer,
                ..
            } if ledger.has_used(&request.customer_id, code) => {
                return Err(Error::CouponAlreadyUsed {
                    customer: request.customer_id.clone(),
                    code: code.clone(),
                });
            }
            CouponOutcome::CoveredByCredits => {
                Logger::debug(&format!(
                    "booking {}: credits cover {}, coupon ignored",
                    request.booking_id, settlement.gross_amount
                ));
            }
            _ => {}
        }

        if !settlement.amount_to_pay.is_zero() && settlement.amount_to_pay < self.minimum_charge {
            return Err(Error::AmountBelowMinimum {
                amount: settlement.amount_to_pay,
                minimum: self.minimum_charge,
            });
        }

        Ok(settlement)
    }

    /// Quote, record the booking, and start payment if anything is owed.
    pub fn submit<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        request: &CheckoutRequest,
        now: u64,
    ) -> Result<CheckoutOutcome> {
        if ledger.booking(&request.booking_id).is_some() {
            return Err(Error::InvalidRequest(format!(
                "Booking {} already exists",
                request.booking_id
            )));
        }

        let settlement = self.quote(ledger, request)?;
        let mut booking = Booking::pending(
            request.booking_id.clone(),
            request.customer_id.clone(),
            request.context.clone(),
            request.kind,
            &settlement,
            now,
        );

        if settlement.amount_to_pay.is_zero() {
            hold_credits(ledger, &booking)?;
            self.settle_booking(ledger, &mut booking, now)?;
            ledger.insert_booking(booking.clone())?;
            self.hook.on_booking_paid(&booking)?;
            return Ok(CheckoutOutcome::Paid { booking });
        }

        self.hook.before_charge(&booking, settlement.amount_to_pay)?;
        let init = self.processor.create_payment(&PaymentRequest {
            booking_id: booking.id.clone(),
            customer_id: booking.customer_id.clone(),
            amount: settlement.amount_to_pay,
            description: describe(&booking),
        })?;

        // Credits are held from here on, so a concurrent booking cannot
        // spend them while this one waits for payment.
        hold_credits(ledger, &booking)?;

        match init {
            PaymentInit::Pending {
                reference,
                payment_url,
            } => {
                booking.payment_reference = Some(reference);
                booking.payment_url = Some(payment_url.clone());
                ledger.insert_booking(booking.clone())?;
                Logger::info(&format!(
                    "booking {} awaiting payment of {}",
                    booking.id, booking.amount_to_pay
                ));
                Ok(CheckoutOutcome::AwaitingPayment {
                    booking,
                    payment_url,
                })
            }
            PaymentInit::Confirmed { reference } => {
                booking.payment_reference = Some(reference);
                self.settle_booking(ledger, &mut booking, now)?;
                ledger.insert_booking(booking.clone())?;
                self.hook.on_booking_paid(&booking)?;
                Ok(CheckoutOutcome::Paid { booking })
            }
        }
    }

    /// Payment confirmed by the processor: redeem the coupon, grant
    /// purchased credits, mark Paid. Credits were already held at submit.
    pub fn confirm<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        booking_id: &str,
        now: u64,
    ) -> Result<Booking> {
        let mut booking = pending_booking(ledger, booking_id, BookingStatus::Paid)?;
        self.settle_booking(ledger, &mut booking, now)?;
        ledger.update_booking(booking.clone())?;
        self.hook.on_booking_paid(&booking)?;
        Ok(booking)
    }

    /// Close an unpaid booking. Credits held at submit come back as a new
    /// lot; the coupon was never redeemed.
    pub fn cancel<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        booking_id: &str,
        expired: bool,
        now: u64,
    ) -> Result<Booking> {
        let next = if expired {
            BookingStatus::Expired
        } else {
            BookingStatus::Cancelled
        };
        let mut booking = pending_booking(ledger, booking_id, next)?;
        booking.transition(next, now)?;
        if !booking.credits_used.is_zero() {
            ledger.grant_credits(
                &booking.customer_id,
                &booking.context,
                booking.credits_used,
                now,
            );
        }
        ledger.update_booking(booking.clone())?;
        self.hook.on_booking_closed(&booking)?;
        Ok(booking)
    }

    /// Reverse a paid booking. Credits spent on a room booking come back as
    /// a new lot; credits bought by a purchase are withdrawn. Coupon
    /// redemptions stay recorded.
    pub fn refund<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        booking_id: &str,
        now: u64,
    ) -> Result<Booking> {
        let mut booking = ledger
            .booking(booking_id)
            .cloned()
            .ok_or_else(|| Error::BookingNotFound(booking_id.to_string()))?;
        if !booking.status.can_transition_to(BookingStatus::Refunded) {
            return Err(Error::InvalidTransition(format!(
                "booking {} is {:?}, only paid bookings can be refunded",
                booking.id, booking.status
            )));
        }

        match booking.kind {
            BookingKind::RoomBooking => {
                ledger.grant_credits(
                    &booking.customer_id,
                    &booking.context,
                    booking.credits_used,
                    now,
                );
            }
            BookingKind::CreditPurchase => {
                if let Some(lot_id) = booking.granted_lot {
                    ledger.revoke_credits(&booking.customer_id, lot_id, booking.gross_amount)?;
                }
            }
        }

        booking.transition(BookingStatus::Refunded, now)?;
        ledger.update_booking(booking.clone())?;
        if !booking.amount_to_pay.is_zero() {
            Logger::info(&format!(
                "booking {} refunded; {} must be returned through the processor",
                booking.id, booking.amount_to_pay
            ));
        }
        self.hook.on_booking_closed(&booking)?;
        Ok(booking)
    }

    /// Read the processor status once and apply it.
    pub fn sync_payment<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        booking_id: &str,
        now: u64,
    ) -> Result<Booking> {
        let booking = ledger
            .booking(booking_id)
            .cloned()
            .ok_or_else(|| Error::BookingNotFound(booking_id.to_string()))?;
        if !booking.is_pending() {
            return Ok(booking);
        }
        let reference = payment_reference(&booking)?;

        match self.processor.payment_status(&reference)? {
            PaymentStatus::Pending => Ok(booking),
            PaymentStatus::Paid => self.confirm(ledger, booking_id, now),
            PaymentStatus::Expired => self.cancel(ledger, booking_id, true, now),
            PaymentStatus::Failed => self.cancel(ledger, booking_id, false, now),
        }
    }

    /// Poll the processor until the payment settles or the hard timeout
    /// passes, then apply the final status. A timed-out booking stays
    /// pending.
    pub fn await_payment<L, F>(
        &mut self,
        ledger: &mut L,
        booking_id: &str,
        policy: &PollPolicy,
        sleep: F,
        now: u64,
    ) -> Result<Booking>
    where
        L: Ledger + ?Sized,
        F: FnMut(Duration),
    {
        let booking = ledger
            .booking(booking_id)
            .cloned()
            .ok_or_else(|| Error::BookingNotFound(booking_id.to_string()))?;
        if !booking.is_pending() {
            return Ok(booking);
        }
        let reference = payment_reference(&booking)?;

        match poll_payment(&self.processor, &reference, policy, sleep)? {
            PollOutcome::Settled { .. } => self.sync_payment(ledger, booking_id, now),
            PollOutcome::TimedOut { attempts } => {
                Logger::warn(&format!(
                    "booking {} still pending after {} status reads",
                    booking_id, attempts
                ));
                Ok(booking)
            }
        }
    }

    /// Apply the effects of payment to `booking` and mark it Paid.
    fn settle_booking<L: Ledger + ?Sized>(
        &mut self,
        ledger: &mut L,
        booking: &mut Booking,
        now: u64,
    ) -> Result<()> {
        if booking.coupon_single_use {
            if let Some(code) = booking.coupon_code.as_deref() {
                match ledger.mark_used(&booking.customer_id, code) {
                    Ok(()) => {}
                    // Payment is already captured; keep the booking paid.
                    Err(Error::CouponAlreadyUsed { .. }) => Logger::warn(&format!(
                        "coupon {} redeemed twice by {} (booking {})",
                        code, booking.customer_id, booking.id
                    )),
                    Err(e) => return Err(e),
                }
            }
        }

        if booking.kind == BookingKind::CreditPurchase {
            booking.granted_lot = ledger.grant_credits(
                &booking.customer_id,
                &booking.context,
                booking.gross_amount,
                now,
            );
        }

        booking.transition(BookingStatus::Paid, now)
    }
}

fn hold_credits<L: Ledger + ?Sized>(ledger: &mut L, booking: &Booking) -> Result<()> {
    if booking.credits_used.is_zero() {
        return Ok(());
    }
    ledger.consume_credits(&booking.customer_id, &booking.context, booking.credits_used)?;
    Ok(())
}

fn pending_booking<L: Ledger + ?Sized>(
    ledger: &L,
    booking_id: &str,
    next: BookingStatus,
) -> Result<Booking> {
    let booking = ledger
        .booking(booking_id)
        .cloned()
        .ok_or_else(|| Error::BookingNotFound(booking_id.to_string()))?;
    if !booking.status.can_transition_to(next) {
        return Err(Error::InvalidTransition(format!(
            "booking {} is {:?}, cannot move to {:?}",
            booking.id, booking.status, next
        )));
    }
    Ok(booking)
}

fn payment_reference(booking: &Booking) -> Result<String> {
    booking.payment_reference.clone().ok_or_else(|| {
        Error::StateError(format!("Booking {} has no payment reference", booking.id))
    })
}

fn describe(booking: &Booking) -> String {
    match booking.kind {
        BookingKind::RoomBooking => format!("Reserva {} ({})", booking.id, booking.context),
        BookingKind::CreditPurchase => format!("Créditos {} ({})", booking.id, booking.context),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::LedgerState;

    fn cents(v: u64) -> Money {
        Money::from_cents(v)
    }

    fn request(id: &str, gross: u64, coupon: Option<&str>) -> CheckoutRequest {
        CheckoutRequest {
            booking_id: id.to_string(),
            customer_id: "ana".to_string(),
            context: "sala-1".to_string(),
            kind: BookingKind::RoomBooking,
            gross_amount: cents(gross),
            coupon_code: coupon.map(str::to_string),
        }
    }

    fn checkout(catalog: &CouponCatalog) -> Checkout<'_, OfflinePixProcessor> {
        Checkout::new(
            catalog,
            PIX_MINIMUM_CHARGE,
            OfflinePixProcessor::new("http://localhost/pix"),
        )
    }

    /// Records which hook stages fired.
    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl CheckoutHook for Recorder {
        fn before_charge(&mut self, booking: &Booking, amount: Money) -> Result<()> {
            self.events.push(format!("charge:{}:{}", booking.id, amount.cents()));
            Ok(())
        }

        fn on_booking_paid(&mut self, booking: &Booking) -> Result<()> {
            self.events.push(format!("paid:{}", booking.id));
            Ok(())
        }

        fn on_booking_closed(&mut self, booking: &Booking) -> Result<()> {
            self.events.push(format!("closed:{}", booking.id));
            Ok(())
        }
    }

    #[test]
    fn test_quote_full_credit_coverage_ignores_any_coupon() {
        let catalog = CouponCatalog::standard();
        let co = checkout(&catalog);
        let mut ledger = LedgerState::new();
        ledger.grant_credits("ana", "sala-1", cents(15_000), 1);
        ledger.mark_used("ana", "PRIMEIRACOMPRA").unwrap();

        for code in ["ARTHEMI10", "TESTE50", "garbage", "PRIMEIRACOMPRA"] {
            let r = co.quote(&ledger, &request("b-1", 10_000, Some(code))).unwrap();
            assert_eq!(r.amount_to_pay, Money::ZERO);
            assert_eq!(r.coupon, CouponOutcome::CoveredByCredits);
        }
    }

    #[test]
    fn test_quote_invalid_coupon() {
        let catalog = CouponCatalog::standard();
        let co = checkout(&catalog);
        let ledger = LedgerState::new();
        let err = co.quote(&ledger, &request("b-1", 10_000, Some("teste50"))).unwrap_err();
        assert_eq!(err, Error::CouponInvalid("TESTE50".to_string()));
        assert!(err.is_user_recoverable());
    }

    #[test]
    fn test_quote_coupon_already_used() {
        let catalog = CouponCatalog::standard();
        let co = checkout(&catalog);
        let mut ledger = LedgerState::new();
        ledger.mark_used("ana", "PRIMEIRACOMPRA").unwrap();
        let err = co
            .quote(&ledger, &request("b-1", 10_000, Some("primeiracompra")))
            .unwrap_err();
        assert!(matches!(err, Error::CouponAlreadyUsed { .. }));

        // Unlimited coupons are never checked for prior use
        assert!(co.quote(&ledger, &request("b-1", 10_000, Some("ARTHEMI10"))).is_ok());
    }

    #[test]
    fn test_quote_below_minimum() {
        let catalog = CouponCatalog::standard();
        let co = checkout(&catalog);
        let mut ledger = LedgerState::new();
        ledger.grant_credits("ana", "sala-1", cents(9_950), 1);
        let err = co.quote(&ledger, &request("b-1", 10_000, None)).unwrap_err();
        assert_eq!(
            err,
            Error::AmountBelowMinimum {
                amount: cents(50),
                minimum: PIX_MINIMUM_CHARGE
            }
        );
    }

    #[test]
    fn test_quote_exactly_minimum_is_accepted() {
        let catalog = CouponCatalog::standard();
        let co = checkout(&catalog);
        let ledger = LedgerState::new();
        let r = co.quote(&ledger, &request("b-1", 100, None)).unwrap();
        assert_eq!(r.amount_to_pay, cents(100));
    }

    #[test]
    fn test_quote_rejects_empty_fields() {
        let catalog = CouponCatalog::standard();
        let co = checkout(&catalog);
        let ledger = LedgerState::new();
        let mut req = request("b-1", 100, None);
        req.customer_id = " ".to_string();
        assert!(matches!(co.quote(&ledger, &req), Err(Error::InvalidRequest(_))));
        assert!(matches!(
            co.quote(&ledger, &request("b-1", 0, None)),
            Err(Error::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_credit_purchase_ignores_existing_credits() {
        let catalog = CouponCatalog::standard();
        let co = checkout(&catalog);
        let mut ledger = LedgerState::new();
        ledger.grant_credits("ana", "sala-1", cents(50_000), 1);
        let mut req = request("c-1", 20_000, Some("ARTHEMI10"));
        req.kind = BookingKind::CreditPurchase;
        let r = co.quote(&ledger, &req).unwrap();
        assert_eq!(r.credits_used, Money::ZERO);
        assert_eq!(r.amount_to_pay, cents(18_000));
    }

    #[test]
    fn test_submit_fully_covered_is_paid_immediately() {
        let catalog = CouponCatalog::standard();
        let mut co = checkout(&catalog).with_hook(Recorder::default());
        let mut ledger = LedgerState::new();
        ledger.grant_credits("ana", "sala-1", cents(15_000), 1);

        let outcome = co
            .submit(&mut ledger, &request("b-1", 10_000, Some("PRIMEIRACOMPRA")), 50)
            .unwrap();
        let CheckoutOutcome::Paid { booking } = outcome else {
            panic!("expected paid outcome");
        };
        assert_eq!(booking.status, BookingStatus::Paid);
        assert_eq!(booking.coupon_code, None);
        assert_eq!(ledger.available_credits("ana", "sala-1"), cents(5_000));
        assert!(!ledger.has_used("ana", "PRIMEIRACOMPRA"));
        assert_eq!(co.hook().events, vec!["paid:b-1".to_string()]);
    }

    #[test]
    fn test_submit_then_confirm_redeems_single_use_coupon() {
        let catalog = CouponCatalog::standard();
        let mut co = checkout(&catalog).with_hook(Recorder::default());
        let mut ledger = LedgerState::new();
        ledger.grant_credits("ana", "sala-1", cents(5_000), 1);

        let outcome = co
            .submit(&mut ledger, &request("b-1", 10_000, Some("primeiracompra")), 50)
            .unwrap();
        let CheckoutOutcome::AwaitingPayment { booking, payment_url } = outcome else {
            panic!("expected awaiting payment");
        };
        assert!(payment_url.starts_with("http://localhost/pix/pix_"));
        assert_eq!(booking.amount_to_pay, cents(4_250));

        // Credits are held right away; the coupon waits for payment
        assert_eq!(ledger.available_credits("ana", "sala-1"), Money::ZERO);
        assert!(!ledger.has_used("ana", "PRIMEIRACOMPRA"));

        let paid = co.confirm(&mut ledger, "b-1", 60).unwrap();
        assert_eq!(paid.status, BookingStatus::Paid);
        assert_eq!(ledger.available_credits("ana", "sala-1"), Money::ZERO);
        assert!(ledger.has_used("ana", "PRIMEIRACOMPRA"));
        assert_eq!(
            co.hook().events,
            vec!["charge:b-1:4250".to_string(), "paid:b-1".to_string()]
        );

        // A second confirmation is an invalid transition
        assert!(matches!(
            co.confirm(&mut ledger, "b-1", 70),
            Err(Error::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_submit_duplicate_booking_id() {
        let catalog = CouponCatalog::standard();
        let mut co = checkout(&catalog);
        let mut ledger = LedgerState::new();
        co.submit(&mut ledger, &request("b-1", 10_000, None), 1).unwrap();
        let err = co.submit(&mut ledger, &request("b-1", 10_000, None), 2).unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn test_cancel_pending_booking() {
        let catalog = CouponCatalog::standard();
        let mut co = checkout(&catalog).with_hook(Recorder::default());
        let mut ledger = LedgerState::new();
        co.submit(&mut ledger, &request("b-1", 10_000, None), 1).unwrap();

        let cancelled = co.cancel(&mut ledger, "b-1", false, 2).unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert!(co.confirm(&mut ledger, "b-1", 3).is_err());
        assert!(co.cancel(&mut ledger, "missing", true, 3).is_err());
    }

    #[test]
    fn test_cancel_returns_held_credits() {
        let catalog = CouponCatalog::standard();
        let mut co = checkout(&catalog);
        let mut ledger = LedgerState::new();
        ledger.grant_credits("ana", "sala-1", cents(3_000), 1);
        co.submit(&mut ledger, &request("b-1", 10_000, None), 2).unwrap();
        assert_eq!(ledger.available_credits("ana", "sala-1"), Money::ZERO);

        let expired = co.cancel(&mut ledger, "b-1", true, 3).unwrap();
        assert_eq!(expired.status, BookingStatus::Expired);
        assert_eq!(ledger.available_credits("ana", "sala-1"), cents(3_000));
    }

    #[test]
    fn test_pending_booking_keeps_its_credits_from_a_second_booking() {
        let catalog = CouponCatalog::standard();
        let mut co = checkout(&catalog);
        let mut ledger = LedgerState::new();
        ledger.grant_credits("ana", "sala-1", cents(5_000), 1);

        let first = co.submit(&mut ledger, &request("b-1", 10_000, None), 2).unwrap();
        assert_eq!(first.booking().credits_used, cents(5_000));
        let reference = first.booking().payment_reference.clone().unwrap();

        // The second booking sees no credits and must pay in cash
        let second = co.submit(&mut ledger, &request("b-2", 5_000, None), 3).unwrap();
        assert_eq!(second.booking().credits_used, Money::ZERO);
        assert_eq!(second.booking().status, BookingStatus::PendingPayment);

        co.processor_mut()
            .set_status(&reference, PaymentStatus::Paid)
            .unwrap();
        let paid = co.sync_payment(&mut ledger, "b-1", 4).unwrap();
        assert_eq!(paid.status, BookingStatus::Paid);
        assert_eq!(
            ledger.booking("b-1").map(|b| b.status),
            Some(BookingStatus::Paid)
        );
        assert_eq!(ledger.available_credits("ana", "sala-1"), Money::ZERO);
    }

    #[test]
    fn test_refund_room_booking_returns_credits() {
        let catalog = CouponCatalog::standard();
        let mut co = checkout(&catalog);
        let mut ledger = LedgerState::new();
        ledger.grant_credits("ana", "sala-1", cents(3_000), 1);
        co.submit(&mut ledger, &request("b-1", 10_000, None), 2).unwrap();
        co.confirm(&mut ledger, "b-1", 3).unwrap();
        assert_eq!(ledger.available_credits("ana", "sala-1"), Money::ZERO);

        let refunded = co.refund(&mut ledger, "b-1", 4).unwrap();
        assert_eq!(refunded.status, BookingStatus::Refunded);
        assert_eq!(ledger.available_credits("ana", "sala-1"), cents(3_000));
        assert!(co.refund(&mut ledger, "b-1", 5).is_err());
    }

    #[test]
    fn test_credit_purchase_grants_and_refund_revokes() {
        let catalog = CouponCatalog::standard();
        let mut co = checkout(&catalog);
        let mut ledger = LedgerState::new();
        let mut req = request("c-1", 20_000, None);
        req.kind = BookingKind::CreditPurchase;

        co.submit(&mut ledger, &req, 1).unwrap();
        let paid = co.confirm(&mut ledger, "c-1", 2).unwrap();
        assert!(paid.granted_lot.is_some());
        assert_eq!(ledger.available_credits("ana", "sala-1"), cents(20_000));

        co.refund(&mut ledger, "c-1", 3).unwrap();
        assert_eq!(ledger.available_credits("ana", "sala-1"), Money::ZERO);
    }

    #[test]
    fn test_refund_spent_credit_purchase_fails() {
        let catalog = CouponCatalog::standard();
        let mut co = checkout(&catalog);
        let mut ledger = LedgerState::new();
        let mut req = request("c-1", 20_000, None);
        req.kind = BookingKind::CreditPurchase;
        co.submit(&mut ledger, &req, 1).unwrap();
        co.confirm(&mut ledger, "c-1", 2).unwrap();
        co.submit(&mut ledger, &request("b-1", 5_000, None), 3).unwrap();

        assert!(co.refund(&mut ledger, "c-1", 4).is_err());
        assert_eq!(
            ledger.booking("c-1").map(|b| b.status),
            Some(BookingStatus::Paid)
        );
    }

    #[test]
    fn test_sync_payment_follows_processor() {
        let catalog = CouponCatalog::standard();
        let mut co = checkout(&catalog);
        let mut ledger = LedgerState::new();
        let outcome = co.submit(&mut ledger, &request("b-1", 10_000, None), 1).unwrap();
        let reference = outcome.booking().payment_reference.clone().unwrap();

        let still = co.sync_payment(&mut ledger, "b-1", 2).unwrap();
        assert_eq!(still.status, BookingStatus::PendingPayment);

        co.processor_mut()
            .set_status(&reference, PaymentStatus::Expired)
            .unwrap();
        let expired = co.sync_payment(&mut ledger, "b-1", 3).unwrap();
        assert_eq!(expired.status, BookingStatus::Expired);
    }

    #[test]
    fn test_await_payment_confirms_when_paid() {
        let catalog = CouponCatalog::standard();
        let mut co = checkout(&catalog);
        let mut ledger = LedgerState::new();
        let outcome = co.submit(&mut ledger, &request("b-1", 10_000, None), 1).unwrap();
        let reference = outcome.booking().payment_reference.clone().unwrap();
        co.processor_mut()
            .set_status(&reference, PaymentStatus::Paid)
            .unwrap();

        let policy = PollPolicy::new(
            Duration::from_millis(1),
            Duration::from_millis(2),
            Duration::from_millis(3),
        );
        let booking = co.await_payment(&mut ledger, "b-1", &policy, |_| {}, 5).unwrap();
        assert_eq!(booking.status, BookingStatus::Paid);
    }

    #[test]
    fn test_await_payment_timeout_keeps_pending() {
        let catalog = CouponCatalog::standard();
        let mut co = checkout(&catalog);
        let mut ledger = LedgerState::new();
        co.submit(&mut ledger, &request("b-1", 10_000, None), 1).unwrap();

        let policy = PollPolicy::new(
            Duration::from_millis(1),
            Duration::from_millis(2),
            Duration::from_millis(3),
        );
        let booking = co.await_payment(&mut ledger, "b-1", &policy, |_| {}, 5).unwrap();
        assert_eq!(booking.status, BookingStatus::PendingPayment);
    }
}
