pub mod account;
pub mod booking;
pub mod hook;

pub use account::{CreditDraw, CreditLot, CustomerAccount};
pub use booking::{Booking, BookingKind, BookingStatus};
pub use hook::{CheckoutHook, LoggingHook, NoOpHook};

use crate::error::{Error, Result};
use crate::money::Money;
use crate::pricing::normalize_code;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Source of a customer's pre-purchased credits.
pub trait CreditLedger {
    fn available_credits(&self, customer_id: &str, context: &str) -> Money;

    /// Consume credits oldest-first. Fails without side effects when the
    /// balance is short.
    fn consume_credits(
        &mut self,
        customer_id: &str,
        context: &str,
        amount: Money,
    ) -> Result<Vec<CreditDraw>>;

    /// Add a credit lot; returns its id (None for a zero amount).
    fn grant_credits(
        &mut self,
        customer_id: &str,
        context: &str,
        amount: Money,
        at: u64,
    ) -> Option<u64>;

    fn revoke_credits(&mut self, customer_id: &str, lot_id: u64, amount: Money) -> Result<()>;
}

/// Per-customer redemption tracking for single-use coupons.
pub trait CouponUsage {
    fn has_used(&self, customer_id: &str, code: &str) -> bool;

    /// Record a redemption. Check and write happen together: a second
    /// redemption of the same pair fails with `CouponAlreadyUsed`.
    fn mark_used(&mut self, customer_id: &str, code: &str) -> Result<()>;
}

/// Audit record store for bookings and credit purchases.
pub trait BookingRecords {
    /// Insert a new record; ids are unique.
    fn insert_booking(&mut self, booking: Booking) -> Result<()>;

    fn booking(&self, id: &str) -> Option<&Booking>;

    /// Replace a stored record with an updated copy of itself.
    fn update_booking(&mut self, booking: Booking) -> Result<()>;

    fn bookings_for(&self, customer_id: &str) -> Vec<&Booking>;
}

/// Everything the checkout flow needs from persistence.
pub trait Ledger: CreditLedger + CouponUsage + BookingRecords {}

impl<T: CreditLedger + CouponUsage + BookingRecords> Ledger for T {}

/// Core domain state: customer credits, coupon redemptions and bookings.
///
/// Snapshotted as a whole by storage; every mutation goes through the
/// collaborator traits above.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerState {
    /// Credit holdings indexed by customer id
    pub customers: HashMap<String, CustomerAccount>,

    /// Redeemed single-use coupons, keyed `customer:CODE`
    #[serde(default)]
    pub coupon_redemptions: BTreeSet<String>,

    /// Bookings and credit purchases indexed by id
    #[serde(default)]
    pub bookings: HashMap<String, Booking>,
}

fn redemption_key(customer_id: &str, code: &str) -> String {
    format!("{}:{}", customer_id, normalize_code(code))
}

impl LedgerState {
    pub fn new() -> Self {
        LedgerState::default()
    }

    pub fn customer(&self, customer_id: &str) -> Option<&CustomerAccount> {
        self.customers.get(customer_id)
    }

    fn customer_mut(&mut self, customer_id: &str) -> &mut CustomerAccount {
        self.customers.entry(customer_id.to_string()).or_default()
    }
}

impl CreditLedger for LedgerState {
    fn available_credits(&self, customer_id: &str, context: &str) -> Money {
        self.customer(customer_id)
            .map(|c| c.available(context))
            .unwrap_or(Money::ZERO)
    }

    fn consume_credits(
        &mut self,
        customer_id: &str,
        context: &str,
        amount: Money,
    ) -> Result<Vec<CreditDraw>> {
        if amount.is_zero() {
            return Ok(Vec::new());
        }
        let available = self.available_credits(customer_id, context);
        if available < amount {
            return Err(Error::InsufficientCredits {
                available,
                needed: amount,
            });
        }
        self.customer_mut(customer_id)
            .consume(context, amount)
            .map_err(Error::StateError)
    }

    fn grant_credits(
        &mut self,
        customer_id: &str,
        context: &str,
        amount: Money,
        at: u64,
    ) -> Option<u64> {
        self.customer_mut(customer_id).grant(context, amount, at)
    }

    fn revoke_credits(&mut self, customer_id: &str, lot_id: u64, amount: Money) -> Result<()> {
        let account = self
            .customers
            .get_mut(customer_id)
            .ok_or_else(|| Error::StateError(format!("Customer {} not found", customer_id)))?;
        account.revoke_lot(lot_id, amount).map_err(Error::StateError)
    }
}

impl CouponUsage for LedgerState {
    fn has_used(&self, customer_id: &str, code: &str) -> bool {
        self.coupon_redemptions
            .contains(&redemption_key(customer_id, code))
    }

    fn mark_used(&mut self, customer_id: &str, code: &str) -> Result<()> {
        if !self
            .coupon_redemptions
            .insert(redemption_key(customer_id, code))
        {
            return Err(Error::CouponAlreadyUsed {
                customer: customer_id.to_string(),
                code: normalize_code(code),
            });
        }
        Ok(())
    }
}

impl BookingRecords for LedgerState {
    fn insert_booking(&mut self, booking: Booking) -> Result<()> {
        if self.bookings.contains_key(&booking.id) {
            return Err(Error::InvalidRequest(format!(
                "Booking {} already exists",
                booking.id
            )));
        }
        self.bookings.insert(booking.id.clone(), booking);
        Ok(())
    }

    fn booking(&self, id: &str) -> Option<&Booking> {
        self.bookings.get(id)
    }

    fn update_booking(&mut self, booking: Booking) -> Result<()> {
        let slot = self
            .bookings
            .get_mut(&booking.id)
            .ok_or_else(|| Error::BookingNotFound(booking.id.clone()))?;
        *slot = booking;
        Ok(())
    }

    fn bookings_for(&self, customer_id: &str) -> Vec<&Booking> {
        let mut out: Vec<&Booking> = self
            .bookings
            .values()
            .filter(|b| b.customer_id == customer_id)
            .collect();
        out.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        out
    }
}
