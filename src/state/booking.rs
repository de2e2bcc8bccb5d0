//! Booking aggregate: the audit record written when a checkout is submitted.
//!
//! Amounts are fixed at creation. Only the status (and the payment/credit
//! bookkeeping that goes with a status change) moves afterwards.

use crate::error::{Error, Result};
use crate::money::Money;
use crate::pricing::{CouponOutcome, SettlementResult, UsagePolicy};
use serde::{Deserialize, Serialize};

/// What the customer is paying for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingKind {
    /// A room reservation; credits for the room context apply.
    RoomBooking,
    /// Pre-purchase of credits for a room context; credits do not apply.
    CreditPurchase,
}

/// Booking status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Payment initiated with the processor, not yet confirmed.
    PendingPayment,
    /// Paid (or fully covered by credits). Credits consumed.
    Paid,
    /// Abandoned by the customer before paying.
    Cancelled,
    /// Processor reported the payment expired.
    Expired,
    /// Paid booking reversed.
    Refunded,
}

impl BookingStatus {
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (PendingPayment, Paid)
                | (PendingPayment, Cancelled)
                | (PendingPayment, Expired)
                | (Paid, Refunded)
        )
    }

}

/// Booking / credit purchase with its settlement breakdown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Booking {
    pub id: String,
    pub customer_id: String,
    pub context: String,
    pub kind: BookingKind,

    pub gross_amount: Money,
    pub discount_amount: Money,
    pub net_amount: Money,
    pub credits_used: Money,
    pub amount_to_pay: Money,
    /// Normalized code, present only when the coupon was applied.
    pub coupon_code: Option<String>,
    /// Whether the applied coupon is redeemed on payment.
    pub coupon_single_use: bool,

    pub status: BookingStatus,
    pub payment_reference: Option<String>,
    pub payment_url: Option<String>,
    /// Lot created for a paid credit purchase.
    pub granted_lot: Option<u64>,

    pub created_at: u64,
    pub updated_at: u64,
}

impl Booking {
    pub fn pending(
        id: String,
        customer_id: String,
        context: String,
        kind: BookingKind,
        settlement: &SettlementResult,
        created_at: u64,
    ) -> Self {
        let coupon_single_use = matches!(
            &settlement.coupon,
            CouponOutcome::Applied {
                policy: UsagePolicy::SingleUsePerCustomer,
                ..
            }
        );
        Booking {
            id,
            customer_id,
            context,
            kind,
            gross_amount: settlement.gross_amount,
            discount_amount: settlement.discount_amount,
            net_amount: settlement.net_amount,
            credits_used: settlement.credits_used,
            amount_to_pay: settlement.amount_to_pay,
            coupon_code: settlement.applied_code().map(str::to_string),
            coupon_single_use,
            status: BookingStatus::PendingPayment,
            payment_reference: None,
            payment_url: None,
            granted_lot: None,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn transition(&mut self, next: BookingStatus, at: u64) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition(format!(
                "booking {} cannot move from {:?} to {:?}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        self.updated_at = at;
        Ok(())
    }

    pub fn is_pending(&self) -> bool {
        self.status == BookingStatus::PendingPayment
    }

    /// Canonical bytes of the record, for audit digests.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| {
            Error::StateError(format!("Failed to serialize booking {}: {}", self.id, e))
        })
    }

    /// SHA256 hex digest of the canonical bytes.
    pub fn digest(&self) -> Result<String> {
        Ok(crate::hex_digest(&self.canonical_bytes()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::{settle, CouponCatalog, SettlementRequest};

    fn booking(coupon: Option<&str>) -> Booking {
        let catalog = CouponCatalog::standard();
        let result = settle(
            &catalog,
            &SettlementRequest::new(Money::from_cents(10_000), Money::from_cents(5_000), coupon),
        );
        Booking::pending(
            "b-1".to_string(),
            "ana".to_string(),
            "sala-1".to_string(),
            BookingKind::RoomBooking,
            &result,
            100,
        )
    }

    #[test]
    fn test_pending_copies_breakdown() {
        let b = booking(Some("arthemi10"));
        assert_eq!(b.gross_amount, Money::from_cents(10_000));
        assert_eq!(b.discount_amount, Money::from_cents(500));
        assert_eq!(b.net_amount, Money::from_cents(9_500));
        assert_eq!(b.credits_used, Money::from_cents(5_000));
        assert_eq!(b.amount_to_pay, Money::from_cents(4_500));
        assert_eq!(b.coupon_code.as_deref(), Some("ARTHEMI10"));
        assert!(!b.coupon_single_use);
        assert!(b.is_pending());
    }

    #[test]
    fn test_single_use_flag() {
        let b = booking(Some("PRIMEIRACOMPRA"));
        assert!(b.coupon_single_use);
    }

    #[test]
    fn test_invalid_coupon_not_recorded() {
        let b = booking(Some("TESTE50"));
        assert_eq!(b.coupon_code, None);
    }

    #[test]
    fn test_transitions() {
        let mut b = booking(None);
        assert!(b.transition(BookingStatus::Paid, 200).is_ok());
        assert_eq!(b.updated_at, 200);
        assert!(b.transition(BookingStatus::Cancelled, 300).is_err());
        assert!(b.transition(BookingStatus::Refunded, 300).is_ok());
        assert_eq!(b.status, BookingStatus::Refunded);
        assert!(b.transition(BookingStatus::Paid, 400).is_err());
    }

    #[test]
    fn test_digest_changes_with_status() {
        let mut b = booking(None);
        let before = b.digest().unwrap();
        assert_eq!(before.len(), 64);
        b.transition(BookingStatus::Expired, 101).unwrap();
        assert_ne!(before, b.digest().unwrap());
    }

    #[test]
    fn test_digest_covers_record_bytes() {
        let b = booking(Some("ARTHEMI10"));
        let bytes = b.canonical_bytes().unwrap();
        assert!(!bytes.is_empty());
        assert_eq!(b.digest().unwrap(), crate::hex_digest(&bytes));
        assert_ne!(b.digest().unwrap(), crate::hex_digest(&[]));
    }
}
