//! Settlement calculation: credits first, then an optional coupon on the
//! remaining cash portion.
//!
//! Every function here is pure. Business conditions (unknown coupon, coupon
//! skipped because credits cover everything) are reported in the result, not
//! as errors; the checkout flow decides what to surface.

use crate::error::{Error, Result};
use crate::money::Money;
use crate::pricing::coupon::{normalize_code, CouponCatalog, UsagePolicy};
use serde::{Deserialize, Serialize};

/// Inputs for one checkout attempt. Built fresh per attempt, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRequest {
    pub gross_amount: Money,
    pub available_credits: Money,
    pub coupon_code: Option<String>,
}

impl SettlementRequest {
    pub fn new(gross_amount: Money, available_credits: Money, coupon_code: Option<&str>) -> Self {
        SettlementRequest {
            gross_amount,
            available_credits,
            coupon_code: coupon_code.map(str::to_string),
        }
    }
}

/// What happened to the coupon code supplied with the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CouponOutcome {
    /// No code, or a blank one.
    NotRequested,
    /// Credits cover the whole amount; the code was never looked up.
    CoveredByCredits,
    Applied {
        code: String,
        percent_bps: u16,
        policy: UsagePolicy,
    },
    /// Unknown or retired code on a cash payment.
    Invalid { code: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementResult {
    pub gross_amount: Money,
    pub credits_used: Money,
    pub amount_to_pay_without_coupon: Money,
    pub discount_amount: Money,
    /// Gross minus discount, kept for the audit record.
    pub net_amount: Money,
    /// What goes to the payment processor.
    pub amount_to_pay: Money,
    pub coupon_applied: bool,
    pub coupon: CouponOutcome,
}

impl SettlementResult {
    /// Normalized code of the applied coupon, if any.
    pub fn applied_code(&self) -> Option<&str> {
        match &self.coupon {
            CouponOutcome::Applied { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn is_fully_covered_by_credits(&self) -> bool {
        self.amount_to_pay_without_coupon.is_zero()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    pub discount_amount: Money,
    pub final_amount: Money,
}

/// Discount for `amount` under `code`. The code must be valid in `catalog`.
pub fn apply_discount(catalog: &CouponCatalog, amount: Money, code: &str) -> Result<Discount> {
    let coupon = catalog
        .get(code)
        .ok_or_else(|| Error::CouponInvalid(normalize_code(code)))?;
    let discount_amount = amount.portion_bps(coupon.percent_bps).min(amount);
    Ok(Discount {
        discount_amount,
        final_amount: amount.saturating_sub(discount_amount),
    })
}

/// The single gate for coupon handling: a coupon is considered only when
/// there is cash left to pay after credits.
pub fn should_process_coupon(coupon_code: Option<&str>, amount_to_pay_without_coupon: Money) -> bool {
    let has_code = coupon_code.map(|c| !c.trim().is_empty()).unwrap_or(false);
    has_code && !amount_to_pay_without_coupon.is_zero()
}

pub fn settle(catalog: &CouponCatalog, request: &SettlementRequest) -> SettlementResult {
    let gross_amount = request.gross_amount;
    let credits_used = request.available_credits.min(gross_amount);
    let amount_to_pay_without_coupon = gross_amount.saturating_sub(credits_used);
    let code = request.coupon_code.as_deref();

    let mut discount_amount = Money::ZERO;
    let coupon = if should_process_coupon(code, amount_to_pay_without_coupon) {
        let code = normalize_code(code.unwrap_or_default());
        match catalog.get(&code) {
            Some(c) => {
                discount_amount = amount_to_pay_without_coupon
                    .portion_bps(c.percent_bps)
                    .min(amount_to_pay_without_coupon);
                CouponOutcome::Applied {
                    code,
                    percent_bps: c.percent_bps,
                    policy: c.policy,
                }
            }
            None => CouponOutcome::Invalid { code },
        }
    } else if code.map(|c| !c.trim().is_empty()).unwrap_or(false) {
        CouponOutcome::CoveredByCredits
    } else {
        CouponOutcome::NotRequested
    };

    let net_amount = gross_amount.saturating_sub(discount_amount);
    let amount_to_pay = net_amount.saturating_sub(credits_used);

    SettlementResult {
        gross_amount,
        credits_used,
        amount_to_pay_without_coupon,
        discount_amount,
        net_amount,
        amount_to_pay,
        coupon_applied: matches!(coupon, CouponOutcome::Applied { .. }),
        coupon,
    }
}
