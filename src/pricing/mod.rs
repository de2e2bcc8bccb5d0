pub mod calculator;
pub mod coupon;

pub use calculator::{
    apply_discount, settle, should_process_coupon, CouponOutcome, Discount, SettlementRequest,
    SettlementResult,
};
pub use coupon::{normalize_code, Coupon, CouponCatalog, UsagePolicy, BPS_MAX};
