use crate::money::Money;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Coupon {0} is not valid")]
    CouponInvalid(String),

    #[error("Coupon {code} was already used by customer {customer}")]
    CouponAlreadyUsed { customer: String, code: String },

    #[error("Amount {amount} is below the payment minimum of {minimum}")]
    AmountBelowMinimum { amount: Money, minimum: Money },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Booking {0} not found")]
    BookingNotFound(String),

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("Insufficient credits: have {available}, need {needed}")]
    InsufficientCredits { available: Money, needed: Money },

    #[error("Payment error: {0}")]
    PaymentError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("State error: {0}")]
    StateError(String),
}

impl Error {
    /// Errors the checkout form can show to the customer and recover from
    /// by changing the coupon or the payment method.
    pub fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Error::CouponInvalid(_)
                | Error::CouponAlreadyUsed { .. }
                | Error::AmountBelowMinimum { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
