//! Money in centavos.
//!
//! All checkout arithmetic is integer arithmetic on minor units; the type
//! never goes below zero.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

/// Amount of Brazilian reais in centavos.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: u64) -> Self {
        Money(cents)
    }

    pub const fn cents(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Subtract, flooring at zero.
    pub fn saturating_sub(self, other: Money) -> Money {
        Money(self.0.saturating_sub(other.0))
    }

    pub fn saturating_add(self, other: Money) -> Money {
        Money(self.0.saturating_add(other.0))
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    /// Portion of this amount in basis points (10_000 = 100%), rounded half up.
    ///
    /// Computed in u128 so `amount * bps` cannot overflow. Anything above
    /// 100% is capped, so the portion never exceeds the amount.
    pub fn portion_bps(self, bps: u16) -> Money {
        let scaled = self.0 as u128 * bps.min(10_000) as u128;
        let rounded = (scaled + 5_000) / 10_000;
        Money(rounded as u64)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        self.saturating_add(rhs)
    }
}

impl From<u64> for Money {
    fn from(cents: u64) -> Self {
        Money(cents)
    }
}

/// Formats as `R$ 1.234,56`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reais = self.0 / 100;
        let centavos = self.0 % 100;

        let digits = reais.to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }

        write!(f, "R$ {},{:02}", grouped, centavos)
    }
}
