use crate::money::Money;
use serde::{Deserialize, Serialize};

/// One purchase (or refund) of credits, spendable in a single room context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreditLot {
    pub lot_id: u64,

    /// Room or product context the credits are valid for
    pub context: String,

    /// Unspent amount left in this lot
    pub remaining: Money,

    /// Unix timestamp; drives FIFO order
    pub acquired_at: u64,
}

/// Amount taken from one lot by a consumption.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreditDraw {
    pub lot_id: u64,
    pub amount: Money,
}

/// Customer aggregate: holds credit lots.
///
/// Invariants:
/// - Lot balances never become negative
/// - Consumption drains the oldest lot of a context first
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomerAccount {
    pub lots: Vec<CreditLot>,

    next_lot_id: u64,
}

impl CustomerAccount {
    pub fn new() -> Self {
        CustomerAccount::default()
    }

    /// Add a lot; returns its id. Zero amounts are ignored and return None.
    pub fn grant(&mut self, context: &str, amount: Money, acquired_at: u64) -> Option<u64> {
        if amount.is_zero() {
            return None;
        }
        let lot_id = self.next_lot_id;
        self.next_lot_id += 1;
        self.lots.push(CreditLot {
            lot_id,
            context: context.to_string(),
            remaining: amount,
            acquired_at,
        });
        Some(lot_id)
    }

    /// Total spendable credits for a context.
    pub fn available(&self, context: &str) -> Money {
        self.lots
            .iter()
            .filter(|l| l.context == context)
            .fold(Money::ZERO, |acc, l| acc + l.remaining)
    }

    /// Consume oldest-first. Leaves the account untouched if the context
    /// cannot cover `amount`.
    pub fn consume(&mut self, context: &str, amount: Money) -> Result<Vec<CreditDraw>, String> {
        let available = self.available(context);
        if available < amount {
            return Err(format!(
                "Insufficient credits in {}: have {}, need {}",
                context, available, amount
            ));
        }

        let mut order: Vec<usize> = (0..self.lots.len())
            .filter(|&i| self.lots[i].context == context && !self.lots[i].remaining.is_zero())
            .collect();
        order.sort_by_key(|&i| (self.lots[i].acquired_at, self.lots[i].lot_id));

        let mut left = amount;
        let mut draws = Vec::new();
        for i in order {
            if left.is_zero() {
                break;
            }
            let lot = &mut self.lots[i];
            let take = lot.remaining.min(left);
            lot.remaining = lot.remaining.saturating_sub(take);
            left = left.saturating_sub(take);
            draws.push(CreditDraw {
                lot_id: lot.lot_id,
                amount: take,
            });
        }

        self.lots.retain(|l| !l.remaining.is_zero());
        Ok(draws)
    }

    /// Remove an unspent lot, e.g. when its purchase is refunded.
    pub fn revoke_lot(&mut self, lot_id: u64, amount: Money) -> Result<(), String> {
        let pos = self
            .lots
            .iter()
            .position(|l| l.lot_id == lot_id)
            .ok_or_else(|| format!("Credit lot {} has already been spent", lot_id))?;
        if self.lots[pos].remaining != amount {
            return Err(format!(
                "Credit lot {} is partially spent: {} of {} left",
                lot_id, self.lots[pos].remaining, amount
            ));
        }
        self.lots.remove(pos);
        Ok(())
    }
}
