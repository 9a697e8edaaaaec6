//! Commission split for gift prices.
//!
//! Rates are held in basis points and applied with integer arithmetic:
//! commission rounds down, the recipient receives the remainder, so
//! `recipient_amount + commission == price` for every price.

use serde::{Deserialize, Serialize};

use crate::errors::{LedgerError, LedgerResult};

/// Platform share of a gift price, in basis points (1/100 of a percent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CommissionRate(u32);

impl CommissionRate {
    /// Basis points in 100%.
    pub const DENOMINATOR: u32 = 10_000;

    pub const fn from_bps(bps: u32) -> Self {
        Self(bps)
    }

    /// Whole-percent convenience constructor.
    pub const fn from_percent(percent: u32) -> Self {
        Self(percent * 100)
    }

    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Rate as a fraction, for display and analytics only.
    pub fn as_fraction(&self) -> f64 {
        f64::from(self.0) / f64::from(Self::DENOMINATOR)
    }

    /// Split `price` into recipient amount and platform commission.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - `price` is not positive
    pub fn split(&self, price: i64) -> LedgerResult<GiftSplit> {
        if price <= 0 {
            return Err(LedgerError::InvalidAmount(price));
        }

        // i128 keeps price * bps exact for any i64 price
        let commission =
            (i128::from(price) * i128::from(self.0) / i128::from(Self::DENOMINATOR)) as i64;

        Ok(GiftSplit {
            price,
            recipient_amount: price - commission,
            commission,
            rate: *self,
        })
    }
}

impl Default for CommissionRate {
    fn default() -> Self {
        Self::from_percent(30)
    }
}

/// Result of splitting a gift price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftSplit {
    pub price: i64,
    pub recipient_amount: i64,
    pub commission: i64,
    pub rate: CommissionRate,
}
