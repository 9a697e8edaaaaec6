//! Purchase request data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::errors::LedgerError;

/// Purchase request status.
///
/// `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    Pending,
    Approved,
    Rejected,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Approved => "approved",
            PurchaseStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PurchaseStatus::Pending)
    }
}

impl fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PurchaseStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PurchaseStatus::Pending),
            "approved" => Ok(PurchaseStatus::Approved),
            "rejected" => Ok(PurchaseStatus::Rejected),
            other => Err(LedgerError::Storage(format!("unknown purchase status '{other}'"))),
        }
    }
}

/// Externally-paid coin purchase awaiting operator verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub id: i64,
    pub user_id: i64,
    pub coin_amount: i64,
    /// Amount paid outside the platform, in minor currency units
    pub paid_amount: i64,
    pub payment_reference: String,
    pub status: PurchaseStatus,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub admin_note: Option<String>,
    /// Credit produced by approval
    pub ledger_entry_id: Option<i64>,
}

/// Fields a caller supplies when submitting a purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchaseRequest {
    pub user_id: i64,
    pub coin_amount: i64,
    pub paid_amount: i64,
    pub payment_reference: String,
}

/// Terminal transition applied to a pending request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseResolution {
    pub status: PurchaseStatus,
    pub admin_note: Option<String>,
    pub ledger_entry_id: Option<i64>,
    pub processed_at: DateTime<Utc>,
}

/// Outcome of approving a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseApproval {
    pub request: PurchaseRequest,
    pub new_balance: i64,
}
