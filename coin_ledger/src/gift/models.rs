//! Gift transfer data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::commission::CommissionRate;

/// Gift send request as received from a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendGiftRequest {
    pub sender_id: i64,
    pub recipient_id: i64,
    pub gift_id: String,
    pub gift_name: String,
    pub price: i64,
    pub message: Option<String>,
}

/// Gift transfer status. Only completed transfers are ever persisted; a failed
/// send leaves no row behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Completed,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Completed => "completed",
        }
    }
}

/// One gift-send event (`gift_transfers` row)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GiftTransfer {
    pub id: Uuid,
    pub sender_id: i64,
    pub sender_name: String,
    pub recipient_id: i64,
    pub recipient_name: String,
    pub gift_id: String,
    pub gift_name: String,
    pub price: i64,
    pub recipient_amount: i64,
    pub commission: i64,
    pub commission_rate: CommissionRate,
    pub sender_tx_id: i64,
    pub recipient_tx_id: i64,
    /// Set when commission was credited to a platform treasury wallet
    pub commission_tx_id: Option<i64>,
    pub message: Option<String>,
    pub status: TransferStatus,
    pub created_at: DateTime<Utc>,
}

/// Commission bookkeeping derived from a gift; analytics only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionRecord {
    pub id: i64,
    pub gift_transfer_id: Uuid,
    pub commission_amount: i64,
    pub original_price: i64,
    pub rate: CommissionRate,
    pub created_at: DateTime<Utc>,
}

/// Everything a completed gift send produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GiftReceipt {
    pub transfer: GiftTransfer,
    pub commission: CommissionRecord,
    pub sender_balance: i64,
    pub recipient_balance: i64,
}
