//! Ledger error types.

use std::time::Duration;
use thiserror::Error;

use crate::purchase::PurchaseStatus;

/// Postgres SQLSTATE codes that indicate contention rather than a bug.
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const LOCK_NOT_AVAILABLE: &str = "55P03";

/// Errors raised by the ledger engine.
///
/// Any error raised inside a unit of work aborts that unit; nothing it staged
/// survives.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Database error
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// Backend failure outside the database driver (memory store, injected faults)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Wallet not found
    #[error("Wallet not found for user {0}")]
    WalletNotFound(i64),

    /// User profile not found or inactive
    #[error("User not found: {0}")]
    UserNotFound(i64),

    /// Invalid amount (must be positive)
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// Insufficient balance for a debit
    #[error("Insufficient funds: balance {current}, required {required}")]
    InsufficientFunds {
        user_id: i64,
        current: i64,
        required: i64,
    },

    /// Credit would overflow the balance column
    #[error("Balance overflow")]
    BalanceOverflow,

    /// Sender and recipient are the same user
    #[error("Cannot send a gift to yourself")]
    SelfTransferDenied,

    /// Gift sender missing or inactive
    #[error("Sender not found: {0}")]
    SenderNotFound(i64),

    /// Gift recipient missing or inactive
    #[error("Recipient not found: {0}")]
    RecipientNotFound(i64),

    /// Content missing or inactive
    #[error("Content not found: {0}")]
    ContentNotFound(i64),

    /// Content does not require unlocking
    #[error("Content {0} is not premium")]
    ContentNotPremium(i64),

    /// Purchase request not found
    #[error("Purchase request not found: {0}")]
    RequestNotFound(i64),

    /// Purchase request already left the pending state
    #[error("Purchase request {request_id} already {status}")]
    AlreadyProcessed {
        request_id: i64,
        status: PurchaseStatus,
    },

    /// Payment reference already used by another request
    #[error("Payment reference already submitted: {0}")]
    DuplicatePaymentReference(String),

    /// Unit of work exceeded its time budget and was rolled back
    #[error("Ledger operation timed out after {0:?}")]
    Timeout(Duration),

    /// Contention (deadlock, serialization failure, pool exhaustion)
    #[error("Transient failure: {0}")]
    Transient(String),
}

impl LedgerError {
    /// Whether retrying the same request may succeed.
    ///
    /// Units of work are atomic, so a retry after one of these errors never
    /// double-applies anything.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Timeout(_) | LedgerError::Transient(_))
    }

    /// Whether the failure is an expected business outcome rather than a
    /// caller bug or infrastructure fault.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            LedgerError::InsufficientFunds { .. }
                | LedgerError::AlreadyProcessed { .. }
                | LedgerError::DuplicatePaymentReference(_)
        )
    }

    /// Short stable name for metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::Database(_) => "database",
            LedgerError::Storage(_) => "storage",
            LedgerError::WalletNotFound(_) => "wallet_not_found",
            LedgerError::UserNotFound(_) => "user_not_found",
            LedgerError::InvalidAmount(_) => "invalid_amount",
            LedgerError::InsufficientFunds { .. } => "insufficient_funds",
            LedgerError::BalanceOverflow => "balance_overflow",
            LedgerError::SelfTransferDenied => "self_transfer_denied",
            LedgerError::SenderNotFound(_) => "sender_not_found",
            LedgerError::RecipientNotFound(_) => "recipient_not_found",
            LedgerError::ContentNotFound(_) => "content_not_found",
            LedgerError::ContentNotPremium(_) => "content_not_premium",
            LedgerError::RequestNotFound(_) => "request_not_found",
            LedgerError::AlreadyProcessed { .. } => "already_processed",
            LedgerError::DuplicatePaymentReference(_) => "duplicate_payment_reference",
            LedgerError::Timeout(_) => "timeout",
            LedgerError::Transient(_) => "transient",
        }
    }

    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Database and storage errors are sanitized, and user ids are redacted.
    pub fn client_message(&self) -> String {
        match self {
            LedgerError::Database(_) | LedgerError::Storage(_) => {
                "Internal server error".to_string()
            }
            LedgerError::WalletNotFound(_) => "Wallet not found".to_string(),
            LedgerError::UserNotFound(_) => "User not found".to_string(),
            LedgerError::SenderNotFound(_) => "Sender not found".to_string(),
            LedgerError::RecipientNotFound(_) => "Recipient not found".to_string(),
            LedgerError::Timeout(_) | LedgerError::Transient(_) => {
                "Service busy, please retry".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        if matches!(err, sqlx::Error::PoolTimedOut) {
            return LedgerError::Transient("connection pool exhausted".into());
        }

        let contention = err
            .as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|code| {
                matches!(
                    code.as_ref(),
                    SERIALIZATION_FAILURE | DEADLOCK_DETECTED | LOCK_NOT_AVAILABLE
                )
            });

        if contention {
            LedgerError::Transient(err.to_string())
        } else {
            LedgerError::Database(err)
        }
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
