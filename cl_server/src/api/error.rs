//! HTTP error mapping for ledger failures.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use coin_ledger::LedgerError;
use serde::Serialize;

use crate::metrics;

/// Seconds clients should wait before retrying a busy ledger
const RETRY_AFTER_SECS: u64 = 1;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

/// Error returned by every handler.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub retry_after: Option<u64>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }
}

/// Status code for a ledger failure.
pub fn status_for(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
        LedgerError::AlreadyProcessed { .. } | LedgerError::DuplicatePaymentReference(_) => {
            StatusCode::CONFLICT
        }
        LedgerError::InvalidAmount(_) | LedgerError::SelfTransferDenied => StatusCode::BAD_REQUEST,
        LedgerError::ContentNotPremium(_) | LedgerError::BalanceOverflow => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        LedgerError::WalletNotFound(_)
        | LedgerError::UserNotFound(_)
        | LedgerError::SenderNotFound(_)
        | LedgerError::RecipientNotFound(_)
        | LedgerError::ContentNotFound(_)
        | LedgerError::RequestNotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::Timeout(_) | LedgerError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
        LedgerError::Database(_) | LedgerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let status = status_for(&err);
        metrics::ledger_failures_total(err.kind());

        if status.is_server_error() && !err.is_retryable() {
            tracing::error!(error = %err, kind = err.kind(), "Ledger operation failed");
        } else if err.is_retryable() {
            tracing::warn!(error = %err, kind = err.kind(), "Ledger operation busy");
        } else {
            tracing::debug!(error = %err, kind = err.kind(), "Ledger operation rejected");
        }

        Self {
            status,
            code: err.kind(),
            message: err.client_message(),
            retry_after: err.is_retryable().then_some(RETRY_AFTER_SECS),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
            code: self.code,
        });
        let mut response = (self.status, body).into_response();
        if let Some(secs) = self.retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use coin_ledger::PurchaseStatus;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                LedgerError::InsufficientFunds {
                    user_id: 1,
                    current: 50,
                    required: 99,
                },
                StatusCode::PAYMENT_REQUIRED,
            ),
            (
                LedgerError::AlreadyProcessed {
                    request_id: 1,
                    status: PurchaseStatus::Approved,
                },
                StatusCode::CONFLICT,
            ),
            (
                LedgerError::DuplicatePaymentReference("txn".into()),
                StatusCode::CONFLICT,
            ),
            (LedgerError::InvalidAmount(0), StatusCode::BAD_REQUEST),
            (LedgerError::SelfTransferDenied, StatusCode::BAD_REQUEST),
            (
                LedgerError::ContentNotPremium(4),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (LedgerError::RecipientNotFound(2), StatusCode::NOT_FOUND),
            (LedgerError::RequestNotFound(9), StatusCode::NOT_FOUND),
            (
                LedgerError::Transient("deadlock".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                LedgerError::Storage("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(status_for(&err), expected, "{err:?}");
        }
    }

    #[test]
    fn test_timeout_sets_retry_after() {
        let api: ApiError = LedgerError::Timeout(Duration::from_secs(10)).into();
        assert_eq!(api.retry_after, Some(RETRY_AFTER_SECS));

        let response = api.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[RETRY_AFTER], "1");
    }

    #[test]
    fn test_internal_details_hidden() {
        let api: ApiError = LedgerError::Storage("disk on fire".into()).into();
        assert_eq!(api.message, "Internal server error");
        assert!(api.retry_after.is_none());
    }
}
