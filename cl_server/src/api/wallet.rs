//! Wallet API handlers.
//!
//! ```bash
//! curl http://localhost:8080/api/v1/wallet -H "x-user-id: 7"
//! curl "http://localhost:8080/api/v1/wallet/ledger?limit=20" -H "x-user-id: 7"
//! ```

use axum::{
    Json,
    extract::{Query, State},
};
use coin_ledger::wallet::{LedgerEntry, Wallet};
use serde::Deserialize;

use super::AppState;
use super::error::ApiResult;
use super::middleware::Caller;

/// Ledger page size when the caller does not ask for one
pub const DEFAULT_PAGE: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
}

impl PageQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE)
    }
}

/// The caller's wallet. Created with a zero balance on first access.
pub async fn get_wallet(
    State(state): State<AppState>,
    Caller(user_id): Caller,
) -> ApiResult<Json<Wallet>> {
    Ok(Json(state.engine.get_wallet(user_id).await?))
}

/// The caller's ledger, newest first. `limit` is clamped server side.
pub async fn get_ledger(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Vec<LedgerEntry>>> {
    Ok(Json(state.engine.get_ledger(user_id, page.limit()).await?))
}
