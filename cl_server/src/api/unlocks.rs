//! Content unlock API handler.

use axum::{
    Json,
    extract::{Path, State},
};
use coin_ledger::UnlockOutcome;
use coin_ledger::store::LedgerStore;

use super::AppState;
use super::error::ApiResult;
use super::middleware::Caller;
use crate::{logging, metrics};

/// Unlock premium content for the caller.
///
/// Unlocking something the caller already owns is not an error: the response
/// carries `"outcome": "already_unlocked"` and the unchanged balance.
pub async fn unlock_content(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path(content_id): Path<i64>,
) -> ApiResult<Json<UnlockOutcome>> {
    let outcome = state.engine.unlock_content(user_id, content_id).await?;

    if outcome.unlocked() {
        // Price lookup is for metrics only
        let cost = match state.engine.store().content(content_id).await {
            Ok(Some(content)) => state.engine.unlocks().cost_for(&content),
            _ => 0,
        };
        logging::log_ledger_event("unlock", user_id, cost, &content_id.to_string());
        metrics::content_unlocked(cost);
    }

    Ok(Json(outcome))
}
