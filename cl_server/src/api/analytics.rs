//! Analytics API handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use coin_ledger::analytics::{CommissionSummary, ContentRevenue, LeaderboardSnapshot};
use std::time::Instant;

use super::AppState;
use super::error::ApiResult;
use crate::logging;

/// Latest cached leaderboards. Never touches the store.
pub async fn leaderboard(State(state): State<AppState>) -> Json<LeaderboardSnapshot> {
    Json(state.leaderboard.snapshot().await)
}

/// Commission for today, the last 7 and 30 days, and all time.
pub async fn commission(State(state): State<AppState>) -> ApiResult<Json<CommissionSummary>> {
    let started = Instant::now();
    let summary = state.engine.analytics().commission_summary().await?;
    logging::log_performance(
        "commission_summary",
        started.elapsed().as_millis() as u64,
        None,
    );
    Ok(Json(summary))
}

/// Unlock revenue and view-to-unlock conversion for one content item.
pub async fn content_revenue(
    State(state): State<AppState>,
    Path(content_id): Path<i64>,
) -> ApiResult<Json<ContentRevenue>> {
    Ok(Json(
        state.engine.analytics().content_revenue(content_id).await?,
    ))
}
