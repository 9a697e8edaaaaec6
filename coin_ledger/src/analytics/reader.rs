//! Read-only aggregation over the ledger.

use chrono::{Duration as ChronoDuration, NaiveTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use super::models::{CommissionSummary, ContentRevenue, LeaderboardEntry, LeaderboardSnapshot};
use crate::config::EngineConfig;
use crate::db::timeouts::{with_default_timeout, with_long_timeout};
use crate::errors::{LedgerError, LedgerResult};
use crate::store::LedgerStore;
use crate::unlock::Content;
use crate::wallet::Reconciliation;

/// Analytics reader
#[derive(Clone)]
pub struct AnalyticsReader {
    store: Arc<dyn LedgerStore>,
    config: EngineConfig,
}

impl AnalyticsReader {
    pub fn new(store: Arc<dyn LedgerStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Top gift senders by gross coins over the trailing `window`
    pub async fn top_senders(
        &self,
        window: ChronoDuration,
        limit: i64,
    ) -> LedgerResult<Vec<LeaderboardEntry>> {
        let since = Utc::now() - window;
        with_long_timeout(self.store.top_senders(since, limit.max(1))).await
    }

    /// Top gift receivers by net coins over the trailing `window`
    pub async fn top_receivers(
        &self,
        window: ChronoDuration,
        limit: i64,
    ) -> LedgerResult<Vec<LeaderboardEntry>> {
        let since = Utc::now() - window;
        with_long_timeout(self.store.top_receivers(since, limit.max(1))).await
    }

    /// Commission for today (UTC), the last 7 and 30 days, and all time.
    pub async fn commission_summary(&self) -> LedgerResult<CommissionSummary> {
        let now = Utc::now();
        let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();

        with_long_timeout(async {
            Ok(CommissionSummary {
                today: self.store.commission_totals(Some(midnight)).await?,
                week: self
                    .store
                    .commission_totals(Some(now - ChronoDuration::days(7)))
                    .await?,
                month: self
                    .store
                    .commission_totals(Some(now - ChronoDuration::days(30)))
                    .await?,
                all_time: self.store.commission_totals(None).await?,
                generated_at: now,
            })
        })
        .await
    }

    /// Unlock revenue and conversion for one content item.
    pub async fn content_revenue(&self, content_id: i64) -> LedgerResult<ContentRevenue> {
        let content = with_default_timeout(self.store.content(content_id))
            .await?
            .ok_or(LedgerError::ContentNotFound(content_id))?;
        Ok(self.revenue_for(content))
    }

    /// Premium content ranked by unlock count
    pub async fn top_content(&self, limit: i64) -> LedgerResult<Vec<ContentRevenue>> {
        let ranked = with_long_timeout(self.store.top_content(limit.max(1))).await?;
        Ok(ranked.into_iter().map(|c| self.revenue_for(c)).collect())
    }

    /// Compare the stored balance with the ledger behind it.
    ///
    /// An inconsistent result means the ledger was tampered with outside the
    /// engine; it is logged at error level.
    pub async fn reconcile_wallet(&self, user_id: i64) -> LedgerResult<Reconciliation> {
        let audit = with_long_timeout(self.store.reconciliation(user_id))
            .await?
            .ok_or(LedgerError::WalletNotFound(user_id))?;

        if !audit.is_consistent() {
            log::error!(
                "Wallet {} out of balance: stored {}, ledger sum {}, last entry {:?}",
                user_id,
                audit.balance,
                audit.ledger_sum,
                audit.last_balance_after
            );
        }
        Ok(audit)
    }

    fn revenue_for(&self, content: Content) -> ContentRevenue {
        let unlock_cost = self.config.unlock_pricing.cost_for(content.kind);
        let conversion_rate = if content.view_count > 0 {
            content.unlock_count as f64 / content.view_count as f64 * 100.0
        } else {
            0.0
        };

        ContentRevenue {
            content_id: content.id,
            title: content.title,
            kind: content.kind,
            unlock_count: content.unlock_count,
            unlock_cost,
            revenue: content.unlock_count.saturating_mul(unlock_cost),
            view_count: content.view_count,
            conversion_rate,
        }
    }
}

/// Leaderboard snapshot shared with request handlers.
///
/// Handlers only read the snapshot; a background task replaces it.
pub struct LeaderboardCache {
    reader: AnalyticsReader,
    window: ChronoDuration,
    limit: i64,
    snapshot: RwLock<LeaderboardSnapshot>,
}

impl LeaderboardCache {
    pub fn new(reader: AnalyticsReader, window: ChronoDuration, limit: i64) -> Self {
        Self {
            reader,
            window,
            limit,
            snapshot: RwLock::new(LeaderboardSnapshot::default()),
        }
    }

    /// Current snapshot; empty until the first refresh
    pub async fn snapshot(&self) -> LeaderboardSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Recompute both leaderboards and swap them in.
    pub async fn refresh(&self) -> LedgerResult<()> {
        let top_senders = self.reader.top_senders(self.window, self.limit).await?;
        let top_receivers = self.reader.top_receivers(self.window, self.limit).await?;

        let mut snapshot = self.snapshot.write().await;
        *snapshot = LeaderboardSnapshot {
            top_senders,
            top_receivers,
            refreshed_at: Some(Utc::now()),
        };
        Ok(())
    }

    /// Refresh every `interval` until the task is aborted.
    pub fn spawn_refresh(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match self.refresh().await {
                    Ok(()) => log::debug!("Leaderboard refreshed"),
                    Err(e) => log::warn!("Leaderboard refresh failed: {}", e),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLedgerStore;
    use crate::unlock::ContentKind;

    fn reader(store: &MemoryLedgerStore) -> AnalyticsReader {
        AnalyticsReader::new(Arc::new(store.clone()), EngineConfig::default())
    }

    #[tokio::test]
    async fn test_conversion_rate_without_views() {
        let store = MemoryLedgerStore::new();
        store
            .insert_content(Content::premium(1, "Pilot", ContentKind::Episode))
            .await;

        let revenue = reader(&store).content_revenue(1).await.unwrap();
        assert_eq!(revenue.revenue, 0);
        assert_eq!(revenue.conversion_rate, 0.0);
    }

    #[tokio::test]
    async fn test_conversion_rate_with_views() {
        let store = MemoryLedgerStore::new();
        let mut content = Content::premium(1, "Pilot", ContentKind::Drama);
        content.view_count = 8;
        content.unlock_count = 2;
        store.insert_content(content).await;

        let revenue = reader(&store).content_revenue(1).await.unwrap();
        assert_eq!(revenue.unlock_cost, 99);
        assert_eq!(revenue.revenue, 198);
        assert!((revenue.conversion_rate - 25.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_missing_content_and_wallet() {
        let store = MemoryLedgerStore::new();
        let reader = reader(&store);

        assert!(matches!(
            reader.content_revenue(5).await.unwrap_err(),
            LedgerError::ContentNotFound(5)
        ));
        assert!(matches!(
            reader.reconcile_wallet(5).await.unwrap_err(),
            LedgerError::WalletNotFound(5)
        ));
    }

    #[tokio::test]
    async fn test_empty_commission_summary() {
        let store = MemoryLedgerStore::new();
        let summary = reader(&store).commission_summary().await.unwrap();
        assert_eq!(summary.all_time.gift_count, 0);
        assert_eq!(summary.today.commission, 0);
    }

    #[tokio::test]
    async fn test_cache_starts_empty() {
        let store = MemoryLedgerStore::new();
        let cache = LeaderboardCache::new(reader(&store), ChronoDuration::days(7), 10);

        assert!(cache.snapshot().await.refreshed_at.is_none());
        cache.refresh().await.unwrap();
        assert!(cache.snapshot().await.refreshed_at.is_some());
    }
}
