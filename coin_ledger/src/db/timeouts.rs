//! Time budgets for units of work.
//!
//! A unit that overruns its budget is dropped before commit, which rolls it
//! back, and the caller sees [`LedgerError::Timeout`].

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use crate::errors::{LedgerError, LedgerResult};

/// Default budget for a single read query (5 seconds)
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default budget for a balance-mutating unit of work (10 seconds)
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Budget for analytics aggregations (30 seconds)
pub const LONG_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Run a ledger operation under a time budget.
///
/// # Example
///
/// ```no_run
/// use coin_ledger::db::timeouts::{with_timeout, DEFAULT_QUERY_TIMEOUT};
/// # use coin_ledger::store::LedgerStore;
/// # async fn example(store: &dyn LedgerStore) -> coin_ledger::LedgerResult<()> {
/// let wallet = with_timeout(DEFAULT_QUERY_TIMEOUT, store.wallet(1)).await?;
/// # let _ = wallet;
/// # Ok(())
/// # }
/// ```
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> LedgerResult<T>
where
    F: Future<Output = LedgerResult<T>>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => {
            log::warn!("Ledger operation exceeded {:?}, rolled back", duration);
            Err(LedgerError::Timeout(duration))
        }
    }
}

/// Run a read with the default query budget
pub async fn with_default_timeout<F, T>(future: F) -> LedgerResult<T>
where
    F: Future<Output = LedgerResult<T>>,
{
    with_timeout(DEFAULT_QUERY_TIMEOUT, future).await
}

/// Run an aggregation with the extended budget
pub async fn with_long_timeout<F, T>(future: F) -> LedgerResult<T>
where
    F: Future<Output = LedgerResult<T>>,
{
    with_timeout(LONG_OPERATION_TIMEOUT, future).await
}
