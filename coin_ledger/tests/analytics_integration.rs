//! Integration tests for leaderboards, commission reports and the
//! leaderboard cache.

use chrono::Duration as ChronoDuration;
use coin_ledger::analytics::LeaderboardCache;
use coin_ledger::store::MemoryLedgerStore;
use coin_ledger::unlock::{Content, ContentKind};
use coin_ledger::wallet::UserProfile;
use coin_ledger::{CoinEngine, EngineConfig, SendGiftRequest};
use std::sync::Arc;
use std::time::Duration;

async fn setup_engine() -> (CoinEngine, MemoryLedgerStore) {
    let store = MemoryLedgerStore::new();
    for (id, name) in [(1, "Ann"), (2, "Ben"), (3, "Cy")] {
        store
            .insert_user(UserProfile::new(id, name.to_lowercase(), name))
            .await;
    }
    let engine = CoinEngine::new(Arc::new(store.clone()), EngineConfig::default());
    for id in [1, 2, 3] {
        engine.wallets().admin_credit(id, 10_000, None).await.unwrap();
    }
    (engine, store)
}

async fn send(engine: &CoinEngine, sender_id: i64, recipient_id: i64, price: i64) {
    engine
        .send_gift(SendGiftRequest {
            sender_id,
            recipient_id,
            gift_id: "star".to_string(),
            gift_name: "Star".to_string(),
            price,
            message: None,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_leaderboards_rank_by_coins() {
    let (engine, _store) = setup_engine().await;
    send(&engine, 1, 2, 100).await;
    send(&engine, 1, 3, 100).await;
    send(&engine, 2, 3, 500).await;

    let senders = engine
        .analytics()
        .top_senders(ChronoDuration::days(7), 10)
        .await
        .unwrap();
    assert_eq!(senders[0].user_id, 2);
    assert_eq!(senders[0].total_coins, 500);
    assert_eq!(senders[1].user_id, 1);
    assert_eq!(senders[1].total_coins, 200);
    assert_eq!(senders[1].gift_count, 2);
    assert_eq!(senders[1].display_name, "Ann");

    let receivers = engine
        .analytics()
        .top_receivers(ChronoDuration::days(7), 1)
        .await
        .unwrap();
    assert_eq!(receivers.len(), 1);
    assert_eq!(receivers[0].user_id, 3);
    // 70 + 350 net of commission
    assert_eq!(receivers[0].total_coins, 420);
}

#[tokio::test]
async fn test_commission_summary_periods() {
    let (engine, _store) = setup_engine().await;
    send(&engine, 1, 2, 100).await;
    send(&engine, 2, 3, 33).await;

    let summary = engine.analytics().commission_summary().await.unwrap();

    for totals in [summary.today, summary.week, summary.month, summary.all_time] {
        assert_eq!(totals.commission, 39);
        assert_eq!(totals.gross, 133);
        assert_eq!(totals.gift_count, 2);
    }
}

#[tokio::test]
async fn test_top_content_by_unlocks() {
    let (engine, store) = setup_engine().await;
    store
        .insert_content(Content::premium(10, "Drama A", ContentKind::Drama))
        .await;
    store
        .insert_content(Content::premium(11, "Drama B", ContentKind::Drama))
        .await;

    engine.unlock_content(1, 11).await.unwrap();
    engine.unlock_content(2, 11).await.unwrap();
    engine.unlock_content(3, 10).await.unwrap();

    let top = engine.analytics().top_content(5).await.unwrap();
    assert_eq!(top[0].content_id, 11);
    assert_eq!(top[0].revenue, 198);
    assert_eq!(top[1].content_id, 10);
}

#[tokio::test(start_paused = true)]
async fn test_cache_refreshes_in_background() {
    let (engine, _store) = setup_engine().await;
    let cache = Arc::new(LeaderboardCache::new(
        engine.analytics().clone(),
        ChronoDuration::days(7),
        10,
    ));

    let task = cache.clone().spawn_refresh(Duration::from_secs(60));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(cache.snapshot().await.top_senders.is_empty());

    send(&engine, 1, 2, 100).await;
    tokio::time::sleep(Duration::from_secs(61)).await;

    let snapshot = cache.snapshot().await;
    assert_eq!(snapshot.top_senders.len(), 1);
    assert_eq!(snapshot.top_receivers[0].user_id, 2);
    task.abort();
}
