/// Property-based tests for the ledger using proptest
///
/// These tests verify commission arithmetic for arbitrary prices and rates,
/// and that arbitrary interleavings of credits, gifts and unlocks keep every
/// wallet non-negative and reconciled with its ledger.
use coin_ledger::gift::CommissionRate;
use coin_ledger::store::{LedgerStore, MemoryLedgerStore};
use coin_ledger::unlock::{Content, ContentKind};
use coin_ledger::wallet::UserProfile;
use coin_ledger::{CoinEngine, EngineConfig, SendGiftRequest};
use proptest::prelude::*;
use std::sync::Arc;

const USERS: [i64; 3] = [1, 2, 3];
const PLATFORM: i64 = 99;
const CONTENT: [i64; 2] = [10, 11];

#[derive(Debug, Clone)]
enum Op {
    Credit { user: usize, amount: i64 },
    Gift { from: usize, to: usize, price: i64 },
    Unlock { user: usize, content: usize },
}

// Strategy to generate one ledger operation
fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..3, 1i64..500).prop_map(|(user, amount)| Op::Credit { user, amount }),
        (0usize..3, 0usize..3, 1i64..300).prop_map(|(from, to, price)| Op::Gift { from, to, price }),
        (0usize..3, 0usize..2).prop_map(|(user, content)| Op::Unlock { user, content }),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

async fn run_ops(ops: Vec<Op>, with_platform: bool) -> (MemoryLedgerStore, CoinEngine, i64) {
    let store = MemoryLedgerStore::new();
    for id in USERS.iter().copied().chain([PLATFORM]) {
        store
            .insert_user(UserProfile::new(id, format!("u{id}"), format!("User {id}")))
            .await;
    }
    store
        .insert_content(Content::premium(CONTENT[0], "Drama", ContentKind::Drama))
        .await;
    store
        .insert_content(Content::premium(CONTENT[1], "Episode", ContentKind::Episode))
        .await;

    let config = EngineConfig {
        platform_wallet_user_id: with_platform.then_some(PLATFORM),
        ..EngineConfig::default()
    };
    let engine = CoinEngine::new(Arc::new(store.clone()), config);

    // Coins expected in circulation
    let mut expected = 0i64;
    for op in ops {
        match op {
            Op::Credit { user, amount } => {
                engine
                    .wallets()
                    .admin_credit(USERS[user], amount, None)
                    .await
                    .unwrap();
                expected += amount;
            }
            Op::Gift { from, to, price } => {
                let result = engine
                    .send_gift(SendGiftRequest {
                        sender_id: USERS[from],
                        recipient_id: USERS[to],
                        gift_id: "g".to_string(),
                        gift_name: "Gift".to_string(),
                        price,
                        message: None,
                    })
                    .await;
                match result {
                    Ok(receipt) if !with_platform => expected -= receipt.transfer.commission,
                    _ => {}
                }
            }
            Op::Unlock { user, content } => {
                let result = engine.unlock_content(USERS[user], CONTENT[content]).await;
                if result.is_ok_and(|outcome| outcome.unlocked()) {
                    let cost = match content {
                        0 => engine.config().unlock_pricing.drama,
                        _ => engine.config().unlock_pricing.episode,
                    };
                    expected -= cost;
                }
            }
        }
    }

    (store, engine, expected)
}

proptest! {
    #[test]
    fn test_split_conserves_price(price in 1i64..i64::MAX, bps in 0u32..10_000) {
        let split = CommissionRate::from_bps(bps).split(price).unwrap();

        prop_assert_eq!(split.recipient_amount + split.commission, price);
        prop_assert!(split.commission >= 0);
        prop_assert!(split.recipient_amount >= 1, "recipient must receive at least one coin");
    }

    #[test]
    fn test_commission_never_exceeds_rate(price in 1i64..1_000_000, bps in 0u32..10_000) {
        let split = CommissionRate::from_bps(bps).split(price).unwrap();

        // floor(price * bps / 10000) <= exact share < floor + 1
        let exact = i128::from(price) * i128::from(bps);
        prop_assert!(i128::from(split.commission) * 10_000 <= exact);
        prop_assert!((i128::from(split.commission) + 1) * 10_000 > exact);
    }

    #[test]
    fn test_random_operations_reconcile(
        ops in prop::collection::vec(op_strategy(), 1..40),
        with_platform in any::<bool>(),
    ) {
        let rt = runtime();
        let (store, engine, expected) = rt.block_on(run_ops(ops, with_platform));

        prop_assert_eq!(rt.block_on(store.total_balance()), expected);

        for user_id in USERS.iter().copied().chain([PLATFORM]) {
            if let Some(wallet) = rt.block_on(store.wallet(user_id)).unwrap() {
                prop_assert!(wallet.balance >= 0);
                let audit = rt.block_on(engine.analytics().reconcile_wallet(user_id)).unwrap();
                prop_assert!(audit.is_consistent(), "wallet {} inconsistent: {:?}", user_id, audit);
            }
        }
    }
}
