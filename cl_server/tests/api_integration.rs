//! HTTP integration tests against an in-memory ledger.
//!
//! Requests go through the full router (identity, admin gate, error mapping)
//! with `oneshot`, so no socket or database is needed.

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use chrono::Duration as ChronoDuration;
use cl_server::api::{AppState, create_router};
use coin_ledger::analytics::LeaderboardCache;
use coin_ledger::store::MemoryLedgerStore;
use coin_ledger::unlock::{Content, ContentKind};
use coin_ledger::wallet::UserProfile;
use coin_ledger::{CoinEngine, EngineConfig};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt; // For `oneshot` method

const ADMIN_TOKEN: &str = "test-admin-token-0123456789abcdef";

const ALICE: i64 = 1;
const BOB: i64 = 2;
const DRAMA: i64 = 40;
const FREE_EPISODE: i64 = 41;

struct TestServer {
    app: Router,
    store: MemoryLedgerStore,
    leaderboard: Arc<LeaderboardCache>,
}

async fn create_test_server(config: EngineConfig) -> TestServer {
    let store = MemoryLedgerStore::new();
    store.insert_user(UserProfile::new(ALICE, "alice", "Alice")).await;
    store.insert_user(UserProfile::new(BOB, "bob", "Bob")).await;
    store
        .insert_content(Content::premium(DRAMA, "Second Chance", ContentKind::Drama))
        .await;
    store
        .insert_content(Content {
            is_premium: false,
            ..Content::premium(FREE_EPISODE, "Pilot", ContentKind::Episode)
        })
        .await;

    let engine = Arc::new(CoinEngine::new(Arc::new(store.clone()), config));
    let leaderboard = Arc::new(LeaderboardCache::new(
        engine.analytics().clone(),
        ChronoDuration::days(7),
        10,
    ));

    let app = create_router(AppState {
        engine,
        leaderboard: leaderboard.clone(),
        admin_token: Arc::from(ADMIN_TOKEN),
    });

    TestServer {
        app,
        store,
        leaderboard,
    }
}

async fn setup() -> TestServer {
    create_test_server(EngineConfig::default()).await
}

fn get(uri: &str, user_id: Option<i64>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(id) = user_id {
        builder = builder.header("x-user-id", id.to_string());
    }
    builder.body(Body::empty()).unwrap()
}

fn post(uri: &str, user_id: Option<i64>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(id) = user_id {
        builder = builder.header("x-user-id", id.to_string());
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn as_admin(mut request: Request<Body>) -> Request<Body> {
    request
        .headers_mut()
        .insert("x-admin-token", ADMIN_TOKEN.parse().unwrap());
    request
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, body)
}

async fn admin_credit(app: &Router, user_id: i64, amount: i64) {
    let (status, _, _) = send(
        app,
        as_admin(post(
            &format!("/api/v1/admin/wallets/{user_id}/credit"),
            None,
            json!({ "amount": amount }),
        )),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

fn rose(recipient_id: i64, price: i64) -> Value {
    json!({
        "recipient_id": recipient_id,
        "gift_id": "rose",
        "gift_name": "Rose",
        "price": price,
    })
}

// ============================================================================
// Health and identity
// ============================================================================

#[tokio::test]
async fn test_health_check_endpoint() {
    let server = setup().await;

    let response = server.app.clone().oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn test_request_id_echoed() {
    let server = setup().await;

    let mut request = get("/health", None);
    request
        .headers_mut()
        .insert("x-request-id", "trace-abc".parse().unwrap());
    let (_, headers, _) = send(&server.app, request).await;
    assert_eq!(headers["x-request-id"], "trace-abc");

    let (_, headers, _) = send(&server.app, get("/health", None)).await;
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_wallet_requires_caller() {
    let server = setup().await;

    let (status, _, body) = send(&server.app, get("/api/v1/wallet", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");
}

#[tokio::test]
async fn test_wallet_created_on_first_view() {
    let server = setup().await;

    let (status, _, body) = send(&server.app, get("/api/v1/wallet", Some(BOB))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], 0);
    assert_eq!(body["user_id"], BOB);
}

// ============================================================================
// Gifts
// ============================================================================

#[tokio::test]
async fn test_gift_moves_coins_and_commission() {
    let server = setup().await;
    admin_credit(&server.app, ALICE, 500).await;

    let (status, _, receipt) =
        send(&server.app, post("/api/v1/gifts", Some(ALICE), rose(BOB, 100))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["sender_balance"], 400);
    assert_eq!(receipt["recipient_balance"], 70);
    assert_eq!(receipt["transfer"]["commission"], 30);

    let (_, _, ledger) = send(&server.app, get("/api/v1/wallet/ledger?limit=1", Some(BOB))).await;
    assert_eq!(ledger.as_array().unwrap().len(), 1);
    assert_eq!(ledger[0]["amount"], 70);
}

#[tokio::test]
async fn test_gift_insufficient_funds_is_402() {
    let server = setup().await;
    admin_credit(&server.app, ALICE, 50).await;

    let (status, _, body) =
        send(&server.app, post("/api/v1/gifts", Some(ALICE), rose(BOB, 100))).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["code"], "insufficient_funds");

    let (_, _, wallet) = send(&server.app, get("/api/v1/wallet", Some(ALICE))).await;
    assert_eq!(wallet["balance"], 50);
}

#[tokio::test]
async fn test_gift_validation_errors() {
    let server = setup().await;
    admin_credit(&server.app, ALICE, 500).await;

    let (status, _, _) =
        send(&server.app, post("/api/v1/gifts", Some(ALICE), rose(ALICE, 100))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(&server.app, post("/api/v1/gifts", Some(ALICE), rose(BOB, 0))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, body) =
        send(&server.app, post("/api/v1/gifts", Some(ALICE), rose(77, 100))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Recipient not found");
}

#[tokio::test]
async fn test_gift_lookup_limited_to_parties() {
    let server = setup().await;
    admin_credit(&server.app, ALICE, 500).await;

    let (_, _, receipt) = send(&server.app, post("/api/v1/gifts", Some(ALICE), rose(BOB, 100))).await;
    let uri = format!("/api/v1/gifts/{}", receipt["transfer"]["id"].as_str().unwrap());

    for party in [ALICE, BOB] {
        let (status, _, transfer) = send(&server.app, get(&uri, Some(party))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(transfer["recipient_amount"], 70);
    }

    let (status, _, body) = send(&server.app, get(&uri, Some(3))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "gift_not_found");

    let (status, _, body) = send(&server.app, get("/api/v1/gifts/not-a-uuid", Some(ALICE))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");
}

#[tokio::test]
async fn test_timeout_maps_to_503_with_retry_after() {
    let server = create_test_server(EngineConfig {
        transaction_timeout: Duration::from_millis(50),
        ..EngineConfig::default()
    })
    .await;
    admin_credit(&server.app, ALICE, 500).await;

    server.store.set_commit_delay(Some(Duration::from_millis(500)));
    let (status, headers, body) =
        send(&server.app, post("/api/v1/gifts", Some(ALICE), rose(BOB, 100))).await;
    server.store.set_commit_delay(None);

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(headers["retry-after"], "1");
    assert_eq!(body["code"], "timeout");

    let (_, _, wallet) = send(&server.app, get("/api/v1/wallet", Some(ALICE))).await;
    assert_eq!(wallet["balance"], 500);
}

// ============================================================================
// Unlocks
// ============================================================================

#[tokio::test]
async fn test_unlock_charges_once() {
    let server = setup().await;
    admin_credit(&server.app, ALICE, 200).await;
    let uri = format!("/api/v1/content/{DRAMA}/unlock");

    let (status, _, first) = send(&server.app, post(&uri, Some(ALICE), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["outcome"], "unlocked");
    assert_eq!(first["balance"], 101);

    let (status, _, second) = send(&server.app, post(&uri, Some(ALICE), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["outcome"], "already_unlocked");
    assert_eq!(second["balance"], 101);
}

#[tokio::test]
async fn test_unlock_errors() {
    let server = setup().await;
    admin_credit(&server.app, ALICE, 50).await;

    let (status, _, _) = send(
        &server.app,
        post(&format!("/api/v1/content/{DRAMA}/unlock"), Some(ALICE), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);

    let (status, _, _) = send(
        &server.app,
        post(&format!("/api/v1/content/{FREE_EPISODE}/unlock"), Some(ALICE), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _, _) = send(
        &server.app,
        post("/api/v1/content/999/unlock", Some(ALICE), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Purchases and admin
// ============================================================================

#[tokio::test]
async fn test_purchase_approval_flow() {
    let server = setup().await;
    let order = json!({ "coin_amount": 1000, "paid_amount": 999, "payment_reference": "txn_001" });

    let (status, _, request) =
        send(&server.app, post("/api/v1/purchases", Some(BOB), order.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(request["status"], "pending");
    let id = request["id"].as_i64().unwrap();

    let (status, _, body) = send(&server.app, post("/api/v1/purchases", Some(ALICE), order)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "duplicate_payment_reference");

    let (status, _, queue) = send(
        &server.app,
        as_admin(get("/api/v1/admin/purchases?status=pending", None)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(queue.as_array().unwrap().len(), 1);

    let approve_uri = format!("/api/v1/admin/purchases/{id}/approve");
    let (status, _, approval) = send(
        &server.app,
        as_admin(post(&approve_uri, None, json!({ "note": "verified" }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approval["new_balance"], 1000);
    assert_eq!(approval["request"]["status"], "approved");

    let (status, _, body) = send(&server.app, as_admin(post(&approve_uri, None, json!({})))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "already_processed");

    let (_, _, mine) = send(&server.app, get("/api/v1/purchases/mine", Some(BOB))).await;
    assert_eq!(mine[0]["status"], "approved");

    let (_, _, wallet) = send(&server.app, get("/api/v1/wallet", Some(BOB))).await;
    assert_eq!(wallet["balance"], 1000);
}

#[tokio::test]
async fn test_admin_routes_require_token() {
    let server = setup().await;

    let (status, _, _) = send(&server.app, get("/api/v1/admin/purchases", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut request = post(
        &format!("/api/v1/admin/wallets/{ALICE}/credit"),
        Some(ALICE),
        json!({ "amount": 1_000_000 }),
    );
    request
        .headers_mut()
        .insert("x-admin-token", "guess".parse().unwrap());
    let (status, _, _) = send(&server.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, _, wallet) = send(&server.app, get("/api/v1/wallet", Some(ALICE))).await;
    assert_eq!(wallet["balance"], 0);
}

#[tokio::test]
async fn test_reject_and_reconcile() {
    let server = setup().await;
    admin_credit(&server.app, ALICE, 300).await;

    let (_, _, request) = send(
        &server.app,
        post(
            "/api/v1/purchases",
            Some(ALICE),
            json!({ "coin_amount": 100, "paid_amount": 100, "payment_reference": "txn_rej" }),
        ),
    )
    .await;
    let id = request["id"].as_i64().unwrap();

    let (status, _, rejected) = send(
        &server.app,
        as_admin(post(
            &format!("/api/v1/admin/purchases/{id}/reject"),
            None,
            json!({ "note": "chargeback" }),
        )),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["status"], "rejected");
    assert_eq!(rejected["admin_note"], "chargeback");

    let (status, _, audit) = send(
        &server.app,
        as_admin(get(&format!("/api/v1/admin/wallets/{ALICE}/reconcile"), None)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(audit["balance"], 300);
    assert_eq!(audit["ledger_sum"], 300);

    let (status, _, _) = send(
        &server.app,
        as_admin(get("/api/v1/admin/wallets/77/reconcile", None)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_resolve_without_body() {
    let server = setup().await;
    let mut ids = Vec::new();
    for reference in ["txn_a", "txn_b"] {
        let (_, _, request) = send(
            &server.app,
            post(
                "/api/v1/purchases",
                Some(BOB),
                json!({ "coin_amount": 50, "paid_amount": 50, "payment_reference": reference }),
            ),
        )
        .await;
        ids.push(request["id"].as_i64().unwrap());
    }

    let bare = |uri: String| {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    };

    let (status, _, approval) = send(
        &server.app,
        as_admin(bare(format!("/api/v1/admin/purchases/{}/approve", ids[0]))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approval["new_balance"], 50);
    assert_eq!(approval["request"]["admin_note"], Value::Null);

    let (status, _, rejected) = send(
        &server.app,
        as_admin(bare(format!("/api/v1/admin/purchases/{}/reject", ids[1]))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["status"], "rejected");

    let (_, _, mine) = send(&server.app, get("/api/v1/purchases/mine", Some(BOB))).await;
    assert_eq!(mine[0]["id"], ids[1]);
    assert_eq!(mine[1]["id"], ids[0]);
}

// ============================================================================
// Analytics
// ============================================================================

#[tokio::test]
async fn test_leaderboard_served_from_cache() {
    let server = setup().await;
    admin_credit(&server.app, ALICE, 500).await;
    send(&server.app, post("/api/v1/gifts", Some(ALICE), rose(BOB, 100))).await;

    let (_, _, stale) = send(&server.app, get("/api/v1/analytics/leaderboard", None)).await;
    assert!(stale["top_senders"].as_array().unwrap().is_empty());

    server.leaderboard.refresh().await.unwrap();

    let (status, _, board) = send(&server.app, get("/api/v1/analytics/leaderboard", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(board["top_senders"][0]["user_id"], ALICE);
    assert_eq!(board["top_senders"][0]["total_coins"], 100);
    assert_eq!(board["top_receivers"][0]["total_coins"], 70);
}

#[tokio::test]
async fn test_commission_and_content_reports() {
    let server = setup().await;
    admin_credit(&server.app, ALICE, 500).await;
    send(&server.app, post("/api/v1/gifts", Some(ALICE), rose(BOB, 100))).await;
    send(
        &server.app,
        post(&format!("/api/v1/content/{DRAMA}/unlock"), Some(ALICE), json!({})),
    )
    .await;

    let (status, _, summary) = send(&server.app, get("/api/v1/analytics/commission", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["today"]["commission"], 30);
    assert_eq!(summary["all_time"]["gift_count"], 1);

    let (status, _, revenue) = send(
        &server.app,
        get(&format!("/api/v1/analytics/content/{DRAMA}"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(revenue["unlock_count"], 1);
    assert_eq!(revenue["revenue"], 99);
}
