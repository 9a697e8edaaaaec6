//! Coin ledger server.
//!
//! Serves the ledger API over a PostgreSQL-backed engine and refreshes the
//! leaderboard cache in the background.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Error;
use cl_server::{api, config::ServerConfig, logging, metrics};
use coin_ledger::analytics::LeaderboardCache;
use coin_ledger::db::Database;
use coin_ledger::store::PgLedgerStore;
use coin_ledger::CoinEngine;
use pico_args::Arguments;
use tracing::info;

const HELP: &str = "\
Run the coin ledger server

USAGE:
  cl_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:8080]
  --db-url     URL         Database connection string  [default: env DATABASE_URL]

FLAGS:
  -h, --help               Print help information
  --skip-migrations        Do not apply pending migrations on startup

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  METRICS_BIND             Prometheus listener (default 127.0.0.1:9090, 'off' to disable)
  DATABASE_URL             PostgreSQL connection string
  ADMIN_TOKEN              Secret for /api/v1/admin routes (required)
  COMMISSION_RATE_BPS      Gift commission in basis points (default 3000)
  PLATFORM_WALLET_USER_ID  Wallet credited with gift commission (optional)
  UNLOCK_COST_DRAMA        Coins to unlock a drama (default 99)
  UNLOCK_COST_EPISODE      Coins to unlock an episode (default 10)
  TRANSACTION_TIMEOUT_MS   Budget per ledger unit of work (default 10000)
  LEADERBOARD_REFRESH_SECS Leaderboard cache refresh interval (default 60)
  DB_MAX_CONNECTIONS       Pool size (default 20)
";

struct Args {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
    skip_migrations: bool,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        bind: pargs.opt_value_from_str("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
        skip_migrations: pargs.contains("--skip-migrations"),
    };

    logging::init();

    let config = ServerConfig::from_env(args.bind, args.database_url)?;

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(|e| anyhow::anyhow!(e))?;
        info!("Prometheus metrics listening on {}", addr);
    }

    let db = Database::new(&config.database)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
    info!("Database connected successfully");

    if !args.skip_migrations {
        db.migrate()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;
        info!("Migrations applied");
    }

    let pool = Arc::new(db.pool().clone());
    let engine = Arc::new(CoinEngine::new(
        Arc::new(PgLedgerStore::new(pool)),
        config.engine.clone(),
    ));

    info!(
        commission_bps = config.engine.commission_rate.bps(),
        platform_wallet = ?config.engine.platform_wallet_user_id,
        "Coin engine ready"
    );

    let leaderboard = Arc::new(LeaderboardCache::new(
        engine.analytics().clone(),
        config.leaderboard.window(),
        config.leaderboard.limit,
    ));
    let refresh_task = leaderboard
        .clone()
        .spawn_refresh(config.leaderboard.refresh_interval());

    let state = api::AppState {
        engine,
        leaderboard,
        admin_token: Arc::from(config.admin_token.as_str()),
    };
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", config.bind, e))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Shutting down server...");
    refresh_task.abort();
    db.close().await;

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
