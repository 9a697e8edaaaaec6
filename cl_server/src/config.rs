//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use coin_ledger::config::parse_env;
use coin_ledger::db::DatabaseConfig;
use coin_ledger::{ConfigError, EngineConfig};
use std::net::SocketAddr;
use std::time::Duration;

/// Shortest admin token accepted at startup
const MIN_ADMIN_TOKEN_LEN: usize = 24;

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP bind address
    pub bind: SocketAddr,
    /// Prometheus scrape address, `None` disables the exporter
    pub metrics_bind: Option<SocketAddr>,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Ledger engine configuration
    pub engine: EngineConfig,
    /// Shared secret for `/api/v1/admin` routes (required)
    pub admin_token: String,
    /// Leaderboard cache settings
    pub leaderboard: LeaderboardConfig,
}

/// Longest leaderboard window accepted
const MAX_WINDOW_DAYS: i64 = 3650;

/// Leaderboard cache configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaderboardConfig {
    /// Seconds between background refreshes
    pub refresh_secs: u64,
    /// Trailing window in days
    pub window_days: i64,
    /// Entries per board
    pub limit: i64,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            refresh_secs: 60,
            window_days: 7,
            limit: 20,
        }
    }
}

impl LeaderboardConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }

    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::days(self.window_days)
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(addr) => addr,
            None => parse_socket_addr("SERVER_BIND", "127.0.0.1:8080")?,
        };

        let metrics_bind = match std::env::var("METRICS_BIND") {
            Ok(raw) if raw.trim().is_empty() || raw.trim() == "off" => None,
            Ok(_) => Some(parse_socket_addr("METRICS_BIND", "")?),
            Err(_) => Some(parse_socket_addr("METRICS_BIND", "127.0.0.1:9090")?),
        };

        let database = match database_url_override {
            Some(database_url) => {
                let defaults = DatabaseConfig::default();
                DatabaseConfig {
                    database_url,
                    max_connections: parse_env("DB_MAX_CONNECTIONS", defaults.max_connections)?,
                    min_connections: parse_env("DB_MIN_CONNECTIONS", defaults.min_connections)?,
                    connection_timeout_secs: parse_env(
                        "DB_CONNECTION_TIMEOUT_SECS",
                        defaults.connection_timeout_secs,
                    )?,
                    idle_timeout_secs: parse_env("DB_IDLE_TIMEOUT_SECS", defaults.idle_timeout_secs)?,
                    max_lifetime_secs: parse_env("DB_MAX_LIFETIME_SECS", defaults.max_lifetime_secs)?,
                }
            }
            None => DatabaseConfig::from_env()?,
        };

        let admin_token = std::env::var("ADMIN_TOKEN").map_err(|_| ConfigError::MissingRequired {
            var: "ADMIN_TOKEN".to_string(),
            hint: "Generate one with: openssl rand -hex 32".to_string(),
        })?;

        let defaults = LeaderboardConfig::default();
        let leaderboard = LeaderboardConfig {
            refresh_secs: parse_env("LEADERBOARD_REFRESH_SECS", defaults.refresh_secs)?,
            window_days: parse_env("LEADERBOARD_WINDOW_DAYS", defaults.window_days)?,
            limit: parse_env("LEADERBOARD_LIMIT", defaults.limit)?,
        };

        let config = Self {
            bind,
            metrics_bind,
            database,
            engine: EngineConfig::from_env()?,
            admin_token,
            leaderboard,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.admin_token.len() < MIN_ADMIN_TOKEN_LEN {
            return Err(ConfigError::Invalid {
                var: "ADMIN_TOKEN".to_string(),
                reason: format!("Must be at least {MIN_ADMIN_TOKEN_LEN} characters"),
            });
        }

        if self.metrics_bind == Some(self.bind) {
            return Err(ConfigError::Invalid {
                var: "METRICS_BIND".to_string(),
                reason: "Must differ from SERVER_BIND".to_string(),
            });
        }

        if self.leaderboard.refresh_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "LEADERBOARD_REFRESH_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if !(1..=MAX_WINDOW_DAYS).contains(&self.leaderboard.window_days) {
            return Err(ConfigError::Invalid {
                var: "LEADERBOARD_WINDOW_DAYS".to_string(),
                reason: format!("Must be between 1 and {MAX_WINDOW_DAYS}"),
            });
        }

        if !(1..=100).contains(&self.leaderboard.limit) {
            return Err(ConfigError::Invalid {
                var: "LEADERBOARD_LIMIT".to_string(),
                reason: "Must be between 1 and 100".to_string(),
            });
        }

        self.database.validate()?;
        self.engine.validate()
    }
}

fn parse_socket_addr(var: &str, default: &str) -> Result<SocketAddr, ConfigError> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        var: var.to_string(),
        reason: format!("'{raw}' is not an IP:PORT address"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ServerConfig {
        ServerConfig {
            bind: "127.0.0.1:8080".parse().unwrap(),
            metrics_bind: Some("127.0.0.1:9090".parse().unwrap()),
            database: DatabaseConfig {
                database_url: "test".to_string(),
                max_connections: 10,
                min_connections: 1,
                connection_timeout_secs: 5,
                idle_timeout_secs: 300,
                max_lifetime_secs: 1800,
            },
            engine: EngineConfig::default(),
            admin_token: "a".repeat(32),
            leaderboard: LeaderboardConfig::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_short_admin_token_rejected() {
        let config = ServerConfig {
            admin_token: "changeme".to_string(),
            ..valid_config()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ADMIN_TOKEN"));
    }

    #[test]
    fn test_metrics_on_same_port_rejected() {
        let config = ServerConfig {
            metrics_bind: Some("127.0.0.1:8080".parse().unwrap()),
            ..valid_config()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_metrics_disabled_is_valid() {
        let config = ServerConfig {
            metrics_bind: None,
            ..valid_config()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_leaderboard_limit_bounds() {
        let mut config = valid_config();
        config.leaderboard.limit = 0;
        assert!(config.validate().is_err());

        config.leaderboard.limit = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_leaderboard_window_bounds() {
        let mut config = valid_config();
        config.leaderboard.window_days = 0;
        assert!(config.validate().is_err());

        config.leaderboard.window_days = i64::MAX / 2;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("LEADERBOARD_WINDOW_DAYS"));

        config.leaderboard.window_days = MAX_WINDOW_DAYS;
        assert!(config.validate().is_ok());
        assert_eq!(config.leaderboard.window().num_days(), MAX_WINDOW_DAYS);
    }

    #[test]
    fn test_engine_config_checked() {
        let mut config = valid_config();
        config.engine.max_ledger_page = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("MAX_LEDGER_PAGE"));
    }

    #[test]
    fn test_leaderboard_durations() {
        let leaderboard = LeaderboardConfig::default();
        assert_eq!(leaderboard.refresh_interval(), Duration::from_secs(60));
        assert_eq!(leaderboard.window(), chrono::Duration::days(7));
    }
}
