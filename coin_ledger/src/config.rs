//! Engine configuration.
//!
//! Consolidates the business constants the coordinators depend on: commission
//! rate, unlock prices per content class, unit-of-work time budget.

use std::str::FromStr;
use std::time::Duration;

use crate::db::timeouts::DEFAULT_TRANSACTION_TIMEOUT;
use crate::gift::CommissionRate;
use crate::unlock::UnlockPricing;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Fraction of each gift price retained by the platform
    pub commission_rate: CommissionRate,
    /// Unlock prices per content class
    pub unlock_pricing: UnlockPricing,
    /// Budget for each balance-mutating unit of work
    pub transaction_timeout: Duration,
    /// Upper bound for ledger page sizes
    pub max_ledger_page: i64,
    /// Wallet that receives gift commission, if the platform keeps one
    pub platform_wallet_user_id: Option<i64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            commission_rate: CommissionRate::default(),
            unlock_pricing: UnlockPricing::default(),
            transaction_timeout: DEFAULT_TRANSACTION_TIMEOUT,
            max_ledger_page: 200,
            platform_wallet_user_id: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    ///
    /// - `COMMISSION_RATE_BPS`: platform share in basis points (default: 3000)
    /// - `UNLOCK_COST_DRAMA`: coins to unlock a drama (default: 99)
    /// - `UNLOCK_COST_EPISODE`: coins to unlock an episode (default: 10)
    /// - `TRANSACTION_TIMEOUT_MS`: unit-of-work budget (default: 10000)
    /// - `MAX_LEDGER_PAGE`: ledger page size cap (default: 200)
    /// - `PLATFORM_WALLET_USER_ID`: treasury wallet for commission (optional)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let platform_wallet_user_id = match std::env::var("PLATFORM_WALLET_USER_ID") {
            Ok(raw) => Some(raw.parse().map_err(|_| ConfigError::Invalid {
                var: "PLATFORM_WALLET_USER_ID".to_string(),
                reason: format!("'{raw}' is not a user id"),
            })?),
            Err(_) => None,
        };

        let config = Self {
            commission_rate: CommissionRate::from_bps(parse_env(
                "COMMISSION_RATE_BPS",
                defaults.commission_rate.bps(),
            )?),
            unlock_pricing: UnlockPricing {
                drama: parse_env("UNLOCK_COST_DRAMA", defaults.unlock_pricing.drama)?,
                episode: parse_env("UNLOCK_COST_EPISODE", defaults.unlock_pricing.episode)?,
            },
            transaction_timeout: Duration::from_millis(parse_env(
                "TRANSACTION_TIMEOUT_MS",
                defaults.transaction_timeout.as_millis() as u64,
            )?),
            max_ledger_page: parse_env("MAX_LEDGER_PAGE", defaults.max_ledger_page)?,
            platform_wallet_user_id,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.commission_rate.bps() >= CommissionRate::DENOMINATOR {
            return Err(ConfigError::Invalid {
                var: "COMMISSION_RATE_BPS".to_string(),
                reason: format!(
                    "Must be below {} so recipients always receive coins",
                    CommissionRate::DENOMINATOR
                ),
            });
        }

        if self.unlock_pricing.drama <= 0 {
            return Err(ConfigError::Invalid {
                var: "UNLOCK_COST_DRAMA".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.unlock_pricing.episode <= 0 {
            return Err(ConfigError::Invalid {
                var: "UNLOCK_COST_EPISODE".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.transaction_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                var: "TRANSACTION_TIMEOUT_MS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.max_ledger_page < 1 {
            return Err(ConfigError::Invalid {
                var: "MAX_LEDGER_PAGE".to_string(),
                reason: "Must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Parse an environment variable, falling back to `default` when unset.
///
/// A variable that is set but unparsable is an error rather than a silent
/// fallback.
pub fn parse_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            var: key.to_string(),
            reason: format!("'{raw}' does not parse"),
        }),
        Err(_) => Ok(default),
    }
}
