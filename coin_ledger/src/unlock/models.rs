//! Content unlock data models.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::errors::LedgerError;

/// Content class; unlock prices are configured per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Drama,
    Episode,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Drama => "drama",
            ContentKind::Episode => "episode",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "drama" => Ok(ContentKind::Drama),
            "episode" => Ok(ContentKind::Episode),
            other => Err(LedgerError::Storage(format!("unknown content kind '{other}'"))),
        }
    }
}

/// Content item as seen by the engine (`content_items` row).
///
/// Owned by the catalog service; the engine only bumps `unlock_count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub id: i64,
    pub title: String,
    pub kind: ContentKind,
    /// Requires a coin unlock before viewing
    pub is_premium: bool,
    pub is_active: bool,
    pub view_count: i64,
    /// Monotonic; one per successful paid unlock
    pub unlock_count: i64,
}

impl Content {
    /// Active premium item with zeroed counters.
    pub fn premium(id: i64, title: impl Into<String>, kind: ContentKind) -> Self {
        Self {
            id,
            title: title.into(),
            kind,
            is_premium: true,
            is_active: true,
            view_count: 0,
            unlock_count: 0,
        }
    }
}

/// Unlock price per content class, in coins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockPricing {
    pub drama: i64,
    pub episode: i64,
}

impl UnlockPricing {
    pub fn cost_for(&self, kind: ContentKind) -> i64 {
        match kind {
            ContentKind::Drama => self.drama,
            ContentKind::Episode => self.episode,
        }
    }
}

impl Default for UnlockPricing {
    fn default() -> Self {
        Self {
            drama: 99,
            episode: 10,
        }
    }
}

/// Result of an unlock request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UnlockOutcome {
    /// Coins were debited and the entitlement granted.
    Unlocked {
        balance: i64,
        entry_id: i64,
        unlock_count: i64,
    },
    /// The user already owned the item; nothing was charged.
    AlreadyUnlocked { balance: i64 },
}

impl UnlockOutcome {
    /// True only when this call granted the entitlement.
    pub fn unlocked(&self) -> bool {
        matches!(self, UnlockOutcome::Unlocked { .. })
    }

    pub fn balance(&self) -> i64 {
        match self {
            UnlockOutcome::Unlocked { balance, .. } | UnlockOutcome::AlreadyUnlocked { balance } => {
                *balance
            }
        }
    }
}
