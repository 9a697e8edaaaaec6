//! Wallet data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::errors::LedgerError;

/// User profile as seen by the engine.
///
/// Owned by the identity service; the engine only reads it and bumps the
/// best-effort gift statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub is_active: bool,
    pub coins_sent: i64,
    pub coins_received: i64,
}

impl UserProfile {
    /// Active profile with zeroed statistics.
    pub fn new(id: i64, username: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            display_name: display_name.into(),
            is_active: true,
            coins_sent: 0,
            coins_received: 0,
        }
    }
}

/// Wallet model. The wallet id is the owner's user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub wallet_id: i64,
    pub user_id: i64,
    pub owner_name: String,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ledger entry kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Credit,
    Debit,
    Commission,
    Purchase,
    Unlock,
    GiftSent,
    GiftReceived,
    AdminCredit,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Credit => "credit",
            EntryKind::Debit => "debit",
            EntryKind::Commission => "commission",
            EntryKind::Purchase => "purchase",
            EntryKind::Unlock => "unlock",
            EntryKind::GiftSent => "gift_sent",
            EntryKind::GiftReceived => "gift_received",
            EntryKind::AdminCredit => "admin_credit",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit" => Ok(EntryKind::Credit),
            "debit" => Ok(EntryKind::Debit),
            "commission" => Ok(EntryKind::Commission),
            "purchase" => Ok(EntryKind::Purchase),
            "unlock" => Ok(EntryKind::Unlock),
            "gift_sent" => Ok(EntryKind::GiftSent),
            "gift_received" => Ok(EntryKind::GiftReceived),
            "admin_credit" => Ok(EntryKind::AdminCredit),
            other => Err(LedgerError::Storage(format!("unknown entry kind '{other}'"))),
        }
    }
}

/// Immutable ledger entry (`wallet_transactions` row)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub wallet_id: i64,
    pub user_id: i64,
    pub kind: EntryKind,
    /// Signed: negative for debits
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub description: String,
    pub reference_id: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Ledger entry about to be appended.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerEntry {
    pub user_id: i64,
    pub kind: EntryKind,
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub description: String,
    pub reference_id: Option<String>,
    pub metadata: serde_json::Value,
}

/// What a balance change is for: kind, human description, optional reference
/// and free-form metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Posting {
    pub kind: EntryKind,
    pub description: String,
    pub reference_id: Option<String>,
    pub metadata: serde_json::Value,
}

impl Posting {
    pub fn new(kind: EntryKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            reference_id: None,
            metadata: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn reference(mut self, reference_id: impl ToString) -> Self {
        self.reference_id = Some(reference_id.to_string());
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Build the entry for a change from `balance_before` by signed `amount`.
    pub(crate) fn into_entry(self, user_id: i64, amount: i64, balance_before: i64) -> NewLedgerEntry {
        NewLedgerEntry {
            user_id,
            kind: self.kind,
            amount,
            balance_before,
            balance_after: balance_before + amount,
            description: self.description,
            reference_id: self.reference_id,
            metadata: self.metadata,
        }
    }
}

/// Balance versus ledger audit for one wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub user_id: i64,
    pub balance: i64,
    /// Sum of every entry's signed amount
    pub ledger_sum: i64,
    /// `balance_after` of the newest entry, if any
    pub last_balance_after: Option<i64>,
    pub entry_count: i64,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        self.balance == self.ledger_sum && self.last_balance_after.unwrap_or(0) == self.balance
    }
}
