//! Balance ledger types.
//!
//! Every balance mutation is recorded as an append-only history entry in
//! the same transaction that applies it, so the ledger always explains
//! the current balance.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::id::{BalanceHistoryId, GuildId, UserId};

/// Why a balance changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Stake debited when a bet is placed or increased.
    GroupWagerBet,
    /// Winnings credited on resolution. Losers receive a zero-change
    /// entry under this type as well.
    GroupWagerPayout,
    /// Stake returned on cancellation.
    GroupWagerRefund,
    /// Manual correction or seeding outside the wager flows.
    Adjustment,
}

impl TransactionType {
    /// Persisted string form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::GroupWagerBet => "group_wager_bet",
            TransactionType::GroupWagerPayout => "group_wager_payout",
            TransactionType::GroupWagerRefund => "group_wager_refund",
            TransactionType::Adjustment => "adjustment",
        }
    }

    /// Parse a persisted type string.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "group_wager_bet" => Ok(TransactionType::GroupWagerBet),
            "group_wager_payout" => Ok(TransactionType::GroupWagerPayout),
            "group_wager_refund" => Ok(TransactionType::GroupWagerRefund),
            "adjustment" => Ok(TransactionType::Adjustment),
            other => Err(DomainError::UnknownTransactionType(other.to_string())),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of entity a ledger entry points back at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelatedType {
    GroupWager,
}

impl RelatedType {
    /// Persisted string form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RelatedType::GroupWager => "group_wager",
        }
    }

    /// Parse a persisted type string.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "group_wager" => Ok(RelatedType::GroupWager),
            other => Err(DomainError::UnknownRelatedType(other.to_string())),
        }
    }
}

impl fmt::Display for RelatedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pointer from a ledger entry to the entity that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedRef {
    pub id: i64,
    pub kind: RelatedType,
}

impl RelatedRef {
    #[must_use]
    pub fn group_wager(id: i64) -> Self {
        Self {
            id,
            kind: RelatedType::GroupWager,
        }
    }
}

/// Request to apply a signed amount to a user's balance.
#[derive(Debug, Clone)]
pub struct BalanceAdjustment {
    pub user_id: UserId,
    /// Signed change. Negative debits, positive credits, zero records an
    /// audit entry without moving money.
    pub amount: i64,
    pub transaction_type: TransactionType,
    /// Free-form context stored with the entry.
    pub metadata: serde_json::Value,
    pub related: Option<RelatedRef>,
}

/// One applied balance change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceHistory {
    pub id: BalanceHistoryId,
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub balance_before: i64,
    pub balance_after: i64,
    pub change_amount: i64,
    pub transaction_type: TransactionType,
    pub metadata: serde_json::Value,
    pub related: Option<RelatedRef>,
    pub created_at: DateTime<Utc>,
}
