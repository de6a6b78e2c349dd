//! Participant positions within a group wager.

use serde::{Deserialize, Serialize};

use super::id::{BalanceHistoryId, OptionId, ParticipantId, UserId, WagerId};

/// One user's position in one wager.
///
/// A user holds at most one position per wager; re-betting updates the
/// existing row instead of inserting a second one. `amount` is the user's
/// full stake, already debited from their balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub wager_id: WagerId,
    pub user_id: UserId,
    /// The option the stake currently sits on.
    pub option_id: OptionId,
    /// Total stake. Always positive.
    pub amount: i64,
    /// Settlement amount. `None` until the wager reaches a terminal state;
    /// zero for losers, the refunded stake on cancellation.
    pub payout_amount: Option<i64>,
    /// Ledger entry backing the most recent balance change for this
    /// position.
    pub balance_history_id: Option<BalanceHistoryId>,
}

impl Participant {
    /// Build an unpersisted position for a first-time bet.
    #[must_use]
    pub fn new(wager_id: WagerId, user_id: UserId, option_id: OptionId, amount: i64) -> Self {
        Self {
            id: ParticipantId::UNSET,
            wager_id,
            user_id,
            option_id,
            amount,
            payout_amount: None,
            balance_history_id: None,
        }
    }

    /// Whether this position has been settled.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.payout_amount.is_some()
    }
}
