//! Wager aggregate and pari-mutuel settlement arithmetic.
//!
//! All money amounts are integer units of the guild currency. Payouts are
//! computed with integer arithmetic only; division truncates toward zero
//! and the remainder stays in the pot.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::id::{OptionId, UserId, WagerId};
use super::participant::Participant;
use super::wager::{GroupWager, WagerOption};

/// Pari-mutuel share of the pot for one winning stake.
///
/// Computes `floor(stake * total_pot / winning_total)` widened through
/// i128 so the intermediate product cannot overflow. Returns zero when
/// the winning option holds no stakes, which settles every participant
/// at zero instead of dividing by zero.
///
/// ```
/// use tote::domain::pari_mutuel_payout;
///
/// assert_eq!(pari_mutuel_payout(100, 600, 300), 200);
/// assert_eq!(pari_mutuel_payout(200, 600, 300), 400);
/// assert_eq!(pari_mutuel_payout(50, 600, 0), 0);
/// ```
#[must_use]
pub fn pari_mutuel_payout(stake: i64, total_pot: i64, winning_total: i64) -> i64 {
    if winning_total <= 0 {
        return 0;
    }
    let share = i128::from(stake) * i128::from(total_pot) / i128::from(winning_total);
    // stake <= winning_total, so share <= total_pot and fits in i64.
    share as i64
}

/// A wager together with its options and participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WagerDetail {
    pub wager: GroupWager,
    /// Options in presentation order.
    pub options: Vec<WagerOption>,
    pub participants: Vec<Participant>,
}

impl WagerDetail {
    /// Look up an option by id.
    #[must_use]
    pub fn option(&self, id: OptionId) -> Option<&WagerOption> {
        self.options.iter().find(|o| o.id == id)
    }

    /// Look up a user's position, if they hold one.
    #[must_use]
    pub fn participant(&self, user_id: UserId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    /// Display odds for every option: pot divided by option total, zero
    /// for options nobody staked on.
    #[must_use]
    pub fn recalculate_odds(&self) -> Vec<(OptionId, f64)> {
        self.options
            .iter()
            .map(|o| {
                let odds = if o.total_amount > 0 {
                    self.wager.total_pot as f64 / o.total_amount as f64
                } else {
                    0.0
                };
                (o.id, odds)
            })
            .collect()
    }

    /// Check that option totals and participant stakes both sum to the
    /// recorded pot.
    pub fn verify_pool_integrity(&self) -> Result<(), DomainError> {
        let option_sum: i64 = self.options.iter().map(|o| o.total_amount).sum();
        let stake_sum: i64 = self.participants.iter().map(|p| p.amount).sum();
        if option_sum != self.wager.total_pot || stake_sum != self.wager.total_pot {
            return Err(DomainError::PoolImbalance {
                total_pot: self.wager.total_pot,
                option_sum,
                stake_sum,
            });
        }
        Ok(())
    }

    /// Settle every participant against the given winning option.
    ///
    /// Pure computation: the returned participants carry their payout
    /// amounts but nothing is persisted or credited here.
    #[must_use]
    pub fn compute_result(&self, winning_option: &WagerOption) -> WagerResult {
        let total_pot = self.wager.total_pot;
        let winning_total = winning_option.total_amount;

        let mut winners = Vec::new();
        let mut losers = Vec::new();
        let mut payouts = HashMap::new();

        for participant in &self.participants {
            let mut settled = participant.clone();
            let payout = if participant.option_id == winning_option.id {
                pari_mutuel_payout(participant.amount, total_pot, winning_total)
            } else {
                0
            };
            settled.payout_amount = Some(payout);
            payouts.insert(settled.user_id, payout);
            if participant.option_id == winning_option.id {
                winners.push(settled);
            } else {
                losers.push(settled);
            }
        }

        WagerResult {
            wager_id: self.wager.id,
            winning_option: winning_option.clone(),
            total_pot,
            winners,
            losers,
            payouts,
        }
    }
}

/// Outcome of resolving a wager: who won, who lost, and what each
/// participant is owed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WagerResult {
    pub wager_id: WagerId,
    pub winning_option: WagerOption,
    pub total_pot: i64,
    /// Participants on the winning option, payout amounts filled in.
    pub winners: Vec<Participant>,
    /// Everyone else, settled at zero.
    pub losers: Vec<Participant>,
    /// Payout per user, zero entries included.
    pub payouts: HashMap<UserId, i64>,
}

impl WagerResult {
    /// Total amount credited to winners.
    #[must_use]
    pub fn total_paid_out(&self) -> i64 {
        self.winners
            .iter()
            .filter_map(|p| p.payout_amount)
            .sum()
    }

    /// Truncation remainder that stays in the pot after integer division.
    #[must_use]
    pub fn remainder(&self) -> i64 {
        self.total_pot - self.total_paid_out()
    }
}
