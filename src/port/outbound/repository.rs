//! Persistence ports for wagers and balances.
//!
//! Repositories are handed out by a unit of work and run inside its
//! transaction. Guild-scoped methods operate on the unit of work's guild;
//! the cross-guild scan methods ignore scope and are meant for sweep jobs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    BalanceAdjustment, BalanceHistory, ExternalReference, GroupWager, GuildId, MessageId,
    NewWagerOption, OptionId, Participant, UserId, WagerDetail, WagerId,
};
use crate::error::Result;

/// Store for group wagers, their options, and participants.
#[async_trait]
pub trait GroupWagerRepository: Send + Sync {
    /// Insert a wager and its options, returning the persisted aggregate
    /// with database-assigned ids.
    async fn create_with_options(
        &self,
        wager: &GroupWager,
        options: &[NewWagerOption],
    ) -> Result<WagerDetail>;

    /// Fetch a wager by id within the current guild.
    async fn get_by_id(&self, wager_id: WagerId) -> Result<Option<GroupWager>>;

    /// Fetch the wager rendered by a given message.
    async fn get_by_message_id(&self, message_id: MessageId) -> Result<Option<GroupWager>>;

    /// Fetch the wager linked to an external system entity. Lookups are
    /// idempotent: repeated notifications for the same entity find the
    /// wager created for the first one.
    async fn get_by_external_reference(
        &self,
        external_ref: &ExternalReference,
    ) -> Result<Option<GroupWager>>;

    /// Persist mutable wager fields: state, resolver, winning option,
    /// total pot, voting deadline, and resolution timestamp.
    async fn update(&self, wager: &GroupWager) -> Result<()>;

    /// Fetch the full aggregate: wager, options in presentation order,
    /// and all participants.
    async fn get_detail(&self, wager_id: WagerId) -> Result<Option<WagerDetail>>;

    /// Insert or update a user's position. A user holds at most one
    /// position per wager; the returned participant carries its
    /// database-assigned id.
    async fn save_participant(&self, participant: &Participant) -> Result<Participant>;

    /// Fetch a user's position on a wager, if any.
    async fn get_participant(
        &self,
        wager_id: WagerId,
        user_id: UserId,
    ) -> Result<Option<Participant>>;

    /// Atomically add `delta` to an option's stake total. Negative deltas
    /// remove stake when a participant moves options.
    async fn update_option_total(&self, option_id: OptionId, delta: i64) -> Result<()>;

    /// Atomically add `delta` to a wager's total pot.
    async fn add_to_pot(&self, wager_id: WagerId, delta: i64) -> Result<()>;

    /// Persist the display odds for a single option.
    async fn update_option_odds(&self, option_id: OptionId, odds: f64) -> Result<()>;

    /// Persist display odds for a batch of options in one statement
    /// sequence.
    async fn update_all_option_odds(&self, odds: &[(OptionId, f64)]) -> Result<()>;

    /// Sum of a user's stakes on other non-terminal wagers in this guild.
    /// Used to compute available balance before accepting a bet.
    async fn active_stake_excluding(&self, user_id: UserId, wager_id: WagerId) -> Result<i64>;

    /// All `Active` wagers whose voting deadline has passed, across every
    /// guild.
    async fn expired_active(&self, now: DateTime<Utc>) -> Result<Vec<GroupWager>>;

    /// All wagers awaiting resolution, across every guild.
    async fn pending_resolution(&self) -> Result<Vec<GroupWager>>;

    /// Guilds that currently have at least one `Active` wager.
    async fn guilds_with_active_wagers(&self) -> Result<Vec<GuildId>>;
}

/// Store for user balances and the balance ledger.
#[async_trait]
pub trait BalanceRepository: Send + Sync {
    /// Current balance for a user in this guild. Users without a balance
    /// row have a balance of zero.
    async fn balance(&self, user_id: UserId) -> Result<i64>;

    /// Apply a signed adjustment and record the matching ledger entry in
    /// the same transaction. Zero-amount adjustments record an audit
    /// entry without changing the balance.
    ///
    /// # Errors
    ///
    /// Fails if the adjustment would drive the balance negative.
    async fn adjust(&self, adjustment: BalanceAdjustment) -> Result<BalanceHistory>;
}
