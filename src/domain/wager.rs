//! Group wager entities and lifecycle rules.
//!
//! A group wager collects stakes from many users across a fixed set of
//! options. While `Active` it accepts bets; when the voting window lapses
//! it moves to `PendingResolution` and waits for someone to name the
//! winning option. `Resolved` and `Cancelled` are terminal.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::id::{ChannelId, GuildId, MessageId, OptionId, UserId, WagerId};

/// Minimum number of options a wager must offer.
pub const MIN_WAGER_OPTIONS: usize = 2;

/// Maximum number of options a wager may offer. Discord select menus cap
/// at 25 entries.
pub const MAX_WAGER_OPTIONS: usize = 25;

/// Shortest allowed voting window.
pub const MIN_VOTING_PERIOD_MINUTES: i64 = 1;

/// Longest allowed voting window (seven days).
pub const MAX_VOTING_PERIOD_MINUTES: i64 = 7 * 24 * 60;

/// Lifecycle state of a group wager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WagerState {
    /// Accepting bets until the voting window lapses.
    Active,
    /// Voting window lapsed; awaiting a resolution decision.
    PendingResolution,
    /// A winning option was chosen and payouts were distributed.
    Resolved,
    /// Abandoned; all stakes were refunded.
    Cancelled,
}

impl WagerState {
    /// Persisted string form of the state.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            WagerState::Active => "active",
            WagerState::PendingResolution => "pending_resolution",
            WagerState::Resolved => "resolved",
            WagerState::Cancelled => "cancelled",
        }
    }

    /// Parse a persisted state string.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "active" => Ok(WagerState::Active),
            "pending_resolution" => Ok(WagerState::PendingResolution),
            "resolved" => Ok(WagerState::Resolved),
            "cancelled" => Ok(WagerState::Cancelled),
            other => Err(DomainError::UnknownState(other.to_string())),
        }
    }

    /// Whether no further transitions are possible from this state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, WagerState::Resolved | WagerState::Cancelled)
    }

    /// Validate a transition and return the new state.
    ///
    /// Allowed transitions: `Active -> PendingResolution`, and from either
    /// `Active` or `PendingResolution` to `Resolved` or `Cancelled`.
    pub fn transition_to(self, to: WagerState) -> Result<WagerState, DomainError> {
        let allowed = match (self, to) {
            (WagerState::Active, WagerState::PendingResolution) => true,
            (WagerState::Active | WagerState::PendingResolution, WagerState::Resolved) => true,
            (WagerState::Active | WagerState::PendingResolution, WagerState::Cancelled) => true,
            _ => false,
        };
        if allowed {
            Ok(to)
        } else {
            Err(DomainError::InvalidTransition { from: self, to })
        }
    }
}

impl fmt::Display for WagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a wager's pot is funded.
///
/// The payout arithmetic is identical for both; the distinction drives
/// presentation and bookkeeping upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WagerType {
    /// Participants bet against each other and split the shared pot.
    Pool,
    /// The house backs the wager.
    House,
}

impl WagerType {
    /// Persisted string form of the type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            WagerType::Pool => "pool",
            WagerType::House => "house",
        }
    }

    /// Parse a persisted type string.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "pool" => Ok(WagerType::Pool),
            "house" => Ok(WagerType::House),
            other => Err(DomainError::UnknownWagerType(other.to_string())),
        }
    }
}

impl fmt::Display for WagerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Link from a wager to an entity in an outside system, e.g. an esports
/// match a bot opened the wager for. Unique per guild so repeated
/// notifications find the wager they already created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalReference {
    /// Name of the originating system.
    pub system: String,
    /// Identifier within that system.
    pub id: String,
}

impl ExternalReference {
    /// Create a new external reference.
    pub fn new(system: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for ExternalReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.system, self.id)
    }
}

/// Request to open a new group wager.
#[derive(Debug, Clone)]
pub struct NewGroupWager {
    /// Who opened the wager. `None` for system-initiated wagers.
    pub creator_id: Option<UserId>,
    /// The question being wagered on.
    pub condition: String,
    /// Display text of each option, in presentation order.
    pub options: Vec<String>,
    /// Initial odds multiplier per option; must match `options` in length.
    pub initial_odds: Vec<f64>,
    /// How the pot is funded.
    pub wager_type: WagerType,
    /// How long the wager accepts bets, in minutes.
    pub voting_period_minutes: i64,
    /// Message that renders the wager.
    pub message_id: MessageId,
    /// Channel the wager was posted in.
    pub channel_id: ChannelId,
    /// Optional link to the outside event that triggered the wager.
    pub external_ref: Option<ExternalReference>,
}

/// One option users can stake on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WagerOption {
    pub id: OptionId,
    pub wager_id: WagerId,
    pub option_text: String,
    /// Zero-based presentation order.
    pub option_order: i32,
    /// Sum of all stakes currently on this option.
    pub total_amount: i64,
    /// Display-only ratio of pot to option total. Never used for payout
    /// arithmetic.
    pub odds_multiplier: f64,
}

/// Option data for a wager that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWagerOption {
    pub text: String,
    pub order: i32,
    pub odds_multiplier: f64,
}

/// A multi-option wager with a shared pot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupWager {
    pub id: WagerId,
    pub guild_id: GuildId,
    pub condition: String,
    pub state: WagerState,
    pub wager_type: WagerType,
    pub creator_id: Option<UserId>,
    /// Who named the winning option. Set on resolution.
    pub resolver_id: Option<UserId>,
    pub winning_option_id: Option<OptionId>,
    /// Sum of all stakes across all options.
    pub total_pot: i64,
    pub message_id: MessageId,
    pub channel_id: ChannelId,
    pub external_ref: Option<ExternalReference>,
    pub voting_starts_at: DateTime<Utc>,
    pub voting_ends_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl GroupWager {
    /// Construct a new wager in the `Active` state with an empty pot.
    ///
    /// The entity carries [`WagerId::UNSET`] until persisted. Validation of
    /// the request fields happens in the service layer before this runs.
    #[must_use]
    pub fn open(guild_id: GuildId, req: &NewGroupWager, now: DateTime<Utc>) -> Self {
        Self {
            id: WagerId::UNSET,
            guild_id,
            condition: req.condition.trim().to_string(),
            state: WagerState::Active,
            wager_type: req.wager_type,
            creator_id: req.creator_id,
            resolver_id: None,
            winning_option_id: None,
            total_pot: 0,
            message_id: req.message_id,
            channel_id: req.channel_id,
            external_ref: req.external_ref.clone(),
            voting_starts_at: now,
            voting_ends_at: now + Duration::minutes(req.voting_period_minutes),
            resolved_at: None,
            created_at: now,
        }
    }

    /// Whether the voting window has lapsed.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.voting_ends_at
    }

    /// Whether a bet placed at `now` would be accepted.
    #[must_use]
    pub fn can_accept_bets(&self, now: DateTime<Utc>) -> bool {
        self.state == WagerState::Active && !self.is_expired(now)
    }

    /// Whether the wager is in a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Move an expired wager out of the betting phase.
    pub fn close_voting(&mut self) -> Result<(), DomainError> {
        self.state = self.state.transition_to(WagerState::PendingResolution)?;
        Ok(())
    }

    /// Mark the wager resolved with the given winning option.
    pub fn resolve(
        &mut self,
        resolver_id: Option<UserId>,
        winning_option_id: OptionId,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.state = self.state.transition_to(WagerState::Resolved)?;
        self.resolver_id = resolver_id;
        self.winning_option_id = Some(winning_option_id);
        self.resolved_at = Some(now);
        Ok(())
    }

    /// Mark the wager cancelled, recording who ended it.
    pub fn cancel(
        &mut self,
        canceller_id: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.state = self.state.transition_to(WagerState::Cancelled)?;
        self.resolver_id = canceller_id;
        self.resolved_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> NewGroupWager {
        NewGroupWager {
            creator_id: Some(UserId::new(10)),
            condition: "  Who wins game five?  ".to_string(),
            options: vec!["Red".to_string(), "Blue".to_string()],
            initial_odds: vec![0.0, 0.0],
            wager_type: WagerType::Pool,
            voting_period_minutes: 60,
            message_id: MessageId::new(555),
            channel_id: ChannelId::new(777),
            external_ref: None,
        }
    }

    // ---- state machine ----

    #[test]
    fn active_transitions_to_pending_resolution() {
        let next = WagerState::Active
            .transition_to(WagerState::PendingResolution)
            .unwrap();
        assert_eq!(next, WagerState::PendingResolution);
    }

    #[test]
    fn active_and_pending_can_resolve_or_cancel() {
        for from in [WagerState::Active, WagerState::PendingResolution] {
            assert!(from.transition_to(WagerState::Resolved).is_ok());
            assert!(from.transition_to(WagerState::Cancelled).is_ok());
        }
    }

    #[test]
    fn terminal_states_reject_all_transitions() {
        for from in [WagerState::Resolved, WagerState::Cancelled] {
            for to in [
                WagerState::Active,
                WagerState::PendingResolution,
                WagerState::Resolved,
                WagerState::Cancelled,
            ] {
                assert!(matches!(
                    from.transition_to(to),
                    Err(DomainError::InvalidTransition { .. })
                ));
            }
        }
    }

    #[test]
    fn pending_resolution_cannot_reopen() {
        let result = WagerState::PendingResolution.transition_to(WagerState::Active);
        assert!(result.is_err());
    }

    #[test]
    fn state_strings_round_trip() {
        for state in [
            WagerState::Active,
            WagerState::PendingResolution,
            WagerState::Resolved,
            WagerState::Cancelled,
        ] {
            assert_eq!(WagerState::parse(state.as_str()).unwrap(), state);
        }
    }

    #[test]
    fn unknown_state_string_is_rejected() {
        assert!(matches!(
            WagerState::parse("open"),
            Err(DomainError::UnknownState(_))
        ));
    }

    // ---- entity lifecycle ----

    #[test]
    fn open_starts_active_with_empty_pot() {
        let now = Utc::now();
        let wager = GroupWager::open(GuildId::new(1), &sample_request(), now);

        assert_eq!(wager.id, WagerId::UNSET);
        assert_eq!(wager.state, WagerState::Active);
        assert_eq!(wager.total_pot, 0);
        assert_eq!(wager.condition, "Who wins game five?");
        assert_eq!(wager.voting_ends_at, now + Duration::minutes(60));
        assert!(wager.resolved_at.is_none());
    }

    #[test]
    fn accepts_bets_only_inside_voting_window() {
        let now = Utc::now();
        let wager = GroupWager::open(GuildId::new(1), &sample_request(), now);

        assert!(wager.can_accept_bets(now));
        assert!(wager.can_accept_bets(now + Duration::minutes(59)));
        // The deadline itself is exclusive.
        assert!(!wager.can_accept_bets(now + Duration::minutes(60)));
    }

    #[test]
    fn pending_resolution_does_not_accept_bets() {
        let now = Utc::now();
        let mut wager = GroupWager::open(GuildId::new(1), &sample_request(), now);
        wager.close_voting().unwrap();
        assert!(!wager.can_accept_bets(now));
    }

    #[test]
    fn resolve_records_resolver_winner_and_timestamp() {
        let now = Utc::now();
        let mut wager = GroupWager::open(GuildId::new(1), &sample_request(), now);
        let later = now + Duration::minutes(90);

        wager
            .resolve(Some(UserId::new(42)), OptionId::new(3), later)
            .unwrap();

        assert_eq!(wager.state, WagerState::Resolved);
        assert_eq!(wager.resolver_id, Some(UserId::new(42)));
        assert_eq!(wager.winning_option_id, Some(OptionId::new(3)));
        assert_eq!(wager.resolved_at, Some(later));
    }

    #[test]
    fn cancel_records_canceller_and_timestamp() {
        let now = Utc::now();
        let mut wager = GroupWager::open(GuildId::new(1), &sample_request(), now);
        let later = now + Duration::minutes(30);

        wager.cancel(Some(UserId::new(42)), later).unwrap();

        assert_eq!(wager.state, WagerState::Cancelled);
        assert_eq!(wager.resolver_id, Some(UserId::new(42)));
        assert_eq!(wager.resolved_at, Some(later));
    }

    #[test]
    fn unattributed_cancel_leaves_no_canceller() {
        let now = Utc::now();
        let mut wager = GroupWager::open(GuildId::new(1), &sample_request(), now);

        wager.cancel(None, now).unwrap();

        assert_eq!(wager.state, WagerState::Cancelled);
        assert_eq!(wager.resolver_id, None);
    }

    #[test]
    fn cancel_after_resolution_fails() {
        let now = Utc::now();
        let mut wager = GroupWager::open(GuildId::new(1), &sample_request(), now);
        wager
            .resolve(None, OptionId::new(1), now)
            .unwrap();

        assert!(wager.cancel(None, now).is_err());
        assert!(wager.is_terminal());
    }

    #[test]
    fn external_reference_display_joins_system_and_id() {
        let ext = ExternalReference::new("pandascore", "match-9931");
        assert_eq!(ext.to_string(), "pandascore:match-9931");
    }
}
