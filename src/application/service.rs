//! Group wager operations.
//!
//! Each public method is one use case executed inside the caller's unit
//! of work. The service never begins or commits transactions itself, so
//! callers decide the transaction boundary and events only leave the
//! outbox when that boundary commits.

use std::collections::HashSet;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::domain::{
    BalanceAdjustment, ExternalReference, GroupWager, GuildId, MessageId, NewGroupWager,
    NewWagerOption, OptionId, Participant, ParticipantId, RelatedRef, TransactionType, UserId,
    WagerDetail, WagerId, WagerResult, WagerState, MAX_VOTING_PERIOD_MINUTES, MAX_WAGER_OPTIONS,
    MIN_VOTING_PERIOD_MINUTES, MIN_WAGER_OPTIONS,
};
use crate::error::{Error, WagerError};
use crate::port::outbound::bus::{
    BalanceChangedEvent, Event, GroupWagerStateChangedEvent, ParticipantUpdatedEvent,
};
use crate::port::outbound::uow::UnitOfWork;

fn reject(reason: impl Into<String>) -> WagerError {
    WagerError::Validation {
        reason: reason.into(),
    }
}

/// Use cases for creating, betting on, and settling group wagers.
///
/// Borrowed against a unit of work for the duration of one operation;
/// a new service is constructed per transaction.
pub struct GroupWagerService<'a> {
    uow: &'a dyn UnitOfWork,
}

impl<'a> GroupWagerService<'a> {
    /// Bind the service to a unit of work.
    #[must_use]
    pub fn new(uow: &'a dyn UnitOfWork) -> Self {
        Self { uow }
    }

    fn require_guild(&self) -> Result<GuildId, WagerError> {
        self.uow
            .scope()
            .guild_id()
            .ok_or(WagerError::Storage(Error::Scope("group wager service")))
    }

    /// Open a new wager in this guild.
    pub async fn create_group_wager(
        &self,
        req: NewGroupWager,
    ) -> Result<WagerDetail, WagerError> {
        let guild_id = self.require_guild()?;
        validate_new_wager(&req)?;

        let wager = GroupWager::open(guild_id, &req, Utc::now());
        let options: Vec<NewWagerOption> = req
            .options
            .iter()
            .zip(req.initial_odds.iter())
            .enumerate()
            .map(|(order, (text, odds))| NewWagerOption {
                text: text.trim().to_string(),
                order: order as i32,
                odds_multiplier: *odds,
            })
            .collect();

        let detail = self
            .uow
            .group_wagers()
            .create_with_options(&wager, &options)
            .await?;

        info!(
            guild_id = %guild_id,
            wager_id = %detail.wager.id,
            wager_type = %detail.wager.wager_type,
            options = detail.options.len(),
            "Group wager created"
        );
        Ok(detail)
    }

    /// Place a new bet or raise an existing one.
    ///
    /// `amount` is the user's intended total stake on the wager, not an
    /// increment. Moving the stake to a different option is allowed while
    /// the wager accepts bets; lowering it is not. Only the net increase
    /// is debited from the balance.
    pub async fn place_bet(
        &self,
        wager_id: WagerId,
        user_id: UserId,
        option_id: OptionId,
        amount: i64,
    ) -> Result<Participant, WagerError> {
        let guild_id = self.require_guild()?;
        if amount <= 0 {
            return Err(reject("bet amount must be positive"));
        }

        let repo = self.uow.group_wagers();
        let detail = repo
            .get_detail(wager_id)
            .await?
            .ok_or(WagerError::WagerNotFound { wager_id })?;

        if !detail.wager.can_accept_bets(Utc::now()) {
            warn!(
                guild_id = %guild_id,
                wager_id = %wager_id,
                user_id = %user_id,
                state = %detail.wager.state,
                "Bet rejected: wager not accepting bets"
            );
            return Err(WagerError::NotAcceptingBets { wager_id });
        }
        if detail.option(option_id).is_none() {
            return Err(WagerError::OptionNotFound {
                wager_id,
                option_id,
            });
        }

        let existing = detail.participant(user_id).cloned();
        if let Some(position) = &existing {
            if amount < position.amount {
                return Err(reject(format!(
                    "stake can only be increased; current stake is {}",
                    position.amount
                )));
            }
        }
        let previous_amount = existing.as_ref().map_or(0, |p| p.amount);
        let delta = amount - previous_amount;

        // Stakes on other open wagers are committed money and do not
        // count toward what the user can spend here.
        let balance = self.uow.balances().balance(user_id).await?;
        let committed_elsewhere = repo.active_stake_excluding(user_id, wager_id).await?;
        let available = balance - committed_elsewhere;
        if available < amount {
            warn!(
                guild_id = %guild_id,
                wager_id = %wager_id,
                user_id = %user_id,
                available,
                requested = amount,
                "Bet rejected: insufficient balance"
            );
            return Err(WagerError::InsufficientBalance {
                available,
                requested: amount,
            });
        }

        // Move stake between option aggregates with atomic increments.
        match &existing {
            Some(position) if position.option_id == option_id => {
                if delta > 0 {
                    repo.update_option_total(option_id, delta).await?;
                }
            }
            Some(position) => {
                repo.update_option_total(position.option_id, -position.amount)
                    .await?;
                repo.update_option_total(option_id, amount).await?;
            }
            None => {
                repo.update_option_total(option_id, amount).await?;
            }
        }
        if delta > 0 {
            repo.add_to_pot(wager_id, delta).await?;
        }

        // Debit only the net increase; an option move without a raise
        // leaves the balance untouched.
        let mut balance_history_id = existing.as_ref().and_then(|p| p.balance_history_id);
        let mut balance_event: Option<BalanceChangedEvent> = None;
        if delta > 0 {
            let entry = self
                .uow
                .balances()
                .adjust(BalanceAdjustment {
                    user_id,
                    amount: -delta,
                    transaction_type: TransactionType::GroupWagerBet,
                    metadata: json!({
                        "group_wager_id": wager_id.value(),
                        "option_id": option_id.value(),
                    }),
                    related: Some(RelatedRef::group_wager(wager_id.value())),
                })
                .await?;
            balance_history_id = Some(entry.id);
            balance_event = Some(BalanceChangedEvent::from(&entry));
        }

        let position = Participant {
            id: existing
                .as_ref()
                .map_or(ParticipantId::UNSET, |p| p.id),
            wager_id,
            user_id,
            option_id,
            amount,
            payout_amount: None,
            balance_history_id,
        };
        let saved = repo.save_participant(&position).await?;

        // Recompute display odds from the fresh totals in one batch.
        let fresh = repo
            .get_detail(wager_id)
            .await?
            .ok_or(WagerError::WagerNotFound { wager_id })?;
        repo.update_all_option_odds(&fresh.recalculate_odds())
            .await?;

        let bus = self.uow.event_bus();
        bus.publish(Event::ParticipantUpdated(ParticipantUpdatedEvent {
            guild_id,
            wager_id,
            user_id,
            option_id,
            amount,
            total_pot: fresh.wager.total_pot,
            message_id: fresh.wager.message_id,
            channel_id: fresh.wager.channel_id,
        }))
        .await?;
        if let Some(event) = balance_event {
            bus.publish(Event::BalanceChanged(event)).await?;
        }

        info!(
            guild_id = %guild_id,
            wager_id = %wager_id,
            user_id = %user_id,
            option_id = %option_id,
            amount,
            delta,
            total_pot = fresh.wager.total_pot,
            "Bet placed"
        );
        Ok(saved)
    }

    /// Resolve a wager by naming the winning option and distribute the
    /// pot pari-mutuel among its backers.
    ///
    /// Every participant receives a ledger entry, zero-change entries for
    /// losers included, so resolution is fully auditable.
    pub async fn resolve_group_wager(
        &self,
        wager_id: WagerId,
        resolver_id: Option<UserId>,
        winning_option_id: OptionId,
    ) -> Result<WagerResult, WagerError> {
        let guild_id = self.require_guild()?;
        let repo = self.uow.group_wagers();
        let detail = repo
            .get_detail(wager_id)
            .await?
            .ok_or(WagerError::WagerNotFound { wager_id })?;
        let winning = detail
            .option(winning_option_id)
            .cloned()
            .ok_or(WagerError::OptionNotFound {
                wager_id,
                option_id: winning_option_id,
            })?;

        let old_state = detail.wager.state;
        let mut wager = detail.wager.clone();
        wager
            .resolve(resolver_id, winning_option_id, Utc::now())
            .map_err(|_| WagerError::InvalidState {
                wager_id,
                state: old_state,
                operation: "resolved",
            })?;

        let result = detail.compute_result(&winning);
        for participant in result.winners.iter().chain(result.losers.iter()) {
            self.settle_participant(participant, TransactionType::GroupWagerPayout)
                .await?;
        }

        repo.update(&wager).await?;
        self.publish_state_change(&wager, old_state).await?;

        info!(
            guild_id = %guild_id,
            wager_id = %wager_id,
            winning_option_id = %winning_option_id,
            winners = result.winners.len(),
            losers = result.losers.len(),
            total_pot = result.total_pot,
            remainder = result.remainder(),
            "Group wager resolved"
        );
        Ok(result)
    }

    /// Cancel a wager and refund every stake in full.
    ///
    /// The canceller, when known, is recorded in the wager's resolver
    /// slot just as `resolve_group_wager` records the resolver.
    pub async fn cancel_group_wager(
        &self,
        wager_id: WagerId,
        canceller_id: Option<UserId>,
    ) -> Result<(), WagerError> {
        let guild_id = self.require_guild()?;
        let repo = self.uow.group_wagers();
        let detail = repo
            .get_detail(wager_id)
            .await?
            .ok_or(WagerError::WagerNotFound { wager_id })?;

        let old_state = detail.wager.state;
        let mut wager = detail.wager.clone();
        wager
            .cancel(canceller_id, Utc::now())
            .map_err(|_| WagerError::InvalidState {
                wager_id,
                state: old_state,
                operation: "cancelled",
            })?;

        for participant in &detail.participants {
            let mut refunded = participant.clone();
            refunded.payout_amount = Some(participant.amount);
            self.settle_participant(&refunded, TransactionType::GroupWagerRefund)
                .await?;
        }

        repo.update(&wager).await?;
        self.publish_state_change(&wager, old_state).await?;

        info!(
            guild_id = %guild_id,
            wager_id = %wager_id,
            canceller_id = ?canceller_id,
            refunded = detail.participants.len(),
            total_pot = detail.wager.total_pot,
            "Group wager cancelled"
        );
        Ok(())
    }

    /// Close the betting phase of an expired wager.
    ///
    /// Calling this on a wager that is already `PendingResolution` is a
    /// no-op so concurrent sweeps cannot double-fire the transition.
    pub async fn transition_to_pending_resolution(
        &self,
        wager_id: WagerId,
    ) -> Result<(), WagerError> {
        self.require_guild()?;
        let repo = self.uow.group_wagers();
        let wager = repo
            .get_by_id(wager_id)
            .await?
            .ok_or(WagerError::WagerNotFound { wager_id })?;

        if wager.state == WagerState::PendingResolution {
            debug!(wager_id = %wager_id, "Wager already pending resolution");
            return Ok(());
        }
        if wager.state == WagerState::Active && !wager.is_expired(Utc::now()) {
            return Err(reject(format!(
                "voting window is still open until {}",
                wager.voting_ends_at
            )));
        }

        let old_state = wager.state;
        let mut wager = wager;
        wager.close_voting().map_err(|_| WagerError::InvalidState {
            wager_id,
            state: old_state,
            operation: "closed for voting",
        })?;

        repo.update(&wager).await?;
        self.publish_state_change(&wager, old_state).await?;

        info!(
            guild_id = %wager.guild_id,
            wager_id = %wager_id,
            "Voting closed, wager pending resolution"
        );
        Ok(())
    }

    /// Fetch the full aggregate for rendering.
    pub async fn get_group_wager_detail(
        &self,
        wager_id: WagerId,
    ) -> Result<WagerDetail, WagerError> {
        self.require_guild()?;
        self.uow
            .group_wagers()
            .get_detail(wager_id)
            .await?
            .ok_or(WagerError::WagerNotFound { wager_id })
    }

    /// Find the wager linked to an outside system entity, if one exists.
    pub async fn find_by_external_reference(
        &self,
        external_ref: &ExternalReference,
    ) -> Result<Option<GroupWager>, WagerError> {
        self.require_guild()?;
        Ok(self
            .uow
            .group_wagers()
            .get_by_external_reference(external_ref)
            .await?)
    }

    /// Find the wager rendered by a message, if one exists.
    pub async fn find_by_message(
        &self,
        message_id: MessageId,
    ) -> Result<Option<GroupWager>, WagerError> {
        self.require_guild()?;
        Ok(self.uow.group_wagers().get_by_message_id(message_id).await?)
    }

    /// All wagers awaiting resolution across every guild.
    pub async fn list_pending_resolution(&self) -> Result<Vec<GroupWager>, WagerError> {
        Ok(self.uow.group_wagers().pending_resolution().await?)
    }

    /// Write one settlement: ledger entry, updated participant row, and
    /// a balance event when money actually moved.
    async fn settle_participant(
        &self,
        participant: &Participant,
        transaction_type: TransactionType,
    ) -> Result<(), WagerError> {
        let payout = participant.payout_amount.unwrap_or(0);
        let entry = self
            .uow
            .balances()
            .adjust(BalanceAdjustment {
                user_id: participant.user_id,
                amount: payout,
                transaction_type,
                metadata: json!({
                    "group_wager_id": participant.wager_id.value(),
                    "option_id": participant.option_id.value(),
                }),
                related: Some(RelatedRef::group_wager(participant.wager_id.value())),
            })
            .await?;

        let mut settled = participant.clone();
        settled.balance_history_id = Some(entry.id);
        self.uow.group_wagers().save_participant(&settled).await?;

        if entry.change_amount != 0 {
            self.uow
                .event_bus()
                .publish(Event::BalanceChanged(BalanceChangedEvent::from(&entry)))
                .await?;
        }
        Ok(())
    }

    async fn publish_state_change(
        &self,
        wager: &GroupWager,
        old_state: WagerState,
    ) -> Result<(), WagerError> {
        self.uow
            .event_bus()
            .publish(Event::GroupWagerStateChanged(GroupWagerStateChangedEvent {
                guild_id: wager.guild_id,
                wager_id: wager.id,
                old_state,
                new_state: wager.state,
                message_id: wager.message_id,
                channel_id: wager.channel_id,
            }))
            .await?;
        Ok(())
    }
}

fn validate_new_wager(req: &NewGroupWager) -> Result<(), WagerError> {
    if req.condition.trim().is_empty() {
        return Err(reject("condition must not be empty"));
    }

    let count = req.options.len();
    if !(MIN_WAGER_OPTIONS..=MAX_WAGER_OPTIONS).contains(&count) {
        return Err(reject(format!(
            "option count must be between {MIN_WAGER_OPTIONS} and {MAX_WAGER_OPTIONS}, got {count}"
        )));
    }
    if req.initial_odds.len() != count {
        return Err(reject(format!(
            "odds count {} does not match option count {count}",
            req.initial_odds.len()
        )));
    }

    let mut seen = HashSet::new();
    for text in &req.options {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(reject("option text must not be empty"));
        }
        if !seen.insert(trimmed.to_lowercase()) {
            return Err(reject(format!("duplicate option: {trimmed}")));
        }
    }

    if !(MIN_VOTING_PERIOD_MINUTES..=MAX_VOTING_PERIOD_MINUTES)
        .contains(&req.voting_period_minutes)
    {
        return Err(reject(format!(
            "voting period must be between {MIN_VOTING_PERIOD_MINUTES} and \
             {MAX_VOTING_PERIOD_MINUTES} minutes, got {}",
            req.voting_period_minutes
        )));
    }

    if let Some(ext) = &req.external_ref {
        if ext.system.trim().is_empty() || ext.id.trim().is_empty() {
            return Err(reject("external reference must name a system and an id"));
        }
    }
    Ok(())
}
