//! Event bus port and the domain event vocabulary.
//!
//! Events describe facts that already happened inside a committed
//! transaction. The set is closed: adding a variant is a compile-time
//! change and every consumer match is exhaustive.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{
    BalanceHistory, ChannelId, GuildId, MessageId, OptionId, TransactionType, UserId, WagerId,
    WagerState,
};
use crate::error::Result;

/// A wager moved between lifecycle states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupWagerStateChangedEvent {
    pub guild_id: GuildId,
    pub wager_id: WagerId,
    pub old_state: WagerState,
    pub new_state: WagerState,
    /// Where the wager is rendered, so consumers can refresh it.
    pub message_id: MessageId,
    pub channel_id: ChannelId,
}

/// A user placed or updated a bet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantUpdatedEvent {
    pub guild_id: GuildId,
    pub wager_id: WagerId,
    pub user_id: UserId,
    pub option_id: OptionId,
    /// The user's full stake after the update.
    pub amount: i64,
    /// Pot total after the update.
    pub total_pot: i64,
    pub message_id: MessageId,
    pub channel_id: ChannelId,
}

/// A user's balance changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceChangedEvent {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub balance_before: i64,
    pub balance_after: i64,
    pub change_amount: i64,
    pub transaction_type: TransactionType,
}

impl From<&BalanceHistory> for BalanceChangedEvent {
    fn from(entry: &BalanceHistory) -> Self {
        Self {
            guild_id: entry.guild_id,
            user_id: entry.user_id,
            balance_before: entry.balance_before,
            balance_after: entry.balance_after,
            change_amount: entry.change_amount,
            transaction_type: entry.transaction_type,
        }
    }
}

/// Domain events published through the transactional outbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A wager moved between lifecycle states.
    GroupWagerStateChanged(GroupWagerStateChangedEvent),
    /// A user placed or updated a bet.
    ParticipantUpdated(ParticipantUpdatedEvent),
    /// A user's balance changed.
    BalanceChanged(BalanceChangedEvent),
}

impl Event {
    /// The discriminant used to route events to local handlers.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Event::GroupWagerStateChanged(_) => EventKind::GroupWagerStateChanged,
            Event::ParticipantUpdated(_) => EventKind::ParticipantUpdated,
            Event::BalanceChanged(_) => EventKind::BalanceChanged,
        }
    }

    /// Guild the event belongs to.
    #[must_use]
    pub fn guild_id(&self) -> GuildId {
        match self {
            Event::GroupWagerStateChanged(e) => e.guild_id,
            Event::ParticipantUpdated(e) => e.guild_id,
            Event::BalanceChanged(e) => e.guild_id,
        }
    }
}

/// Event discriminant without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    GroupWagerStateChanged,
    ParticipantUpdated,
    BalanceChanged,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::GroupWagerStateChanged => "group_wager_state_changed",
            EventKind::ParticipantUpdated => "participant_updated",
            EventKind::BalanceChanged => "balance_changed",
        };
        f.write_str(name)
    }
}

/// Outbound port for delivering events beyond the process boundary.
///
/// # Implementation Notes
///
/// Implementations are called after the owning transaction has committed.
/// Delivery is at-least-once and best-effort: returning an error is logged
/// by the caller but never unwinds the committed transaction, so
/// implementations should not retry indefinitely inside `publish`.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Deliver a single event.
    async fn publish(&self, event: Event) -> Result<()>;
}

/// In-process handler invoked synchronously during outbox flush.
pub type LocalHandler = Box<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

/// Routing table from event kinds to in-process handlers.
///
/// Built once at composition time and shared read-only afterwards; there
/// is deliberately no way to register handlers after construction hands
/// the registry to a unit-of-work factory.
#[derive(Default)]
pub struct LocalHandlerRegistry {
    handlers: HashMap<EventKind, Vec<LocalHandler>>,
}

impl LocalHandlerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event kind. Handlers run in
    /// registration order.
    pub fn register<F>(&mut self, kind: EventKind, handler: F)
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.handlers.entry(kind).or_default().push(Box::new(handler));
    }

    /// Run every handler registered for the event's kind.
    ///
    /// A failing handler is logged and skipped; the remaining handlers
    /// still run. Returns the number of handlers that failed.
    pub fn dispatch(&self, event: &Event) -> usize {
        let Some(handlers) = self.handlers.get(&event.kind()) else {
            return 0;
        };
        let mut failures = 0;
        for handler in handlers {
            if let Err(e) = handler(event) {
                warn!(kind = %event.kind(), error = %e, "Local event handler failed");
                failures += 1;
            }
        }
        failures
    }

    /// Number of handlers registered for a kind.
    #[must_use]
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Total number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }

    /// Whether any handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for LocalHandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalHandlerRegistry")
            .field("handlers", &self.len())
            .finish()
    }
}

/// No-op bus for deployments without a remote broker.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventBus;

#[async_trait]
impl EventBus for NullEventBus {
    async fn publish(&self, _event: Event) -> Result<()> {
        Ok(())
    }
}

/// Bus that logs every event at info level. Useful as the remote leg in
/// development and single-process deployments.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEventBus;

#[async_trait]
impl EventBus for LogEventBus {
    async fn publish(&self, event: Event) -> Result<()> {
        match &event {
            Event::GroupWagerStateChanged(e) => {
                info!(
                    guild_id = %e.guild_id,
                    wager_id = %e.wager_id,
                    old_state = %e.old_state,
                    new_state = %e.new_state,
                    "Group wager state changed"
                );
            }
            Event::ParticipantUpdated(e) => {
                info!(
                    guild_id = %e.guild_id,
                    wager_id = %e.wager_id,
                    user_id = %e.user_id,
                    amount = e.amount,
                    total_pot = e.total_pot,
                    "Participant updated"
                );
            }
            Event::BalanceChanged(e) => {
                info!(
                    guild_id = %e.guild_id,
                    user_id = %e.user_id,
                    change = e.change_amount,
                    balance_after = e.balance_after,
                    transaction_type = %e.transaction_type,
                    "Balance changed"
                );
            }
        }
        Ok(())
    }
}
