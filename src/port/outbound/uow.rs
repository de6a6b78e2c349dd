//! Unit-of-work port.
//!
//! A unit of work owns one database transaction plus an event buffer.
//! Repository writes and event publishes made through it become visible
//! together on commit, or not at all.

use std::fmt;

use async_trait::async_trait;

use crate::domain::GuildId;
use crate::error::Result;

use super::bus::EventBus;
use super::repository::{BalanceRepository, GroupWagerRepository};

/// Tenant scope of a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuildScope {
    /// Scoped to one guild. All repository reads and writes are filtered
    /// to this guild.
    Guild(GuildId),
    /// Unscoped. Only the cross-guild scan methods are usable; guild-
    /// scoped operations fail fast.
    CrossGuild,
}

impl GuildScope {
    /// The guild this scope is bound to, if any.
    #[must_use]
    pub fn guild_id(&self) -> Option<GuildId> {
        match self {
            GuildScope::Guild(id) => Some(*id),
            GuildScope::CrossGuild => None,
        }
    }
}

impl fmt::Display for GuildScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuildScope::Guild(id) => write!(f, "guild:{id}"),
            GuildScope::CrossGuild => f.write_str("cross-guild"),
        }
    }
}

/// One transactional scope over the wagering stores.
///
/// # Implementation Notes
///
/// `begin` must be called exactly once before any repository access.
/// `commit` makes the database transaction durable first, then flushes
/// buffered events; flush failures are logged, never returned, because
/// the transaction is already committed. `rollback` discards both the
/// transaction and the buffered events and is safe to call in any state.
/// Implementations roll back automatically when dropped while active.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// The tenant scope this unit of work was created with.
    fn scope(&self) -> GuildScope;

    /// Wager store bound to this transaction.
    fn group_wagers(&self) -> &dyn GroupWagerRepository;

    /// Balance store bound to this transaction.
    fn balances(&self) -> &dyn BalanceRepository;

    /// Buffering event publisher bound to this transaction. Events
    /// published here are held until `commit`.
    fn event_bus(&self) -> &dyn EventBus;

    /// Open the transaction.
    ///
    /// # Errors
    ///
    /// Fails if called more than once or if the transaction cannot be
    /// started.
    async fn begin(&mut self) -> Result<()>;

    /// Commit the transaction, then deliver buffered events.
    async fn commit(&mut self) -> Result<()>;

    /// Abort the transaction and discard buffered events. Calling this
    /// after commit or a prior rollback is a no-op.
    async fn rollback(&mut self) -> Result<()>;
}

/// Creates units of work bound to a tenant scope.
pub trait UnitOfWorkFactory: Send + Sync {
    /// Create a unit of work. The transaction is not started until
    /// [`UnitOfWork::begin`] is called.
    fn create(&self, scope: GuildScope) -> Result<Box<dyn UnitOfWork>>;
}
