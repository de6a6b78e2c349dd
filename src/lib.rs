//! Tote - Pari-mutuel group wagering for multi-tenant Discord communities.
//!
//! This crate provides the wagering core: shared-pot group wagers where
//! winners split the pot in proportion to their stake, balances with an
//! append-only ledger, and transactional event delivery.
//!
//! # Architecture
//!
//! Hexagonal, with the pure domain at the center:
//!
//! - [`domain`] - Wager state machine, pari-mutuel payout math, ledger types
//! - [`application`] - Wagering service, transactional event outbox, expiry sweeper
//! - [`port`] - Repository, unit of work, and event bus traits
//! - [`adapter`] - Diesel/SQLite implementations of the outbound ports
//! - [`config`] - Configuration loading from TOML files
//! - [`error`] - Error types for the crate
//!
//! Every operation runs inside a unit of work: one transaction scoped to
//! one tenant guild, with events buffered and delivered only after commit.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tote::adapter::outbound::sqlite::database::connection::{create_pool, run_migrations};
//! use tote::adapter::outbound::sqlite::uow::SqliteUnitOfWorkFactory;
//! use tote::domain::GuildId;
//! use tote::port::outbound::bus::{LocalHandlerRegistry, LogEventBus};
//! use tote::port::outbound::uow::{GuildScope, UnitOfWorkFactory};
//!
//! # fn main() -> tote::error::Result<()> {
//! let pool = create_pool("wagers.db")?;
//! run_migrations(&pool)?;
//!
//! let factory = SqliteUnitOfWorkFactory::new(
//!     pool,
//!     Arc::new(LocalHandlerRegistry::new()),
//!     Arc::new(LogEventBus),
//! );
//! let _uow = factory.create(GuildScope::Guild(GuildId::new(761)))?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
