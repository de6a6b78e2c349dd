//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! Ports define the extension points in the hexagonal architecture.
//! They are traits that adapters implement to integrate with external
//! systems (databases, message brokers, etc.).
//!
//! # Architecture
//!
//! ```text
//!                ┌──────────────────────────┐
//!                │       Application        │
//!                │                          │
//!                │   Domain + Port traits   │
//!                └────────────┬─────────────┘
//!                             │
//!              ┌──────────────┴──────────────┐
//!              ▼                             ▼
//!      ┌──────────────┐              ┌──────────────┐
//!      │ UnitOfWork / │              │   EventBus   │
//!      │ Repositories │              │   (remote)   │
//!      │   (SQLite)   │              └──────────────┘
//!      └──────────────┘
//! ```
//!
//! # Available Ports
//!
//! - [`UnitOfWork`], [`UnitOfWorkFactory`] - Transactional scoping per guild
//! - [`GroupWagerRepository`], [`BalanceRepository`] - Persistence
//! - [`EventBus`] - Event delivery beyond the process boundary

pub mod outbound;

// Event bus port and event vocabulary
pub use outbound::bus::{
    BalanceChangedEvent, Event, EventBus, EventKind, GroupWagerStateChangedEvent, LocalHandler,
    LocalHandlerRegistry, LogEventBus, NullEventBus, ParticipantUpdatedEvent,
};

// Repository ports
pub use outbound::repository::{BalanceRepository, GroupWagerRepository};

// Unit-of-work port
pub use outbound::uow::{GuildScope, UnitOfWork, UnitOfWorkFactory};
