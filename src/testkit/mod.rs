//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! # Modules
//!
//! - [`bus`]: [`EventBus`](crate::port::outbound::bus::EventBus) doubles
//!   for asserting on post-commit delivery.
//! - [`db`]: Unit-of-work factories over a migrated in-memory database.
//! - [`domain`]: Builders for wager requests and related fixtures.

pub mod bus;
pub mod db;
pub mod domain;

pub use bus::{FailingEventBus, RecordingEventBus};
pub use db::{memory_factory, memory_factory_with_handlers};
pub use domain::{external_wager_request, house_wager_request, next_message_id, pool_wager_request};
