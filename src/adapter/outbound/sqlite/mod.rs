//! SQLite persistence adapters.
//!
//! Provides the SQLite-backed unit of work and the wager and balance
//! repositories bound to it, using Diesel ORM.

pub mod balance_repository;
pub mod database;
pub mod uow;
pub mod wager_repository;
