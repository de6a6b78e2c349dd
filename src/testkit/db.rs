//! Database fixtures.

use std::sync::Arc;

use crate::adapter::outbound::sqlite::database::connection::{create_pool_with, run_migrations};
use crate::adapter::outbound::sqlite::uow::SqliteUnitOfWorkFactory;
use crate::port::outbound::bus::{EventBus, LocalHandlerRegistry};

/// Unit-of-work factory over a fresh in-memory database.
///
/// The pool is capped at one connection so every unit of work sees the
/// same in-memory database. Tests that need concurrent transactions use
/// a file-backed database instead.
#[must_use]
pub fn memory_factory(remote: Arc<dyn EventBus>) -> SqliteUnitOfWorkFactory {
    memory_factory_with_handlers(LocalHandlerRegistry::new(), remote)
}

/// Same as [`memory_factory`] with local handlers installed.
#[must_use]
pub fn memory_factory_with_handlers(
    handlers: LocalHandlerRegistry,
    remote: Arc<dyn EventBus>,
) -> SqliteUnitOfWorkFactory {
    let pool = create_pool_with(":memory:", 1).expect("in-memory pool");
    run_migrations(&pool).expect("migrations");
    SqliteUnitOfWorkFactory::new(pool, Arc::new(handlers), remote)
}
