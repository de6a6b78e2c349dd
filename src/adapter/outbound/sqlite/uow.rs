//! SQLite unit of work.
//!
//! A unit of work pins one pooled connection and drives one explicit
//! transaction on it. The repositories it hands out share that pinned
//! connection, so every statement they run joins the transaction. Events
//! go through the buffering outbox and are only delivered once COMMIT
//! has returned.

use std::sync::Arc;

use async_trait::async_trait;
use diesel::RunQueryDsl;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::adapter::outbound::sqlite::balance_repository::SqliteBalanceRepository;
use crate::adapter::outbound::sqlite::database::connection::{
    configure_sqlite_connection, DbPool, SharedConnection,
};
use crate::adapter::outbound::sqlite::wager_repository::SqliteGroupWagerRepository;
use crate::application::outbox::EventOutbox;
use crate::error::{Error, Result};
use crate::port::outbound::bus::{EventBus, LocalHandlerRegistry};
use crate::port::outbound::repository::{BalanceRepository, GroupWagerRepository};
use crate::port::outbound::uow::{GuildScope, UnitOfWork, UnitOfWorkFactory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    NotStarted,
    Active,
    Committed,
    RolledBack,
}

/// One transaction against the SQLite store.
pub struct SqliteUnitOfWork {
    tx_id: Uuid,
    scope: GuildScope,
    conn: SharedConnection,
    outbox: EventOutbox,
    wagers: SqliteGroupWagerRepository,
    balances: SqliteBalanceRepository,
    state: TxState,
}

impl SqliteUnitOfWork {
    fn new(
        scope: GuildScope,
        conn: SharedConnection,
        handlers: Arc<LocalHandlerRegistry>,
        remote: Arc<dyn EventBus>,
    ) -> Self {
        let tx_id = Uuid::new_v4();
        Self {
            tx_id,
            scope,
            conn: conn.clone(),
            outbox: EventOutbox::new(tx_id, handlers, remote),
            wagers: SqliteGroupWagerRepository::new(conn.clone(), scope),
            balances: SqliteBalanceRepository::new(conn, scope),
            state: TxState::NotStarted,
        }
    }

    fn execute(&self, sql: &str) -> Result<()> {
        let mut conn = self.conn.lock();
        diesel::sql_query(sql)
            .execute(&mut *conn)
            .map(|_| ())
            .map_err(|e| Error::Transaction(format!("{sql} failed: {e}")))
    }
}

#[async_trait]
impl UnitOfWork for SqliteUnitOfWork {
    fn scope(&self) -> GuildScope {
        self.scope
    }

    fn group_wagers(&self) -> &dyn GroupWagerRepository {
        &self.wagers
    }

    fn balances(&self) -> &dyn BalanceRepository {
        &self.balances
    }

    fn event_bus(&self) -> &dyn EventBus {
        &self.outbox
    }

    async fn begin(&mut self) -> Result<()> {
        if self.state != TxState::NotStarted {
            return Err(Error::Transaction(
                "begin called on a unit of work that already started".to_string(),
            ));
        }
        // IMMEDIATE takes the write lock up front so concurrent writers
        // queue on busy_timeout instead of failing at first write.
        self.execute("BEGIN IMMEDIATE")?;
        self.state = TxState::Active;
        debug!(tx_id = %self.tx_id, scope = %self.scope, "Transaction started");
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        if self.state != TxState::Active {
            return Err(Error::Transaction(
                "commit called without an active transaction".to_string(),
            ));
        }
        if let Err(commit_err) = self.execute("COMMIT") {
            let discarded = self.outbox.discard();
            if let Err(rollback_err) = self.execute("ROLLBACK") {
                error!(
                    tx_id = %self.tx_id,
                    error = %rollback_err,
                    "Rollback after failed commit also failed"
                );
            }
            self.state = TxState::RolledBack;
            warn!(
                tx_id = %self.tx_id,
                discarded,
                "Commit failed, transaction rolled back"
            );
            return Err(commit_err);
        }
        self.state = TxState::Committed;
        debug!(tx_id = %self.tx_id, scope = %self.scope, "Transaction committed");

        // The write is durable from here. Delivery failures are logged
        // by the outbox and never surface to the caller.
        self.outbox.flush().await;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if self.state != TxState::Active {
            return Ok(());
        }
        let discarded = self.outbox.discard();
        self.execute("ROLLBACK")?;
        self.state = TxState::RolledBack;
        debug!(tx_id = %self.tx_id, discarded, "Transaction rolled back");
        Ok(())
    }
}

impl Drop for SqliteUnitOfWork {
    fn drop(&mut self) {
        if self.state != TxState::Active {
            return;
        }
        let discarded = self.outbox.discard();
        match self.execute("ROLLBACK") {
            Ok(()) => {
                self.state = TxState::RolledBack;
                warn!(
                    tx_id = %self.tx_id,
                    discarded,
                    "Unit of work dropped while active, rolled back"
                );
            }
            Err(e) => {
                error!(
                    tx_id = %self.tx_id,
                    error = %e,
                    "Unit of work dropped while active and rollback failed"
                );
            }
        }
    }
}

/// Creates units of work over a shared connection pool.
///
/// The local handler registry and remote bus are fixed at construction
/// and shared by every unit of work the factory creates.
pub struct SqliteUnitOfWorkFactory {
    pool: DbPool,
    handlers: Arc<LocalHandlerRegistry>,
    remote: Arc<dyn EventBus>,
}

impl SqliteUnitOfWorkFactory {
    #[must_use]
    pub fn new(pool: DbPool, handlers: Arc<LocalHandlerRegistry>, remote: Arc<dyn EventBus>) -> Self {
        Self {
            pool,
            handlers,
            remote,
        }
    }
}

impl UnitOfWorkFactory for SqliteUnitOfWorkFactory {
    fn create(&self, scope: GuildScope) -> Result<Box<dyn UnitOfWork>> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Connection(e.to_string()))?;
        configure_sqlite_connection(&mut conn)?;
        let conn: SharedConnection = Arc::new(parking_lot::Mutex::new(conn));
        Ok(Box::new(SqliteUnitOfWork::new(
            scope,
            conn,
            self.handlers.clone(),
            self.remote.clone(),
        )))
    }
}
