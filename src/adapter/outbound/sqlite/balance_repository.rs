//! SQLite balance store and ledger.
//!
//! Balances live in `user_balances`, one row per (guild, user). Every
//! mutation appends a `balance_history` entry on the same connection so
//! the ledger commits or rolls back with the balance it explains.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;

use crate::adapter::outbound::sqlite::database::connection::{
    last_insert_rowid, DbConnection, SharedConnection,
};
use crate::adapter::outbound::sqlite::database::model::{NewBalanceHistoryRow, UserBalanceRow};
use crate::adapter::outbound::sqlite::database::schema::{balance_history, user_balances};
use crate::domain::{BalanceAdjustment, BalanceHistory, BalanceHistoryId, GuildId, UserId};
use crate::error::{Error, Result};
use crate::port::outbound::repository::BalanceRepository;
use crate::port::outbound::uow::GuildScope;

/// SQLite-backed balance repository for one tenant.
pub struct SqliteBalanceRepository {
    conn: SharedConnection,
    scope: GuildScope,
}

impl SqliteBalanceRepository {
    /// Bind a repository to a pinned connection and tenant scope.
    #[must_use]
    pub fn new(conn: SharedConnection, scope: GuildScope) -> Self {
        Self { conn, scope }
    }

    fn guild(&self, operation: &'static str) -> Result<GuildId> {
        self.scope.guild_id().ok_or(Error::Scope(operation))
    }

    fn stored_balance(conn: &mut DbConnection, guild_id: GuildId, user_id: UserId) -> Result<i64> {
        let row: Option<UserBalanceRow> = user_balances::table
            .find((guild_id.value(), user_id.value()))
            .first(conn)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(row.map_or(0, |r| r.balance))
    }
}

#[async_trait]
impl BalanceRepository for SqliteBalanceRepository {
    async fn balance(&self, user_id: UserId) -> Result<i64> {
        let guild_id = self.guild("balance")?;
        let mut conn = self.conn.lock();
        Self::stored_balance(&mut conn, guild_id, user_id)
    }

    async fn adjust(&self, adjustment: BalanceAdjustment) -> Result<BalanceHistory> {
        let guild_id = self.guild("adjust")?;
        let now = Utc::now();
        let mut conn = self.conn.lock();

        let before = Self::stored_balance(&mut conn, guild_id, adjustment.user_id)?;
        let after = before + adjustment.amount;
        if after < 0 {
            return Err(Error::Database(format!(
                "balance for user {} in guild {guild_id} would fall below zero \
                 (current {before}, change {:+})",
                adjustment.user_id, adjustment.amount
            )));
        }

        let stamp = now.to_rfc3339();
        diesel::insert_into(user_balances::table)
            .values(&UserBalanceRow {
                guild_id: guild_id.value(),
                user_id: adjustment.user_id.value(),
                balance: after,
                updated_at: stamp.clone(),
            })
            .on_conflict((user_balances::guild_id, user_balances::user_id))
            .do_update()
            .set((
                user_balances::balance.eq(user_balances::balance + adjustment.amount),
                user_balances::updated_at.eq(&stamp),
            ))
            .execute(&mut *conn)
            .map_err(|e| Error::Database(e.to_string()))?;

        let (related_id, related_type) = match adjustment.related {
            Some(r) => (Some(r.id), Some(r.kind.as_str().to_string())),
            None => (None, None),
        };
        diesel::insert_into(balance_history::table)
            .values(&NewBalanceHistoryRow {
                guild_id: guild_id.value(),
                user_id: adjustment.user_id.value(),
                balance_before: before,
                balance_after: after,
                change_amount: adjustment.amount,
                transaction_type: adjustment.transaction_type.as_str().to_string(),
                metadata: adjustment.metadata.to_string(),
                related_id,
                related_type,
                created_at: stamp,
            })
            .execute(&mut *conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        let entry_id: i64 = diesel::select(last_insert_rowid())
            .get_result(&mut *conn)
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(BalanceHistory {
            id: BalanceHistoryId::new(entry_id),
            guild_id,
            user_id: adjustment.user_id,
            balance_before: before,
            balance_after: after,
            change_amount: adjustment.amount,
            transaction_type: adjustment.transaction_type,
            metadata: adjustment.metadata,
            related: adjustment.related,
            created_at: now,
        })
    }
}
