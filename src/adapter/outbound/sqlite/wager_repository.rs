//! SQLite group wager repository.
//!
//! Bound to a unit of work's pinned connection; every statement joins the
//! transaction open on that connection. Aggregate counters (option totals,
//! the pot) are updated with in-database increments, never read-modify-write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::adapter::outbound::sqlite::database::connection::{last_insert_rowid, SharedConnection};
use crate::adapter::outbound::sqlite::database::model::{
    GroupWagerRow, NewGroupWagerRow, NewParticipantRow, NewWagerOptionRow, ParticipantRow,
    WagerOptionRow,
};
use crate::adapter::outbound::sqlite::database::schema::{
    group_wager_options, group_wager_participants, group_wagers,
};
use crate::domain::{
    BalanceHistoryId, ChannelId, ExternalReference, GroupWager, GuildId, MessageId, NewWagerOption,
    OptionId, Participant, ParticipantId, UserId, WagerDetail, WagerId, WagerOption, WagerState,
    WagerType,
};
use crate::error::{Error, Result};
use crate::port::outbound::repository::GroupWagerRepository;
use crate::port::outbound::uow::GuildScope;

diesel::define_sql_function! {
    // Diesel's built-in `sum` maps `BigInt` to `Numeric`, which the SQLite
    // backend cannot load; SQLite keeps integer sums integral.
    #[aggregate]
    #[sql_name = "SUM"]
    fn sum_bigint(expr: diesel::sql_types::BigInt) -> diesel::sql_types::Nullable<diesel::sql_types::BigInt>;
}

/// SQLite-backed store for wagers, their options, and participants.
pub struct SqliteGroupWagerRepository {
    conn: SharedConnection,
    scope: GuildScope,
}

impl SqliteGroupWagerRepository {
    /// Bind a repository to a pinned connection and tenant scope.
    #[must_use]
    pub fn new(conn: SharedConnection, scope: GuildScope) -> Self {
        Self { conn, scope }
    }

    fn guild(&self, operation: &'static str) -> Result<GuildId> {
        self.scope.guild_id().ok_or(Error::Scope(operation))
    }

    fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| Error::Parse(e.to_string()))
    }

    fn wager_from_row(row: GroupWagerRow) -> Result<GroupWager> {
        let external_ref = match (row.external_system, row.external_id) {
            (Some(system), Some(id)) => Some(ExternalReference::new(system, id)),
            _ => None,
        };
        Ok(GroupWager {
            id: WagerId::new(row.id),
            guild_id: GuildId::new(row.guild_id),
            condition: row.condition,
            state: WagerState::parse(&row.state)?,
            wager_type: WagerType::parse(&row.wager_type)?,
            creator_id: row.creator_id.map(UserId::new),
            resolver_id: row.resolver_id.map(UserId::new),
            winning_option_id: row.winning_option_id.map(OptionId::new),
            total_pot: row.total_pot,
            message_id: MessageId::new(row.message_id),
            channel_id: ChannelId::new(row.channel_id),
            external_ref,
            voting_starts_at: Self::parse_timestamp(&row.voting_starts_at)?,
            voting_ends_at: Self::parse_timestamp(&row.voting_ends_at)?,
            resolved_at: row
                .resolved_at
                .as_deref()
                .map(Self::parse_timestamp)
                .transpose()?,
            created_at: Self::parse_timestamp(&row.created_at)?,
        })
    }

    fn option_from_row(row: WagerOptionRow) -> WagerOption {
        WagerOption {
            id: OptionId::new(row.id),
            wager_id: WagerId::new(row.group_wager_id),
            option_text: row.option_text,
            option_order: row.option_order,
            total_amount: row.total_amount,
            odds_multiplier: row.odds_multiplier,
        }
    }

    fn participant_from_row(row: ParticipantRow) -> Participant {
        Participant {
            id: ParticipantId::new(row.id),
            wager_id: WagerId::new(row.group_wager_id),
            user_id: UserId::new(row.user_id),
            option_id: OptionId::new(row.option_id),
            amount: row.amount,
            payout_amount: row.payout_amount,
            balance_history_id: row.balance_history_id.map(BalanceHistoryId::new),
        }
    }

    fn to_row(wager: &GroupWager) -> NewGroupWagerRow {
        NewGroupWagerRow {
            guild_id: wager.guild_id.value(),
            creator_id: wager.creator_id.map(|u| u.value()),
            condition: wager.condition.clone(),
            state: wager.state.as_str().to_string(),
            wager_type: wager.wager_type.as_str().to_string(),
            total_pot: wager.total_pot,
            message_id: wager.message_id.value(),
            channel_id: wager.channel_id.value(),
            external_system: wager.external_ref.as_ref().map(|e| e.system.clone()),
            external_id: wager.external_ref.as_ref().map(|e| e.id.clone()),
            voting_starts_at: wager.voting_starts_at.to_rfc3339(),
            voting_ends_at: wager.voting_ends_at.to_rfc3339(),
            created_at: wager.created_at.to_rfc3339(),
        }
    }
}

#[async_trait]
impl GroupWagerRepository for SqliteGroupWagerRepository {
    async fn create_with_options(
        &self,
        wager: &GroupWager,
        options: &[NewWagerOption],
    ) -> Result<WagerDetail> {
        self.guild("create_with_options")?;
        let mut conn = self.conn.lock();

        diesel::insert_into(group_wagers::table)
            .values(&Self::to_row(wager))
            .execute(&mut *conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        let wager_id: i64 = diesel::select(last_insert_rowid())
            .get_result(&mut *conn)
            .map_err(|e| Error::Database(e.to_string()))?;

        let option_rows: Vec<NewWagerOptionRow> = options
            .iter()
            .map(|o| NewWagerOptionRow {
                group_wager_id: wager_id,
                option_text: o.text.clone(),
                option_order: o.order,
                total_amount: 0,
                odds_multiplier: o.odds_multiplier,
            })
            .collect();
        diesel::insert_into(group_wager_options::table)
            .values(&option_rows)
            .execute(&mut *conn)
            .map_err(|e| Error::Database(e.to_string()))?;

        let persisted: Vec<WagerOptionRow> = group_wager_options::table
            .filter(group_wager_options::group_wager_id.eq(wager_id))
            .order(group_wager_options::option_order.asc())
            .load(&mut *conn)
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut created = wager.clone();
        created.id = WagerId::new(wager_id);
        Ok(WagerDetail {
            wager: created,
            options: persisted.into_iter().map(Self::option_from_row).collect(),
            participants: Vec::new(),
        })
    }

    async fn get_by_id(&self, wager_id: WagerId) -> Result<Option<GroupWager>> {
        let guild_id = self.guild("get_by_id")?;
        let mut conn = self.conn.lock();

        let row: Option<GroupWagerRow> = group_wagers::table
            .filter(group_wagers::id.eq(wager_id.value()))
            .filter(group_wagers::guild_id.eq(guild_id.value()))
            .first(&mut *conn)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;

        row.map(Self::wager_from_row).transpose()
    }

    async fn get_by_message_id(&self, message_id: MessageId) -> Result<Option<GroupWager>> {
        let guild_id = self.guild("get_by_message_id")?;
        let mut conn = self.conn.lock();

        let row: Option<GroupWagerRow> = group_wagers::table
            .filter(group_wagers::message_id.eq(message_id.value()))
            .filter(group_wagers::guild_id.eq(guild_id.value()))
            .first(&mut *conn)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;

        row.map(Self::wager_from_row).transpose()
    }

    async fn get_by_external_reference(
        &self,
        external_ref: &ExternalReference,
    ) -> Result<Option<GroupWager>> {
        let guild_id = self.guild("get_by_external_reference")?;
        let mut conn = self.conn.lock();

        let row: Option<GroupWagerRow> = group_wagers::table
            .filter(group_wagers::guild_id.eq(guild_id.value()))
            .filter(group_wagers::external_system.eq(&external_ref.system))
            .filter(group_wagers::external_id.eq(&external_ref.id))
            .first(&mut *conn)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;

        row.map(Self::wager_from_row).transpose()
    }

    async fn update(&self, wager: &GroupWager) -> Result<()> {
        let guild_id = self.guild("update")?;
        let mut conn = self.conn.lock();

        let updated = diesel::update(
            group_wagers::table
                .filter(group_wagers::id.eq(wager.id.value()))
                .filter(group_wagers::guild_id.eq(guild_id.value())),
        )
        .set((
            group_wagers::state.eq(wager.state.as_str()),
            group_wagers::resolver_id.eq(wager.resolver_id.map(|u| u.value())),
            group_wagers::winning_option_id.eq(wager.winning_option_id.map(|o| o.value())),
            group_wagers::total_pot.eq(wager.total_pot),
            group_wagers::voting_ends_at.eq(wager.voting_ends_at.to_rfc3339()),
            group_wagers::resolved_at.eq(wager.resolved_at.map(|t| t.to_rfc3339())),
        ))
        .execute(&mut *conn)
        .map_err(|e| Error::Database(e.to_string()))?;

        if updated == 0 {
            return Err(Error::Database(format!(
                "group wager {} not found in guild {guild_id}",
                wager.id
            )));
        }
        Ok(())
    }

    async fn get_detail(&self, wager_id: WagerId) -> Result<Option<WagerDetail>> {
        let guild_id = self.guild("get_detail")?;
        let mut conn = self.conn.lock();

        let row: Option<GroupWagerRow> = group_wagers::table
            .filter(group_wagers::id.eq(wager_id.value()))
            .filter(group_wagers::guild_id.eq(guild_id.value()))
            .first(&mut *conn)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        let Some(row) = row else {
            return Ok(None);
        };
        let wager = Self::wager_from_row(row)?;

        let options: Vec<WagerOptionRow> = group_wager_options::table
            .filter(group_wager_options::group_wager_id.eq(wager_id.value()))
            .order(group_wager_options::option_order.asc())
            .load(&mut *conn)
            .map_err(|e| Error::Database(e.to_string()))?;

        let participants: Vec<ParticipantRow> = group_wager_participants::table
            .filter(group_wager_participants::group_wager_id.eq(wager_id.value()))
            .order(group_wager_participants::id.asc())
            .load(&mut *conn)
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(Some(WagerDetail {
            wager,
            options: options.into_iter().map(Self::option_from_row).collect(),
            participants: participants
                .into_iter()
                .map(Self::participant_from_row)
                .collect(),
        }))
    }

    async fn save_participant(&self, participant: &Participant) -> Result<Participant> {
        let mut conn = self.conn.lock();

        let row = NewParticipantRow {
            group_wager_id: participant.wager_id.value(),
            option_id: participant.option_id.value(),
            user_id: participant.user_id.value(),
            amount: participant.amount,
            payout_amount: participant.payout_amount,
            balance_history_id: participant.balance_history_id.map(|h| h.value()),
        };

        // One position per (wager, user); re-bets update in place.
        diesel::insert_into(group_wager_participants::table)
            .values(&row)
            .on_conflict((
                group_wager_participants::group_wager_id,
                group_wager_participants::user_id,
            ))
            .do_update()
            .set((
                group_wager_participants::option_id.eq(row.option_id),
                group_wager_participants::amount.eq(row.amount),
                group_wager_participants::payout_amount.eq(row.payout_amount),
                group_wager_participants::balance_history_id.eq(row.balance_history_id),
            ))
            .execute(&mut *conn)
            .map_err(|e| Error::Database(e.to_string()))?;

        let saved: ParticipantRow = group_wager_participants::table
            .filter(group_wager_participants::group_wager_id.eq(row.group_wager_id))
            .filter(group_wager_participants::user_id.eq(row.user_id))
            .first(&mut *conn)
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(Self::participant_from_row(saved))
    }

    async fn get_participant(
        &self,
        wager_id: WagerId,
        user_id: UserId,
    ) -> Result<Option<Participant>> {
        let mut conn = self.conn.lock();

        let row: Option<ParticipantRow> = group_wager_participants::table
            .filter(group_wager_participants::group_wager_id.eq(wager_id.value()))
            .filter(group_wager_participants::user_id.eq(user_id.value()))
            .first(&mut *conn)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(row.map(Self::participant_from_row))
    }

    async fn update_option_total(&self, option_id: OptionId, delta: i64) -> Result<()> {
        let mut conn = self.conn.lock();

        let updated = diesel::update(
            group_wager_options::table.filter(group_wager_options::id.eq(option_id.value())),
        )
        .set(group_wager_options::total_amount.eq(group_wager_options::total_amount + delta))
        .execute(&mut *conn)
        .map_err(|e| Error::Database(e.to_string()))?;

        if updated == 0 {
            return Err(Error::Database(format!("option {option_id} not found")));
        }
        Ok(())
    }

    async fn add_to_pot(&self, wager_id: WagerId, delta: i64) -> Result<()> {
        let mut conn = self.conn.lock();

        let updated =
            diesel::update(group_wagers::table.filter(group_wagers::id.eq(wager_id.value())))
                .set(group_wagers::total_pot.eq(group_wagers::total_pot + delta))
                .execute(&mut *conn)
                .map_err(|e| Error::Database(e.to_string()))?;

        if updated == 0 {
            return Err(Error::Database(format!("group wager {wager_id} not found")));
        }
        Ok(())
    }

    async fn update_option_odds(&self, option_id: OptionId, odds: f64) -> Result<()> {
        let mut conn = self.conn.lock();

        diesel::update(
            group_wager_options::table.filter(group_wager_options::id.eq(option_id.value())),
        )
        .set(group_wager_options::odds_multiplier.eq(odds))
        .execute(&mut *conn)
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn update_all_option_odds(&self, odds: &[(OptionId, f64)]) -> Result<()> {
        let mut conn = self.conn.lock();

        for (option_id, multiplier) in odds {
            diesel::update(
                group_wager_options::table.filter(group_wager_options::id.eq(option_id.value())),
            )
            .set(group_wager_options::odds_multiplier.eq(*multiplier))
            .execute(&mut *conn)
            .map_err(|e| Error::Database(e.to_string()))?;
        }
        Ok(())
    }

    async fn active_stake_excluding(&self, user_id: UserId, wager_id: WagerId) -> Result<i64> {
        let guild_id = self.guild("active_stake_excluding")?;
        let mut conn = self.conn.lock();

        let committed: Option<i64> = group_wager_participants::table
            .inner_join(group_wagers::table)
            .filter(group_wagers::guild_id.eq(guild_id.value()))
            .filter(group_wagers::state.eq_any([
                WagerState::Active.as_str(),
                WagerState::PendingResolution.as_str(),
            ]))
            .filter(group_wager_participants::user_id.eq(user_id.value()))
            .filter(group_wager_participants::group_wager_id.ne(wager_id.value()))
            .select(sum_bigint(group_wager_participants::amount))
            .first(&mut *conn)
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(committed.unwrap_or(0))
    }

    async fn expired_active(&self, now: DateTime<Utc>) -> Result<Vec<GroupWager>> {
        let cutoff = now.to_rfc3339();
        let mut conn = self.conn.lock();

        // RFC 3339 strings in a fixed offset compare lexicographically.
        let rows: Vec<GroupWagerRow> = group_wagers::table
            .filter(group_wagers::state.eq(WagerState::Active.as_str()))
            .filter(group_wagers::voting_ends_at.le(&cutoff))
            .order(group_wagers::voting_ends_at.asc())
            .load(&mut *conn)
            .map_err(|e| Error::Database(e.to_string()))?;

        rows.into_iter().map(Self::wager_from_row).collect()
    }

    async fn pending_resolution(&self) -> Result<Vec<GroupWager>> {
        let mut conn = self.conn.lock();

        let rows: Vec<GroupWagerRow> = group_wagers::table
            .filter(group_wagers::state.eq(WagerState::PendingResolution.as_str()))
            .order(group_wagers::voting_ends_at.asc())
            .load(&mut *conn)
            .map_err(|e| Error::Database(e.to_string()))?;

        rows.into_iter().map(Self::wager_from_row).collect()
    }

    async fn guilds_with_active_wagers(&self) -> Result<Vec<GuildId>> {
        let mut conn = self.conn.lock();

        let guilds: Vec<i64> = group_wagers::table
            .filter(group_wagers::state.eq(WagerState::Active.as_str()))
            .select(group_wagers::guild_id)
            .distinct()
            .order(group_wagers::guild_id.asc())
            .load(&mut *conn)
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(guilds.into_iter().map(GuildId::new).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::adapter::outbound::sqlite::database::connection::{create_pool, run_migrations};
    use crate::domain::{NewGroupWager, WagerType};

    fn shared_memory_conn() -> SharedConnection {
        let pool = create_pool(":memory:").unwrap();
        run_migrations(&pool).unwrap();
        Arc::new(parking_lot::Mutex::new(pool.get().unwrap()))
    }

    fn repo_for(conn: &SharedConnection, guild: i64) -> SqliteGroupWagerRepository {
        SqliteGroupWagerRepository::new(conn.clone(), GuildScope::Guild(GuildId::new(guild)))
    }

    fn wager_entity(guild: i64, message: i64) -> GroupWager {
        let req = NewGroupWager {
            creator_id: Some(UserId::new(7)),
            condition: "Coin flip".to_string(),
            options: vec!["heads".to_string(), "tails".to_string()],
            initial_odds: vec![0.0, 0.0],
            wager_type: WagerType::Pool,
            voting_period_minutes: 30,
            message_id: MessageId::new(message),
            channel_id: ChannelId::new(2),
            external_ref: None,
        };
        GroupWager::open(GuildId::new(guild), &req, Utc::now())
    }

    fn two_options() -> Vec<NewWagerOption> {
        vec![
            NewWagerOption {
                text: "heads".to_string(),
                order: 0,
                odds_multiplier: 0.0,
            },
            NewWagerOption {
                text: "tails".to_string(),
                order: 1,
                odds_multiplier: 0.0,
            },
        ]
    }

    async fn create(repo: &SqliteGroupWagerRepository, guild: i64, message: i64) -> WagerDetail {
        repo.create_with_options(&wager_entity(guild, message), &two_options())
            .await
            .unwrap()
    }

    // ---- creation and lookups ----

    #[tokio::test]
    async fn create_assigns_ids_and_persists_options() {
        let conn = shared_memory_conn();
        let repo = repo_for(&conn, 1);

        let detail = create(&repo, 1, 100).await;

        assert!(detail.wager.id.value() > 0);
        assert_eq!(detail.options.len(), 2);
        assert!(detail.options.iter().all(|o| o.id.value() > 0));
        assert!(detail
            .options
            .iter()
            .all(|o| o.wager_id == detail.wager.id));
        assert_eq!(detail.options[0].option_text, "heads");
        assert!(detail.participants.is_empty());
    }

    #[tokio::test]
    async fn lookups_are_scoped_to_the_guild() {
        let conn = shared_memory_conn();
        let repo = repo_for(&conn, 1);
        let other_guild = repo_for(&conn, 2);

        let detail = create(&repo, 1, 100).await;

        assert!(repo.get_by_id(detail.wager.id).await.unwrap().is_some());
        assert!(other_guild
            .get_by_id(detail.wager.id)
            .await
            .unwrap()
            .is_none());
        assert!(other_guild
            .get_by_message_id(MessageId::new(100))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn external_reference_lookup_finds_the_same_wager_repeatedly() {
        let conn = shared_memory_conn();
        let repo = repo_for(&conn, 1);

        let mut wager = wager_entity(1, 100);
        wager.external_ref = Some(ExternalReference::new("pandascore", "match-17"));
        let detail = repo
            .create_with_options(&wager, &two_options())
            .await
            .unwrap();

        let ext = ExternalReference::new("pandascore", "match-17");
        let first = repo.get_by_external_reference(&ext).await.unwrap().unwrap();
        let second = repo.get_by_external_reference(&ext).await.unwrap().unwrap();

        assert_eq!(first.id, detail.wager.id);
        assert_eq!(second.id, detail.wager.id);
        assert!(repo
            .get_by_external_reference(&ExternalReference::new("pandascore", "match-18"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn cross_guild_scope_rejects_guild_reads() {
        let conn = shared_memory_conn();
        let repo = SqliteGroupWagerRepository::new(conn, GuildScope::CrossGuild);

        let err = repo.get_by_id(WagerId::new(1)).await.unwrap_err();
        assert!(matches!(err, Error::Scope(_)));
    }

    // ---- updates ----

    #[tokio::test]
    async fn update_persists_resolution_fields() {
        let conn = shared_memory_conn();
        let repo = repo_for(&conn, 1);
        let detail = create(&repo, 1, 100).await;

        let mut wager = detail.wager.clone();
        wager
            .resolve(Some(UserId::new(9)), detail.options[0].id, Utc::now())
            .unwrap();
        repo.update(&wager).await.unwrap();

        let loaded = repo.get_by_id(wager.id).await.unwrap().unwrap();
        assert_eq!(loaded.state, WagerState::Resolved);
        assert_eq!(loaded.resolver_id, Some(UserId::new(9)));
        assert_eq!(loaded.winning_option_id, Some(detail.options[0].id));
        assert!(loaded.resolved_at.is_some());
    }

    #[tokio::test]
    async fn update_refuses_wagers_outside_the_guild() {
        let conn = shared_memory_conn();
        let repo = repo_for(&conn, 1);
        let other_guild = repo_for(&conn, 2);
        let detail = create(&repo, 1, 100).await;

        let err = other_guild.update(&detail.wager).await.unwrap_err();
        assert!(matches!(err, Error::Database(_)));
    }

    #[tokio::test]
    async fn option_and_pot_increments_accumulate() {
        let conn = shared_memory_conn();
        let repo = repo_for(&conn, 1);
        let detail = create(&repo, 1, 100).await;
        let option = detail.options[0].id;

        repo.update_option_total(option, 100).await.unwrap();
        repo.update_option_total(option, 50).await.unwrap();
        repo.update_option_total(option, -30).await.unwrap();
        repo.add_to_pot(detail.wager.id, 120).await.unwrap();

        let fresh = repo.get_detail(detail.wager.id).await.unwrap().unwrap();
        assert_eq!(fresh.option(option).unwrap().total_amount, 120);
        assert_eq!(fresh.wager.total_pot, 120);
    }

    #[tokio::test]
    async fn unknown_option_increment_is_an_error() {
        let conn = shared_memory_conn();
        let repo = repo_for(&conn, 1);
        create(&repo, 1, 100).await;

        let err = repo
            .update_option_total(OptionId::new(999), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Database(_)));
    }

    #[tokio::test]
    async fn odds_updates_apply_to_every_option_in_the_batch() {
        let conn = shared_memory_conn();
        let repo = repo_for(&conn, 1);
        let detail = create(&repo, 1, 100).await;

        repo.update_all_option_odds(&[
            (detail.options[0].id, 3.0),
            (detail.options[1].id, 1.5),
        ])
        .await
        .unwrap();

        let fresh = repo.get_detail(detail.wager.id).await.unwrap().unwrap();
        assert_eq!(fresh.options[0].odds_multiplier, 3.0);
        assert_eq!(fresh.options[1].odds_multiplier, 1.5);
    }

    #[tokio::test]
    async fn single_option_odds_update_leaves_the_rest_untouched() {
        let conn = shared_memory_conn();
        let repo = repo_for(&conn, 1);
        let detail = create(&repo, 1, 100).await;
        let before = detail.options[1].odds_multiplier;

        repo.update_option_odds(detail.options[0].id, 4.0)
            .await
            .unwrap();

        let fresh = repo.get_detail(detail.wager.id).await.unwrap().unwrap();
        assert_eq!(fresh.options[0].odds_multiplier, 4.0);
        assert_eq!(fresh.options[1].odds_multiplier, before);
    }

    // ---- participants ----

    #[tokio::test]
    async fn save_participant_inserts_then_updates_in_place() {
        let conn = shared_memory_conn();
        let repo = repo_for(&conn, 1);
        let detail = create(&repo, 1, 100).await;

        let first = repo
            .save_participant(&Participant::new(
                detail.wager.id,
                UserId::new(5),
                detail.options[0].id,
                100,
            ))
            .await
            .unwrap();
        assert!(first.id.value() > 0);

        let mut moved = first.clone();
        moved.option_id = detail.options[1].id;
        moved.amount = 150;
        let second = repo.save_participant(&moved).await.unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.option_id, detail.options[1].id);
        assert_eq!(second.amount, 150);

        let fresh = repo.get_detail(detail.wager.id).await.unwrap().unwrap();
        assert_eq!(fresh.participants.len(), 1);
    }

    #[tokio::test]
    async fn get_participant_returns_the_position_if_any() {
        let conn = shared_memory_conn();
        let repo = repo_for(&conn, 1);
        let detail = create(&repo, 1, 100).await;

        assert!(repo
            .get_participant(detail.wager.id, UserId::new(5))
            .await
            .unwrap()
            .is_none());

        repo.save_participant(&Participant::new(
            detail.wager.id,
            UserId::new(5),
            detail.options[0].id,
            100,
        ))
        .await
        .unwrap();

        let position = repo
            .get_participant(detail.wager.id, UserId::new(5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(position.amount, 100);
        assert!(position.payout_amount.is_none());
    }

    #[tokio::test]
    async fn active_stake_sums_other_nonterminal_wagers_only() {
        let conn = shared_memory_conn();
        let repo = repo_for(&conn, 1);
        let user = UserId::new(5);

        let first = create(&repo, 1, 100).await;
        let second = create(&repo, 1, 101).await;
        let third = create(&repo, 1, 102).await;

        for (detail, amount) in [(&first, 60_i64), (&second, 40), (&third, 25)] {
            repo.save_participant(&Participant::new(
                detail.wager.id,
                user,
                detail.options[0].id,
                amount,
            ))
            .await
            .unwrap();
        }

        // Everything except the wager being bet on counts.
        let committed = repo
            .active_stake_excluding(user, first.wager.id)
            .await
            .unwrap();
        assert_eq!(committed, 65);

        // Terminal wagers stop counting.
        let mut cancelled = third.wager.clone();
        cancelled.cancel(None, Utc::now()).unwrap();
        repo.update(&cancelled).await.unwrap();
        let committed = repo
            .active_stake_excluding(user, first.wager.id)
            .await
            .unwrap();
        assert_eq!(committed, 40);

        // Pending resolution still counts as committed.
        let mut pending = second.wager.clone();
        pending.close_voting().unwrap();
        repo.update(&pending).await.unwrap();
        let committed = repo
            .active_stake_excluding(user, first.wager.id)
            .await
            .unwrap();
        assert_eq!(committed, 40);

        let no_stakes = repo
            .active_stake_excluding(UserId::new(999), first.wager.id)
            .await
            .unwrap();
        assert_eq!(no_stakes, 0);
    }

    // ---- cross-guild scans ----

    #[tokio::test]
    async fn expired_active_returns_only_lapsed_active_wagers() {
        let conn = shared_memory_conn();
        let guild_one = repo_for(&conn, 1);
        let guild_two = repo_for(&conn, 2);
        let scanner = SqliteGroupWagerRepository::new(conn.clone(), GuildScope::CrossGuild);

        let expired = create(&guild_one, 1, 100).await;
        let mut lapsed = expired.wager.clone();
        lapsed.voting_ends_at = Utc::now() - chrono::Duration::minutes(10);
        guild_one.update(&lapsed).await.unwrap();

        let also_expired = create(&guild_two, 2, 200).await;
        let mut lapsed_two = also_expired.wager.clone();
        lapsed_two.voting_ends_at = Utc::now() - chrono::Duration::minutes(1);
        guild_two.update(&lapsed_two).await.unwrap();

        // Still inside its window.
        create(&guild_one, 1, 101).await;

        // Already past the betting phase.
        let pending = create(&guild_two, 2, 201).await;
        let mut closed = pending.wager.clone();
        closed.voting_ends_at = Utc::now() - chrono::Duration::minutes(5);
        closed.close_voting().unwrap();
        guild_two.update(&closed).await.unwrap();

        let found = scanner.expired_active(Utc::now()).await.unwrap();
        let ids: Vec<WagerId> = found.iter().map(|w| w.id).collect();

        assert_eq!(ids, vec![expired.wager.id, also_expired.wager.id]);
    }

    #[tokio::test]
    async fn pending_resolution_lists_across_guilds() {
        let conn = shared_memory_conn();
        let guild_one = repo_for(&conn, 1);
        let guild_two = repo_for(&conn, 2);
        let scanner = SqliteGroupWagerRepository::new(conn.clone(), GuildScope::CrossGuild);

        for (repo, guild, message) in [(&guild_one, 1, 100), (&guild_two, 2, 200)] {
            let detail = create(repo, guild, message).await;
            let mut wager = detail.wager.clone();
            wager.close_voting().unwrap();
            repo.update(&wager).await.unwrap();
        }
        create(&guild_one, 1, 101).await;

        let pending = scanner.pending_resolution().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending
            .iter()
            .all(|w| w.state == WagerState::PendingResolution));
    }

    #[tokio::test]
    async fn guilds_with_active_wagers_dedupes_guilds() {
        let conn = shared_memory_conn();
        let guild_one = repo_for(&conn, 1);
        let guild_two = repo_for(&conn, 2);
        let scanner = SqliteGroupWagerRepository::new(conn.clone(), GuildScope::CrossGuild);

        create(&guild_one, 1, 100).await;
        create(&guild_one, 1, 101).await;
        create(&guild_two, 2, 200).await;

        let guilds = scanner.guilds_with_active_wagers().await.unwrap();
        assert_eq!(guilds, vec![GuildId::new(1), GuildId::new(2)]);
    }
}
