//! Database model types for Diesel ORM.

use diesel::prelude::*;

use super::schema::{
    balance_history, group_wager_options, group_wager_participants, group_wagers, user_balances,
};

/// Database row for a group wager (queryable).
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = group_wagers)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct GroupWagerRow {
    pub id: i64,
    pub guild_id: i64,
    pub creator_id: Option<i64>,
    pub condition: String,
    pub state: String,
    pub wager_type: String,
    pub resolver_id: Option<i64>,
    pub winning_option_id: Option<i64>,
    pub total_pot: i64,
    pub message_id: i64,
    pub channel_id: i64,
    pub external_system: Option<String>,
    pub external_id: Option<String>,
    pub voting_starts_at: String,
    pub voting_ends_at: String,
    pub resolved_at: Option<String>,
    pub created_at: String,
}

/// Database row for a group wager (insertable).
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = group_wagers)]
pub struct NewGroupWagerRow {
    pub guild_id: i64,
    pub creator_id: Option<i64>,
    pub condition: String,
    pub state: String,
    pub wager_type: String,
    pub total_pot: i64,
    pub message_id: i64,
    pub channel_id: i64,
    pub external_system: Option<String>,
    pub external_id: Option<String>,
    pub voting_starts_at: String,
    pub voting_ends_at: String,
    pub created_at: String,
}

/// Database row for a wager option (queryable).
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = group_wager_options)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct WagerOptionRow {
    pub id: i64,
    pub group_wager_id: i64,
    pub option_text: String,
    pub option_order: i32,
    pub total_amount: i64,
    pub odds_multiplier: f64,
}

/// Database row for a wager option (insertable).
///
/// `treat_none_as_default_value = false` keeps batch inserts as a single
/// multi-row VALUES statement; the default makes diesel's SQLite backend
/// wrap them in its own transaction, which cannot nest inside the unit of
/// work's explicit transaction. No field is `Option`, so the flag cannot
/// change what gets inserted.
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = group_wager_options)]
#[diesel(treat_none_as_default_value = false)]
pub struct NewWagerOptionRow {
    pub group_wager_id: i64,
    pub option_text: String,
    pub option_order: i32,
    pub total_amount: i64,
    pub odds_multiplier: f64,
}

/// Database row for a wager participant (queryable).
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = group_wager_participants)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ParticipantRow {
    pub id: i64,
    pub group_wager_id: i64,
    pub option_id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub payout_amount: Option<i64>,
    pub balance_history_id: Option<i64>,
}

/// Database row for a wager participant (insertable).
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = group_wager_participants)]
pub struct NewParticipantRow {
    pub group_wager_id: i64,
    pub option_id: i64,
    pub user_id: i64,
    pub amount: i64,
    pub payout_amount: Option<i64>,
    pub balance_history_id: Option<i64>,
}

/// Database row for a user's balance.
#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = user_balances)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UserBalanceRow {
    pub guild_id: i64,
    pub user_id: i64,
    pub balance: i64,
    pub updated_at: String,
}

/// Database row for a ledger entry (queryable).
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = balance_history)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct BalanceHistoryRow {
    pub id: i64,
    pub guild_id: i64,
    pub user_id: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub change_amount: i64,
    pub transaction_type: String,
    pub metadata: String,
    pub related_id: Option<i64>,
    pub related_type: Option<String>,
    pub created_at: String,
}

/// Database row for a ledger entry (insertable).
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = balance_history)]
pub struct NewBalanceHistoryRow {
    pub guild_id: i64,
    pub user_id: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub change_amount: i64,
    pub transaction_type: String,
    pub metadata: String,
    pub related_id: Option<i64>,
    pub related_type: Option<String>,
    pub created_at: String,
}
