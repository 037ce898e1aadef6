use anyhow::Context;
use chrono::{NaiveDateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};

use crate::database::{
    self, history, matches, ratings, DbConn, DbHistoryEntry, DbMatch, DbPool, DbRating,
};
use crate::domain::{
    DateWindow, EntryContext, HistoryEntry, MatchOutcomeInput, NewMatch, RatingRecord,
    RatingSnapshot,
};
use crate::errors::{with_store_context, RatingError, Result};
use crate::rating::{
    Entity, MatchId, MatchKind, PenaltyResult, PlayerId, RatingDelta, RatingType, Team,
};

use super::{HistoryLedger, LedgerStore, MatchStore, RatingStore};

/// Store backed by the SQLite schema in `database/schema.sql`
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Opens (and if needed creates) the database file
    pub fn open(database_path: &str) -> anyhow::Result<Self> {
        let pool = database::create_pool(database_path)?;
        let conn = database::get_connection(&pool)?;
        database::init_database(&conn)
            .with_context(|| format!("Failed to initialize database at {}", database_path))?;
        Ok(Self::new(pool))
    }

    pub fn in_memory() -> anyhow::Result<Self> {
        let pool = database::create_memory_pool()?;
        let conn = database::get_connection(&pool)?;
        database::init_database(&conn)?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    fn connection(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }
}

fn corrupt_row(what: &str, err: RatingError) -> RatingError {
    RatingError::TransientStore(format!("corrupt {} row: {}", what, err))
}

fn rating_from_row(row: DbRating) -> Result<RatingRecord> {
    let entity =
        Entity::from_columns(row.player_id, row.partner_id).map_err(|e| corrupt_row("rating", e))?;
    let rating_type = row
        .rating_type
        .parse()
        .map_err(|e| corrupt_row("rating", e))?;

    Ok(RatingRecord {
        entity,
        rating_type,
        rating: row.rating,
        last_updated: row.last_updated,
    })
}

fn history_from_row(row: DbHistoryEntry) -> Result<HistoryEntry> {
    let entity = Entity::from_columns(row.player_id, row.partner_id)
        .map_err(|e| corrupt_row("history", e))?;
    let rating_type = row
        .rating_type
        .parse()
        .map_err(|e| corrupt_row("history", e))?;
    let result = row.result.parse()?;

    Ok(HistoryEntry {
        id: row.id,
        match_id: row.match_id,
        entity,
        rating_type,
        rating_before: row.rating_before,
        rating_after: row.rating_after,
        rating_change: row.rating_change,
        result,
        penalty_result: PenaltyResult::from_i32(row.penalty_result),
        goal_bonus: row.goal_bonus,
        played_at: row.played_at,
        created_at: row.created_at,
    })
}

fn history_rows(rows: Vec<DbHistoryEntry>) -> Result<Vec<HistoryEntry>> {
    rows.into_iter().map(history_from_row).collect()
}

fn match_row(id: MatchId, new_match: &NewMatch) -> DbMatch {
    DbMatch {
        id,
        team_a_goals: new_match.team_a_goals,
        team_b_goals: new_match.team_b_goals,
        kind: new_match.kind.as_str().to_string(),
        went_to_penalties: new_match.went_to_penalties,
        penalty_winner: new_match.penalty_winner.map(|t| t.as_str().to_string()),
        played_at: new_match.played_at,
        created_by: new_match.created_by,
    }
}

fn write_players(conn: &Connection, match_id: MatchId, new_match: &NewMatch) -> Result<()> {
    let subject = format!("match {}", match_id);
    with_store_context(
        matches::insert_players(conn, match_id, Team::A.as_str(), &new_match.team_a),
        "insert team A",
        &subject,
    )?;
    with_store_context(
        matches::insert_players(conn, match_id, Team::B.as_str(), &new_match.team_b),
        "insert team B",
        &subject,
    )
}

/// Points the rating record at the entity's newest ledger entry
fn refresh_record(
    conn: &Connection,
    entity: &Entity,
    rating_type: RatingType,
    fallback: i32,
    only_if_newer_than: Option<MatchId>,
) -> Result<()> {
    let key = entity.key();
    let newest = with_store_context(
        history::latest_for_entity(conn, &key, rating_type.as_str()),
        "read newest entry",
        &key,
    )?;

    let rating = newest
        .filter(|e| only_if_newer_than.is_none_or(|m| e.match_id > m))
        .map(|e| e.rating_after)
        .unwrap_or(fallback);

    with_store_context(
        ratings::upsert_rating(
            conn,
            &DbRating {
                entity_key: key.clone(),
                rating_type: rating_type.as_str().to_string(),
                player_id: entity.player_id(),
                partner_id: entity.partner_id(),
                rating,
                last_updated: Utc::now().naive_utc(),
            },
        ),
        "write rating",
        &key,
    )
}

impl RatingStore for SqliteStore {
    fn get_rating(&self, entity: &Entity, rating_type: RatingType) -> Result<Option<RatingRecord>> {
        let conn = self.connection()?;
        let key = entity.key();
        with_store_context(
            ratings::get_rating(&conn, &key, rating_type.as_str()),
            "load rating",
            &key,
        )?
        .map(rating_from_row)
        .transpose()
    }

    fn list_ratings(
        &self,
        rating_type: RatingType,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<RatingRecord>> {
        let conn = self.connection()?;
        with_store_context(
            ratings::list_by_type(&conn, rating_type.as_str(), limit, offset),
            "list ratings",
            rating_type.as_str(),
        )?
        .into_iter()
        .map(rating_from_row)
        .collect()
    }

    fn count_ratings(&self, rating_type: RatingType) -> Result<usize> {
        let conn = self.connection()?;
        with_store_context(
            ratings::count_by_type(&conn, rating_type.as_str()),
            "count ratings",
            rating_type.as_str(),
        )
    }
}

impl HistoryLedger for SqliteStore {
    fn entries_for_match(&self, match_id: MatchId) -> Result<Vec<HistoryEntry>> {
        let conn = self.connection()?;
        let rows = with_store_context(
            history::list_by_match(&conn, match_id),
            "load history",
            &format!("match {}", match_id),
        )?;
        history_rows(rows)
    }

    fn snapshot_before(
        &self,
        entity: &Entity,
        rating_type: RatingType,
        match_id: MatchId,
    ) -> Result<RatingSnapshot> {
        let conn = self.connection()?;
        let key = entity.key();
        let (prior_rating, prior_entries) = with_store_context(
            history::prior_summary(&conn, &key, rating_type.as_str(), match_id),
            "read prior rating",
            &key,
        )?;
        Ok(RatingSnapshot {
            prior_rating,
            prior_entries,
        })
    }

    fn latest_entry_at(
        &self,
        entity: &Entity,
        rating_type: RatingType,
        cutoff: NaiveDateTime,
    ) -> Result<Option<HistoryEntry>> {
        let conn = self.connection()?;
        let key = entity.key();
        with_store_context(
            history::latest_at(&conn, &key, rating_type.as_str(), cutoff),
            "load historical rating",
            &key,
        )?
        .map(history_from_row)
        .transpose()
    }

    fn history_page(
        &self,
        entity: &Entity,
        rating_type: RatingType,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<HistoryEntry>> {
        let conn = self.connection()?;
        let key = entity.key();
        let rows = with_store_context(
            history::list_for_entity(&conn, &key, rating_type.as_str(), limit, offset),
            "load history",
            &key,
        )?;
        history_rows(rows)
    }

    fn count_history(&self, entity: &Entity, rating_type: RatingType) -> Result<usize> {
        let conn = self.connection()?;
        let key = entity.key();
        with_store_context(
            history::count_for_entity(&conn, &key, rating_type.as_str()),
            "count history",
            &key,
        )
    }

    fn result_counts(&self, entity: &Entity, rating_type: RatingType) -> Result<(usize, usize)> {
        let conn = self.connection()?;
        let key = entity.key();
        with_store_context(
            history::result_counts(&conn, &key, rating_type.as_str()),
            "count results",
            &key,
        )
    }

    fn entries_in_window(
        &self,
        rating_type: RatingType,
        window: &DateWindow,
    ) -> Result<Vec<HistoryEntry>> {
        let conn = self.connection()?;
        let rows = with_store_context(
            history::list_in_window(&conn, rating_type.as_str(), window.start, window.end),
            "load window",
            rating_type.as_str(),
        )?;
        history_rows(rows)
    }
}

impl LedgerStore for SqliteStore {
    fn apply_update(
        &self,
        entity: &Entity,
        rating_type: RatingType,
        context: &EntryContext,
        default_rating: i32,
        compute: &dyn Fn(RatingSnapshot) -> RatingDelta,
    ) -> Result<HistoryEntry> {
        rating_type.ensure_applies_to(entity)?;

        let mut conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let key = entity.key();

        let (prior_rating, prior_entries) = with_store_context(
            history::prior_summary(&tx, &key, rating_type.as_str(), context.match_id),
            "read prior rating",
            &key,
        )?;
        let delta = compute(RatingSnapshot {
            prior_rating,
            prior_entries,
        });

        let mut row = DbHistoryEntry {
            id: 0,
            match_id: context.match_id,
            entity_key: key.clone(),
            rating_type: rating_type.as_str().to_string(),
            player_id: entity.player_id(),
            partner_id: entity.partner_id(),
            rating_before: prior_rating.unwrap_or(default_rating),
            rating_after: delta.new_rating,
            rating_change: delta.change,
            result: context.result.as_str().to_string(),
            penalty_result: context.penalty_result.as_i32(),
            goal_bonus: context.goal_bonus,
            played_at: context.played_at,
            created_at: Utc::now().naive_utc(),
        };
        row.id = with_store_context(history::insert_entry(&tx, &row), "append history", &key)?;

        refresh_record(&tx, entity, rating_type, delta.new_rating, None)?;
        tx.commit()?;

        history_from_row(row)
    }

    fn revert_entry(&self, entry: &HistoryEntry) -> Result<bool> {
        let mut conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let deleted = with_store_context(
            history::delete_entry(&tx, entry.id),
            "delete history entry",
            &entry.entity.key(),
        )?;
        if deleted == 0 {
            return Ok(false);
        }

        refresh_record(
            &tx,
            &entry.entity,
            entry.rating_type,
            entry.rating_before,
            Some(entry.match_id),
        )?;
        tx.commit()?;
        Ok(true)
    }

    fn clear_ratings(&self) -> Result<()> {
        let mut conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        with_store_context(history::delete_all(&tx), "clear", "rating history")?;
        with_store_context(ratings::delete_all(&tx), "clear", "ratings")?;
        tx.commit()?;
        Ok(())
    }
}

impl MatchStore for SqliteStore {
    fn get_match(&self, match_id: MatchId) -> Result<Option<MatchOutcomeInput>> {
        let conn = self.connection()?;
        let subject = format!("match {}", match_id);

        let Some(row) = with_store_context(matches::get_match(&conn, match_id), "load", &subject)?
        else {
            return Ok(None);
        };
        let players = with_store_context(
            matches::list_players(&conn, match_id),
            "load players",
            &subject,
        )?;

        let kind: MatchKind = row.kind.parse().map_err(|e| corrupt_row("match", e))?;
        let penalty_winner = row
            .penalty_winner
            .as_deref()
            .map(str::parse::<Team>)
            .transpose()
            .map_err(|e| corrupt_row("match", e))?;

        let mut team_a = Vec::new();
        let mut team_b = Vec::new();
        for player in players {
            match player.team.parse::<Team>() {
                Ok(Team::A) => team_a.push(player.player_id),
                Ok(Team::B) => team_b.push(player.player_id),
                Err(e) => return Err(corrupt_row("match player", e)),
            }
        }

        Ok(Some(MatchOutcomeInput {
            id: row.id,
            team_a_goals: row.team_a_goals,
            team_b_goals: row.team_b_goals,
            kind,
            went_to_penalties: row.went_to_penalties,
            penalty_winner,
            team_a,
            team_b,
            played_at: row.played_at,
            created_by: row.created_by,
        }))
    }

    fn insert_match(&self, new_match: &NewMatch) -> Result<MatchId> {
        let normalized = new_match.clone().normalized()?;

        let mut conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let id = with_store_context(
            matches::insert_match(&tx, &match_row(0, &normalized)),
            "insert",
            "new match",
        )?;
        write_players(&tx, id, &normalized)?;
        tx.commit()?;

        Ok(id)
    }

    fn update_match(&self, match_id: MatchId, new_match: &NewMatch) -> Result<()> {
        let normalized = new_match.clone().normalized()?;
        let subject = format!("match {}", match_id);

        let mut conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let updated = with_store_context(
            matches::update_match(&tx, &match_row(match_id, &normalized)),
            "update",
            &subject,
        )?;
        if updated == 0 {
            return Err(RatingError::match_not_found(match_id));
        }

        with_store_context(matches::delete_players(&tx, match_id), "replace players", &subject)?;
        write_players(&tx, match_id, &normalized)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_match(&self, match_id: MatchId) -> Result<()> {
        let subject = format!("match {}", match_id);

        let mut conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        with_store_context(matches::delete_players(&tx, match_id), "delete players", &subject)?;
        let deleted = with_store_context(matches::delete_match(&tx, match_id), "delete", &subject)?;
        if deleted == 0 {
            return Err(RatingError::match_not_found(match_id));
        }
        tx.commit()?;
        Ok(())
    }

    fn match_ids_after(&self, after: MatchId) -> Result<Vec<MatchId>> {
        let conn = self.connection()?;
        with_store_context(
            matches::ids_after(&conn, after),
            "list matches",
            &format!("after {}", after),
        )
    }

    fn matches_involving_after(&self, players: &[PlayerId], after: MatchId) -> Result<Vec<MatchId>> {
        let conn = self.connection()?;
        with_store_context(
            matches::ids_involving_after(&conn, players, after),
            "list matches",
            &format!("players {:?} after {}", players, after),
        )
    }
}
