use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use super::models::DbHistoryEntry;

const HISTORY_COLUMNS: &str = "id, match_id, entity_key, rating_type, player_id, partner_id, rating_before, rating_after, rating_change, result, penalty_result, goal_bonus, played_at, created_at";

/// Inserts the entry and returns its new id; `entry.id` is ignored
pub fn insert_entry(conn: &Connection, entry: &DbHistoryEntry) -> rusqlite::Result<i64> {
    let sql = "INSERT INTO rating_history (match_id, entity_key, rating_type, player_id, partner_id, rating_before, rating_after, rating_change, result, penalty_result, goal_bonus, played_at, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13) RETURNING id";

    conn.query_row(
        sql,
        params![
            entry.match_id,
            entry.entity_key,
            entry.rating_type,
            entry.player_id,
            entry.partner_id,
            entry.rating_before,
            entry.rating_after,
            entry.rating_change,
            entry.result,
            entry.penalty_result,
            entry.goal_bonus,
            entry.played_at,
            entry.created_at
        ],
        |row| row.get(0),
    )
}

fn parse_history_row(row: &rusqlite::Row) -> rusqlite::Result<DbHistoryEntry> {
    Ok(DbHistoryEntry {
        id: row.get(0)?,
        match_id: row.get(1)?,
        entity_key: row.get(2)?,
        rating_type: row.get(3)?,
        player_id: row.get(4)?,
        partner_id: row.get(5)?,
        rating_before: row.get(6)?,
        rating_after: row.get(7)?,
        rating_change: row.get(8)?,
        result: row.get(9)?,
        penalty_result: row.get(10)?,
        goal_bonus: row.get(11)?,
        played_at: row.get(12)?,
        created_at: row.get(13)?,
    })
}

pub fn list_by_match(conn: &Connection, match_id: i64) -> rusqlite::Result<Vec<DbHistoryEntry>> {
    let sql = format!(
        "SELECT {} FROM rating_history WHERE match_id = ?1 ORDER BY id DESC",
        HISTORY_COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![match_id], parse_history_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

/// Latest `rating_after` and entry count from matches before `match_id`
pub fn prior_summary(
    conn: &Connection,
    entity_key: &str,
    rating_type: &str,
    match_id: i64,
) -> rusqlite::Result<(Option<i32>, usize)> {
    let latest: Option<i32> = conn
        .query_row(
            "SELECT rating_after FROM rating_history WHERE entity_key = ?1 AND rating_type = ?2 AND match_id < ?3 ORDER BY match_id DESC, id DESC LIMIT 1",
            params![entity_key, rating_type, match_id],
            |row| row.get(0),
        )
        .optional()?;

    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM rating_history WHERE entity_key = ?1 AND rating_type = ?2 AND match_id < ?3",
        params![entity_key, rating_type, match_id],
        |row| row.get(0),
    )?;

    Ok((latest, count as usize))
}

/// Newest entry by match id
pub fn latest_for_entity(
    conn: &Connection,
    entity_key: &str,
    rating_type: &str,
) -> rusqlite::Result<Option<DbHistoryEntry>> {
    let sql = format!(
        "SELECT {} FROM rating_history WHERE entity_key = ?1 AND rating_type = ?2 ORDER BY match_id DESC, id DESC LIMIT 1",
        HISTORY_COLUMNS
    );

    conn.query_row(&sql, params![entity_key, rating_type], parse_history_row)
        .optional()
}

pub fn latest_at(
    conn: &Connection,
    entity_key: &str,
    rating_type: &str,
    cutoff: NaiveDateTime,
) -> rusqlite::Result<Option<DbHistoryEntry>> {
    let sql = format!(
        "SELECT {} FROM rating_history WHERE entity_key = ?1 AND rating_type = ?2 AND played_at <= ?3 ORDER BY played_at DESC, match_id DESC, id DESC LIMIT 1",
        HISTORY_COLUMNS
    );

    conn.query_row(
        &sql,
        params![entity_key, rating_type, cutoff],
        parse_history_row,
    )
    .optional()
}

pub fn list_for_entity(
    conn: &Connection,
    entity_key: &str,
    rating_type: &str,
    limit: usize,
    offset: usize,
) -> rusqlite::Result<Vec<DbHistoryEntry>> {
    let sql = format!(
        "SELECT {} FROM rating_history WHERE entity_key = ?1 AND rating_type = ?2 ORDER BY match_id DESC, id DESC LIMIT ?3 OFFSET ?4",
        HISTORY_COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            params![entity_key, rating_type, limit as i64, offset as i64],
            parse_history_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

pub fn count_for_entity(
    conn: &Connection,
    entity_key: &str,
    rating_type: &str,
) -> rusqlite::Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM rating_history WHERE entity_key = ?1 AND rating_type = ?2",
        params![entity_key, rating_type],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// (total entries, entries with result 'win')
pub fn result_counts(
    conn: &Connection,
    entity_key: &str,
    rating_type: &str,
) -> rusqlite::Result<(usize, usize)> {
    let (total, wins): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(CASE WHEN result = 'win' THEN 1 ELSE 0 END), 0) FROM rating_history WHERE entity_key = ?1 AND rating_type = ?2",
        params![entity_key, rating_type],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok((total as usize, wins as usize))
}

pub fn list_in_window(
    conn: &Connection,
    rating_type: &str,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> rusqlite::Result<Vec<DbHistoryEntry>> {
    let sql = format!(
        "SELECT {} FROM rating_history WHERE rating_type = ?1 AND played_at >= ?2 AND played_at <= ?3 ORDER BY played_at ASC, match_id ASC, id ASC",
        HISTORY_COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![rating_type, start, end], parse_history_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

pub fn delete_entry(conn: &Connection, id: i64) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM rating_history WHERE id = ?1", params![id])
}

pub fn delete_all(conn: &Connection) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM rating_history", [])
}
