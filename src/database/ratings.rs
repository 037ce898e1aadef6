use rusqlite::{params, Connection, OptionalExtension};

use super::models::DbRating;

const RATING_COLUMNS: &str =
    "entity_key, rating_type, player_id, partner_id, rating, last_updated";

pub fn upsert_rating(conn: &Connection, rating: &DbRating) -> rusqlite::Result<()> {
    let sql = "INSERT INTO ratings (entity_key, rating_type, player_id, partner_id, rating, last_updated) VALUES (?1, ?2, ?3, ?4, ?5, ?6) ON CONFLICT(entity_key, rating_type) DO UPDATE SET rating = excluded.rating, last_updated = excluded.last_updated";

    conn.execute(
        sql,
        params![
            rating.entity_key,
            rating.rating_type,
            rating.player_id,
            rating.partner_id,
            rating.rating,
            rating.last_updated
        ],
    )?;
    Ok(())
}

fn parse_db_rating_row(row: &rusqlite::Row) -> rusqlite::Result<DbRating> {
    Ok(DbRating {
        entity_key: row.get(0)?,
        rating_type: row.get(1)?,
        player_id: row.get(2)?,
        partner_id: row.get(3)?,
        rating: row.get(4)?,
        last_updated: row.get(5)?,
    })
}

pub fn get_rating(
    conn: &Connection,
    entity_key: &str,
    rating_type: &str,
) -> rusqlite::Result<Option<DbRating>> {
    let sql = format!(
        "SELECT {} FROM ratings WHERE entity_key = ?1 AND rating_type = ?2",
        RATING_COLUMNS
    );

    conn.query_row(&sql, params![entity_key, rating_type], parse_db_rating_row)
        .optional()
}

pub fn list_by_type(
    conn: &Connection,
    rating_type: &str,
    limit: usize,
    offset: usize,
) -> rusqlite::Result<Vec<DbRating>> {
    let sql = format!(
        "SELECT {} FROM ratings WHERE rating_type = ?1 ORDER BY rating DESC, player_id ASC, partner_id ASC LIMIT ?2 OFFSET ?3",
        RATING_COLUMNS
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            params![rating_type, limit as i64, offset as i64],
            parse_db_rating_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

pub fn count_by_type(conn: &Connection, rating_type: &str) -> rusqlite::Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM ratings WHERE rating_type = ?1",
        params![rating_type],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

pub fn delete_all(conn: &Connection) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM ratings", [])
}
