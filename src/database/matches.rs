use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use super::models::{DbMatch, DbMatchPlayer};

const MATCH_COLUMNS: &str =
    "id, team_a_goals, team_b_goals, kind, went_to_penalties, penalty_winner, played_at, created_by";

pub fn insert_match(conn: &Connection, record: &DbMatch) -> rusqlite::Result<i64> {
    let sql = "INSERT INTO matches (team_a_goals, team_b_goals, kind, went_to_penalties, penalty_winner, played_at, created_by) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) RETURNING id";

    conn.query_row(
        sql,
        params![
            record.team_a_goals,
            record.team_b_goals,
            record.kind,
            record.went_to_penalties,
            record.penalty_winner,
            record.played_at,
            record.created_by
        ],
        |row| row.get(0),
    )
}

/// Overwrites the match row; returns the number of rows touched
pub fn update_match(conn: &Connection, record: &DbMatch) -> rusqlite::Result<usize> {
    let sql = "UPDATE matches SET team_a_goals = ?2, team_b_goals = ?3, kind = ?4, went_to_penalties = ?5, penalty_winner = ?6, played_at = ?7, created_by = ?8 WHERE id = ?1";

    conn.execute(
        sql,
        params![
            record.id,
            record.team_a_goals,
            record.team_b_goals,
            record.kind,
            record.went_to_penalties,
            record.penalty_winner,
            record.played_at,
            record.created_by
        ],
    )
}

fn parse_match_row(row: &rusqlite::Row) -> rusqlite::Result<DbMatch> {
    Ok(DbMatch {
        id: row.get(0)?,
        team_a_goals: row.get(1)?,
        team_b_goals: row.get(2)?,
        kind: row.get(3)?,
        went_to_penalties: row.get(4)?,
        penalty_winner: row.get(5)?,
        played_at: row.get(6)?,
        created_by: row.get(7)?,
    })
}

pub fn get_match(conn: &Connection, match_id: i64) -> rusqlite::Result<Option<DbMatch>> {
    let sql = format!("SELECT {} FROM matches WHERE id = ?1", MATCH_COLUMNS);

    conn.query_row(&sql, params![match_id], parse_match_row)
        .optional()
}

pub fn delete_match(conn: &Connection, match_id: i64) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM matches WHERE id = ?1", params![match_id])
}

pub fn insert_players(
    conn: &Connection,
    match_id: i64,
    team: &str,
    player_ids: &[i64],
) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO match_players (match_id, player_id, team, position) VALUES (?1, ?2, ?3, ?4)",
    )?;

    for (position, player_id) in player_ids.iter().enumerate() {
        stmt.execute(params![match_id, player_id, team, position as i32])?;
    }
    Ok(())
}

fn parse_match_player_row(row: &rusqlite::Row) -> rusqlite::Result<DbMatchPlayer> {
    Ok(DbMatchPlayer {
        match_id: row.get(0)?,
        player_id: row.get(1)?,
        team: row.get(2)?,
        position: row.get(3)?,
    })
}

pub fn list_players(conn: &Connection, match_id: i64) -> rusqlite::Result<Vec<DbMatchPlayer>> {
    let sql = "SELECT match_id, player_id, team, position FROM match_players WHERE match_id = ?1 ORDER BY team ASC, position ASC";

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params![match_id], parse_match_player_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

pub fn delete_players(conn: &Connection, match_id: i64) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM match_players WHERE match_id = ?1",
        params![match_id],
    )
}

pub fn ids_after(conn: &Connection, after: i64) -> rusqlite::Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM matches WHERE id > ?1 ORDER BY id ASC")?;
    let rows = stmt
        .query_map(params![after], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

pub fn ids_involving_after(
    conn: &Connection,
    player_ids: &[i64],
    after: i64,
) -> rusqlite::Result<Vec<i64>> {
    if player_ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = (0..player_ids.len())
        .map(|i| format!("?{}", i + 2))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT DISTINCT m.id FROM matches m JOIN match_players mp ON mp.match_id = m.id WHERE m.id > ?1 AND mp.player_id IN ({}) ORDER BY m.id ASC",
        placeholders
    );

    let values = std::iter::once(after).chain(player_ids.iter().copied());
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}
