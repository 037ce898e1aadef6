use anyhow::{Context, Result};
use rusqlite::Connection;

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Drops and recreates every table
pub fn reset_database(conn: &Connection) -> Result<()> {
    apply_statements(conn, SCHEMA_SQL)?;
    log::info!("Database schema reset successfully");
    Ok(())
}

/// Creates the schema unless the tables already exist
pub fn init_database(conn: &Connection) -> Result<()> {
    if schema_exists(conn)? {
        log::debug!("Database schema already present");
        return Ok(());
    }
    reset_database(conn)
}

fn schema_exists(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('matches', 'match_players', 'ratings', 'rating_history')",
            [],
            |row| row.get(0),
        )
        .context("Failed to inspect database schema")?;
    Ok(count == 4)
}

fn apply_statements(conn: &Connection, sql: &str) -> Result<()> {
    let statements = split_sql_statements(sql);

    for (idx, statement) in statements.iter().enumerate() {
        execute_sql(conn, statement)
            .with_context(|| format!("Failed to execute statement {}", idx + 1))?;
    }
    Ok(())
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn execute_sql(conn: &Connection, sql: &str) -> Result<()> {
    conn.execute(sql, [])
        .context("Failed to execute SQL statement")
        .map(|_| ())
}
