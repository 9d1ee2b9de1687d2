use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 1;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;

    // Events are keyed by step: the primary key enforces uniqueness, the
    // store enforces strict increase before inserting.
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS columns (
            idx     INTEGER PRIMARY KEY,
            start_x INTEGER NOT NULL,
            start_y INTEGER NOT NULL,
            seed    INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tokens (
            idx   INTEGER PRIMARY KEY,
            token INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS events (
            step INTEGER PRIMARY KEY,
            text TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS event_locations (
            step       INTEGER NOT NULL REFERENCES events(step) ON DELETE CASCADE,
            column_idx INTEGER NOT NULL,
            x          INTEGER NOT NULL,
            y          INTEGER NOT NULL,
            PRIMARY KEY (step, column_idx)
        );

        CREATE TABLE IF NOT EXISTS candidates (
            idx   INTEGER PRIMARY KEY,
            x     INTEGER NOT NULL,
            y     INTEGER NOT NULL,
            score REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS column_positions (
            idx INTEGER PRIMARY KEY,
            x   INTEGER NOT NULL,
            y   INTEGER NOT NULL
        );
        ",
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> Result<Option<i64>> {
    let mut stmt = conn.prepare("SELECT value FROM metadata WHERE key = 'schema_version'")?;
    let version = stmt
        .query_row([], |row| {
            let v: String = row.get(0)?;
            Ok(v.parse::<i64>().unwrap_or(0))
        })
        .ok();
    Ok(version)
}
