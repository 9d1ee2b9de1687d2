use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use gp_core::{
    ColumnSpec, Diagnostics, Event, GridConfig, GridError, LocalizationCandidate, Position,
    Session, Token,
};

use crate::error::{Result, StoreError};
use crate::schema;

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // --- Metadata ---

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        set_metadata_on(&self.conn, key, value)
    }

    fn metadata_u32(&self, key: &str) -> Result<Option<u32>> {
        match self.get_metadata(key)? {
            Some(v) => v
                .parse()
                .map(Some)
                .map_err(|_| StoreError::InvalidData(format!("{key} is not a number: {v}"))),
            None => Ok(None),
        }
    }

    // --- Save ---

    /// Replace everything on disk with `session`.
    pub fn save_session(&self, session: &Session) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute_batch(
            "DELETE FROM event_locations; DELETE FROM events; DELETE FROM columns;
             DELETE FROM tokens; DELETE FROM candidates; DELETE FROM column_positions;",
        )?;

        let config = session.config();
        set_metadata_on(&tx, "session_id", &session.id.to_string())?;
        set_metadata_on(&tx, "grid_size", &config.grid_size.to_string())?;
        set_metadata_on(&tx, "max_step", &config.max_step.to_string())?;

        for (idx, col) in config.columns.iter().enumerate() {
            tx.execute(
                "INSERT INTO columns (idx, start_x, start_y, seed) VALUES (?1, ?2, ?3, ?4)",
                params![idx as i64, col.start.x, col.start.y, col.seed],
            )?;
        }

        {
            let mut stmt = tx.prepare("INSERT INTO tokens (idx, token) VALUES (?1, ?2)")?;
            for (idx, token) in session.tokens().iter().enumerate() {
                stmt.execute(params![idx as i64, token])?;
            }
        }

        for event in session.log().events() {
            insert_event_on(&tx, event)?;
        }

        write_diagnostics_on(&tx, session.diagnostics())?;
        write_focus_on(&tx, session.log().focus(), session.log().is_pinned())?;

        tx.commit()?;
        tracing::debug!(
            session = %session.id,
            events = session.log().len(),
            "saved session"
        );
        Ok(())
    }

    /// Journal one event. Rejects a step that does not exceed the last
    /// stored step, leaving the database untouched.
    pub fn append_event(&self, event: &Event) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        if let Some(last) = last_step_on(&tx)?
            && event.step <= last
        {
            return Err(StoreError::Core(GridError::OrderingViolation {
                last,
                attempted: event.step,
            }));
        }
        insert_event_on(&tx, event)?;
        tx.commit()?;
        Ok(())
    }

    pub fn save_focus(&self, focus: Option<usize>, pinned: bool) -> Result<()> {
        write_focus_on(&self.conn, focus, pinned)
    }

    pub fn save_diagnostics(&self, diagnostics: &Diagnostics) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        write_diagnostics_on(&tx, diagnostics)?;
        tx.commit()?;
        Ok(())
    }

    /// Drop the timeline and diagnostics; config and tokens stay.
    pub fn clear_events(&self) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(
            "DELETE FROM event_locations; DELETE FROM events;
             DELETE FROM candidates; DELETE FROM column_positions;",
        )?;
        write_focus_on(&tx, None, false)?;
        tx.commit()?;
        Ok(())
    }

    pub fn last_step(&self) -> Result<Option<u64>> {
        last_step_on(&self.conn)
    }

    pub fn event_count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    // --- Load ---

    /// Rebuild the stored session, or `None` if nothing was saved yet.
    ///
    /// Paths are re-traced from the stored config and tokens, and events are
    /// replayed through the normal append path, so ordering is re-checked.
    pub fn load_session(&self) -> Result<Option<Session>> {
        let Some(id) = self.get_metadata("session_id")? else {
            return Ok(None);
        };
        let id = Uuid::parse_str(&id)
            .map_err(|e| StoreError::InvalidData(format!("invalid session id '{id}': {e}")))?;

        let config = self.load_config()?;
        let tokens = self.load_tokens()?;
        let mut session = Session::with_id(id, config, tokens)?;

        for event in self.load_events()? {
            session.append(event)?;
        }
        session.set_diagnostics(self.load_diagnostics()?);

        let pinned = self.get_metadata("pinned")?.as_deref() == Some("1");
        let focus = self
            .get_metadata("focus")?
            .and_then(|f| f.parse::<usize>().ok());
        match (pinned, focus) {
            (true, Some(i)) => session.set_focus(i)?,
            _ => session.follow_latest(),
        }

        Ok(Some(session))
    }

    fn load_config(&self) -> Result<GridConfig> {
        let defaults = GridConfig::default();
        let grid_size = self.metadata_u32("grid_size")?.unwrap_or(defaults.grid_size);
        let max_step = self.metadata_u32("max_step")?.unwrap_or(defaults.max_step);

        let mut stmt = self
            .conn
            .prepare("SELECT start_x, start_y, seed FROM columns ORDER BY idx")?;
        let columns = stmt
            .query_map([], |row| {
                Ok(ColumnSpec::new(
                    Position::new(row.get(0)?, row.get(1)?),
                    row.get(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(GridConfig {
            grid_size,
            max_step,
            columns,
        })
    }

    fn load_tokens(&self) -> Result<Vec<Token>> {
        let mut stmt = self.conn.prepare("SELECT token FROM tokens ORDER BY idx")?;
        let tokens = stmt
            .query_map([], |row| row.get::<_, u32>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tokens)
    }

    pub fn load_events(&self) -> Result<Vec<Event>> {
        let mut loc_stmt = self
            .conn
            .prepare("SELECT step, x, y FROM event_locations ORDER BY step, column_idx")?;
        let mut locations: BTreeMap<i64, Vec<Position>> = BTreeMap::new();
        let rows = loc_stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, u32>(2)?,
            ))
        })?;
        for row in rows {
            let (step, x, y) = row?;
            locations.entry(step).or_default().push(Position::new(x, y));
        }

        let mut stmt = self
            .conn
            .prepare("SELECT step, text FROM events ORDER BY step")?;
        let events = stmt
            .query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?
            .map(|row| -> Result<Event> {
                let (step, text) = row?;
                Ok(Event {
                    step: step as u64,
                    text,
                    locations: locations.remove(&step).unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(events)
    }

    fn load_diagnostics(&self) -> Result<Diagnostics> {
        let mut stmt = self
            .conn
            .prepare("SELECT x, y, score FROM candidates ORDER BY idx")?;
        let candidates = stmt
            .query_map([], |row| {
                Ok(LocalizationCandidate {
                    location: Position::new(row.get(0)?, row.get(1)?),
                    score: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = self
            .conn
            .prepare("SELECT x, y FROM column_positions ORDER BY idx")?;
        let column_positions = stmt
            .query_map([], |row| Ok(Position::new(row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Diagnostics {
            candidates,
            column_positions,
        })
    }
}

fn set_metadata_on(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        params![key, value],
    )?;
    Ok(())
}

fn write_focus_on(conn: &Connection, focus: Option<usize>, pinned: bool) -> Result<()> {
    match focus {
        Some(i) => set_metadata_on(conn, "focus", &i.to_string())?,
        None => {
            conn.execute("DELETE FROM metadata WHERE key = 'focus'", [])?;
        }
    }
    set_metadata_on(conn, "pinned", if pinned { "1" } else { "0" })
}

fn step_to_sql(step: u64) -> Result<i64> {
    i64::try_from(step)
        .map_err(|_| StoreError::InvalidData(format!("step {step} exceeds the storable range")))
}

fn last_step_on(conn: &Connection) -> Result<Option<u64>> {
    let last: Option<i64> = conn.query_row("SELECT MAX(step) FROM events", [], |row| row.get(0))?;
    Ok(last.map(|s| s as u64))
}

fn insert_event_on(conn: &Connection, event: &Event) -> Result<()> {
    let step = step_to_sql(event.step)?;
    conn.execute(
        "INSERT INTO events (step, text) VALUES (?1, ?2)",
        params![step, event.text],
    )?;
    let mut stmt = conn.prepare_cached(
        "INSERT INTO event_locations (step, column_idx, x, y) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (idx, loc) in event.locations.iter().enumerate() {
        stmt.execute(params![step, idx as i64, loc.x, loc.y])?;
    }
    Ok(())
}

fn write_diagnostics_on(conn: &Connection, diagnostics: &Diagnostics) -> Result<()> {
    conn.execute_batch("DELETE FROM candidates; DELETE FROM column_positions;")?;
    for (idx, c) in diagnostics.candidates.iter().enumerate() {
        conn.execute(
            "INSERT INTO candidates (idx, x, y, score) VALUES (?1, ?2, ?3, ?4)",
            params![idx as i64, c.location.x, c.location.y, c.score],
        )?;
    }
    for (idx, p) in diagnostics.column_positions.iter().enumerate() {
        conn.execute(
            "INSERT INTO column_positions (idx, x, y) VALUES (?1, ?2, ?3)",
            params![idx as i64, p.x, p.y],
        )?;
    }
    Ok(())
}
