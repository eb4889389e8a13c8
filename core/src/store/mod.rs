//! SQLite record store.
//!
//! RULE: Only the store talks to the database.
//! Calculators never see it; the desk calls store methods and wraps each
//! read-modify-write in `atomically` so concurrent submissions for the
//! same record cannot lose updates.

use crate::{error::AnalyticsResult, event::EventLogEntry};
use rusqlite::{params, Connection, Transaction, TransactionBehavior};

mod campaign;
mod experiment;
mod retention;

pub struct AnalyticsStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl AnalyticsStore {
    /// Open (or create) the analytics database at `path`.
    pub fn open(path: &str) -> AnalyticsResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only takes effect for real files; :memory: reports "memory".
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> AnalyticsResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Reopen a new connection to the same database.
    /// For in-memory databases, this returns a new in-memory database (isolated).
    pub fn reopen(&self) -> AnalyticsResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> AnalyticsResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_experiments.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_campaigns.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/004_retention.sql"))?;
        Ok(())
    }

    /// Run `f` inside an IMMEDIATE transaction: the write lock is taken
    /// before the first read, so a read-modify-write of one record is atomic.
    /// Any error rolls the whole unit back.
    pub fn atomically<T>(
        &self,
        f: impl FnOnce(&Self) -> AnalyticsResult<T>,
    ) -> AnalyticsResult<T> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let out = f(self)?;
        tx.commit()?;
        Ok(out)
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> AnalyticsResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (entity_id, event_type, payload, recorded_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.entity_id,
                entry.event_type,
                entry.payload,
                entry.recorded_at,
            ],
        )?;
        Ok(())
    }

    pub fn events_for_entity(&self, entity_id: &str) -> AnalyticsResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, entity_id, event_type, payload, recorded_at
             FROM event_log WHERE entity_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![entity_id], |row| {
                Ok(EventLogEntry {
                    id:          Some(row.get(0)?),
                    entity_id:   row.get(1)?,
                    event_type:  row.get(2)?,
                    payload:     row.get(3)?,
                    recorded_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn event_count(&self) -> AnalyticsResult<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM event_log", [], |row| row.get(0))
            .map_err(Into::into)
    }
}

/// Map a TEXT column through an enum parser.
fn parse_text<T>(
    idx: usize,
    raw: String,
    parse: impl Fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unrecognised value '{raw}'").into(),
        )
    })
}
