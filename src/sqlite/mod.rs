//! SQLite backend for the per-user dialogue log.
//!
//! This module provides:
//! - `Database`: connection and schema management plus dialogue operations
//! - `DialogueRecord` / `SummaryRecord`: rows of the two logical tables
//! - `summaries`: summary log operations and the summarization watermark

pub mod summaries;

use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::clock::Clock;

pub use self::summaries::{SummaryRecord, Watermark};

/// Maximum number of rows a single listing may return.
pub const MAX_LIST_LIMIT: usize = 10_000;

/// One raw dialogue turn. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DialogueRecord {
    pub id: i64,
    /// Seconds since the Unix epoch, assigned on insertion.
    pub timestamp: i64,
    pub role: String,
    pub text: String,
}

/// Error types for SQLite operations.
#[derive(Debug)]
pub enum Error {
    Sqlite(String),
    InvalidLimit(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Sqlite(msg) => write!(f, "Database error: {}", msg),
            Error::InvalidLimit(msg) => write!(f, "Invalid limit: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Sqlite(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// SQLite relational store holding one user's dialogues and summaries.
pub struct Database {
    conn: Connection,
    clock: Arc<dyn Clock>,
}

/// Initialize database schema.
fn create_schema(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS dialogues (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            time INTEGER NOT NULL,
            role TEXT NOT NULL,
            text TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_dialogues_time ON dialogues(time, id);
        CREATE INDEX IF NOT EXISTS idx_dialogues_text ON dialogues(text);

        CREATE TABLE IF NOT EXISTS summaries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            start_time INTEGER NOT NULL,
            end_time INTEGER NOT NULL,
            end_dialogue_id INTEGER NOT NULL,
            summary_text TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_summaries_end ON summaries(end_time, id);
        "#,
    )?;
    Ok(())
}

/// Clamp a listing size. Zero is allowed and yields no rows.
fn validate_count(count: usize) -> Result<()> {
    if count > MAX_LIST_LIMIT {
        return Err(Error::InvalidLimit(format!(
            "Count {} exceeds maximum allowed ({})",
            count, MAX_LIST_LIMIT
        )));
    }
    Ok(())
}

fn dialogue_from_row(row: &Row<'_>) -> SqliteResult<DialogueRecord> {
    Ok(DialogueRecord {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        role: row.get(2)?,
        text: row.get(3)?,
    })
}

impl Database {
    /// Open or create a SQLite database at the given path.
    ///
    /// Initializes the schema if the database is new. Timestamps for new
    /// dialogues come from `clock`.
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened or schema initialization fails.
    pub fn open(path: &Path, clock: Arc<dyn Clock>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        create_schema(&mut conn)?;
        Ok(Self { conn, clock })
    }

    /// Close the connection, surfacing any error from the final flush.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| Error::from(e))
    }

    /// Append a dialogue turn stamped with the current time and return its id.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails.
    pub fn insert_dialogue(&self, role: &str, text: &str) -> Result<i64> {
        let now = self.clock.now();
        self.conn.execute(
            "INSERT INTO dialogues (time, role, text) VALUES (?1, ?2, ?3)",
            params![now, role, text],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// The `count` most recent dialogues, newest first.
    ///
    /// # Errors
    ///
    /// Returns error if `count` exceeds `MAX_LIST_LIMIT` or the query fails.
    pub fn latest_dialogues(&self, count: usize) -> Result<Vec<DialogueRecord>> {
        validate_count(count)?;
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, time, role, text
            FROM dialogues
            ORDER BY time DESC, id DESC
            LIMIT ?1
            "#,
        )?;

        let records: SqliteResult<Vec<DialogueRecord>> = stmt
            .query_map([count as i64], dialogue_from_row)?
            .collect();

        Ok(records?)
    }

    /// All dialogues with a timestamp strictly after `time`, oldest first.
    pub fn dialogues_after(&self, time: i64) -> Result<Vec<DialogueRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, time, role, text
            FROM dialogues
            WHERE time > ?1
            ORDER BY time ASC, id ASC
            "#,
        )?;

        let records: SqliteResult<Vec<DialogueRecord>> =
            stmt.query_map([time], dialogue_from_row)?.collect();

        Ok(records?)
    }

    /// Most recent dialogue whose text equals `text` exactly.
    pub fn find_exact_text(&self, text: &str) -> Result<Option<DialogueRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, time, role, text
            FROM dialogues
            WHERE text = ?1
            ORDER BY id DESC
            LIMIT 1
            "#,
        )?;

        Ok(stmt.query_row([text], dialogue_from_row).optional()?)
    }

    /// Retrieve a single dialogue by id.
    pub fn get_dialogue(&self, id: i64) -> Result<Option<DialogueRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, time, role, text
            FROM dialogues
            WHERE id = ?1
            "#,
        )?;

        Ok(stmt.query_row([id], dialogue_from_row).optional()?)
    }

    pub fn dialogue_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM dialogues", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    #[cfg(test)]
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use tempfile::TempDir;

    fn create_test_db() -> (Database, Arc<ManualClock>, TempDir) {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let db = Database::open(&dir.path().join("dialogues.db"), clock.clone()).unwrap();
        (db, clock, dir)
    }

    #[test]
    fn test_insert_and_get() {
        let (db, _clock, _dir) = create_test_db();
        let id = db.insert_dialogue("user", "hello there").unwrap();

        let record = db.get_dialogue(id).unwrap().unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.role, "user");
        assert_eq!(record.text, "hello there");
        assert_eq!(record.timestamp, 1_700_000_000);
    }

    #[test]
    fn test_ids_are_monotonic() {
        let (db, _clock, _dir) = create_test_db();
        let a = db.insert_dialogue("user", "a").unwrap();
        let b = db.insert_dialogue("assistant", "b").unwrap();
        let c = db.insert_dialogue("user", "c").unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_latest_dialogues_newest_first() {
        let (db, clock, _dir) = create_test_db();
        for text in ["one", "two", "three"] {
            db.insert_dialogue("user", text).unwrap();
            clock.advance(1);
        }

        let latest = db.latest_dialogues(2).unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].text, "three");
        assert_eq!(latest[1].text, "two");
    }

    #[test]
    fn test_latest_dialogues_same_second_ordered_by_id() {
        let (db, _clock, _dir) = create_test_db();
        db.insert_dialogue("user", "first").unwrap();
        db.insert_dialogue("user", "second").unwrap();

        let latest = db.latest_dialogues(5).unwrap();
        assert_eq!(latest[0].text, "second");
        assert_eq!(latest[1].text, "first");
    }

    #[test]
    fn test_latest_dialogues_zero_and_too_large() {
        let (db, _clock, _dir) = create_test_db();
        db.insert_dialogue("user", "x").unwrap();
        assert!(db.latest_dialogues(0).unwrap().is_empty());
        assert!(matches!(
            db.latest_dialogues(MAX_LIST_LIMIT + 1),
            Err(Error::InvalidLimit(_))
        ));
    }

    #[test]
    fn test_dialogues_after_is_strict_and_ascending() {
        let (db, clock, _dir) = create_test_db();
        db.insert_dialogue("user", "old").unwrap();
        clock.advance(10);
        db.insert_dialogue("user", "new 1").unwrap();
        clock.advance(1);
        db.insert_dialogue("user", "new 2").unwrap();

        let after = db.dialogues_after(1_700_000_000).unwrap();
        let texts: Vec<&str> = after.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, vec!["new 1", "new 2"]);
    }

    #[test]
    fn test_find_exact_text() {
        let (db, _clock, _dir) = create_test_db();
        db.insert_dialogue("user", "hello").unwrap();
        db.insert_dialogue("user", "hello world").unwrap();
        let latest_hello = db.insert_dialogue("assistant", "hello").unwrap();

        let found = db.find_exact_text("hello").unwrap().unwrap();
        assert_eq!(found.id, latest_hello);
        assert!(db.find_exact_text("Hello").unwrap().is_none());
        assert!(db.find_exact_text("hell").unwrap().is_none());
    }

    #[test]
    fn test_dialogue_count() {
        let (db, _clock, _dir) = create_test_db();
        assert_eq!(db.dialogue_count().unwrap(), 0);
        db.insert_dialogue("user", "a").unwrap();
        db.insert_dialogue("user", "b").unwrap();
        assert_eq!(db.dialogue_count().unwrap(), 2);
    }

    #[test]
    fn test_database_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dialogues.db");
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(10));

        {
            let db = Database::open(&path, clock.clone()).unwrap();
            db.insert_dialogue("user", "persistent").unwrap();
            db.close().unwrap();
        }

        let db = Database::open(&path, clock).unwrap();
        let latest = db.latest_dialogues(10).unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].text, "persistent");
    }

    #[test]
    fn test_schema_has_both_tables() {
        let (db, _clock, _dir) = create_test_db();
        let tables: i64 = db
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('dialogues', 'summaries')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 2);
    }

    #[test]
    fn test_error_display() {
        let err = Error::InvalidLimit("Count 20000 exceeds maximum allowed (10000)".into());
        let msg = format!("{}", err);
        assert!(msg.contains("Invalid limit"));
        assert!(msg.contains("20000"));
    }
}
