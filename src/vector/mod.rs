//! Per-user vector index with two collections.
//!
//! - raw: one entry per inserted dialogue, embedding of its context window
//! - summary: one entry per summary, carrying the summary metadata so
//!   retrieval needs no relational join
//!
//! Embeddings are stored as little-endian f32 BLOBs and searched by exact
//! cosine distance. The dimensionality is fixed when the index file is
//! created and checked on every reopen, upsert and search.

pub mod embedding;
pub mod search;

use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

pub use self::embedding::{blob_to_vec, cosine_distance, cosine_similarity, vec_to_blob};
pub use self::search::{validate_limit, MAX_SEARCH_LIMIT};

/// Error types for vector index operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Vector store error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid BLOB size: expected {expected} bytes, got {actual} bytes")]
    InvalidBlobSize { expected: usize, actual: usize },

    #[error("Mismatched dimensions: expected {expected} dimensions, got {actual} dimensions")]
    MismatchedDimensions { expected: usize, actual: usize },

    #[error("Cannot compute similarity with empty vector")]
    EmptyVector,

    #[error("Invalid embedding: {0}")]
    InvalidEmbedding(String),

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Which of the two collections an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Raw,
    Summary,
}

impl Collection {
    fn table(self) -> &'static str {
        match self {
            Collection::Raw => "raw_vectors",
            Collection::Summary => "summary_vectors",
        }
    }
}

/// Search hit from the raw collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawHit {
    /// Id of the dialogue whose insertion produced this entry.
    pub id: i64,
    pub distance: f64,
}

/// Search hit from the summary collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryHit {
    pub id: i64,
    pub start_time: i64,
    pub end_time: i64,
    pub summary_text: String,
    pub distance: f64,
}

/// SQLite-backed vector index holding one user's raw and summary collections.
pub struct VectorIndex {
    conn: Connection,
    dims: usize,
}

fn create_schema(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS collection_meta (
            key TEXT PRIMARY KEY,
            value INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS raw_vectors (
            entry INTEGER PRIMARY KEY AUTOINCREMENT,
            id INTEGER NOT NULL,
            embedding BLOB NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_raw_vectors_id ON raw_vectors(id);

        CREATE TABLE IF NOT EXISTS summary_vectors (
            entry INTEGER PRIMARY KEY AUTOINCREMENT,
            id INTEGER NOT NULL,
            embedding BLOB NOT NULL,
            start_time INTEGER NOT NULL,
            end_time INTEGER NOT NULL,
            summary_text TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_summary_vectors_id ON summary_vectors(id);
        "#,
    )?;
    Ok(())
}

impl VectorIndex {
    /// Open or create the index at `path` with `dims`-dimensional collections.
    ///
    /// # Errors
    ///
    /// Returns `Error::MismatchedDimensions` if the index already exists with
    /// a different dimensionality, or an error if the file cannot be opened.
    pub fn open(path: &Path, dims: usize) -> Result<Self> {
        if dims == 0 {
            return Err(Error::EmptyVector);
        }

        let mut conn = Connection::open(path)?;
        create_schema(&mut conn)?;

        conn.execute(
            "INSERT OR IGNORE INTO collection_meta (key, value) VALUES ('dims', ?1)",
            [dims as i64],
        )?;
        let declared: i64 = conn.query_row(
            "SELECT value FROM collection_meta WHERE key = 'dims'",
            [],
            |row| row.get(0),
        )?;
        if declared as usize != dims {
            return Err(Error::MismatchedDimensions {
                expected: declared as usize,
                actual: dims,
            });
        }

        Ok(Self { conn, dims })
    }

    /// Dimensionality declared when the collections were created.
    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| Error::from(e))
    }

    /// Add a raw-collection entry keyed by a dialogue id.
    ///
    /// A repeated id is stored as a fresh entry; nothing is overwritten.
    pub fn upsert_raw(&self, id: i64, embedding: &[f32]) -> Result<()> {
        let blob = vec_to_blob(embedding, self.dims)?;
        self.conn.execute(
            "INSERT INTO raw_vectors (id, embedding) VALUES (?1, ?2)",
            params![id, &blob],
        )?;
        Ok(())
    }

    /// Add a summary-collection entry with its metadata.
    pub fn upsert_summary(
        &self,
        id: i64,
        embedding: &[f32],
        start_time: i64,
        end_time: i64,
        summary_text: &str,
    ) -> Result<()> {
        let blob = vec_to_blob(embedding, self.dims)?;
        self.conn.execute(
            r#"
            INSERT INTO summary_vectors (id, embedding, start_time, end_time, summary_text)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![id, &blob, start_time, end_time, summary_text],
        )?;
        Ok(())
    }

    /// Number of entries in a collection.
    pub fn count(&self, collection: Collection) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", collection.table());
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    #[cfg(test)]
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}
