//! Per-user memory client combining the dialogue log, vector index and buffer.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use crate::buffer::{ShortTermBuffer, MAX_SHORT_TERM_CAPACITY};
use crate::clock::Clock;
use crate::embedding::EmbeddingProvider;
use crate::errors::Error;
use crate::rerank::RerankProvider;
use crate::sqlite::{self, Database, DialogueRecord, SummaryRecord};
use crate::summarizer::Summarizer;
use crate::vector::{self, Collection, VectorIndex};

/// Relational store file inside a user's directory.
pub const DIALOGUE_DB_FILE: &str = "dialogues.db";
/// Vector index file inside a user's directory.
pub const VECTOR_DB_FILE: &str = "vectors.db";

/// Default number of turns embedded together on insertion.
pub const DEFAULT_CONTEXT_WINDOW: usize = 5;
/// Default short-term buffer capacity.
pub const DEFAULT_SHORT_TERM_CAPACITY: usize = 200;
/// Largest window; one relational listing must cover it.
pub const MAX_CONTEXT_WINDOW: usize = sqlite::MAX_LIST_LIMIT;

/// Tunables applied to every client a registry opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientSettings {
    pub short_term_capacity: usize,
    /// Turns per windowed context embedding, the newest included.
    pub context_window: usize,
}

impl ClientSettings {
    /// Settings with both values pulled into their supported ranges.
    pub fn clamped(self) -> Self {
        Self {
            short_term_capacity: self.short_term_capacity.clamp(1, MAX_SHORT_TERM_CAPACITY),
            context_window: self.context_window.clamp(1, MAX_CONTEXT_WINDOW),
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            short_term_capacity: DEFAULT_SHORT_TERM_CAPACITY,
            context_window: DEFAULT_CONTEXT_WINDOW,
        }
    }
}

/// External collaborators shared read-only by every client.
#[derive(Clone)]
pub struct Providers {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub reranker: Arc<dyn RerankProvider>,
    pub summarizer: Arc<dyn Summarizer>,
    pub clock: Arc<dyn Clock>,
}

/// One user's memory: durable dialogue and summary log, raw and summary
/// vector collections, and the volatile short-term buffer.
///
/// Shared as `Arc` across threads. `insert_record`, `summarize_memory` and
/// `close` hold the write side of the gate; queries hold the read side.
/// Connection mutexes are never held across provider calls.
pub struct UserMemoryClient {
    user_id: String,
    pub(crate) db: Mutex<Option<Database>>,
    pub(crate) index: Mutex<Option<VectorIndex>>,
    pub(crate) buffer: Mutex<ShortTermBuffer>,
    gate: RwLock<()>,
    pub(crate) providers: Providers,
    pub(crate) settings: ClientSettings,
}

impl UserMemoryClient {
    /// Open (creating if needed) the stores under `user_dir`.
    ///
    /// The raw and summary collections are declared with the embedding
    /// provider's dimensionality.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created, either store fails
    /// to open, or the existing vector index was created with a different
    /// dimensionality.
    pub fn open(
        user_id: &str,
        user_dir: &Path,
        providers: Providers,
        settings: ClientSettings,
    ) -> Result<Self, Error> {
        let settings = settings.clamped();
        std::fs::create_dir_all(user_dir)?;
        let db = Database::open(&user_dir.join(DIALOGUE_DB_FILE), Arc::clone(&providers.clock))?;
        let index = VectorIndex::open(&user_dir.join(VECTOR_DB_FILE), providers.embedder.dims())?;
        info!(user_id, dims = index.dims(), "memory client opened");

        Ok(Self {
            user_id: user_id.to_string(),
            db: Mutex::new(Some(db)),
            index: Mutex::new(Some(index)),
            buffer: Mutex::new(ShortTermBuffer::new(settings.short_term_capacity)),
            gate: RwLock::new(()),
            providers,
            settings,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn settings(&self) -> ClientSettings {
        self.settings
    }

    pub(crate) fn read_gate(&self) -> RwLockReadGuard<'_, ()> {
        self.gate.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write_gate(&self) -> RwLockWriteGuard<'_, ()> {
        self.gate.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn buffer(&self) -> MutexGuard<'_, ShortTermBuffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the relational store.
    pub(crate) fn with_db<T>(
        &self,
        f: impl FnOnce(&Database) -> sqlite::Result<T>,
    ) -> Result<T, Error> {
        let guard = self.db.lock().unwrap_or_else(PoisonError::into_inner);
        let db = guard
            .as_ref()
            .ok_or_else(|| Error::ClientClosed(self.user_id.clone()))?;
        Ok(f(db)?)
    }

    /// Run `f` against the vector index.
    pub(crate) fn with_index<T>(
        &self,
        f: impl FnOnce(&VectorIndex) -> vector::Result<T>,
    ) -> Result<T, Error> {
        let guard = self.index.lock().unwrap_or_else(PoisonError::into_inner);
        let index = guard
            .as_ref()
            .ok_or_else(|| Error::ClientClosed(self.user_id.clone()))?;
        Ok(f(index)?)
    }

    /// Short-term buffer contents, oldest first.
    pub fn short_term(&self) -> Vec<String> {
        self.buffer().to_vec()
    }

    pub fn short_term_len(&self) -> usize {
        self.buffer().len()
    }

    #[must_use = "handle the error or results may be lost"]
    pub fn get_dialogue(&self, id: i64) -> Result<Option<DialogueRecord>, Error> {
        let _read = self.read_gate();
        self.with_db(|db| db.get_dialogue(id))
    }

    /// The `count` most recent dialogues, newest first.
    #[must_use = "handle the error or results may be lost"]
    pub fn recent_dialogues(&self, count: usize) -> Result<Vec<DialogueRecord>, Error> {
        let _read = self.read_gate();
        self.with_db(|db| db.latest_dialogues(count))
    }

    /// The `count` most recent summaries ending at or before `max_end_time`.
    #[must_use = "handle the error or results may be lost"]
    pub fn recent_summaries(
        &self,
        max_end_time: Option<i64>,
        count: usize,
    ) -> Result<Vec<SummaryRecord>, Error> {
        let _read = self.read_gate();
        self.with_db(|db| db.latest_summaries(max_end_time, count))
    }

    pub fn dialogue_count(&self) -> Result<usize, Error> {
        let _read = self.read_gate();
        self.with_db(|db| db.dialogue_count())
    }

    pub fn summary_count(&self) -> Result<usize, Error> {
        let _read = self.read_gate();
        self.with_db(|db| db.summary_count())
    }

    /// Number of entries in one vector collection.
    pub fn vector_count(&self, collection: Collection) -> Result<usize, Error> {
        let _read = self.read_gate();
        self.with_index(|index| index.count(collection))
    }

    pub fn is_closed(&self) -> bool {
        self.db
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Release both connections. Closing twice is a no-op.
    ///
    /// Waits for in-flight writes and queries. Both connections are released
    /// even if the first close reports an error; that error is returned.
    pub fn close(&self) -> Result<(), Error> {
        let _write = self.write_gate();
        let db = self
            .db
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let index = self
            .index
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if db.is_none() && index.is_none() {
            debug!(user_id = %self.user_id, "memory client already closed");
            return Ok(());
        }

        let db_result = db.map(Database::close).transpose();
        let index_result = index.map(VectorIndex::close).transpose();
        self.buffer().clear();

        if let Err(e) = &db_result {
            warn!(user_id = %self.user_id, error = %e, "dialogue store close failed");
        }
        if let Err(e) = &index_result {
            warn!(user_id = %self.user_id, error = %e, "vector index close failed");
        }
        info!(user_id = %self.user_id, "memory client closed");

        db_result?;
        index_result?;
        Ok(())
    }
}
