//! Insertion pipeline: dialogue log, short-term buffer, windowed embedding.

use serde::Serialize;
use tracing::{debug, warn};

use crate::errors::Error;
use crate::query::join_context;

use super::store::UserMemoryClient;

/// Result of a successful insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InsertOutcome {
    /// Id of the new dialogue record.
    pub id: i64,
    /// Whether the raw vector entry was written. `false` means the record is
    /// stored but not reachable by similarity search.
    pub indexed: bool,
}

impl UserMemoryClient {
    #[must_use = "handle the error or results may be lost"]
    /// Store one dialogue turn.
    ///
    /// The turn is appended to the relational log and the short-term buffer,
    /// then the newest `context_window` turns (this one included) are joined
    /// oldest to newest, embedded, and stored in the raw collection under the
    /// new record's id.
    ///
    /// # Errors
    ///
    /// Returns error if the relational write fails or the client is closed.
    /// Embedding and vector faults do not fail the call; they are logged and
    /// reported through [`InsertOutcome::indexed`]. The relational row is not
    /// rolled back in that case.
    pub fn insert_record(&self, role: &str, text: &str) -> Result<InsertOutcome, Error> {
        let _write = self.write_gate();

        let id = self.with_db(|db| db.insert_dialogue(role, text))?;
        if let Some(evicted) = self.buffer().push(text) {
            debug!(
                user_id = %self.user_id(),
                evicted_chars = evicted.len(),
                "short-term buffer full, evicted oldest turn"
            );
        }

        let indexed = match self.index_window(id) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    user_id = %self.user_id(),
                    record_id = id,
                    error = %e,
                    "raw vector write skipped; record stored without embedding"
                );
                false
            }
        };

        debug!(user_id = %self.user_id(), record_id = id, indexed, "dialogue inserted");
        Ok(InsertOutcome { id, indexed })
    }

    /// Embed the window ending at `id` and store it in the raw collection.
    fn index_window(&self, id: i64) -> Result<(), Error> {
        let window = self.with_db(|db| db.latest_dialogues(self.settings.context_window))?;
        let context = join_context(window.iter().rev().map(|record| record.text.as_str()));
        let embedding = self.providers.embedder.embed_one(&context)?;
        self.with_index(|index| index.upsert_raw(id, &embedding))
    }
}
