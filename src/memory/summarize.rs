//! Watermark-driven summarization of unsummarized dialogue.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::Error;
use crate::query::join_context;
use crate::sqlite::SummaryRecord;

use super::store::UserMemoryClient;

/// What a summarization run did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SummarizeOutcome {
    /// No dialogue since the last summary.
    UpToDate,
    /// A new summary was written. `indexed` is `false` when its vector entry
    /// could not be stored.
    Summarized { record: SummaryRecord, indexed: bool },
    /// The summarizer failed; nothing was written and the watermark is unchanged.
    Aborted { reason: String },
}

impl UserMemoryClient {
    #[must_use = "handle the error or results may be lost"]
    /// Fold every dialogue after the watermark into one new summary.
    ///
    /// The span starts right after the previous summary's last turn, so runs
    /// never overlap or leave gaps. Calling again with no new dialogue is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns error if the relational store fails or the client is closed.
    /// Summarizer failures yield [`SummarizeOutcome::Aborted`]; embedding and
    /// vector faults leave the summary stored but unindexed.
    pub fn summarize_memory(&self) -> Result<SummarizeOutcome, Error> {
        let _write = self.write_gate();

        let pending = self.with_db(|db| {
            let mark = db.watermark()?;
            db.dialogues_after_watermark(mark)
        })?;
        let (Some(first), Some(last)) = (pending.first(), pending.last()) else {
            debug!(user_id = %self.user_id(), "no new dialogue to summarize");
            return Ok(SummarizeOutcome::UpToDate);
        };

        let transcript = join_context(pending.iter().map(|record| record.text.as_str()));
        let summary_text = match self.providers.summarizer.summarize(&transcript) {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    user_id = %self.user_id(),
                    turns = pending.len(),
                    error = %e,
                    "summarizer failed, run aborted"
                );
                return Ok(SummarizeOutcome::Aborted {
                    reason: e.to_string(),
                });
            }
        };

        let id = self.with_db(|db| {
            db.insert_summary(first.timestamp, last.timestamp, last.id, &summary_text)
        })?;
        let record = SummaryRecord {
            id,
            start_time: first.timestamp,
            end_time: last.timestamp,
            end_dialogue_id: last.id,
            summary_text,
        };

        let indexed = match self.index_summary(&record) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    user_id = %self.user_id(),
                    summary_id = id,
                    error = %e,
                    "summary vector write skipped"
                );
                false
            }
        };

        info!(
            user_id = %self.user_id(),
            summary_id = id,
            start_time = record.start_time,
            end_time = record.end_time,
            turns = pending.len(),
            indexed,
            "summary written"
        );
        Ok(SummarizeOutcome::Summarized { record, indexed })
    }

    fn index_summary(&self, record: &SummaryRecord) -> Result<(), Error> {
        let embedding = self.providers.embedder.embed_one(&record.summary_text)?;
        self.with_index(|index| {
            index.upsert_summary(
                record.id,
                &embedding,
                record.start_time,
                record.end_time,
                &record.summary_text,
            )
        })
    }
}
