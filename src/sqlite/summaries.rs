//! Summary log and the summarization watermark.

use rusqlite::{params, Result as SqliteResult, Row};
use serde::Serialize;

use super::{dialogue_from_row, validate_count, Database, DialogueRecord, Result};

/// A condensed span of dialogue, written only by the summarization job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRecord {
    pub id: i64,
    pub start_time: i64,
    pub end_time: i64,
    /// Id of the last dialogue folded into this summary.
    pub end_dialogue_id: i64,
    pub summary_text: String,
}

/// Position in the dialogue timeline up to which history is summarized.
///
/// Ordered by `(end_time, end_dialogue_id)`, so turns sharing a second with
/// the previous run's last turn are neither skipped nor counted twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Watermark {
    pub end_time: i64,
    pub end_dialogue_id: i64,
}

fn summary_from_row(row: &Row<'_>) -> SqliteResult<SummaryRecord> {
    Ok(SummaryRecord {
        id: row.get(0)?,
        start_time: row.get(1)?,
        end_time: row.get(2)?,
        end_dialogue_id: row.get(3)?,
        summary_text: row.get(4)?,
    })
}

impl Database {
    /// Append a summary and return its id.
    pub fn insert_summary(
        &self,
        start_time: i64,
        end_time: i64,
        end_dialogue_id: i64,
        summary_text: &str,
    ) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO summaries (start_time, end_time, end_dialogue_id, summary_text)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![start_time, end_time, end_dialogue_id, summary_text],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// The `count` most recent summaries, newest first.
    ///
    /// With `max_end_time`, only summaries ending at or before it are considered.
    pub fn latest_summaries(
        &self,
        max_end_time: Option<i64>,
        count: usize,
    ) -> Result<Vec<SummaryRecord>> {
        validate_count(count)?;
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, start_time, end_time, end_dialogue_id, summary_text
            FROM summaries
            WHERE ?1 IS NULL OR end_time <= ?1
            ORDER BY end_time DESC, id DESC
            LIMIT ?2
            "#,
        )?;

        let records: SqliteResult<Vec<SummaryRecord>> = stmt
            .query_map(params![max_end_time, count as i64], summary_from_row)?
            .collect();

        Ok(records?)
    }

    pub fn get_summary(&self, id: i64) -> Result<Option<SummaryRecord>> {
        use rusqlite::OptionalExtension;

        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, start_time, end_time, end_dialogue_id, summary_text
            FROM summaries
            WHERE id = ?1
            "#,
        )?;

        Ok(stmt.query_row([id], summary_from_row).optional()?)
    }

    pub fn summary_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM summaries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Watermark of the most recent summary, or the zero watermark if none exist.
    pub fn watermark(&self) -> Result<Watermark> {
        Ok(self
            .latest_summaries(None, 1)?
            .first()
            .map(|s| Watermark {
                end_time: s.end_time,
                end_dialogue_id: s.end_dialogue_id,
            })
            .unwrap_or_default())
    }

    /// Dialogues past `mark`, oldest first.
    pub fn dialogues_after_watermark(&self, mark: Watermark) -> Result<Vec<DialogueRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, time, role, text
            FROM dialogues
            WHERE time > ?1 OR (time = ?1 AND id > ?2)
            ORDER BY time ASC, id ASC
            "#,
        )?;

        let records: SqliteResult<Vec<DialogueRecord>> = stmt
            .query_map(params![mark.end_time, mark.end_dialogue_id], dialogue_from_row)?
            .collect();

        Ok(records?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn create_test_db() -> (Database, Arc<ManualClock>, TempDir) {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(100));
        let db = Database::open(&dir.path().join("dialogues.db"), clock.clone()).unwrap();
        (db, clock, dir)
    }

    #[test]
    fn test_insert_and_get_summary() {
        let (db, _clock, _dir) = create_test_db();
        let id = db.insert_summary(100, 200, 7, "talked about rust").unwrap();

        let summary = db.get_summary(id).unwrap().unwrap();
        assert_eq!(summary.start_time, 100);
        assert_eq!(summary.end_time, 200);
        assert_eq!(summary.end_dialogue_id, 7);
        assert_eq!(summary.summary_text, "talked about rust");
        assert_eq!(db.summary_count().unwrap(), 1);
    }

    #[test]
    fn test_latest_summaries_ordering_and_filter() {
        let (db, _clock, _dir) = create_test_db();
        db.insert_summary(0, 10, 1, "first").unwrap();
        db.insert_summary(11, 20, 2, "second").unwrap();
        db.insert_summary(21, 30, 3, "third").unwrap();

        let latest = db.latest_summaries(None, 2).unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].summary_text, "third");
        assert_eq!(latest[1].summary_text, "second");

        let bounded = db.latest_summaries(Some(20), 5).unwrap();
        let texts: Vec<&str> = bounded.iter().map(|s| s.summary_text.as_str()).collect();
        assert_eq!(texts, vec!["second", "first"]);

        assert!(db.latest_summaries(Some(5), 5).unwrap().is_empty());
    }

    #[test]
    fn test_watermark_defaults_to_zero() {
        let (db, _clock, _dir) = create_test_db();
        assert_eq!(db.watermark().unwrap(), Watermark::default());
    }

    #[test]
    fn test_watermark_tracks_latest_summary() {
        let (db, _clock, _dir) = create_test_db();
        db.insert_summary(0, 10, 4, "a").unwrap();
        db.insert_summary(11, 25, 9, "b").unwrap();
        assert_eq!(
            db.watermark().unwrap(),
            Watermark {
                end_time: 25,
                end_dialogue_id: 9
            }
        );
    }

    #[test]
    fn test_dialogues_after_watermark_includes_same_second_later_ids() {
        let (db, clock, _dir) = create_test_db();
        let first = db.insert_dialogue("user", "a").unwrap();
        let second = db.insert_dialogue("user", "b").unwrap();
        clock.advance(1);
        let third = db.insert_dialogue("user", "c").unwrap();

        let mark = Watermark {
            end_time: 100,
            end_dialogue_id: first,
        };
        let ids: Vec<i64> = db
            .dialogues_after_watermark(mark)
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec![second, third]);
    }

    #[test]
    fn test_dialogues_after_zero_watermark_returns_everything() {
        let (db, _clock, _dir) = create_test_db();
        db.insert_dialogue("user", "a").unwrap();
        db.insert_dialogue("user", "b").unwrap();
        assert_eq!(
            db.dialogues_after_watermark(Watermark::default())
                .unwrap()
                .len(),
            2
        );
    }
}
