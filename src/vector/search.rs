//! Similarity search over the raw and summary collections.

use tracing::warn;

use super::{embedding, Error, RawHit, Result, SummaryHit, VectorIndex};

/// Maximum allowed `top_k` for a single search.
pub const MAX_SEARCH_LIMIT: usize = 10_000;

/// Validate search limit is within acceptable bounds.
pub fn validate_limit(limit: usize) -> Result<()> {
    if limit == 0 {
        return Err(Error::InvalidLimit(
            "Limit must be greater than 0".to_string(),
        ));
    }
    if limit > MAX_SEARCH_LIMIT {
        return Err(Error::InvalidLimit(format!(
            "Limit {} exceeds maximum allowed ({})",
            limit, MAX_SEARCH_LIMIT
        )));
    }
    Ok(())
}

fn sort_by_distance<T>(hits: &mut [T], distance: impl Fn(&T) -> f64) {
    hits.sort_by(|a, b| {
        distance(a)
            .partial_cmp(&distance(b))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

impl VectorIndex {
    fn check_query(&self, query_embedding: &[f32], top_k: usize) -> Result<()> {
        validate_limit(top_k)?;
        if query_embedding.is_empty() {
            return Err(Error::EmptyVector);
        }
        if query_embedding.len() != self.dims {
            return Err(Error::MismatchedDimensions {
                expected: self.dims,
                actual: query_embedding.len(),
            });
        }
        Ok(())
    }

    /// Nearest raw entries to `query_embedding`, ascending by cosine distance.
    ///
    /// # Errors
    ///
    /// Returns error on invalid `top_k`, a dimension mismatch or a storage fault.
    pub fn try_search_raw(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<RawHit>> {
        self.check_query(query_embedding, top_k)?;

        let mut stmt = self
            .conn
            .prepare("SELECT id, embedding FROM raw_vectors ORDER BY entry ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;

        let mut hits = Vec::new();
        for row_result in rows {
            let (id, blob) = row_result?;
            let stored = embedding::blob_to_vec(&blob, self.dims)?;
            let distance = embedding::cosine_distance(query_embedding, &stored)?;
            hits.push(RawHit { id, distance });
        }

        sort_by_distance(&mut hits, |h| h.distance);
        hits.truncate(top_k);
        Ok(hits)
    }

    /// Nearest summary entries to `query_embedding`, ascending by cosine distance.
    pub fn try_search_summary(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SummaryHit>> {
        self.check_query(query_embedding, top_k)?;

        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, embedding, start_time, end_time, summary_text
            FROM summary_vectors
            ORDER BY entry ASC
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut hits = Vec::new();
        for row_result in rows {
            let (id, blob, start_time, end_time, summary_text) = row_result?;
            let stored = embedding::blob_to_vec(&blob, self.dims)?;
            let distance = embedding::cosine_distance(query_embedding, &stored)?;
            hits.push(SummaryHit {
                id,
                start_time,
                end_time,
                summary_text,
                distance,
            });
        }

        sort_by_distance(&mut hits, |h| h.distance);
        hits.truncate(top_k);
        Ok(hits)
    }

    /// Like [`try_search_raw`](Self::try_search_raw), but a failure is logged
    /// and yields no hits.
    pub fn search_raw(&self, query_embedding: &[f32], top_k: usize) -> Vec<RawHit> {
        self.try_search_raw(query_embedding, top_k)
            .unwrap_or_else(|e| {
                warn!(error = %e, top_k, "raw vector search failed");
                Vec::new()
            })
    }

    /// Like [`try_search_summary`](Self::try_search_summary), but a failure is
    /// logged and yields no hits.
    pub fn search_summary(&self, query_embedding: &[f32], top_k: usize) -> Vec<SummaryHit> {
        self.try_search_summary(query_embedding, top_k)
            .unwrap_or_else(|e| {
                warn!(error = %e, top_k, "summary vector search failed");
                Vec::new()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_index(dims: usize) -> (VectorIndex, TempDir) {
        let dir = TempDir::new().unwrap();
        let index = VectorIndex::open(&dir.path().join("vectors.db"), dims).unwrap();
        (index, dir)
    }

    fn axis(dims: usize, i: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; dims];
        v[i] = 1.0;
        v
    }

    #[test]
    fn test_validate_limit_bounds() {
        assert!(validate_limit(0).is_err());
        assert!(validate_limit(MAX_SEARCH_LIMIT + 1).is_err());
        assert!(validate_limit(1).is_ok());
        assert!(validate_limit(MAX_SEARCH_LIMIT).is_ok());
    }

    #[test]
    fn test_search_raw_orders_ascending_by_distance() {
        let (index, _dir) = create_test_index(4);
        index.upsert_raw(1, &axis(4, 1)).unwrap();
        index.upsert_raw(2, &[1.0, 1.0, 0.0, 0.0]).unwrap();
        index.upsert_raw(3, &axis(4, 0)).unwrap();

        let hits = index.try_search_raw(&axis(4, 0), 3).unwrap();
        let ids: Vec<i64> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert!(hits[0].distance.abs() < 1e-6);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn test_search_raw_truncates_to_top_k() {
        let (index, _dir) = create_test_index(4);
        for id in 0..6 {
            index.upsert_raw(id, &axis(4, (id % 4) as usize)).unwrap();
        }
        assert_eq!(index.try_search_raw(&axis(4, 0), 2).unwrap().len(), 2);
    }

    #[test]
    fn test_search_empty_collection() {
        let (index, _dir) = create_test_index(4);
        assert!(index.try_search_raw(&axis(4, 0), 3).unwrap().is_empty());
        assert!(index.try_search_summary(&axis(4, 0), 3).unwrap().is_empty());
    }

    #[test]
    fn test_search_summary_returns_metadata() {
        let (index, _dir) = create_test_index(4);
        index
            .upsert_summary(10, &axis(4, 2), 100, 160, "about gardening")
            .unwrap();
        index
            .upsert_summary(11, &axis(4, 3), 161, 200, "about cooking")
            .unwrap();

        let hits = index.try_search_summary(&axis(4, 2), 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 10);
        assert_eq!(hits[0].start_time, 100);
        assert_eq!(hits[0].end_time, 160);
        assert_eq!(hits[0].summary_text, "about gardening");
    }

    #[test]
    fn test_try_search_rejects_bad_queries() {
        let (index, _dir) = create_test_index(4);
        assert!(matches!(
            index.try_search_raw(&[1.0, 0.0], 3),
            Err(Error::MismatchedDimensions { .. })
        ));
        assert!(matches!(
            index.try_search_raw(&[], 3),
            Err(Error::EmptyVector)
        ));
        assert!(matches!(
            index.try_search_raw(&axis(4, 0), 0),
            Err(Error::InvalidLimit(_))
        ));
    }

    #[test]
    fn test_search_degrades_to_empty_on_failure() {
        let (index, _dir) = create_test_index(4);
        index.upsert_raw(1, &axis(4, 0)).unwrap();
        index.conn().execute_batch("DROP TABLE raw_vectors").unwrap();

        assert!(index.try_search_raw(&axis(4, 0), 3).is_err());
        assert!(index.search_raw(&axis(4, 0), 3).is_empty());
        assert!(index.search_summary(&[1.0], 3).is_empty());
    }
}
