//! Query-to-segment retrieval.
//!
//! Owns the embedding model and index handles for the life of the process
//! and answers each query independently.

use crate::config::Settings;
use crate::embedding::{self, Embedder};
use crate::error::{HarkError, Result};
use crate::index::{self, DistanceMetric, SearchResult, VectorIndex};
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Embeds queries and runs top-K search over the segment index.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    audio_dir: PathBuf,
    timeout: Option<Duration>,
}

/// Summary of the loaded index and model.
#[derive(Debug, Clone, Serialize)]
pub struct IndexSummary {
    pub table: String,
    pub records: usize,
    pub dimension: Option<usize>,
    pub model: String,
    pub model_dimensions: usize,
    pub metric: String,
}

impl Retriever {
    /// Build the embedder and open the index described by `settings`.
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let embedder = embedding::from_settings(settings)?;
        let index = index::from_settings(settings)?;

        let retriever = Self::new(embedder, index, settings.audio_dir()).await?;
        Ok(retriever.with_timeout(settings.search_timeout()))
    }

    /// Create a retriever from explicit components.
    ///
    /// Fails with [`HarkError::DimensionMismatch`] when a non-empty index
    /// stores vectors of a different size than the embedder produces.
    pub async fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        audio_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        if let Some(stored) = index.dimension().await? {
            if stored != embedder.dimensions() {
                return Err(HarkError::DimensionMismatch {
                    expected: stored,
                    actual: embedder.dimensions(),
                });
            }
        }

        let audio_dir = audio_dir.into();
        info!(
            "Retriever ready: model {}, index '{}', audio dir {:?}",
            embedder.model_name(),
            index.name(),
            audio_dir
        );

        Ok(Self {
            embedder,
            index,
            audio_dir,
            timeout: None,
        })
    }

    /// Bound each search call; `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Return up to `limit` segments closest to `query`, nearest first.
    ///
    /// Results come back exactly as the index ranked them. An empty index
    /// yields an empty vec.
    #[instrument(skip(self, query), fields(query_len = query.len()))]
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        if limit == 0 {
            return Err(HarkError::InvalidArgument(
                "limit must be at least 1".to_string(),
            ));
        }

        let results = self
            .bounded(async {
                let query_vector = self.embedder.embed(query).await?;
                self.index.search(&query_vector, limit).await
            })
            .await?;

        debug!("Query matched {} segments", results.len());
        Ok(results)
    }

    /// Resolve an audio filename against the audio directory.
    ///
    /// Does not touch the filesystem.
    pub fn get_audio_path(&self, filename: &str) -> PathBuf {
        self.audio_dir.join(filename)
    }

    /// Base directory for audio artifacts.
    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    /// Describe the loaded index and model.
    pub async fn describe(&self) -> Result<IndexSummary> {
        Ok(IndexSummary {
            table: self.index.name().to_string(),
            records: self.index.count().await?,
            dimension: self.index.dimension().await?,
            model: self.embedder.model_name().to_string(),
            model_dimensions: self.embedder.dimensions(),
            metric: self.metric().to_string(),
        })
    }

    /// Metric the index ranks with.
    pub fn metric(&self) -> DistanceMetric {
        self.index.metric()
    }

    async fn bounded<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| HarkError::Timeout(limit))?,
            None => fut.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::index::{segment, write_fixture, MemorySegmentIndex, SegmentRecord, SqliteSegmentIndex};
    use async_trait::async_trait;
    use std::collections::HashSet;

    const DIM: usize = 64;

    fn embedder() -> Arc<HashEmbedder> {
        Arc::new(HashEmbedder::new(DIM).unwrap())
    }

    fn record(id: &str, text: &str) -> SegmentRecord {
        segment(id, embedder().embed_sync(text), text)
    }

    async fn retriever(records: Vec<SegmentRecord>) -> Retriever {
        let index = Arc::new(MemorySegmentIndex::new("segments", records, DistanceMetric::L2));
        Retriever::new(embedder(), index, "segments").await.unwrap()
    }

    fn corpus() -> Vec<SegmentRecord> {
        vec![
            record("s1", "the weather today is sunny and warm"),
            record("s2", "stock markets fell sharply this morning"),
            record("s3", "rain is expected later in the week"),
            record("s4", "the team won the championship game"),
            record("s5", "sunny weather makes for a warm afternoon"),
        ]
    }

    #[tokio::test]
    async fn test_hello_world_end_to_end() {
        let retriever = retriever(vec![record("a1", "hello world")]).await;

        let results = retriever.search("hello world", 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].segment.id, "a1");
        assert_eq!(results[0].segment.text, "hello world");
        assert_eq!(results[0].segment.audio_file, "a1.wav");
        assert!(results[0].distance.abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_zero_limit_is_invalid_argument() {
        let retriever = retriever(vec![record("a1", "hello world")]).await;
        assert!(matches!(
            retriever.search("hello world", 0).await,
            Err(HarkError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_result_count_never_exceeds_limit() {
        let retriever = retriever(corpus()).await;
        for limit in 1..=8 {
            let results = retriever.search("sunny weather", limit).await.unwrap();
            assert!(results.len() <= limit);
            assert_eq!(results.len(), limit.min(5));
        }
    }

    #[tokio::test]
    async fn test_results_ranked_by_ascending_distance() {
        let retriever = retriever(corpus()).await;
        let query_vector = embedder().embed_sync("warm sunny weather");

        let results = retriever.search("warm sunny weather", 5).await.unwrap();
        for pair in results.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
        for r in &results {
            let expected = DistanceMetric::L2.distance(&query_vector, &r.segment.vector);
            assert!((r.distance - expected).abs() < 1e-6);
        }
        assert!(["s1", "s5"].contains(&results[0].segment.id.as_str()));
    }

    #[tokio::test]
    async fn test_repeated_search_returns_same_ids() {
        let retriever = retriever(corpus()).await;

        let ids = |results: Vec<SearchResult>| -> HashSet<String> {
            results.into_iter().map(|r| r.segment.id).collect()
        };
        let first = ids(retriever.search("championship", 3).await.unwrap());
        let second = ids(retriever.search("championship", 3).await.unwrap());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_empty_index_returns_empty() {
        let retriever = retriever(Vec::new()).await;
        assert!(retriever.search("anything", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_audio_path_is_plain_join() {
        let retriever = retriever(Vec::new()).await;
        assert_eq!(
            retriever.get_audio_path("seg1.wav"),
            Path::new("segments").join("seg1.wav")
        );
        assert!(!retriever.get_audio_path("seg1.wav").exists());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected_at_construction() {
        let index = Arc::new(MemorySegmentIndex::new(
            "segments",
            vec![segment("a", vec![1.0, 0.0], "a")],
            DistanceMetric::L2,
        ));
        let err = Retriever::new(embedder(), index, "segments").await.err().unwrap();
        assert!(matches!(
            err,
            HarkError::DimensionMismatch { expected: 2, actual: DIM }
        ));
    }

    #[tokio::test]
    async fn test_sqlite_backed_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "segments", &corpus());
        let index = Arc::new(SqliteSegmentIndex::open(&path, "segments", DistanceMetric::Cosine).unwrap());
        let retriever = Retriever::new(embedder(), index, dir.path()).await.unwrap();

        let results = retriever.search("stock markets", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].segment.id, "s2");

        let summary = retriever.describe().await.unwrap();
        assert_eq!(summary.table, "segments");
        assert_eq!(summary.records, 5);
        assert_eq!(summary.dimension, Some(DIM));
        assert_eq!(summary.metric, "cosine");
    }

    struct SlowEmbedder;

    #[async_trait]
    impl Embedder for SlowEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![0.0; DIM])
        }

        fn dimensions(&self) -> usize {
            DIM
        }

        fn model_name(&self) -> &str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_search_times_out() {
        let index = Arc::new(MemorySegmentIndex::new("segments", corpus(), DistanceMetric::L2));
        let retriever = Retriever::new(Arc::new(SlowEmbedder), index, "segments")
            .await
            .unwrap()
            .with_timeout(Some(Duration::from_millis(20)));

        assert!(matches!(
            retriever.search("anything", 3).await,
            Err(HarkError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_slow_sqlite_scan_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let rows: Vec<SegmentRecord> = (0..60_000)
            .map(|i| segment(&format!("s{}", i), vec![(i % 97) as f32; DIM], "filler"))
            .collect();
        let path = write_fixture(dir.path(), "segments", &rows);
        let index = Arc::new(SqliteSegmentIndex::open(&path, "segments", DistanceMetric::L2).unwrap());
        let retriever = Retriever::new(embedder(), index, dir.path())
            .await
            .unwrap()
            .with_timeout(Some(Duration::from_millis(1)));

        assert!(matches!(
            retriever.search("segment", 5).await,
            Err(HarkError::Timeout(_))
        ));
    }
}
