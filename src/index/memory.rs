//! In-memory segment index.
//!
//! Useful for testing and for small JSON-lines snapshots.

use super::{check_limit, rank, DistanceMetric, SearchResult, SegmentRecord, VectorIndex};
use crate::error::{HarkError, Result};
use async_trait::async_trait;
use std::path::Path;
use tracing::{info, instrument};

/// In-memory segment index.
pub struct MemorySegmentIndex {
    name: String,
    segments: Vec<SegmentRecord>,
    metric: DistanceMetric,
}

impl MemorySegmentIndex {
    /// Create an index over `segments`, kept in the given order.
    pub fn new(name: impl Into<String>, segments: Vec<SegmentRecord>, metric: DistanceMetric) -> Self {
        Self {
            name: name.into(),
            segments,
            metric,
        }
    }

    /// Load a JSON-lines snapshot with one segment per line.
    #[instrument(skip(path), fields(path = %path.display()))]
    pub fn load_jsonl(path: &Path, metric: DistanceMetric) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HarkError::IndexUnavailable(format!("{}: {}", path.display(), e))
        })?;

        let mut segments = Vec::new();
        for (i, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let segment: SegmentRecord = serde_json::from_str(line).map_err(|e| {
                HarkError::IndexUnavailable(format!(
                    "{} line {}: {}",
                    path.display(),
                    i + 1,
                    e
                ))
            })?;
            segments.push(segment);
        }

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "segments".to_string());

        info!("Loaded {} segments from {:?}", segments.len(), path);
        Ok(Self::new(name, segments, metric))
    }
}

#[async_trait]
impl VectorIndex for MemorySegmentIndex {
    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        check_limit(limit)?;
        rank(self.segments.iter().cloned(), vector, limit, self.metric)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.segments.len())
    }

    async fn dimension(&self) -> Result<Option<usize>> {
        Ok(self.segments.first().map(|s| s.vector.len()))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::segment;

    #[tokio::test]
    async fn test_memory_segment_index() {
        let index = MemorySegmentIndex::new(
            "test",
            vec![
                segment("hello", vec![1.0, 0.0, 0.0], "Hello world"),
                segment("bye", vec![0.0, 1.0, 0.0], "Goodbye world"),
            ],
            DistanceMetric::Cosine,
        );

        assert_eq!(index.count().await.unwrap(), 2);
        assert_eq!(index.dimension().await.unwrap(), Some(3));

        let results = index.search(&[1.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].segment.id, "hello");
        assert!(results[0].distance < results[1].distance);
    }

    #[tokio::test]
    async fn test_empty_index() {
        let index = MemorySegmentIndex::new("empty", Vec::new(), DistanceMetric::L2);
        assert!(index.search(&[1.0], 3).await.unwrap().is_empty());
        assert_eq!(index.dimension().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_load_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("podcast.jsonl");
        std::fs::write(
            &path,
            concat!(
                r#"{"id":"s1","vector":[1.0,0.0],"text":"one","audio_file":"s1.wav"}"#,
                "\n\n",
                r#"{"id":"s2","vector":[0.0,1.0],"text":"two","audio_file":"s2.wav"}"#,
                "\n",
            ),
        )
        .unwrap();

        let index = MemorySegmentIndex::load_jsonl(&path, DistanceMetric::L2).unwrap();
        assert_eq!(index.name(), "podcast");
        assert_eq!(index.count().await.unwrap(), 2);

        let results = index.search(&[0.0, 1.0], 1).await.unwrap();
        assert_eq!(results[0].segment.id, "s2");
        assert_eq!(results[0].segment.audio_file, "s2.wav");
    }

    #[test]
    fn test_load_jsonl_reports_bad_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(
            &path,
            "{\"id\":\"s1\",\"vector\":[1.0],\"text\":\"t\",\"audio_file\":\"a.wav\"}\n{\"id\":\"s2\"}\n",
        )
        .unwrap();

        let err = MemorySegmentIndex::load_jsonl(&path, DistanceMetric::L2)
            .err()
            .unwrap();
        assert!(matches!(err, HarkError::IndexUnavailable(ref msg) if msg.contains("line 2")));
    }

    #[test]
    fn test_load_jsonl_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = MemorySegmentIndex::load_jsonl(&dir.path().join("absent.jsonl"), DistanceMetric::L2)
            .err()
            .unwrap();
        assert!(matches!(err, HarkError::IndexUnavailable(_)));
    }
}
