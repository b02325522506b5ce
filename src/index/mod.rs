//! Read-only vector index over transcribed audio segments.
//!
//! Provides a trait-based interface for different index backends.

mod memory;
mod sqlite;

pub use memory::MemorySegmentIndex;
pub use sqlite::SqliteSegmentIndex;

#[cfg(test)]
pub(crate) use sqlite::tests::write_fixture;

use crate::config::{IndexProvider, Settings};
use crate::error::{HarkError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One indexed audio segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRecord {
    /// Identifier assigned at ingestion.
    pub id: String,
    /// Embedding of the transcript.
    pub vector: Vec<f32>,
    /// Transcript text.
    pub text: String,
    /// Audio filename, relative to the configured audio directory.
    pub audio_file: String,
}

/// A ranked search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// The matched segment.
    pub segment: SegmentRecord,
    /// Distance to the query under the index metric (lower is closer).
    pub distance: f32,
}

/// Distance function used to rank segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceMetric {
    /// Squared Euclidean distance.
    #[default]
    L2,
    /// One minus cosine similarity.
    Cosine,
    /// Negated dot product.
    Dot,
}

impl DistanceMetric {
    /// Distance between two vectors of equal length.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::L2 => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
            DistanceMetric::Cosine => 1.0 - cosine_similarity(a, b),
            DistanceMetric::Dot => -a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>(),
        }
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "l2" | "euclidean" => Ok(DistanceMetric::L2),
            "cosine" => Ok(DistanceMetric::Cosine),
            "dot" => Ok(DistanceMetric::Dot),
            _ => Err(format!("Unknown distance metric: {}", s)),
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistanceMetric::L2 => write!(f, "l2"),
            DistanceMetric::Cosine => write!(f, "cosine"),
            DistanceMetric::Dot => write!(f, "dot"),
        }
    }
}

/// Trait for read-only segment indexes.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return at most `limit` segments ordered by ascending distance to `vector`.
    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<SearchResult>>;

    /// Number of stored segments.
    async fn count(&self) -> Result<usize>;

    /// Dimension of the stored vectors, `None` for an empty index.
    async fn dimension(&self) -> Result<Option<usize>>;

    /// Name of the underlying table or snapshot.
    fn name(&self) -> &str;

    /// Metric used to rank results.
    fn metric(&self) -> DistanceMetric;
}

/// Open the index selected in `settings`.
pub fn from_settings(settings: &Settings) -> Result<Arc<dyn VectorIndex>> {
    let metric = settings.metric()?;
    let path = settings.index_path();

    match settings.index.provider {
        IndexProvider::Sqlite => Ok(Arc::new(SqliteSegmentIndex::open(
            &path,
            &settings.index.table,
            metric,
        )?)),
        IndexProvider::Jsonl => Ok(Arc::new(MemorySegmentIndex::load_jsonl(&path, metric)?)),
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

pub(crate) fn check_limit(limit: usize) -> Result<()> {
    if limit == 0 {
        return Err(HarkError::InvalidArgument(
            "limit must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Score `segments` against `query` and keep the closest `limit`.
///
/// The sort is stable, so equal distances keep storage order.
pub(crate) fn rank<I>(
    segments: I,
    query: &[f32],
    limit: usize,
    metric: DistanceMetric,
) -> Result<Vec<SearchResult>>
where
    I: IntoIterator<Item = SegmentRecord>,
{
    let mut results = Vec::new();

    for segment in segments {
        if segment.vector.len() != query.len() {
            return Err(HarkError::DimensionMismatch {
                expected: segment.vector.len(),
                actual: query.len(),
            });
        }
        let distance = metric.distance(query, &segment.vector);
        results.push(SearchResult { segment, distance });
    }

    results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    results.truncate(limit);
    Ok(results)
}

#[cfg(test)]
pub(crate) fn segment(id: &str, vector: Vec<f32>, text: &str) -> SegmentRecord {
    SegmentRecord {
        id: id.to_string(),
        vector,
        text: text.to_string(),
        audio_file: format!("{}.wav", id),
    }
}
