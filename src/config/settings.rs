//! Configuration settings for Hark.

use crate::error::{HarkError, Result};
use crate::index::DistanceMetric;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub embedding: EmbeddingSettings,
    pub index: IndexSettings,
    pub audio: AudioSettings,
    pub search: SearchSettings,
    pub server: ServerSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
        }
    }
}

/// Embedding provider type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Pretrained sentence-embedding model run locally.
    #[default]
    Local,
    /// Feature-hashing embedder, no model weights required.
    Hash,
}

impl std::fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingProvider::Local => write!(f, "local"),
            EmbeddingProvider::Hash => write!(f, "hash"),
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (local, hash).
    pub provider: EmbeddingProvider,
    /// Pretrained model name (local provider).
    pub model: String,
    /// Output dimensions (hash provider; local models have a fixed size).
    pub dimensions: usize,
    /// Where downloaded model weights are cached.
    pub cache_dir: Option<String>,
    /// Show a progress bar while model weights download.
    pub show_download_progress: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Local,
            model: "all-MiniLM-L6-v2".to_string(),
            dimensions: 384,
            cache_dir: None,
            show_download_progress: true,
        }
    }
}

/// Index backend type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IndexProvider {
    /// Named table in a SQLite database.
    #[default]
    Sqlite,
    /// JSON-lines snapshot loaded into memory.
    Jsonl,
}

impl std::fmt::Display for IndexProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexProvider::Sqlite => write!(f, "sqlite"),
            IndexProvider::Jsonl => write!(f, "jsonl"),
        }
    }
}

/// Vector index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Index backend (sqlite, jsonl).
    pub provider: IndexProvider,
    /// Path to the database file or snapshot.
    pub path: String,
    /// Table holding the segments (sqlite provider).
    pub table: String,
    /// Distance metric (l2, cosine, dot).
    pub metric: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            provider: IndexProvider::Sqlite,
            path: "segments.db".to_string(),
            table: "segments".to_string(),
            metric: "l2".to_string(),
        }
    }
}

/// Audio artifact settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Base directory that `audio_file` names are relative to.
    pub dir: String,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            dir: "segments".to_string(),
        }
    }
}

/// Search behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Result count used when the caller gives none.
    pub default_limit: usize,
    /// Upper bound on result count accepted by the CLI and HTTP API.
    pub max_limit: usize,
    /// Per-search timeout in seconds (0 disables).
    pub timeout_seconds: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_limit: 5,
            max_limit: 10,
            timeout_seconds: 30,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = Self::config_path(path);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// The config file actually in effect: `explicit` if given, else the default.
    pub fn config_path(explicit: Option<&PathBuf>) -> PathBuf {
        explicit.cloned().unwrap_or_else(Self::default_config_path)
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hark")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded index path.
    pub fn index_path(&self) -> PathBuf {
        Self::expand_path(&self.index.path)
    }

    /// Get the expanded audio directory.
    pub fn audio_dir(&self) -> PathBuf {
        Self::expand_path(&self.audio.dir)
    }

    /// Get the expanded model cache directory, if configured.
    pub fn model_cache_dir(&self) -> Option<PathBuf> {
        self.embedding.cache_dir.as_deref().map(Self::expand_path)
    }

    /// Parse the configured distance metric.
    pub fn metric(&self) -> Result<DistanceMetric> {
        self.index.metric.parse().map_err(HarkError::Config)
    }

    /// Search timeout, `None` when disabled.
    pub fn search_timeout(&self) -> Option<std::time::Duration> {
        match self.search.timeout_seconds {
            0 => None,
            secs => Some(std::time::Duration::from_secs(secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let settings = Settings::default();
        assert_eq!(settings.index.path, "segments.db");
        assert_eq!(settings.index.table, "segments");
        assert_eq!(settings.audio.dir, "segments");
        assert_eq!(settings.embedding.model, "all-MiniLM-L6-v2");
        assert_eq!(settings.metric().unwrap(), DistanceMetric::L2);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [embedding]
            provider = "hash"
            dimensions = 64

            [index]
            metric = "cosine"
            "#,
        )
        .unwrap();

        assert_eq!(settings.embedding.provider, EmbeddingProvider::Hash);
        assert_eq!(settings.embedding.dimensions, 64);
        assert_eq!(settings.index.table, "segments");
        assert_eq!(settings.metric().unwrap(), DistanceMetric::Cosine);
        assert_eq!(settings.search.default_limit, 5);
    }

    #[test]
    fn test_unknown_metric_is_config_error() {
        let mut settings = Settings::default();
        settings.index.metric = "manhattan".to_string();
        assert!(matches!(settings.metric(), Err(HarkError::Config(_))));
    }

    #[test]
    fn test_zero_timeout_disables() {
        let mut settings = Settings::default();
        assert_eq!(
            settings.search_timeout(),
            Some(std::time::Duration::from_secs(30))
        );
        settings.search.timeout_seconds = 0;
        assert!(settings.search_timeout().is_none());
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let settings = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(settings.server.port, 3000);
    }

    #[test]
    fn test_config_path_prefers_explicit() {
        let explicit = PathBuf::from("/tmp/hark-alt.toml");
        assert_eq!(Settings::config_path(Some(&explicit)), explicit);
        assert_eq!(Settings::config_path(None), Settings::default_config_path());
    }
}
