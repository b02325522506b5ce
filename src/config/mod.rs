//! Configuration module for Hark.
//!
//! Handles loading application settings from TOML.

mod settings;

pub use settings::{
    AudioSettings, EmbeddingProvider, EmbeddingSettings, GeneralSettings, IndexProvider,
    IndexSettings, SearchSettings, ServerSettings, Settings,
};
