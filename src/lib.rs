//! Hark - semantic search over transcribed audio segments
//!
//! Type a free-text query, get back the closest pre-indexed audio segments
//! with their transcripts and audio files.
//!
//! # Architecture
//!
//! - `embedding` - Query embedding (local sentence-embedding model, feature hashing)
//! - `index` - Read-only vector index over stored segments (SQLite, JSON lines)
//! - `retriever` - Embed a query, run top-K search, resolve audio paths
//! - `config` - Configuration management
//! - `cli` - Command-line and HTTP front ends
//!
//! # Example
//!
//! ```rust,no_run
//! use hark::config::Settings;
//! use hark::retriever::Retriever;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let retriever = Retriever::from_settings(&settings).await?;
//!
//!     for hit in retriever.search("what did they say about the weather", 5).await? {
//!         let audio = retriever.get_audio_path(&hit.segment.audio_file);
//!         println!("{} {:.3} {}", hit.segment.id, hit.distance, audio.display());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod retriever;

pub use error::{HarkError, Result};
