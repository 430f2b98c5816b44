//! Utskrift - Batch Audio Transcription
//!
//! A CLI tool for turning videos, playlists, and local media into text
//! transcripts using the OpenAI Whisper API.
//!
//! The name "utskrift" is the Norwegian word for "printout/transcript."
//!
//! # Overview
//!
//! Utskrift allows you to:
//! - Transcribe single YouTube videos, whole playlists, local files, or
//!   directories of media files
//! - Split oversized audio into service-sized chunks and reassemble the
//!   transcript in order
//! - Resume an interrupted batch: items whose transcript already exists on
//!   disk are skipped, everything else is picked up again
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `source` - Input classification and playlist/directory expansion
//! - `audio` - Audio materialization and size-based chunking
//! - `transcription` - Speech-to-text client with bounded retry
//! - `pipeline` - Worker pool, resumption, and per-item outcomes
//! - `output` - Transcript serialization (plain text, JSON)
//!
//! # Example
//!
//! ```rust,no_run
//! use utskrift::config::Settings;
//! use utskrift::output::{OutputFormat, TranscriptWriter};
//! use utskrift::pipeline::PipelineOrchestrator;
//! use utskrift::source::resolve;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let writer = TranscriptWriter::new(settings.output_dir(), None, OutputFormat::Text)?;
//!
//!     let resolution = resolve("https://www.youtube.com/playlist?list=PL123", None).await?;
//!     let orchestrator = PipelineOrchestrator::new(&settings, writer);
//!     let report = orchestrator.run(resolution.items, None).await;
//!     println!("{} written, {} failed", report.written(), report.failed());
//!
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod openai;
pub mod output;
pub mod pipeline;
pub mod source;
pub mod transcription;

pub use error::{Result, UtskriftError};
