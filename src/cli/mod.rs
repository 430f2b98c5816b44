//! CLI module for Utskrift.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Utskrift - Audio and Video Transcription
///
/// A CLI tool that turns videos, playlists, and local media into text
/// transcripts. The name "Utskrift" is the Norwegian word for "printout."
#[derive(Parser, Debug)]
#[command(name = "utskrift")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transcribe a video, playlist, or local audio/video path
    Transcribe {
        /// Video URL/ID, playlist URL, or local file/directory path
        input: String,

        /// Number of items processed concurrently
        #[arg(short, long)]
        workers: Option<usize>,

        /// Number of chunks of one item transcribed concurrently
        #[arg(long)]
        chunk_workers: Option<usize>,

        /// Transcript format (text, json)
        #[arg(long)]
        format: Option<String>,

        /// Subfolder under the output directory for this run
        #[arg(short, long)]
        subfolder: Option<String>,

        /// Maximum number of items to take from a playlist or directory
        #[arg(long)]
        limit: Option<usize>,

        /// Re-transcribe even if a transcript already exists
        #[arg(short, long)]
        force: bool,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}
