//! Speech-to-text for utskrift.

mod whisper;

pub use whisper::{is_api_key_configured, WhisperClient};

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Transcribes one audio file into text.
#[async_trait]
pub trait SpeechClient: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<String>;
}

/// The transcription of one chunk, tagged with its position in the source
/// audio so fragments can be merged in order regardless of completion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptFragment {
    pub index: usize,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub text: String,
}

/// A complete transcript assembled from chunk fragments.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub item_id: String,
    pub fragments: Vec<TranscriptFragment>,
    pub full_text: String,
}

impl Transcript {
    /// Assemble a transcript from fragments in any order. Fragments are
    /// sorted by chunk index and their text concatenated as returned by the
    /// service, without trimming or joining characters.
    pub fn new(item_id: String, mut fragments: Vec<TranscriptFragment>) -> Self {
        fragments.sort_by_key(|f| f.index);
        let full_text = fragments.iter().map(|f| f.text.as_str()).collect();
        Self {
            item_id,
            fragments,
            full_text,
        }
    }
}
