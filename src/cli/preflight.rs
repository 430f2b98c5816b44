//! Pre-flight checks before expensive operations.
//!
//! External tools and the API key are probed once per run, up front, so a
//! long transcription never fails halfway through on a missing binary.

use crate::error::{Result, UtskriftError};
use std::process::Command;

/// What the current environment provides, probed once at startup.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    /// yt-dlp version line, if the tool runs.
    pub ytdlp: Option<String>,
    /// ffmpeg version line, if the tool runs.
    pub ffmpeg: Option<String>,
    /// ffprobe version line, if the tool runs.
    pub ffprobe: Option<String>,
    /// Whether OPENAI_API_KEY is set and non-empty.
    pub api_key: bool,
}

impl Capabilities {
    /// Probe every external requirement.
    pub fn probe() -> Self {
        Self {
            ytdlp: tool_version("yt-dlp"),
            ffmpeg: tool_version("ffmpeg"),
            ffprobe: tool_version("ffprobe"),
            api_key: std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()),
        }
    }

    /// Verify everything a transcription run needs. Remote sources
    /// additionally require the downloader; local files do not.
    pub fn ensure_transcribe(&self, needs_downloader: bool) -> Result<()> {
        if !self.api_key {
            return Err(UtskriftError::Config(
                "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
            ));
        }
        if needs_downloader && self.ytdlp.is_none() {
            return Err(UtskriftError::ToolNotFound("yt-dlp".to_string()));
        }
        if self.ffmpeg.is_none() {
            return Err(UtskriftError::ToolNotFound("ffmpeg".to_string()));
        }
        if self.ffprobe.is_none() {
            return Err(UtskriftError::ToolNotFound("ffprobe".to_string()));
        }
        Ok(())
    }
}

/// First version line of an external tool, or None if it is missing or
/// not working.
fn tool_version(name: &str) -> Option<String> {
    // ffmpeg/ffprobe use -version (single dash), others use --version
    let version_arg = match name {
        "ffmpeg" | "ffprobe" => "-version",
        _ => "--version",
    };
    let output = Command::new(name).arg(version_arg).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|l| l.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_input_skips_downloader_requirement() {
        let caps = Capabilities {
            ytdlp: None,
            ffmpeg: Some("ffmpeg version 6.0".to_string()),
            ffprobe: Some("ffprobe version 6.0".to_string()),
            api_key: true,
        };
        assert!(caps.ensure_transcribe(false).is_ok());
        assert!(caps.ensure_transcribe(true).is_err());
    }

    #[test]
    fn test_missing_api_key_is_reported_first() {
        let caps = Capabilities::default();
        let err = caps.ensure_transcribe(false).unwrap_err();
        assert!(matches!(err, UtskriftError::Config(_)));
    }
}
