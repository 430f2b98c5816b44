//! Error types for utskrift.

use thiserror::Error;

/// Library-level error type for utskrift operations.
#[derive(Error, Debug)]
pub enum UtskriftError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Media format error: {0}")]
    MediaFormat(String),

    #[error("Audio chunking failed: {0}")]
    Chunking(String),

    #[error("Transient service error: {0}")]
    TransientService(String),

    #[error("Audio payload exceeds the service size limit: {0}")]
    PayloadTooLarge(String),

    #[error("Service rejected credentials: {0}")]
    Unauthorized(String),

    #[error("Service rejected the audio payload: {0}")]
    InvalidAudio(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl UtskriftError {
    /// Short stable label for per-item failure reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            UtskriftError::Config(_) => "config",
            UtskriftError::InvalidInput(_) => "invalid-input",
            UtskriftError::SourceUnavailable(_) => "source-unavailable",
            UtskriftError::MediaFormat(_) => "media-format",
            UtskriftError::Chunking(_) => "chunking",
            UtskriftError::TransientService(_) => "transient-service",
            UtskriftError::PayloadTooLarge(_) => "payload-too-large",
            UtskriftError::Unauthorized(_) => "unauthorized",
            UtskriftError::InvalidAudio(_) => "invalid-audio",
            UtskriftError::ToolNotFound(_) => "tool-not-found",
            UtskriftError::Io(_) => "io",
            UtskriftError::Json(_) => "json",
            UtskriftError::TomlParse(_) => "toml",
            UtskriftError::Http(_) => "http",
        }
    }

    /// Whether a bounded retry is worthwhile. Permanent service rejections
    /// (bad payload, bad credentials, oversized upload) are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, UtskriftError::TransientService(_))
    }
}

/// Result type alias for utskrift operations.
pub type Result<T> = std::result::Result<T, UtskriftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        assert_eq!(
            UtskriftError::SourceUnavailable("x".into()).kind(),
            "source-unavailable"
        );
        assert_eq!(UtskriftError::Chunking("x".into()).kind(), "chunking");
        assert_eq!(
            UtskriftError::PayloadTooLarge("x".into()).kind(),
            "payload-too-large"
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(UtskriftError::TransientService("timeout".into()).is_transient());
        assert!(!UtskriftError::PayloadTooLarge("26MB".into()).is_transient());
        assert!(!UtskriftError::Unauthorized("bad key".into()).is_transient());
        assert!(!UtskriftError::InvalidAudio("not audio".into()).is_transient());
    }
}
