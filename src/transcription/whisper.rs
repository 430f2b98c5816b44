//! OpenAI Whisper transcription with bounded retry.

use super::SpeechClient;
use crate::error::{Result, UtskriftError};
use crate::openai::create_client;
use async_openai::error::OpenAIError;
use async_openai::types::CreateTranscriptionRequestArgs;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Whisper-backed speech client.
///
/// Transient failures (connection errors, timeouts, rate limits, 5xx) are
/// retried with exponential backoff up to `max_retries` times; everything
/// else fails immediately.
pub struct WhisperClient {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    max_retries: u32,
    base_delay: Duration,
}

impl WhisperClient {
    pub fn new(model: &str, max_retries: u32, base_delay: Duration) -> Self {
        Self {
            client: create_client(),
            model: model.to_string(),
            max_retries,
            base_delay,
        }
    }

    #[instrument(skip(self), fields(audio_path = %audio_path.display()))]
    async fn transcribe_once(&self, audio_path: &Path) -> Result<String> {
        debug!("Uploading audio for transcription");

        let file_bytes = tokio::fs::read(audio_path).await?;

        let request = CreateTranscriptionRequestArgs::default()
            .file(async_openai::types::AudioInput::from_vec_u8(
                audio_path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("audio.mp3")
                    .to_string(),
                file_bytes,
            ))
            .model(&self.model)
            .build()
            .map_err(|e| {
                UtskriftError::InvalidAudio(format!("Failed to build request: {}", e))
            })?;

        let response = self
            .client
            .audio()
            .transcribe(request)
            .await
            .map_err(classify_openai_error)?;

        Ok(response.text)
    }
}

#[async_trait]
impl SpeechClient for WhisperClient {
    async fn transcribe(&self, audio_path: &Path) -> Result<String> {
        retry_transient(self.max_retries, self.base_delay, || {
            self.transcribe_once(audio_path)
        })
        .await
    }
}

/// Retry `call` on transient errors with exponential backoff, up to
/// `max_retries` additional attempts. Permanent errors return immediately.
async fn retry_transient<T, F, Fut>(max_retries: u32, base_delay: Duration, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_retries => {
                let delay = base_delay * 2u32.pow(attempt);
                attempt += 1;
                warn!(
                    "Attempt {} failed ({}), retrying in {:?}",
                    attempt, e, delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Map an OpenAI client error onto our failure categories.
///
/// Connection and timeout problems are transient. API errors are split by
/// what they say: oversize uploads, bad credentials, and undecodable audio
/// are permanent; rate limits and server errors are transient. Unrecognized
/// API errors default to transient since retries are bounded anyway.
fn classify_openai_error(err: OpenAIError) -> UtskriftError {
    match err {
        OpenAIError::Reqwest(e) => {
            UtskriftError::TransientService(format!("HTTP error: {}", e))
        }
        OpenAIError::ApiError(api) => {
            let message = api.message.clone();
            let err_type = api.r#type.as_deref().unwrap_or("");

            if message.contains("Maximum content size") || message.contains("content size limit") {
                UtskriftError::PayloadTooLarge(message)
            } else if err_type == "invalid_request_error"
                && (message.contains("decode") || message.contains("format"))
            {
                UtskriftError::InvalidAudio(message)
            } else if err_type == "insufficient_quota" || message.contains("API key") {
                UtskriftError::Unauthorized(message)
            } else {
                // rate_limit_error, server_error, and anything unrecognized
                UtskriftError::TransientService(message)
            }
        }
        other => UtskriftError::TransientService(format!("OpenAI client error: {}", other)),
    }
}

/// Check if the OpenAI API key is configured.
pub fn is_api_key_configured() -> bool {
    std::env::var("OPENAI_API_KEY").is_ok()
}
