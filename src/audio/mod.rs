//! Audio materialization for utskrift.
//!
//! Turns a source item into a local audio file, downloading with yt-dlp
//! and transcoding with ffmpeg as needed. Materialization is idempotent:
//! the cache location is derived from the item id, so a rerun finds the
//! artifact even if the item moved within its collection.

pub mod chunker;

pub use chunker::{Chunk, Chunker, FfmpegChunker};

use crate::error::{Result, UtskriftError};
use crate::source::{Origin, SourceItem};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// A local decoded audio file ready for chunking and transcription.
#[derive(Debug, Clone)]
pub struct AudioArtifact {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub duration_seconds: f64,
}

/// Obtains a local audio representation for one source item.
#[async_trait]
pub trait Materializer: Send + Sync {
    async fn materialize(&self, item: &SourceItem) -> Result<AudioArtifact>;
}

/// Materializer backed by yt-dlp and ffmpeg with an on-disk cache.
pub struct AudioMaterializer {
    cache_dir: PathBuf,
}

impl AudioMaterializer {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    fn cache_path(&self, item_id: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.mp3", item_id))
    }
}

#[async_trait]
impl Materializer for AudioMaterializer {
    #[instrument(skip(self, item), fields(item_id = %item.id))]
    async fn materialize(&self, item: &SourceItem) -> Result<AudioArtifact> {
        let path = match &item.origin {
            Origin::Remote(url) => {
                std::fs::create_dir_all(&self.cache_dir)?;
                download_audio(url, &item.id, &self.cache_dir).await?
            }
            Origin::Local(path) => {
                if crate::source::LocalResolver::is_audio_file(path) {
                    // Audio files are used in place, no copy.
                    path.clone()
                } else {
                    std::fs::create_dir_all(&self.cache_dir)?;
                    let target = self.cache_path(&item.id);
                    if target.exists() {
                        info!("Using cached audio extraction");
                    } else {
                        extract_audio_track(path, &target).await?;
                    }
                    target
                }
            }
        };

        probe_artifact(&path).await
    }
}

/// Stat and probe a finished audio file into an artifact.
pub async fn probe_artifact(path: &Path) -> Result<AudioArtifact> {
    let size_bytes = std::fs::metadata(path)?.len();
    let duration_seconds = probe_duration(path).await?;
    Ok(AudioArtifact {
        path: path.to_path_buf(),
        size_bytes,
        duration_seconds,
    })
}

/// Downloads audio from a URL and saves it as MP3.
///
/// Uses yt-dlp to download and extract audio. If the file already exists,
/// it will be returned without re-downloading.
#[instrument(skip(output_dir), fields(item_id = %item_id))]
pub async fn download_audio(url: &str, item_id: &str, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let target_path = output_dir.join(format!("{}.mp3", item_id));

    if target_path.exists() {
        info!("Using cached audio file");
        return Ok(target_path);
    }

    info!("Downloading audio from {}", url);

    let template = output_dir.join(format!("{}.%(ext)s", item_id));

    let result = Command::new("yt-dlp")
        .arg("--extract-audio")
        .arg("--audio-format").arg("mp3")
        .arg("--audio-quality").arg("0")
        .arg("--output").arg(template.to_str().unwrap_or_default())
        .arg("--no-playlist")
        .arg("--quiet")
        .arg("--no-warnings")
        .arg(url)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(UtskriftError::ToolNotFound("yt-dlp".into()));
        }
        Err(e) => {
            return Err(UtskriftError::SourceUnavailable(format!(
                "yt-dlp execution failed: {e}"
            )));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(UtskriftError::SourceUnavailable(format!(
            "yt-dlp failed: {}",
            stderr.trim()
        )));
    }

    // yt-dlp may output different formats; find and normalize to mp3
    let downloaded = find_audio_file(output_dir, item_id)?;

    if downloaded != target_path {
        normalize_to_mp3(&downloaded, &target_path).await?;
        let _ = std::fs::remove_file(&downloaded);
    }

    Ok(target_path)
}

/// Locates a downloaded audio file by item ID.
fn find_audio_file(dir: &Path, item_id: &str) -> Result<PathBuf> {
    // Common audio formats that yt-dlp may produce
    for ext in &["mp3", "opus", "m4a", "webm", "ogg"] {
        let candidate = dir.join(format!("{}.{}", item_id, ext));
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    // Fallback: scan directory for matching prefix
    let entries = std::fs::read_dir(dir)
        .map_err(|e| UtskriftError::SourceUnavailable(format!("Cannot read directory: {e}")))?;

    for entry in entries.flatten() {
        let name = entry.file_name();
        if name.to_string_lossy().starts_with(item_id) {
            return Ok(entry.path());
        }
    }

    Err(UtskriftError::SourceUnavailable(
        "Audio file not found after download".into(),
    ))
}

/// Converts an audio file to MP3 using ffmpeg.
async fn normalize_to_mp3(source: &Path, dest: &Path) -> Result<()> {
    debug!("Converting {:?} to MP3", source);

    let result = Command::new("ffmpeg")
        .arg("-i").arg(source)
        .arg("-vn")
        .arg("-codec:a").arg("libmp3lame")
        .arg("-qscale:a").arg("2")
        .arg("-y")
        .arg("-loglevel").arg("error")
        .arg(dest)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    match result {
        Ok(out) if out.status.success() => Ok(()),
        Ok(out) => {
            let err = String::from_utf8_lossy(&out.stderr);
            Err(UtskriftError::MediaFormat(format!(
                "ffmpeg conversion failed: {err}"
            )))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(UtskriftError::ToolNotFound("ffmpeg".into()))
        }
        Err(e) => Err(UtskriftError::MediaFormat(format!("ffmpeg error: {e}"))),
    }
}

/// Extracts the audio track of a local video file to MP3.
async fn extract_audio_track(source: &Path, dest: &Path) -> Result<()> {
    info!("Extracting audio track from {:?}", source);
    normalize_to_mp3(source, dest).await
}

/// Queries the duration of an audio file using ffprobe with JSON output.
pub async fn probe_duration(path: &Path) -> Result<f64> {
    let result = Command::new("ffprobe")
        .arg("-v").arg("quiet")
        .arg("-print_format").arg("json")
        .arg("-show_format")
        .arg(path)
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(UtskriftError::ToolNotFound("ffprobe".into()));
        }
        Err(e) => {
            return Err(UtskriftError::MediaFormat(format!("ffprobe failed: {e}")));
        }
    };

    if !output.status.success() {
        return Err(UtskriftError::MediaFormat("ffprobe returned error".into()));
    }

    // Parse JSON output to extract duration
    let json_str = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value = serde_json::from_str(&json_str)
        .map_err(|_| UtskriftError::MediaFormat("Invalid ffprobe output".into()))?;

    parsed["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .ok_or_else(|| UtskriftError::MediaFormat("Could not determine audio duration".into()))
}

/// Extracts a time segment from an audio file.
pub(crate) async fn extract_segment(
    source: &Path,
    dest: &Path,
    start: f64,
    length: f64,
) -> Result<()> {
    // First attempt: stream copy (fast, no quality loss)
    let copy_result = Command::new("ffmpeg")
        .arg("-ss").arg(format!("{:.3}", start))
        .arg("-i").arg(source)
        .arg("-t").arg(format!("{:.3}", length))
        .arg("-c").arg("copy")
        .arg("-y")
        .arg("-loglevel").arg("warning")
        .arg(dest)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    if let Ok(status) = copy_result {
        if status.success() && dest.exists() {
            return Ok(());
        }
    }

    // Fallback: re-encode to MP3
    warn!("Stream copy failed, re-encoding segment");

    let encode_result = Command::new("ffmpeg")
        .arg("-ss").arg(format!("{:.3}", start))
        .arg("-i").arg(source)
        .arg("-t").arg(format!("{:.3}", length))
        .arg("-codec:a").arg("libmp3lame")
        .arg("-qscale:a").arg("2")
        .arg("-y")
        .arg("-loglevel").arg("error")
        .arg(dest)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await;

    match encode_result {
        Ok(out) if out.status.success() => Ok(()),
        Ok(out) => {
            let err = String::from_utf8_lossy(&out.stderr);
            Err(UtskriftError::Chunking(format!(
                "Segment extraction failed: {err}"
            )))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(UtskriftError::ToolNotFound("ffmpeg".into()))
        }
        Err(e) => Err(UtskriftError::Chunking(format!("ffmpeg error: {e}"))),
    }
}
