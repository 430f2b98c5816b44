//! Size-driven audio chunking.
//!
//! Splits an audio file into chunks that each fit under the transcription
//! service's upload limit. The span plan is computed up front from the
//! file's size and duration; cuts carry a configurable overlap so a word
//! spoken across a boundary is fully present in one of the chunks.

use super::AudioArtifact;
use crate::error::{Result, UtskriftError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Headroom subtracted from the upload limit when sizing spans. Re-encoded
/// segments can come out slightly larger than a proportional slice of the
/// source, so spans are planned against a reduced budget.
pub const ENCODING_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// One piece of an audio file, ready for upload.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// 0-based position within the source audio.
    pub index: usize,
    pub path: PathBuf,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub size_bytes: u64,
}

/// A planned time span before extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub index: usize,
    pub start_seconds: f64,
    pub end_seconds: f64,
}

/// Splits an audio artifact into uploadable chunks.
#[async_trait]
pub trait Chunker: Send + Sync {
    async fn split(&self, artifact: &AudioArtifact, work_dir: &Path) -> Result<Vec<Chunk>>;
}

/// Plan the spans for a file of `size_bytes` lasting `duration_seconds`.
///
/// The file is divided into equal base intervals; every span after the
/// first starts `overlap_seconds` before its base interval. The last span
/// always ends exactly at the full duration. A file that already fits the
/// limit yields a single span covering everything.
pub fn plan_spans(
    size_bytes: u64,
    duration_seconds: f64,
    max_bytes: u64,
    overlap_seconds: f64,
) -> Result<Vec<Span>> {
    if !duration_seconds.is_finite() || duration_seconds <= 0.0 {
        return Err(UtskriftError::Chunking(format!(
            "Audio has non-positive duration: {duration_seconds}"
        )));
    }

    if size_bytes <= max_bytes {
        return Ok(vec![Span {
            index: 0,
            start_seconds: 0.0,
            end_seconds: duration_seconds,
        }]);
    }

    if max_bytes <= ENCODING_OVERHEAD_BYTES {
        return Err(UtskriftError::Chunking(format!(
            "Upload limit {max_bytes} leaves no room below the encoding headroom"
        )));
    }

    let effective = max_bytes - ENCODING_OVERHEAD_BYTES;
    let count = size_bytes.div_ceil(effective) as usize;
    let base_length = duration_seconds / count as f64;

    let mut spans = Vec::with_capacity(count);
    for index in 0..count {
        let base_start = index as f64 * base_length;
        let start = if index == 0 {
            0.0
        } else {
            (base_start - overlap_seconds).max(0.0)
        };
        let end = if index == count - 1 {
            duration_seconds
        } else {
            base_start + base_length
        };

        if end <= start {
            return Err(UtskriftError::Chunking(format!(
                "Span {index} collapsed to zero length ({start:.3}..{end:.3})"
            )));
        }

        spans.push(Span {
            index,
            start_seconds: start,
            end_seconds: end,
        });
    }

    Ok(spans)
}

/// Verify an extracted chunk actually came out under the upload limit.
/// Span planning assumes size is roughly linear in duration; a source with
/// wildly varying bitrate can defeat that estimate.
fn ensure_chunk_fits(index: usize, size_bytes: u64, max_bytes: u64) -> Result<()> {
    if size_bytes > max_bytes {
        return Err(UtskriftError::Chunking(format!(
            "Chunk {} came out at {} bytes, over the {} byte limit",
            index, size_bytes, max_bytes
        )));
    }
    Ok(())
}

/// Chunker backed by ffmpeg segment extraction.
pub struct FfmpegChunker {
    max_bytes: u64,
    overlap_seconds: f64,
}

impl FfmpegChunker {
    pub fn new(max_bytes: u64, overlap_seconds: f64) -> Self {
        Self {
            max_bytes,
            overlap_seconds,
        }
    }
}

#[async_trait]
impl Chunker for FfmpegChunker {
    async fn split(&self, artifact: &AudioArtifact, work_dir: &Path) -> Result<Vec<Chunk>> {
        let spans = plan_spans(
            artifact.size_bytes,
            artifact.duration_seconds,
            self.max_bytes,
            self.overlap_seconds,
        )?;

        // A single span means the file fits as-is; hand it over unchanged.
        if spans.len() == 1 {
            let span = &spans[0];
            return Ok(vec![Chunk {
                index: 0,
                path: artifact.path.clone(),
                start_seconds: span.start_seconds,
                end_seconds: span.end_seconds,
                size_bytes: artifact.size_bytes,
            }]);
        }

        info!(
            "Splitting {:?} into {} chunks ({} bytes, {:.1}s)",
            artifact.path.file_name().unwrap_or_default(),
            spans.len(),
            artifact.size_bytes,
            artifact.duration_seconds
        );

        std::fs::create_dir_all(work_dir)?;

        let extension = artifact
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp3");

        let mut chunks = Vec::with_capacity(spans.len());
        for span in spans {
            let dest = work_dir.join(format!("chunk_{:03}.{}", span.index, extension));
            let length = span.end_seconds - span.start_seconds;

            debug!(
                "Extracting chunk {} ({:.3}s..{:.3}s)",
                span.index, span.start_seconds, span.end_seconds
            );
            super::extract_segment(&artifact.path, &dest, span.start_seconds, length).await?;

            let size_bytes = std::fs::metadata(&dest)?.len();
            ensure_chunk_fits(span.index, size_bytes, self.max_bytes)?;
            chunks.push(Chunk {
                index: span.index,
                path: dest,
                start_seconds: span.start_seconds,
                end_seconds: span.end_seconds,
                size_bytes,
            });
        }

        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;

    #[test]
    fn test_small_file_single_span() {
        let spans = plan_spans(10 * MIB, 600.0, 25 * MIB, 5.0).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].start_seconds, 0.0);
        assert_eq!(spans[0].end_seconds, 600.0);
    }

    #[test]
    fn test_file_exactly_at_limit_single_span() {
        let spans = plan_spans(25 * MIB, 600.0, 25 * MIB, 5.0).unwrap();
        assert_eq!(spans.len(), 1);
    }

    #[test]
    fn test_oversize_file_two_spans_with_overlap() {
        // 40 MiB against a 25 MiB limit needs two spans.
        let spans = plan_spans(40 * MIB, 1000.0, 25 * MIB, 5.0).unwrap();
        assert_eq!(spans.len(), 2);

        assert_eq!(spans[0].start_seconds, 0.0);
        assert_eq!(spans[0].end_seconds, 500.0);

        // Second span starts overlap_seconds before its base interval.
        assert!((spans[1].start_seconds - 495.0).abs() < 1e-9);
        assert_eq!(spans[1].end_seconds, 1000.0);
    }

    #[test]
    fn test_spans_are_contiguous_and_indexed() {
        let spans = plan_spans(100 * MIB, 3600.0, 25 * MIB, 5.0).unwrap();
        assert!(spans.len() >= 4);

        for (i, span) in spans.iter().enumerate() {
            assert_eq!(span.index, i);
            assert!(span.end_seconds > span.start_seconds);
        }

        // Consecutive base intervals touch: each span's end is the next
        // span's start plus the overlap.
        for pair in spans.windows(2) {
            let gap = pair[0].end_seconds - pair[1].start_seconds;
            assert!((gap - 5.0).abs() < 1e-6);
        }

        assert_eq!(spans.last().unwrap().end_seconds, 3600.0);
    }

    #[test]
    fn test_zero_duration_is_error() {
        let err = plan_spans(40 * MIB, 0.0, 25 * MIB, 5.0).unwrap_err();
        assert!(matches!(err, UtskriftError::Chunking(_)));
    }

    #[test]
    fn test_oversize_extracted_chunk_is_error() {
        assert!(ensure_chunk_fits(0, 24 * MIB, 25 * MIB).is_ok());
        assert!(ensure_chunk_fits(1, 25 * MIB, 25 * MIB).is_ok());

        let err = ensure_chunk_fits(2, 26 * MIB, 25 * MIB).unwrap_err();
        assert!(matches!(err, UtskriftError::Chunking(_)));
        assert!(err.to_string().contains("Chunk 2"));
    }

    #[test]
    fn test_limit_below_headroom_is_error() {
        let err = plan_spans(40 * MIB, 1000.0, MIB / 2, 5.0).unwrap_err();
        assert!(matches!(err, UtskriftError::Chunking(_)));
    }

    #[tokio::test]
    async fn test_split_passes_through_small_file() {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("talk.mp3");
        std::fs::write(&audio, vec![0u8; 1024]).unwrap();

        let artifact = AudioArtifact {
            path: audio.clone(),
            size_bytes: 1024,
            duration_seconds: 60.0,
        };

        let chunker = FfmpegChunker::new(25 * MIB, 5.0);
        let chunks = chunker.split(&artifact, dir.path()).await.unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].path, audio);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].end_seconds, 60.0);
    }
}
