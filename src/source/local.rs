//! Local file and directory resolution.
//!
//! Supports both audio and video files.

use super::{ItemKind, Origin, Resolution, SkippedEntry, SourceItem};
use crate::error::{Result, UtskriftError};
use std::path::Path;

/// Supported audio file extensions.
const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "flac", "aac", "ogg", "opus", "m4a", "wma", "aiff", "alac",
];

/// Supported video file extensions (audio will be extracted).
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "webm", "flv", "wmv", "m4v", "mpeg", "mpg", "3gp",
];

/// Resolves local media files and directories.
pub struct LocalResolver;

impl LocalResolver {
    /// Check if path is a supported audio file.
    pub fn is_audio_file(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// Check if path is a supported video file.
    pub fn is_video_file(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// Check if path is a supported media file (audio or video).
    pub fn is_media_file(path: &Path) -> bool {
        Self::is_audio_file(path) || Self::is_video_file(path)
    }

    /// Stable identifier derived from the canonical path, so the same file
    /// maps to the same cache and output locations on every run.
    pub fn item_id(path: &Path) -> String {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        format!(
            "local_{}",
            canonical
                .to_string_lossy()
                .replace(['/', '\\', ' ', '.'], "_")
        )
    }

    /// Build a source item for one local media file.
    pub fn item_from_path(path: &Path, kind: ItemKind, index: usize) -> Result<SourceItem> {
        if !path.is_file() {
            return Err(UtskriftError::SourceUnavailable(format!(
                "File not found: {}",
                path.display()
            )));
        }
        if !Self::is_media_file(path) {
            return Err(UtskriftError::InvalidInput(format!(
                "Not a recognized audio or video file: {}",
                path.display()
            )));
        }

        let title = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Unknown")
            .to_string();

        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        Ok(SourceItem {
            id: Self::item_id(path),
            kind,
            title,
            origin: Origin::Local(canonical),
            index,
        })
    }

    /// List a directory of media files as a collection, in file-name order.
    ///
    /// Non-media files are ignored; media files that cannot be resolved are
    /// recorded as skips rather than aborting the listing.
    pub fn list_dir(dir: &Path, limit: Option<usize>) -> Result<Resolution> {
        if !dir.is_dir() {
            return Err(UtskriftError::SourceUnavailable(format!(
                "Directory not found: {}",
                dir.display()
            )));
        }

        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| Self::is_media_file(p))
            .collect();
        paths.sort();

        if let Some(limit) = limit {
            paths.truncate(limit);
        }

        let mut resolution = Resolution::default();
        for (index, path) in paths.iter().enumerate() {
            match Self::item_from_path(path, ItemKind::CollectionMember, index) {
                Ok(item) => resolution.items.push(item),
                Err(e) => resolution.skipped.push(SkippedEntry {
                    reference: path.display().to_string(),
                    reason: e.to_string(),
                }),
            }
        }

        Ok(resolution)
    }
}
