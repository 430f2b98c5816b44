//! Source resolution for utskrift.
//!
//! Classifies a raw user input (URL, video id, file, or directory) and
//! expands collections into an ordered list of source items.

mod local;
mod youtube;

pub use local::LocalResolver;
pub use youtube::YoutubeResolver;

use crate::error::{Result, UtskriftError};
use std::fmt;
use std::path::PathBuf;

/// Whether an item stands alone or came out of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Single,
    CollectionMember,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Single => write!(f, "single"),
            ItemKind::CollectionMember => write!(f, "collection-member"),
        }
    }
}

/// Where the media bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// A URL the platform downloader understands.
    Remote(String),
    /// A file already on disk.
    Local(PathBuf),
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Remote(url) => write!(f, "{}", url),
            Origin::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// One unit of media to transcribe. Created by resolution and never mutated
/// afterwards; the id (not the index) keys the audio cache and the output
/// path, so a rerun finds prior work even if the collection was reordered.
#[derive(Debug, Clone)]
pub struct SourceItem {
    /// Stable identifier (platform video id, or a path-derived id).
    pub id: String,
    pub kind: ItemKind,
    /// Display title.
    pub title: String,
    pub origin: Origin,
    /// 0-based position within the collection (0 for a single item).
    pub index: usize,
}

/// A collection entry that could not be resolved into an item.
#[derive(Debug, Clone)]
pub struct SkippedEntry {
    /// Whatever reference we had for the entry (id, title, or raw line).
    pub reference: String,
    pub reason: String,
}

/// Result of resolving an input: the usable items plus any collection
/// entries that had to be skipped (removed/private videos, unreadable
/// files). Skips never abort resolution.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub items: Vec<SourceItem>,
    pub skipped: Vec<SkippedEntry>,
}

/// Classification of a raw input string. Pure; performs no network calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    /// A single platform video (bare id or video URL).
    Video(String),
    /// A playlist URL.
    Playlist(String),
    /// An existing local media file.
    LocalFile(PathBuf),
    /// An existing local directory of media files.
    LocalDir(PathBuf),
}

impl InputKind {
    /// Whether resolving or materializing this input needs the platform
    /// downloader on PATH.
    pub fn needs_downloader(&self) -> bool {
        matches!(self, InputKind::Video(_) | InputKind::Playlist(_))
    }
}

/// Classify a raw input without touching the network.
///
/// Local paths win over URL parsing; a playlist URL wins over a video URL
/// that also carries a `list` parameter.
pub fn classify(input: &str) -> Result<InputKind> {
    let input = input.trim();
    if input.is_empty() {
        return Err(UtskriftError::InvalidInput("empty input".to_string()));
    }

    let path = PathBuf::from(input);
    if path.is_dir() {
        return Ok(InputKind::LocalDir(path));
    }
    if path.is_file() {
        if LocalResolver::is_media_file(&path) {
            return Ok(InputKind::LocalFile(path));
        }
        return Err(UtskriftError::InvalidInput(format!(
            "Not a recognized audio or video file: {}",
            input
        )));
    }

    if YoutubeResolver::is_playlist_url(input) {
        return Ok(InputKind::Playlist(input.to_string()));
    }

    let youtube = YoutubeResolver::new();
    if let Some(video_id) = youtube.extract_video_id(input) {
        return Ok(InputKind::Video(video_id));
    }

    Err(UtskriftError::InvalidInput(format!(
        "Could not classify input: {}",
        input
    )))
}

/// Resolve an input into an ordered list of source items.
///
/// `limit` caps collection expansion. Resolving zero items is not an error
/// here; the caller decides whether an empty collection is fatal.
pub async fn resolve(input: &str, limit: Option<usize>) -> Result<Resolution> {
    match classify(input)? {
        InputKind::Video(video_id) => {
            let youtube = YoutubeResolver::new();
            let item = youtube.resolve_video(&video_id).await?;
            Ok(Resolution {
                items: vec![item],
                skipped: Vec::new(),
            })
        }
        InputKind::Playlist(url) => {
            let youtube = YoutubeResolver::new();
            youtube.list_playlist(&url, limit).await
        }
        InputKind::LocalFile(path) => {
            let item = LocalResolver::item_from_path(&path, ItemKind::Single, 0)?;
            Ok(Resolution {
                items: vec![item],
                skipped: Vec::new(),
            })
        }
        InputKind::LocalDir(path) => LocalResolver::list_dir(&path, limit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_video_url() {
        let kind = classify("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        assert_eq!(kind, InputKind::Video("dQw4w9WgXcQ".to_string()));
        assert!(kind.needs_downloader());
    }

    #[test]
    fn test_classify_bare_id() {
        assert_eq!(
            classify("dQw4w9WgXcQ").unwrap(),
            InputKind::Video("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_classify_playlist_wins_over_video() {
        // A watch URL that also carries a list parameter is a collection.
        let kind =
            classify("https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PLabc123").unwrap();
        assert!(matches!(kind, InputKind::Playlist(_)));
    }

    #[test]
    fn test_classify_rejects_garbage() {
        assert!(classify("not a url or id").is_err());
        assert!(classify("").is_err());
    }

    #[test]
    fn test_classify_local_dir() {
        let dir = tempfile::tempdir().unwrap();
        let kind = classify(dir.path().to_str().unwrap()).unwrap();
        assert!(matches!(kind, InputKind::LocalDir(_)));
        assert!(!kind.needs_downloader());
    }

    #[test]
    fn test_classify_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("talk.mp3");
        std::fs::write(&file, b"x").unwrap();
        let kind = classify(file.to_str().unwrap()).unwrap();
        assert!(matches!(kind, InputKind::LocalFile(_)));

        let other = dir.path().join("notes.pdf");
        std::fs::write(&other, b"x").unwrap();
        assert!(classify(other.to_str().unwrap()).is_err());
    }
}
