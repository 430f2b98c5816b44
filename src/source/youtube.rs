//! YouTube resolution via yt-dlp.

use super::{ItemKind, Origin, Resolution, SkippedEntry, SourceItem};
use crate::error::{Result, UtskriftError};
use regex::Regex;
use url::Url;

/// Playlist entry titles yt-dlp reports for inaccessible videos.
const UNAVAILABLE_TITLES: &[&str] = &["[Private video]", "[Deleted video]", "[Unavailable video]"];

/// Resolves YouTube video and playlist references.
pub struct YoutubeResolver {
    video_id_regex: Regex,
}

impl YoutubeResolver {
    pub fn new() -> Self {
        // Matches various YouTube URL formats and bare video IDs
        let video_id_regex = Regex::new(
            r"(?x)
            (?:
                # Full YouTube URLs
                (?:https?://)?
                (?:www\.)?
                (?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/|youtube\.com/v/)
                ([a-zA-Z0-9_-]{11})
            )
            |
            # Bare video ID (11 characters)
            ^([a-zA-Z0-9_-]{11})$
        ",
        )
        .expect("Invalid regex");

        Self { video_id_regex }
    }

    /// Extract a video ID from a YouTube URL or bare ID.
    pub fn extract_video_id(&self, input: &str) -> Option<String> {
        let caps = self.video_id_regex.captures(input.trim())?;

        // Try group 1 (URL format) then group 2 (bare ID)
        caps.get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().to_string())
    }

    /// Whether the input is a playlist URL (a YouTube URL carrying a `list`
    /// query parameter).
    pub fn is_playlist_url(input: &str) -> bool {
        let Ok(url) = Url::parse(input.trim()) else {
            return false;
        };
        let youtube_host = url.host_str().is_some_and(|h| {
            matches!(
                h,
                "www.youtube.com" | "youtube.com" | "m.youtube.com" | "youtu.be"
            )
        });
        youtube_host && url.query_pairs().any(|(k, _)| k == "list")
    }

    pub fn watch_url(video_id: &str) -> String {
        format!("https://www.youtube.com/watch?v={}", video_id)
    }

    /// Resolve a single video into a source item, fetching its title.
    pub async fn resolve_video(&self, video_id: &str) -> Result<SourceItem> {
        let url = Self::watch_url(video_id);

        let output = tokio::process::Command::new("yt-dlp")
            .args(["--dump-json", "--no-download", "--no-warnings", &url])
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    UtskriftError::ToolNotFound("yt-dlp".to_string())
                } else {
                    UtskriftError::SourceUnavailable(format!("Failed to run yt-dlp: {}", e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(UtskriftError::SourceUnavailable(format!(
                "Video {} not found or unavailable: {}",
                video_id,
                stderr.trim()
            )));
        }

        let json: serde_json::Value = serde_json::from_slice(&output.stdout).map_err(|e| {
            UtskriftError::SourceUnavailable(format!("Failed to parse yt-dlp output: {}", e))
        })?;

        let title = json["title"]
            .as_str()
            .unwrap_or("Unknown Title")
            .to_string();

        Ok(SourceItem {
            id: video_id.to_string(),
            kind: ItemKind::Single,
            title,
            origin: Origin::Remote(url),
            index: 0,
        })
    }

    /// Expand a playlist into source items, one per usable entry.
    ///
    /// Removed or private entries are skipped and recorded, never fatal;
    /// item indices track the position in the playlist itself so resumption
    /// naming stays stable across reruns.
    pub async fn list_playlist(&self, url: &str, limit: Option<usize>) -> Result<Resolution> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--no-download".to_string(),
            "--no-warnings".to_string(),
            "--ignore-errors".to_string(),
            "--flat-playlist".to_string(),
        ];
        if let Some(limit) = limit {
            args.push("--playlist-end".to_string());
            args.push(limit.to_string());
        }
        args.push(url.to_string());

        let output = tokio::process::Command::new("yt-dlp")
            .args(&args)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    UtskriftError::ToolNotFound("yt-dlp".to_string())
                } else {
                    UtskriftError::SourceUnavailable(format!("Failed to run yt-dlp: {}", e))
                }
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);

        // With --ignore-errors yt-dlp can exit non-zero while still having
        // listed most of the playlist. Only a fully empty listing is fatal.
        if !output.status.success() && stdout.trim().is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(UtskriftError::SourceUnavailable(format!(
                "Failed to list playlist: {}",
                stderr.trim()
            )));
        }

        let mut resolution = Resolution::default();

        for (position, line) in stdout.lines().filter(|l| !l.trim().is_empty()).enumerate() {
            match parse_playlist_entry(self, line, position) {
                Ok(item) => resolution.items.push(item),
                Err(skipped) => {
                    tracing::warn!(
                        "Skipping playlist entry {}: {} ({})",
                        position,
                        skipped.reference,
                        skipped.reason
                    );
                    resolution.skipped.push(skipped);
                }
            }
        }

        Ok(resolution)
    }
}

impl Default for YoutubeResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one flat-playlist JSON line into an item, or a skip record.
fn parse_playlist_entry(
    resolver: &YoutubeResolver,
    line: &str,
    position: usize,
) -> std::result::Result<SourceItem, SkippedEntry> {
    let json: serde_json::Value =
        serde_json::from_str(line).map_err(|e| SkippedEntry {
            reference: format!("entry {}", position),
            reason: format!("unparseable playlist entry: {}", e),
        })?;

    let video_id = json["id"]
        .as_str()
        .or_else(|| json["url"].as_str())
        .and_then(|s| resolver.extract_video_id(s).or_else(|| Some(s.to_string())))
        .ok_or_else(|| SkippedEntry {
            reference: format!("entry {}", position),
            reason: "no video id in playlist entry".to_string(),
        })?;

    let title = json["title"]
        .as_str()
        .unwrap_or("Unknown Title")
        .to_string();

    if UNAVAILABLE_TITLES.contains(&title.as_str()) {
        return Err(SkippedEntry {
            reference: video_id,
            reason: format!("inaccessible entry: {}", title),
        });
    }

    Ok(SourceItem {
        id: video_id.clone(),
        kind: ItemKind::CollectionMember,
        title,
        origin: Origin::Remote(YoutubeResolver::watch_url(&video_id)),
        index: position,
    })
}
