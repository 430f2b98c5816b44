//! Transcript output for utskrift.
//!
//! The output directory doubles as the resumption ledger: a transcript
//! file existing for an item id means that item is done, so writes must be
//! atomic. A crash mid-write must never leave a truncated file that a
//! later run would mistake for a finished transcript.

use crate::error::{Result, UtskriftError};
use crate::source::{Origin, SourceItem};
use crate::transcription::{Transcript, TranscriptFragment};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Transcript file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Text => "txt",
            OutputFormat::Json => "json",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = UtskriftError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(UtskriftError::Config(format!(
                "Unknown output format: {}",
                other
            ))),
        }
    }
}

/// JSON export shape for one transcript.
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptExport {
    pub item_id: String,
    pub title: String,
    pub source: String,
    pub kind: String,
    pub transcribed_at: String,
    pub fragment_count: usize,
    pub fragments: Vec<TranscriptFragment>,
}

/// Writes finished transcripts and answers "is this item already done?".
pub struct TranscriptWriter {
    out_dir: PathBuf,
    format: OutputFormat,
}

impl TranscriptWriter {
    /// Create a writer rooted at `base_dir` (plus an optional subfolder),
    /// creating the directory if needed.
    pub fn new(base_dir: PathBuf, subfolder: Option<&str>, format: OutputFormat) -> Result<Self> {
        let out_dir = match subfolder {
            Some(sub) => base_dir.join(sanitize_component(sub)),
            None => base_dir,
        };
        std::fs::create_dir_all(&out_dir)?;
        Ok(Self { out_dir, format })
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// The path a transcript for this item id lives at.
    pub fn output_path(&self, item_id: &str) -> PathBuf {
        self.out_dir.join(format!(
            "{}.{}",
            sanitize_component(item_id),
            self.format.extension()
        ))
    }

    /// Whether a finished transcript already exists for this item id.
    pub fn exists(&self, item_id: &str) -> bool {
        self.output_path(item_id).is_file()
    }

    /// Write the transcript atomically: rendered to a temporary file in the
    /// output directory, then renamed into place.
    pub fn write(&self, item: &SourceItem, transcript: &Transcript) -> Result<PathBuf> {
        let target = self.output_path(&item.id);

        let content = match self.format {
            OutputFormat::Text => render_text(item, transcript),
            OutputFormat::Json => render_json(item, transcript)?,
        };

        let tmp = tempfile::NamedTempFile::new_in(&self.out_dir)?;
        std::fs::write(tmp.path(), content)?;
        tmp.persist(&target)
            .map_err(|e| UtskriftError::Io(e.error))?;

        info!("Wrote transcript to {}", target.display());
        Ok(target)
    }
}

/// Render a transcript as plain text with a metadata header.
fn render_text(item: &SourceItem, transcript: &Transcript) -> String {
    let mut out = String::new();
    out.push_str("# Transcript\n");
    out.push_str(&format!("Item: {}\n", item.title));
    out.push_str(&format!("Id: {}\n", item.id));
    out.push_str(&format!("Source: {}\n", source_label(&item.origin)));
    out.push_str(&format!(
        "Transcribed: {}\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&"=".repeat(60));
    out.push_str("\n\n");

    for line in split_sentences(&transcript.full_text) {
        out.push_str(&line);
        out.push('\n');
    }

    out
}

fn render_json(item: &SourceItem, transcript: &Transcript) -> Result<String> {
    let export = TranscriptExport {
        item_id: item.id.clone(),
        title: item.title.clone(),
        source: source_label(&item.origin),
        kind: item.kind.to_string(),
        transcribed_at: Utc::now().to_rfc3339(),
        fragment_count: transcript.fragments.len(),
        fragments: transcript.fragments.clone(),
    };
    Ok(serde_json::to_string_pretty(&export)?)
}

fn source_label(origin: &Origin) -> String {
    origin.to_string()
}

/// Replace path-hostile characters so an id or subfolder name is safe as a
/// single path component.
fn sanitize_component(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Break a flat transcript into one sentence per line.
///
/// Whisper returns a single run of prose. Sentences are cut after a run of
/// terminal punctuation followed by whitespace, but only where the next
/// character is uppercase, so abbreviations and decimals stay intact. Text
/// with no usable boundaries comes back as a single line.
fn split_sentences(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let boundary = regex::Regex::new(r"[.!?]+\s+").expect("Invalid regex");

    let mut lines = Vec::new();
    let mut last = 0;
    for m in boundary.find_iter(trimmed) {
        let next_char = trimmed[m.end()..].chars().next();
        if next_char.is_some_and(|c| c.is_uppercase()) {
            let sentence = trimmed[last..m.end()].trim();
            if sentence.chars().count() > 1 {
                lines.push(sentence.to_string());
            }
            last = m.end();
        }
    }

    let tail = trimmed[last..].trim();
    if tail.chars().count() > 1 {
        lines.push(tail.to_string());
    }

    // No uppercase-led boundaries found; fall back to plain ". " splitting
    // before giving up and emitting a single block.
    if lines.len() <= 1 && trimmed.contains(". ") {
        let parts: Vec<&str> = trimmed.split(". ").collect();
        let last_index = parts.len() - 1;
        let fallback: Vec<String> = parts
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let s = s.trim();
                if i < last_index && !s.ends_with('.') {
                    format!("{}.", s)
                } else {
                    s.to_string()
                }
            })
            .filter(|s| s.chars().count() > 1)
            .collect();
        if fallback.len() > 1 {
            return fallback;
        }
    }

    if lines.is_empty() {
        vec![trimmed.to_string()]
    } else {
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ItemKind;

    fn item() -> SourceItem {
        SourceItem {
            id: "abc123".to_string(),
            kind: ItemKind::Single,
            title: "A Lecture".to_string(),
            origin: Origin::Remote("https://www.youtube.com/watch?v=abc123".to_string()),
            index: 0,
        }
    }

    fn transcript(text: &str) -> Transcript {
        Transcript::new(
            "abc123".to_string(),
            vec![TranscriptFragment {
                index: 0,
                start_seconds: 0.0,
                end_seconds: 60.0,
                text: text.to_string(),
            }],
        )
    }

    #[test]
    fn test_split_sentences() {
        let lines = split_sentences("First point here. Second point follows! Was that all? Yes.");
        assert_eq!(
            lines,
            vec![
                "First point here.",
                "Second point follows!",
                "Was that all?",
                "Yes."
            ]
        );
    }

    #[test]
    fn test_split_sentences_keeps_lowercase_continuation() {
        // "e.g. some" must not split: continuation is lowercase.
        let lines = split_sentences("Use e.g. some tool. Then continue.");
        assert_eq!(lines, vec!["Use e.g. some tool.", "Then continue."]);
    }

    #[test]
    fn test_split_sentences_lowercase_fallback() {
        // No uppercase-led boundaries anywhere; plain ". " splitting kicks in.
        let lines = split_sentences("first thought here. second thought. done");
        assert_eq!(
            lines,
            vec!["first thought here.", "second thought.", "done"]
        );
    }

    #[test]
    fn test_split_sentences_no_boundaries() {
        let lines = split_sentences("no punctuation at all just words");
        assert_eq!(lines, vec!["no punctuation at all just words"]);
    }

    #[test]
    fn test_text_output_has_header_and_separator() {
        let dir = tempfile::tempdir().unwrap();
        let writer =
            TranscriptWriter::new(dir.path().to_path_buf(), None, OutputFormat::Text).unwrap();

        let path = writer.write(&item(), &transcript("Hello there. All good.")).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();

        assert!(content.starts_with("# Transcript\n"));
        assert!(content.contains("Item: A Lecture\n"));
        assert!(content.contains("Id: abc123\n"));
        assert!(content.contains(&"=".repeat(60)));
        assert!(content.contains("Hello there.\nAll good.\n"));
    }

    #[test]
    fn test_json_output_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let writer =
            TranscriptWriter::new(dir.path().to_path_buf(), None, OutputFormat::Json).unwrap();

        let path = writer.write(&item(), &transcript("Hello.")).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let export: TranscriptExport = serde_json::from_str(&content).unwrap();

        assert_eq!(export.item_id, "abc123");
        assert_eq!(export.fragment_count, 1);
        assert_eq!(export.fragments[0].text, "Hello.");
    }

    #[test]
    fn test_exists_after_write() {
        let dir = tempfile::tempdir().unwrap();
        let writer =
            TranscriptWriter::new(dir.path().to_path_buf(), None, OutputFormat::Text).unwrap();

        assert!(!writer.exists("abc123"));
        writer.write(&item(), &transcript("Hello.")).unwrap();
        assert!(writer.exists("abc123"));
    }

    #[test]
    fn test_subfolder_and_id_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let writer = TranscriptWriter::new(
            dir.path().to_path_buf(),
            Some("my course/week 1"),
            OutputFormat::Text,
        )
        .unwrap();

        assert!(writer.out_dir().exists());
        assert!(!writer.out_dir().to_string_lossy().ends_with("week 1"));

        let path = writer.output_path("weird/id here");
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("weird_id_here.txt")
        );
    }

    #[test]
    fn test_no_partial_file_visible_under_target_name() {
        let dir = tempfile::tempdir().unwrap();
        let writer =
            TranscriptWriter::new(dir.path().to_path_buf(), None, OutputFormat::Text).unwrap();

        // Before any write, nothing at the target path, even though the
        // directory exists and may hold unrelated temp files.
        assert!(!writer.output_path("abc123").exists());

        writer.write(&item(), &transcript("Hello.")).unwrap();
        let content = std::fs::read_to_string(writer.output_path("abc123")).unwrap();
        assert!(content.ends_with("Hello.\n"));
    }
}
