//! Pipeline orchestration for utskrift.
//!
//! Drives every resolved source item through materialize, chunk,
//! transcribe, merge, and write, with a bounded worker pool across items
//! and a second bound across the chunks of one item. Failures are isolated
//! per item: one broken collection member never stops its siblings.

use crate::audio::{Chunker, FfmpegChunker, Materializer, AudioMaterializer};
use crate::config::Settings;
use crate::error::{Result, UtskriftError};
use crate::output::TranscriptWriter;
use crate::source::SourceItem;
use crate::transcription::{SpeechClient, Transcript, TranscriptFragment, WhisperClient};
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Where an item currently is in the pipeline. Advisory only; consumed by
/// progress displays, never by control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStage {
    Pending,
    Materializing,
    Chunking,
    Transcribing { done: usize, total: usize },
    Merging,
    Written,
    Skipped,
    Failed,
}

/// Terminal result for one item.
#[derive(Debug)]
pub enum ItemStatus {
    /// Transcript written to this path.
    Written(PathBuf),
    /// A finished transcript already existed, or the id was claimed by a
    /// duplicate entry earlier in the same run.
    Skipped(String),
    Failed(UtskriftError),
}

/// One item paired with how it ended.
#[derive(Debug)]
pub struct ItemOutcome {
    pub item: SourceItem,
    pub status: ItemStatus,
}

/// Summary of a whole run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<ItemOutcome>,
}

impl RunReport {
    pub fn written(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ItemStatus::Written(_)))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ItemStatus::Skipped(_)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ItemStatus::Failed(_)))
            .count()
    }

    /// A run succeeds unless every item in a non-empty run failed. A run
    /// where everything was already done (all skipped) is a success.
    pub fn success(&self) -> bool {
        self.outcomes.is_empty() || self.failed() < self.outcomes.len()
    }
}

/// Orchestrates the full transcription pipeline over a set of items.
pub struct PipelineOrchestrator {
    materializer: Arc<dyn Materializer>,
    chunker: Arc<dyn Chunker>,
    speech: Arc<dyn SpeechClient>,
    writer: Arc<TranscriptWriter>,
    workers: usize,
    chunk_workers: usize,
    force: bool,
    /// Item ids currently being processed, so duplicate entries in one
    /// collection cannot race each other to the same output path.
    in_flight: Mutex<HashSet<String>>,
    progress: Mutex<HashMap<String, ItemStage>>,
}

impl PipelineOrchestrator {
    /// Build the production pipeline from settings.
    pub fn new(settings: &Settings, writer: TranscriptWriter) -> Self {
        let materializer = Arc::new(AudioMaterializer::new(settings.audio_cache_dir()));
        let chunker = Arc::new(FfmpegChunker::new(
            settings.transcription.max_upload_bytes,
            settings.transcription.chunk_overlap_seconds,
        ));
        let speech = Arc::new(WhisperClient::new(
            &settings.transcription.model,
            settings.transcription.max_retries,
            Duration::from_millis(settings.transcription.retry_base_delay_ms),
        ));

        Self::with_components(
            materializer,
            chunker,
            speech,
            Arc::new(writer),
            settings.pipeline.workers,
            settings.pipeline.chunk_workers,
        )
    }

    /// Assemble a pipeline from explicit components.
    pub fn with_components(
        materializer: Arc<dyn Materializer>,
        chunker: Arc<dyn Chunker>,
        speech: Arc<dyn SpeechClient>,
        writer: Arc<TranscriptWriter>,
        workers: usize,
        chunk_workers: usize,
    ) -> Self {
        Self {
            materializer,
            chunker,
            speech,
            writer,
            workers: workers.max(1),
            chunk_workers: chunk_workers.max(1),
            force: false,
            in_flight: Mutex::new(HashSet::new()),
            progress: Mutex::new(HashMap::new()),
        }
    }

    /// Re-transcribe items even when a finished transcript exists.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Current stage of an item, for progress displays.
    pub fn stage_of(&self, item_id: &str) -> Option<ItemStage> {
        self.progress
            .lock()
            .ok()
            .and_then(|p| p.get(item_id).copied())
    }

    fn set_stage(&self, item_id: &str, stage: ItemStage) {
        if let Ok(mut progress) = self.progress.lock() {
            progress.insert(item_id.to_string(), stage);
        }
    }

    /// Run the pipeline over all items and report every outcome.
    pub async fn run(&self, items: Vec<SourceItem>, bar: Option<&ProgressBar>) -> RunReport {
        for item in &items {
            self.set_stage(&item.id, ItemStage::Pending);
        }

        let outcomes: Vec<ItemOutcome> = stream::iter(items)
            .map(|item| async move {
                let outcome = self.process_item(item).await;
                if let Some(bar) = bar {
                    bar.inc(1);
                }
                outcome
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let mut report = RunReport { outcomes };
        // Keep the report in resolution order for readable summaries.
        report.outcomes.sort_by_key(|o| o.item.index);
        report
    }

    #[instrument(skip(self, item), fields(item_id = %item.id, title = %item.title))]
    async fn process_item(&self, item: SourceItem) -> ItemOutcome {
        let claimed = match self.in_flight.lock() {
            Ok(mut set) => set.insert(item.id.clone()),
            Err(_) => false,
        };
        if !claimed {
            warn!("Duplicate item id in this run, skipping");
            self.set_stage(&item.id, ItemStage::Skipped);
            return ItemOutcome {
                status: ItemStatus::Skipped("duplicate item id in this run".to_string()),
                item,
            };
        }

        let status = self.run_stages(&item).await;

        if let Ok(mut set) = self.in_flight.lock() {
            set.remove(&item.id);
        }

        let stage = match &status {
            ItemStatus::Written(_) => ItemStage::Written,
            ItemStatus::Skipped(_) => ItemStage::Skipped,
            ItemStatus::Failed(_) => ItemStage::Failed,
        };
        self.set_stage(&item.id, stage);

        if let ItemStatus::Failed(e) = &status {
            warn!("Item failed ({}): {}", e.kind(), e);
        }

        ItemOutcome { item, status }
    }

    async fn run_stages(&self, item: &SourceItem) -> ItemStatus {
        if !self.force && self.writer.exists(&item.id) {
            info!("Transcript already exists, skipping");
            return ItemStatus::Skipped("transcript already exists".to_string());
        }

        match self.transcribe_item(item).await {
            Ok(path) => ItemStatus::Written(path),
            Err(e) => ItemStatus::Failed(e),
        }
    }

    async fn transcribe_item(&self, item: &SourceItem) -> Result<PathBuf> {
        self.set_stage(&item.id, ItemStage::Materializing);
        let artifact = self.materializer.materialize(item).await?;

        self.set_stage(&item.id, ItemStage::Chunking);
        let work_dir = tempfile::tempdir()?;
        let chunks = self.chunker.split(&artifact, work_dir.path()).await?;

        let total = chunks.len();
        self.set_stage(&item.id, ItemStage::Transcribing { done: 0, total });
        info!("Transcribing {} chunk(s)", total);

        let mut fragments: Vec<TranscriptFragment> = Vec::with_capacity(total);
        let mut failures: Vec<(usize, UtskriftError)> = Vec::new();
        let mut done = 0;

        let mut results = stream::iter(chunks)
            .map(|chunk| async move {
                let text = self.speech.transcribe(&chunk.path).await;
                (chunk, text)
            })
            .buffer_unordered(self.chunk_workers);

        while let Some((chunk, text)) = results.next().await {
            done += 1;
            self.set_stage(&item.id, ItemStage::Transcribing { done, total });
            match text {
                Ok(text) => fragments.push(TranscriptFragment {
                    index: chunk.index,
                    start_seconds: chunk.start_seconds,
                    end_seconds: chunk.end_seconds,
                    text,
                }),
                Err(e) => failures.push((chunk.index, e)),
            }
        }
        drop(results);

        // Chunk scratch space is only needed while transcribing.
        drop(work_dir);

        if !failures.is_empty() {
            failures.sort_by_key(|(index, _)| *index);
            for (index, e) in &failures {
                warn!("Chunk {} of {} failed: {}", index, total, e);
            }
            // Surface the earliest failed chunk; the item fails as a whole.
            let (_, first) = failures.remove(0);
            return Err(first);
        }

        self.set_stage(&item.id, ItemStage::Merging);
        let transcript = Transcript::new(item.id.clone(), fragments);

        self.writer.write(item, &transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::chunker::Chunk;
    use crate::audio::AudioArtifact;
    use crate::output::OutputFormat;
    use crate::source::{ItemKind, Origin};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_item(id: &str, index: usize) -> SourceItem {
        SourceItem {
            id: id.to_string(),
            kind: ItemKind::CollectionMember,
            title: format!("Item {}", id),
            origin: Origin::Remote(format!("https://example.com/{}", id)),
            index,
        }
    }

    struct StubMaterializer {
        calls: AtomicUsize,
        fail_ids: Vec<String>,
    }

    impl StubMaterializer {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_ids: Vec::new(),
            }
        }

        fn failing_for(ids: &[&str]) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_ids: ids.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl Materializer for StubMaterializer {
        async fn materialize(&self, item: &SourceItem) -> crate::error::Result<AudioArtifact> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_ids.contains(&item.id) {
                return Err(UtskriftError::SourceUnavailable(format!(
                    "{} is gone",
                    item.id
                )));
            }
            Ok(AudioArtifact {
                path: PathBuf::from(format!("{}.mp3", item.id)),
                size_bytes: 1024,
                duration_seconds: 60.0,
            })
        }
    }

    /// Produces one chunk per configured text, writing the text into the
    /// chunk file so the speech stub can read it back.
    struct StubChunker {
        texts: Vec<String>,
        fail_ids: Vec<String>,
    }

    impl StubChunker {
        fn with_texts(texts: &[&str]) -> Self {
            Self {
                texts: texts.iter().map(|s| s.to_string()).collect(),
                fail_ids: Vec::new(),
            }
        }

        fn failing_for(texts: &[&str], ids: &[&str]) -> Self {
            Self {
                texts: texts.iter().map(|s| s.to_string()).collect(),
                fail_ids: ids.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl Chunker for StubChunker {
        async fn split(
            &self,
            artifact: &AudioArtifact,
            work_dir: &Path,
        ) -> crate::error::Result<Vec<Chunk>> {
            let stem = artifact
                .path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("")
                .to_string();
            if self.fail_ids.contains(&stem) {
                return Err(UtskriftError::Chunking(format!("cannot split {}", stem)));
            }

            let span = artifact.duration_seconds / self.texts.len() as f64;
            let mut chunks = Vec::new();
            for (index, text) in self.texts.iter().enumerate() {
                let path = work_dir.join(format!("chunk_{:03}.txt", index));
                std::fs::write(&path, text)?;
                chunks.push(Chunk {
                    index,
                    path,
                    start_seconds: index as f64 * span,
                    end_seconds: (index + 1) as f64 * span,
                    size_bytes: text.len() as u64,
                });
            }
            Ok(chunks)
        }
    }

    /// Returns the chunk file's contents as its transcription. Optionally
    /// delays a specific text so completion order differs from chunk order.
    struct StubSpeech {
        delay_on: Option<String>,
    }

    #[async_trait]
    impl SpeechClient for StubSpeech {
        async fn transcribe(&self, audio_path: &Path) -> crate::error::Result<String> {
            let text = std::fs::read_to_string(audio_path)?;
            if self.delay_on.as_deref() == Some(text.as_str()) {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Ok(text)
        }
    }

    fn writer_in(dir: &Path) -> Arc<TranscriptWriter> {
        Arc::new(
            TranscriptWriter::new(dir.to_path_buf(), None, OutputFormat::Text)
                .expect("writer setup"),
        )
    }

    #[tokio::test]
    async fn test_fragments_merge_in_chunk_order() {
        let out = tempfile::tempdir().unwrap();
        let writer = writer_in(out.path());

        // Chunk 0 finishes last; the transcript must still read in order.
        let orchestrator = PipelineOrchestrator::with_components(
            Arc::new(StubMaterializer::new()),
            Arc::new(StubChunker::with_texts(&["hello ", "world"])),
            Arc::new(StubSpeech {
                delay_on: Some("hello ".to_string()),
            }),
            writer.clone(),
            2,
            2,
        );

        let report = orchestrator.run(vec![test_item("talk", 0)], None).await;
        assert_eq!(report.written(), 1);
        assert!(report.success());

        let content = std::fs::read_to_string(writer.output_path("talk")).unwrap();
        assert!(content.contains("hello world"));
        assert!(!content.contains("worldhello"));
    }

    #[tokio::test]
    async fn test_one_failed_item_does_not_stop_siblings() {
        let out = tempfile::tempdir().unwrap();
        let writer = writer_in(out.path());

        let orchestrator = PipelineOrchestrator::with_components(
            Arc::new(StubMaterializer::new()),
            Arc::new(StubChunker::failing_for(&["some text"], &["item3"])),
            Arc::new(StubSpeech { delay_on: None }),
            writer,
            4,
            2,
        );

        let items = (1..=5).map(|i| test_item(&format!("item{}", i), i - 1)).collect();
        let report = orchestrator.run(items, None).await;

        assert_eq!(report.written(), 4);
        assert_eq!(report.failed(), 1);
        assert!(report.success());

        let failed: Vec<_> = report
            .outcomes
            .iter()
            .filter(|o| matches!(o.status, ItemStatus::Failed(_)))
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].item.id, "item3");
        if let ItemStatus::Failed(e) = &failed[0].status {
            assert_eq!(e.kind(), "chunking");
        }
    }

    #[tokio::test]
    async fn test_unavailable_source_is_isolated() {
        let out = tempfile::tempdir().unwrap();
        let writer = writer_in(out.path());

        let orchestrator = PipelineOrchestrator::with_components(
            Arc::new(StubMaterializer::failing_for(&["gone"])),
            Arc::new(StubChunker::with_texts(&["ok"])),
            Arc::new(StubSpeech { delay_on: None }),
            writer,
            2,
            1,
        );

        let items = vec![test_item("a", 0), test_item("gone", 1), test_item("b", 2)];
        let report = orchestrator.run(items, None).await;

        assert_eq!(report.written(), 2);
        assert_eq!(report.failed(), 1);
        assert!(report.success());
    }

    #[tokio::test]
    async fn test_rerun_skips_finished_items_without_materializing() {
        let out = tempfile::tempdir().unwrap();

        let first = PipelineOrchestrator::with_components(
            Arc::new(StubMaterializer::new()),
            Arc::new(StubChunker::with_texts(&["done"])),
            Arc::new(StubSpeech { delay_on: None }),
            writer_in(out.path()),
            2,
            1,
        );
        let report = first
            .run(vec![test_item("a", 0), test_item("b", 1)], None)
            .await;
        assert_eq!(report.written(), 2);

        let materializer = Arc::new(StubMaterializer::new());
        let second = PipelineOrchestrator::with_components(
            materializer.clone(),
            Arc::new(StubChunker::with_texts(&["done"])),
            Arc::new(StubSpeech { delay_on: None }),
            writer_in(out.path()),
            2,
            1,
        );
        let report = second
            .run(vec![test_item("a", 0), test_item("b", 1)], None)
            .await;

        assert_eq!(report.skipped(), 2);
        assert_eq!(report.written(), 0);
        assert!(report.success());
        assert_eq!(materializer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_force_rewrites_finished_items() {
        let out = tempfile::tempdir().unwrap();

        let first = PipelineOrchestrator::with_components(
            Arc::new(StubMaterializer::new()),
            Arc::new(StubChunker::with_texts(&["v1"])),
            Arc::new(StubSpeech { delay_on: None }),
            writer_in(out.path()),
            1,
            1,
        );
        first.run(vec![test_item("a", 0)], None).await;

        let materializer = Arc::new(StubMaterializer::new());
        let second = PipelineOrchestrator::with_components(
            materializer.clone(),
            Arc::new(StubChunker::with_texts(&["v2"])),
            Arc::new(StubSpeech { delay_on: None }),
            writer_in(out.path()),
            1,
            1,
        )
        .force(true);
        let report = second.run(vec![test_item("a", 0)], None).await;

        assert_eq!(report.written(), 1);
        assert_eq!(materializer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_duplicate_ids_processed_once() {
        let out = tempfile::tempdir().unwrap();
        let materializer = Arc::new(StubMaterializer::new());

        let orchestrator = PipelineOrchestrator::with_components(
            materializer.clone(),
            Arc::new(StubChunker::with_texts(&["text"])),
            Arc::new(StubSpeech {
                delay_on: Some("text".to_string()),
            }),
            writer_in(out.path()),
            4,
            1,
        );

        // Same id twice in one collection.
        let items = vec![test_item("dup", 0), test_item("dup", 1)];
        let report = orchestrator.run(items, None).await;

        assert_eq!(report.written() + report.skipped(), 2);
        assert_eq!(report.written(), 1);
        assert_eq!(materializer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_run_is_success() {
        let out = tempfile::tempdir().unwrap();
        let orchestrator = PipelineOrchestrator::with_components(
            Arc::new(StubMaterializer::new()),
            Arc::new(StubChunker::with_texts(&["x"])),
            Arc::new(StubSpeech { delay_on: None }),
            writer_in(out.path()),
            1,
            1,
        );
        let report = orchestrator.run(Vec::new(), None).await;
        assert!(report.success());
        assert!(report.outcomes.is_empty());
    }
}
