//! Transcribe command - resolve an input and run the pipeline over it.

use crate::cli::preflight::Capabilities;
use crate::cli::Output;
use crate::config::Settings;
use crate::output::{OutputFormat, TranscriptWriter};
use crate::pipeline::{ItemStatus, PipelineOrchestrator, RunReport};
use crate::source;
use console::style;
use std::str::FromStr;

#[allow(clippy::too_many_arguments)]
pub async fn run_transcribe(
    input: &str,
    workers: Option<usize>,
    chunk_workers: Option<usize>,
    format: Option<&str>,
    subfolder: Option<&str>,
    limit: Option<usize>,
    force: bool,
    mut settings: Settings,
) -> anyhow::Result<()> {
    let kind = source::classify(input)?;

    let caps = Capabilities::probe();
    caps.ensure_transcribe(kind.needs_downloader())?;

    let spinner = Output::spinner("Resolving input...");
    let resolution = source::resolve(input, limit).await?;
    spinner.finish_and_clear();

    for skipped in &resolution.skipped {
        Output::warning(&format!(
            "Skipping {}: {}",
            skipped.reference, skipped.reason
        ));
    }

    if resolution.items.is_empty() {
        anyhow::bail!("No transcribable items found in input");
    }

    Output::info(&format!(
        "Transcribing {} item(s)",
        resolution.items.len()
    ));

    if let Some(workers) = workers {
        settings.pipeline.workers = workers;
    }
    if let Some(chunk_workers) = chunk_workers {
        settings.pipeline.chunk_workers = chunk_workers;
    }

    let format = OutputFormat::from_str(format.unwrap_or(&settings.output.format))?;
    let writer = TranscriptWriter::new(settings.output_dir(), subfolder, format)?;
    let out_dir = writer.out_dir().to_path_buf();

    let orchestrator = PipelineOrchestrator::new(&settings, writer).force(force);

    let bar = Output::progress_bar(resolution.items.len() as u64, "transcribing");

    let report = tokio::select! {
        report = orchestrator.run(resolution.items, Some(&bar)) => report,
        _ = tokio::signal::ctrl_c() => {
            bar.finish_and_clear();
            Output::warning("Interrupted. Finished transcripts are kept; rerun to resume.");
            anyhow::bail!("interrupted");
        }
    };
    bar.finish_and_clear();

    print_summary(&report);
    Output::kv("Output directory", &out_dir.display().to_string());

    if !report.success() {
        anyhow::bail!("All items failed");
    }
    Ok(())
}

fn print_summary(report: &RunReport) {
    Output::header("Results");
    for outcome in &report.outcomes {
        match &outcome.status {
            ItemStatus::Written(path) => Output::item_outcome(
                &style("✓").green().to_string(),
                &outcome.item.title,
                &path.display().to_string(),
            ),
            ItemStatus::Skipped(reason) => Output::item_outcome(
                &style("-").dim().to_string(),
                &outcome.item.title,
                &format!("skipped: {}", reason),
            ),
            ItemStatus::Failed(e) => Output::item_outcome(
                &style("✗").red().to_string(),
                &outcome.item.title,
                &format!("{}: {}", e.kind(), e),
            ),
        }
    }

    println!();
    let summary = format!(
        "{} written, {} skipped, {} failed",
        report.written(),
        report.skipped(),
        report.failed()
    );
    if report.failed() > 0 {
        Output::warning(&summary);
    } else {
        Output::success(&summary);
    }
}
