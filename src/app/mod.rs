mod render;

pub use render::{Output, Renderer};

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use ignore::Walk;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::upload::{HttpProcessingApi, Orchestrator, Phase};

fn is_statement_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// Expand file and directory arguments into an ordered CSV queue.
/// Directories are walked gitignore-aware; non-CSV files inside them are
/// silently skipped, but a non-CSV file named explicitly is a warning.
pub fn collect_statement_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in Walk::new(input).flatten() {
                let path = entry.path();
                if path.is_file() && is_statement_file(path) {
                    files.push(path.to_path_buf());
                }
            }
        } else if input.is_file() {
            if is_statement_file(input) {
                files.push(input.clone());
            } else {
                warn!(file = %input.display(), "skipping non-CSV file");
            }
        } else {
            bail!("no such file or directory: {}", input.display());
        }
    }
    if files.is_empty() {
        bail!("nothing to upload: no CSV files found");
    }
    Ok(files)
}

/// Build the queue, run the orchestrator on a worker task, and render its
/// event stream as it arrives.
pub async fn run_upload(
    endpoint: String,
    inputs: Vec<PathBuf>,
    poll_interval: Duration,
    output: Output,
) -> Result<()> {
    let files = collect_statement_files(&inputs)?;
    let renderer = Renderer::new(output);
    renderer.queued(&files);

    let mut orchestrator =
        Orchestrator::new(HttpProcessingApi::new(endpoint.clone())).with_poll_interval(poll_interval);
    for file in files {
        orchestrator.enqueue(file);
    }
    info!(queued = orchestrator.queued(), %endpoint, "starting upload run");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let worker = tokio::spawn(async move { orchestrator.run(tx).await });

    while let Some(event) = rx.recv().await {
        renderer.render(&event);
    }

    let summary = worker.await.context("orchestrator task panicked")?;
    info!(
        processed = summary.processed,
        entries = summary.entries.len(),
        phase = ?summary.phase,
        "run finished"
    );
    if summary.phase == Phase::Failed {
        bail!(
            "run halted after {} successful file(s); see the log above",
            summary.processed
        );
    }
    Ok(())
}
