use std::path::Path;

use clap::ValueEnum;

use crate::logs::LogKind;
use crate::upload::{OrchestratorEvent, Phase};
use crate::utils::format_size;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Output {
    Human,
    Json,
}

impl std::fmt::Display for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Output::Human => f.write_str("human"),
            Output::Json => f.write_str("json"),
        }
    }
}

/// Renders orchestrator events to stdout, either as human-readable lines or
/// as one JSON object per line.
pub struct Renderer {
    output: Output,
}

impl Renderer {
    pub fn new(output: Output) -> Self {
        Self { output }
    }

    pub fn queued(&self, files: &[std::path::PathBuf]) {
        match self.output {
            Output::Human => {
                for file in files {
                    println!("📄 Queued {} ({})", display_name(file), size_label(file));
                }
            }
            Output::Json => {
                for file in files {
                    println!(
                        "{}",
                        serde_json::json!({ "event": "queued", "file": display_name(file) })
                    );
                }
            }
        }
    }

    pub fn render(&self, event: &OrchestratorEvent) {
        match self.output {
            Output::Json => {
                if let Ok(line) = serde_json::to_string(event) {
                    println!("{line}");
                }
            }
            Output::Human => match event {
                OrchestratorEvent::LogAppended(entry) => {
                    let symbol = match entry.kind {
                        LogKind::Success => "✅",
                        LogKind::Retry => "⏳",
                        LogKind::Error => "❌",
                    };
                    println!(
                        "{} {} {}",
                        entry.timestamp.format("%H:%M:%S"),
                        symbol,
                        entry.message
                    );
                }
                OrchestratorEvent::PhaseChanged {
                    phase: Phase::RateLimited,
                    ..
                } => {
                    println!("⏳ Rate limited, polling the backend until it catches up...");
                }
                OrchestratorEvent::PhaseChanged { .. } => {}
                OrchestratorEvent::Completed { processed } => {
                    println!("✅ Upload complete: {processed} file(s) processed");
                }
                OrchestratorEvent::Failed { message } => {
                    println!("❌ Upload halted: {message}");
                }
            },
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn size_label(path: &Path) -> String {
    std::fs::metadata(path)
        .map(|m| format_size(m.len()))
        .unwrap_or_else(|_| "unknown size".to_string())
}
