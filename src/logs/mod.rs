use chrono::{DateTime, Utc};
use serde::Serialize;

/// Marker the processing service puts on lines describing an in-progress
/// retry, e.g. "⏳ Rate limit reached, retrying in 8s".
pub const RETRY_GLYPH: &str = "⏳";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Success,
    Retry,
    Error,
}

/// Priority-ordered substring rules, first match wins. Matching is
/// case-sensitive; "Skip" (capitalized) is the exact marker the processing
/// service emits for skipped transactions.
const RULES: &[(&str, LogKind)] = &[
    (RETRY_GLYPH, LogKind::Retry),
    ("error", LogKind::Error),
    ("failed", LogKind::Error),
    ("Skip", LogKind::Error),
];

/// Classify one non-blank line of raw backend output. Pure; callers drop
/// blank lines before calling this.
pub fn classify_line(line: &str) -> LogKind {
    RULES
        .iter()
        .find(|(needle, _)| line.contains(needle))
        .map(|(_, kind)| *kind)
        .unwrap_or(LogKind::Success)
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub kind: LogKind,
}

impl LogEntry {
    fn new(message: impl Into<String>, kind: LogKind) -> Self {
        Self {
            message: message.into(),
            timestamp: Utc::now(),
            kind,
        }
    }

    /// Classify a raw line and stamp it with the current time.
    pub fn classified(line: &str) -> Self {
        Self::new(line, classify_line(line))
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(message, LogKind::Success)
    }

    /// A retry entry regardless of the message text; used for 429 replies,
    /// which carry retry semantics even without the glyph.
    pub fn retry(message: impl Into<String>) -> Self {
        Self::new(message, LogKind::Retry)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, LogKind::Error)
    }
}
