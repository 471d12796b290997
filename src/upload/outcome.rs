use crate::upload::types::ReplyBody;

/// How one upload reply should be handled. Driven purely by HTTP status;
/// keyword sniffing happens later, line by line, in `logs::classify_line`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Success {
        details: Option<String>,
    },
    /// 429. Always recoverable: the orchestrator starts the status poller.
    RateLimited {
        message: String,
        details: Option<String>,
    },
    /// Any other non-2xx. Halts the remaining queue. The failure message is
    /// `body.error`, falling back to `body.details`.
    HardFailure {
        message: String,
        details: Option<String>,
    },
}

pub fn interpret(status: u16, body: &ReplyBody) -> UploadOutcome {
    match status {
        200..=299 => UploadOutcome::Success {
            details: body.details.clone(),
        },
        429 => UploadOutcome::RateLimited {
            message: body
                .error
                .clone()
                .unwrap_or_else(|| "Rate limit reached".to_string()),
            details: body.details.clone(),
        },
        _ => UploadOutcome::HardFailure {
            message: body
                .error
                .clone()
                .or_else(|| body.details.clone())
                .unwrap_or_else(|| format!("Upload failed with status {status}")),
            details: body.details.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(error: Option<&str>, details: Option<&str>) -> ReplyBody {
        ReplyBody {
            message: None,
            error: error.map(String::from),
            details: details.map(String::from),
            code: None,
        }
    }

    #[test]
    fn two_hundred_is_success_with_details() {
        let outcome = interpret(200, &body(None, Some("Imported 5 transactions")));
        assert_eq!(
            outcome,
            UploadOutcome::Success {
                details: Some("Imported 5 transactions".to_string())
            }
        );
    }

    #[test]
    fn rate_limit_is_driven_by_status_not_text() {
        // No glyph, no retry wording; 429 alone decides.
        let outcome = interpret(429, &body(Some("try later"), None));
        assert_eq!(
            outcome,
            UploadOutcome::RateLimited {
                message: "try later".to_string(),
                details: None,
            }
        );
    }

    #[test]
    fn other_statuses_are_hard_failures() {
        let outcome = interpret(500, &body(Some("Invalid format"), None));
        assert!(matches!(
            outcome,
            UploadOutcome::HardFailure { ref message, .. } if message == "Invalid format"
        ));

        // Falls back to details, then to a generic message.
        let outcome = interpret(400, &body(None, Some("No file provided")));
        assert!(matches!(
            outcome,
            UploadOutcome::HardFailure { ref message, .. } if message == "No file provided"
        ));

        let outcome = interpret(502, &body(None, None));
        assert!(matches!(
            outcome,
            UploadOutcome::HardFailure { ref message, .. } if message == "Upload failed with status 502"
        ));
    }

    #[test]
    fn hard_failure_carries_the_backend_details() {
        let outcome = interpret(500, &body(Some("Invalid format"), Some("row 3: bad date")));
        assert_eq!(
            outcome,
            UploadOutcome::HardFailure {
                message: "Invalid format".to_string(),
                details: Some("row 3: bad date".to_string()),
            }
        );
    }

    #[test]
    fn success_body_keywords_do_not_demote_status() {
        // An error-looking body with a 2xx status is still a success at this
        // layer; the details lines get classified individually later.
        let outcome = interpret(200, &body(None, Some("1 error ignored")));
        assert!(matches!(outcome, UploadOutcome::Success { .. }));
    }
}
