use std::time::Duration;

use tracing::{debug, warn};

use crate::logs::LogEntry;
use crate::upload::backend::ProcessingApi;
use crate::upload::orchestrator::Journal;

/// Fixed-interval status poller used after a 429. No backoff and no attempt
/// ceiling; it runs until the backend reports completion or the owning
/// future is dropped. The orchestrator awaits it inline, so at most one
/// poller ever exists.
pub struct RetryPoller {
    interval: Duration,
}

impl RetryPoller {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Poll `GET /api/status` once per interval until `status == "completed"`.
    /// On completion appends one synthetic success entry and returns the
    /// number of ticks performed. A failed tick is logged and polling
    /// continues.
    pub async fn wait_for_completion<A: ProcessingApi + ?Sized>(
        &self,
        api: &A,
        journal: &mut Journal,
    ) -> usize {
        let mut ticks = 0usize;
        loop {
            tokio::time::sleep(self.interval).await;
            ticks += 1;
            match api.status().await {
                Ok(reply) if reply.is_completed() => {
                    debug!(ticks, "backend reported completion");
                    journal.append(LogEntry::success(
                        "Upload completed successfully after retries",
                    ));
                    return ticks;
                }
                Ok(reply) => {
                    debug!(status = %reply.status, ticks, "still waiting on backend");
                }
                Err(err) => {
                    warn!(error = %err, "status poll failed, will retry");
                    journal.append(LogEntry::error(format!("Status check failed: {err:#}")));
                }
            }
        }
    }
}

impl Default for RetryPoller {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}
