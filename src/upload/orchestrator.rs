use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::logs::LogEntry;
use crate::upload::backend::ProcessingApi;
use crate::upload::outcome::{interpret, UploadOutcome};
use crate::upload::poller::RetryPoller;
use crate::upload::types::{JobState, OrchestratorEvent, Phase, UploadJob};

/// Append-only run log plus the current phase, owned by the orchestrator for
/// the duration of one run. Every mutation is mirrored as an event on the
/// channel so the renderer sees the same causal order the log records.
pub struct Journal {
    entries: Vec<LogEntry>,
    phase: Phase,
    waiting_on_retry: bool,
    tx: UnboundedSender<OrchestratorEvent>,
}

impl Journal {
    fn new(tx: UnboundedSender<OrchestratorEvent>) -> Self {
        Self {
            entries: Vec::new(),
            phase: Phase::Idle,
            waiting_on_retry: false,
            tx,
        }
    }

    pub fn append(&mut self, entry: LogEntry) {
        self.entries.push(entry.clone());
        let _ = self.tx.send(OrchestratorEvent::LogAppended(entry));
    }

    /// Split a `details` block into lines, drop blank ones, classify and
    /// append the rest in order.
    fn append_details(&mut self, details: &str) {
        for line in details.lines() {
            if !line.trim().is_empty() {
                self.append(LogEntry::classified(line));
            }
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            self.phase = phase;
            let _ = self.tx.send(OrchestratorEvent::PhaseChanged {
                phase,
                waiting_on_retry: self.waiting_on_retry,
            });
        }
    }

    fn set_waiting(&mut self, waiting: bool) {
        self.waiting_on_retry = waiting;
    }
}

/// Final state of one run: terminal phase, number of files that made it
/// through, and the full ordered log.
#[derive(Debug)]
pub struct RunSummary {
    pub phase: Phase,
    pub processed: usize,
    pub entries: Vec<LogEntry>,
}

/// Drives the queue: submit one file at a time, interpret the reply, poll on
/// rate limits, halt on the first hard failure. `run` takes `&mut self`, so
/// overlapping runs are rejected at compile time.
pub struct Orchestrator<A> {
    api: A,
    poller: RetryPoller,
    queue: Vec<UploadJob>,
    next_id: u32,
}

impl<A: ProcessingApi> Orchestrator<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            poller: RetryPoller::default(),
            queue: Vec::new(),
            next_id: 0,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poller = RetryPoller::new(interval);
        self
    }

    pub fn enqueue(&mut self, path: PathBuf) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.queue.push(UploadJob::new(id, path));
        id
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Process the queue in order. The queue is drained up front; on a hard
    /// failure the jobs that were never submitted are discarded with it.
    pub async fn run(&mut self, tx: UnboundedSender<OrchestratorEvent>) -> RunSummary {
        let mut journal = Journal::new(tx);
        let jobs = std::mem::take(&mut self.queue);
        let total = jobs.len();
        let mut processed = 0usize;

        for mut job in jobs {
            job.state = JobState::Uploading;
            journal.set_phase(Phase::Uploading);
            info!(id = job.id, file = %job.name, "uploading");

            let reply = match self.api.submit(&job).await {
                Ok(reply) => reply,
                Err(err) => {
                    job.state = JobState::Failed;
                    warn!(file = %job.name, error = %err, "transport failure");
                    return self.fail(journal, processed, format!("{err:#}"));
                }
            };

            match interpret(reply.status, &reply.body) {
                UploadOutcome::Success { details } => {
                    if let Some(details) = details {
                        journal.append_details(&details);
                    }
                    job.state = JobState::Succeeded;
                    processed += 1;
                }
                UploadOutcome::RateLimited { message, details } => {
                    job.state = JobState::RateLimited;
                    journal.set_waiting(true);
                    journal.set_phase(Phase::RateLimited);
                    journal.append(LogEntry::retry(message));
                    if let Some(details) = details {
                        journal.append_details(&details);
                    }

                    let ticks = self.poller.wait_for_completion(&self.api, &mut journal).await;
                    info!(file = %job.name, ticks, "rate limit cleared, resuming queue");

                    journal.set_waiting(false);
                    job.state = JobState::Succeeded;
                    processed += 1;
                }
                UploadOutcome::HardFailure { message, details } => {
                    job.state = JobState::Failed;
                    warn!(file = %job.name, error = %message, details = ?details, "upload failed");
                    return self.fail(journal, processed, message);
                }
            }
            debug!(file = %job.name, state = ?job.state, "job settled");
        }

        info!(total, "queue drained");
        journal.set_phase(Phase::Idle);
        let _ = journal.tx.send(OrchestratorEvent::Completed { processed });
        RunSummary {
            phase: journal.phase,
            processed,
            entries: journal.entries,
        }
    }

    fn fail(&self, mut journal: Journal, processed: usize, message: String) -> RunSummary {
        journal.append(LogEntry::error(message.clone()));
        journal.set_phase(Phase::Failed);
        let _ = journal.tx.send(OrchestratorEvent::Failed { message });
        RunSummary {
            phase: journal.phase,
            processed,
            entries: journal.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::logs::LogKind;
    use crate::upload::types::{ReplyBody, StatusReply, UploadReply};

    /// Scripted backend: canned upload replies and status-poll replies,
    /// consumed in order, with a record of what was asked.
    #[derive(Default, Clone)]
    struct FakeApi {
        inner: std::sync::Arc<FakeInner>,
    }

    #[derive(Default)]
    struct FakeInner {
        replies: Mutex<VecDeque<Result<UploadReply>>>,
        statuses: Mutex<VecDeque<Result<StatusReply>>>,
        submitted: Mutex<Vec<String>>,
        status_calls: AtomicUsize,
    }

    impl FakeApi {
        fn push_reply(&self, reply: Result<UploadReply>) {
            self.inner.replies.lock().unwrap().push_back(reply);
        }

        fn push_status(&self, status: &str) {
            self.inner.statuses.lock().unwrap().push_back(Ok(StatusReply {
                status: status.to_string(),
            }));
        }

        fn push_status_err(&self, message: &str) {
            self.inner
                .statuses
                .lock()
                .unwrap()
                .push_back(Err(anyhow!(message.to_string())));
        }

        fn submitted(&self) -> Vec<String> {
            self.inner.submitted.lock().unwrap().clone()
        }

        fn status_calls(&self) -> usize {
            self.inner.status_calls.load(Ordering::SeqCst)
        }

        fn statuses_left(&self) -> usize {
            self.inner.statuses.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ProcessingApi for FakeApi {
        async fn submit(&self, job: &UploadJob) -> Result<UploadReply> {
            self.inner.submitted.lock().unwrap().push(job.name.clone());
            self.inner
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected submit")
        }

        async fn status(&self) -> Result<StatusReply> {
            self.inner.status_calls.fetch_add(1, Ordering::SeqCst);
            self.inner
                .statuses
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected status poll")
        }
    }

    fn reply(status: u16, error: Option<&str>, details: Option<&str>) -> Result<UploadReply> {
        Ok(UploadReply {
            status,
            body: ReplyBody {
                message: None,
                error: error.map(String::from),
                details: details.map(String::from),
                code: None,
            },
        })
    }

    fn orchestrator(api: &FakeApi) -> Orchestrator<FakeApi> {
        Orchestrator::new(api.clone()).with_poll_interval(Duration::from_millis(1))
    }

    fn events_channel() -> (
        mpsc::UnboundedSender<OrchestratorEvent>,
        mpsc::UnboundedReceiver<OrchestratorEvent>,
    ) {
        mpsc::unbounded_channel()
    }

    fn drain(mut rx: mpsc::UnboundedReceiver<OrchestratorEvent>) -> Vec<OrchestratorEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn two_files_both_succeed() {
        let api = FakeApi::default();
        api.push_reply(reply(200, None, Some("Imported 5 transactions")));
        api.push_reply(reply(200, None, Some("Imported 5 transactions")));

        let mut orch = orchestrator(&api);
        orch.enqueue(PathBuf::from("a.csv"));
        orch.enqueue(PathBuf::from("b.csv"));

        let (tx, rx) = events_channel();
        let summary = orch.run(tx).await;

        assert_eq!(summary.phase, Phase::Idle);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.entries.len(), 2);
        assert!(summary.entries.iter().all(|e| e.kind == LogKind::Success));
        assert_eq!(api.submitted(), vec!["a.csv", "b.csv"]);

        let events = drain(rx);
        assert!(matches!(
            events.last(),
            Some(OrchestratorEvent::Completed { processed: 2 })
        ));
    }

    #[tokio::test]
    async fn rate_limit_polls_until_completed() {
        let api = FakeApi::default();
        api.push_reply(reply(429, Some("Rate limit reached. Please wait..."), None));
        for _ in 0..3 {
            api.push_status("pending");
        }
        api.push_status("completed");

        let mut orch = orchestrator(&api);
        orch.enqueue(PathBuf::from("a.csv"));

        let (tx, rx) = events_channel();
        let summary = orch.run(tx).await;

        // One retry entry for the 429, one success entry on completion.
        assert_eq!(summary.entries.len(), 2);
        assert_eq!(summary.entries[0].kind, LogKind::Retry);
        assert_eq!(summary.entries[0].message, "Rate limit reached. Please wait...");
        assert_eq!(summary.entries[1].kind, LogKind::Success);
        assert_eq!(summary.phase, Phase::Idle);
        assert_eq!(summary.processed, 1);
        // Exactly four polls: three pending, one completed, none after.
        assert_eq!(api.status_calls(), 4);
        assert_eq!(api.statuses_left(), 0);

        let events = drain(rx);
        assert!(events.iter().any(|e| matches!(
            e,
            OrchestratorEvent::PhaseChanged {
                phase: Phase::RateLimited,
                waiting_on_retry: true,
            }
        )));
    }

    #[tokio::test]
    async fn failed_poll_tick_is_logged_and_polling_continues() {
        let api = FakeApi::default();
        api.push_reply(reply(429, Some("Rate limit reached"), None));
        api.push_status_err("connection reset");
        api.push_status("completed");

        let mut orch = orchestrator(&api);
        orch.enqueue(PathBuf::from("a.csv"));

        let (tx, _rx) = events_channel();
        let summary = orch.run(tx).await;

        // The bad tick becomes a failed entry; the next tick still runs and
        // completes the job.
        let kinds: Vec<LogKind> = summary.entries.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![LogKind::Retry, LogKind::Error, LogKind::Success]);
        assert!(summary.entries[1].message.contains("connection reset"));
        assert_eq!(api.status_calls(), 2);
        assert_eq!(summary.phase, Phase::Idle);
        assert_eq!(summary.processed, 1);
    }

    #[tokio::test]
    async fn hard_failure_halts_the_queue() {
        let api = FakeApi::default();
        api.push_reply(reply(500, Some("Invalid format"), None));
        api.push_reply(reply(200, None, Some("never consumed")));

        let mut orch = orchestrator(&api);
        orch.enqueue(PathBuf::from("a.csv"));
        orch.enqueue(PathBuf::from("b.csv"));

        let (tx, rx) = events_channel();
        let summary = orch.run(tx).await;

        assert_eq!(summary.phase, Phase::Failed);
        assert_eq!(summary.entries.len(), 1);
        assert_eq!(summary.entries[0].kind, LogKind::Error);
        assert_eq!(summary.entries[0].message, "Invalid format");
        // b.csv was never submitted.
        assert_eq!(api.submitted(), vec!["a.csv"]);

        let events = drain(rx);
        assert!(matches!(
            events.last(),
            Some(OrchestratorEvent::Failed { message }) if message == "Invalid format"
        ));
    }

    #[tokio::test]
    async fn transport_error_becomes_failed_entry() {
        let api = FakeApi::default();
        api.push_reply(Err(anyhow!("connection refused")));

        let mut orch = orchestrator(&api);
        orch.enqueue(PathBuf::from("a.csv"));

        let (tx, _rx) = events_channel();
        let summary = orch.run(tx).await;

        assert_eq!(summary.phase, Phase::Failed);
        assert_eq!(summary.entries.len(), 1);
        assert_eq!(summary.entries[0].kind, LogKind::Error);
        assert!(summary.entries[0].message.contains("connection refused"));
    }

    #[tokio::test]
    async fn details_lines_are_classified_individually() {
        let api = FakeApi::default();
        api.push_reply(reply(
            200,
            None,
            Some("Imported 5 transactions\n\n⏳ Rate limit reached, retrying\nSkipping duplicate\n"),
        ));

        let mut orch = orchestrator(&api);
        orch.enqueue(PathBuf::from("a.csv"));

        let (tx, _rx) = events_channel();
        let summary = orch.run(tx).await;

        let kinds: Vec<LogKind> = summary.entries.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![LogKind::Success, LogKind::Retry, LogKind::Error]);
        assert_eq!(summary.phase, Phase::Idle);
    }

    #[tokio::test]
    async fn rate_limit_details_follow_the_synthetic_retry_entry() {
        let api = FakeApi::default();
        api.push_reply(reply(429, Some("Rate limit reached"), Some("⏳ waiting for quota")));
        api.push_status("completed");

        let mut orch = orchestrator(&api);
        orch.enqueue(PathBuf::from("a.csv"));

        let (tx, _rx) = events_channel();
        let summary = orch.run(tx).await;

        assert_eq!(summary.entries.len(), 3);
        assert_eq!(summary.entries[0].message, "Rate limit reached");
        assert_eq!(summary.entries[0].kind, LogKind::Retry);
        assert_eq!(summary.entries[1].message, "⏳ waiting for quota");
        assert_eq!(summary.entries[2].kind, LogKind::Success);
    }

    #[tokio::test]
    async fn empty_queue_completes_immediately() {
        let api = FakeApi::default();
        let mut orch = orchestrator(&api);

        let (tx, rx) = events_channel();
        let summary = orch.run(tx).await;

        assert_eq!(summary.phase, Phase::Idle);
        assert!(summary.entries.is_empty());
        let events = drain(rx);
        assert!(matches!(
            events.as_slice(),
            [OrchestratorEvent::Completed { processed: 0 }]
        ));
    }
}
