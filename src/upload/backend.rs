use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart;
use tracing::debug;

use crate::upload::types::{ReplyBody, StatusReply, UploadJob, UploadReply};

/// Seam between the orchestrator and the processing backend. The production
/// implementation talks HTTP; tests substitute a scripted fake.
#[async_trait]
pub trait ProcessingApi: Send + Sync {
    /// Submit one file. One file is one request; no chunking, no retries at
    /// this layer. Transport and file-read failures come back as errors.
    async fn submit(&self, job: &UploadJob) -> Result<UploadReply>;

    /// One poll of the status endpoint.
    async fn status(&self) -> Result<StatusReply>;
}

/// Talks to the relay gateway (or directly to anything speaking the same
/// contract) over HTTP.
pub struct HttpProcessingApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProcessingApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ProcessingApi for HttpProcessingApi {
    async fn submit(&self, job: &UploadJob) -> Result<UploadReply> {
        let bytes = tokio::fs::read(&job.path)
            .await
            .with_context(|| format!("could not read {}", job.path.display()))?;
        if bytes.is_empty() {
            anyhow::bail!("No file content in {}", job.path.display());
        }
        debug!(file = %job.name, size = bytes.len(), "submitting file");

        let part = multipart::Part::bytes(bytes)
            .file_name(job.name.clone())
            .mime_str("text/csv")?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/api/upload", self.base_url))
            .multipart(form)
            .send()
            .await
            .context("upload request failed")?;

        let status = response.status().as_u16();
        let body: ReplyBody = response
            .json()
            .await
            .context("malformed upload response")?;
        Ok(UploadReply { status, body })
    }

    async fn status(&self) -> Result<StatusReply> {
        let reply = self
            .client
            .get(format!("{}/api/status", self.base_url))
            .send()
            .await
            .context("status request failed")?
            .json::<StatusReply>()
            .await
            .context("malformed status response")?;
        Ok(reply)
    }
}
