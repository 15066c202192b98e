//! Job execution protocol: submit, poll to a terminal state, classify.
//!
//! One request submits exactly one job and blocks on fixed-interval
//! polling until the backend reports a terminal state or the timeout
//! budget elapses. There is no mid-flight cancellation; on timeout the
//! client simply stops polling and the backend job's fate is left
//! unobserved.

use std::time::Duration;

use async_trait::async_trait;

use crate::api::{ComfyUiApi, ComfyUiApiError};
use crate::history::{ArtifactRef, HistoryEntry};

/// Fixed delay between status queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// Total budget for one job to reach a terminal state.
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(600);

/// Errors from the job execution protocol.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The backend synchronously refused the assembled graph. This
    /// indicates a construction bug; the diagnostic is surfaced as-is.
    #[error("Backend rejected workflow ({status}): {diagnostic}")]
    Rejected { status: u16, diagnostic: String },

    /// The backend ran the graph but a node failed.
    #[error("Workflow execution failed")]
    ExecutionFailed { messages: Vec<serde_json::Value> },

    /// No terminal state within the polling budget. Carries the time
    /// actually waited; the job's true outcome is unknown.
    #[error("Workflow did not reach a terminal state within {waited:?}")]
    Timeout { waited: Duration },

    /// Terminal success with zero artifacts is a reportable failure,
    /// not a silent success.
    #[error("Execution completed but produced no artifacts")]
    EmptyResult,

    /// Transport-level failure talking to the backend.
    #[error(transparent)]
    Transport(#[from] ComfyUiApiError),
}

/// Seam between the polling loop and the HTTP layer.
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Queue a prompt; returns the backend job id.
    async fn submit(
        &self,
        prompt: &serde_json::Value,
        client_id: &str,
    ) -> Result<String, JobError>;

    /// Fetch the terminal record for a job, `None` while still running.
    async fn history(&self, prompt_id: &str) -> Result<Option<HistoryEntry>, JobError>;
}

#[async_trait]
impl JobBackend for ComfyUiApi {
    async fn submit(
        &self,
        prompt: &serde_json::Value,
        client_id: &str,
    ) -> Result<String, JobError> {
        match self.submit_workflow(prompt, client_id).await {
            Ok(response) => Ok(response.prompt_id),
            Err(ComfyUiApiError::Api { status, body }) => Err(JobError::Rejected {
                status,
                diagnostic: body,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn history(&self, prompt_id: &str) -> Result<Option<HistoryEntry>, JobError> {
        Ok(self.get_history(prompt_id).await?)
    }
}

/// Fixed-interval poller with a hard deadline.
#[derive(Debug, Clone, Copy)]
pub struct JobPoller {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for JobPoller {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_JOB_TIMEOUT,
        }
    }
}

impl JobPoller {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Block until the job reaches a terminal state.
    ///
    /// Queries at the configured fixed interval, never faster. The
    /// deadline is checked before every query, so no poll is issued
    /// after the budget elapses. Transient query failures are logged
    /// and retried on the next tick; only the deadline ends the loop.
    pub async fn wait<B: JobBackend + ?Sized>(
        &self,
        backend: &B,
        prompt_id: &str,
    ) -> Result<HistoryEntry, JobError> {
        let started = tokio::time::Instant::now();
        let deadline = started + self.timeout;
        let mut polls: u32 = 0;

        loop {
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(prompt_id, polls, timeout_secs = self.timeout.as_secs(), "Polling budget elapsed");
                return Err(JobError::Timeout {
                    waited: started.elapsed(),
                });
            }

            polls += 1;
            match backend.history(prompt_id).await {
                Ok(Some(entry)) => {
                    tracing::info!(
                        prompt_id,
                        polls,
                        elapsed_secs = started.elapsed().as_secs_f64(),
                        "Job reached terminal state",
                    );
                    return Ok(entry);
                }
                Ok(None) => {}
                Err(e) => {
                    // Transient; the deadline bounds how long we keep trying.
                    tracing::warn!(prompt_id, error = %e, "Status query failed, retrying");
                }
            }

            // The last sleep is capped so the loop wakes at the
            // deadline instead of overshooting it by up to an interval.
            let next_tick = tokio::time::Instant::now() + self.interval;
            tokio::time::sleep_until(next_tick.min(deadline)).await;
        }
    }
}

/// Classify a terminal record.
///
/// Failed executions surface the backend's structured message list;
/// completed executions with zero artifacts are an error in their own
/// right, never treated as success.
pub fn extract_artifacts(entry: &HistoryEntry) -> Result<Vec<ArtifactRef>, JobError> {
    if entry.is_error() {
        return Err(JobError::ExecutionFailed {
            messages: entry.status.messages.clone(),
        });
    }
    let artifacts = entry.artifacts();
    if artifacts.is_empty() {
        return Err(JobError::EmptyResult);
    }
    Ok(artifacts)
}
