//! Worker-level error type for HTTP handlers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use fluxforge_comfyui::api::ComfyUiApiError;
use fluxforge_comfyui::encode::EncodeError;
use fluxforge_comfyui::job::JobError;
use fluxforge_pipeline::builder::PipelineError;

/// Errors a request can die with on its way through the worker.
///
/// Implements [`IntoResponse`] to produce consistent JSON error
/// responses: request problems map to 4xx, backend problems to 5xx.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// Workflow assembly failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Job submission or execution failed.
    #[error(transparent)]
    Job(#[from] JobError),

    /// Image upload or artifact download failed.
    #[error("ComfyUI transfer failed: {0}")]
    Transfer(#[from] ComfyUiApiError),

    /// Payload decode or artifact re-encode failed.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Convenience type alias for handler return values.
pub type WorkerResult<T> = Result<T, WorkerError>;

impl IntoResponse for WorkerError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            WorkerError::Pipeline(pipeline) => match pipeline {
                PipelineError::UnknownAction(_) | PipelineError::MissingInput { .. } => (
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    pipeline.to_string(),
                    None,
                ),
                other => {
                    tracing::error!(error = %other, "Workflow assembly failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "ASSEMBLY_ERROR",
                        other.to_string(),
                        None,
                    )
                }
            },

            WorkerError::Job(job) => match job {
                JobError::Timeout { .. } => (
                    StatusCode::GATEWAY_TIMEOUT,
                    "JOB_TIMEOUT",
                    job.to_string(),
                    None,
                ),
                JobError::ExecutionFailed { messages } => {
                    tracing::error!(?messages, "Workflow execution failed");
                    (
                        StatusCode::BAD_GATEWAY,
                        "EXECUTION_FAILED",
                        job.to_string(),
                        Some(json!(messages)),
                    )
                }
                other => {
                    tracing::error!(error = %other, "Job protocol error");
                    (StatusCode::BAD_GATEWAY, "JOB_ERROR", other.to_string(), None)
                }
            },

            WorkerError::Transfer(err) => {
                tracing::error!(error = %err, "Image transfer failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "TRANSFER_ERROR",
                    err.to_string(),
                    None,
                )
            }

            WorkerError::Encode(err) => match err {
                EncodeError::Base64(_) => (
                    StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    err.to_string(),
                    None,
                ),
                other => {
                    tracing::error!(error = %other, "Artifact re-encode failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "ENCODE_ERROR",
                        other.to_string(),
                        None,
                    )
                }
            },
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let Some(details) = details {
            body["details"] = details;
        }

        (status, axum::Json(body)).into_response()
    }
}
