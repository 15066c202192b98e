//! REST client for the ComfyUI HTTP endpoints.
//!
//! Wraps workflow submission, per-prompt history retrieval, artifact
//! download, and input-image upload using [`reqwest`].

use serde::Deserialize;

use crate::history::{ArtifactRef, HistoryEntry};

/// HTTP client for a single ComfyUI instance.
pub struct ComfyUiApi {
    client: reqwest::Client,
    api_url: String,
}

/// Response returned by the `/prompt` endpoint after successfully
/// queuing a workflow.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the queued prompt.
    pub prompt_id: String,
}

/// Response returned by the `/upload/image` endpoint.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    /// Filename under which the backend stored the upload.
    name: String,
}

/// Errors from the ComfyUI REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUiApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// ComfyUI returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for diagnostics.
        body: String,
    },
}

impl ComfyUiApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://127.0.0.1:8188`.
    pub fn new(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
        }
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (connection pooling across requests).
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self { client, api_url }
    }

    /// Submit an assembled workflow for execution.
    ///
    /// Sends `POST /prompt` with the prompt JSON and a client
    /// correlation id. A 4xx/5xx response means the backend rejected
    /// the graph as structurally invalid and surfaces as
    /// [`ComfyUiApiError::Api`] with the diagnostic body.
    pub async fn submit_workflow(
        &self,
        prompt: &serde_json::Value,
        client_id: &str,
    ) -> Result<SubmitResponse, ComfyUiApiError> {
        let body = serde_json::json!({
            "prompt": prompt,
            "client_id": client_id,
        });

        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Retrieve the execution record for a prompt, if it has one yet.
    ///
    /// Sends `GET /history/{prompt_id}`. The backend answers with an
    /// empty object until the prompt reaches a terminal state, then
    /// with a map keyed by the prompt id. Returns `None` while the
    /// record is absent.
    pub async fn get_history(
        &self,
        prompt_id: &str,
    ) -> Result<Option<HistoryEntry>, ComfyUiApiError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.api_url, prompt_id))
            .send()
            .await?;

        let mut doc: serde_json::Map<String, serde_json::Value> =
            Self::parse_response(response).await?;

        match doc.remove(prompt_id) {
            Some(raw) => {
                let entry = serde_json::from_value(raw).map_err(|e| ComfyUiApiError::Api {
                    status: 200,
                    body: format!("Unparseable history entry: {e}"),
                })?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    /// Download the raw bytes of one output artifact via `GET /view`.
    pub async fn fetch_artifact(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, ComfyUiApiError> {
        let response = self
            .client
            .get(format!("{}/view", self.api_url))
            .query(&[
                ("filename", artifact.filename.as_str()),
                ("subfolder", artifact.subfolder.as_str()),
                ("type", artifact.kind.as_str()),
            ])
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Upload raw image bytes as a backend input asset.
    ///
    /// Sends a multipart `POST /upload/image` and returns the stored
    /// filename, which load nodes can then reference.
    pub async fn upload_image(&self, bytes: Vec<u8>) -> Result<String, ComfyUiApiError> {
        let filename = format!("ref_{}.png", &uuid::Uuid::new_v4().simple().to_string()[..8]);

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename.clone())
            .mime_str("image/png")?;
        let form = reqwest::multipart::Form::new().part("image", part);

        let response = self
            .client
            .post(format!("{}/upload/image", self.api_url))
            .multipart(form)
            .send()
            .await?;

        let upload: UploadResponse = Self::parse_response(response).await?;
        Ok(upload.name)
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or [`ComfyUiApiError::Api`] with
    /// the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyUiApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ComfyUiApiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ComfyUiApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}
