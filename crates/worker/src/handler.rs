//! Request handlers: the generation endpoint and health check.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use fluxforge_comfyui::api::ComfyUiApi;
use fluxforge_comfyui::encode;
use fluxforge_comfyui::job::{extract_artifacts, JobBackend};
use fluxforge_core::request::{Action, GenerationRequest};
use fluxforge_pipeline::builder::UploadedInputs;

use crate::error::WorkerResult;
use crate::state::AppState;

/// Successful generation response.
#[derive(Debug, Serialize)]
pub struct RunResponse {
    /// Base64 JPEG payloads, one per produced artifact.
    pub images: Vec<String>,
    /// Backend job id, for correlation with ComfyUI logs.
    pub job_id: String,
    /// The seed the workflow actually ran with.
    pub seed: u32,
}

/// POST /run -- execute one generation request end to end.
///
/// Uploads the request's image payloads, assembles and submits the
/// workflow, blocks until the job finishes, then fetches and
/// re-encodes every artifact.
pub async fn run(
    State(state): State<AppState>,
    Json(request): Json<GenerationRequest>,
) -> WorkerResult<Json<RunResponse>> {
    let uploads = upload_inputs(&state.api, &request).await?;
    let built = state
        .builder
        .build(&request, &uploads, state.resolver.as_ref())?;

    let client_id = uuid::Uuid::new_v4().to_string();
    let prompt = built.graph.to_prompt();
    let prompt_id = state.api.submit(&prompt, &client_id).await?;
    tracing::info!(
        %prompt_id,
        action = %request.action,
        seed = built.seed,
        nodes = built.graph.len(),
        "Workflow submitted"
    );

    let entry = state.poller.wait(state.api.as_ref(), &prompt_id).await?;
    let artifacts = extract_artifacts(&entry)?;

    let mut images = Vec::with_capacity(artifacts.len());
    for artifact in &artifacts {
        let bytes = state.api.fetch_artifact(artifact).await?;
        let jpeg = encode::reencode_jpeg(&bytes, state.jpeg_quality)?;
        images.push(encode::to_base64(&jpeg));
    }
    tracing::info!(%prompt_id, count = images.len(), "Artifacts delivered");

    Ok(Json(RunResponse {
        images,
        job_id: prompt_id,
        seed: built.seed,
    }))
}

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET /health -- liveness probe.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Upload every base64 image payload the request carries and collect
/// the backend-side filenames the builder references.
///
/// A stray `input_image` on a generate request is ignored here the
/// same way the builder ignores it; nothing in that recipe would
/// consume the upload.
async fn upload_inputs(
    api: &ComfyUiApi,
    request: &GenerationRequest,
) -> WorkerResult<UploadedInputs> {
    let mut uploads = UploadedInputs::default();

    let wants_input = matches!(
        Action::from_name(&request.action),
        Some(Action::Edit | Action::Detail)
    );
    if let (true, Some(payload)) = (wants_input, &request.input_image) {
        uploads.input_image = Some(upload(api, payload).await?);
    }
    if let Some(payload) = &request.reference_image {
        uploads.reference_image = Some(upload(api, payload).await?);
    }
    if let Some(control) = &request.control_images.pose {
        uploads.pose = Some(upload(api, &control.image).await?);
    }
    if let Some(control) = &request.control_images.depth {
        uploads.depth = Some(upload(api, &control.image).await?);
    }
    if let Some(control) = &request.control_images.edge {
        uploads.edge = Some(upload(api, &control.image).await?);
    }

    Ok(uploads)
}

async fn upload(api: &ComfyUiApi, payload: &str) -> WorkerResult<String> {
    let bytes = encode::from_base64(payload)?;
    Ok(api.upload_image(bytes).await?)
}
