//! Shared application state.

use std::sync::Arc;

use fluxforge_comfyui::api::ComfyUiApi;
use fluxforge_comfyui::job::JobPoller;
use fluxforge_pipeline::assets::DiskAssetResolver;
use fluxforge_pipeline::builder::PipelineBuilder;

use crate::config::WorkerConfig;

/// State shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub api: Arc<ComfyUiApi>,
    pub builder: Arc<PipelineBuilder>,
    pub resolver: Arc<DiskAssetResolver>,
    pub poller: JobPoller,
    pub jpeg_quality: u8,
}

impl AppState {
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            api: Arc::new(ComfyUiApi::new(config.comfyui_url.clone())),
            builder: Arc::new(PipelineBuilder::with_search_paths(
                config.workflow_dirs.clone(),
            )),
            resolver: Arc::new(DiskAssetResolver::new(config.model_dirs.clone())),
            poller: JobPoller::new(config.poll_interval, config.job_timeout),
            jpeg_quality: config.jpeg_quality,
        }
    }
}
