//! Generation job request schema and parameter defaults.
//!
//! Mirrors the wire format accepted by the worker's `/run` endpoint.
//! Every optional knob carries the pipeline's default so handlers and
//! the builder never re-derive them.

use serde::{Deserialize, Serialize};

/// Prompt used for `generate` when the request supplies none.
pub const DEFAULT_PROMPT: &str = "Close-up portrait photograph, natural skin texture, \
     85mm lens, shallow depth of field, soft window light, warm tones";

/// Assembly recipe selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Text-to-image with the full injector chain.
    Generate,
    /// Image-to-image with denoise below 1.0.
    Edit,
    /// Detail refinement and upscale of an existing image.
    Detail,
}

impl Action {
    /// Parse a wire action name. `None` for unrecognized values; the
    /// builder turns that into its unknown-action error.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "generate" => Some(Action::Generate),
            "edit" => Some(Action::Edit),
            "detail" => Some(Action::Detail),
            _ => None,
        }
    }
}

/// Which face-conditioning mechanism to splice in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditioningMode {
    Pulid,
    IpAdapter,
}

/// One guidance-control input: an image plus an optional per-control
/// strength override.
#[derive(Debug, Clone, Deserialize)]
pub struct ControlImage {
    /// Base64-encoded image payload.
    pub image: String,
    #[serde(default)]
    pub strength: Option<f64>,
}

/// Up to three independent control inputs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ControlImages {
    #[serde(default)]
    pub pose: Option<ControlImage>,
    #[serde(default)]
    pub depth: Option<ControlImage>,
    #[serde(default)]
    pub edge: Option<ControlImage>,
}

impl ControlImages {
    pub fn is_empty(&self) -> bool {
        self.pose.is_none() && self.depth.is_none() && self.edge.is_none()
    }
}

/// A single generation job request.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationRequest {
    /// Requested action; parsed by the builder so unrecognized values
    /// surface as a domain error rather than a decode failure.
    #[serde(default = "default_action")]
    pub action: String,

    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,

    /// −1 (or any negative value) requests a random seed. The backend
    /// takes 32-bit seeds, so values above `u32::MAX` keep only their
    /// low 32 bits.
    #[serde(default = "default_seed")]
    pub seed: i64,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_steps")]
    pub steps: u32,
    /// Denoise strength for `edit` (below 1.0 keeps input structure).
    #[serde(default = "default_denoise")]
    pub denoise: f64,

    /// Identity LoRA asset filename; empty disables the injector.
    #[serde(default)]
    pub identity_asset_name: String,
    /// 0.0 disables the identity injector. When an asset is named but
    /// no strength supplied, the builder applies [`DEFAULT_IDENTITY_STRENGTH`].
    #[serde(default)]
    pub identity_strength: f64,

    #[serde(default = "default_conditioning_mode")]
    pub conditioning_mode: ConditioningMode,
    #[serde(default = "default_conditioning_strength")]
    pub conditioning_strength: f64,

    #[serde(default)]
    pub control_images: ControlImages,

    /// 0.0 disables the detail injector.
    #[serde(default = "default_detail_amount")]
    pub detail_amount: f64,

    #[serde(default)]
    pub upscale: bool,
    #[serde(default = "default_upscale_width")]
    pub upscale_width: u32,
    #[serde(default = "default_upscale_height")]
    pub upscale_height: u32,

    #[serde(default = "default_true")]
    pub post_processing: bool,
    #[serde(default = "default_grain")]
    pub grain: f64,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_saturation")]
    pub saturation: f64,

    /// Denoise applied by the face-refinement node. Per-action default
    /// when absent: 0.35 for generate/edit, 0.42 for detail.
    #[serde(default)]
    pub face_detail_denoise: Option<f64>,
    #[serde(default = "default_face_feather")]
    pub face_feather: u32,
    /// Downscale factor applied by the `detail` template.
    #[serde(default = "default_scale_by")]
    pub scale_by: f64,

    /// Base64 input image; required for `edit` and `detail`.
    #[serde(default)]
    pub input_image: Option<String>,
    /// Base64 reference image for face conditioning.
    #[serde(default)]
    pub reference_image: Option<String>,
}

/// Identity strength applied when an asset is named without one.
pub const DEFAULT_IDENTITY_STRENGTH: f64 = 0.85;

/// Per-control default strengths.
pub const DEFAULT_POSE_STRENGTH: f64 = 0.25;
pub const DEFAULT_DEPTH_STRENGTH: f64 = 0.30;
pub const DEFAULT_EDGE_STRENGTH: f64 = 0.30;

fn default_action() -> String {
    "generate".to_string()
}
fn default_seed() -> i64 {
    -1
}
fn default_width() -> u32 {
    1024
}
fn default_height() -> u32 {
    1024
}
fn default_steps() -> u32 {
    28
}
fn default_denoise() -> f64 {
    0.6
}
fn default_conditioning_mode() -> ConditioningMode {
    ConditioningMode::Pulid
}
fn default_conditioning_strength() -> f64 {
    0.9
}
fn default_detail_amount() -> f64 {
    0.4
}
fn default_upscale_width() -> u32 {
    1440
}
fn default_upscale_height() -> u32 {
    1800
}
fn default_true() -> bool {
    true
}
fn default_grain() -> f64 {
    0.018
}
fn default_temperature() -> f64 {
    6.0
}
fn default_saturation() -> f64 {
    0.93
}
fn default_face_feather() -> u32 {
    15
}
fn default_scale_by() -> f64 {
    0.5
}

/// Resolve the request seed: −1 (or any negative) becomes a random
/// 32-bit seed, anything else is truncated to u32.
pub fn resolve_seed(seed: i64) -> u32 {
    use rand::Rng;
    if seed < 0 {
        rand::rng().random()
    } else {
        seed as u32
    }
}
