//! Closed set of backend node classes the pipeline manipulates.
//!
//! ComfyUI tags node behaviour with a free-form `class_type` string.
//! Everything this pipeline touches is modelled as an explicit enum
//! variant instead, so injectors and the parameter pass match
//! exhaustively and an unrecognized class fails at template-parse time
//! rather than being silently skipped.

use std::fmt;

use serde::{Deserialize, Serialize};

/// All node classes known to the assembly pipeline.
///
/// Serialized to/from the backend's `class_type` strings via the serde
/// rename attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    // -- model / encoder loaders --
    #[serde(rename = "UNETLoader")]
    UnetLoader,
    #[serde(rename = "DualCLIPLoader")]
    DualClipLoader,
    #[serde(rename = "VAELoader")]
    VaeLoader,
    #[serde(rename = "LoraLoader")]
    LoraLoader,

    // -- prompting and sampling --
    #[serde(rename = "CLIPTextEncode")]
    ClipTextEncode,
    #[serde(rename = "RandomNoise")]
    RandomNoise,
    #[serde(rename = "KSamplerSelect")]
    KSamplerSelect,
    #[serde(rename = "BasicScheduler")]
    BasicScheduler,
    #[serde(rename = "BasicGuider")]
    BasicGuider,
    #[serde(rename = "SamplerCustomAdvanced")]
    SamplerCustomAdvanced,
    #[serde(rename = "DetailDaemonSamplerNode")]
    DetailDaemonSampler,

    // -- latents and images --
    #[serde(rename = "EmptySD3LatentImage")]
    EmptyLatent,
    #[serde(rename = "VAEDecode")]
    VaeDecode,
    #[serde(rename = "VAEEncode")]
    VaeEncode,
    #[serde(rename = "LoadImage")]
    LoadImage,
    #[serde(rename = "SaveImage")]
    SaveImage,

    // -- subject identity --
    #[serde(rename = "FaceDetailer")]
    FaceDetailer,
    #[serde(rename = "PulidFluxModelLoader")]
    PulidModelLoader,
    #[serde(rename = "PulidFluxEvaClipLoader")]
    PulidEvaClipLoader,
    #[serde(rename = "PulidFluxInsightFaceLoader")]
    PulidInsightFaceLoader,
    #[serde(rename = "ApplyPulidFlux")]
    ApplyPulid,
    #[serde(rename = "LoadFluxIPAdapter")]
    LoadIpAdapter,
    #[serde(rename = "ApplyFluxIPAdapter")]
    ApplyIpAdapter,

    // -- guidance control --
    #[serde(rename = "ControlNetLoader")]
    ControlNetLoader,
    #[serde(rename = "ControlNetApplySD3")]
    ControlNetApply,
    #[serde(rename = "DWPreprocessor")]
    PosePreprocessor,
    #[serde(rename = "DepthAnythingV2Preprocessor")]
    DepthPreprocessor,
    #[serde(rename = "CannyEdgePreprocessor")]
    EdgePreprocessor,

    // -- upscale and post-processing --
    #[serde(rename = "UpscaleModelLoader")]
    UpscaleModelLoader,
    #[serde(rename = "ImageUpscaleWithModel")]
    ImageUpscaleWithModel,
    #[serde(rename = "ImageScale")]
    ImageScale,
    #[serde(rename = "ImageScaleBy")]
    ImageScaleBy,
    #[serde(rename = "OpticalRealism")]
    OpticalRealism,
    #[serde(rename = "ColorCorrect")]
    ColorCorrect,
}

impl NodeKind {
    /// The backend `class_type` string for this node class.
    pub fn class_type(&self) -> &'static str {
        match self {
            NodeKind::UnetLoader => "UNETLoader",
            NodeKind::DualClipLoader => "DualCLIPLoader",
            NodeKind::VaeLoader => "VAELoader",
            NodeKind::LoraLoader => "LoraLoader",
            NodeKind::ClipTextEncode => "CLIPTextEncode",
            NodeKind::RandomNoise => "RandomNoise",
            NodeKind::KSamplerSelect => "KSamplerSelect",
            NodeKind::BasicScheduler => "BasicScheduler",
            NodeKind::BasicGuider => "BasicGuider",
            NodeKind::SamplerCustomAdvanced => "SamplerCustomAdvanced",
            NodeKind::DetailDaemonSampler => "DetailDaemonSamplerNode",
            NodeKind::EmptyLatent => "EmptySD3LatentImage",
            NodeKind::VaeDecode => "VAEDecode",
            NodeKind::VaeEncode => "VAEEncode",
            NodeKind::LoadImage => "LoadImage",
            NodeKind::SaveImage => "SaveImage",
            NodeKind::FaceDetailer => "FaceDetailer",
            NodeKind::PulidModelLoader => "PulidFluxModelLoader",
            NodeKind::PulidEvaClipLoader => "PulidFluxEvaClipLoader",
            NodeKind::PulidInsightFaceLoader => "PulidFluxInsightFaceLoader",
            NodeKind::ApplyPulid => "ApplyPulidFlux",
            NodeKind::LoadIpAdapter => "LoadFluxIPAdapter",
            NodeKind::ApplyIpAdapter => "ApplyFluxIPAdapter",
            NodeKind::ControlNetLoader => "ControlNetLoader",
            NodeKind::ControlNetApply => "ControlNetApplySD3",
            NodeKind::PosePreprocessor => "DWPreprocessor",
            NodeKind::DepthPreprocessor => "DepthAnythingV2Preprocessor",
            NodeKind::EdgePreprocessor => "CannyEdgePreprocessor",
            NodeKind::UpscaleModelLoader => "UpscaleModelLoader",
            NodeKind::ImageUpscaleWithModel => "ImageUpscaleWithModel",
            NodeKind::ImageScale => "ImageScale",
            NodeKind::ImageScaleBy => "ImageScaleBy",
            NodeKind::OpticalRealism => "OpticalRealism",
            NodeKind::ColorCorrect => "ColorCorrect",
        }
    }

    /// Whether this node persists artifacts (a designated output node).
    pub fn is_output(&self) -> bool {
        matches!(self, NodeKind::SaveImage)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_type())
    }
}
