//! Post-processing injector: depth-guided camera simulation plus a
//! final color grade.
//!
//! Splices a three-node chain in front of the save node. Only the save
//! node is rewired; a graph-wide sweep would redirect the chain's own
//! image inputs and cut the depth estimator out of the path.

use fluxforge_core::graph::{NodeId, OutputRef, WorkflowGraph};
use fluxforge_core::kind::NodeKind;

use super::control::DEPTH_WEIGHTS;

/// Tunable grade parameters; everything else in the chain is fixed.
#[derive(Debug, Clone, Copy)]
pub struct PostParams {
    pub grain: f64,
    pub temperature: f64,
    pub saturation: f64,
}

/// Insert the post-processing chain between `image` and `save`, and
/// return the graded reference.
pub fn inject(
    graph: &mut WorkflowGraph,
    image: OutputRef,
    save: NodeId,
    params: &PostParams,
) -> OutputRef {
    let depth = graph.insert(
        NodeKind::DepthPreprocessor,
        "Scene Depth",
        [
            ("image", image.into()),
            ("ckpt_name", DEPTH_WEIGHTS.into()),
            ("resolution", 1024u32.into()),
        ],
    );
    let optical = graph.insert(
        NodeKind::OpticalRealism,
        "Optical Realism",
        [
            ("image", image.into()),
            ("depth_map", depth.into()),
            ("atmosphere_enabled", true.into()),
            ("haze_strength", 0.10.into()),
            ("lift_blacks", 0.06.into()),
            ("depth_offset", 0.0.into()),
            ("light_wrap_strength", 0.15.into()),
            ("chromatic_aberration", 0.004.into()),
            ("vignette_intensity", 0.10.into()),
            ("grain_power", params.grain.into()),
            ("monochrome_grain", true.into()),
            ("highlight_rolloff", 0.04.into()),
        ],
    );
    let graded = graph.insert(
        NodeKind::ColorCorrect,
        "Color Grade",
        [
            ("image", optical.into()),
            ("temperature", params.temperature.into()),
            ("hue", 0.0.into()),
            ("brightness", 0.0.into()),
            ("contrast", 1.04.into()),
            ("saturation", params.saturation.into()),
            ("gamma", 1.0.into()),
        ],
    );

    graph.rewire_inputs_of(save, image, graded.into());
    tracing::debug!(
        grain = params.grain,
        temperature = params.temperature,
        saturation = params.saturation,
        "Post-processing injected"
    );
    graded.into()
}
