//! Literal parameter sweep.
//!
//! One pass over the whole graph after injection: recognized node
//! kinds get request values written into their literal slots. The
//! sweep dispatches on [`NodeKind`], never on class strings, and only
//! touches kinds it knows; injector-added loads and loaders pass
//! through untouched. Prompt encoders are disambiguated by title; an
//! encoder whose title names neither side is left alone with a
//! warning rather than failing the request.

use fluxforge_core::graph::WorkflowGraph;
use fluxforge_core::kind::NodeKind;

/// Resolved values the sweep writes. The builder derives these from
/// the request once per recipe, so per-action defaults live there.
#[derive(Debug, Clone)]
pub struct SweepValues<'a> {
    pub prompt: &'a str,
    pub negative_prompt: &'a str,
    pub seed: u32,
    pub steps: u32,
    pub width: u32,
    pub height: u32,
    /// `Some` only for image-to-image recipes.
    pub denoise: Option<f64>,
    pub face_detail_denoise: f64,
    pub face_feather: u32,
    pub scale_by: f64,
}

/// Sweep request literals over every recognized node.
pub fn apply(graph: &mut WorkflowGraph, values: &SweepValues<'_>) {
    for (_, node) in graph.nodes_mut() {
        match node.kind {
            NodeKind::ClipTextEncode => {
                let title = node.title.to_lowercase();
                if title.contains("positive") {
                    node.set_literal("text", values.prompt);
                } else if title.contains("negative") {
                    node.set_literal("text", values.negative_prompt);
                } else {
                    tracing::warn!(
                        title = %node.title,
                        "Prompt encoder title names neither side, leaving it untouched"
                    );
                }
            }
            NodeKind::RandomNoise => {
                node.set_literal("noise_seed", values.seed);
            }
            NodeKind::BasicScheduler => {
                node.set_literal("steps", values.steps);
                if let Some(denoise) = values.denoise {
                    node.set_literal("denoise", denoise);
                }
            }
            NodeKind::EmptyLatent => {
                node.set_literal("width", values.width);
                node.set_literal("height", values.height);
            }
            NodeKind::FaceDetailer => {
                node.set_literal("denoise", values.face_detail_denoise);
                node.set_literal("seed", values.seed);
                if node.inputs.contains_key("feather") {
                    node.set_literal("feather", values.face_feather);
                }
            }
            NodeKind::ImageScaleBy => {
                node.set_literal("scale_by", values.scale_by);
            }
            _ => {}
        }
    }
}
