//! Face-conditioning injector: PuLID or IP-Adapter.
//!
//! Both mechanisms consume the current model reference and an uploaded
//! reference image, and supersede the model reference with their apply
//! node's output. Only the model half of the chain moves; the clip
//! reference passes through unchanged.

use fluxforge_core::graph::WorkflowGraph;
use fluxforge_core::kind::NodeKind;
use fluxforge_core::request::{ConditioningMode, GenerationRequest};

use super::ModelChain;

pub const PULID_WEIGHTS: &str = "pulid_flux_v0.9.1.safetensors";
pub const IP_ADAPTER_WEIGHTS: &str = "flux-ip-adapter-v2.safetensors";
pub const CLIP_VISION_WEIGHTS: &str = "clip_vision_l.safetensors";

/// Splice face conditioning into the model chain.
///
/// Applies when a reference image has been uploaded and the requested
/// strength is positive. `reference` is the backend-side filename of
/// the uploaded image, not raw pixels.
pub fn inject(
    graph: &mut WorkflowGraph,
    chain: ModelChain,
    request: &GenerationRequest,
    reference: Option<&str>,
) -> ModelChain {
    let Some(filename) = reference else {
        return chain;
    };
    let strength = request.conditioning_strength;
    if strength <= 0.0 {
        return chain;
    }

    let image = graph.insert(
        NodeKind::LoadImage,
        "Reference Face",
        [("image", filename.into())],
    );

    let apply = match request.conditioning_mode {
        ConditioningMode::Pulid => {
            let weights = graph.insert(
                NodeKind::PulidModelLoader,
                "PuLID Weights",
                [("pulid_file", PULID_WEIGHTS.into())],
            );
            let eva_clip = graph.insert(NodeKind::PulidEvaClipLoader, "EVA-CLIP", []);
            let analysis = graph.insert(
                NodeKind::PulidInsightFaceLoader,
                "Face Analysis",
                [("provider", "GPU".into())],
            );
            graph.insert(
                NodeKind::ApplyPulid,
                "Apply PuLID",
                [
                    ("model", chain.model.into()),
                    ("pulid_flux", weights.into()),
                    ("eva_clip", eva_clip.into()),
                    ("face_analysis", analysis.into()),
                    ("image", image.into()),
                    ("weight", strength.into()),
                    ("start_at", 0.0.into()),
                    ("end_at", 1.0.into()),
                ],
            )
        }
        ConditioningMode::IpAdapter => {
            let loader = graph.insert(
                NodeKind::LoadIpAdapter,
                "IP-Adapter Weights",
                [
                    ("ipadapter", IP_ADAPTER_WEIGHTS.into()),
                    ("clip_vision", CLIP_VISION_WEIGHTS.into()),
                    ("provider", "GPU".into()),
                ],
            );
            graph.insert(
                NodeKind::ApplyIpAdapter,
                "Apply IP-Adapter",
                [
                    ("model", chain.model.into()),
                    ("ip_adapter_flux", loader.into()),
                    ("image", image.into()),
                    ("ip_scale", strength.into()),
                ],
            )
        }
    };

    graph.rewire_excluding(chain.model, apply.into(), &[apply]);
    tracing::debug!(
        mode = ?request.conditioning_mode,
        strength,
        image = filename,
        "Face conditioning injected"
    );
    ModelChain {
        model: apply.into(),
        clip: chain.clip,
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::base_graph;
    use super::*;

    fn request(mode: ConditioningMode, strength: f64) -> GenerationRequest {
        let mut request: GenerationRequest = serde_json::from_str("{}").unwrap();
        request.conditioning_mode = mode;
        request.conditioning_strength = strength;
        request
    }

    #[test]
    fn pulid_adds_loaders_and_supersedes_model() {
        let (mut g, a) = base_graph();
        let before = g.len();
        let chain = ModelChain {
            model: a.model_loader.into(),
            clip: a.clip_loader.into(),
        };

        let out = inject(
            &mut g,
            chain,
            &request(ConditioningMode::Pulid, 0.9),
            Some("ref_abc123.png"),
        );

        // LoadImage + three loaders + apply node.
        assert_eq!(g.len(), before + 5);
        let apply = g.find_one(NodeKind::ApplyPulid).unwrap();
        assert_eq!(out.model, apply.into());
        assert_eq!(out.clip, chain.clip);

        assert_eq!(g.get(a.guider).unwrap().link("model"), Some(out.model));
        assert_eq!(g.get(a.scheduler).unwrap().link("model"), Some(out.model));
        // The apply node keeps consuming the original model.
        assert_eq!(g.get(apply).unwrap().link("model"), Some(chain.model));
        assert_eq!(
            g.get(apply).unwrap().literal("weight"),
            Some(&serde_json::json!(0.9))
        );

        g.validate().unwrap();
    }

    #[test]
    fn ip_adapter_uses_scale_slot() {
        let (mut g, a) = base_graph();
        let before = g.len();
        let chain = ModelChain {
            model: a.model_loader.into(),
            clip: a.clip_loader.into(),
        };

        let out = inject(
            &mut g,
            chain,
            &request(ConditioningMode::IpAdapter, 0.7),
            Some("ref_abc123.png"),
        );

        // LoadImage + weights loader + apply node.
        assert_eq!(g.len(), before + 3);
        let apply = g.find_one(NodeKind::ApplyIpAdapter).unwrap();
        assert_eq!(out.model, apply.into());
        assert_eq!(
            g.get(apply).unwrap().literal("ip_scale"),
            Some(&serde_json::json!(0.7))
        );
        g.validate().unwrap();
    }

    #[test]
    fn no_reference_image_means_no_change() {
        let (mut g, a) = base_graph();
        let before = g.len();
        let chain = ModelChain {
            model: a.model_loader.into(),
            clip: a.clip_loader.into(),
        };
        let out = inject(&mut g, chain, &request(ConditioningMode::Pulid, 0.9), None);
        assert_eq!(out, chain);
        assert_eq!(g.len(), before);
    }

    #[test]
    fn zero_strength_disables() {
        let (mut g, a) = base_graph();
        let before = g.len();
        let chain = ModelChain {
            model: a.model_loader.into(),
            clip: a.clip_loader.into(),
        };
        let out = inject(
            &mut g,
            chain,
            &request(ConditioningMode::IpAdapter, 0.0),
            Some("ref_abc123.png"),
        );
        assert_eq!(out, chain);
        assert_eq!(g.len(), before);
    }
}
