//! Guidance-control injector: pose, depth, and edge maps.
//!
//! All present controls share one control-model loader. Each control
//! adds an image load, a preprocessor, and an apply node; apply nodes
//! chain through the conditioning pair in fixed pose, depth, edge
//! order, with the positive side on output 0 and the negative side on
//! output 1. The caller redirects the sampler-facing conditioning
//! consumers afterwards; a graph-wide rewire here would send the chain
//! through itself.

use fluxforge_core::graph::{NodeId, OutputRef, WorkflowGraph};
use fluxforge_core::kind::NodeKind;

use super::CondChain;

pub const CONTROL_NET_WEIGHTS: &str = "flux-controlnet-union-pro-2.0.safetensors";
pub const DEPTH_WEIGHTS: &str = "depth_anything_v2_vitl.pth";

const PREPROCESS_RESOLUTION: u32 = 1024;

/// One uploaded control input: backend-side filename plus effective
/// strength (request override or the per-control default).
#[derive(Debug, Clone)]
pub struct ControlInput {
    pub filename: String,
    pub strength: f64,
}

impl ControlInput {
    pub fn new(filename: impl Into<String>, strength: f64) -> Self {
        Self {
            filename: filename.into(),
            strength,
        }
    }
}

/// The resolved set of control inputs for one request.
#[derive(Debug, Clone, Default)]
pub struct ControlSet {
    pub pose: Option<ControlInput>,
    pub depth: Option<ControlInput>,
    pub edge: Option<ControlInput>,
}

impl ControlSet {
    pub fn is_empty(&self) -> bool {
        self.pose.is_none() && self.depth.is_none() && self.edge.is_none()
    }
}

enum ControlKind {
    Pose,
    Depth,
    Edge,
}

impl ControlKind {
    /// Guidance window: the fraction of sampling steps this control
    /// stays active for.
    fn window(&self) -> (f64, f64) {
        match self {
            ControlKind::Pose => (0.0, 0.5),
            ControlKind::Depth => (0.0, 0.6),
            ControlKind::Edge => (0.0, 0.5),
        }
    }
}

/// Chain the present controls through the conditioning pair.
///
/// Returns the conditioning references the sampler-facing consumers
/// should use after injection; when no control is present that is the
/// input chain unchanged.
pub fn inject(
    graph: &mut WorkflowGraph,
    cond: CondChain,
    vae: OutputRef,
    controls: &ControlSet,
) -> CondChain {
    if controls.is_empty() {
        return cond;
    }

    let loader = graph.insert(
        NodeKind::ControlNetLoader,
        "Control Model",
        [("control_net_name", CONTROL_NET_WEIGHTS.into())],
    );

    let mut chain = cond;
    if let Some(input) = &controls.pose {
        chain = apply_control(graph, loader, vae, chain, ControlKind::Pose, input);
    }
    if let Some(input) = &controls.depth {
        chain = apply_control(graph, loader, vae, chain, ControlKind::Depth, input);
    }
    if let Some(input) = &controls.edge {
        chain = apply_control(graph, loader, vae, chain, ControlKind::Edge, input);
    }
    chain
}

fn apply_control(
    graph: &mut WorkflowGraph,
    loader: NodeId,
    vae: OutputRef,
    cond: CondChain,
    kind: ControlKind,
    input: &ControlInput,
) -> CondChain {
    let (title, image_title) = match kind {
        ControlKind::Pose => ("Apply Pose Control", "Pose Control Image"),
        ControlKind::Depth => ("Apply Depth Control", "Depth Control Image"),
        ControlKind::Edge => ("Apply Edge Control", "Edge Control Image"),
    };

    let image = graph.insert(
        NodeKind::LoadImage,
        image_title,
        [("image", input.filename.clone().into())],
    );
    let map = match kind {
        ControlKind::Pose => graph.insert(
            NodeKind::PosePreprocessor,
            "Pose Map",
            [
                ("image", image.into()),
                ("detect_hand", "enable".into()),
                ("detect_body", "enable".into()),
                ("detect_face", "enable".into()),
                ("resolution", PREPROCESS_RESOLUTION.into()),
            ],
        ),
        ControlKind::Depth => graph.insert(
            NodeKind::DepthPreprocessor,
            "Depth Map",
            [
                ("image", image.into()),
                ("ckpt_name", DEPTH_WEIGHTS.into()),
                ("resolution", PREPROCESS_RESOLUTION.into()),
            ],
        ),
        ControlKind::Edge => graph.insert(
            NodeKind::EdgePreprocessor,
            "Edge Map",
            [
                ("image", image.into()),
                ("low_threshold", 100u32.into()),
                ("high_threshold", 200u32.into()),
                ("resolution", PREPROCESS_RESOLUTION.into()),
            ],
        ),
    };

    let (start, end) = kind.window();
    let apply = graph.insert(
        NodeKind::ControlNetApply,
        title,
        [
            ("positive", cond.positive.into()),
            ("negative", cond.negative.into()),
            ("control_net", loader.into()),
            ("vae", vae.into()),
            ("image", map.into()),
            ("strength", input.strength.into()),
            ("start_percent", start.into()),
            ("end_percent", end.into()),
        ],
    );

    tracing::debug!(control = title, strength = input.strength, "Control injected");
    CondChain {
        positive: OutputRef::new(apply, 0),
        negative: OutputRef::new(apply, 1),
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::base_graph;
    use super::*;

    fn full_set() -> ControlSet {
        ControlSet {
            pose: Some(ControlInput::new("pose.png", 0.25)),
            depth: Some(ControlInput::new("depth.png", 0.3)),
            edge: Some(ControlInput::new("edge.png", 0.3)),
        }
    }

    #[test]
    fn empty_set_changes_nothing() {
        let (mut g, a) = base_graph();
        let before = g.len();
        let cond = CondChain {
            positive: a.positive.into(),
            negative: a.negative.into(),
        };
        let out = inject(&mut g, cond, a.vae_loader.into(), &ControlSet::default());
        assert_eq!(out, cond);
        assert_eq!(g.len(), before);
    }

    #[test]
    fn single_control_shares_loader_and_splits_outputs() {
        let (mut g, a) = base_graph();
        let cond = CondChain {
            positive: a.positive.into(),
            negative: a.negative.into(),
        };
        let set = ControlSet {
            depth: Some(ControlInput::new("depth.png", 0.4)),
            ..Default::default()
        };

        let out = inject(&mut g, cond, a.vae_loader.into(), &set);

        let apply = g.find_one(NodeKind::ControlNetApply).unwrap();
        assert_eq!(out.positive, OutputRef::new(apply, 0));
        assert_eq!(out.negative, OutputRef::new(apply, 1));

        let node = g.get(apply).unwrap();
        assert_eq!(node.link("positive"), Some(cond.positive));
        assert_eq!(node.link("negative"), Some(cond.negative));
        assert_eq!(node.link("vae"), Some(a.vae_loader.into()));
        assert_eq!(node.literal("strength"), Some(&serde_json::json!(0.4)));
        assert_eq!(node.literal("end_percent"), Some(&serde_json::json!(0.6)));
        g.validate().unwrap();
    }

    #[test]
    fn three_controls_chain_in_pose_depth_edge_order() {
        let (mut g, a) = base_graph();
        let cond = CondChain {
            positive: a.positive.into(),
            negative: a.negative.into(),
        };

        let out = inject(&mut g, cond, a.vae_loader.into(), &full_set());

        // One shared loader.
        assert_eq!(g.find_by_kind(NodeKind::ControlNetLoader).len(), 1);
        let applies = g.find_by_kind(NodeKind::ControlNetApply);
        assert_eq!(applies.len(), 3);

        // Pose consumes the raw encoders; depth consumes pose; edge
        // consumes depth, on matching output indices.
        let (pose, depth, edge) = (applies[0], applies[1], applies[2]);
        assert_eq!(g.get(pose).unwrap().link("positive"), Some(cond.positive));
        assert_eq!(g.get(depth).unwrap().link("positive"), Some(OutputRef::new(pose, 0)));
        assert_eq!(g.get(depth).unwrap().link("negative"), Some(OutputRef::new(pose, 1)));
        assert_eq!(g.get(edge).unwrap().link("positive"), Some(OutputRef::new(depth, 0)));
        assert_eq!(g.get(edge).unwrap().link("negative"), Some(OutputRef::new(depth, 1)));

        assert_eq!(out.positive, OutputRef::new(edge, 0));
        assert_eq!(out.negative, OutputRef::new(edge, 1));
        g.validate().unwrap();
    }

    #[test]
    fn guidance_windows_follow_control_kind() {
        let (mut g, a) = base_graph();
        let cond = CondChain {
            positive: a.positive.into(),
            negative: a.negative.into(),
        };
        inject(&mut g, cond, a.vae_loader.into(), &full_set());

        let applies = g.find_by_kind(NodeKind::ControlNetApply);
        let ends: Vec<_> = applies
            .iter()
            .map(|id| g.get(*id).unwrap().literal("end_percent").cloned().unwrap())
            .collect();
        assert_eq!(ends, vec![
            serde_json::json!(0.5),
            serde_json::json!(0.6),
            serde_json::json!(0.5),
        ]);
    }
}
