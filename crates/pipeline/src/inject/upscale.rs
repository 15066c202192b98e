//! Upscale injector: model upscale followed by an exact-size rescale.

use fluxforge_core::graph::{OutputRef, WorkflowGraph};
use fluxforge_core::kind::NodeKind;

pub const UPSCALE_WEIGHTS: &str = "4x-UltraSharp.pth";

/// Append the upscale pair after `image` and return the rescaled
/// reference. The caller rewires its final-image consumer; nothing is
/// rewired here because the upscale sits at the tail of the image path.
pub fn inject(graph: &mut WorkflowGraph, image: OutputRef, width: u32, height: u32) -> OutputRef {
    let loader = graph.insert(
        NodeKind::UpscaleModelLoader,
        "Upscale Model",
        [("model_name", UPSCALE_WEIGHTS.into())],
    );
    let upscaled = graph.insert(
        NodeKind::ImageUpscaleWithModel,
        "Model Upscale",
        [("upscale_model", loader.into()), ("image", image.into())],
    );
    let scaled = graph.insert(
        NodeKind::ImageScale,
        "Rescale to Target",
        [
            ("image", upscaled.into()),
            ("width", width.into()),
            ("height", height.into()),
            ("upscale_method", "lanczos".into()),
            ("crop", "center".into()),
        ],
    );

    tracing::debug!(width, height, "Upscale injected");
    scaled.into()
}

#[cfg(test)]
mod tests {
    use super::super::testing::base_graph;
    use super::*;

    #[test]
    fn appends_pair_and_returns_rescaled_reference() {
        let (mut g, a) = base_graph();
        let before = g.len();
        let image: OutputRef = a.detailer.into();

        let out = inject(&mut g, image, 1440, 1800);

        assert_eq!(g.len(), before + 3);
        let scale = g.find_one(NodeKind::ImageScale).unwrap();
        assert_eq!(out, scale.into());

        let upscaled = g.find_one(NodeKind::ImageUpscaleWithModel).unwrap();
        assert_eq!(g.get(upscaled).unwrap().link("image"), Some(image));
        let node = g.get(scale).unwrap();
        assert_eq!(node.link("image"), Some(upscaled.into()));
        assert_eq!(node.literal("width"), Some(&serde_json::json!(1440)));
        assert_eq!(node.literal("height"), Some(&serde_json::json!(1800)));
        assert_eq!(node.literal("crop"), Some(&serde_json::json!("center")));

        // The save node is the caller's to rewire.
        assert_eq!(g.get(a.save).unwrap().link("images"), Some(image));
    }
}
