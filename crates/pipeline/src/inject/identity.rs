//! Identity LoRA injector.

use fluxforge_core::graph::{OutputRef, WorkflowGraph};
use fluxforge_core::kind::NodeKind;
use fluxforge_core::request::{GenerationRequest, DEFAULT_IDENTITY_STRENGTH};

use crate::assets::AssetResolver;

use super::ModelChain;

/// Splice a LoRA loader into the model chain.
///
/// Applies when the request names an identity asset; a named asset
/// without a strength gets [`DEFAULT_IDENTITY_STRENGTH`]. The loader
/// consumes the current model and clip references and supersedes both:
/// every downstream consumer is rewired to its outputs (model on
/// output 0, clip on output 1). If the asset is not present under any
/// model root the injector logs and leaves the graph untouched.
pub fn inject(
    graph: &mut WorkflowGraph,
    chain: ModelChain,
    request: &GenerationRequest,
    resolver: &dyn AssetResolver,
) -> ModelChain {
    let name = request.identity_asset_name.trim();
    if name.is_empty() {
        return chain;
    }
    if !resolver.exists(name) {
        tracing::warn!(asset = name, "Identity LoRA not found under any model root, skipping");
        return chain;
    }

    let strength = if request.identity_strength > 0.0 {
        request.identity_strength
    } else {
        DEFAULT_IDENTITY_STRENGTH
    };

    let lora = graph.insert(
        NodeKind::LoraLoader,
        "Identity LoRA",
        [
            ("model", chain.model.into()),
            ("clip", chain.clip.into()),
            ("lora_name", name.into()),
            ("strength_model", strength.into()),
            ("strength_clip", strength.into()),
        ],
    );
    graph.rewire_excluding(chain.model, OutputRef::new(lora, 0), &[lora]);
    graph.rewire_excluding(chain.clip, OutputRef::new(lora, 1), &[lora]);

    tracing::debug!(asset = name, strength, "Identity LoRA injected");
    ModelChain {
        model: OutputRef::new(lora, 0),
        clip: OutputRef::new(lora, 1),
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{base_graph, EmptyShelf, StockedShelf};
    use super::*;

    fn request_with_identity(name: &str, strength: f64) -> GenerationRequest {
        let mut request: GenerationRequest = serde_json::from_str("{}").unwrap();
        request.identity_asset_name = name.to_string();
        request.identity_strength = strength;
        request
    }

    #[test]
    fn splices_loader_and_rewires_model_and_clip() {
        let (mut g, a) = base_graph();
        let before = g.len();
        let chain = ModelChain {
            model: a.model_loader.into(),
            clip: a.clip_loader.into(),
        };

        let out = inject(&mut g, chain, &request_with_identity("face.safetensors", 0.9), &StockedShelf);

        assert_eq!(g.len(), before + 1);
        let lora = g.find_one(NodeKind::LoraLoader).unwrap();
        assert_eq!(out.model, OutputRef::new(lora, 0));
        assert_eq!(out.clip, OutputRef::new(lora, 1));

        // Downstream model consumers now point at the loader.
        assert_eq!(g.get(a.guider).unwrap().link("model"), Some(out.model));
        assert_eq!(g.get(a.scheduler).unwrap().link("model"), Some(out.model));
        assert_eq!(g.get(a.detailer).unwrap().link("model"), Some(out.model));
        assert_eq!(g.get(a.detailer).unwrap().link("clip"), Some(out.clip));
        // Prompt encoders follow the clip output.
        assert_eq!(g.get(a.positive).unwrap().link("clip"), Some(out.clip));

        // The loader itself keeps consuming the original references.
        let node = g.get(lora).unwrap();
        assert_eq!(node.link("model"), Some(chain.model));
        assert_eq!(node.link("clip"), Some(chain.clip));
        assert_eq!(node.literal("strength_model"), Some(&serde_json::json!(0.9)));

        g.validate().unwrap();
    }

    #[test]
    fn named_asset_without_strength_gets_default() {
        let (mut g, a) = base_graph();
        let chain = ModelChain {
            model: a.model_loader.into(),
            clip: a.clip_loader.into(),
        };
        inject(&mut g, chain, &request_with_identity("face.safetensors", 0.0), &StockedShelf);

        let lora = g.find_one(NodeKind::LoraLoader).unwrap();
        assert_eq!(
            g.get(lora).unwrap().literal("strength_model"),
            Some(&serde_json::json!(DEFAULT_IDENTITY_STRENGTH))
        );
    }

    #[test]
    fn missing_asset_degrades_gracefully() {
        let (mut g, a) = base_graph();
        let untouched = g.clone();
        let chain = ModelChain {
            model: a.model_loader.into(),
            clip: a.clip_loader.into(),
        };

        let out = inject(&mut g, chain, &request_with_identity("gone.safetensors", 0.9), &EmptyShelf);

        assert_eq!(out, chain);
        assert_eq!(g.len(), untouched.len());
        for (id, node) in untouched.nodes() {
            assert_eq!(g.get(id).unwrap(), node);
        }
    }

    #[test]
    fn empty_name_is_not_applicable() {
        let (mut g, a) = base_graph();
        let before = g.len();
        let chain = ModelChain {
            model: a.model_loader.into(),
            clip: a.clip_loader.into(),
        };
        let out = inject(&mut g, chain, &request_with_identity("", 0.9), &StockedShelf);
        assert_eq!(out, chain);
        assert_eq!(g.len(), before);
    }
}
