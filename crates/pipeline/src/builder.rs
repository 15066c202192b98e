//! Pipeline builder: per-action assembly recipes.
//!
//! A recipe loads its base template, resolves the anchor nodes the
//! injectors hang off, runs the injector chain in data-flow order,
//! sweeps request literals, and validates the finished graph. Image
//! payloads are uploaded by the caller beforehand; the builder only
//! ever sees backend-side filenames.

use std::path::PathBuf;

use fluxforge_core::graph::{GraphError, NodeId, WorkflowGraph};
use fluxforge_core::kind::NodeKind;
use fluxforge_core::request::{
    resolve_seed, Action, ControlImage, GenerationRequest, DEFAULT_DEPTH_STRENGTH,
    DEFAULT_EDGE_STRENGTH, DEFAULT_POSE_STRENGTH, DEFAULT_PROMPT,
};

use crate::assets::AssetResolver;
use crate::inject::control::{ControlInput, ControlSet};
use crate::inject::post::PostParams;
use crate::inject::{control, detail, face, identity, post, upscale, CondChain, ModelChain};
use crate::params::{self, SweepValues};
use crate::templates::{TemplateError, TemplateStore};

/// Face-refinement denoise when the request leaves it unset.
const DEFAULT_FACE_DENOISE: f64 = 0.35;
/// Stronger default for the dedicated detail recipe.
const DEFAULT_DETAIL_FACE_DENOISE: f64 = 0.42;

/// Errors from workflow assembly.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Unknown action '{0}', expected one of: generate, edit, detail")]
    UnknownAction(String),

    #[error("The '{action}' action requires an input image")]
    MissingInput { action: &'static str },

    #[error("Template '{template}' is missing a required {kind} node")]
    MissingAnchor {
        template: &'static str,
        kind: NodeKind,
    },

    #[error("Template '{template}' save node has no image input")]
    UnlinkedSave { template: &'static str },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Backend-side filenames for the request's uploaded image payloads.
#[derive(Debug, Clone, Default)]
pub struct UploadedInputs {
    pub input_image: Option<String>,
    pub reference_image: Option<String>,
    pub pose: Option<String>,
    pub depth: Option<String>,
    pub edge: Option<String>,
}

/// A submittable workflow plus the seed it was assembled with.
#[derive(Debug)]
pub struct BuiltWorkflow {
    pub graph: WorkflowGraph,
    pub seed: u32,
}

/// Turns requests into validated workflow graphs.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    templates: TemplateStore,
}

impl PipelineBuilder {
    pub fn new(templates: TemplateStore) -> Self {
        Self { templates }
    }

    /// Convenience constructor over a template search path.
    pub fn with_search_paths(paths: Vec<PathBuf>) -> Self {
        Self::new(TemplateStore::new(paths))
    }

    /// Assemble the workflow for one request.
    pub fn build(
        &self,
        request: &GenerationRequest,
        uploads: &UploadedInputs,
        resolver: &dyn AssetResolver,
    ) -> Result<BuiltWorkflow, PipelineError> {
        let action = Action::from_name(&request.action)
            .ok_or_else(|| PipelineError::UnknownAction(request.action.clone()))?;

        match action {
            Action::Generate => self.assemble("txt2img", action, request, uploads, resolver),
            Action::Edit => {
                if uploads.input_image.is_none() {
                    return Err(PipelineError::MissingInput { action: "edit" });
                }
                self.assemble("img2img", action, request, uploads, resolver)
            }
            Action::Detail => self.build_detail(request, uploads),
        }
    }

    /// Shared recipe for the sampling actions. `generate` and `edit`
    /// run the same injector chain; `edit` additionally carries the
    /// input image and a sub-1.0 denoise.
    fn assemble(
        &self,
        template: &'static str,
        action: Action,
        request: &GenerationRequest,
        uploads: &UploadedInputs,
        resolver: &dyn AssetResolver,
    ) -> Result<BuiltWorkflow, PipelineError> {
        let mut graph = self.templates.load(template)?;

        let model_loader = require(&graph, template, NodeKind::UnetLoader)?;
        let clip_loader = require(&graph, template, NodeKind::DualClipLoader)?;
        let vae_loader = require(&graph, template, NodeKind::VaeLoader)?;
        let guider = require(&graph, template, NodeKind::BasicGuider)?;
        let sampler_select = require(&graph, template, NodeKind::KSamplerSelect)?;
        let save = require(&graph, template, NodeKind::SaveImage)?;
        let (positive, negative) = prompt_encoders(&graph, template)?;
        let detailer = graph.find_one(NodeKind::FaceDetailer);

        // Only edit consumes the input image; a stray payload on a
        // generate request is ignored, never an assembly failure.
        if action == Action::Edit {
            let load = require(&graph, template, NodeKind::LoadImage)?;
            if let (Some(node), Some(filename)) =
                (graph.get_mut(load), uploads.input_image.as_deref())
            {
                node.set_literal("image", filename);
            }
        }

        // Model chain: identity first so face conditioning stacks on
        // top of the LoRA-patched model.
        let mut chain = ModelChain {
            model: model_loader.into(),
            clip: clip_loader.into(),
        };
        chain = identity::inject(&mut graph, chain, request, resolver);
        chain = face::inject(&mut graph, chain, request, uploads.reference_image.as_deref());
        let _ = chain;

        // Conditioning chain. The control injector returns the refs
        // the sampler-facing consumers should read; only those two
        // nodes are redirected.
        let cond = CondChain {
            positive: positive.into(),
            negative: negative.into(),
        };
        let controls = control_set(request, uploads);
        let rewired = control::inject(&mut graph, cond, vae_loader.into(), &controls);
        if rewired != cond {
            graph.rewire_inputs_of(guider, cond.positive, rewired.positive);
            if let Some(detailer) = detailer {
                graph.rewire_inputs_of(detailer, cond.positive, rewired.positive);
                graph.rewire_inputs_of(detailer, cond.negative, rewired.negative);
            }
        }

        detail::inject(&mut graph, sampler_select, request.detail_amount);

        let seed = resolve_seed(request.seed);
        let prompt = if request.prompt.is_empty() && action == Action::Generate {
            DEFAULT_PROMPT
        } else {
            request.prompt.as_str()
        };
        let denoise = match action {
            Action::Edit => Some(request.denoise),
            _ => None,
        };
        params::apply(
            &mut graph,
            &SweepValues {
                prompt,
                negative_prompt: &request.negative_prompt,
                seed,
                steps: request.steps,
                width: request.width,
                height: request.height,
                denoise,
                face_detail_denoise: request.face_detail_denoise.unwrap_or(DEFAULT_FACE_DENOISE),
                face_feather: request.face_feather,
                scale_by: request.scale_by,
            },
        );

        self.finish(graph, template, save, request, seed)
    }

    /// Detail recipe: refinement and rescale of an existing image, no
    /// sampling chain.
    fn build_detail(
        &self,
        request: &GenerationRequest,
        uploads: &UploadedInputs,
    ) -> Result<BuiltWorkflow, PipelineError> {
        let template = "detail";
        let filename = uploads
            .input_image
            .as_deref()
            .ok_or(PipelineError::MissingInput { action: "detail" })?;

        let mut graph = self.templates.load(template)?;
        let load = require(&graph, template, NodeKind::LoadImage)?;
        let save = require(&graph, template, NodeKind::SaveImage)?;
        require(&graph, template, NodeKind::FaceDetailer)?;

        if let Some(node) = graph.get_mut(load) {
            node.set_literal("image", filename);
        }

        let seed = resolve_seed(request.seed);
        params::apply(
            &mut graph,
            &SweepValues {
                prompt: &request.prompt,
                negative_prompt: &request.negative_prompt,
                seed,
                steps: request.steps,
                width: request.width,
                height: request.height,
                denoise: None,
                face_detail_denoise: request
                    .face_detail_denoise
                    .unwrap_or(DEFAULT_DETAIL_FACE_DENOISE),
                face_feather: request.face_feather,
                scale_by: request.scale_by,
            },
        );

        self.finish(graph, template, save, request, seed)
    }

    /// Common tail: optional upscale, optional post-processing, then
    /// validation.
    fn finish(
        &self,
        mut graph: WorkflowGraph,
        template: &'static str,
        save: NodeId,
        request: &GenerationRequest,
        seed: u32,
    ) -> Result<BuiltWorkflow, PipelineError> {
        let template_image = graph
            .get(save)
            .and_then(|node| node.link("images"))
            .ok_or(PipelineError::UnlinkedSave { template })?;

        let mut image = template_image;
        if request.upscale {
            image = upscale::inject(&mut graph, image, request.upscale_width, request.upscale_height);
            graph.rewire_inputs_of(save, template_image, image);
        }
        if request.post_processing {
            image = post::inject(
                &mut graph,
                image,
                save,
                &PostParams {
                    grain: request.grain,
                    temperature: request.temperature,
                    saturation: request.saturation,
                },
            );
        }
        let _ = image;

        graph.validate()?;
        tracing::debug!(template, nodes = graph.len(), seed, "Workflow assembled");
        Ok(BuiltWorkflow { graph, seed })
    }
}

fn require(
    graph: &WorkflowGraph,
    template: &'static str,
    kind: NodeKind,
) -> Result<NodeId, PipelineError> {
    graph
        .find_one(kind)
        .ok_or(PipelineError::MissingAnchor { template, kind })
}

/// Locate the positive and negative prompt encoders by title.
fn prompt_encoders(
    graph: &WorkflowGraph,
    template: &'static str,
) -> Result<(NodeId, NodeId), PipelineError> {
    let mut positive = None;
    let mut negative = None;
    for (id, node) in graph.nodes() {
        if node.kind != NodeKind::ClipTextEncode {
            continue;
        }
        let title = node.title.to_lowercase();
        if title.contains("positive") {
            positive.get_or_insert(id);
        } else if title.contains("negative") {
            negative.get_or_insert(id);
        }
    }
    match (positive, negative) {
        (Some(positive), Some(negative)) => Ok((positive, negative)),
        _ => Err(PipelineError::MissingAnchor {
            template,
            kind: NodeKind::ClipTextEncode,
        }),
    }
}

/// Resolve the effective control inputs: a control participates when
/// its image was uploaded and its strength (request override or the
/// per-control default) is positive.
fn control_set(request: &GenerationRequest, uploads: &UploadedInputs) -> ControlSet {
    fn resolve(
        upload: &Option<String>,
        requested: &Option<ControlImage>,
        default: f64,
    ) -> Option<ControlInput> {
        let filename = upload.as_deref()?;
        let strength = requested.as_ref().and_then(|c| c.strength).unwrap_or(default);
        if strength <= 0.0 {
            return None;
        }
        Some(ControlInput::new(filename, strength))
    }

    ControlSet {
        pose: resolve(
            &uploads.pose,
            &request.control_images.pose,
            DEFAULT_POSE_STRENGTH,
        ),
        depth: resolve(
            &uploads.depth,
            &request.control_images.depth,
            DEFAULT_DEPTH_STRENGTH,
        ),
        edge: resolve(
            &uploads.edge,
            &request.control_images.edge,
            DEFAULT_EDGE_STRENGTH,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inject::testing::{EmptyShelf, StockedShelf};
    use assert_matches::assert_matches;
    use fluxforge_core::graph::OutputRef;
    use serde_json::json;

    fn builder() -> PipelineBuilder {
        PipelineBuilder::with_search_paths(vec![PathBuf::from(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../../workflows"
        ))])
    }

    /// A request with every optional feature switched off.
    fn bare_request(action: &str) -> GenerationRequest {
        let mut request: GenerationRequest = serde_json::from_value(json!({
            "action": action,
            "prompt": "studio portrait",
            "seed": 5,
            "detail_amount": 0.0,
            "post_processing": false,
        }))
        .unwrap();
        request.upscale = false;
        request
    }

    // -- generate -----------------------------------------------------------

    #[test]
    fn bare_generate_matches_template_shape() {
        let b = builder();
        let template_len = b.templates.load("txt2img").unwrap().len();

        let built = b
            .build(&bare_request("generate"), &UploadedInputs::default(), &EmptyShelf)
            .unwrap();

        assert_eq!(built.graph.len(), template_len);
        assert_eq!(built.seed, 5);

        let g = &built.graph;
        let noise = g.find_one(NodeKind::RandomNoise).unwrap();
        assert_eq!(g.get(noise).unwrap().literal("noise_seed"), Some(&json!(5)));
        let positive = g
            .nodes()
            .find(|(_, n)| n.kind == NodeKind::ClipTextEncode && n.title.contains("Positive"))
            .map(|(id, _)| id)
            .unwrap();
        assert_eq!(
            g.get(positive).unwrap().literal("text"),
            Some(&json!("studio portrait"))
        );
    }

    #[test]
    fn empty_prompt_falls_back_to_default_for_generate() {
        let mut request = bare_request("generate");
        request.prompt = String::new();
        let built = builder()
            .build(&request, &UploadedInputs::default(), &EmptyShelf)
            .unwrap();

        let g = &built.graph;
        let positive = g
            .nodes()
            .find(|(_, n)| n.kind == NodeKind::ClipTextEncode && n.title.contains("Positive"))
            .map(|(id, _)| id)
            .unwrap();
        assert_eq!(
            g.get(positive).unwrap().literal("text"),
            Some(&json!(DEFAULT_PROMPT))
        );
    }

    #[test]
    fn generate_ignores_stray_input_image() {
        let b = builder();
        let template_len = b.templates.load("txt2img").unwrap().len();
        let uploads = UploadedInputs {
            input_image: Some("ref_in.png".to_string()),
            ..Default::default()
        };

        let built = b
            .build(&bare_request("generate"), &uploads, &EmptyShelf)
            .unwrap();

        assert_eq!(built.graph.len(), template_len);
        assert!(built.graph.find_one(NodeKind::LoadImage).is_none());
    }

    #[test]
    fn identity_request_splices_lora_into_model_chain() {
        let b = builder();
        let template_len = b.templates.load("txt2img").unwrap().len();

        let mut request = bare_request("generate");
        request.identity_asset_name = "face.safetensors".to_string();
        request.identity_strength = 0.9;

        let built = b
            .build(&request, &UploadedInputs::default(), &StockedShelf)
            .unwrap();
        let g = &built.graph;

        assert_eq!(g.len(), template_len + 1);
        let lora = g.find_one(NodeKind::LoraLoader).unwrap();
        let guider = g.find_one(NodeKind::BasicGuider).unwrap();
        let scheduler = g.find_one(NodeKind::BasicScheduler).unwrap();
        let detailer = g.find_one(NodeKind::FaceDetailer).unwrap();

        assert_eq!(g.get(guider).unwrap().link("model"), Some(OutputRef::new(lora, 0)));
        assert_eq!(g.get(scheduler).unwrap().link("model"), Some(OutputRef::new(lora, 0)));
        assert_eq!(g.get(detailer).unwrap().link("model"), Some(OutputRef::new(lora, 0)));
        assert_eq!(g.get(detailer).unwrap().link("clip"), Some(OutputRef::new(lora, 1)));
    }

    #[test]
    fn missing_identity_asset_builds_without_lora() {
        let b = builder();
        let template_len = b.templates.load("txt2img").unwrap().len();

        let mut request = bare_request("generate");
        request.identity_asset_name = "missing.safetensors".to_string();
        request.identity_strength = 0.9;

        let built = b
            .build(&request, &UploadedInputs::default(), &EmptyShelf)
            .unwrap();
        assert_eq!(built.graph.len(), template_len);
        assert!(built.graph.find_one(NodeKind::LoraLoader).is_none());
    }

    #[test]
    fn three_controls_chain_and_redirect_sampler_consumers() {
        let mut request = bare_request("generate");
        request.control_images.pose = Some(ControlImage {
            image: "aGk=".to_string(),
            strength: None,
        });
        request.control_images.depth = Some(ControlImage {
            image: "aGk=".to_string(),
            strength: Some(0.45),
        });
        request.control_images.edge = Some(ControlImage {
            image: "aGk=".to_string(),
            strength: None,
        });
        let uploads = UploadedInputs {
            pose: Some("pose.png".to_string()),
            depth: Some("depth.png".to_string()),
            edge: Some("edge.png".to_string()),
            ..Default::default()
        };

        let built = builder().build(&request, &uploads, &EmptyShelf).unwrap();
        let g = &built.graph;

        let applies = g.find_by_kind(NodeKind::ControlNetApply);
        assert_eq!(applies.len(), 3);
        let edge_apply = applies[2];

        // Sampler-facing consumers read the end of the chain, positive
        // on output 0 and negative on output 1.
        let guider = g.find_one(NodeKind::BasicGuider).unwrap();
        assert_eq!(
            g.get(guider).unwrap().link("conditioning"),
            Some(OutputRef::new(edge_apply, 0))
        );
        let detailer = g.find_one(NodeKind::FaceDetailer).unwrap();
        assert_eq!(
            g.get(detailer).unwrap().link("positive"),
            Some(OutputRef::new(edge_apply, 0))
        );
        assert_eq!(
            g.get(detailer).unwrap().link("negative"),
            Some(OutputRef::new(edge_apply, 1))
        );

        // Per-control strength override took effect on the depth apply.
        assert_eq!(
            g.get(applies[1]).unwrap().literal("strength"),
            Some(&json!(0.45))
        );
        assert_eq!(
            g.get(applies[0]).unwrap().literal("strength"),
            Some(&json!(DEFAULT_POSE_STRENGTH))
        );
    }

    #[test]
    fn upscale_and_post_processing_retarget_the_save_node() {
        let mut request = bare_request("generate");
        request.upscale = true;
        request.post_processing = true;

        let built = builder()
            .build(&request, &UploadedInputs::default(), &EmptyShelf)
            .unwrap();
        let g = &built.graph;

        let save = g.find_one(NodeKind::SaveImage).unwrap();
        let graded = g.find_one(NodeKind::ColorCorrect).unwrap();
        assert_eq!(g.get(save).unwrap().link("images"), Some(graded.into()));

        // Post-processing reads the upscaled image, not the raw decode.
        let scale = g.find_one(NodeKind::ImageScale).unwrap();
        let optical = g.find_one(NodeKind::OpticalRealism).unwrap();
        assert_eq!(g.get(optical).unwrap().link("image"), Some(scale.into()));
    }

    // -- edit ---------------------------------------------------------------

    #[test]
    fn edit_requires_an_input_image() {
        let result = builder().build(
            &bare_request("edit"),
            &UploadedInputs::default(),
            &EmptyShelf,
        );
        assert_matches!(result, Err(PipelineError::MissingInput { action: "edit" }));
    }

    #[test]
    fn edit_sets_input_image_and_denoise() {
        let mut request = bare_request("edit");
        request.denoise = 0.55;
        let uploads = UploadedInputs {
            input_image: Some("ref_in.png".to_string()),
            ..Default::default()
        };

        let built = builder().build(&request, &uploads, &EmptyShelf).unwrap();
        let g = &built.graph;

        let load = g.find_one(NodeKind::LoadImage).unwrap();
        assert_eq!(g.get(load).unwrap().literal("image"), Some(&json!("ref_in.png")));
        let scheduler = g.find_one(NodeKind::BasicScheduler).unwrap();
        assert_eq!(g.get(scheduler).unwrap().literal("denoise"), Some(&json!(0.55)));
        // Empty prompt stays empty for edit.
        assert!(g.find_one(NodeKind::VaeEncode).is_some());
    }

    // -- detail -------------------------------------------------------------

    #[test]
    fn detail_requires_an_input_image() {
        let result = builder().build(
            &bare_request("detail"),
            &UploadedInputs::default(),
            &EmptyShelf,
        );
        assert_matches!(result, Err(PipelineError::MissingInput { action: "detail" }));
    }

    #[test]
    fn detail_sweeps_refinement_values() {
        let mut request = bare_request("detail");
        request.scale_by = 0.75;
        let uploads = UploadedInputs {
            input_image: Some("ref_in.png".to_string()),
            ..Default::default()
        };

        let built = builder().build(&request, &uploads, &EmptyShelf).unwrap();
        let g = &built.graph;

        let load = g.find_one(NodeKind::LoadImage).unwrap();
        assert_eq!(g.get(load).unwrap().literal("image"), Some(&json!("ref_in.png")));
        let detailer = g.find_one(NodeKind::FaceDetailer).unwrap();
        assert_eq!(g.get(detailer).unwrap().literal("denoise"), Some(&json!(0.42)));
        assert_eq!(g.get(detailer).unwrap().literal("seed"), Some(&json!(5)));
        let rescale = g.find_one(NodeKind::ImageScaleBy).unwrap();
        assert_eq!(g.get(rescale).unwrap().literal("scale_by"), Some(&json!(0.75)));
    }

    // -- dispatch -----------------------------------------------------------

    #[test]
    fn unknown_action_is_a_domain_error() {
        let result = builder().build(
            &bare_request("remix"),
            &UploadedInputs::default(),
            &EmptyShelf,
        );
        assert_matches!(result, Err(PipelineError::UnknownAction(name)) if name == "remix");
    }
}
