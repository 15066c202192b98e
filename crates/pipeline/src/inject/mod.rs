//! Feature injectors.
//!
//! Every injector follows the same contract: decide applicability from
//! request parameters (and an asset-existence check where the feature
//! references weight files), insert its nodes, rewire the superseded
//! reference, and hand back the new insertion point for the next
//! injector. An injector that cannot apply leaves the graph untouched;
//! a missing asset degrades the feature with a warning instead of
//! failing the whole request.
//!
//! Ordering matters and is fixed by the builder: identity, then face
//! conditioning, then guidance controls, then detail, then upscale,
//! then post-processing.

pub mod control;
pub mod detail;
pub mod face;
pub mod identity;
pub mod post;
pub mod upscale;

use fluxforge_core::graph::OutputRef;

/// Current insertion points in the model chain: the diffusion model
/// reference and the text-encoder reference downstream consumers use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelChain {
    pub model: OutputRef,
    pub clip: OutputRef,
}

/// Current insertion points in the conditioning chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CondChain {
    pub positive: OutputRef,
    pub negative: OutputRef,
}
