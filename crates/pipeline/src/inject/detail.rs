//! Detail injector: sigma-schedule reshaping during sampling.
//!
//! Unlike the chain injectors this one touches a single edge: it wraps
//! the selected sampler descriptor and rewires only its consumers, so
//! image-path references are never perturbed.

use fluxforge_core::graph::{NodeId, WorkflowGraph};
use fluxforge_core::kind::NodeKind;

/// Wrap the sampler selection in a detail-daemon node.
///
/// No-op when `detail_amount` is zero or negative.
pub fn inject(graph: &mut WorkflowGraph, sampler_select: NodeId, detail_amount: f64) {
    if detail_amount <= 0.0 {
        return;
    }

    let daemon = graph.insert(
        NodeKind::DetailDaemonSampler,
        "Detail Daemon",
        [
            ("sampler", sampler_select.into()),
            ("detail_amount", detail_amount.into()),
            ("start", 0.2.into()),
            ("end", 0.8.into()),
            ("bias", 0.5.into()),
            ("exponent", 1.0.into()),
            ("start_offset", 0i64.into()),
            ("end_offset", 0i64.into()),
            ("fade", 0.0.into()),
            ("smooth", true.into()),
        ],
    );
    graph.rewire_excluding(sampler_select.into(), daemon.into(), &[daemon]);
    tracing::debug!(detail_amount, "Detail daemon injected");
}
