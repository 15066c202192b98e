//! Core workflow graph document, node taxonomy, and request schema.
//!
//! This crate is a leaf: no internal dependencies. It defines the
//! in-memory representation of a generation workflow ([`graph`]), the
//! closed set of node classes the pipeline manipulates ([`kind`]), and
//! the job request schema shared by the pipeline and worker crates
//! ([`request`]).

pub mod graph;
pub mod kind;
pub mod request;
