//! Workflow assembly: templates, feature injectors, parameter pass,
//! and the pipeline builder.
//!
//! A request is turned into a submittable graph by loading a base
//! template, running the applicable feature injectors in data-flow
//! order, sweeping request literals over recognized node kinds, and
//! validating the result. Everything here is pure graph manipulation;
//! no I/O beyond template files and asset-existence checks.

pub mod assets;
pub mod builder;
pub mod inject;
pub mod params;
pub mod templates;
