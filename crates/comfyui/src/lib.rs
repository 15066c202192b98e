//! HTTP client library for the ComfyUI image-generation backend.
//!
//! Wraps workflow submission, history polling, artifact retrieval, and
//! input-image upload over the backend's REST surface, plus the JPEG
//! re-encode step applied to fetched artifacts.

pub mod api;
pub mod encode;
pub mod history;
pub mod job;
