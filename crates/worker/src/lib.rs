//! HTTP worker: accepts generation requests, drives the assembly and
//! job-execution pipeline, and delivers re-encoded artifacts.

pub mod config;
pub mod error;
pub mod handler;
pub mod routes;
pub mod state;
