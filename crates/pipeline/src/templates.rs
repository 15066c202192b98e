//! Base workflow template resolution.
//!
//! Templates are backend prompt JSON stored on disk. A name is
//! resolved to `<dir>/<name>.json` across the configured search path;
//! the first hit wins. Each load produces a fresh graph, so requests
//! never share a document.

use std::path::PathBuf;

use fluxforge_core::graph::{GraphError, WorkflowGraph};

/// Errors from template resolution and parsing.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Template '{name}' not found in any of {searched:?}")]
    NotFound {
        name: String,
        searched: Vec<PathBuf>,
    },

    #[error("Failed to read template at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Template at {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Template at {path} is malformed: {source}")]
    Graph {
        path: PathBuf,
        #[source]
        source: GraphError,
    },
}

/// Resolves template names against a search path.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    search_paths: Vec<PathBuf>,
}

impl TemplateStore {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    /// Load a template by name into a fresh graph.
    pub fn load(&self, name: &str) -> Result<WorkflowGraph, TemplateError> {
        for dir in &self.search_paths {
            let path = dir.join(format!("{name}.json"));
            if !path.is_file() {
                continue;
            }

            let text = std::fs::read_to_string(&path).map_err(|source| TemplateError::Io {
                path: path.clone(),
                source,
            })?;
            let value: serde_json::Value =
                serde_json::from_str(&text).map_err(|source| TemplateError::Json {
                    path: path.clone(),
                    source,
                })?;
            let graph =
                WorkflowGraph::from_template(&value).map_err(|source| TemplateError::Graph {
                    path: path.clone(),
                    source,
                })?;

            tracing::debug!(name, path = %path.display(), nodes = graph.len(), "Loaded template");
            return Ok(graph);
        }

        Err(TemplateError::NotFound {
            name: name.to_string(),
            searched: self.search_paths.clone(),
        })
    }
}
