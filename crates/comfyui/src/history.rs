//! Typed view of the ComfyUI history record for one prompt.
//!
//! `GET /history/{prompt_id}` answers `{}` until the prompt reaches a
//! terminal state, then a map from prompt id to an entry carrying the
//! terminal status and the per-node output artifacts. This module
//! deserializes that entry.

use std::collections::BTreeMap;

use serde::Deserialize;

/// Terminal execution record for one prompt.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub status: StatusInfo,
    /// Producing-node id (backend-side string id) to its outputs.
    #[serde(default)]
    pub outputs: BTreeMap<String, NodeOutput>,
}

/// Backend-reported terminal status.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusInfo {
    #[serde(default)]
    pub status_str: String,
    #[serde(default)]
    pub completed: bool,
    /// Structured diagnostic messages; populated on failure.
    #[serde(default)]
    pub messages: Vec<serde_json::Value>,
}

/// Outputs recorded for a single node.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeOutput {
    #[serde(default)]
    pub images: Vec<ArtifactRef>,
}

/// Opaque handle exchanged for raw bytes via the `/view` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArtifactRef {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    /// Backend storage class ("output", "temp", ...).
    #[serde(default = "default_kind", rename = "type")]
    pub kind: String,
}

fn default_kind() -> String {
    "output".to_string()
}

impl HistoryEntry {
    /// Whether the backend reported the execution as failed.
    pub fn is_error(&self) -> bool {
        self.status.status_str == "error"
    }

    /// All image artifacts across output nodes, in node-id order.
    pub fn artifacts(&self) -> Vec<ArtifactRef> {
        self.outputs
            .values()
            .flat_map(|out| out.images.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_success_entry_with_artifacts() {
        let json = r#"{
            "status": { "status_str": "success", "completed": true, "messages": [] },
            "outputs": {
                "16": { "images": [
                    { "filename": "out_00001.png", "subfolder": "", "type": "output" },
                    { "filename": "out_00002.png", "subfolder": "batch", "type": "output" }
                ]},
                "9": { "images": [
                    { "filename": "aux.png" }
                ]}
            }
        }"#;
        let entry: HistoryEntry = serde_json::from_str(json).unwrap();

        assert!(!entry.is_error());
        assert!(entry.status.completed);

        let artifacts = entry.artifacts();
        assert_eq!(artifacts.len(), 3);
        // BTreeMap orders node ids lexicographically: "16" before "9".
        assert_eq!(artifacts[0].filename, "out_00001.png");
        assert_eq!(artifacts[1].subfolder, "batch");
        // Missing type falls back to "output".
        assert_eq!(artifacts[2].kind, "output");
    }

    #[test]
    fn parses_error_entry_with_messages() {
        let json = r#"{
            "status": {
                "status_str": "error",
                "completed": false,
                "messages": [["execution_error", {"node_id": "10", "exception_message": "OOM"}]]
            },
            "outputs": {}
        }"#;
        let entry: HistoryEntry = serde_json::from_str(json).unwrap();

        assert!(entry.is_error());
        assert_eq!(entry.status.messages.len(), 1);
        assert!(entry.artifacts().is_empty());
    }

    #[test]
    fn parses_entry_without_status_block() {
        // Older backend builds omit "status" entirely on success.
        let json = r#"{ "outputs": { "16": { "images": [{ "filename": "a.png" }] } } }"#;
        let entry: HistoryEntry = serde_json::from_str(json).unwrap();
        assert!(!entry.is_error());
        assert_eq!(entry.artifacts().len(), 1);
    }

    #[test]
    fn nodes_without_images_contribute_nothing() {
        let json = r#"{ "outputs": { "7": {} } }"#;
        let entry: HistoryEntry = serde_json::from_str(json).unwrap();
        assert!(entry.artifacts().is_empty());
    }
}
