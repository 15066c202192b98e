//! Model-asset existence checks.
//!
//! The identity injector references a per-request LoRA file that may or
//! may not be present on the backend host; it asks an [`AssetResolver`]
//! and skips itself (logging, never failing the request) when the file
//! is missing. The other weight files the injectors reference ship with
//! the backend image and are not probed. The resolver is read-only and
//! safe to share across requests.

use std::path::PathBuf;

/// Subdirectory under each model root where LoRA weights live.
const LORA_SUBDIR: &str = "loras";

/// Answers "does LoRA asset X exist under any configured path".
pub trait AssetResolver: Send + Sync {
    fn exists(&self, name: &str) -> bool;
}

/// Resolver backed by the filesystem: checks `<root>/loras/<name>`
/// across every configured root.
#[derive(Debug, Clone)]
pub struct DiskAssetResolver {
    roots: Vec<PathBuf>,
}

impl DiskAssetResolver {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }
}

impl AssetResolver for DiskAssetResolver {
    fn exists(&self, name: &str) -> bool {
        self.roots
            .iter()
            .any(|root| root.join(LORA_SUBDIR).join(name).is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_asset_under_any_root() {
        let empty = tempfile::tempdir().unwrap();
        let stocked = tempfile::tempdir().unwrap();
        let lora_dir = stocked.path().join("loras");
        std::fs::create_dir_all(&lora_dir).unwrap();
        std::fs::write(lora_dir.join("face.safetensors"), b"weights").unwrap();
        // A file outside the loras subdirectory is not a hit.
        std::fs::write(stocked.path().join("stray.safetensors"), b"weights").unwrap();

        let resolver = DiskAssetResolver::new(vec![
            empty.path().to_path_buf(),
            stocked.path().to_path_buf(),
        ]);

        assert!(resolver.exists("face.safetensors"));
        assert!(!resolver.exists("other.safetensors"));
        assert!(!resolver.exists("stray.safetensors"));
    }

    #[test]
    fn empty_roots_resolve_nothing() {
        let resolver = DiskAssetResolver::new(Vec::new());
        assert!(!resolver.exists("face.safetensors"));
    }
}
