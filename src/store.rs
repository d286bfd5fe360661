use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::error::WallmaskResult;

/// Artifact store seam for the "temp file as message" pattern: stages hand
/// each other keys, and the store maps keys to a shared backing location.
/// Producers check [`contains`](ArtifactStore::contains) before recomputing;
/// that is the whole caching discipline, so keys must be collision-free.
pub trait ArtifactStore: Send + Sync {
    fn path_for(&self, stem: &str) -> PathBuf;
    fn contains(&self, stem: &str) -> bool;
    fn remove(&self, stem: &str);
}

/// Process-scoped temp directory, removed on drop. Covers every exit path of
/// a run, including mid-run task failures unwinding through `?`.
#[derive(Debug)]
pub struct TempStore {
    root: PathBuf,
}

impl TempStore {
    pub fn create() -> WallmaskResult<Self> {
        let root = std::env::temp_dir().join(format!(
            "wallmask_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0)
        ));
        std::fs::create_dir_all(&root)
            .with_context(|| format!("create temp store '{}'", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ArtifactStore for TempStore {
    fn path_for(&self, stem: &str) -> PathBuf {
        self.root.join(stem)
    }

    fn contains(&self, stem: &str) -> bool {
        self.path_for(stem).is_file()
    }

    fn remove(&self, stem: &str) {
        let _ = std::fs::remove_file(self.path_for(stem));
    }
}

impl Drop for TempStore {
    fn drop(&mut self) {
        tracing::debug!(root = %self.root.display(), "removing temp store");
        let _ = std::fs::remove_dir_all(&self.root);
    }
}
