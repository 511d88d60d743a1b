//! Artifact store trait.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Result;

/// Persists text-encoded payloads (base64 images) as individual files.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Writes `payload` verbatim to a new timestamp-named file inside `dir`.
    ///
    /// `dir` must already exist; no directories are created.
    async fn store(&self, payload: &str, dir: &Path) -> Result<PathBuf>;

    /// Reads an artifact back as text.
    ///
    /// Returns `None` on any read error: missing or garbage-collected
    /// artifacts are an expected condition for old conversations.
    async fn load(&self, path: &Path) -> Option<String>;
}
