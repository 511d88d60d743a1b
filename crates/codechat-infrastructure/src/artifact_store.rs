//! Filesystem artifact store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use codechat_core::artifact::ArtifactStore;
use codechat_core::error::{CodechatError, Result};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const ARTIFACT_EXTENSION: &str = "b64";
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Stores payloads as timestamp-named files.
///
/// Names use millisecond precision (`20250101T120000123Z.b64`). Two payloads
/// stored within the same millisecond get a `-1`, `-2`, ... suffix; files are
/// opened with `create_new`, so an existing artifact is never overwritten.
#[derive(Debug, Clone, Default)]
pub struct FsArtifactStore;

impl FsArtifactStore {
    pub fn new() -> Self {
        Self
    }

    fn candidate_name(stamp: &str, attempt: u32) -> String {
        if attempt == 0 {
            format!("{stamp}.{ARTIFACT_EXTENSION}")
        } else {
            format!("{stamp}-{attempt}.{ARTIFACT_EXTENSION}")
        }
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn store(&self, payload: &str, dir: &Path) -> Result<PathBuf> {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%3fZ").to_string();

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let path = dir.join(Self::candidate_name(&stamp, attempt));
            let mut file = match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };

            file.write_all(payload.as_bytes()).await?;
            file.flush().await?;
            tracing::debug!(
                "[ArtifactStore] Stored {} bytes at {}",
                payload.len(),
                path.display()
            );
            return Ok(path);
        }

        Err(CodechatError::persistence(format!(
            "no free artifact name for timestamp {} in {}",
            stamp,
            dir.display()
        )))
    }

    async fn load(&self, path: &Path) -> Option<String> {
        match fs::read_to_string(path).await {
            Ok(content) => Some(content),
            Err(e) => {
                tracing::debug!(
                    "[ArtifactStore] Could not load {}: {}",
                    path.display(),
                    e
                );
                None
            }
        }
    }
}
