//! Atomic JSON document writes.
//!
//! A document is written to a hidden temp file next to the target, synced,
//! and renamed over the target. Readers therefore see either the previous
//! or the new document, never a partially written one.

use serde::{Serialize, de::DeserializeOwned};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Errors that can occur during atomic JSON operations.
#[derive(Debug)]
pub enum AtomicJsonError {
    /// File I/O error.
    IoError(std::io::Error),
    /// The file exists but does not hold a valid document.
    ParseError(serde_json::Error),
    /// Serialization error.
    SerError(serde_json::Error),
}

impl std::fmt::Display for AtomicJsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AtomicJsonError::IoError(e) => write!(f, "I/O error: {}", e),
            AtomicJsonError::ParseError(e) => write!(f, "JSON parse error: {}", e),
            AtomicJsonError::SerError(e) => write!(f, "JSON serialization error: {}", e),
        }
    }
}

impl std::error::Error for AtomicJsonError {}

impl From<std::io::Error> for AtomicJsonError {
    fn from(e: std::io::Error) -> Self {
        AtomicJsonError::IoError(e)
    }
}

impl From<AtomicJsonError> for codechat_core::CodechatError {
    fn from(e: AtomicJsonError) -> Self {
        match e {
            AtomicJsonError::IoError(io) => io.into(),
            AtomicJsonError::ParseError(json) | AtomicJsonError::SerError(json) => json.into(),
        }
    }
}

/// A handle to a JSON document that is always replaced atomically.
pub struct AtomicJsonFile<T> {
    path: PathBuf,
    _phantom: PhantomData<T>,
}

impl<T> AtomicJsonFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _phantom: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads and deserializes the document.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(T))`: Successfully loaded and deserialized
    /// - `Ok(None)`: File doesn't exist
    /// - `Err(ParseError)`: File exists but is not a valid document
    /// - `Err(IoError)`: File could not be read
    pub async fn load(&self) -> Result<Option<T>, AtomicJsonError> {
        let content = match fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        // Undecodable bytes are a parse failure like any other malformed content
        let data = serde_json::from_slice(&content).map_err(AtomicJsonError::ParseError)?;
        Ok(Some(data))
    }

    /// Saves data atomically. The parent directory must exist.
    pub async fn save(&self, data: &T) -> Result<(), AtomicJsonError> {
        let json = serde_json::to_string_pretty(data).map_err(AtomicJsonError::SerError)?;

        let tmp_path = self.temp_path()?;
        let mut tmp_file = fs::File::create(&tmp_path).await?;
        tmp_file.write_all(json.as_bytes()).await?;

        // Ensure data is written to disk before the rename publishes it
        tmp_file.sync_all().await?;
        drop(tmp_file);

        if let Err(e) = fs::rename(&tmp_path, &self.path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        Ok(())
    }

    /// Gets a temporary file path for atomic writes.
    fn temp_path(&self) -> Result<PathBuf, AtomicJsonError> {
        let (Some(parent), Some(file_name)) = (self.path.parent(), self.path.file_name()) else {
            return Err(AtomicJsonError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Path has no parent directory or file name",
            )));
        };

        let tmp_name = format!(".{}.tmp", file_name.to_string_lossy());
        Ok(parent.join(tmp_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
        count: u32,
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let file = AtomicJsonFile::<Doc>::new(temp_dir.path().join("doc.json"));

        let doc = Doc {
            name: "test".to_string(),
            count: 42,
        };
        file.save(&doc).await.unwrap();

        assert_eq!(file.load().await.unwrap(), Some(doc));
        // Verify no temp file left behind
        assert!(!temp_dir.path().join(".doc.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_load_nonexistent_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = AtomicJsonFile::<Doc>::new(temp_dir.path().join("missing.json"));
        assert!(file.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_garbage_is_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc.json");
        std::fs::write(&path, "{ not json").unwrap();

        let file = AtomicJsonFile::<Doc>::new(path);
        assert!(matches!(
            file.load().await,
            Err(AtomicJsonError::ParseError(_))
        ));
    }

    #[tokio::test]
    async fn test_load_invalid_utf8_is_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("doc.json");
        std::fs::write(&path, b"\xff\xfe{garbage").unwrap();

        let file = AtomicJsonFile::<Doc>::new(path);
        assert!(matches!(
            file.load().await,
            Err(AtomicJsonError::ParseError(_))
        ));
    }

    #[tokio::test]
    async fn test_save_overwrites_whole_document() {
        let temp_dir = TempDir::new().unwrap();
        let file = AtomicJsonFile::<Doc>::new(temp_dir.path().join("doc.json"));

        file.save(&Doc {
            name: "a much longer first name".into(),
            count: 1,
        })
        .await
        .unwrap();
        file.save(&Doc {
            name: "b".into(),
            count: 2,
        })
        .await
        .unwrap();

        let loaded = file.load().await.unwrap().unwrap();
        assert_eq!(loaded.name, "b");
        assert_eq!(loaded.count, 2);
    }

    #[tokio::test]
    async fn test_save_into_missing_dir_fails() {
        let temp_dir = TempDir::new().unwrap();
        let file = AtomicJsonFile::<Doc>::new(temp_dir.path().join("nope").join("doc.json"));
        let result = file
            .save(&Doc {
                name: "x".into(),
                count: 0,
            })
            .await;
        assert!(matches!(result, Err(AtomicJsonError::IoError(_))));
    }
}
