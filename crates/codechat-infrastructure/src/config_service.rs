//! Configuration service implementation.
//!
//! Loads the engine configuration from `config.toml`
//! (`~/.config/codechat/config.toml` unless a path is given).

use std::path::{Path, PathBuf};

use codechat_core::config::EngineConfig;
use codechat_core::error::{CodechatError, Result};

use crate::paths::CodechatPaths;

/// Loads `EngineConfig` from a TOML file.
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: PathBuf,
}

impl ConfigService {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Uses the platform default config file location.
    pub fn default_location() -> Result<Self> {
        let path = CodechatPaths::config_file().map_err(|e| CodechatError::config(e.to_string()))?;
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and parses the configuration.
    ///
    /// A missing or empty file yields defaults; a file that exists but is
    /// not valid TOML is a `Config` error rather than a silent fallback.
    pub fn load(&self) -> Result<EngineConfig> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(
                    "[Config] No config file at {}, using defaults",
                    self.path.display()
                );
                return Ok(EngineConfig::default());
            }
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(EngineConfig::default());
        }

        toml::from_str(&content).map_err(|e| {
            CodechatError::config(format!(
                "Failed to parse {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let service = ConfigService::new(temp_dir.path().join("config.toml"));
        assert_eq!(service.load().unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_loads_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [backend]
            port = 8899
            kernel_name = "ir"

            [replay]
            enabled = false
            "#,
        )
        .unwrap();

        let config = ConfigService::new(&path).load().unwrap();
        assert_eq!(config.backend.port, 8899);
        assert_eq!(config.backend.kernel_name, "ir");
        assert!(!config.replay.enabled);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[backend\nport = ").unwrap();

        let err = ConfigService::new(&path).load().unwrap_err();
        assert!(matches!(err, CodechatError::Config(_)));
    }
}
