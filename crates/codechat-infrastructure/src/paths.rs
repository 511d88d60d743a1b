//! Unified path management for codechat configuration and data.
//!
//! ```text
//! ~/.config/codechat/          # Config directory
//! ├── config.toml              # Engine configuration
//! └── logs/                    # Application logs
//!     └── codechat.log.YYYY-MM-DD
//!
//! ~/.local/share/codechat/     # Data directory
//! └── conversations/
//!     └── <conversation-id>/
//!         ├── conversation.json
//!         ├── images/          # Figure artifacts
//!         └── files/           # Generic attachments
//! ```

use std::path::PathBuf;

const APP_DIR: &str = "codechat";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Platform directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Path resolver for codechat.
///
/// The data directory can be overridden (from `StorageConfig::data_dir` or
/// a CLI flag); config and log locations are always platform defaults.
#[derive(Debug, Clone, Default)]
pub struct CodechatPaths {
    data_dir_override: Option<PathBuf>,
}

impl CodechatPaths {
    pub fn new(data_dir_override: Option<PathBuf>) -> Self {
        Self { data_dir_override }
    }

    /// Returns the codechat configuration directory (e.g., `~/.config/codechat/`).
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the path to the main configuration file.
    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Returns the path to the logs directory.
    pub fn logs_dir() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("logs"))
    }

    /// Returns the data directory, honouring the override if one was given.
    pub fn data_dir(&self) -> Result<PathBuf, PathError> {
        if let Some(dir) = &self.data_dir_override {
            return Ok(dir.clone());
        }
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the root under which every conversation gets its own directory.
    pub fn conversations_dir(&self) -> Result<PathBuf, PathError> {
        Ok(self.data_dir()?.join("conversations"))
    }
}
