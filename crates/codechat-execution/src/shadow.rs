//! Shadow replay of executed code through a bare interpreter.
//!
//! Execution sessions are sandboxed kernels; code that writes files meant
//! for the user only has that effect when run again by a plain interpreter.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use codechat_core::config::ReplayConfig;
use codechat_core::error::{CodechatError, Result};
use tokio::process::Command;

/// Captured output of a successful replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Re-runs code outside the execution backend.
#[async_trait]
pub trait Replayer: Send + Sync {
    /// Rejects with `ReplayFailed` carrying both streams on a nonzero exit.
    async fn replay(&self, code: &str, conversation_id: &str) -> Result<ReplayOutput>;
}

/// Runs code through the configured interpreter from a temp script file.
#[derive(Debug, Clone)]
pub struct ShadowExecutor {
    interpreter: String,
    temp_dir: PathBuf,
    working_dir: Option<PathBuf>,
}

impl ShadowExecutor {
    pub fn new(interpreter: impl Into<String>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            temp_dir: temp_dir.into(),
            working_dir: None,
        }
    }

    pub fn from_config(config: &ReplayConfig) -> Self {
        let temp_dir = config.temp_dir.clone().unwrap_or_else(std::env::temp_dir);
        Self {
            interpreter: config.interpreter.clone(),
            temp_dir,
            working_dir: config.working_dir.clone(),
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Script location for a conversation, stable across replays.
    ///
    /// Only UUID ids are accepted, so the script always lands directly in
    /// the temp directory.
    pub fn script_path(&self, conversation_id: &str) -> Result<PathBuf> {
        uuid::Uuid::parse_str(conversation_id)
            .map_err(|_| CodechatError::conversation_not_found(conversation_id))?;
        Ok(self
            .temp_dir
            .join(format!("codechat-replay-{}.py", conversation_id)))
    }

    async fn run_script(&self, script: &PathBuf) -> Result<ReplayOutput> {
        let mut command = Command::new(&self.interpreter);
        command
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let output = command.output().await.map_err(|e| CodechatError::ReplayFailed {
            stdout: String::new(),
            stderr: format!("failed to launch '{}': {}", self.interpreter, e),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.success() {
            Ok(ReplayOutput { stdout, stderr })
        } else {
            Err(CodechatError::ReplayFailed { stdout, stderr })
        }
    }
}

#[async_trait]
impl Replayer for ShadowExecutor {
    async fn replay(&self, code: &str, conversation_id: &str) -> Result<ReplayOutput> {
        let script = self.script_path(conversation_id)?;

        let outcome = match tokio::fs::write(&script, code).await {
            Ok(()) => self.run_script(&script).await,
            Err(e) => Err(e.into()),
        };

        // Removed on every path, including a failed write
        if let Err(e) = tokio::fs::remove_file(&script).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    "[Replay] Failed to remove {}: {}",
                    script.display(),
                    e
                );
            }
        }

        outcome
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CONVERSATION: &str = "7a0c1e9e-3f55-4a3e-9a8c-2f0b7f0d8e11";

    #[tokio::test]
    async fn test_successful_replay() {
        let temp = TempDir::new().unwrap();
        let executor = ShadowExecutor::new("sh", temp.path());

        let output = executor.replay("echo hello", CONVERSATION).await.unwrap();
        assert_eq!(output.stdout, "hello\n");
        assert!(output.stderr.is_empty());
        assert!(!executor.script_path(CONVERSATION).unwrap().exists());
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_replay_failed() {
        let temp = TempDir::new().unwrap();
        let executor = ShadowExecutor::new("sh", temp.path());

        let err = executor
            .replay("echo partial; echo boom >&2; exit 2", CONVERSATION)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            CodechatError::ReplayFailed {
                stdout: "partial\n".into(),
                stderr: "boom\n".into(),
            }
        );
        assert!(!executor.script_path(CONVERSATION).unwrap().exists());
    }

    #[tokio::test]
    async fn test_side_effects_land_in_working_dir() {
        let temp = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        let executor = ShadowExecutor::new("sh", temp.path()).with_working_dir(work.path());

        executor
            .replay("echo data > output.csv", CONVERSATION)
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(work.path().join("output.csv")).unwrap(),
            "data\n"
        );
    }

    #[tokio::test]
    async fn test_missing_interpreter() {
        let temp = TempDir::new().unwrap();
        let executor = ShadowExecutor::new("codechat-no-such-interpreter", temp.path());

        let err = executor.replay("print(1)", CONVERSATION).await.unwrap_err();
        assert!(matches!(err, CodechatError::ReplayFailed { .. }));
        assert!(!executor.script_path(CONVERSATION).unwrap().exists());
    }

    #[test]
    fn test_script_path_is_conversation_scoped() {
        let executor = ShadowExecutor::new("python3", "/tmp");
        assert_eq!(
            executor.script_path(CONVERSATION).unwrap(),
            PathBuf::from(format!("/tmp/codechat-replay-{}.py", CONVERSATION))
        );
    }

    #[tokio::test]
    async fn test_foreign_conversation_id_never_touches_disk() {
        let root = TempDir::new().unwrap();
        let temp = root.path().join("replays");
        std::fs::create_dir(&temp).unwrap();
        let executor = ShadowExecutor::new("sh", &temp);

        for id in ["../escape", "../../x/y", "abc", ""] {
            assert!(matches!(
                executor.script_path(id),
                Err(CodechatError::ConversationNotFound { .. })
            ));
            let err = executor.replay("touch marker", id).await.unwrap_err();
            assert!(matches!(err, CodechatError::ConversationNotFound { .. }));
        }

        assert_eq!(std::fs::read_dir(&temp).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_from_config_defaults_to_system_temp() {
        let executor = ShadowExecutor::from_config(&ReplayConfig::default());
        assert!(
            executor
                .script_path(CONVERSATION)
                .unwrap()
                .starts_with(std::env::temp_dir())
        );
    }
}
