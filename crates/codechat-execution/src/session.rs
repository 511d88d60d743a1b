//! Ephemeral execution sessions and the manager that drives one run.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use codechat_core::ArtifactStore;
use codechat_core::error::{CodechatError, Result};
use codechat_core::execution::ExecutionResult;
use tracing::Instrument;

use crate::backend::{BackendEndpoint, BackendProvider};
use crate::protocol::{BackendMessage, format_error};

/// Opens execution sessions against a ready backend.
#[async_trait]
pub trait KernelClient: Send + Sync {
    /// Creates a new session. Failures are `SessionTransport` errors.
    async fn open_session(&self, endpoint: &BackendEndpoint) -> Result<Box<dyn KernelSession>>;
}

/// One backend session, used for exactly one submission and then shut down.
#[async_trait]
pub trait KernelSession: Send {
    /// Backend-assigned session id.
    fn id(&self) -> &str;

    /// Submits `code` as a single unit.
    async fn execute(&mut self, code: &str) -> Result<()>;

    /// Next classified message for the submission, `None` once it is fully processed.
    async fn next_message(&mut self) -> Result<Option<BackendMessage>>;

    /// Releases the session on the backend.
    async fn shutdown(&mut self) -> Result<()>;
}

/// Runs code in a fresh session and collects its output and figures.
pub struct SessionManager {
    backend: Arc<dyn BackendProvider>,
    client: Arc<dyn KernelClient>,
    artifacts: Arc<dyn ArtifactStore>,
    timeout: Option<Duration>,
}

impl SessionManager {
    pub fn new(
        backend: Arc<dyn BackendProvider>,
        client: Arc<dyn KernelClient>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            backend,
            client,
            artifacts,
            timeout: None,
        }
    }

    /// Bounds every run; without it a run waits for the backend indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Executes `code` and returns the collected result.
    ///
    /// Images are written into `figures_dir` as they arrive. The session is
    /// shut down whatever the outcome; a failing shutdown is logged and the
    /// collected result is still returned.
    ///
    /// # Errors
    ///
    /// - `BackendUnavailable` before any session is opened when the backend is not ready
    /// - `SessionTransport` when the session cannot be created or the stream breaks
    /// - `ExecutionTimedOut` when a configured timeout elapses
    pub async fn run(&self, figures_dir: &Path, code: &str) -> Result<ExecutionResult> {
        let endpoint = self.backend.endpoint()?;
        let mut session = self.client.open_session(&endpoint).await?;

        let span = tracing::info_span!("execution", session_id = %session.id());
        async move {
            tracing::debug!("[Session] Submitting {} bytes of code", code.len());

            let collected = match self.timeout {
                Some(limit) => {
                    match tokio::time::timeout(limit, self.collect(session.as_mut(), figures_dir, code))
                        .await
                    {
                        Ok(collected) => collected,
                        Err(_) => Err(CodechatError::ExecutionTimedOut {
                            seconds: limit.as_secs(),
                        }),
                    }
                }
                None => self.collect(session.as_mut(), figures_dir, code).await,
            };

            if let Err(e) = session.shutdown().await {
                tracing::warn!("[Session] Failed to shut down session: {}", e);
            }

            match &collected {
                Ok(result) => tracing::info!(
                    "[Session] Run finished ({} figure(s), output: {})",
                    result.figure_count(),
                    result.output.is_some()
                ),
                Err(e) => tracing::warn!("[Session] Run failed: {}", e),
            }
            collected
        }
        .instrument(span)
        .await
    }

    async fn collect(
        &self,
        session: &mut dyn KernelSession,
        figures_dir: &Path,
        code: &str,
    ) -> Result<ExecutionResult> {
        session.execute(code).await?;

        let mut output = String::new();
        let mut figure_paths = Vec::new();

        while let Some(message) = session.next_message().await? {
            match message {
                BackendMessage::TextOutput { text } => output.push_str(&text),
                BackendMessage::DisplayPayload { mime, data } => {
                    let path = self.artifacts.store(&data, figures_dir).await?;
                    tracing::debug!("[Session] Stored {} figure at {}", mime, path.display());
                    figure_paths.push(path.to_string_lossy().into_owned());
                }
                BackendMessage::ErrorNotification { name, detail } => {
                    output.push_str(&format_error(&name, &detail));
                }
            }
        }

        Ok(ExecutionResult::new(code, output, figure_paths))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::backend::BackendCredential;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::TempDir;

    pub(crate) struct ReadyBackend(pub bool);

    impl BackendProvider for ReadyBackend {
        fn endpoint(&self) -> Result<BackendEndpoint> {
            if self.0 {
                Ok(BackendEndpoint {
                    host: "127.0.0.1".into(),
                    port: 8888,
                    credential: BackendCredential::from_secret("secret"),
                })
            } else {
                Err(CodechatError::backend_unavailable("not started"))
            }
        }
    }

    #[derive(Clone)]
    pub(crate) enum Step {
        Message(BackendMessage),
        Drop,
        Hang,
    }

    #[derive(Default)]
    pub(crate) struct ScriptedClient {
        pub steps: Mutex<Vec<Step>>,
        pub opened: AtomicUsize,
        pub shut_down: Arc<AtomicBool>,
        pub fail_open: bool,
        pub fail_shutdown: bool,
    }

    impl ScriptedClient {
        pub fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: Mutex::new(steps),
                ..Default::default()
            }
        }
    }

    struct ScriptedSession {
        steps: VecDeque<Step>,
        shut_down: Arc<AtomicBool>,
        fail_shutdown: bool,
    }

    #[async_trait]
    impl KernelClient for ScriptedClient {
        async fn open_session(&self, _endpoint: &BackendEndpoint) -> Result<Box<dyn KernelSession>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            if self.fail_open {
                return Err(CodechatError::transport("kernel create refused"));
            }
            Ok(Box::new(ScriptedSession {
                steps: self.steps.lock().unwrap().clone().into(),
                shut_down: self.shut_down.clone(),
                fail_shutdown: self.fail_shutdown,
            }))
        }
    }

    #[async_trait]
    impl KernelSession for ScriptedSession {
        fn id(&self) -> &str {
            "kernel-1"
        }

        async fn execute(&mut self, _code: &str) -> Result<()> {
            Ok(())
        }

        async fn next_message(&mut self) -> Result<Option<BackendMessage>> {
            match self.steps.pop_front() {
                Some(Step::Message(message)) => Ok(Some(message)),
                Some(Step::Drop) => Err(CodechatError::transport("connection reset")),
                Some(Step::Hang) => {
                    std::future::pending::<()>().await;
                    Ok(None)
                }
                None => Ok(None),
            }
        }

        async fn shutdown(&mut self) -> Result<()> {
            self.shut_down.store(true, Ordering::SeqCst);
            if self.fail_shutdown {
                Err(CodechatError::transport("delete failed"))
            } else {
                Ok(())
            }
        }
    }

    /// In-memory artifact store numbering its files.
    #[derive(Default)]
    pub(crate) struct MemoryArtifacts {
        pub stored: Mutex<Vec<(PathBuf, String)>>,
    }

    #[async_trait]
    impl ArtifactStore for MemoryArtifacts {
        async fn store(&self, payload: &str, dir: &Path) -> Result<PathBuf> {
            let mut stored = self.stored.lock().unwrap();
            let path = dir.join(format!("{}.b64", stored.len()));
            stored.push((path.clone(), payload.to_string()));
            Ok(path)
        }

        async fn load(&self, path: &Path) -> Option<String> {
            let stored = self.stored.lock().unwrap();
            stored.iter().find(|(p, _)| p == path).map(|(_, d)| d.clone())
        }
    }

    fn manager(ready: bool, client: Arc<ScriptedClient>) -> (SessionManager, Arc<MemoryArtifacts>) {
        let artifacts = Arc::new(MemoryArtifacts::default());
        let manager = SessionManager::new(Arc::new(ReadyBackend(ready)), client, artifacts.clone());
        (manager, artifacts)
    }

    #[tokio::test]
    async fn test_text_output_in_arrival_order() {
        let client = Arc::new(ScriptedClient::new(vec![
            Step::Message(BackendMessage::text("a\n")),
            Step::Message(BackendMessage::text("b\n")),
        ]));
        let (manager, _) = manager(true, client.clone());
        let dir = TempDir::new().unwrap();

        let result = manager.run(dir.path(), "print('a'); print('b')").await.unwrap();
        assert_eq!(result.code, "print('a'); print('b')");
        assert_eq!(result.output.as_deref(), Some("a\nb\n"));
        assert!(result.figure_paths.is_none());
        assert!(client.shut_down.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_figures_are_stored_in_order() {
        let client = Arc::new(ScriptedClient::new(vec![
            Step::Message(BackendMessage::image("image/png", "first")),
            Step::Message(BackendMessage::text("done")),
            Step::Message(BackendMessage::image("image/png", "second")),
        ]));
        let (manager, artifacts) = manager(true, client);
        let dir = TempDir::new().unwrap();

        let result = manager.run(dir.path(), "plot()").await.unwrap();
        let paths = result.figure_paths.unwrap();
        assert_eq!(paths.len(), 2);

        let stored = artifacts.stored.lock().unwrap();
        assert_eq!(stored[0].1, "first");
        assert_eq!(stored[1].1, "second");
        assert_eq!(paths[0], stored[0].0.to_string_lossy());
        assert_eq!(paths[1], stored[1].0.to_string_lossy());
    }

    #[tokio::test]
    async fn test_error_is_folded_into_output() {
        let client = Arc::new(ScriptedClient::new(vec![Step::Message(BackendMessage::error(
            "ZeroDivisionError",
            "division by zero",
        ))]));
        let (manager, _) = manager(true, client);
        let dir = TempDir::new().unwrap();

        let result = manager.run(dir.path(), "1/0").await.unwrap();
        assert_eq!(result.output.as_deref(), Some("ZeroDivisionError: division by zero"));
    }

    #[tokio::test]
    async fn test_silent_code_has_no_output() {
        let client = Arc::new(ScriptedClient::new(Vec::new()));
        let (manager, _) = manager(true, client);
        let dir = TempDir::new().unwrap();

        let result = manager.run(dir.path(), "x = 1").await.unwrap();
        assert!(result.output.is_none());
        assert!(result.figure_paths.is_none());
    }

    #[tokio::test]
    async fn test_backend_unavailable_opens_no_session() {
        let client = Arc::new(ScriptedClient::new(Vec::new()));
        let (manager, _) = manager(false, client.clone());
        let dir = TempDir::new().unwrap();

        let err = manager.run(dir.path(), "print(1)").await.unwrap_err();
        assert!(err.is_backend_unavailable());
        assert_eq!(client.opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_session_create_failure() {
        let client = Arc::new(ScriptedClient {
            fail_open: true,
            ..Default::default()
        });
        let (manager, _) = manager(true, client);
        let dir = TempDir::new().unwrap();

        let err = manager.run(dir.path(), "print(1)").await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_shutdown_failure_still_returns_result() {
        let client = Arc::new(ScriptedClient {
            steps: Mutex::new(vec![Step::Message(BackendMessage::text("hi"))]),
            fail_shutdown: true,
            ..Default::default()
        });
        let (manager, _) = manager(true, client);
        let dir = TempDir::new().unwrap();

        let result = manager.run(dir.path(), "print('hi')").await.unwrap();
        assert_eq!(result.output.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn test_transport_drop_keeps_written_figures() {
        let client = Arc::new(ScriptedClient::new(vec![
            Step::Message(BackendMessage::image("image/png", "partial")),
            Step::Drop,
        ]));
        let (manager, artifacts) = manager(true, client.clone());
        let dir = TempDir::new().unwrap();

        let err = manager.run(dir.path(), "plot()").await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(artifacts.stored.lock().unwrap().len(), 1);
        assert!(client.shut_down.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_shuts_session_down() {
        let client = Arc::new(ScriptedClient::new(vec![
            Step::Message(BackendMessage::text("working")),
            Step::Hang,
        ]));
        let (manager, _) = manager(true, client.clone());
        let manager = manager.with_timeout(Some(Duration::from_secs(5)));
        let dir = TempDir::new().unwrap();

        let err = manager.run(dir.path(), "while True: pass").await.unwrap_err();
        assert_eq!(err, CodechatError::ExecutionTimedOut { seconds: 5 });
        assert!(client.shut_down.load(Ordering::SeqCst));
    }
}
