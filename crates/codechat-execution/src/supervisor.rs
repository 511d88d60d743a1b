//! Supervision of the long-lived interpreter backend process.
//!
//! The supervisor resolves the backend executable once, spawns it with a
//! freshly generated credential, and declares it ready only after the
//! readiness sentinel has been seen on stdout. Stderr is drained for
//! diagnostics and never inspected. A monitor task owns the child and flips
//! the state to `Stopped` when the process exits, whether on request or not.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use codechat_core::config::BackendConfig;
use codechat_core::error::{CodechatError, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, oneshot, watch};
use tokio::task::JoinHandle;

use crate::backend::{BackendCredential, BackendEndpoint, BackendProvider, BackendState};
use crate::env;

/// Owns the backend process and its lifecycle state.
///
/// Construct exactly one per application run and share it behind an `Arc`.
pub struct ProcessSupervisor {
    config: BackendConfig,
    credential: BackendCredential,
    state: Arc<watch::Sender<BackendState>>,
    running: Mutex<Option<RunningBackend>>,
}

struct RunningBackend {
    shutdown_tx: Option<oneshot::Sender<()>>,
    monitor: JoinHandle<()>,
    io_tasks: Vec<JoinHandle<()>>,
}

impl RunningBackend {
    /// Kills the process (if still alive) and waits for the monitor to observe the exit.
    async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.monitor).await {
            tracing::warn!("[Supervisor] Monitor task failed: {}", e);
        }
        for task in self.io_tasks {
            task.abort();
        }
    }
}

/// Hides the credential and port in forwarded backend output.
#[derive(Clone)]
struct Redactor {
    token: String,
    port: String,
}

impl Redactor {
    fn apply(&self, line: &str) -> String {
        line.replace(&self.token, "[redacted]")
            .replace(&self.port, ":[port]")
    }
}

impl ProcessSupervisor {
    /// Creates a supervisor with a freshly generated credential. Nothing is spawned yet.
    pub fn new(config: BackendConfig) -> Self {
        let (state, _) = watch::channel(BackendState::NotStarted);
        Self {
            config,
            credential: BackendCredential::generate(),
            state: Arc::new(state),
            running: Mutex::new(None),
        }
    }

    pub fn state(&self) -> BackendState {
        *self.state.borrow()
    }

    /// Observes lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<BackendState> {
        self.state.subscribe()
    }

    /// Starts the backend and resolves once its readiness sentinel was observed.
    ///
    /// A no-op while the backend is already ready. After the backend stopped
    /// (crash or `stop()`), a fresh process is launched with the same
    /// credential and port.
    ///
    /// # Errors
    ///
    /// `BackendUnavailable` if the executable cannot be located, fails to
    /// launch, exits before becoming ready, or misses the startup timeout.
    pub async fn start(&self) -> Result<()> {
        let mut running = self.running.lock().await;

        if self.state() == BackendState::Ready {
            tracing::debug!("[Supervisor] Backend already ready, start is a no-op");
            return Ok(());
        }

        // A backend that died on its own leaves its monitor behind
        if let Some(previous) = running.take() {
            previous.shutdown().await;
        }

        self.state.send_replace(BackendState::Starting);

        match self.launch().await {
            Ok(backend) => {
                *running = Some(backend);
                Ok(())
            }
            Err(e) => {
                self.state.send_replace(BackendState::Stopped);
                tracing::error!("[Supervisor] Backend failed to start: {}", e);
                Err(e)
            }
        }
    }

    async fn launch(&self) -> Result<RunningBackend> {
        let executable = which::which(&self.config.program).map_err(|e| {
            CodechatError::backend_unavailable(format!(
                "cannot locate backend executable '{}': {}",
                self.config.program, e
            ))
        })?;
        tracing::info!(
            "[Supervisor] Launching backend from {}",
            executable.display()
        );

        let mut command = Command::new(&executable);
        command
            .args(self.config.rendered_args(self.credential.expose()))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(path) = env::path_for_executable(&executable) {
            command.env("PATH", path);
        }

        let mut child = command.spawn().map_err(|e| {
            CodechatError::backend_unavailable(format!("failed to launch backend: {}", e))
        })?;
        let pid = child.id();

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(CodechatError::internal("backend stdio was not captured"));
        };

        let redactor = Redactor {
            token: self.credential.expose().to_string(),
            port: format!(":{}", self.config.port),
        };
        let (ready_tx, ready_rx) = oneshot::channel();
        let io_tasks = vec![
            tokio::spawn(watch_stdout(
                stdout,
                self.config.rendered_sentinel(),
                redactor.clone(),
                ready_tx,
            )),
            tokio::spawn(drain_stderr(stderr, redactor)),
        ];

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let monitor = tokio::spawn(monitor_process(child, shutdown_rx, self.state.clone()));

        let backend = RunningBackend {
            shutdown_tx: Some(shutdown_tx),
            monitor,
            io_tasks,
        };

        let startup_timeout = Duration::from_secs(self.config.startup_timeout_secs);
        let failure = match tokio::time::timeout(startup_timeout, ready_rx).await {
            Ok(Ok(())) => {
                // The monitor may already have seen the process exit
                let promoted = self.state.send_if_modified(|state| {
                    if *state == BackendState::Starting {
                        *state = BackendState::Ready;
                        true
                    } else {
                        false
                    }
                });
                if promoted {
                    tracing::info!("[Supervisor] Backend ready (pid {:?})", pid);
                    return Ok(backend);
                }
                "backend exited right after signalling readiness".to_string()
            }
            Ok(Err(_)) => "backend exited before becoming ready".to_string(),
            Err(_) => format!(
                "backend did not become ready within {}s",
                self.config.startup_timeout_secs
            ),
        };

        backend.shutdown().await;
        Err(CodechatError::backend_unavailable(failure))
    }

    /// Stops the backend and waits for the process to exit.
    ///
    /// Returns immediately when nothing is running.
    pub async fn stop(&self) -> Result<()> {
        let Some(backend) = self.running.lock().await.take() else {
            return Ok(());
        };

        tracing::info!("[Supervisor] Stopping backend");
        backend.shutdown().await;
        Ok(())
    }
}

impl BackendProvider for ProcessSupervisor {
    fn endpoint(&self) -> Result<BackendEndpoint> {
        match self.state() {
            BackendState::Ready => Ok(BackendEndpoint {
                host: self.config.host.clone(),
                port: self.config.port,
                credential: self.credential.clone(),
            }),
            other => Err(CodechatError::backend_unavailable(format!(
                "backend is not ready (state: {:?})",
                other
            ))),
        }
    }
}

async fn monitor_process(
    mut child: Child,
    shutdown_rx: oneshot::Receiver<()>,
    state: Arc<watch::Sender<BackendState>>,
) {
    tokio::select! {
        status = child.wait() => {
            let was_ready = *state.borrow() == BackendState::Ready;
            match status {
                Ok(status) if was_ready => {
                    tracing::error!("[Supervisor] Backend exited unexpectedly ({})", status);
                }
                Ok(status) => {
                    tracing::debug!("[Supervisor] Backend exited during startup ({})", status);
                }
                Err(e) => {
                    tracing::error!("[Supervisor] Failed to wait for backend: {}", e);
                }
            }
        }
        // Also fires when the sender is dropped
        _ = shutdown_rx => {
            if let Err(e) = child.kill().await {
                tracing::warn!("[Supervisor] Failed to kill backend: {}", e);
            }
            tracing::info!("[Supervisor] Backend stopped");
        }
    }

    state.send_replace(BackendState::Stopped);
}

/// Reads one line, decoding invalid UTF-8 lossily. `None` at end of stream.
async fn next_lossy_line<R>(
    reader: &mut BufReader<R>,
    buf: &mut Vec<u8>,
) -> std::io::Result<Option<String>>
where
    R: AsyncRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(buf.as_slice());
    Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
}

async fn watch_stdout<R>(
    stdout: R,
    sentinel: String,
    redactor: Redactor,
    ready_tx: oneshot::Sender<()>,
) where
    R: AsyncRead + Unpin,
{
    let mut ready_tx = Some(ready_tx);
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();

    loop {
        match next_lossy_line(&mut reader, &mut buf).await {
            Ok(Some(line)) => {
                if ready_tx.is_some() && line.contains(&sentinel) {
                    if let Some(tx) = ready_tx.take() {
                        let _ = tx.send(());
                    }
                }
                tracing::debug!("[Backend stdout] {}", redactor.apply(&line));
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!("[Supervisor] Stopped reading backend stdout: {}", e);
                break;
            }
        }
    }
}

async fn drain_stderr<R>(stderr: R, redactor: Redactor)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    while let Ok(Some(line)) = next_lossy_line(&mut reader, &mut buf).await {
        tracing::debug!("[Backend stderr] {}", redactor.apply(&line));
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    const PORT: u16 = 45123;

    fn shell_backend(script: &str) -> BackendConfig {
        BackendConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            host: "127.0.0.1".to_string(),
            port: PORT,
            ready_sentinel: "listening on 127.0.0.1:{port}".to_string(),
            startup_timeout_secs: 10,
            kernel_name: "python3".to_string(),
        }
    }

    async fn wait_for_state(supervisor: &ProcessSupervisor, wanted: BackendState) {
        let mut rx = supervisor.subscribe();
        tokio::time::timeout(Duration::from_secs(10), rx.wait_for(|s| *s == wanted))
            .await
            .expect("state transition timed out")
            .expect("state channel closed");
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let supervisor = ProcessSupervisor::new(shell_backend(
            "echo booting; echo 'listening on 127.0.0.1:{port}'; exec sleep 30",
        ));
        assert_eq!(supervisor.state(), BackendState::NotStarted);
        assert!(supervisor.endpoint().unwrap_err().is_backend_unavailable());

        supervisor.start().await.unwrap();
        assert_eq!(supervisor.state(), BackendState::Ready);

        let endpoint = supervisor.endpoint().unwrap();
        assert_eq!(endpoint.port, PORT);
        assert_eq!(endpoint.host, "127.0.0.1");

        // Second start while ready is a no-op with the same credential
        supervisor.start().await.unwrap();
        assert_eq!(supervisor.endpoint().unwrap().credential, endpoint.credential);

        supervisor.stop().await.unwrap();
        assert_eq!(supervisor.state(), BackendState::Stopped);
        assert!(supervisor.endpoint().unwrap_err().is_backend_unavailable());
    }

    #[tokio::test]
    async fn test_undecodable_output_before_sentinel() {
        let supervisor = ProcessSupervisor::new(shell_backend(
            r"printf '\377\376 warn\n'; printf '\377 err\n' >&2; echo 'listening on 127.0.0.1:{port}'; exec sleep 30",
        ));

        supervisor.start().await.unwrap();
        assert_eq!(supervisor.state(), BackendState::Ready);
        supervisor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_lossy_line_reader() {
        let input: &[u8] = b"\xff\xfe bad\r\nready\nlast";
        let mut reader = BufReader::new(input);
        let mut buf = Vec::new();

        let first = next_lossy_line(&mut reader, &mut buf).await.unwrap().unwrap();
        assert!(first.ends_with(" bad"));
        assert!(first.contains('\u{FFFD}'));
        assert_eq!(next_lossy_line(&mut reader, &mut buf).await.unwrap().as_deref(), Some("ready"));
        assert_eq!(next_lossy_line(&mut reader, &mut buf).await.unwrap().as_deref(), Some("last"));
        assert_eq!(next_lossy_line(&mut reader, &mut buf).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_credential_is_passed_through_args() {
        let mut config = shell_backend(
            r#"test -n "$1" && echo "listening on 127.0.0.1:{port}"; exec sleep 30"#,
        );
        config.args.push("sh".to_string());
        config.args.push("{token}".to_string());
        let supervisor = ProcessSupervisor::new(config);

        supervisor.start().await.unwrap();
        supervisor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let mut config = shell_backend("true");
        config.program = "codechat-no-such-backend-binary".to_string();
        let supervisor = ProcessSupervisor::new(config);

        let err = supervisor.start().await.unwrap_err();
        assert!(err.is_backend_unavailable());
        assert_eq!(supervisor.state(), BackendState::Stopped);
        assert!(supervisor.endpoint().unwrap_err().is_backend_unavailable());
    }

    #[tokio::test]
    async fn test_exit_before_ready() {
        let supervisor = ProcessSupervisor::new(shell_backend("echo booting; exit 3"));

        let err = supervisor.start().await.unwrap_err();
        assert!(err.is_backend_unavailable());
        assert_eq!(supervisor.state(), BackendState::Stopped);
    }

    #[tokio::test]
    async fn test_startup_timeout() {
        let mut config = shell_backend("exec sleep 30");
        config.startup_timeout_secs = 1;
        let supervisor = ProcessSupervisor::new(config);

        let err = supervisor.start().await.unwrap_err();
        assert!(err.to_string().contains("did not become ready"));
        assert_eq!(supervisor.state(), BackendState::Stopped);
    }

    #[tokio::test]
    async fn test_unexpected_exit_after_ready() {
        let supervisor = ProcessSupervisor::new(shell_backend(
            "echo 'listening on 127.0.0.1:{port}'; sleep 0.3; exit 1",
        ));

        supervisor.start().await.unwrap();
        wait_for_state(&supervisor, BackendState::Stopped).await;
        assert!(supervisor.endpoint().unwrap_err().is_backend_unavailable());

        // stop() after a crash must not hang
        supervisor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let supervisor = ProcessSupervisor::new(shell_backend(
            "echo 'listening on 127.0.0.1:{port}'; exec sleep 30",
        ));
        supervisor.start().await.unwrap();
        let first = supervisor.endpoint().unwrap();
        supervisor.stop().await.unwrap();

        supervisor.start().await.unwrap();
        assert_eq!(supervisor.endpoint().unwrap(), first);
        supervisor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let supervisor = ProcessSupervisor::new(shell_backend("true"));
        supervisor.stop().await.unwrap();
        assert_eq!(supervisor.state(), BackendState::NotStarted);
    }

    #[test]
    fn test_redactor() {
        let redactor = Redactor {
            token: "tok123".into(),
            port: ":8888".into(),
        };
        assert_eq!(
            redactor.apply("http://127.0.0.1:8888/?token=tok123"),
            "http://127.0.0.1:[port]/?token=[redacted]"
        );
    }
}
