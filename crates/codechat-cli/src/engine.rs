//! Composition root: loads configuration and wires the engine together.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use codechat_application::ExecutionUseCase;
use codechat_execution::{
    JupyterGatewayClient, ProcessSupervisor, ReplayQueue, SessionManager, ShadowExecutor,
};
use codechat_infrastructure::{
    CodechatPaths, ConfigService, FsArtifactStore, JsonConversationRepository,
};

pub struct Engine {
    pub supervisor: Arc<ProcessSupervisor>,
    pub usecase: ExecutionUseCase,
}

impl Engine {
    /// Builds the engine. Nothing is spawned until the backend is started.
    pub fn build(config_path: Option<PathBuf>, data_dir: Option<PathBuf>) -> Result<Self> {
        let config_service = match config_path {
            Some(path) => ConfigService::new(path),
            None => ConfigService::default_location()?,
        };
        let config = config_service.load()?;
        tracing::debug!("[Bootstrap] Loaded config from {}", config_service.path().display());

        // Flag beats config beats platform default
        let paths = CodechatPaths::new(data_dir.or_else(|| config.storage.data_dir.clone()));
        let repository = Arc::new(JsonConversationRepository::from_paths(&paths)?);
        tracing::debug!(
            "[Bootstrap] Conversations stored under {}",
            repository.root().display()
        );

        let artifacts = Arc::new(FsArtifactStore::new());
        let supervisor = Arc::new(ProcessSupervisor::new(config.backend.clone()));
        let client = Arc::new(
            JupyterGatewayClient::new(config.backend.kernel_name.clone())
                .context("failed to create gateway client")?,
        );

        let sessions = SessionManager::new(supervisor.clone(), client, artifacts.clone())
            .with_timeout(config.execution.timeout_secs.map(Duration::from_secs));

        let mut usecase = ExecutionUseCase::new(Arc::new(sessions), repository, artifacts);
        if config.replay.enabled {
            let replayer = Arc::new(ShadowExecutor::from_config(&config.replay));
            usecase = usecase.with_replay_queue(Arc::new(ReplayQueue::spawn(replayer)));
        }

        Ok(Self {
            supervisor,
            usecase,
        })
    }

    /// Drains queued replays and stops the backend if it is running.
    pub async fn shutdown(&self) {
        self.usecase.shutdown().await;
        if let Err(e) = self.supervisor.stop().await {
            tracing::warn!("[Bootstrap] Failed to stop backend: {}", e);
        }
    }
}
