//! Execution use case implementation.
//!
//! `ExecutionUseCase` is the boundary the UI talks to: it sequences a code
//! run, the optional shadow replay, and the conversation persistence that
//! threads results back into a conversation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use codechat_core::conversation::{Conversation, ConversationRepository, NewMessage};
use codechat_core::error::Result;
use codechat_core::execution::ExecutionResult;
use codechat_core::ArtifactStore;
use codechat_execution::{ReplayJob, ReplayQueue, SessionManager};
use uuid::Uuid;

/// Use case for running code and persisting conversations.
///
/// # Responsibilities
///
/// - Running a code block in a fresh execution session
/// - Handing runs that produced figures to the shadow replay queue
/// - Saving execution results into the message they belong to
/// - Exposing conversation CRUD and artifact loading
pub struct ExecutionUseCase {
    sessions: Arc<SessionManager>,
    repository: Arc<dyn ConversationRepository>,
    artifacts: Arc<dyn ArtifactStore>,
    /// `None` disables shadow replay
    replays: Option<Arc<ReplayQueue>>,
}

impl ExecutionUseCase {
    pub fn new(
        sessions: Arc<SessionManager>,
        repository: Arc<dyn ConversationRepository>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            sessions,
            repository,
            artifacts,
            replays: None,
        }
    }

    pub fn with_replay_queue(mut self, replays: Arc<ReplayQueue>) -> Self {
        self.replays = Some(replays);
        self
    }

    /// Runs `code` and returns its result.
    ///
    /// When the run produced at least one figure, the same code is queued for
    /// shadow replay after the result is available. The replay is never
    /// awaited and its failure never affects this call.
    ///
    /// # Errors
    ///
    /// Only infrastructure failures (`BackendUnavailable`, `SessionTransport`,
    /// `ExecutionTimedOut`, persistence of figures). An exception raised by
    /// the code itself is part of the returned `output`.
    pub async fn run_code(
        &self,
        figures_dir: &Path,
        code: &str,
        conversation_id: &str,
    ) -> Result<ExecutionResult> {
        let result = self.sessions.run(figures_dir, code).await?;

        if result.has_figures() {
            if let Some(replays) = &self.replays {
                // A replay script is named after the conversation
                if Uuid::parse_str(conversation_id).is_err() {
                    tracing::warn!(
                        "[Replay] Not replaying for non-UUID conversation id '{}'",
                        conversation_id
                    );
                    return Ok(result);
                }
                replays
                    .submit(ReplayJob {
                        code: code.to_string(),
                        conversation_id: conversation_id.to_string(),
                    })
                    .await;
            }
        }

        Ok(result)
    }

    /// Attaches `result` to message `message_id` and persists the conversation.
    ///
    /// The caller keeps ownership of the in-memory conversation, which is
    /// updated even when the save fails.
    pub async fn save_execution_result(
        &self,
        conversation: &mut Conversation,
        message_id: u64,
        result: ExecutionResult,
    ) -> Result<()> {
        conversation.attach_execution_result(message_id, result)?;
        self.repository.save(conversation).await?;
        tracing::debug!(
            "[ConversationStore] Saved execution result for message {} in {}",
            message_id,
            conversation.id
        );
        Ok(())
    }

    /// # Errors
    ///
    /// `ConversationNotFound` when `conversation_id` cannot name a conversation.
    pub fn get_conversation_images_dir(&self, conversation_id: &str) -> Result<PathBuf> {
        self.repository.images_dir(conversation_id)
    }

    pub async fn load_artifact(&self, path: &Path) -> Option<String> {
        self.artifacts.load(path).await
    }

    pub async fn create_conversation(&self, title: Option<String>) -> Result<Conversation> {
        self.repository.create(title).await
    }

    pub async fn load_conversation(&self, id: &str) -> Result<Option<Conversation>> {
        self.repository.load(id).await
    }

    pub async fn append_message(&self, id: &str, message: NewMessage) -> Result<Conversation> {
        self.repository.append_message(id, message).await
    }

    pub async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        self.repository.list().await
    }

    pub async fn delete_conversation(&self, id: &str) -> Result<()> {
        self.repository.delete(id).await
    }

    /// Waits for queued shadow replays to finish.
    pub async fn shutdown(&self) {
        if let Some(replays) = &self.replays {
            replays.shutdown().await;
        }
    }
}
