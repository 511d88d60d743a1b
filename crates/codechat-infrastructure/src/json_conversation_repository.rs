//! Directory-per-conversation repository backed by one JSON document each.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use codechat_core::conversation::{Conversation, ConversationRepository, NewMessage};
use codechat_core::error::{CodechatError, Result};
use tokio::fs;
use uuid::Uuid;

use crate::paths::CodechatPaths;
use crate::storage::{AtomicJsonError, AtomicJsonFile};

const DOCUMENT_FILE: &str = "conversation.json";
const IMAGES_DIR: &str = "images";
const FILES_DIR: &str = "files";

/// JSON-document conversation repository.
///
/// Directory structure:
/// ```text
/// root/
/// ├── <conversation-id>/
/// │   ├── conversation.json
/// │   ├── images/
/// │   └── files/
/// └── <conversation-id>/
///     └── ...
/// ```
///
/// Every mutation rewrites `conversation.json` in full. Writes to the same
/// conversation are not coordinated here.
#[derive(Debug, Clone)]
pub struct JsonConversationRepository {
    root: PathBuf,
}

impl JsonConversationRepository {
    /// Creates a repository rooted at `root`. The directory is created lazily on first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates a repository at the conversations directory of `paths`.
    pub fn from_paths(paths: &CodechatPaths) -> Result<Self> {
        let root = paths
            .conversations_dir()
            .map_err(|e| CodechatError::config(e.to_string()))?;
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a conversation, or `None` when `id` is not a UUID.
    ///
    /// Only UUID ids are joined onto the root so an id can never name a path
    /// outside of it.
    fn conversation_dir(&self, id: &str) -> Option<PathBuf> {
        Uuid::parse_str(id).ok()?;
        Some(self.root.join(id))
    }

    fn document(dir: &Path) -> AtomicJsonFile<Conversation> {
        AtomicJsonFile::new(dir.join(DOCUMENT_FILE))
    }
}

#[async_trait]
impl ConversationRepository for JsonConversationRepository {
    async fn create(&self, title: Option<String>) -> Result<Conversation> {
        let conversation = Conversation::new(title);
        self.save(&conversation).await?;
        tracing::info!(
            "[ConversationStore] Created conversation {}",
            conversation.id
        );
        Ok(conversation)
    }

    async fn load(&self, id: &str) -> Result<Option<Conversation>> {
        let Some(dir) = self.conversation_dir(id) else {
            tracing::debug!("[ConversationStore] Ignoring non-UUID conversation id '{}'", id);
            return Ok(None);
        };

        match Self::document(&dir).load().await {
            Ok(conversation) => Ok(conversation),
            Err(AtomicJsonError::ParseError(e)) => {
                tracing::warn!(
                    "[ConversationStore] Conversation {} is unreadable, treating as absent: {}",
                    id,
                    e
                );
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, conversation: &Conversation) -> Result<()> {
        let dir = self
            .conversation_dir(&conversation.id)
            .ok_or_else(|| {
                CodechatError::persistence(format!(
                    "conversation id '{}' is not a UUID",
                    conversation.id
                ))
            })?;

        fs::create_dir_all(dir.join(IMAGES_DIR)).await?;
        fs::create_dir_all(dir.join(FILES_DIR)).await?;

        Self::document(&dir).save(conversation).await?;
        tracing::debug!(
            "[ConversationStore] Saved conversation {} ({} messages)",
            conversation.id,
            conversation.messages.len()
        );
        Ok(())
    }

    async fn append_message(&self, id: &str, message: NewMessage) -> Result<Conversation> {
        let mut conversation = self
            .load(id)
            .await?
            .ok_or_else(|| CodechatError::conversation_not_found(id))?;

        let message_id = conversation.push_message(message).id;
        self.save(&conversation).await?;
        tracing::debug!(
            "[ConversationStore] Appended message {} to conversation {}",
            message_id,
            id
        );
        Ok(conversation)
    }

    async fn list(&self) -> Result<Vec<Conversation>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut conversations = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            // file_type() does not follow symlinks
            match entry.file_type().await {
                Ok(file_type) if file_type.is_dir() => {}
                _ => continue,
            }

            let name = entry.file_name();
            let id = name.to_string_lossy();
            match self.load(&id).await {
                Ok(Some(conversation)) => conversations.push(conversation),
                Ok(None) => {
                    tracing::warn!("[ConversationStore] Skipping '{}': no loadable document", id);
                }
                Err(e) => {
                    tracing::warn!("[ConversationStore] Skipping '{}': {}", id, e);
                }
            }
        }

        // Sort by updated_at descending (most recent first)
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        Ok(conversations)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let Some(dir) = self.conversation_dir(id) else {
            return Ok(());
        };

        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                tracing::info!("[ConversationStore] Deleted conversation {}", id);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn images_dir(&self, id: &str) -> Result<PathBuf> {
        self.conversation_dir(id)
            .map(|dir| dir.join(IMAGES_DIR))
            .ok_or_else(|| CodechatError::conversation_not_found(id))
    }

    fn files_dir(&self, id: &str) -> Result<PathBuf> {
        self.conversation_dir(id)
            .map(|dir| dir.join(FILES_DIR))
            .ok_or_else(|| CodechatError::conversation_not_found(id))
    }
}
