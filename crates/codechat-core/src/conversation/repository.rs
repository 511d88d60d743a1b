//! Conversation repository trait.
//!
//! Defines the interface for conversation persistence operations.

use std::path::PathBuf;

use async_trait::async_trait;

use super::message::NewMessage;
use super::model::Conversation;
use crate::error::Result;

/// An abstract repository for conversation documents and their directory trees.
///
/// # Implementation Notes
///
/// Every mutation rewrites the full document. Implementations do not
/// coordinate concurrent writers: callers serialize writes per conversation id.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Creates and immediately persists a new, empty conversation.
    async fn create(&self, title: Option<String>) -> Result<Conversation>;

    /// Loads a conversation by id.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Conversation))`: Document found and parsed
    /// - `Ok(None)`: Document absent or unparsable
    /// - `Err(_)`: Any other I/O failure
    async fn load(&self, id: &str) -> Result<Option<Conversation>>;

    /// Ensures the conversation's directory tree exists and overwrites its document.
    ///
    /// Does not touch `updated_at`.
    async fn save(&self, conversation: &Conversation) -> Result<()>;

    /// Loads, appends `message` (assigning its id), bumps `updated_at` and saves.
    ///
    /// # Returns
    ///
    /// - `Ok(Conversation)`: The updated conversation
    /// - `Err(ConversationNotFound)`: No such conversation; nothing was written
    async fn append_message(&self, id: &str, message: NewMessage) -> Result<Conversation>;

    /// Lists every loadable conversation, most recently updated first.
    ///
    /// Entries that fail to load are dropped from the result.
    async fn list(&self) -> Result<Vec<Conversation>>;

    /// Removes the conversation's whole directory tree. Missing ids are not an error.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Directory holding the conversation's image artifacts. Pure path computation.
    ///
    /// Fails with `ConversationNotFound` for an id that cannot name a conversation.
    fn images_dir(&self, id: &str) -> Result<PathBuf>;

    /// Directory holding the conversation's generic attachments. Pure path computation.
    ///
    /// Fails with `ConversationNotFound` for an id that cannot name a conversation.
    fn files_dir(&self, id: &str) -> Result<PathBuf>;
}
