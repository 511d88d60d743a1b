//! Conversation domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::{Message, NewMessage};
use crate::error::{CodechatError, Result};
use crate::execution::ExecutionResult;

/// One conversation: metadata plus its full, ordered message history.
///
/// Persisted as a single JSON document. Every mutation rewrites the whole
/// document, so the in-memory value is always the unit of persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// UUID string.
    pub id: String,
    pub title: Option<String>,
    /// Insertion order is conversation order.
    #[serde(default)]
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Creates an empty conversation with a fresh id and current timestamps.
    pub fn new(title: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Id that the next appended message will receive.
    pub fn next_message_id(&self) -> u64 {
        self.messages.len() as u64 + 1
    }

    /// Appends a message, assigning its id, and bumps `updated_at`.
    pub fn push_message(&mut self, message: NewMessage) -> &Message {
        let id = self.next_message_id();
        self.messages.push(message.into_message(id));
        self.touch();
        &self.messages[self.messages.len() - 1]
    }

    pub fn message(&self, message_id: u64) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    /// Stores `result` on the message with `message_id` and bumps `updated_at`.
    pub fn attach_execution_result(
        &mut self,
        message_id: u64,
        result: ExecutionResult,
    ) -> Result<()> {
        let message = self
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| CodechatError::MessageNotFound {
                conversation_id: self.id.clone(),
                message_id,
            })?;
        message.execution_result = Some(result);
        self.touch();
        Ok(())
    }

    /// Bumps `updated_at`, never moving it before `created_at`.
    pub fn touch(&mut self) {
        let now = Utc::now();
        self.updated_at = now.max(self.created_at).max(self.updated_at);
    }
}
