//! Conversation message types.

use serde::{Deserialize, Serialize};

use crate::execution::ExecutionResult;

/// Represents the role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message from the user.
    User,
    /// Message from the AI assistant.
    Assistant,
}

impl std::str::FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(format!("unknown role '{other}' (expected user or assistant)")),
        }
    }
}

/// A single message in a conversation.
///
/// `id` is only unique within its conversation: it is assigned as
/// `messages.len() + 1` when the message is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: u64,
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_paths: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_result: Option<ExecutionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_execution_message: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

/// A message that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewMessage {
    pub role: Option<MessageRole>,
    pub content: String,
    pub file_paths: Option<Vec<String>>,
    pub execution_result: Option<ExecutionResult>,
    pub is_execution_message: Option<bool>,
    pub system_prompt: Option<String>,
}

impl NewMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Some(MessageRole::User),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Some(MessageRole::Assistant),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_file_paths(mut self, paths: Vec<String>) -> Self {
        self.file_paths = Some(paths);
        self
    }

    pub fn with_system_prompt(mut self, tag: impl Into<String>) -> Self {
        self.system_prompt = Some(tag.into());
        self
    }

    /// Marks the message as carrying the output of a code run.
    pub fn with_execution_result(mut self, result: ExecutionResult) -> Self {
        self.execution_result = Some(result);
        self.is_execution_message = Some(true);
        self
    }

    /// Materializes the message with the given id. A missing role defaults to `User`.
    pub fn into_message(self, id: u64) -> Message {
        Message {
            id,
            role: self.role.unwrap_or(MessageRole::User),
            content: self.content,
            file_paths: self.file_paths,
            execution_result: self.execution_result,
            is_execution_message: self.is_execution_message,
            system_prompt: self.system_prompt,
        }
    }
}
