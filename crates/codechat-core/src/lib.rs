//! Domain layer of the codechat engine: data model, error taxonomy,
//! configuration model and the storage traits implemented by infrastructure.

pub mod artifact;
pub mod config;
pub mod conversation;
pub mod error;
pub mod execution;

// Re-export common types
pub use artifact::ArtifactStore;
pub use conversation::{Conversation, ConversationRepository, Message, MessageRole, NewMessage};
pub use error::{CodechatError, Result};
pub use execution::ExecutionResult;
