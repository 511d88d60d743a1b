//! Conversation domain module.
//!
//! # Module Structure
//!
//! - `model`: the persisted document (`Conversation`)
//! - `message`: message types (`Message`, `NewMessage`, `MessageRole`)
//! - `repository`: repository trait for conversation persistence

mod message;
mod model;
mod repository;

pub use message::{Message, MessageRole, NewMessage};
pub use model::Conversation;
pub use repository::ConversationRepository;
