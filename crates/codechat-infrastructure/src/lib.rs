pub mod artifact_store;
pub mod config_service;
pub mod json_conversation_repository;
pub mod paths;
pub mod storage;

pub use crate::artifact_store::FsArtifactStore;
pub use crate::config_service::ConfigService;
pub use crate::json_conversation_repository::JsonConversationRepository;
pub use crate::paths::CodechatPaths;
