//! Backend supervision, session execution and shadow replay.

pub mod backend;
pub mod env;
pub mod gateway;
pub mod protocol;
pub mod replay_queue;
pub mod session;
pub mod shadow;
pub mod supervisor;

pub use backend::{BackendCredential, BackendEndpoint, BackendProvider, BackendState};
pub use gateway::JupyterGatewayClient;
pub use protocol::BackendMessage;
pub use replay_queue::{ReplayJob, ReplayQueue};
pub use session::{KernelClient, KernelSession, SessionManager};
pub use shadow::{ReplayOutput, Replayer, ShadowExecutor};
pub use supervisor::ProcessSupervisor;
