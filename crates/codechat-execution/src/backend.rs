//! Shared backend handle types: credential, endpoint, lifecycle state.

use codechat_core::error::Result;
use rand::Rng;
use rand::distributions::Alphanumeric;

const CREDENTIAL_LEN: usize = 48;

/// Bearer token shared by the backend process and every session opened against it.
///
/// `Debug` and `Display` are redacted; the raw value is only reachable
/// through [`BackendCredential::expose`].
#[derive(Clone, PartialEq, Eq)]
pub struct BackendCredential(String);

impl BackendCredential {
    /// Generates a fresh random credential.
    pub fn generate() -> Self {
        let token = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(CREDENTIAL_LEN)
            .map(char::from)
            .collect();
        Self(token)
    }

    pub fn from_secret(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for BackendCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BackendCredential([redacted])")
    }
}

impl std::fmt::Display for BackendCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[redacted]")
    }
}

/// Where and how to reach a ready backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendEndpoint {
    pub host: String,
    pub port: u16,
    pub credential: BackendCredential,
}

impl BackendEndpoint {
    pub fn http_base(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn ws_base(&self) -> String {
        format!("ws://{}:{}", self.host, self.port)
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> String {
        format!("token {}", self.credential.expose())
    }
}

/// Lifecycle of the backend process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendState {
    NotStarted,
    Starting,
    Ready,
    Stopped,
}

/// Hands out the endpoint of a ready backend.
///
/// Implemented by `ProcessSupervisor`; tests substitute a fake.
pub trait BackendProvider: Send + Sync {
    /// Returns the endpoint, or `BackendUnavailable` unless the backend is ready.
    fn endpoint(&self) -> Result<BackendEndpoint>;
}
