//! Engine configuration model.
//!
//! Loaded from `config.toml` by the infrastructure layer. Every section and
//! field has a default so a partial (or absent) file is valid.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const PORT_PLACEHOLDER: &str = "{port}";
pub const TOKEN_PLACEHOLDER: &str = "{token}";

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub backend: BackendConfig,
    pub execution: ExecutionConfig,
    pub replay: ReplayConfig,
    pub storage: StorageConfig,
}

/// How to launch and reach the interpreter backend.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    /// Executable name, resolved against `PATH` at startup.
    pub program: String,
    /// Arguments; `{port}` and `{token}` are substituted at spawn time.
    pub args: Vec<String>,
    pub host: String,
    pub port: u16,
    /// Substring of a stdout line that marks the backend as ready; `{port}` is substituted.
    pub ready_sentinel: String,
    pub startup_timeout_secs: u64,
    /// Kernel spec requested for every execution session.
    pub kernel_name: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            program: "jupyter".to_string(),
            args: vec![
                "kernelgateway".to_string(),
                "--KernelGatewayApp.ip=127.0.0.1".to_string(),
                "--KernelGatewayApp.port={port}".to_string(),
                "--KernelGatewayApp.auth_token={token}".to_string(),
                "--JupyterApp.answer_yes=True".to_string(),
            ],
            host: "127.0.0.1".to_string(),
            port: 8888,
            ready_sentinel: "is available at http://127.0.0.1:{port}".to_string(),
            startup_timeout_secs: 60,
            kernel_name: "python3".to_string(),
        }
    }
}

impl BackendConfig {
    /// The readiness sentinel with the configured port filled in.
    pub fn rendered_sentinel(&self) -> String {
        self.ready_sentinel
            .replace(PORT_PLACEHOLDER, &self.port.to_string())
    }

    /// The argument list with port and token filled in.
    pub fn rendered_args(&self, token: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace(PORT_PLACEHOLDER, &self.port.to_string())
                    .replace(TOKEN_PLACEHOLDER, token)
            })
            .collect()
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Upper bound for one run. `None` waits for the backend indefinitely.
    pub timeout_secs: Option<u64>,
}

/// Shadow replay through a bare interpreter.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ReplayConfig {
    pub enabled: bool,
    pub interpreter: String,
    /// Where replay scripts are written. Defaults to the system temp dir.
    pub temp_dir: Option<PathBuf>,
    pub working_dir: Option<PathBuf>,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interpreter: "python3".to_string(),
            temp_dir: None,
            working_dir: None,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Overrides the platform data directory.
    pub data_dir: Option<PathBuf>,
}
