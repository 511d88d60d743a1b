//! Execution result produced by one code run.

use serde::{Deserialize, Serialize};

/// The outcome of exactly one run of one code block.
///
/// Empty collections are never stored: `output` is `None` when nothing was
/// printed and `figure_paths` is `None` when no image arrived, so callers can
/// use field presence as a has-content check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// The code that was submitted.
    pub code: String,
    /// Text, stream and error output in arrival order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Paths of stored image artifacts in arrival order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub figure_paths: Option<Vec<String>>,
    /// Orchestration-level error recorded alongside the result, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Builds a result, dropping empty output and empty figure lists.
    pub fn new(code: impl Into<String>, output: String, figure_paths: Vec<String>) -> Self {
        Self {
            code: code.into(),
            output: (!output.is_empty()).then_some(output),
            figure_paths: (!figure_paths.is_empty()).then_some(figure_paths),
            error: None,
        }
    }

    pub fn has_figures(&self) -> bool {
        self.figure_paths.as_ref().is_some_and(|f| !f.is_empty())
    }

    pub fn figure_count(&self) -> usize {
        self.figure_paths.as_ref().map_or(0, Vec::len)
    }
}
