//! Process environment helpers for spawned interpreters.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Builds a PATH value with `dir` first, followed by the entries of `current`.
///
/// GUI-launched processes often inherit a restricted PATH; putting the
/// directory of the resolved backend executable first lets the backend find
/// its co-located helpers (kernels, interpreters). Duplicate entries of `dir`
/// are dropped from the tail.
pub fn prepend_to_path(dir: &Path, current: Option<OsString>) -> OsString {
    let mut components: Vec<PathBuf> = vec![dir.to_path_buf()];

    if let Some(current) = current {
        for existing in std::env::split_paths(&current) {
            if existing.as_os_str().is_empty() || components.contains(&existing) {
                continue;
            }
            components.push(existing);
        }
    }

    // join_paths only fails for entries containing the separator; fall back to the dir alone
    std::env::join_paths(&components).unwrap_or_else(|_| dir.as_os_str().to_os_string())
}

/// PATH for a child whose executable lives at `executable`.
pub fn path_for_executable(executable: &Path) -> Option<OsString> {
    let dir = executable.parent()?;
    Some(prepend_to_path(dir, std::env::var_os("PATH")))
}
