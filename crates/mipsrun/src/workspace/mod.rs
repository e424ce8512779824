//! Per-request workspaces and simulator processes
//!
//! Every simulation gets its own directory holding exactly the program file
//! and the configuration file, and its own child process bounded by a
//! wall-clock deadline. Nothing in this module is shared between requests
//! except the concurrency semaphore.

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use crate::workspace::command::{ProcessInvocation, SimulatorCommand, check_contract};
pub use crate::workspace::manager::{Workspace, WorkspaceManager};
pub use crate::workspace::process::invoke;
pub use crate::workspace::stager::{StagedFiles, StagingLayout, stage};

mod command;
mod manager;
mod process;
mod stager;

/// Errors that occur while preparing a workspace
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("failed to create workspace under {root}: {source}")]
    CreateFailed {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize simulator config: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to remove workspace {path}: {source}")]
    CleanupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("workspace limiter closed")]
    LimiterClosed,

    #[error("invalid path: {0}")]
    InvalidPath(String),
}

/// Resolve the simulator executable to an absolute path using the host's PATH.
///
/// Paths containing a `/` are checked as given. Used at startup to warn about
/// a missing simulator; per-request spawning reports the same problem as an
/// internal error.
pub fn resolve_simulator(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        return program
            .is_file()
            .then(|| std::path::absolute(program).unwrap_or_else(|_| program.to_path_buf()));
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
        .map(|candidate| std::fs::canonicalize(&candidate).unwrap_or(candidate))
}
