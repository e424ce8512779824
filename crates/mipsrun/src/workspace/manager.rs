//! Workspace lifecycle management
//!
//! Allocates one uniquely named directory per simulation and removes it when
//! the simulation is over.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::workspace::WorkspaceError;

/// A request-scoped directory holding one simulation's input files
///
/// # Cleanup
///
/// Call [`release()`](Self::release) once the simulation is over. If a
/// workspace is dropped without being released (an early return, a panic, a
/// cancelled request future) the directory is still removed synchronously and
/// a warning is logged.
#[derive(Debug)]
pub struct Workspace {
    request_id: Uuid,

    /// Path to the workspace directory
    path: PathBuf,

    /// Owns the directory; `None` once released
    dir: Option<TempDir>,

    /// Concurrency permit, returned when the workspace goes away
    _permit: OwnedSemaphorePermit,
}

impl Workspace {
    /// Get the request this workspace belongs to
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Get the path to the workspace directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the path to a file inside the workspace
    ///
    /// Returns an error if the name is absolute or contains path traversal.
    pub fn file_path(&self, name: &str) -> Result<PathBuf, WorkspaceError> {
        if name.is_empty() || name.contains("..") || name.starts_with('/') {
            return Err(WorkspaceError::InvalidPath(format!(
                "not a workspace file name: {name:?}"
            )));
        }
        Ok(self.path.join(name))
    }

    /// Write a file into the workspace, returning its path
    #[instrument(skip(self, content), fields(request_id = %self.request_id))]
    pub async fn write_file(&self, name: &str, content: &[u8]) -> Result<PathBuf, WorkspaceError> {
        let path = self.file_path(name)?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|source| WorkspaceError::WriteFailed {
                path: path.clone(),
                source,
            })?;
        debug!(?path, len = content.len(), "wrote file to workspace");
        Ok(path)
    }

    /// Check if the workspace directory still exists
    pub fn is_live(&self) -> bool {
        self.dir.is_some()
    }

    /// Remove the workspace directory and everything in it
    #[must_use = "release errors should be handled"]
    #[instrument(skip(self), fields(request_id = %self.request_id))]
    pub async fn release(mut self) -> Result<(), WorkspaceError> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };
        let path = self.path.clone();

        let removed = tokio::task::spawn_blocking(move || dir.close())
            .await
            .map_err(std::io::Error::other)
            .and_then(|result| result);

        match removed {
            Ok(()) => {
                debug!(?path, "workspace released");
                Ok(())
            }
            Err(source) => {
                warn!(?path, error = %source, "failed to remove workspace");
                Err(WorkspaceError::CleanupFailed { path, source })
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            warn!(
                request_id = %self.request_id,
                path = %self.path.display(),
                "workspace dropped without release, removing it now"
            );
            if let Err(e) = dir.close() {
                warn!(path = %self.path.display(), error = %e, "drop-time workspace removal failed");
            }
        }
    }
}

/// Allocates workspaces under a root directory
///
/// At most `capacity` workspaces exist at once; [`acquire`](Self::acquire)
/// waits for a slot.
#[derive(Debug)]
pub struct WorkspaceManager {
    root: PathBuf,

    capacity: usize,

    /// Semaphore to limit concurrent workspaces
    semaphore: Arc<Semaphore>,
}

impl WorkspaceManager {
    /// Create a new workspace manager
    pub fn new(root: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            root: root.into(),
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity)),
        }
    }

    /// Allocate a fresh workspace for a request
    ///
    /// The directory name embeds the request id plus a random suffix, so two
    /// acquisitions never share a path.
    #[instrument(skip(self))]
    pub async fn acquire(&self, request_id: Uuid) -> Result<Workspace, WorkspaceError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| WorkspaceError::LimiterClosed)?;

        let create_failed = |source| WorkspaceError::CreateFailed {
            root: self.root.clone(),
            source,
        };
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(create_failed)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("mipsrun-{request_id}-"))
            .tempdir_in(&self.root)
            .map_err(create_failed)?;

        let path = dir.path().to_path_buf();
        debug!(?path, "workspace acquired");

        Ok(Workspace {
            request_id,
            path,
            dir: Some(dir),
            _permit: permit,
        })
    }

    /// Get the directory workspaces are created under
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the number of workspaces that can still be acquired without waiting
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Get the maximum number of concurrent workspaces
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
