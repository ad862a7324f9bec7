use crate::error::WorkspaceError;
use crate::services::storage::BlobStorage;
use crate::utils::locator::file_name_of;
use anyhow::{Context, anyhow};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Length of the unique workspace token
pub const WORKSPACE_ID_LEN: usize = 24;

/// Scratch directory owned by a single validation run.
///
/// Call [`Workspace::release`] when the run ends. A workspace dropped without
/// being released (panic or cancelled task) removes its directory synchronously.
#[derive(Debug)]
pub struct Workspace {
    id: String,
    path: PathBuf,
    released: bool,
}

impl Workspace {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory and everything downloaded into it.
    pub async fn release(mut self) -> Result<(), WorkspaceError> {
        self.released = true;
        clean_up(&self.path).await
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        tracing::warn!("Workspace {} dropped without release, removing", self.id);
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::error!("Failed to remove {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Creates per-run workspaces under a process-wide download root and fills them from blob storage
pub struct WorkspaceManager {
    root: PathBuf,
    container: String,
    storage: Arc<dyn BlobStorage>,
}

impl WorkspaceManager {
    pub fn new(root: PathBuf, container: String, storage: Arc<dyn BlobStorage>) -> Self {
        Self {
            root,
            container,
            storage,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn create_workspace(&self) -> Result<Workspace, WorkspaceError> {
        // create_dir_all tolerates a root that already exists
        fs::create_dir_all(&self.root)
            .await
            .map_err(|source| WorkspaceError::Create {
                path: self.root.display().to_string(),
                source,
            })?;

        let id = unique_id();
        let path = self.root.join(&id);
        match fs::create_dir(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(source) => {
                return Err(WorkspaceError::Create {
                    path: path.display().to_string(),
                    source,
                });
            }
        }

        tracing::debug!("Created workspace {}", path.display());
        Ok(Workspace {
            id,
            path,
            released: false,
        })
    }

    /// Stream the remote file into the workspace, named after the locator's basename.
    pub async fn download_into(
        &self,
        workspace: &Workspace,
        locator: &str,
    ) -> anyhow::Result<PathBuf> {
        let file_name =
            file_name_of(locator).ok_or_else(|| anyhow!("No file name in locator '{}'", locator))?;

        let mut reader = self
            .storage
            .get_file(&self.container, locator)
            .await
            .with_context(|| format!("Failed to fetch '{}' from '{}'", locator, self.container))?;

        let local_path = workspace.path().join(file_name);
        let mut file = fs::File::create(&local_path)
            .await
            .with_context(|| format!("Failed to create {}", local_path.display()))?;
        let bytes = tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;

        tracing::info!(
            "File downloaded to location: {} ({} bytes)",
            local_path.display(),
            bytes
        );
        Ok(local_path)
    }
}

/// Remove a file, or a directory recursively.
pub async fn clean_up(path: &Path) -> Result<(), WorkspaceError> {
    let is_file = fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);

    let outcome = if is_file {
        tracing::info!("Removing File: {}", path.display());
        fs::remove_file(path).await
    } else {
        tracing::info!("Removing Folder: {}", path.display());
        fs::remove_dir_all(path).await
    };

    outcome.map_err(|source| WorkspaceError::Cleanup {
        path: path.display().to_string(),
        source,
    })
}

fn unique_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..WORKSPACE_ID_LEN].to_string()
}
