use async_trait::async_trait;
use shared_types::{FsOptions, ReadOutcome, RepoDescriptor, RepoKind, WriteOutcome, WriteReceipt};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, instrument};

use crate::error::{RepoError, Result};
use crate::Backend;

/// Repository rooted at a local directory
pub struct FsRepo {
    options: FsOptions,
}

impl FsRepo {
    pub fn new(options: FsOptions) -> Self {
        Self { options }
    }

    pub fn base_dir(&self) -> &Path {
        &self.options.base_dir
    }

    /// Maps an entry path under `base_dir`, refusing anything that could leave it.
    fn resolve(&self, path: &str) -> std::result::Result<PathBuf, String> {
        let relative = Path::new(path);
        let escapes = relative.is_absolute()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(format!("Path escapes repository root: {path}"));
        }
        Ok(self.options.base_dir.join(relative))
    }
}

#[async_trait]
impl Backend for FsRepo {
    fn kind(&self) -> RepoKind {
        RepoKind::Fs
    }

    async fn sync(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.options.base_dir)
            .await
            .map_err(|e| {
                RepoError::Sync(format!(
                    "cannot create {}: {e}",
                    self.options.base_dir.display()
                ))
            })
    }

    #[instrument(skip(self))]
    async fn read_file(&self, path: &str) -> ReadOutcome {
        let full_path = match self.resolve(path) {
            Ok(full_path) => full_path,
            Err(e) => return ReadOutcome::failed(e),
        };

        match tokio::fs::read_to_string(&full_path).await {
            Ok(content) => ReadOutcome::Found { content },
            Err(e) if e.kind() == ErrorKind::NotFound => ReadOutcome::NotFound,
            Err(e) => ReadOutcome::failed(format!("Failed to read {}: {e}", full_path.display())),
        }
    }

    #[instrument(skip(self, content))]
    async fn write_file(&self, path: &str, content: String) -> WriteOutcome {
        let full_path = match self.resolve(path) {
            Ok(full_path) => full_path,
            Err(e) => return WriteOutcome::failed(e),
        };

        if let Some(parent) = full_path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return WriteOutcome::failed(format!(
                    "Failed to create {}: {e}",
                    parent.display()
                ));
            }
        }

        match tokio::fs::write(&full_path, content.as_bytes()).await {
            Ok(()) => {
                debug!("Wrote {} bytes to {}", content.len(), full_path.display());
                info!("Stored {}", path);
                WriteOutcome::Written(WriteReceipt::new(path))
            }
            Err(e) => {
                WriteOutcome::failed(format!("Failed to write {}: {e}", full_path.display()))
            }
        }
    }

    fn repo_id(&self) -> String {
        format!("{}/{}", self.options.base_dir.display(), self.options.name)
    }

    fn descriptor(&self) -> RepoDescriptor {
        RepoDescriptor::Fs(self.options.clone())
    }
}
