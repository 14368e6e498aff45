use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::pipeline::error::StorageError;
use crate::pipeline::traits::ArtifactStore;

/// Route under which the HTTP server exposes the artifact directory.
pub const FILES_ROUTE: &str = "/files";

/// Writes artifacts into a directory served by this process at `/files`.
pub struct LocalArtifactStore {
    root: PathBuf,
    public_prefix: String,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_prefix: format!("{}{}", public_base_url.trim_end_matches('/'), FILES_ROUTE),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn public_ref(&self, key: &str) -> String {
        format!("{}/{}", self.public_prefix, key)
    }

    fn path_for_ref(&self, public_ref: &str) -> Result<PathBuf, StorageError> {
        let key = public_ref
            .strip_prefix(&self.public_prefix)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| StorageError(format!("not a local artifact: {public_ref}")))?;
        Ok(self.root.join(validate_key(key)?))
    }
}

/// Keys are flat file names; anything that could escape the root is refused.
fn validate_key(key: &str) -> Result<&str, StorageError> {
    if key.is_empty() || key.contains('/') || key.contains('\\') || key.contains("..") {
        return Err(StorageError(format!("invalid artifact key: {key:?}")));
    }
    Ok(key)
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        let key = validate_key(key)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|err| StorageError(format!("failed to create {}: {err}", self.root.display())))?;
        let path = self.root.join(key);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|err| StorageError(format!("failed to write {}: {err}", path.display())))?;
        debug!("Stored artifact {}", path.display());
        Ok(self.public_ref(key))
    }

    async fn delete(&self, public_ref: &str) -> Result<(), StorageError> {
        let path = self.path_for_ref(public_ref)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError(format!(
                "failed to delete {}: {err}",
                path.display()
            ))),
        }
    }
}
