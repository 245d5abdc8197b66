//! Local filesystem storage for uploaded lease files

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use lease_analysis::{StorageError, StorageGateway};

pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a relative object path under the root, refusing anything
    /// that could escape it
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError::Rejected(format!("unsafe object path: {}", path)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl StorageGateway for LocalStorage {
    async fn upload(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;

        tracing::debug!(
            "Stored {} bytes ({}) at {}",
            bytes.len(),
            content_type,
            target.display()
        );
        Ok(format!("file://{}", target.display()))
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let target = self.resolve(path)?;
        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
