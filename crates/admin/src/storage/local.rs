//! Directory-backed object storage.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, instrument};
use url::Url;

use super::{ObjectStorage, StorageError, is_image_content_type};

/// Writes blobs under `root` and hands out URLs under `public_base`.
#[derive(Debug, Clone)]
pub struct LocalObjectStorage {
    root: PathBuf,
    public_base: Url,
}

impl LocalObjectStorage {
    /// Create storage rooted at `root`. `public_base` must end with `/`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, public_base: Url) -> Self {
        Self {
            root: root.into(),
            public_base,
        }
    }

    /// Directory blobs are written to.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<Url, StorageError> {
        if !is_image_content_type(content_type) {
            return Err(StorageError::UnsupportedContentType(
                content_type.unwrap_or_default().to_string(),
            ));
        }
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;

        let url = self.public_base.join(key)?;
        debug!(%url, content_type = content_type.unwrap_or("unknown"), "Stored object");
        Ok(url)
    }
}
