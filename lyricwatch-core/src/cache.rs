use crate::error::{CoreError, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// Byte-blob store for fetched lyrics.
#[async_trait]
pub trait LyricsCache: Send + Sync {
    /// Look up an entry. A missing entry is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry exists but cannot be read.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store an entry, replacing any previous content.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be written.
    async fn put(&self, key: &str, content: &[u8]) -> Result<()>;
}

/// Lyrics cache backed by plain files under a root directory.
pub struct FsLyricsCache {
    root: PathBuf,
}

impl FsLyricsCache {
    /// Create a new cache at the default location (`~/.lyrics`)
    #[must_use]
    pub fn new() -> Self {
        Self::open(crate::paths::lyrics_cache_dir())
    }

    /// Open a cache rooted at a specific directory.
    ///
    /// Nothing is created until the first write.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        info!("Using lyrics cache directory {:?}", root);
        Self { root }
    }

    /// The cache root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let is_plain = !key.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));

        if !is_plain {
            return Err(CoreError::CacheKey {
                key: key.to_string(),
            });
        }

        Ok(self.root.join(relative))
    }
}

impl Default for FsLyricsCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LyricsCache for FsLyricsCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(key)?;
        debug!("Looking up lyrics in cache at {:?}", path);

        match tokio::fs::read(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, content: &[u8]) -> Result<()> {
        let path = self.entry_path(key)?;
        info!("Storing lyrics in cache at {:?}", path);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&path, content).await?;
        Ok(())
    }
}
