//! Cache storage seam and the disk-backed store.
//!
//! # Design
//! - Entries are immutable once written; `put` on an existing key overwrites it with
//!   equivalent content, so concurrent writers need no lock (last writer wins).
//! - Writes land in a temporary sibling file and are renamed into place, so a
//!   reader sees either the previous entry, the new entry, or nothing.

use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tracing::debug;

use crate::error::{CacheError, CacheResult};
use crate::key::CacheKey;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Outcome of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// A previously stored variant.
    Hit(Bytes),
    /// No variant has been stored under the key yet.
    Miss,
}

/// Durable blob store addressed by [`CacheKey`].
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up the blob stored under `key`.
    async fn get(&self, key: &CacheKey) -> CacheResult<CacheLookup>;

    /// Store `bytes` under `key`, replacing any existing blob.
    async fn put(&self, key: &CacheKey, bytes: &[u8]) -> CacheResult<()>;
}

/// Cache store keeping one file per key in a flat directory.
#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    /// Open (creating when needed) a cache rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] when the directory cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> CacheResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|source| CacheError::Io {
                operation: "cache.open",
                path: root.clone(),
                source,
            })?;
        Ok(Self { root })
    }

    /// Directory holding the cache entries.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    fn temp_path(&self, key: &CacheKey) -> PathBuf {
        let sequence = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.root
            .join(format!(".{}.{}.{sequence}.tmp", key.as_str(), process::id()))
    }
}

#[async_trait]
impl CacheStore for DiskCache {
    async fn get(&self, key: &CacheKey) -> CacheResult<CacheLookup> {
        let path = self.entry_path(key);
        match fs::read(&path).await {
            Ok(bytes) => {
                debug!(key = %key, "cache hit");
                Ok(CacheLookup::Hit(Bytes::from(bytes)))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(key = %key, "cache miss");
                Ok(CacheLookup::Miss)
            }
            Err(source) => Err(CacheError::Io {
                operation: "cache.get",
                path,
                source,
            }),
        }
    }

    async fn put(&self, key: &CacheKey, bytes: &[u8]) -> CacheResult<()> {
        let temp = self.temp_path(key);
        if let Err(source) = fs::write(&temp, bytes).await {
            return Err(CacheError::Io {
                operation: "cache.put.write",
                path: temp,
                source,
            });
        }
        let target = self.entry_path(key);
        if let Err(source) = fs::rename(&temp, &target).await {
            let _ = fs::remove_file(&temp).await;
            return Err(CacheError::Io {
                operation: "cache.put.rename",
                path: target,
                source,
            });
        }
        debug!(key = %key, bytes = bytes.len(), "cache entry stored");
        Ok(())
    }
}
