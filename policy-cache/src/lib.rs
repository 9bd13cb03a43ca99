pub mod error;
pub mod model;

use chrono::{DateTime, Utc};
use error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

pub use model::{PolicyRule, PolicySnapshot, RolePermission};

/// Summary of the cache file, for inspection tooling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheInfo {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified_at: Option<DateTime<Utc>>,
    pub content_hash: String,
    pub repository_name: String,
    pub policy_count: usize,
}

/// Last successfully fetched policy snapshot, kept in a single JSON file
pub struct PolicyCacheStore {
    path: PathBuf,
}

impl PolicyCacheStore {
    pub fn new(cache_path: impl AsRef<Path>) -> Self {
        Self {
            path: cache_path.as_ref().to_path_buf(),
        }
    }

    /// Get the path to the cache file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist a snapshot.
    ///
    /// The snapshot is written to a temporary file next to the cache file
    /// and then renamed over it, so a reader sees either the old or the new
    /// document and a crash mid-write leaves the old one intact.
    pub fn save(&self, snapshot: &PolicySnapshot) -> Result<()> {
        let bytes = snapshot.to_canonical_bytes()?;

        if self.path.file_name().is_none() {
            return Err(CacheError::InvalidPath(self.path.display().to_string()));
        }
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;

        let mut temp = NamedTempFile::new_in(parent)?;
        temp.write_all(&bytes)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| CacheError::Io(e.error))?;

        debug!(
            "Saved policy cache: path={:?}, repository={}, size={} bytes",
            self.path,
            snapshot.repository_name,
            bytes.len()
        );
        Ok(())
    }

    /// Load the cached snapshot, if there is a usable one.
    ///
    /// A missing file is a plain cache miss. An unreadable or corrupt file
    /// is logged and also treated as a miss.
    pub fn load(&self) -> Option<PolicySnapshot> {
        match self.try_load() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    "Policy cache {:?} is unreadable, ignoring it: {}",
                    self.path, e
                );
                None
            }
        }
    }

    /// Like [`load`](Self::load) but reports why a present file was unusable
    pub fn try_load(&self) -> Result<Option<PolicySnapshot>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Policy cache miss: {:?}", self.path);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot = PolicySnapshot::from_slice(&bytes)?;
        debug!(
            "Policy cache hit: path={:?}, repository={}, policies={}",
            self.path,
            snapshot.repository_name,
            snapshot.policies.len()
        );
        Ok(Some(snapshot))
    }

    /// Describe the cache file without changing it
    pub fn inspect(&self) -> Result<Option<CacheInfo>> {
        let Some(snapshot) = self.try_load()? else {
            return Ok(None);
        };
        let metadata = std::fs::metadata(&self.path)?;

        Ok(Some(CacheInfo {
            path: self.path.clone(),
            size_bytes: metadata.len(),
            modified_at: metadata.modified().ok().map(DateTime::<Utc>::from),
            content_hash: snapshot.content_hash()?,
            repository_name: snapshot.repository_name,
            policy_count: snapshot.policies.len(),
        }))
    }

    /// Remove the cache file; returns whether one existed
    pub fn clear(&self) -> Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Removed policy cache {:?}", self.path);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
