//! Ordered lookup of key-store and trust-store bytes.
//!
//! Deployments ship stores either as files on disk or bundled alongside the
//! agent. A [`StoreLocator`] tries each [`StoreSource`] in order and returns
//! the first hit: the filesystem first, then whatever bundled sources were
//! registered after it.

use crate::error::{ChannelError, Result};
use std::borrow::Cow;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A single place store material can be read from.
pub trait StoreSource: Send + Sync {
    /// Short name used in log messages
    fn name(&self) -> &str;

    /// Read the store at `path`.
    ///
    /// Returns `Ok(None)` when this source does not hold the store, so the
    /// next source can be tried. An I/O error on a store that exists is
    /// reported and stops the lookup.
    fn open(&self, path: &str) -> io::Result<Option<Vec<u8>>>;
}

/// Plain filesystem lookup
#[derive(Debug, Clone, Copy, Default)]
pub struct FilesystemSource;

impl StoreSource for FilesystemSource {
    fn name(&self) -> &str {
        "filesystem"
    }

    fn open(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        let path = Path::new(path);
        if !path.is_file() {
            return Ok(None);
        }
        std::fs::read(path).map(Some)
    }
}

/// Searches a list of resource directories, the way a bundled resource
/// path is searched, treating the store path as relative to each root.
#[derive(Debug, Clone, Default)]
pub struct ResourceDirSource {
    roots: Vec<PathBuf>,
}

impl ResourceDirSource {
    pub fn new(roots: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }
}

impl StoreSource for ResourceDirSource {
    fn name(&self) -> &str {
        "resource-dir"
    }

    fn open(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        let relative = path.trim_start_matches('/');
        for root in &self.roots {
            let candidate = root.join(relative);
            if candidate.is_file() {
                return std::fs::read(candidate).map(Some);
            }
        }
        Ok(None)
    }
}

/// Stores compiled into the binary, e.g. with `include_bytes!`.
#[derive(Debug, Clone, Default)]
pub struct BundledResources {
    resources: HashMap<String, Cow<'static, [u8]>>,
}

impl BundledResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource(
        mut self,
        name: impl Into<String>,
        bytes: impl Into<Cow<'static, [u8]>>,
    ) -> Self {
        let name = name.into();
        self.resources
            .insert(name.trim_start_matches('/').to_string(), bytes.into());
        self
    }
}

impl StoreSource for BundledResources {
    fn name(&self) -> &str {
        "bundled"
    }

    fn open(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self
            .resources
            .get(path.trim_start_matches('/'))
            .map(|bytes| bytes.to_vec()))
    }
}

/// Ordered list of store sources
pub struct StoreLocator {
    sources: Vec<Box<dyn StoreSource>>,
}

impl Default for StoreLocator {
    fn default() -> Self {
        Self {
            sources: vec![Box::new(FilesystemSource)],
        }
    }
}

impl StoreLocator {
    /// A locator with no sources at all
    pub fn empty() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Append a source; it is tried after every source already registered
    pub fn with_source(mut self, source: impl StoreSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Return the bytes of the first source holding `path`
    pub fn locate(&self, path: &str) -> Result<Vec<u8>> {
        for source in &self.sources {
            if let Some(bytes) = source.open(path)? {
                debug!(
                    "Located store {} via {} source ({} bytes)",
                    path,
                    source.name(),
                    bytes.len()
                );
                return Ok(bytes);
            }
        }
        Err(ChannelError::StoreNotFound(path.to_string()))
    }
}
