use crate::error::{Result, SourceError};
use crate::format::SourceFormat;
use crate::mapping::UserGroupMapping;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

/// What was last observed about a source file.
///
/// Modification time and length short-circuit a read without opening the
/// file. Only when one of them moved is the file read and hashed; a digest
/// equal to the last one means the file was touched but not changed, and
/// the parse is skipped. A rewrite that keeps both the timestamp and the
/// length goes unnoticed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMetadata {
    pub modified: Option<SystemTime>,
    pub len: u64,
    pub digest: String,
}

impl SourceMetadata {
    fn same_marker(&self, modified: Option<SystemTime>, len: u64) -> bool {
        self.modified == modified && self.len == len
    }
}

/// Result of a successful [`SourceReader::read`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The source changed and parsed into a fresh mapping
    Changed(UserGroupMapping),
    /// The source is the same as at the last successful read
    Unchanged,
}

/// Reads a user/group source file and reports whether it changed.
pub struct SourceReader {
    path: PathBuf,
    format: SourceFormat,
    metadata: Option<SourceMetadata>,
    current: Option<UserGroupMapping>,
    parse_count: u64,
}

impl SourceReader {
    pub fn new(path: impl Into<PathBuf>, delimiter: char) -> Self {
        let path = path.into();
        let format = SourceFormat::for_path(&path, delimiter);
        Self {
            path,
            format,
            metadata: None,
            current: None,
            parse_count: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    /// The mapping from the last successful read
    pub fn current(&self) -> Option<&UserGroupMapping> {
        self.current.as_ref()
    }

    /// Last observed source metadata
    pub fn metadata(&self) -> Option<&SourceMetadata> {
        self.metadata.as_ref()
    }

    /// Number of parse attempts so far
    pub fn parse_count(&self) -> u64 {
        self.parse_count
    }

    /// Whether the source looks different from the last successful read,
    /// judged from file metadata alone
    pub fn is_changed(&self) -> bool {
        match (&self.metadata, observe(&self.path)) {
            (Some(previous), Ok((modified, len))) => !previous.same_marker(modified, len),
            _ => true,
        }
    }

    /// Read the source.
    ///
    /// The first call always parses. Later calls return
    /// [`ReadOutcome::Unchanged`] without parsing when the source is the
    /// same. On error the last good mapping stays available through
    /// [`current`](Self::current).
    pub fn read(&mut self) -> Result<ReadOutcome> {
        let (modified, len) = observe(&self.path).map_err(|source| SourceError::Unavailable {
            path: self.path.clone(),
            source,
        })?;

        if let Some(previous) = &self.metadata {
            if previous.same_marker(modified, len) {
                debug!("User group source {:?} unchanged", self.path);
                return Ok(ReadOutcome::Unchanged);
            }
        }

        let bytes = std::fs::read(&self.path).map_err(|source| SourceError::Unavailable {
            path: self.path.clone(),
            source,
        })?;
        let digest = format!("{:x}", Sha256::digest(&bytes));
        let observed = SourceMetadata {
            modified,
            len,
            digest,
        };

        if let Some(previous) = &self.metadata {
            if previous.digest == observed.digest {
                debug!(
                    "User group source {:?} touched without content change",
                    self.path
                );
                self.metadata = Some(observed);
                return Ok(ReadOutcome::Unchanged);
            }
        }

        self.parse_count += 1;
        let mapping = String::from_utf8(bytes)
            .map_err(|e| e.to_string())
            .and_then(|content| self.format.parse(&content))
            .map_err(|message| SourceError::Parse {
                path: self.path.clone(),
                message,
            })?;

        info!(
            "Read {} users from user group source {:?}",
            mapping.len(),
            self.path
        );
        self.metadata = Some(observed);
        self.current = Some(mapping.clone());
        Ok(ReadOutcome::Changed(mapping))
    }
}

fn observe(path: &Path) -> std::io::Result<(Option<SystemTime>, u64)> {
    let metadata = std::fs::metadata(path)?;
    if !metadata.is_file() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "not a regular file",
        ));
    }
    Ok((metadata.modified().ok(), metadata.len()))
}
