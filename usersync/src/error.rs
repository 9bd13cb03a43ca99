use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    /// The source does not exist or cannot be read
    #[error("User group source {path:?} does not exist or is not readable: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse user group source {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Sink rejected user {user}: {message}")]
    Rejected { user: String, message: String },
}

pub type Result<T> = std::result::Result<T, SourceError>;
