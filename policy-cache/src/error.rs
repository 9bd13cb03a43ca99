use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache path has no file name: {0}")]
    InvalidPath(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;
