use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error("Store not found in any source: {0}")]
    StoreNotFound(String),

    #[error("Unsupported store type: {0}")]
    UnsupportedStoreType(String),

    #[error("Invalid store contents: {0}")]
    InvalidStore(String),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
