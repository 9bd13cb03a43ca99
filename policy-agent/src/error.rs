use secure_channel::ChannelError;
use thiserror::Error;
use usersync::{SinkError, SourceError};

/// Errors that stop the agent from starting.
///
/// Everything that can go wrong while the agent is already running (fetch
/// failures, unusable stores, corrupt cache) is logged and absorbed instead.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Secure channel configuration error: {0}")]
    Channel(#[from] ChannelError),

    #[error("User group source error: {0}")]
    Source(#[from] SourceError),

    #[error("User group sink error: {0}")]
    Sink(#[from] SinkError),
}

/// A failed attempt to fetch policies from the authority
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("No secure channel available for {0}")]
    ChannelUnavailable(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Policy authority returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Response came from untrusted host {actual}, expected {expected}")]
    HostMismatch { expected: String, actual: String },

    #[error("Malformed policy payload: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;
