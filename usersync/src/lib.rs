//! User/group source reading for the policy agent.
//!
//! A [`SourceReader`] reads a user/group file (JSON object or delimited
//! records), tells whether it changed since the last read, and hands out a
//! fresh [`UserGroupMapping`] when it did. [`push_to_sink`] feeds a mapping
//! into any [`UserGroupSink`].

pub mod error;
pub mod format;
pub mod mapping;
pub mod reader;
pub mod sink;

pub use error::{Result, SinkError, SourceError};
pub use format::{SourceFormat, DEFAULT_DELIMITER};
pub use mapping::UserGroupMapping;
pub use reader::{ReadOutcome, SourceMetadata, SourceReader};
pub use sink::{push_to_sink, LoggingSink, MemorySink, UserGroupSink};
