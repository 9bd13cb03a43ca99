//! Policy agent runtime.
//!
//! Fetches policy snapshots from the policy authority on a fixed schedule,
//! keeps the last good snapshot in memory and in a local cache file, and
//! tells a listener when policies actually change. Optionally keeps a
//! user/group source in sync with a sink on its own schedule.

pub mod agent;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod listener;
pub mod refresher;
pub mod scheduler;
pub mod user_sync;

pub use agent::{Agent, RunningAgent};
pub use config::{AgentConfig, UserSyncConfig};
pub use error::{AgentError, FetchError, Result};
pub use fetcher::{
    fetcher_for_url, ChannelSettings, FilePolicyFetcher, HttpPolicyFetcher, PolicyFetcher,
};
pub use listener::{LoggingListener, PolicyChangeListener};
pub use refresher::{PolicyRefresher, RefreshOutcome, RefresherState, SnapshotHandle};
pub use scheduler::{PeriodicTask, ShutdownSignal, Tick};
pub use user_sync::UserGroupSync;
