//! Keeps the in-memory policy snapshot current.
//!
//! On construction the refresher seeds itself from the local cache so that
//! an agent started while the policy authority is down still serves the
//! last known policies. Every refresh fetches a fresh snapshot and compares
//! it with the current one. Only a real change replaces the snapshot,
//! rewrites the cache and notifies the listener, in that order. A failed
//! fetch changes nothing.

use crate::fetcher::PolicyFetcher;
use crate::listener::PolicyChangeListener;
use crate::scheduler::{ShutdownSignal, Tick};
use async_trait::async_trait;
use policy_cache::{PolicyCacheStore, PolicySnapshot};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Lifecycle of a [`PolicyRefresher`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefresherState {
    /// No snapshot yet, neither from the cache nor from the authority
    Initializing,
    Serving,
    Refreshing,
    Stopped,
}

/// What a single refresh did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated,
    Unchanged,
    Failed,
    /// Shutdown was requested while the fetch was in flight
    Cancelled,
}

/// Read access to the current snapshot, cheap to clone and share
#[derive(Clone)]
pub struct SnapshotHandle {
    rx: watch::Receiver<Option<Arc<PolicySnapshot>>>,
}

impl SnapshotHandle {
    /// The snapshot in effect right now
    pub fn current(&self) -> Option<Arc<PolicySnapshot>> {
        self.rx.borrow().clone()
    }

    /// Wait until a new snapshot is installed. Returns `None` once the
    /// refresher is gone.
    pub async fn changed(&mut self) -> Option<Arc<PolicySnapshot>> {
        self.rx.changed().await.ok()?;
        self.rx.borrow_and_update().clone()
    }
}

pub struct PolicyRefresher {
    fetcher: Box<dyn PolicyFetcher>,
    store: PolicyCacheStore,
    listener: Arc<dyn PolicyChangeListener>,
    current: watch::Sender<Option<Arc<PolicySnapshot>>>,
    state: watch::Sender<RefresherState>,
}

impl PolicyRefresher {
    pub fn new(
        fetcher: Box<dyn PolicyFetcher>,
        store: PolicyCacheStore,
        listener: Arc<dyn PolicyChangeListener>,
    ) -> Self {
        let cached = store.load().map(Arc::new);
        let state = match &cached {
            Some(snapshot) => {
                info!(
                    repository = %snapshot.repository_name,
                    policies = snapshot.policies.len(),
                    "Serving cached policies from {:?}",
                    store.path()
                );
                RefresherState::Serving
            }
            None => RefresherState::Initializing,
        };

        let (current, _) = watch::channel(cached);
        let (state, _) = watch::channel(state);

        Self {
            fetcher,
            store,
            listener,
            current,
            state,
        }
    }

    pub fn snapshots(&self) -> SnapshotHandle {
        SnapshotHandle {
            rx: self.current.subscribe(),
        }
    }

    pub fn current(&self) -> Option<Arc<PolicySnapshot>> {
        self.current.borrow().clone()
    }

    pub fn state(&self) -> RefresherState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<RefresherState> {
        self.state.subscribe()
    }

    /// Fetch once and install the result if it differs from the current
    /// snapshot
    pub async fn refresh(&self, shutdown: &ShutdownSignal) -> RefreshOutcome {
        self.state.send_replace(RefresherState::Refreshing);

        let fetched = tokio::select! {
            biased;
            _ = shutdown.wait() => None,
            result = self.fetcher.fetch() => Some(result),
        };

        let outcome = match fetched {
            None => {
                info!("Policy fetch from {} cancelled", self.fetcher.describe());
                RefreshOutcome::Cancelled
            }
            Some(Err(e)) => {
                warn!(
                    "Policy fetch from {} failed, keeping current policies: {}",
                    self.fetcher.describe(),
                    e
                );
                RefreshOutcome::Failed
            }
            Some(Ok(snapshot)) => self.install(snapshot),
        };

        self.state.send_replace(self.resting_state());
        outcome
    }

    // Runs without suspension points: the snapshot swap, the cache write and
    // the notification for one change all happen before another refresh can
    // observe the state.
    fn install(&self, snapshot: PolicySnapshot) -> RefreshOutcome {
        if self.current.borrow().as_deref() == Some(&snapshot) {
            debug!("Fetched policies identical to current snapshot");
            return RefreshOutcome::Unchanged;
        }

        let snapshot = Arc::new(snapshot);
        self.current.send_replace(Some(snapshot.clone()));

        if let Err(e) = self.store.save(&snapshot) {
            error!(
                "Failed to persist policies to {:?}, cache is stale: {}",
                self.store.path(),
                e
            );
        }

        info!(
            repository = %snapshot.repository_name,
            policies = snapshot.policies.len(),
            "Installed new policy snapshot"
        );
        self.listener.on_policy_change(&snapshot);
        RefreshOutcome::Updated
    }

    fn resting_state(&self) -> RefresherState {
        if self.current.borrow().is_some() {
            RefresherState::Serving
        } else {
            RefresherState::Initializing
        }
    }
}

#[async_trait]
impl Tick for PolicyRefresher {
    async fn tick(&self, shutdown: &ShutdownSignal) {
        self.refresh(shutdown).await;
    }

    fn on_stop(&self) {
        self.state.send_replace(RefresherState::Stopped);
    }
}
