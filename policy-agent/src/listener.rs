use policy_cache::PolicySnapshot;
use tracing::info;

/// Notified after a changed snapshot has been installed and persisted.
///
/// Called from the refresh task, at most once per change. Implementations
/// should return quickly; the next refresh waits for them.
pub trait PolicyChangeListener: Send + Sync {
    fn on_policy_change(&self, snapshot: &PolicySnapshot);
}

impl<F> PolicyChangeListener for F
where
    F: Fn(&PolicySnapshot) + Send + Sync,
{
    fn on_policy_change(&self, snapshot: &PolicySnapshot) {
        self(snapshot)
    }
}

/// Listener that only logs the change
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

impl PolicyChangeListener for LoggingListener {
    fn on_policy_change(&self, snapshot: &PolicySnapshot) {
        info!(
            repository = %snapshot.repository_name,
            policies = snapshot.policies.len(),
            "Policies changed"
        );
    }
}
