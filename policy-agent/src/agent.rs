use crate::config::AgentConfig;
use crate::error::Result;
use crate::fetcher::{fetcher_for_url, ChannelSettings};
use crate::listener::PolicyChangeListener;
use crate::refresher::{PolicyRefresher, SnapshotHandle};
use crate::scheduler::PeriodicTask;
use crate::user_sync::UserGroupSync;
use policy_cache::PolicyCacheStore;
use secure_channel::{ResourceDirSource, SecretResolver, StoreLocator, TlsContextBuilder};
use std::sync::Arc;
use tracing::info;
use usersync::{LoggingSink, SourceReader, UserGroupSink};

/// The assembled agent: policy refresher plus optional user/group sync.
pub struct Agent {
    config: AgentConfig,
    refresher: Arc<PolicyRefresher>,
    user_sync: Option<Arc<UserGroupSync>>,
}

impl Agent {
    /// Wire up all components from `config`.
    ///
    /// Only configuration problems fail here. An unreachable authority or
    /// unusable TLS stores show up later as failed refreshes.
    ///
    /// `sink` receives user/group updates when `usersync` is configured and
    /// is ignored otherwise; `None` logs the updates instead.
    pub fn new(
        config: AgentConfig,
        resolver: Arc<dyn SecretResolver>,
        listener: Arc<dyn PolicyChangeListener>,
        sink: Option<Box<dyn UserGroupSink>>,
    ) -> Result<Self> {
        config.validate()?;

        let mut locator = StoreLocator::default();
        if !config.resource_dirs.is_empty() {
            locator = locator.with_source(ResourceDirSource::new(config.resource_dirs.clone()));
        }
        let channel = ChannelSettings {
            builder: TlsContextBuilder::new(resolver).with_locator(locator),
            config: config.secure_channel()?,
        };

        let fetcher = fetcher_for_url(&config.policy_url, config.request_timeout(), Some(channel))?;
        let store = PolicyCacheStore::new(&config.cache_file);
        let refresher = Arc::new(PolicyRefresher::new(fetcher, store, listener));

        let user_sync = match &config.usersync {
            Some(settings) => {
                let reader = SourceReader::new(&settings.source_file, settings.delimiter_char()?);
                let sink = sink.unwrap_or_else(|| Box::new(LoggingSink));
                Some(Arc::new(UserGroupSync::initialize(reader, sink)?))
            }
            None => None,
        };

        Ok(Self {
            config,
            refresher,
            user_sync,
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn refresher(&self) -> &Arc<PolicyRefresher> {
        &self.refresher
    }

    pub fn snapshots(&self) -> SnapshotHandle {
        self.refresher.snapshots()
    }

    /// Start the background tasks
    pub fn start(&self) -> Result<RunningAgent> {
        let mut tasks = vec![PeriodicTask::start(
            "policy-refresh",
            self.config.refresh_interval(),
            self.refresher.clone(),
        )?];

        if let (Some(sync), Some(settings)) = (&self.user_sync, &self.config.usersync) {
            tasks.push(PeriodicTask::start(
                "usersync",
                settings.interval(),
                sync.clone(),
            )?);
        }

        info!(
            "Policy agent started for {} ({} tasks)",
            self.config.policy_url,
            tasks.len()
        );
        Ok(RunningAgent { tasks })
    }
}

/// Background tasks of a started [`Agent`]
pub struct RunningAgent {
    tasks: Vec<PeriodicTask>,
}

impl RunningAgent {
    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(PeriodicTask::name).collect()
    }

    pub async fn shutdown(self) {
        for task in self.tasks {
            task.stop().await;
        }
        info!("Policy agent stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::LoggingListener;
    use crate::refresher::RefresherState;
    use policy_cache::PolicySnapshot;
    use reqwest::Url;
    use secure_channel::StaticSecretResolver;
    use std::time::Duration;
    use tempfile::TempDir;
    use usersync::MemorySink;

    fn config_for(dir: &TempDir, usersync: bool) -> AgentConfig {
        let policy_path = dir.path().join("authority.json");
        let url = Url::from_file_path(&policy_path).unwrap();
        let mut yaml = format!(
            "policy_url: {}\nrefresh_interval_secs: 1\ncache_file: {}\n",
            url,
            dir.path().join("cache.json").display()
        );
        if usersync {
            yaml.push_str(&format!(
                "usersync:\n  source_file: {}\n",
                dir.path().join("users.csv").display()
            ));
        }
        AgentConfig::from_yaml(&yaml).unwrap()
    }

    #[tokio::test]
    async fn test_agent_serves_fetched_policies() {
        let dir = TempDir::new().unwrap();
        let snapshot = PolicySnapshot::new("hadoopdev", vec![]);
        std::fs::write(
            dir.path().join("authority.json"),
            snapshot.to_canonical_bytes().unwrap(),
        )
        .unwrap();

        let agent = Agent::new(
            config_for(&dir, false),
            Arc::new(StaticSecretResolver::new()),
            Arc::new(LoggingListener),
            None,
        )
        .unwrap();
        let mut handle = agent.snapshots();

        let running = agent.start().unwrap();
        assert_eq!(running.task_names(), vec!["policy-refresh"]);

        let seen = tokio::time::timeout(Duration::from_secs(5), handle.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(*seen, snapshot);
        assert!(dir.path().join("cache.json").exists());

        running.shutdown().await;
        assert_eq!(agent.refresher().state(), RefresherState::Stopped);
    }

    #[tokio::test]
    async fn test_agent_with_usersync() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("users.csv"), "alice,grpA\n").unwrap();

        let agent = Agent::new(
            config_for(&dir, true),
            Arc::new(StaticSecretResolver::new()),
            Arc::new(LoggingListener),
            Some(Box::new(MemorySink::new())),
        )
        .unwrap();

        let running = agent.start().unwrap();
        assert_eq!(running.task_names(), vec!["policy-refresh", "usersync"]);
        running.shutdown().await;
    }

    #[tokio::test]
    async fn test_missing_usersync_source_is_fatal() {
        let dir = TempDir::new().unwrap();
        let result = Agent::new(
            config_for(&dir, true),
            Arc::new(StaticSecretResolver::new()),
            Arc::new(LoggingListener),
            None,
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_usersync_without_sink_logs_updates() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("users.csv"), "alice,grpA\n").unwrap();

        let agent = Agent::new(
            config_for(&dir, true),
            Arc::new(StaticSecretResolver::new()),
            Arc::new(LoggingListener),
            None,
        )
        .unwrap();

        let running = agent.start().unwrap();
        assert_eq!(running.task_names(), vec!["policy-refresh", "usersync"]);
        running.shutdown().await;
    }
}
