use crate::error::Result;
use crate::scheduler::{ShutdownSignal, Tick};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use usersync::{push_to_sink, ReadOutcome, SourceReader, UserGroupMapping, UserGroupSink};

struct SyncState {
    reader: SourceReader,
    sink: Box<dyn UserGroupSink>,
    // Read but not yet fully accepted by the sink
    pending: Option<UserGroupMapping>,
}

/// Periodically pushes the user/group source into a sink when it changes.
pub struct UserGroupSync {
    state: Mutex<SyncState>,
}

impl UserGroupSync {
    /// Perform the first read and push.
    ///
    /// Failing here means the source is misconfigured, so the error is
    /// returned instead of logged.
    pub fn initialize(mut reader: SourceReader, mut sink: Box<dyn UserGroupSink>) -> Result<Self> {
        if let ReadOutcome::Changed(mapping) = reader.read()? {
            mapping.log_debug();
            push_to_sink(&mapping, sink.as_mut())?;
        }

        Ok(Self {
            state: Mutex::new(SyncState {
                reader,
                sink,
                pending: None,
            }),
        })
    }

    /// Read the source again and push it if it changed.
    ///
    /// A mapping the sink rejected part way through is pushed again on the
    /// next call even when the source has not changed since. Returns
    /// whether anything was pushed.
    pub async fn sync_once(&self) -> Result<bool> {
        let mut state = self.state.lock().await;
        let SyncState {
            reader,
            sink,
            pending,
        } = &mut *state;

        if let ReadOutcome::Changed(mapping) = reader.read()? {
            *pending = Some(mapping);
        }

        let mapping = match pending.as_ref() {
            Some(mapping) => mapping,
            None => return Ok(false),
        };
        let pushed = push_to_sink(mapping, sink.as_mut())?;
        debug!("Synchronized {} users from {:?}", pushed, reader.path());
        *pending = None;
        Ok(true)
    }

    /// Mapping from the last successful read
    pub async fn current(&self) -> Option<UserGroupMapping> {
        self.state.lock().await.reader.current().cloned()
    }
}

#[async_trait]
impl Tick for UserGroupSync {
    async fn tick(&self, _shutdown: &ShutdownSignal) {
        if let Err(e) = self.sync_once().await {
            warn!("User group sync failed, keeping previous mapping: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use std::fs::File;
    use std::path::Path;
    use std::sync::{Arc, Mutex as StdMutex};
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;
    use usersync::SinkError;

    /// Records every push, shared with the test
    #[derive(Clone, Default)]
    struct SharedSink {
        pushes: Arc<StdMutex<Vec<(String, Vec<String>)>>>,
        reject: Option<&'static str>,
        reject_once: Arc<StdMutex<Option<&'static str>>>,
    }

    impl UserGroupSink for SharedSink {
        fn add_or_update(&mut self, user: &str, groups: &[String]) -> std::result::Result<(), SinkError> {
            let mut once = self.reject_once.lock().unwrap();
            let rejected_once = *once == Some(user);
            if rejected_once {
                *once = None;
            }
            if rejected_once || self.reject == Some(user) {
                return Err(SinkError::Rejected {
                    user: user.to_string(),
                    message: "unknown user".to_string(),
                });
            }
            self.pushes
                .lock()
                .unwrap()
                .push((user.to_string(), groups.to_vec()));
            Ok(())
        }
    }

    fn rewrite(path: &Path, content: &str, bump_secs: u64) {
        std::fs::write(path, content).unwrap();
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(bump_secs))
            .unwrap();
    }

    #[tokio::test]
    async fn test_initial_push_then_only_on_change() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.csv");
        std::fs::write(&path, "alice,grpA,grpB\nbob,grpA\n").unwrap();

        let sink = SharedSink::default();
        let sync =
            UserGroupSync::initialize(SourceReader::new(&path, ','), Box::new(sink.clone())).unwrap();
        assert_eq!(sink.pushes.lock().unwrap().len(), 2);

        assert!(!sync.sync_once().await.unwrap());
        assert_eq!(sink.pushes.lock().unwrap().len(), 2);

        rewrite(&path, "alice,grpC\n", 60);
        assert!(sync.sync_once().await.unwrap());

        let pushes = sink.pushes.lock().unwrap();
        assert_eq!(pushes.len(), 3);
        assert_eq!(pushes[2], ("alice".to_string(), vec!["grpC".to_string()]));
    }

    #[tokio::test]
    async fn test_partial_push_is_retried_on_next_sync() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.csv");
        std::fs::write(&path, "dave,grpD\n").unwrap();

        let sink = SharedSink::default();
        let sync =
            UserGroupSync::initialize(SourceReader::new(&path, ','), Box::new(sink.clone())).unwrap();

        rewrite(&path, "alice,grpA\nbob,grpB\ncarol,grpC\n", 60);
        *sink.reject_once.lock().unwrap() = Some("bob");
        assert!(matches!(sync.sync_once().await, Err(AgentError::Sink(_))));

        // Source untouched, the rest still has to arrive
        assert!(sync.sync_once().await.unwrap());
        let users: Vec<String> = sink
            .pushes
            .lock()
            .unwrap()
            .iter()
            .map(|(user, _)| user.clone())
            .collect();
        assert_eq!(users, vec!["dave", "alice", "alice", "bob", "carol"]);

        assert!(!sync.sync_once().await.unwrap());
        assert_eq!(sink.pushes.lock().unwrap().len(), 5);
    }

    #[test]
    fn test_missing_source_fails_initialization() {
        let dir = TempDir::new().unwrap();
        let result = UserGroupSync::initialize(
            SourceReader::new(dir.path().join("absent.csv"), ','),
            Box::new(SharedSink::default()),
        );
        assert!(matches!(result, Err(AgentError::Source(_))));
    }

    #[test]
    fn test_rejecting_sink_fails_initialization() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.csv");
        std::fs::write(&path, "alice,grpA\n").unwrap();

        let sink = SharedSink {
            reject: Some("alice"),
            ..Default::default()
        };
        let result = UserGroupSync::initialize(SourceReader::new(&path, ','), Box::new(sink));
        assert!(matches!(result, Err(AgentError::Sink(_))));
    }

    #[tokio::test]
    async fn test_tick_keeps_mapping_when_source_disappears() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, r#"{"alice": ["grpA"]}"#).unwrap();

        let sync = UserGroupSync::initialize(
            SourceReader::new(&path, ','),
            Box::new(SharedSink::default()),
        )
        .unwrap();

        std::fs::remove_file(&path).unwrap();
        sync.tick(&ShutdownSignal::never()).await;

        let current = sync.current().await.unwrap();
        assert_eq!(current.groups("alice").unwrap(), &["grpA".to_string()]);
    }
}
