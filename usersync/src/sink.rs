use crate::error::SinkError;
use crate::mapping::UserGroupMapping;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Receives user/group entries pushed from a source.
pub trait UserGroupSink: Send {
    fn add_or_update(&mut self, user: &str, groups: &[String]) -> Result<(), SinkError>;
}

/// Push every user of `mapping` to `sink`, once per user.
///
/// Stops at the first user the sink rejects.
pub fn push_to_sink(
    mapping: &UserGroupMapping,
    sink: &mut dyn UserGroupSink,
) -> Result<usize, SinkError> {
    let mut pushed = 0;
    for (user, groups) in mapping.iter() {
        sink.add_or_update(user, groups)?;
        pushed += 1;
    }
    debug!("Pushed {} users to sink", pushed);
    Ok(pushed)
}

/// Sink that keeps the latest groups of every user in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    users: BTreeMap<String, Vec<String>>,
    updates: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups(&self, user: &str) -> Option<&[String]> {
        self.users.get(user).map(Vec::as_slice)
    }

    pub fn users(&self) -> impl Iterator<Item = &str> {
        self.users.keys().map(String::as_str)
    }

    /// Total `add_or_update` calls received
    pub fn updates(&self) -> usize {
        self.updates
    }
}

impl UserGroupSink for MemorySink {
    fn add_or_update(&mut self, user: &str, groups: &[String]) -> Result<(), SinkError> {
        self.users.insert(user.to_string(), groups.to_vec());
        self.updates += 1;
        Ok(())
    }
}

/// Sink that only logs what it receives
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

impl UserGroupSink for LoggingSink {
    fn add_or_update(&mut self, user: &str, groups: &[String]) -> Result<(), SinkError> {
        info!(user, groups = ?groups, "User group update");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RejectingSink {
        reject: &'static str,
        seen: Vec<String>,
    }

    impl UserGroupSink for RejectingSink {
        fn add_or_update(&mut self, user: &str, _groups: &[String]) -> Result<(), SinkError> {
            if user == self.reject {
                return Err(SinkError::Rejected {
                    user: user.to_string(),
                    message: "unknown user".to_string(),
                });
            }
            self.seen.push(user.to_string());
            Ok(())
        }
    }

    fn mapping() -> UserGroupMapping {
        vec![("alice", vec!["grpA", "grpB"]), ("bob", vec!["grpA"])]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_push_once_per_user() {
        let mut sink = MemorySink::new();
        let pushed = push_to_sink(&mapping(), &mut sink).unwrap();

        assert_eq!(pushed, 2);
        assert_eq!(sink.updates(), 2);
        assert_eq!(
            sink.groups("alice").unwrap(),
            &["grpA".to_string(), "grpB".to_string()]
        );
        assert_eq!(sink.users().collect::<Vec<_>>(), vec!["alice", "bob"]);
    }

    #[test]
    fn test_push_stops_on_rejection() {
        let mut sink = RejectingSink {
            reject: "alice",
            seen: Vec::new(),
        };
        let err = push_to_sink(&mapping(), &mut sink).unwrap_err();

        assert!(matches!(err, SinkError::Rejected { ref user, .. } if user == "alice"));
        assert!(sink.seen.is_empty());
    }
}
