use crate::error::{AgentError, Result};
use secure_channel::SecureChannelConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

const DEFAULT_REFRESH_INTERVAL_SECS: i64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: i64 = 10;
const DEFAULT_USERSYNC_INTERVAL_SECS: i64 = 60;

fn default_refresh_interval() -> i64 {
    DEFAULT_REFRESH_INTERVAL_SECS
}

fn default_request_timeout() -> i64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_usersync_interval() -> i64 {
    DEFAULT_USERSYNC_INTERVAL_SECS
}

fn default_delimiter() -> String {
    usersync::DEFAULT_DELIMITER.to_string()
}

/// Agent configuration, usually read from a YAML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// `https://`, `http://` or `file://` location of the policy document
    pub policy_url: String,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: i64,
    /// Where the last good snapshot is kept
    pub cache_file: PathBuf,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: i64,
    /// Directories searched for bundled key/trust stores after the filesystem
    #[serde(default)]
    pub resource_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub ssl: Option<SecureChannelConfig>,
    /// Standalone SSL configuration file; takes precedence over `ssl`
    #[serde(default)]
    pub ssl_config_file: Option<PathBuf>,
    #[serde(default)]
    pub usersync: Option<UserSyncConfig>,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

/// User/group source synchronisation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSyncConfig {
    pub source_file: PathBuf,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default = "default_usersync_interval")]
    pub interval_secs: i64,
}

impl UserSyncConfig {
    pub fn delimiter_char(&self) -> Result<char> {
        let mut chars = self.delimiter.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(AgentError::Config(format!(
                "usersync delimiter must be a single character, got {:?}",
                self.delimiter
            ))),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(0) as u64)
    }
}

impl AgentConfig {
    /// Parse and validate YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from file path; relative paths inside are resolved against the
    /// file's directory
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AgentError::Config(format!("Unable to read configuration {:?}: {}", path, e))
        })?;
        let mut config = Self::from_yaml(&content)?;

        if let Some(base) = path.parent() {
            config.resolve_relative(base);
        }

        info!("Loaded agent configuration from {:?}", path);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.policy_url.trim().is_empty() {
            return Err(AgentError::Config("policy_url cannot be empty".to_string()));
        }
        if self.cache_file.as_os_str().is_empty() {
            return Err(AgentError::Config("cache_file cannot be empty".to_string()));
        }
        if self.refresh_interval_secs <= 0 {
            return Err(AgentError::Config(format!(
                "refresh_interval_secs must be positive, got {}",
                self.refresh_interval_secs
            )));
        }
        if self.request_timeout_secs <= 0 {
            return Err(AgentError::Config(format!(
                "request_timeout_secs must be positive, got {}",
                self.request_timeout_secs
            )));
        }

        if let Some(usersync) = &self.usersync {
            if usersync.source_file.as_os_str().is_empty() {
                return Err(AgentError::Config(
                    "usersync source_file cannot be empty".to_string(),
                ));
            }
            if usersync.interval_secs <= 0 {
                return Err(AgentError::Config(format!(
                    "usersync interval_secs must be positive, got {}",
                    usersync.interval_secs
                )));
            }
            usersync.delimiter_char()?;
        }

        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(0) as u64)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(0) as u64)
    }

    /// Effective secure channel settings
    pub fn secure_channel(&self) -> Result<SecureChannelConfig> {
        match &self.ssl_config_file {
            Some(path) => Ok(SecureChannelConfig::from_file(path)?),
            None => Ok(self.ssl.clone().unwrap_or_default()),
        }
    }

    fn resolve_relative(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() && !path.as_os_str().is_empty() {
                *path = base.join(&*path);
            }
        };

        resolve(&mut self.cache_file);
        self.resource_dirs.iter_mut().for_each(resolve);
        if let Some(path) = self.ssl_config_file.as_mut() {
            resolve(path);
        }
        if let Some(path) = self.log_dir.as_mut() {
            resolve(path);
        }
        if let Some(usersync) = self.usersync.as_mut() {
            resolve(&mut usersync.source_file);
        }
    }
}
