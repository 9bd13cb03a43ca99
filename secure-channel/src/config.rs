use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Alias under which the key-store password is resolved
pub const KEYSTORE_ALIAS: &str = "sslKeyStore";
/// Alias under which the trust-store password is resolved
pub const TRUSTSTORE_ALIAS: &str = "sslTrustStore";

/// Where the client key store and trust store live and how to unlock them.
///
/// Every field is optional. Without a key store the channel is
/// server-authenticated only; without a trust store no channel is built
/// at all. Passwords are never part of this structure: the
/// `*_credential_file` locators are handed to a
/// [`SecretResolver`](crate::SecretResolver) together with the fixed
/// aliases above.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecureChannelConfig {
    pub keystore: Option<String>,
    pub keystore_type: Option<String>,
    pub keystore_credential_file: Option<String>,
    pub truststore: Option<String>,
    pub truststore_type: Option<String>,
    pub truststore_credential_file: Option<String>,
}

impl SecureChannelConfig {
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load a standalone SSL configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&content)?;
        debug!(
            keystore = ?config.keystore,
            keystore_type = ?config.keystore_type,
            truststore = ?config.truststore,
            truststore_type = ?config.truststore_type,
            "Loaded SSL configuration from {:?}",
            path
        );
        Ok(config)
    }

    pub fn keystore_path(&self) -> Option<&str> {
        non_empty(&self.keystore)
    }

    pub fn truststore_path(&self) -> Option<&str> {
        non_empty(&self.truststore)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
