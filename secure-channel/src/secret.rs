//! Secret resolution for key-store and trust-store passwords.
//!
//! Passwords never come from plain configuration values. A configuration
//! names a credential *locator* (a path or URL only the resolver
//! understands) and the store side names a fixed alias; the resolver turns
//! that pair into a secret, or reports that none exists.

use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Resolves a `(locator, alias)` pair to a secret.
///
/// Implementations must not fail for "not found": they return `None` and
/// let the caller decide what an absent secret means.
pub trait SecretResolver: Send + Sync {
    fn resolve(&self, locator: &str, alias: &str) -> Option<SecretString>;
}

/// In-memory resolver, keyed by locator and alias.
#[derive(Default)]
pub struct StaticSecretResolver {
    secrets: HashMap<(String, String), SecretString>,
}

impl StaticSecretResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a secret for a locator/alias pair
    pub fn with_secret(
        mut self,
        locator: impl Into<String>,
        alias: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        self.secrets.insert(
            (locator.into(), alias.into()),
            SecretString::from(secret.into()),
        );
        self
    }
}

impl SecretResolver for StaticSecretResolver {
    fn resolve(&self, locator: &str, alias: &str) -> Option<SecretString> {
        self.secrets
            .get(&(locator.to_string(), alias.to_string()))
            .map(|s| s.expose_secret())
            .filter(|s| !s.is_empty())
            .map(|s| SecretString::from(s.to_owned()))
    }
}

/// Locator prefixes accepted in front of a credential file path
const LOCATOR_PREFIXES: &[&str] = &["localjceks://file", "jceks://file", "file://"];

type CredentialMap = HashMap<String, SecretString>;

/// Resolver backed by credential files on disk.
///
/// Each locator names a JSON document mapping aliases to secrets:
///
/// ```json
/// { "sslKeyStore": "changeit", "sslTrustStore": "changeit" }
/// ```
///
/// Successfully parsed files are cached; failures are not, so a file that
/// appears later is picked up on the next lookup.
#[derive(Default)]
pub struct CredentialFileResolver {
    cache: RwLock<HashMap<PathBuf, Arc<CredentialMap>>>,
}

impl CredentialFileResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every cached credential file
    pub fn invalidate(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }

    fn credentials(&self, path: PathBuf) -> Option<Arc<CredentialMap>> {
        if let Some(found) = self.cache.read().ok()?.get(&path) {
            return Some(found.clone());
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Unable to read credential file {:?}: {}", path, e);
                return None;
            }
        };

        let raw: HashMap<String, String> = match serde_json::from_str(&content) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Unable to parse credential file {:?}: {}", path, e);
                return None;
            }
        };

        let parsed: CredentialMap = raw
            .into_iter()
            .map(|(alias, secret)| (alias, SecretString::from(secret)))
            .collect();
        let parsed = Arc::new(parsed);

        debug!("Loaded {} credentials from {:?}", parsed.len(), path);
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(path, parsed.clone());
        }
        Some(parsed)
    }
}

impl SecretResolver for CredentialFileResolver {
    fn resolve(&self, locator: &str, alias: &str) -> Option<SecretString> {
        let path = credential_path(locator)?;
        let credentials = self.credentials(path)?;

        let secret = credentials.get(alias)?.expose_secret();
        if secret.is_empty() {
            debug!("Credential alias {} is empty", alias);
            return None;
        }
        Some(SecretString::from(secret.to_owned()))
    }
}

/// Strip a known locator scheme and return the credential file path
fn credential_path(locator: &str) -> Option<PathBuf> {
    let trimmed = locator.trim();
    if trimmed.is_empty() {
        return None;
    }

    let path = LOCATOR_PREFIXES
        .iter()
        .find_map(|prefix| trimmed.strip_prefix(prefix))
        .unwrap_or(trimmed);
    Some(PathBuf::from(path))
}
