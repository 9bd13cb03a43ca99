//! Policy snapshot data model.
//!
//! A snapshot is the full authorization state of one repository as handed
//! out by the policy authority. Snapshots are compared structurally; the
//! JSON form produced by [`PolicySnapshot::to_canonical_bytes`] is stable, so
//! equal snapshots always serialize to identical bytes.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Complete set of policies for one repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicySnapshot {
    pub repository_name: String,
    pub policies: Vec<PolicyRule>,
}

/// One resource rule within a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolicyRule {
    pub resource: String,
    pub recursive: bool,
    pub enabled: bool,
    pub audit_enabled: bool,
    pub permissions: Vec<RolePermission>,
}

impl Default for PolicyRule {
    fn default() -> Self {
        Self {
            resource: String::new(),
            recursive: false,
            enabled: true,
            audit_enabled: true,
            permissions: Vec::new(),
        }
    }
}

/// Access granted to a set of users and groups
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RolePermission {
    pub access_types: Vec<String>,
    pub users: Vec<String>,
    pub groups: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_addresses: Option<Vec<String>>,
}

impl PolicySnapshot {
    pub fn new(repository_name: impl Into<String>, policies: Vec<PolicyRule>) -> Self {
        Self {
            repository_name: repository_name.into(),
            policies,
        }
    }

    /// Canonical on-disk form: pretty JSON followed by a newline
    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// SHA256 of the canonical form, hex encoded
    pub fn content_hash(&self) -> Result<String> {
        let bytes = self.to_canonical_bytes()?;
        Ok(format!("{:x}", Sha256::digest(&bytes)))
    }
}

#[cfg(test)]
pub(crate) fn sample_snapshot() -> PolicySnapshot {
    PolicySnapshot::new(
        "hadoopdev",
        vec![PolicyRule {
            resource: "/demo/data".to_string(),
            recursive: true,
            enabled: true,
            audit_enabled: true,
            permissions: vec![RolePermission {
                access_types: vec!["read".to_string(), "write".to_string()],
                users: vec!["guest".to_string()],
                groups: vec!["sales".to_string()],
                ip_addresses: None,
            }],
        }],
    )
}
