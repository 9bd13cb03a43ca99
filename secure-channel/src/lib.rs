//! Secure transport setup for talking to the policy authority.
//!
//! The pieces, leaves first:
//!
//! - [`SecretResolver`] turns a credential locator and an alias into a
//!   password. It is the only way passwords enter the agent.
//! - [`StoreLocator`] finds key-store and trust-store bytes through an
//!   ordered list of [`StoreSource`]s (filesystem, then bundled resources).
//! - [`TlsContextBuilder`] loads both stores, derives key and trust
//!   material and initialises a [`TlsContext`], or returns `None` when any
//!   configured side cannot be loaded.
//! - [`HostnameVerifier`] is the companion host check.

pub mod config;
pub mod context;
pub mod error;
pub mod hostname;
pub mod material;
pub mod secret;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{SecureChannelConfig, KEYSTORE_ALIAS, TRUSTSTORE_ALIAS};
pub use context::{TlsContext, TlsContextBuilder};
pub use error::{ChannelError, Result};
pub use hostname::HostnameVerifier;
pub use material::{KeyMaterial, StoreType, TrustMaterial};
pub use secret::{CredentialFileResolver, SecretResolver, StaticSecretResolver};
pub use store::{BundledResources, FilesystemSource, ResourceDirSource, StoreLocator, StoreSource};
