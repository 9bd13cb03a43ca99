use crate::config::{SecureChannelConfig, KEYSTORE_ALIAS, TRUSTSTORE_ALIAS};
use crate::error::Result;
use crate::material::{KeyMaterial, StoreType, TrustMaterial};
use crate::secret::SecretResolver;
use crate::store::StoreLocator;
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode};
use openssl::x509::store::X509StoreBuilder;
use secrecy::SecretString;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// An initialised client TLS context.
///
/// Holds the derived key and trust material and an OpenSSL connector built
/// from them. The same material can be applied to a `reqwest` client.
pub struct TlsContext {
    key: Option<KeyMaterial>,
    trust: TrustMaterial,
    connector: SslConnector,
}

impl TlsContext {
    fn new(key: Option<KeyMaterial>, trust: TrustMaterial) -> Result<Self> {
        let mut builder = SslConnector::builder(SslMethod::tls_client())?;

        if let Some(key) = &key {
            builder.set_private_key(&key.key)?;
            builder.set_certificate(&key.certificate)?;
            for cert in &key.chain {
                builder.add_extra_chain_cert(cert.clone())?;
            }
            builder.check_private_key()?;
        }

        let mut store = X509StoreBuilder::new()?;
        for anchor in &trust.anchors {
            store.add_cert(anchor.clone())?;
        }
        builder.set_cert_store(store.build());

        builder.set_verify(SslVerifyMode::PEER);

        Ok(Self {
            key,
            trust,
            connector: builder.build(),
        })
    }

    /// Whether the context presents a client certificate
    pub fn is_mutual(&self) -> bool {
        self.key.is_some()
    }

    pub fn key_material(&self) -> Option<&KeyMaterial> {
        self.key.as_ref()
    }

    pub fn trust_material(&self) -> &TrustMaterial {
        &self.trust
    }

    pub fn connector(&self) -> &SslConnector {
        &self.connector
    }

    /// Configure a `reqwest` client builder with this context's material
    pub fn apply_to(&self, builder: reqwest::ClientBuilder) -> Result<reqwest::ClientBuilder> {
        let mut builder = builder.use_native_tls().https_only(true);

        if let Some(key) = &self.key {
            builder = builder.identity(key.identity()?);
        }

        builder = builder.tls_built_in_root_certs(false);
        for cert in self.trust.certificates()? {
            builder = builder.add_root_certificate(cert);
        }

        Ok(builder)
    }
}

impl fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsContext")
            .field("key", &self.key)
            .field("trust", &self.trust)
            .finish_non_exhaustive()
    }
}

/// Builds a [`TlsContext`] from a [`SecureChannelConfig`].
///
/// The trust store is required; without a key store the context is
/// server-authenticated only.
///
/// Every failure along the way (unresolved secret, missing store, wrong
/// type, bad password, unusable key) is logged and turns into `None`; the
/// caller keeps running without a channel rather than with a half
/// configured one.
pub struct TlsContextBuilder {
    resolver: Arc<dyn SecretResolver>,
    locator: StoreLocator,
}

impl TlsContextBuilder {
    pub fn new(resolver: Arc<dyn SecretResolver>) -> Self {
        Self {
            resolver,
            locator: StoreLocator::default(),
        }
    }

    pub fn with_locator(mut self, locator: StoreLocator) -> Self {
        self.locator = locator;
        self
    }

    pub fn build(&self, config: &SecureChannelConfig) -> Option<TlsContext> {
        let key = match config.keystore_path() {
            Some(path) => Some(self.key_material(config, path)?),
            None => {
                debug!("No key store configured, client certificate will not be presented");
                None
            }
        };

        let Some(path) = config.truststore_path() else {
            warn!("No trust store configured, the policy server cannot be verified");
            return None;
        };
        let trust = self.trust_material(config, path)?;

        match TlsContext::new(key, trust) {
            Ok(context) => {
                info!(
                    mutual = context.is_mutual(),
                    "TLS context initialized for policy channel"
                );
                Some(context)
            }
            Err(e) => {
                error!("Unable to initialize the TLS context: {}", e);
                None
            }
        }
    }

    fn key_material(&self, config: &SecureChannelConfig, path: &str) -> Option<KeyMaterial> {
        let Some(password) =
            self.resolve_secret(config.keystore_credential_file.as_deref(), KEYSTORE_ALIAS)
        else {
            warn!(
                "Key store {} is configured but its credential could not be resolved",
                path
            );
            return None;
        };

        let result = parse_store_type(config.keystore_type.as_deref()).and_then(|store_type| {
            let bytes = self.locator.locate(path)?;
            KeyMaterial::load(&bytes, store_type, &password)
        });

        match result {
            Ok(material) => Some(material),
            Err(e) => {
                error!("Unable to obtain key material from key store {}: {}", path, e);
                None
            }
        }
    }

    fn trust_material(&self, config: &SecureChannelConfig, path: &str) -> Option<TrustMaterial> {
        let Some(password) = self.resolve_secret(
            config.truststore_credential_file.as_deref(),
            TRUSTSTORE_ALIAS,
        ) else {
            warn!(
                "Trust store {} is configured but its credential could not be resolved",
                path
            );
            return None;
        };

        let result = parse_store_type(config.truststore_type.as_deref()).and_then(|store_type| {
            let bytes = self.locator.locate(path)?;
            TrustMaterial::load(&bytes, store_type, &password)
        });

        match result {
            Ok(material) => Some(material),
            Err(e) => {
                error!(
                    "Unable to obtain trust material from trust store {}: {}",
                    path, e
                );
                None
            }
        }
    }

    fn resolve_secret(&self, locator: Option<&str>, alias: &str) -> Option<SecretString> {
        self.resolver.resolve(locator.unwrap_or_default(), alias)
    }
}

fn parse_store_type(value: Option<&str>) -> Result<StoreType> {
    value.map_or(Ok(StoreType::default()), str::parse)
}
