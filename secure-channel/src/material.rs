//! Key and trust material derived from store files.

use crate::error::{ChannelError, Result};
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::stack::Stack;
use openssl::x509::X509;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::str::FromStr;

/// Store encodings the agent can load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreType {
    /// PKCS#12 archive, password protected
    #[default]
    Pkcs12,
    /// PEM bundle; for key stores the private key may be encrypted with the
    /// store password
    Pem,
}

impl FromStr for StoreType {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "pkcs12" | "p12" | "pfx" => Ok(Self::Pkcs12),
            "pem" => Ok(Self::Pem),
            "jks" | "jceks" => Err(ChannelError::UnsupportedStoreType(format!(
                "{} stores cannot be read; convert the store to PKCS#12",
                s
            ))),
            other => Err(ChannelError::UnsupportedStoreType(other.to_string())),
        }
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pkcs12 => write!(f, "pkcs12"),
            Self::Pem => write!(f, "pem"),
        }
    }
}

/// Client identity: private key, leaf certificate and any chain
/// certificates, plus a PKCS#12 encoding of the same for HTTP clients.
pub struct KeyMaterial {
    pub(crate) key: PKey<Private>,
    pub(crate) certificate: X509,
    pub(crate) chain: Vec<X509>,
    pkcs12_der: Vec<u8>,
    password: SecretString,
}

impl KeyMaterial {
    pub fn load(bytes: &[u8], store_type: StoreType, password: &SecretString) -> Result<Self> {
        let pass = password.expose_secret();

        let (key, certificate, chain, pkcs12_der) = match store_type {
            StoreType::Pkcs12 => {
                let parsed = Pkcs12::from_der(bytes)?.parse2(pass)?;
                let key = parsed.pkey.ok_or_else(|| {
                    ChannelError::InvalidStore("key store holds no private key".to_string())
                })?;
                let certificate = parsed.cert.ok_or_else(|| {
                    ChannelError::InvalidStore("key store holds no certificate".to_string())
                })?;
                let chain: Vec<X509> = parsed
                    .ca
                    .map(|ca| ca.into_iter().collect())
                    .unwrap_or_default();
                (key, certificate, chain, bytes.to_vec())
            }
            StoreType::Pem => {
                let key = PKey::private_key_from_pem_passphrase(bytes, pass.as_bytes())?;
                let mut certs = X509::stack_from_pem(bytes)?.into_iter();
                let certificate = certs.next().ok_or_else(|| {
                    ChannelError::InvalidStore("key store holds no certificate".to_string())
                })?;
                let chain: Vec<X509> = certs.collect();

                let mut ca = Stack::new()?;
                for cert in &chain {
                    ca.push(cert.clone())?;
                }
                let archive = Pkcs12::builder()
                    .name(crate::KEYSTORE_ALIAS)
                    .pkey(&key)
                    .cert(&certificate)
                    .ca(ca)
                    .build2(pass)?;
                (key, certificate, chain, archive.to_der()?)
            }
        };

        if !certificate.public_key()?.public_eq(&key) {
            return Err(ChannelError::InvalidStore(
                "private key does not match certificate".to_string(),
            ));
        }

        Ok(Self {
            key,
            certificate,
            chain,
            pkcs12_der,
            password: SecretString::from(pass.to_owned()),
        })
    }

    pub fn certificate(&self) -> &X509 {
        &self.certificate
    }

    pub fn chain(&self) -> &[X509] {
        &self.chain
    }

    /// Identity for `reqwest` built from the PKCS#12 encoding
    pub fn identity(&self) -> Result<reqwest::Identity> {
        Ok(reqwest::Identity::from_pkcs12_der(
            &self.pkcs12_der,
            self.password.expose_secret(),
        )?)
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("subject", &self.certificate.subject_name())
            .field("chain_len", &self.chain.len())
            .finish_non_exhaustive()
    }
}

/// Certificates trusted when verifying the remote authority
#[derive(Debug)]
pub struct TrustMaterial {
    pub(crate) anchors: Vec<X509>,
}

impl TrustMaterial {
    pub fn load(bytes: &[u8], store_type: StoreType, password: &SecretString) -> Result<Self> {
        let anchors: Vec<X509> = match store_type {
            StoreType::Pkcs12 => {
                let parsed = Pkcs12::from_der(bytes)?.parse2(password.expose_secret())?;
                parsed
                    .cert
                    .into_iter()
                    .chain(parsed.ca.into_iter().flatten())
                    .collect()
            }
            StoreType::Pem => X509::stack_from_pem(bytes)?,
        };

        if anchors.is_empty() {
            return Err(ChannelError::InvalidStore(
                "trust store holds no certificates".to_string(),
            ));
        }
        Ok(Self { anchors })
    }

    pub fn anchors(&self) -> &[X509] {
        &self.anchors
    }

    /// Trust anchors converted for `reqwest`
    pub fn certificates(&self) -> Result<Vec<reqwest::Certificate>> {
        self.anchors
            .iter()
            .map(|cert| Ok(reqwest::Certificate::from_der(&cert.to_der()?)?))
            .collect()
    }
}
