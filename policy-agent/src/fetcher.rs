//! Retrieval of policy snapshots from the policy authority.

use crate::error::{AgentError, FetchError};
use async_trait::async_trait;
use policy_cache::PolicySnapshot;
use reqwest::header::ACCEPT;
use reqwest::redirect::Policy;
use reqwest::Url;
use secure_channel::{HostnameVerifier, SecureChannelConfig, TlsContextBuilder};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

const MAX_REDIRECTS: usize = 5;

/// Source of policy snapshots
#[async_trait]
pub trait PolicyFetcher: Send + Sync {
    /// Where policies come from, for log messages
    fn describe(&self) -> String;

    async fn fetch(&self) -> Result<PolicySnapshot, FetchError>;
}

/// TLS settings used to build the HTTPS client on first use
pub struct ChannelSettings {
    pub builder: TlsContextBuilder,
    pub config: SecureChannelConfig,
}

/// Fetches the policy document over HTTP(S).
///
/// For `https` URLs the client is built from a TLS context the first time
/// it is needed and reused afterwards. If no context can be built the fetch
/// fails with [`FetchError::ChannelUnavailable`] and the next fetch tries
/// again.
pub struct HttpPolicyFetcher {
    url: Url,
    host: String,
    timeout: Duration,
    channel: Option<ChannelSettings>,
    client: Mutex<Option<reqwest::Client>>,
    verifier: HostnameVerifier,
}

impl HttpPolicyFetcher {
    pub fn new(url: Url, timeout: Duration, channel: Option<ChannelSettings>) -> Self {
        let host = url.host_str().unwrap_or_default().to_string();
        Self {
            url,
            host,
            timeout,
            channel,
            client: Mutex::new(None),
            verifier: HostnameVerifier,
        }
    }

    fn client(&self) -> Result<reqwest::Client, FetchError> {
        let mut cached = match self.client.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(client) = cached.as_ref() {
            return Ok(client.clone());
        }

        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .redirect(same_host_redirects(self.host.clone(), self.verifier));

        if self.url.scheme() == "https" {
            let context = self
                .channel
                .as_ref()
                .and_then(|channel| channel.builder.build(&channel.config))
                .ok_or_else(|| FetchError::ChannelUnavailable(self.url.to_string()))?;
            builder = context
                .apply_to(builder)
                .map_err(|e| FetchError::ChannelUnavailable(format!("{}: {}", self.url, e)))?;
        }

        let client = builder.build()?;
        info!("HTTP client for {} initialized", self.url);
        *cached = Some(client.clone());
        Ok(client)
    }
}

/// Redirects are only followed while they stay on the expected host
fn same_host_redirects(expected_host: String, verifier: HostnameVerifier) -> Policy {
    Policy::custom(move |attempt| {
        let host = attempt.url().host_str().unwrap_or_default().to_string();
        if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else if verifier.verify(&expected_host, &host) {
            attempt.follow()
        } else {
            attempt.error(format!("redirect to untrusted host {}", host))
        }
    })
}

#[async_trait]
impl PolicyFetcher for HttpPolicyFetcher {
    fn describe(&self) -> String {
        self.url.to_string()
    }

    async fn fetch(&self) -> Result<PolicySnapshot, FetchError> {
        let client = self.client()?;

        let response = client
            .get(self.url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let peer_host = response.url().host_str().unwrap_or_default();
        if !self.verifier.verify(&self.host, peer_host) {
            return Err(FetchError::HostMismatch {
                expected: self.host.clone(),
                actual: peer_host.to_string(),
            });
        }

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: self.url.to_string(),
            });
        }

        let body = response.bytes().await?;
        debug!("Fetched {} bytes from {}", body.len(), self.url);
        PolicySnapshot::from_slice(&body).map_err(|e| FetchError::Malformed(e.to_string()))
    }
}

/// Reads the policy document from a local file
pub struct FilePolicyFetcher {
    path: PathBuf,
}

impl FilePolicyFetcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PolicyFetcher for FilePolicyFetcher {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<PolicySnapshot, FetchError> {
        let bytes = tokio::fs::read(&self.path).await?;
        PolicySnapshot::from_slice(&bytes).map_err(|e| FetchError::Malformed(e.to_string()))
    }
}

/// Pick a fetcher for `policy_url` by scheme
pub fn fetcher_for_url(
    policy_url: &str,
    timeout: Duration,
    channel: Option<ChannelSettings>,
) -> Result<Box<dyn PolicyFetcher>, AgentError> {
    let url = Url::parse(policy_url)
        .map_err(|e| AgentError::Config(format!("Invalid policy_url {}: {}", policy_url, e)))?;

    match url.scheme() {
        "file" => {
            let path = url
                .to_file_path()
                .map_err(|_| AgentError::Config(format!("Invalid file URL {}", policy_url)))?;
            Ok(Box::new(FilePolicyFetcher::new(path)))
        }
        "http" | "https" => {
            if url.host_str().is_none() {
                return Err(AgentError::Config(format!(
                    "policy_url {} has no host",
                    policy_url
                )));
            }
            Ok(Box::new(HttpPolicyFetcher::new(url, timeout, channel)))
        }
        other => Err(AgentError::Config(format!(
            "Unsupported policy_url scheme {}",
            other
        ))),
    }
}
