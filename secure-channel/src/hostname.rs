/// Hostname check paired with a [`TlsContext`](crate::TlsContext).
///
/// A connection is accepted only when the host the peer presents equals the
/// host used to establish the connection. No wildcard expansion happens
/// here; certificate-level name matching is left to the TLS layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostnameVerifier;

impl HostnameVerifier {
    pub fn verify(&self, url_host: &str, peer_host: &str) -> bool {
        url_host == peer_host
    }
}
