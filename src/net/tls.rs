//! TLS configuration and certificate loading.

use std::path::Path;
use std::sync::Arc;

use rustls::ServerConfig;

use crate::error::WebError;

/// Build a [`rustls::ServerConfig`] from PEM-encoded certificate chain and key bytes.
///
/// ALPN advertises HTTP/2 and HTTP/1.1.
pub fn build_server_config(cert_pem: &[u8], key_pem: &[u8]) -> Result<Arc<ServerConfig>, WebError> {
    let certs = rustls_pemfile::certs(&mut std::io::BufReader::new(cert_pem))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| WebError::Tls(format!("failed to parse certificate chain: {e}")))?;
    if certs.is_empty() {
        return Err(WebError::Tls("no certificate found in PEM data".to_string()));
    }

    let key = rustls_pemfile::private_key(&mut std::io::BufReader::new(key_pem))
        .map_err(|e| WebError::Tls(format!("failed to read private key: {e}")))?
        .ok_or_else(|| WebError::Tls("no private key found in PEM data".to_string()))?;

    let mut config = ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| WebError::Tls(e.to_string()))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| WebError::Tls(format!("invalid certificate or key: {e}")))?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

/// Load certificate chain and key from PEM files.
pub fn load_server_config(cert_path: &Path, key_path: &Path) -> Result<Arc<ServerConfig>, WebError> {
    let read = |path: &Path, what: &str| {
        std::fs::read(path).map_err(|e| WebError::Tls(format!("failed to read {what} {}: {e}", path.display())))
    };
    let cert_pem = read(cert_path, "certificate")?;
    let key_pem = read(key_path, "private key")?;
    build_server_config(&cert_pem, &key_pem)
}
