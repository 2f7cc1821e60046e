//! TLS configuration utilities

use crate::config::settings::TlsConfig;
use crate::error::{Error, Result};
use crate::tls::cert_gen::{load_pem_certs, CertificateData};
use rustls::client::{ServerCertVerified, ServerCertVerifier};
use rustls::{Certificate, ClientConfig, RootCertStore, ServerConfig};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Create rustls ServerConfig for the client-facing side of an intercepted tunnel
pub fn create_server_config(cert_data: &CertificateData) -> Result<Arc<ServerConfig>> {
    debug!("Creating TLS server configuration");

    let mut config = ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(cert_data.chain.clone(), cert_data.key.clone())
        .map_err(|e| Error::Tls(format!("Failed to create TLS server config: {}", e)))?;

    // decrypted traffic is served with hyper's HTTP/1 connection only
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

/// Create rustls ClientConfig for upstream connections
pub fn create_client_config(tls_config: &TlsConfig) -> Result<ClientConfig> {
    debug!("Creating TLS client configuration");

    if tls_config.skip_upstream_cert_verify {
        warn!("⚠️  WARNING: Skipping upstream certificate verification (insecure)");
        return Ok(ClientConfig::builder()
            .with_safe_defaults()
            .with_custom_certificate_verifier(Arc::new(AcceptAllCertVerifier))
            .with_no_client_auth());
    }

    let mut root_store = RootCertStore::empty();
    add_system_root_certificates(&mut root_store);

    if let Some(root_ca_path) = &tls_config.root_ca_cert_path {
        add_custom_root_ca(&mut root_store, root_ca_path)?;
    }

    if root_store.is_empty() {
        warn!("Upstream trust store is empty; every HTTPS upstream will fail verification");
    }

    Ok(ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(root_store)
        .with_no_client_auth())
}

/// Add system root certificates to the root store
fn add_system_root_certificates(root_store: &mut RootCertStore) {
    debug!("Loading system root certificates");

    match rustls_native_certs::load_native_certs() {
        Ok(certs) => {
            let mut added = 0;
            let mut failed = 0;

            for cert_der in certs {
                match root_store.add(&Certificate(cert_der.to_vec())) {
                    Ok(_) => added += 1,
                    Err(_) => failed += 1,
                }
            }

            info!("✅ Root certificate store initialized ({} added, {} rejected)", added, failed);
        }
        Err(e) => {
            // Don't fail completely if system certs can't be loaded
            warn!("⚠️  Could not load system root certificates: {}", e);
        }
    }
}

/// Add custom root CA certificate(s) from a PEM file to the root store
pub fn add_custom_root_ca(root_store: &mut RootCertStore, root_ca_path: &str) -> Result<()> {
    debug!("Loading custom root CA certificate from {}", root_ca_path);

    let pem = std::fs::read(root_ca_path)
        .map_err(|e| Error::Certificate(format!("Failed to read root CA {}: {}", root_ca_path, e)))?;
    let certs = load_pem_certs(&pem)?;
    if certs.is_empty() {
        return Err(Error::Certificate(format!("No certificate found in {}", root_ca_path)));
    }

    for cert in &certs {
        root_store
            .add(cert)
            .map_err(|e| Error::Certificate(format!("Failed to add root CA {}: {:?}", root_ca_path, e)))?;
    }

    info!("✅ Custom root CA certificate added to trust store: {}", root_ca_path);
    Ok(())
}

/// Certificate verifier that accepts everything (testing only)
pub struct AcceptAllCertVerifier;

impl ServerCertVerifier for AcceptAllCertVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &rustls::ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: std::time::SystemTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::{pem_encode, CertificateAuthority};
    use tempfile::tempdir;

    #[test]
    fn test_server_config_accepts_issued_leaf() {
        let ca = CertificateAuthority::generate("Test Org", "Test CA", 30).unwrap();
        let leaf = ca.issue("mirror.example.net", 7).unwrap();

        let config = create_server_config(&leaf).unwrap();
        assert_eq!(config.alpn_protocols, vec![b"http/1.1".to_vec()]);
    }

    #[test]
    fn test_client_config_with_custom_root() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("extra.crt");
        let ca = CertificateAuthority::generate("Test Org", "Test CA", 30).unwrap();
        std::fs::write(&path, pem_encode("CERTIFICATE", ca.cert_der())).unwrap();

        let mut tls = TlsConfig::default();
        tls.root_ca_cert_path = Some(path.to_string_lossy().to_string());
        assert!(create_client_config(&tls).is_ok());

        tls.root_ca_cert_path = Some("/nonexistent/root.crt".to_string());
        assert!(create_client_config(&tls).is_err());
    }

    #[test]
    fn test_client_config_skip_verify() {
        let mut tls = TlsConfig::default();
        tls.skip_upstream_cert_verify = true;
        assert!(create_client_config(&tls).is_ok());
    }
}
