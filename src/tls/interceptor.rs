//! Per-domain TLS acceptors for decrypting CONNECT tunnels

use crate::config::settings::TlsConfig;
use crate::error::Result;
use crate::tls::{create_server_config, CertificateAuthority, CertificateCache};
use std::time::Duration;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info};

/// Hands out TLS acceptors presenting a CA-signed certificate for the
/// requested domain, issuing and caching certificates on demand.
pub struct Interceptor {
    ca: CertificateAuthority,
    cache: CertificateCache,
    leaf_validity_days: u32,
}

impl Interceptor {
    pub fn new(ca: CertificateAuthority, cache: CertificateCache, leaf_validity_days: u32) -> Self {
        Self {
            ca,
            cache,
            leaf_validity_days,
        }
    }

    /// Load (or generate) the CA named in `tls` and size the cache from it
    pub fn from_config(tls: &TlsConfig) -> Result<Self> {
        let ca = CertificateAuthority::load_or_generate(
            &tls.ca_cert_path,
            &tls.ca_key_path,
            tls.auto_generate_ca,
            &tls.ca_organization,
            &tls.ca_common_name,
            tls.ca_validity_days,
        )?;
        let cache = CertificateCache::new(Duration::from_secs(tls.cert_cache_ttl_secs), tls.cert_cache_max_entries);
        info!("🔐 Certificate cache initialized: {}", cache.cache_info());
        Ok(Self::new(ca, cache, tls.leaf_validity_days))
    }

    pub fn acceptor_for(&self, domain: &str) -> Result<TlsAcceptor> {
        let cert_data = match self.cache.get(domain) {
            Some(cert) => {
                debug!("🎯 Using cached certificate for {}", domain);
                cert
            }
            None => {
                let cert = self.ca.issue(domain, self.leaf_validity_days)?;
                self.cache.insert(domain, cert.clone());
                info!("💾 Issued certificate for {}", domain);
                cert
            }
        };

        Ok(TlsAcceptor::from(create_server_config(&cert_data)?))
    }

    pub fn cache(&self) -> &CertificateCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acceptor_reuses_cached_certificate() {
        let ca = CertificateAuthority::generate("Test Org", "Test CA", 30).unwrap();
        let interceptor = Interceptor::new(ca, CertificateCache::new(Duration::from_secs(60), 10), 7);

        interceptor.acceptor_for("api.example.com").unwrap();
        let first = interceptor.cache().get("api.example.com").unwrap();
        interceptor.acceptor_for("API.EXAMPLE.COM").unwrap();
        let second = interceptor.cache().get("api.example.com").unwrap();

        assert_eq!(interceptor.cache().len(), 1);
        assert_eq!(first.chain[0].0, second.chain[0].0);
    }

    #[test]
    fn test_from_config_generates_missing_ca() {
        let dir = tempfile::tempdir().unwrap();
        let mut tls = TlsConfig::default();
        tls.ca_cert_path = dir.path().join("rootCA.crt").to_string_lossy().to_string();
        tls.ca_key_path = dir.path().join("rootCA.key").to_string_lossy().to_string();

        let interceptor = Interceptor::from_config(&tls).unwrap();
        assert!(interceptor.acceptor_for("127.0.0.1").is_ok());
        assert!(std::path::Path::new(&tls.ca_cert_path).exists());
    }
}
