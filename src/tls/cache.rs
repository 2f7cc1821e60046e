//! In-memory cache of issued domain certificates

use crate::tls::CertificateData;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Certificate cache entry with expiration
#[derive(Debug, Clone)]
struct CachedCertificate {
    cert_data: CertificateData,
    created_at: Instant,
    expires_at: Instant,
}

/// Domain → certificate map with a TTL and an entry cap.
///
/// When full, the oldest entry is evicted. The lock is never held across
/// certificate generation.
pub struct CertificateCache {
    entries: Mutex<HashMap<String, CachedCertificate>>,
    ttl: Duration,
    max_entries: usize,
}

impl CertificateCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        debug!("Creating certificate cache (ttl: {:?}, max_entries: {})", ttl, max_entries);
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Cached certificate for `domain`, if present and not expired
    pub fn get(&self, domain: &str) -> Option<CertificateData> {
        let key = domain.to_lowercase();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(&key) {
            Some(entry) if Instant::now() < entry.expires_at => Some(entry.cert_data.clone()),
            Some(_) => {
                debug!("Certificate for {} expired", domain);
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, domain: &str, cert_data: CertificateData) {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        entries.retain(|_, entry| now < entry.expires_at);
        while entries.len() >= self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.created_at)
                .map(|(domain, _)| domain.clone());
            match oldest {
                Some(oldest) => {
                    debug!("Evicting cached certificate for {}", oldest);
                    entries.remove(&oldest);
                }
                None => break,
            }
        }

        entries.insert(
            domain.to_lowercase(),
            CachedCertificate {
                cert_data,
                created_at: now,
                expires_at: now + self.ttl,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cache_info(&self) -> String {
        format!("memory cache: {}/{} entries, ttl {}s", self.len(), self.max_entries, self.ttl.as_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustls::{Certificate, PrivateKey};

    fn data(tag: u8) -> CertificateData {
        CertificateData {
            chain: vec![Certificate(vec![tag])],
            key: PrivateKey(vec![tag]),
        }
    }

    #[test]
    fn test_get_is_case_insensitive() {
        let cache = CertificateCache::new(Duration::from_secs(60), 10);
        cache.insert("API.example.com", data(1));
        assert_eq!(cache.get("api.EXAMPLE.com").unwrap().chain[0].0, vec![1]);
        assert!(cache.get("other.example.com").is_none());
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let cache = CertificateCache::new(Duration::ZERO, 10);
        cache.insert("api.example.com", data(1));
        assert!(cache.get("api.example.com").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let cache = CertificateCache::new(Duration::from_secs(60), 2);
        cache.insert("a.example.com", data(1));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("b.example.com", data(2));
        std::thread::sleep(Duration::from_millis(2));
        cache.insert("c.example.com", data(3));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a.example.com").is_none());
        assert!(cache.get("b.example.com").is_some());
        assert!(cache.get("c.example.com").is_some());
    }
}
