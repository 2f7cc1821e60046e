//! TLS certificate management for HTTPS interception

pub mod cache;
pub mod cert_gen;
pub mod config;
pub mod interceptor;

pub use cache::CertificateCache;
pub use cert_gen::{load_pem_certs, load_pem_private_key, pem_encode, CertificateAuthority, CertificateData};
pub use config::{add_custom_root_ca, create_client_config, create_server_config, AcceptAllCertVerifier};
pub use interceptor::Interceptor;
