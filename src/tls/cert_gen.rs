//! Certificate authority and per-domain certificate issuance

use crate::error::{Error, Result};
use base64::{engine::general_purpose, Engine as _};
use chrono::{Datelike, Duration, Utc};
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyPair, KeyUsagePurpose, SanType,
};
use rustls::{Certificate as RustlsCertificate, PrivateKey};
use std::fs;
use std::io::BufReader;
use std::net::IpAddr;
use std::path::Path;
use tracing::{debug, info, warn};

/// Certificate data containing both certificate and private key
#[derive(Debug, Clone)]
pub struct CertificateData {
    /// Leaf first, followed by the issuing CA
    pub chain: Vec<RustlsCertificate>,
    pub key: PrivateKey,
}

/// Signing CA used to mint certificates for intercepted domains
pub struct CertificateAuthority {
    signer: Certificate,
    cert_der: Vec<u8>,
    key_pem: String,
}

impl CertificateAuthority {
    /// Generate a fresh self-signed CA
    pub fn generate(organization: &str, common_name: &str, validity_days: u32) -> Result<Self> {
        info!("📜 Generating root CA '{}' ({} days)", common_name, validity_days);

        let mut params = CertificateParams::new(Vec::new());
        let mut distinguished_name = DistinguishedName::new();
        distinguished_name.push(DnType::OrganizationName, organization);
        distinguished_name.push(DnType::CommonName, common_name);
        params.distinguished_name = distinguished_name;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        set_validity(&mut params, validity_days);

        let signer = Certificate::from_params(params)?;
        let cert_der = signer.serialize_der()?;
        let key_pem = signer.serialize_private_key_pem();

        Ok(Self {
            signer,
            cert_der,
            key_pem,
        })
    }

    /// Load a CA from PEM certificate and key files
    pub fn load(cert_path: &str, key_path: &str) -> Result<Self> {
        debug!("Loading CA from {} and {}", cert_path, key_path);

        let cert_pem = fs::read_to_string(cert_path)
            .map_err(|e| Error::Certificate(format!("Failed to read CA certificate {}: {}", cert_path, e)))?;
        let key_pem = fs::read_to_string(key_path)
            .map_err(|e| Error::Certificate(format!("Failed to read CA key {}: {}", key_path, e)))?;

        let key_pair = KeyPair::from_pem(&key_pem)?;
        let params = CertificateParams::from_ca_cert_pem(&cert_pem, key_pair)?;
        let signer = Certificate::from_params(params)?;

        let cert_der = load_pem_certs(cert_pem.as_bytes())?
            .into_iter()
            .next()
            .map(|c| c.0)
            .ok_or_else(|| Error::Certificate(format!("No certificate found in {}", cert_path)))?;

        info!("📜 Loaded root CA from {}", cert_path);
        Ok(Self {
            signer,
            cert_der,
            key_pem,
        })
    }

    /// Load the CA, generating and saving one first if allowed and missing
    pub fn load_or_generate(
        cert_path: &str,
        key_path: &str,
        auto_generate: bool,
        organization: &str,
        common_name: &str,
        validity_days: u32,
    ) -> Result<Self> {
        if Path::new(cert_path).exists() && Path::new(key_path).exists() {
            return Self::load(cert_path, key_path);
        }

        if !auto_generate {
            return Err(Error::Certificate(format!(
                "CA files not found: {} and {}. Run `cert generate-ca` or enable auto_generate_ca",
                cert_path, key_path
            )));
        }

        warn!("Root CA not found at {} or {}", cert_path, key_path);
        let ca = Self::generate(organization, common_name, validity_days)?;
        ca.save(cert_path, key_path)?;
        info!("   Install {} in your client's trust store to avoid certificate warnings", cert_path);
        Ok(ca)
    }

    /// Write the CA certificate and key as PEM
    pub fn save(&self, cert_path: &str, key_path: &str) -> Result<()> {
        for path in [cert_path, key_path] {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
        }

        fs::write(cert_path, pem_encode("CERTIFICATE", &self.cert_der))?;
        fs::write(key_path, &self.key_pem)?;

        info!("💾 Saved CA certificate to {}", cert_path);
        info!("💾 Saved CA private key to {}", key_path);
        Ok(())
    }

    pub fn cert_der(&self) -> &[u8] {
        &self.cert_der
    }

    /// Issue a server certificate for `domain` signed by this CA
    pub fn issue(&self, domain: &str, validity_days: u32) -> Result<CertificateData> {
        debug!("Issuing certificate for {}", domain);

        let mut params = CertificateParams::new(Vec::new());
        let mut distinguished_name = DistinguishedName::new();
        distinguished_name.push(DnType::CommonName, domain);
        params.distinguished_name = distinguished_name;
        params.subject_alt_names = vec![match domain.parse::<IpAddr>() {
            Ok(ip) => SanType::IpAddress(ip),
            Err(_) => SanType::DnsName(domain.to_string()),
        }];
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
        set_validity(&mut params, validity_days);

        let leaf = Certificate::from_params(params)?;
        let leaf_der = leaf.serialize_der_with_signer(&self.signer)?;

        Ok(CertificateData {
            chain: vec![RustlsCertificate(leaf_der), RustlsCertificate(self.cert_der.clone())],
            key: PrivateKey(leaf.serialize_private_key_der()),
        })
    }
}

/// Backdate by a day to tolerate client clock skew
fn set_validity(params: &mut CertificateParams, validity_days: u32) {
    let not_before = Utc::now() - Duration::days(1);
    let not_after = Utc::now() + Duration::days(i64::from(validity_days));
    params.not_before = rcgen::date_time_ymd(not_before.year(), not_before.month() as u8, not_before.day() as u8);
    params.not_after = rcgen::date_time_ymd(not_after.year(), not_after.month() as u8, not_after.day() as u8);
}

/// PEM-encode DER data with 64-column lines
pub fn pem_encode(label: &str, der: &[u8]) -> String {
    let b64 = general_purpose::STANDARD.encode(der);
    let lines: Vec<&str> = b64
        .as_bytes()
        .chunks(64)
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or(""))
        .collect();
    format!("-----BEGIN {label}-----\n{}\n-----END {label}-----\n", lines.join("\n"))
}

/// Parse every certificate in PEM data
pub fn load_pem_certs(pem: &[u8]) -> Result<Vec<RustlsCertificate>> {
    let mut reader = BufReader::new(pem);
    let certs = rustls_pemfile::certs(&mut reader)
        .map_err(|e| Error::Certificate(format!("Invalid certificate PEM: {}", e)))?;
    Ok(certs.into_iter().map(RustlsCertificate).collect())
}

/// Parse the first PKCS#8, RSA or SEC1 private key in PEM data
pub fn load_pem_private_key(pem: &[u8]) -> Result<PrivateKey> {
    first_key(pem, rustls_pemfile::pkcs8_private_keys)
        .or_else(|| first_key(pem, rustls_pemfile::rsa_private_keys))
        .or_else(|| first_key(pem, rustls_pemfile::ec_private_keys))
        .map(PrivateKey)
        .ok_or_else(|| Error::Certificate("No supported private key found in PEM data".to_string()))
}

fn first_key(
    pem: &[u8],
    parse: fn(&mut dyn std::io::BufRead) -> std::io::Result<Vec<Vec<u8>>>,
) -> Option<Vec<u8>> {
    let mut reader = BufReader::new(pem);
    parse(&mut reader).ok()?.into_iter().next()
}
