//! Certificate management CLI commands

use crate::tls::{pem_encode, CertificateAuthority};
use anyhow::{anyhow, Context, Result};
use clap::{Args, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Debug, Subcommand)]
pub enum CertCommand {
    /// Generate a new root CA for HTTPS interception
    GenerateCa(GenerateCaArgs),

    /// Check that a CA certificate and key load and belong together
    Validate(ValidateCaArgs),

    /// Issue a server certificate signed by the root CA
    Issue(IssueCertArgs),
}

#[derive(Debug, Args)]
pub struct GenerateCaArgs {
    /// Organization name for the CA
    #[arg(long, default_value = "Route Rewrite Proxy")]
    pub organization: String,

    /// Common name for the CA
    #[arg(long, default_value = "Route Rewrite Proxy CA")]
    pub common_name: String,

    /// CA validity period in days
    #[arg(long, default_value = "3650")]
    pub validity_days: u32,

    /// Output path for the CA certificate
    #[arg(long, default_value = "ca-certs/rootCA.crt")]
    pub cert_path: String,

    /// Output path for the CA private key
    #[arg(long, default_value = "ca-certs/rootCA.key")]
    pub key_path: String,

    /// Force overwrite existing files
    #[arg(long, default_value = "false")]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct ValidateCaArgs {
    /// Path to the CA certificate
    #[arg(long, default_value = "ca-certs/rootCA.crt")]
    pub cert_path: String,

    /// Path to the CA private key
    #[arg(long, default_value = "ca-certs/rootCA.key")]
    pub key_path: String,
}

#[derive(Debug, Args)]
pub struct IssueCertArgs {
    /// Domain name or IP address the certificate is for
    pub domain: String,

    /// Path to the CA certificate
    #[arg(long, default_value = "ca-certs/rootCA.crt")]
    pub ca_cert_path: String,

    /// Path to the CA private key
    #[arg(long, default_value = "ca-certs/rootCA.key")]
    pub ca_key_path: String,

    /// Certificate validity period in days
    #[arg(long, default_value = "30")]
    pub validity_days: u32,

    /// Directory receiving `<domain>.crt` and `<domain>.key`
    #[arg(long, default_value = "certs")]
    pub out_dir: String,
}

impl CertCommand {
    pub async fn execute(&self) -> Result<()> {
        match self {
            CertCommand::GenerateCa(args) => generate_ca(args).await,
            CertCommand::Validate(args) => validate_ca(args).await,
            CertCommand::Issue(args) => issue_certificate(args).await.map(|_| ()),
        }
    }
}

/// Generate a new root CA
async fn generate_ca(args: &GenerateCaArgs) -> Result<()> {
    info!("🔧 Generating root CA");
    info!("   Organization: {}", args.organization);
    info!("   Common Name: {}", args.common_name);
    info!("   Validity: {} days", args.validity_days);

    if !args.force && (Path::new(&args.cert_path).exists() || Path::new(&args.key_path).exists()) {
        return Err(anyhow!(
            "CA files already exist. Use --force to overwrite.\n  Certificate: {}\n  Key: {}",
            args.cert_path,
            args.key_path
        ));
    }

    let ca = CertificateAuthority::generate(&args.organization, &args.common_name, args.validity_days)?;
    ca.save(&args.cert_path, &args.key_path)?;

    info!("✅ Root CA generated successfully!");
    info!("📜 Certificate: {}", args.cert_path);
    info!("🔐 Private key: {}", args.key_path);
    info!("   Install the certificate in your client's trust store");
    Ok(())
}

/// Validate an existing CA
async fn validate_ca(args: &ValidateCaArgs) -> Result<()> {
    info!("🔍 Validating root CA");
    info!("   Certificate: {}", args.cert_path);
    info!("   Private key: {}", args.key_path);

    match CertificateAuthority::load(&args.cert_path, &args.key_path) {
        Ok(ca) => {
            // A CA that can sign a throwaway leaf is usable for interception
            ca.issue("validation.invalid", 1)?;
            info!("✅ Root CA validation successful!");
            Ok(())
        }
        Err(e) => {
            error!("❌ Root CA validation failed: {}", e);
            Err(e.into())
        }
    }
}

/// Issue a leaf certificate; returns the certificate and key paths written
async fn issue_certificate(args: &IssueCertArgs) -> Result<(PathBuf, PathBuf)> {
    info!("🔧 Issuing certificate for {}", args.domain);

    let ca = CertificateAuthority::load(&args.ca_cert_path, &args.ca_key_path)
        .with_context(|| format!("Failed to load root CA from {}", args.ca_cert_path))?;
    let cert_data = ca.issue(&args.domain, args.validity_days)?;

    fs::create_dir_all(&args.out_dir)?;
    let cert_path = Path::new(&args.out_dir).join(format!("{}.crt", args.domain));
    let key_path = Path::new(&args.out_dir).join(format!("{}.key", args.domain));

    let chain_pem: String = cert_data
        .chain
        .iter()
        .map(|cert| pem_encode("CERTIFICATE", &cert.0))
        .collect();
    fs::write(&cert_path, chain_pem)?;
    fs::write(&key_path, pem_encode("PRIVATE KEY", &cert_data.key.0))?;

    info!("✅ Certificate issued");
    info!("📜 Certificate chain: {}", cert_path.display());
    info!("🔐 Private key: {}", key_path.display());
    Ok((cert_path, key_path))
}
