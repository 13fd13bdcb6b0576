//! TLS policy for outbound probes: trusted CA bundles, certificate
//! verification toggles and mutual-TLS client identities.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use reqwest::{Certificate, ClientBuilder, Identity};

/// TLS settings for one probe. Rebuilt from the merged endpoint
/// configuration immediately before each request is issued.
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    /// PEM bundle of additional trusted CA certificates, merged with the
    /// platform defaults.
    pub trusted_ca_file: Option<PathBuf>,
    /// Disable all certificate verification (not recommended!).
    pub insecure_skip_verify: bool,
    /// Client certificate for mutual TLS, PEM format.
    pub mtls_cert_file: Option<PathBuf>,
    /// Client key for mutual TLS, PEM format.
    pub mtls_key_file: Option<PathBuf>,
}

impl TlsOptions {
    /// Check invariants and make sure every referenced PEM file loads.
    /// Called at configuration time so a bad file aborts the run before
    /// any traffic is sent.
    pub fn validate(&self) -> Result<()> {
        if self.mtls_cert_file.is_some() != self.mtls_key_file.is_some() {
            bail!("mTLS auth requires both --mtls-key-file and --mtls-cert-file");
        }
        if let Some(ca) = &self.trusted_ca_file {
            load_ca_bundle(ca)?;
        }
        self.load_identity()?;
        Ok(())
    }

    /// Apply this policy to a client under construction.
    pub fn apply(&self, mut builder: ClientBuilder) -> Result<ClientBuilder> {
        if let Some(ca) = &self.trusted_ca_file {
            for cert in load_ca_bundle(ca)? {
                builder = builder.add_root_certificate(cert);
            }
        }
        if self.insecure_skip_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(identity) = self.load_identity()? {
            builder = builder.identity(identity);
        }
        Ok(builder)
    }

    fn load_identity(&self) -> Result<Option<Identity>> {
        let (Some(cert), Some(key)) = (&self.mtls_cert_file, &self.mtls_key_file) else {
            return Ok(None);
        };
        let mut pem = fs::read(cert)
            .with_context(|| format!("failed to read mTLS cert file {}", cert.display()))?;
        pem.extend(
            fs::read(key)
                .with_context(|| format!("failed to read mTLS key file {}", key.display()))?,
        );
        let identity = Identity::from_pem(&pem).with_context(|| {
            format!(
                "failed to load mTLS key pair {}/{}",
                cert.display(),
                key.display()
            )
        })?;
        Ok(Some(identity))
    }
}

fn load_ca_bundle(path: &Path) -> Result<Vec<Certificate>> {
    let pem = fs::read(path)
        .with_context(|| format!("error loading specified CA file {}", path.display()))?;
    let certs = Certificate::from_pem_bundle(&pem)
        .with_context(|| format!("error loading specified CA file {}", path.display()))?;
    Ok(certs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(TlsOptions::default().validate().is_ok());
    }

    #[test]
    fn mtls_requires_both_files() {
        let opts = TlsOptions {
            mtls_cert_file: Some(PathBuf::from("client.pem")),
            ..TlsOptions::default()
        };
        let err = opts.validate().unwrap_err();
        assert!(err.to_string().contains("mTLS auth requires both"));
    }

    #[test]
    fn missing_ca_file_fails_validation() {
        let opts = TlsOptions {
            trusted_ca_file: Some(PathBuf::from("/nonexistent/ca.pem")),
            ..TlsOptions::default()
        };
        let err = opts.validate().unwrap_err();
        assert!(err.to_string().contains("error loading specified CA file"));
    }

    #[test]
    fn insecure_mode_applies() {
        let opts = TlsOptions {
            insecure_skip_verify: true,
            ..TlsOptions::default()
        };
        let builder = opts.apply(reqwest::Client::builder()).unwrap();
        assert!(builder.build().is_ok());
    }
}
