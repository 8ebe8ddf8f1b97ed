//! TLS configuration for the HTTP server
//!
//! Certificates and keys are read from PEM files and turned into a rustls
//! `ServerConfig` for actix-web.

use std::{path::PathBuf, sync::Arc};

use rustls::ServerConfig;
use rustls_pki_types::{CertificateDer, PrivateKeyDer, pem::PemObject};

/// TLS configuration for the HTTP server
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    pub enabled: bool,
    /// Path to the server certificate chain (PEM format)
    pub cert_path: Option<PathBuf>,
    /// Path to the server private key (PEM format)
    pub key_path: Option<PathBuf>,
}

impl TlsConfig {
    /// Check if TLS is properly configured
    pub fn is_configured(&self) -> bool {
        self.cert_path.is_some() && self.key_path.is_some()
    }

    pub fn should_use_tls(&self) -> bool {
        self.enabled && self.is_configured()
    }

    /// Build the rustls server configuration from the PEM files
    pub fn server_config(&self) -> anyhow::Result<ServerConfig> {
        let (Some(cert_path), Some(key_path)) = (&self.cert_path, &self.key_path) else {
            anyhow::bail!("TLS certificate or private key path is not configured");
        };

        let certs = CertificateDer::pem_file_iter(cert_path)
            .map_err(|e| anyhow::anyhow!("failed to read certificate {:?}: {}", cert_path, e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("failed to parse certificate {:?}: {}", cert_path, e))?;
        if certs.is_empty() {
            anyhow::bail!("no certificate found in {:?}", cert_path);
        }

        let key = PrivateKeyDer::from_pem_file(key_path)
            .map_err(|e| anyhow::anyhow!("failed to read private key {:?}: {}", key_path, e))?;

        let config =
            ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
                .with_safe_default_protocol_versions()?
                .with_no_client_auth()
                .with_single_cert(certs, key)?;

        Ok(config)
    }
}

/// Result of TLS configuration validation
#[derive(Debug)]
pub struct TlsValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl TlsValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: &str) {
        self.valid = false;
        self.errors.push(error.to_string());
    }
}

impl Default for TlsValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate TLS configuration
pub fn validate_tls_config(config: &TlsConfig) -> TlsValidationResult {
    let mut result = TlsValidationResult::new();

    if !config.enabled {
        return result;
    }

    match &config.cert_path {
        None => result.add_error("TLS is enabled but certificate path is not configured"),
        Some(path) if !path.exists() => {
            result.add_error(&format!("Certificate file not found: {:?}", path))
        }
        Some(_) => {}
    }
    match &config.key_path {
        None => result.add_error("TLS is enabled but private key path is not configured"),
        Some(path) if !path.exists() => {
            result.add_error(&format!("Private key file not found: {:?}", path))
        }
        Some(_) => {}
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TlsConfig::default();
        assert!(!config.enabled);
        assert!(!config.is_configured());
        assert!(!config.should_use_tls());
        assert!(validate_tls_config(&config).valid);
    }

    #[test]
    fn test_is_configured() {
        let mut config = TlsConfig {
            enabled: true,
            ..Default::default()
        };
        assert!(!config.should_use_tls());

        config.cert_path = Some(PathBuf::from("/path/to/cert.pem"));
        assert!(!config.is_configured());

        config.key_path = Some(PathBuf::from("/path/to/key.pem"));
        assert!(config.is_configured());
        assert!(config.should_use_tls());
    }

    #[test]
    fn test_validate_missing_paths() {
        let config = TlsConfig {
            enabled: true,
            ..Default::default()
        };
        let result = validate_tls_config(&config);

        assert!(!result.valid);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_validate_missing_files() {
        let config = TlsConfig {
            enabled: true,
            cert_path: Some(PathBuf::from("/nonexistent/cert.pem")),
            key_path: Some(PathBuf::from("/nonexistent/key.pem")),
        };
        let result = validate_tls_config(&config);

        assert!(!result.valid);
        assert!(result.errors[0].contains("Certificate file not found"));
        assert!(result.errors[1].contains("Private key file not found"));
    }

    #[test]
    fn test_server_config_requires_paths() {
        assert!(TlsConfig::default().server_config().is_err());
    }

    #[test]
    fn test_server_config_rejects_non_pem_files() {
        let dir = tempfile::tempdir().unwrap();
        let cert_path = dir.path().join("server.crt");
        let key_path = dir.path().join("server.key");
        std::fs::write(&cert_path, "not a certificate").unwrap();
        std::fs::write(&key_path, "not a key").unwrap();

        let config = TlsConfig {
            enabled: true,
            cert_path: Some(cert_path),
            key_path: Some(key_path),
        };
        assert!(validate_tls_config(&config).valid);
        assert!(config.server_config().is_err());
    }
}
