//! Client options as a higher layer supplies them.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tubemq_multiplexing::{DialOptions, Error, Result, TlsOptions};

/// Where the client connects and with which TLS material.
///
/// Absence of `ca_cert_file` means plaintext TCP; when it is set every other
/// TLS field must be set too.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// `host:port` of the broker.
    pub address: String,
    /// PEM file with the CA certificates trusted for the broker.
    pub ca_cert_file: Option<PathBuf>,
    /// PEM file with the client certificate chain.
    pub tls_cert_file: Option<PathBuf>,
    /// PEM file with the client private key.
    pub tls_key_file: Option<PathBuf>,
    /// Name the broker's certificate is validated against.
    pub tls_server_name: Option<String>,
}

impl ClientOptions {
    /// Plaintext options for `address`.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    /// Add TLS material.
    #[must_use]
    pub fn with_tls(
        mut self,
        ca_cert_file: impl Into<PathBuf>,
        cert_file: impl Into<PathBuf>,
        key_file: impl Into<PathBuf>,
        server_name: impl Into<String>,
    ) -> Self {
        self.ca_cert_file = Some(ca_cert_file.into());
        self.tls_cert_file = Some(cert_file.into());
        self.tls_key_file = Some(key_file.into());
        self.tls_server_name = Some(server_name.into());
        self
    }

    /// Convert into pool dial options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOptions`] if the address is empty, or if
    /// `ca_cert_file` is set while another TLS field is missing.
    pub fn dial_options(&self) -> Result<DialOptions> {
        if self.address.trim().is_empty() {
            return Err(Error::InvalidOptions("address is empty".to_string()));
        }

        let dial = DialOptions::tcp(self.address.clone());
        let Some(ca_cert_file) = &self.ca_cert_file else {
            return Ok(dial);
        };

        let missing = |field: &str| {
            Error::InvalidOptions(format!("ca_cert_file is set but {field} is missing"))
        };

        let tls = TlsOptions {
            ca_cert_file: ca_cert_file.clone(),
            cert_file: self
                .tls_cert_file
                .clone()
                .ok_or_else(|| missing("tls_cert_file"))?,
            key_file: self
                .tls_key_file
                .clone()
                .ok_or_else(|| missing("tls_key_file"))?,
            server_name: self
                .tls_server_name
                .clone()
                .ok_or_else(|| missing("tls_server_name"))?,
        };

        Ok(dial.with_tls(tls))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plaintext() {
        let dial = ClientOptions::new("127.0.0.1:8715").dial_options().unwrap();
        assert_eq!(dial.address, "127.0.0.1:8715");
        assert!(dial.tls.is_none());
    }

    #[test]
    fn test_full_tls() {
        let dial = ClientOptions::new("broker:8715")
            .with_tls("ca.pem", "client.pem", "client.key", "broker.local")
            .dial_options()
            .unwrap();

        let tls = dial.tls.unwrap();
        assert_eq!(tls.ca_cert_file, PathBuf::from("ca.pem"));
        assert_eq!(tls.server_name, "broker.local");
    }

    #[test]
    fn test_partial_tls_rejected() {
        let options = ClientOptions {
            address: "broker:8715".to_string(),
            ca_cert_file: Some("ca.pem".into()),
            tls_cert_file: Some("client.pem".into()),
            ..ClientOptions::default()
        };

        let err = options.dial_options().unwrap_err();
        assert!(matches!(err, Error::InvalidOptions(reason) if reason.contains("tls_key_file")));
    }

    #[test]
    fn test_tls_fields_ignored_without_ca() {
        let options = ClientOptions {
            address: "broker:8715".to_string(),
            tls_cert_file: Some("client.pem".into()),
            ..ClientOptions::default()
        };
        assert!(options.dial_options().unwrap().tls.is_none());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let options: ClientOptions =
            serde_json::from_str(r#"{"address":"broker:8715","tls_server_name":"broker"}"#)
                .unwrap();

        assert_eq!(options.address, "broker:8715");
        assert_eq!(options.tls_server_name.as_deref(), Some("broker"));
        assert!(options.ca_cert_file.is_none());
    }

    #[test]
    fn test_empty_address_rejected() {
        assert!(matches!(
            ClientOptions::default().dial_options(),
            Err(Error::InvalidOptions(_))
        ));
    }
}
