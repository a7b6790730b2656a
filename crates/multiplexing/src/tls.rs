//! Client-side TLS setup from PEM files.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use std::sync::Arc;

use rustls::{ClientConfig, RootCertStore};
use rustls_pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use thiserror::Error;
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::options::TlsOptions;

/// TLS setup failures.
#[derive(Debug, Error)]
pub enum TlsError {
    /// A PEM file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// The file.
        path: String,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// A PEM file held no usable certificate.
    #[error("no certificates found in {0}")]
    NoCertificates(String),

    /// A PEM file held no usable private key.
    #[error("no private key found in {0}")]
    NoPrivateKey(String),

    /// The server name is not a valid DNS name or IP address.
    #[error("invalid server name {0:?}")]
    InvalidServerName(String),

    /// rustls rejected the configuration.
    #[error("TLS configuration error: {0}")]
    Config(#[from] rustls::Error),
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| TlsError::Read {
            path: path.display().to_string(),
            source,
        })
}

/// Load all certificates from a PEM file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or holds no certificate.
pub fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Read {
            path: path.display().to_string(),
            source,
        })?;

    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.display().to_string()));
    }

    Ok(certs)
}

/// Load the first private key from a PEM file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or holds no private key.
pub fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsError::Read {
            path: path.display().to_string(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(path.display().to_string()))
}

/// Build a mutual-TLS client config trusting only the configured CA.
///
/// # Errors
///
/// Returns an error if any PEM file is unusable or rustls rejects the
/// certificate/key pair.
pub fn client_config(options: &TlsOptions) -> Result<Arc<ClientConfig>, TlsError> {
    let mut roots = RootCertStore::empty();
    for cert in load_certs(&options.ca_cert_file)? {
        roots.add(cert)?;
    }

    let chain = load_certs(&options.cert_file)?;
    let key = load_private_key(&options.key_file)?;

    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_client_auth_cert(chain, key)?;

    debug!(
        ca = %options.ca_cert_file.display(),
        server_name = %options.server_name,
        "built TLS client config"
    );

    Ok(Arc::new(config))
}

/// Connector plus the name the peer certificate must match.
///
/// # Errors
///
/// Returns an error if the config cannot be built or the server name is
/// invalid.
pub fn connector(options: &TlsOptions) -> Result<(TlsConnector, ServerName<'static>), TlsError> {
    let server_name = ServerName::try_from(options.server_name.clone())
        .map_err(|_| TlsError::InvalidServerName(options.server_name.clone()))?;
    Ok((TlsConnector::from(client_config(options)?), server_name))
}
