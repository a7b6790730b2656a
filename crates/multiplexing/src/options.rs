//! Pool configuration and per-dial options.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tubemq_codec::frame::DEFAULT_MAX_PAYLOAD_SIZE;

/// Configuration for the connection pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum physical connections per address.
    pub max_connections_per_address: usize,
    /// In-flight requests above which another connection is dialed, if the
    /// address has room for one.
    pub max_in_flight_per_connection: usize,
    /// Time allowed for TCP connect plus TLS handshake.
    pub dial_timeout: Duration,
    /// Largest reassembled response payload accepted.
    pub max_payload_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections_per_address: 4,
            max_in_flight_per_connection: 256,
            dial_timeout: Duration::from_secs(3),
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }
}

impl PoolConfig {
    /// Set the maximum connections per address.
    #[must_use]
    pub const fn max_connections_per_address(mut self, max: usize) -> Self {
        self.max_connections_per_address = max;
        self
    }

    /// Set the per-connection soft capacity.
    #[must_use]
    pub const fn max_in_flight_per_connection(mut self, max: usize) -> Self {
        self.max_in_flight_per_connection = max;
        self
    }

    /// Set the dial timeout.
    #[must_use]
    pub const fn dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    /// Set the maximum response payload size.
    #[must_use]
    pub const fn max_payload_size(mut self, max: usize) -> Self {
        self.max_payload_size = max;
        self
    }
}

/// Transport network. Only TCP is spoken by the broker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Network {
    /// Plain or TLS-wrapped TCP.
    #[default]
    Tcp,
}

impl Network {
    /// The network's conventional name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutual TLS material. Either all of it is present or TLS is off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsOptions {
    /// PEM file with the CA certificates trusted for the broker.
    pub ca_cert_file: PathBuf,
    /// PEM file with the client certificate chain.
    pub cert_file: PathBuf,
    /// PEM file with the client private key.
    pub key_file: PathBuf,
    /// Name the broker's certificate is validated against.
    pub server_name: String,
}

/// Where and how to dial a broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialOptions {
    /// `host:port` of the broker.
    pub address: String,
    /// Transport network.
    pub network: Network,
    /// TLS material; `None` dials plaintext.
    pub tls: Option<TlsOptions>,
}

impl DialOptions {
    /// Plaintext TCP to `address`.
    #[must_use]
    pub fn tcp(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            network: Network::Tcp,
            tls: None,
        }
    }

    /// Dial with TLS.
    #[must_use]
    pub fn with_tls(mut self, tls: TlsOptions) -> Self {
        self.tls = Some(tls);
        self
    }
}
