//! Establishing the physical byte stream to a broker.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{Error, Result};
use crate::options::{DialOptions, Network};
use crate::tls;

/// A bidirectional byte stream a connection can run over.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

/// Type-erased stream, plain TCP or TLS.
pub type BoxedStream = Box<dyn AsyncStream>;

fn dial_error(address: &str, reason: impl ToString) -> Error {
    Error::Dial {
        address: address.to_string(),
        reason: reason.to_string(),
    }
}

/// Connect to `options.address`, wrapping in TLS when configured.
///
/// The whole exchange (connect plus handshake) is bounded by `dial_timeout`.
///
/// # Errors
///
/// Returns [`Error::Dial`] if the connect or handshake fails or times out.
pub async fn dial(options: &DialOptions, dial_timeout: Duration) -> Result<BoxedStream> {
    timeout(dial_timeout, connect(options))
        .await
        .map_err(|_| dial_error(&options.address, format!("timed out after {dial_timeout:?}")))?
}

async fn connect(options: &DialOptions) -> Result<BoxedStream> {
    let address = options.address.as_str();

    let stream = match options.network {
        Network::Tcp => TcpStream::connect(address)
            .await
            .map_err(|e| dial_error(address, e))?,
    };
    stream.set_nodelay(true).map_err(|e| dial_error(address, e))?;

    let Some(tls_options) = &options.tls else {
        debug!(address, "connected");
        return Ok(Box::new(stream));
    };

    // PEM files are read with blocking I/O.
    let blocking_options = tls_options.clone();
    let (connector, server_name) =
        tokio::task::spawn_blocking(move || tls::connector(&blocking_options))
            .await
            .map_err(|e| dial_error(address, e))?
            .map_err(|e| dial_error(address, e))?;
    let stream = connector
        .connect(server_name, stream)
        .await
        .map_err(|e| dial_error(address, format!("TLS handshake failed: {e}")))?;

    debug!(address, server_name = %tls_options.server_name, "connected with TLS");
    Ok(Box::new(stream))
}
