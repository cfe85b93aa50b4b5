//! Network error types.

use std::net::SocketAddr;

use pairplay_proto::ProtocolError;
use thiserror::Error;

/// Errors from sockets, QUIC and the session handshake.
#[derive(Debug, Error)]
pub enum NetError {
    /// A socket could not be bound.
    ///
    /// Usually the address is in use or not local.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address
        addr: SocketAddr,
        /// OS error
        #[source]
        source: std::io::Error,
    },

    /// Socket I/O failed after binding.
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS or QUIC endpoint setup failed.
    #[error("configuration error: {0}")]
    Config(String),

    /// The QUIC connection could not be made or was lost.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Reading or writing the session stream failed.
    #[error("stream error: {0}")]
    Stream(String),

    /// The remote sent something other than the expected handshake frame.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Bytes on the wire did not form a valid frame.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}
