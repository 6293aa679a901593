//! Error types for the connection engine.

use std::io;
use std::time::Duration;
use tcpnet_common::ErrorCode;
use thiserror::Error;

/// Errors returned by connections, clients, servers and pools.
#[derive(Debug, Error)]
pub enum NetError {
    /// Socket allocation failed.
    #[error("Invalid socket: {0}")]
    InvalidSocket(String),

    /// TCP connection establishment failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Peer closed the connection or the socket was shut down.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Operation requires an established connection.
    #[error("Not connected")]
    NotConnected,

    /// Writing to the socket failed.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Reading from the socket failed.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Binding the listening socket failed.
    #[error("Bind failed: {0}")]
    BindFailed(String),

    /// Listening failed after a successful bind.
    #[error("Listen failed: {0}")]
    ListenFailed(String),

    /// Accepting an inbound connection failed.
    #[error("Accept failed: {0}")]
    AcceptFailed(String),

    /// Address could not be parsed or resolved.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Connect did not complete in time.
    #[error("Connection timeout after {0:?}")]
    Timeout(Duration),

    /// TLS/SSL error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level error not covered by a more specific variant.
    #[error("Transport error: {0}")]
    Io(#[from] io::Error),

    /// Internal error (should not happen in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl NetError {
    /// Classification of this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidSocket(_) => ErrorCode::InvalidSocket,
            Self::ConnectionFailed(_) => ErrorCode::ConnectionFailed,
            Self::ConnectionClosed | Self::NotConnected => ErrorCode::ConnectionClosed,
            Self::SendFailed(_) => ErrorCode::SendFailed,
            Self::ReceiveFailed(_) => ErrorCode::ReceiveFailed,
            Self::BindFailed(_) => ErrorCode::BindFailed,
            Self::ListenFailed(_) => ErrorCode::ListenFailed,
            Self::AcceptFailed(_) => ErrorCode::AcceptFailed,
            Self::InvalidAddress(_) => ErrorCode::InvalidAddress,
            Self::Timeout(_) => ErrorCode::Timeout,
            Self::Tls(_) => ErrorCode::SslError,
            Self::Io(e) => ErrorCode::from_io(e),
            Self::Config(_) | Self::Internal(_) => ErrorCode::UnknownError,
        }
    }

    /// Returns true if this error is potentially retryable.
    ///
    /// Retryable errors are transient network conditions; configuration and
    /// addressing mistakes will fail the same way again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::Timeout(_)
                | Self::ConnectionFailed(_)
                | Self::ConnectionClosed
                | Self::SendFailed(_)
                | Self::ReceiveFailed(_)
                | Self::Tls(_)
        )
    }

    /// Returns true if this is a fatal error that should not be retried.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !self.is_retryable()
    }
}
