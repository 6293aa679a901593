//! Common types shared across the tcpnet crates.
//!
//! This crate provides the vocabulary used by both the low-level socket
//! primitives and the connection engine:
//! - [`ErrorCode`] - classification of every failure the engine can report
//! - [`ConnectionState`] - lifecycle state of a connection, client or server
//! - [`SocketOptions`] - socket configuration applied at creation time

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::time::Duration;

/// Classification of networking failures.
///
/// Platform errors are mapped into this enum in exactly one place,
/// [`ErrorCode::from_io`], so every caller agrees on what "would block" or
/// "connection reset" means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    InvalidSocket,
    ConnectionFailed,
    ConnectionClosed,
    SendFailed,
    ReceiveFailed,
    BindFailed,
    ListenFailed,
    AcceptFailed,
    InvalidAddress,
    Timeout,
    WouldBlock,
    SslError,
    UnknownError,
}

impl ErrorCode {
    /// Classify an I/O error.
    pub fn from_io(err: &io::Error) -> Self {
        use io::ErrorKind;

        match err.kind() {
            ErrorKind::WouldBlock | ErrorKind::Interrupted => Self::WouldBlock,
            ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof
            | ErrorKind::NotConnected => Self::ConnectionClosed,
            ErrorKind::ConnectionRefused => Self::ConnectionFailed,
            ErrorKind::TimedOut => Self::Timeout,
            ErrorKind::AddrNotAvailable | ErrorKind::InvalidInput => Self::InvalidAddress,
            _ => Self::UnknownError,
        }
    }

    /// Whether the code is a transient condition that callers retry in place.
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::WouldBlock)
    }

    /// Human-readable description.
    pub const fn description(self) -> &'static str {
        match self {
            Self::InvalidSocket => "Invalid socket",
            Self::ConnectionFailed => "Connection failed",
            Self::ConnectionClosed => "Connection closed",
            Self::SendFailed => "Send failed",
            Self::ReceiveFailed => "Receive failed",
            Self::BindFailed => "Bind failed",
            Self::ListenFailed => "Listen failed",
            Self::AcceptFailed => "Accept failed",
            Self::InvalidAddress => "Invalid address",
            Self::Timeout => "Operation timed out",
            Self::WouldBlock => "Operation would block",
            Self::SslError => "TLS error",
            Self::UnknownError => "Unknown error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Lifecycle state of a connection.
///
/// `Error` is reachable from any non-terminal state when I/O fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
    Error,
}

impl ConnectionState {
    /// Returns true if no further transitions are expected without a new connect.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Disconnected | Self::Error)
    }

    /// Returns true if the state allows sending and receiving data.
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Disconnecting => write!(f, "Disconnecting"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// Socket configuration applied at creation and re-appliable later.
///
/// Applying any individual option is best effort. Durations are stored in
/// configuration files as integer milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketOptions {
    #[serde(default = "default_true")]
    pub reuse_address: bool,
    #[serde(default = "default_true")]
    pub keep_alive: bool,
    #[serde(default = "default_true")]
    pub no_delay: bool,
    #[serde(default = "default_buffer_size")]
    pub send_buffer_size: usize,
    #[serde(default = "default_buffer_size")]
    pub receive_buffer_size: usize,
    #[serde(rename = "send_timeout_ms", with = "duration_ms", default = "default_io_timeout")]
    pub send_timeout: Duration,
    #[serde(rename = "receive_timeout_ms", with = "duration_ms", default = "default_io_timeout")]
    pub receive_timeout: Duration,
    #[serde(rename = "connect_timeout_ms", with = "duration_ms", default = "default_connect_timeout")]
    pub connect_timeout: Duration,
}

fn default_true() -> bool {
    true
}

fn default_buffer_size() -> usize {
    8192
}

fn default_io_timeout() -> Duration {
    Duration::from_millis(5_000)
}

fn default_connect_timeout() -> Duration {
    Duration::from_millis(10_000)
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            reuse_address: true,
            keep_alive: true,
            no_delay: true,
            send_buffer_size: default_buffer_size(),
            receive_buffer_size: default_buffer_size(),
            send_timeout: default_io_timeout(),
            receive_timeout: default_io_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

impl SocketOptions {
    /// Set `SO_REUSEADDR`.
    #[must_use]
    pub fn with_reuse_address(mut self, enabled: bool) -> Self {
        self.reuse_address = enabled;
        self
    }

    /// Set `SO_KEEPALIVE`.
    #[must_use]
    pub fn with_keep_alive(mut self, enabled: bool) -> Self {
        self.keep_alive = enabled;
        self
    }

    /// Set `TCP_NODELAY`.
    #[must_use]
    pub fn with_no_delay(mut self, enabled: bool) -> Self {
        self.no_delay = enabled;
        self
    }

    /// Set both kernel buffer sizes.
    #[must_use]
    pub fn with_buffer_sizes(mut self, send: usize, receive: usize) -> Self {
        self.send_buffer_size = send;
        self.receive_buffer_size = receive;
        self
    }

    /// Set send and receive timeouts.
    #[must_use]
    pub fn with_io_timeouts(mut self, send: Duration, receive: Duration) -> Self {
        self.send_timeout = send;
        self.receive_timeout = receive;
        self
    }

    /// Set the default connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Serde adapter storing a [`Duration`] as integer milliseconds.
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
