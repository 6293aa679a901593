//! Library context: defaults shared by the clients and servers an
//! application creates, plus version and feature information.
//!
//! There is no process-wide state. An application that wants common socket
//! defaults holds a [`Context`] and builds its endpoints through it.

use crate::client::Client;
use crate::server::Server;
use std::fmt;
use tcpnet_common::SocketOptions;

/// Library version, taken from the crate manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Parsed library version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    /// Single comparable number: `major * 10000 + minor * 100 + patch`.
    pub fn number(&self) -> u32 {
        self.major * 10_000 + self.minor * 100 + self.patch
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Defaults for new endpoints.
#[derive(Debug, Clone, Default)]
pub struct Context {
    default_options: SocketOptions,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context whose endpoints use `options`.
    pub fn with_options(options: SocketOptions) -> Self {
        Self {
            default_options: options,
        }
    }

    pub fn default_socket_options(&self) -> &SocketOptions {
        &self.default_options
    }

    pub fn set_default_socket_options(&mut self, options: SocketOptions) {
        self.default_options = options;
    }

    /// A client using the default socket options.
    pub fn client(&self) -> Client {
        Client::with_options(self.default_options.clone())
    }

    /// A server using the default socket options.
    pub fn server(&self) -> Server {
        Server::with_options(self.default_options.clone())
    }

    /// Library version.
    pub fn version() -> Version {
        let mut parts = VERSION.split('.').map(|part| {
            part.split(|c: char| !c.is_ascii_digit())
                .next()
                .and_then(|digits| digits.parse().ok())
                .unwrap_or(0)
        });
        Version {
            major: parts.next().unwrap_or(0),
            minor: parts.next().unwrap_or(0),
            patch: parts.next().unwrap_or(0),
        }
    }

    /// Multi-line build description.
    pub fn build_info() -> String {
        format!(
            "tcpnet v{}\nPlatform: {} ({})\nProfile: {}\nFeatures: {}\n",
            Self::version(),
            std::env::consts::OS,
            std::env::consts::ARCH,
            if cfg!(debug_assertions) { "debug" } else { "release" },
            Self::supported_features().join(", ")
        )
    }

    /// Names of the capabilities compiled into this build.
    pub fn supported_features() -> Vec<&'static str> {
        let mut features = vec![
            "TCP Client",
            "TCP Server",
            "Threading",
            "Connection Management",
            "Message Framing",
            "Rate Limiting",
            "Connection Pooling",
            "Logging",
            "Statistics",
            "SSL/TLS",
        ];
        if cfg!(feature = "cli") {
            features.push("Command Line");
        }
        features
    }
}
