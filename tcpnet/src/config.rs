//! Configuration types for clients and servers.
//!
//! Both configurations deserialize from TOML. Durations are integer
//! milliseconds, matching the socket option keys in [`SocketOptions`].
//!
//! ```toml
//! [connection]
//! host = "127.0.0.1"
//! port = 7777
//!
//! [reconnect]
//! enabled = true
//! interval_ms = 2000
//! ```

use crate::errors::NetError;
use crate::transport::{TlsConfig, TlsServerConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tcpnet_common::SocketOptions;
use tcpnet_proto::{FramingConfig, RateLimitConfig};

/// Complete client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Connection settings.
    pub connection: ConnectionConfig,
    /// Socket options.
    #[serde(default)]
    pub socket: SocketOptions,
    /// Reconnection settings.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    /// Heartbeat settings.
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    /// Outbound rate limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitConfig>,
    /// Message framing used by applications on top of the byte stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framing: Option<FramingConfig>,
    /// TLS settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsSettings>,
}

/// Connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Server hostname or IPv4 address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Connection timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    10_000
}

/// Reconnection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Enable automatic reconnection.
    #[serde(default)]
    pub enabled: bool,
    /// Delay before each reconnect attempt, in milliseconds.
    #[serde(default = "default_reconnect_interval_ms")]
    pub interval_ms: u64,
}

fn default_reconnect_interval_ms() -> u64 {
    5_000
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: default_reconnect_interval_ms(),
        }
    }
}

/// Heartbeat configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Enable periodic heartbeats.
    #[serde(default)]
    pub enabled: bool,
    /// Heartbeat period in milliseconds.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub interval_ms: u64,
    /// Payload sent on every beat. Nothing is sent while empty.
    #[serde(default)]
    pub payload: String,
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: default_heartbeat_interval_ms(),
            payload: String::new(),
        }
    }
}

/// Client TLS settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsSettings {
    /// Enable TLS encryption.
    pub enabled: bool,
    /// Server name for certificate validation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    /// Path to a DER-encoded CA certificate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<PathBuf>,
    /// Skip certificate validation (DANGEROUS - use only for testing).
    #[serde(default)]
    pub danger_accept_invalid_certs: bool,
}

impl TlsSettings {
    /// Turn the settings into a [`TlsConfig`], or `None` when disabled.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Config`] if the CA file cannot be read.
    pub fn to_tls_config(&self) -> Result<Option<TlsConfig>, NetError> {
        if !self.enabled {
            return Ok(None);
        }
        let mut config = TlsConfig::new();
        if self.danger_accept_invalid_certs {
            config = config.disable_verification();
        }
        if let Some(name) = &self.server_name {
            config = config.with_server_name(name.clone());
        }
        if let Some(path) = &self.ca_file {
            let der = std::fs::read(path).map_err(|e| {
                NetError::Config(format!("Cannot read CA file {}: {}", path.display(), e))
            })?;
            config = config.add_root_certificate(der);
        }
        Ok(Some(config))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig {
                host: String::new(),
                port: 0,
                timeout_ms: default_timeout_ms(),
            },
            socket: SocketOptions::default(),
            reconnect: ReconnectConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            rate_limit: None,
            framing: None,
            tls: None,
        }
    }
}

impl ClientConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Config`] on syntax errors or invalid values.
    pub fn from_toml_str(text: &str) -> Result<Self, NetError> {
        let config: Self = toml::from_str(text)
            .map_err(|e| NetError::Config(format!("Failed to parse client config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Config`] if the file cannot be read or is invalid.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, NetError> {
        Self::from_toml_str(&read_config_file(path.as_ref())?)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<(), NetError> {
        if self.connection.host.is_empty() {
            return Err(NetError::Config("Host cannot be empty".to_string()));
        }
        if self.connection.port == 0 {
            return Err(NetError::Config("Port cannot be 0".to_string()));
        }
        if self.connection.timeout_ms == 0 {
            return Err(NetError::Config("Connect timeout cannot be 0".to_string()));
        }
        if self.reconnect.enabled && self.reconnect.interval_ms == 0 {
            return Err(NetError::Config(
                "Reconnect interval cannot be 0 when reconnect is enabled".to_string(),
            ));
        }
        if self.heartbeat.enabled && self.heartbeat.interval_ms == 0 {
            return Err(NetError::Config(
                "Heartbeat interval cannot be 0 when heartbeat is enabled".to_string(),
            ));
        }
        if let Some(limit) = &self.rate_limit {
            if limit.bytes_per_second == 0 {
                return Err(NetError::Config("Rate limit cannot be 0".to_string()));
            }
        }
        Ok(())
    }

    /// Returns the connection timeout duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.connection.timeout_ms)
    }

    /// Returns the reconnect interval.
    #[must_use]
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect.interval_ms)
    }

    /// Returns the heartbeat interval.
    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat.interval_ms)
    }
}

/// Builder for creating a [`ClientConfig`].
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Sets the server hostname or IP address.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.connection.host = host.into();
        self
    }

    /// Sets the server port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.connection.port = port;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.connection.timeout_ms = duration_to_ms(timeout);
        self
    }

    /// Sets the socket options.
    #[must_use]
    pub fn socket_options(mut self, options: SocketOptions) -> Self {
        self.config.socket = options;
        self
    }

    /// Enables automatic reconnection with the given interval.
    #[must_use]
    pub fn auto_reconnect(mut self, interval: Duration) -> Self {
        self.config.reconnect = ReconnectConfig {
            enabled: true,
            interval_ms: duration_to_ms(interval),
        };
        self
    }

    /// Enables heartbeats carrying `payload`.
    #[must_use]
    pub fn heartbeat(mut self, interval: Duration, payload: impl Into<String>) -> Self {
        self.config.heartbeat = HeartbeatConfig {
            enabled: true,
            interval_ms: duration_to_ms(interval),
            payload: payload.into(),
        };
        self
    }

    /// Limits outbound bytes per second.
    #[must_use]
    pub fn rate_limit(mut self, limit: RateLimitConfig) -> Self {
        self.config.rate_limit = Some(limit);
        self
    }

    /// Sets the framing applications should use.
    #[must_use]
    pub fn framing(mut self, framing: FramingConfig) -> Self {
        self.config.framing = Some(framing);
        self
    }

    /// Sets the TLS settings.
    #[must_use]
    pub fn tls(mut self, tls: TlsSettings) -> Self {
        self.config.tls = Some(tls);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> Result<ClientConfig, NetError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Complete server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listening address.
    pub bind: BindConfig,
    /// Socket options for the listener and accepted connections.
    #[serde(default)]
    pub socket: SocketOptions,
    /// Period of the registry cleanup sweep, in milliseconds.
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,
    /// Message framing used by applications on top of the byte stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framing: Option<FramingConfig>,
    /// TLS settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<ServerTlsSettings>,
}

/// Listening address configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindConfig {
    /// IPv4 address to bind.
    #[serde(default = "default_bind_address")]
    pub address: String,
    /// Port to bind; 0 picks a free port.
    pub port: u16,
    /// Listen backlog.
    #[serde(default = "default_backlog")]
    pub backlog: i32,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_backlog() -> i32 {
    128
}

fn default_cleanup_interval_ms() -> u64 {
    5_000
}

/// Server TLS settings: DER certificate chain and PKCS#8 key files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerTlsSettings {
    /// DER certificate files, end-entity first.
    pub cert_files: Vec<PathBuf>,
    /// DER PKCS#8 private key file.
    pub key_file: PathBuf,
}

impl ServerTlsSettings {
    /// Read the certificate chain and key.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Config`] if a file cannot be read.
    pub fn load(&self) -> Result<TlsServerConfig, NetError> {
        let chain = self
            .cert_files
            .iter()
            .map(|path| read_binary_file(path))
            .collect::<Result<Vec<_>, _>>()?;
        let key = read_binary_file(&self.key_file)?;
        Ok(TlsServerConfig::new(chain, key))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: BindConfig {
                address: default_bind_address(),
                port: 0,
                backlog: default_backlog(),
            },
            socket: SocketOptions::default(),
            cleanup_interval_ms: default_cleanup_interval_ms(),
            framing: None,
            tls: None,
        }
    }
}

impl ServerConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Config`] on syntax errors or invalid values.
    pub fn from_toml_str(text: &str) -> Result<Self, NetError> {
        let config: Self = toml::from_str(text)
            .map_err(|e| NetError::Config(format!("Failed to parse server config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Config`] if the file cannot be read or is invalid.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, NetError> {
        Self::from_toml_str(&read_config_file(path.as_ref())?)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<(), NetError> {
        if !tcpnet_proto::addr::is_valid_ipv4(&self.bind.address) {
            return Err(NetError::Config(format!(
                "Bind address '{}' is not an IPv4 address",
                self.bind.address
            )));
        }
        if self.bind.backlog <= 0 {
            return Err(NetError::Config("Backlog must be positive".to_string()));
        }
        if self.cleanup_interval_ms == 0 {
            return Err(NetError::Config("Cleanup interval cannot be 0".to_string()));
        }
        Ok(())
    }

    /// Returns the cleanup sweep interval.
    #[must_use]
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }
}

/// Builder for creating a [`ServerConfig`].
#[derive(Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    /// Sets the bind address.
    #[must_use]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.config.bind.address = address.into();
        self
    }

    /// Sets the bind port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.bind.port = port;
        self
    }

    /// Sets the listen backlog.
    #[must_use]
    pub fn backlog(mut self, backlog: i32) -> Self {
        self.config.bind.backlog = backlog;
        self
    }

    /// Sets the socket options.
    #[must_use]
    pub fn socket_options(mut self, options: SocketOptions) -> Self {
        self.config.socket = options;
        self
    }

    /// Sets the cleanup sweep interval.
    #[must_use]
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.config.cleanup_interval_ms = duration_to_ms(interval);
        self
    }

    /// Sets the framing applications should use.
    #[must_use]
    pub fn framing(mut self, framing: FramingConfig) -> Self {
        self.config.framing = Some(framing);
        self
    }

    /// Sets the TLS settings.
    #[must_use]
    pub fn tls(mut self, tls: ServerTlsSettings) -> Self {
        self.config.tls = Some(tls);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> Result<ServerConfig, NetError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

pub(crate) fn read_config_file(path: &Path) -> Result<String, NetError> {
    std::fs::read_to_string(path)
        .map_err(|e| NetError::Config(format!("Failed to read {}: {}", path.display(), e)))
}

fn read_binary_file(path: &Path) -> Result<Vec<u8>, NetError> {
    std::fs::read(path)
        .map_err(|e| NetError::Config(format!("Failed to read {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_client_config_builder() {
        let config = ClientConfig::builder()
            .host("localhost")
            .port(7777)
            .timeout(Duration::from_millis(250))
            .auto_reconnect(Duration::from_secs(1))
            .heartbeat(Duration::from_secs(3), "PING\n")
            .build()
            .unwrap();

        assert_eq!(config.connection.host, "localhost");
        assert_eq!(config.timeout(), Duration::from_millis(250));
        assert!(config.reconnect.enabled);
        assert_eq!(config.reconnect_interval(), Duration::from_secs(1));
        assert_eq!(config.heartbeat.payload, "PING\n");
    }

    #[test]
    fn test_client_config_validation() {
        assert!(ClientConfig::default().validate().is_err());

        let mut config = ClientConfig::default();
        config.connection.host = "localhost".to_string();
        assert!(config.validate().is_err());

        config.connection.port = 1;
        assert!(config.validate().is_ok());

        config.heartbeat.enabled = true;
        config.heartbeat.interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_client_config_toml_defaults() {
        let config = ClientConfig::from_toml_str(
            r#"
            [connection]
            host = "127.0.0.1"
            port = 9000

            [reconnect]
            enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(config.connection.timeout_ms, 10_000);
        assert_eq!(config.reconnect.interval_ms, 5_000);
        assert_eq!(config.heartbeat, HeartbeatConfig::default());
        assert_eq!(config.socket, SocketOptions::default());
        assert!(config.tls.is_none());
    }

    #[test]
    fn test_client_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[connection]\nhost = \"example.com\"\nport = 80\n\n[socket]\nno_delay = false\n\n[framing]\nkind = \"delimiter\"\ndelimiter = \"\\r\\n\""
        )
        .unwrap();

        let config = ClientConfig::from_toml_file(file.path()).unwrap();
        assert!(!config.socket.no_delay);
        assert_eq!(
            config.framing,
            Some(FramingConfig::Delimiter {
                delimiter: "\r\n".to_string(),
                include_delimiter: false,
            })
        );
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = ClientConfig::from_toml_file("/nonexistent/tcpnet.toml").unwrap_err();
        assert!(matches!(err, NetError::Config(_)));
    }

    #[test]
    fn test_tls_settings() {
        let disabled = TlsSettings {
            enabled: false,
            server_name: None,
            ca_file: None,
            danger_accept_invalid_certs: false,
        };
        assert!(disabled.to_tls_config().unwrap().is_none());

        let insecure = TlsSettings {
            enabled: true,
            danger_accept_invalid_certs: true,
            server_name: Some("example.com".to_string()),
            ..disabled
        };
        let config = insecure.to_tls_config().unwrap().unwrap();
        assert!(!config.verify_certificates);
        assert_eq!(config.server_name.as_deref(), Some("example.com"));
    }

    #[test]
    fn test_server_config() {
        let config = ServerConfig::builder()
            .address("127.0.0.1")
            .port(7777)
            .backlog(16)
            .cleanup_interval(Duration::from_millis(100))
            .build()
            .unwrap();
        assert_eq!(config.cleanup_interval(), Duration::from_millis(100));

        let parsed = ServerConfig::from_toml_str("[bind]\nport = 8080\n").unwrap();
        assert_eq!(parsed.bind.address, "0.0.0.0");
        assert_eq!(parsed.bind.backlog, 128);
        assert_eq!(parsed.cleanup_interval_ms, 5_000);

        assert!(ServerConfig::builder().address("localhost").build().is_err());
        assert!(ServerConfig::builder().backlog(0).build().is_err());
    }

    #[test]
    fn test_server_tls_settings_missing_files() {
        let settings = ServerTlsSettings {
            cert_files: vec![PathBuf::from("/nonexistent/cert.der")],
            key_file: PathBuf::from("/nonexistent/key.der"),
        };
        assert!(matches!(settings.load(), Err(NetError::Config(_))));
    }
}
