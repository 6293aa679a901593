//! Command-line argument parsing for client and server applications.
//!
//! This module is only available when the `cli` feature is enabled.
//! A configuration file given with `--config` is loaded first, then
//! overridden by explicit flags.
//!
//! # Examples
//!
//! ```no_run
//! use tcpnet::args::ClientArgs;
//! use tcpnet::ClientConfig;
//!
//! let args = ClientArgs::parse();
//! let config = ClientConfig::from_args(&args)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::config::{
    read_config_file, ClientConfig, ServerConfig, ServerTlsSettings, TlsSettings,
};
use crate::errors::NetError;
use clap::Parser;
use std::path::PathBuf;
use tcpnet_proto::{FramingConfig, RateLimitConfig};

/// Port used when neither the arguments nor a config file name one.
pub const DEFAULT_PORT: u16 = 7777;

/// TCP client command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ClientArgs {
    /// Server address (host or host:port)
    #[arg(value_name = "SERVER")]
    pub server: Option<String>,

    /// Server port (overrides port in SERVER if specified)
    #[arg(short = 'p', long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Connect timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Reconnect automatically, retrying every MS milliseconds
    #[arg(long, value_name = "MS")]
    pub reconnect: Option<u64>,

    /// Send a heartbeat every MS milliseconds
    #[arg(long, value_name = "MS")]
    pub heartbeat: Option<u64>,

    /// Heartbeat payload (escapes: \r \n \t \\)
    #[arg(long, value_name = "TEXT", requires = "heartbeat")]
    pub heartbeat_payload: Option<String>,

    /// Limit outbound traffic to BYTES per second
    #[arg(long, value_name = "BYTES")]
    pub rate_limit: Option<u64>,

    /// Message delimiter (escapes: \r \n \t \\)
    #[arg(short = 'd', long, value_name = "DELIM")]
    pub delimiter: Option<String>,

    /// Enable TLS encryption
    #[arg(long)]
    pub tls: bool,

    /// DER-encoded CA certificate to trust
    #[arg(long, value_name = "FILE", requires = "tls")]
    pub tls_ca: Option<PathBuf>,

    /// Server name for certificate validation
    #[arg(long, value_name = "NAME", requires = "tls")]
    pub tls_server_name: Option<String>,

    /// Disable TLS certificate verification (insecure)
    #[arg(long, requires = "tls")]
    pub tls_insecure: bool,

    /// Configuration file path (TOML format)
    #[arg(short = 'c', long, value_name = "FILE", env = "TCPNET_CLIENT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl ClientArgs {
    /// Parse command-line arguments.
    #[must_use]
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse arguments from an iterator.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments are invalid.
    pub fn try_parse_from<I, T>(iter: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }
}

/// TCP server command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ServerArgs {
    /// Address to bind
    #[arg(short = 'b', long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// Port to listen on
    #[arg(short = 'p', long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Listen backlog
    #[arg(long, value_name = "N")]
    pub backlog: Option<i32>,

    /// Cleanup sweep interval in milliseconds
    #[arg(long, value_name = "MS")]
    pub cleanup_ms: Option<u64>,

    /// Message delimiter (escapes: \r \n \t \\)
    #[arg(short = 'd', long, value_name = "DELIM")]
    pub delimiter: Option<String>,

    /// DER certificate chain files, end-entity first
    #[arg(long, value_name = "FILE", value_delimiter = ',', requires = "tls_key")]
    pub tls_cert: Option<Vec<PathBuf>>,

    /// DER PKCS#8 private key file
    #[arg(long, value_name = "FILE", requires = "tls_cert")]
    pub tls_key: Option<PathBuf>,

    /// Configuration file path (TOML format)
    #[arg(short = 'c', long, value_name = "FILE", env = "TCPNET_SERVER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl ServerArgs {
    /// Parse command-line arguments.
    #[must_use]
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse arguments from an iterator.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments are invalid.
    pub fn try_parse_from<I, T>(iter: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }
}

impl ClientConfig {
    /// Create a configuration from command-line arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config file cannot be read or parsed
    /// - The server address is invalid
    /// - The configuration validation fails
    pub fn from_args(args: &ClientArgs) -> Result<Self, NetError> {
        let mut config = match &args.config {
            Some(path) => toml::from_str(&read_config_file(path)?).map_err(|e| {
                NetError::Config(format!("Failed to parse {}: {}", path.display(), e))
            })?,
            None => ClientConfig::default(),
        };

        if let Some(server) = &args.server {
            let default_port = match config.connection.port {
                0 => DEFAULT_PORT,
                port => port,
            };
            let (host, port) = tcpnet_proto::addr::parse_endpoint(server, default_port)
                .ok_or_else(|| NetError::InvalidAddress(server.clone()))?;
            config.connection.host = host;
            config.connection.port = port;
        }
        if let Some(port) = args.port {
            config.connection.port = port;
        }
        if config.connection.port == 0 {
            config.connection.port = DEFAULT_PORT;
        }
        if let Some(timeout) = args.timeout_ms {
            config.connection.timeout_ms = timeout;
        }
        if let Some(interval) = args.reconnect {
            config.reconnect.enabled = true;
            config.reconnect.interval_ms = interval;
        }
        if let Some(interval) = args.heartbeat {
            config.heartbeat.enabled = true;
            config.heartbeat.interval_ms = interval;
        }
        if let Some(payload) = &args.heartbeat_payload {
            config.heartbeat.payload = unescape(payload);
        }
        if let Some(rate) = args.rate_limit {
            config.rate_limit = Some(RateLimitConfig::new(rate));
        }
        if let Some(delimiter) = &args.delimiter {
            config.framing = Some(delimiter_framing(delimiter));
        }
        if args.tls {
            let mut tls = config.tls.take().unwrap_or(TlsSettings {
                enabled: true,
                server_name: None,
                ca_file: None,
                danger_accept_invalid_certs: false,
            });
            tls.enabled = true;
            tls.danger_accept_invalid_certs |= args.tls_insecure;
            if args.tls_ca.is_some() {
                tls.ca_file = args.tls_ca.clone();
            }
            if args.tls_server_name.is_some() {
                tls.server_name = args.tls_server_name.clone();
            }
            config.tls = Some(tls);
        }

        config.validate()?;
        Ok(config)
    }
}

impl ServerConfig {
    /// Create a configuration from command-line arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or the
    /// resulting configuration is invalid.
    pub fn from_args(args: &ServerArgs) -> Result<Self, NetError> {
        let mut config = match &args.config {
            Some(path) => toml::from_str(&read_config_file(path)?).map_err(|e| {
                NetError::Config(format!("Failed to parse {}: {}", path.display(), e))
            })?,
            None => {
                let mut config = ServerConfig::default();
                config.bind.port = DEFAULT_PORT;
                config
            }
        };

        if let Some(bind) = &args.bind {
            config.bind.address = bind.clone();
        }
        if let Some(port) = args.port {
            config.bind.port = port;
        }
        if let Some(backlog) = args.backlog {
            config.bind.backlog = backlog;
        }
        if let Some(cleanup) = args.cleanup_ms {
            config.cleanup_interval_ms = cleanup;
        }
        if let Some(delimiter) = &args.delimiter {
            config.framing = Some(delimiter_framing(delimiter));
        }
        if let (Some(cert_files), Some(key_file)) = (&args.tls_cert, &args.tls_key) {
            config.tls = Some(ServerTlsSettings {
                cert_files: cert_files.clone(),
                key_file: key_file.clone(),
            });
        }

        config.validate()?;
        Ok(config)
    }
}

/// Delimiter framing from a command-line string.
fn delimiter_framing(value: &str) -> FramingConfig {
    FramingConfig::Delimiter {
        delimiter: unescape(value),
        include_delimiter: false,
    }
}

/// Expand `\r`, `\n`, `\t` and `\\` so delimiters can be typed in a shell.
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Log filter directive for a `-v` count.
pub fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r"\r\n"), "\r\n");
        assert_eq!(unescape(r"a\tb\\"), "a\tb\\");
        assert_eq!(unescape(r"\x"), r"\x");
        assert_eq!(unescape("plain"), "plain");
    }

    #[test]
    fn test_client_args_minimal() {
        let args = ClientArgs::try_parse_from(["test", "127.0.0.1:9000"]).unwrap();
        let config = ClientConfig::from_args(&args).unwrap();
        assert_eq!(config.connection.host, "127.0.0.1");
        assert_eq!(config.connection.port, 9000);
        assert!(!config.reconnect.enabled);
        assert!(config.tls.is_none());
    }

    #[test]
    fn test_client_args_default_port() {
        let args = ClientArgs::try_parse_from(["test", "localhost"]).unwrap();
        let config = ClientConfig::from_args(&args).unwrap();
        assert_eq!(config.connection.port, DEFAULT_PORT);
    }

    #[test]
    fn test_client_args_with_options() {
        let args = ClientArgs::try_parse_from([
            "test",
            "localhost:9000",
            "--port",
            "9100",
            "--reconnect",
            "250",
            "--heartbeat",
            "1000",
            "--heartbeat-payload",
            r"PING\n",
            "--delimiter",
            r"\r\n",
            "--tls",
            "--tls-insecure",
            "-vv",
        ])
        .unwrap();
        assert_eq!(args.verbose, 2);

        let config = ClientConfig::from_args(&args).unwrap();
        assert_eq!(config.connection.port, 9100);
        assert_eq!(config.reconnect_interval(), Duration::from_millis(250));
        assert!(config.heartbeat.enabled);
        assert_eq!(config.heartbeat.payload, "PING\n");
        assert_eq!(
            config.framing,
            Some(FramingConfig::Delimiter {
                delimiter: "\r\n".to_string(),
                include_delimiter: false
            })
        );
        let tls = config.tls.unwrap();
        assert!(tls.enabled);
        assert!(tls.danger_accept_invalid_certs);
    }

    #[test]
    fn test_client_tls_flags_require_tls() {
        assert!(ClientArgs::try_parse_from(["test", "localhost", "--tls-insecure"]).is_err());
    }

    #[test]
    fn test_client_args_without_server_fails_validation() {
        let args = ClientArgs::try_parse_from(["test"]).unwrap();
        assert!(matches!(
            ClientConfig::from_args(&args),
            Err(NetError::Config(_))
        ));
    }

    #[test]
    fn test_client_args_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[connection]\nhost = \"10.0.0.1\"\nport = 4000\n\n[reconnect]\nenabled = true\ninterval_ms = 100\n"
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let args = ClientArgs::try_parse_from(["test", "--config", &path, "--port", "4001"]).unwrap();
        let config = ClientConfig::from_args(&args).unwrap();
        assert_eq!(config.connection.host, "10.0.0.1");
        assert_eq!(config.connection.port, 4001);
        assert!(config.reconnect.enabled);
    }

    #[test]
    fn test_server_args() {
        let args = ServerArgs::try_parse_from(["test"]).unwrap();
        let config = ServerConfig::from_args(&args).unwrap();
        assert_eq!(config.bind.address, "0.0.0.0");
        assert_eq!(config.bind.port, DEFAULT_PORT);

        let args = ServerArgs::try_parse_from([
            "test",
            "--bind",
            "127.0.0.1",
            "-p",
            "0",
            "--cleanup-ms",
            "100",
            "-d",
            r"\n",
        ])
        .unwrap();
        let config = ServerConfig::from_args(&args).unwrap();
        assert_eq!(config.bind.address, "127.0.0.1");
        assert_eq!(config.bind.port, 0);
        assert_eq!(config.cleanup_interval(), Duration::from_millis(100));
        assert!(matches!(config.framing, Some(FramingConfig::Delimiter { .. })));
    }

    #[test]
    fn test_server_tls_flags_come_in_pairs() {
        assert!(ServerArgs::try_parse_from(["test", "--tls-key", "key.der"]).is_err());
        let args = ServerArgs::try_parse_from([
            "test",
            "--tls-cert",
            "a.der,b.der",
            "--tls-key",
            "key.der",
        ])
        .unwrap();
        let config = ServerConfig::from_args(&args).unwrap();
        assert_eq!(config.tls.unwrap().cert_files.len(), 2);
    }

    #[test]
    fn test_invalid_bind_address() {
        let args = ServerArgs::try_parse_from(["test", "--bind", "nowhere"]).unwrap();
        assert!(ServerConfig::from_args(&args).is_err());
    }

    #[test]
    fn test_log_level() {
        assert_eq!(log_level(0), "info");
        assert_eq!(log_level(1), "debug");
        assert_eq!(log_level(5), "trace");
    }
}
