//! Pluggable transport encryption.
//!
//! A [`Connection`](crate::Connection) can route its raw socket I/O through a
//! [`SecureSession`]. The connection only ever calls the session around its
//! own send and receive calls; handshakes and certificate handling stay
//! inside the session.
//!
//! [`TlsSession`] is the rustls-backed implementation, configured with
//! [`TlsConfig`] on the client side and [`TlsServerConfig`] on the server side.
//!
//! # Examples
//!
//! ```no_run
//! use tcpnet::transport::TlsConfig;
//!
//! // Use system root certificates (recommended)
//! let config = TlsConfig::default();
//!
//! // Disable certificate verification (insecure, for testing only)
//! let insecure = TlsConfig::new().disable_verification();
//! ```

use crate::connection::ReceiveOutcome;
use crate::errors::NetError;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName};
use rustls::RootCertStore;
use std::io::{self, Read, Write};
use std::sync::Arc;

/// Encryption layer wrapped around a connection's socket I/O.
///
/// The socket is blocking while [`SecureSession::handshake`] runs and
/// non-blocking afterwards, so the wrap calls report `WouldBlock` like a
/// raw socket would.
pub trait SecureSession: Send {
    /// Run the handshake to completion on a blocking socket.
    fn handshake(&mut self, socket: &socket2::Socket) -> io::Result<()>;

    /// Encrypt and transmit plaintext, returning how many plaintext bytes were taken.
    fn wrap_send(&mut self, socket: &socket2::Socket, data: &[u8]) -> io::Result<usize>;

    /// Receive and decrypt into `buf`.
    fn wrap_receive(
        &mut self,
        socket: &socket2::Socket,
        buf: &mut [u8],
    ) -> io::Result<ReceiveOutcome>;

    /// Whether encrypted output is still buffered inside the session.
    fn wants_write(&self) -> bool {
        false
    }

    /// Push buffered encrypted output to the socket.
    fn flush(&mut self, _socket: &socket2::Socket) -> io::Result<()> {
        Ok(())
    }

    /// Best-effort orderly shutdown, called before the socket is closed.
    fn shutdown(&mut self, socket: &socket2::Socket);
}

/// TLS client configuration.
///
/// Certificate verification is enabled by default.
#[derive(Clone, Debug)]
pub struct TlsConfig {
    /// Verify server certificates (should always be true in production)
    pub verify_certificates: bool,
    /// Custom DER-encoded root certificates, trusted in addition to system roots
    pub custom_roots: Vec<Vec<u8>>,
    /// Name presented for SNI and verification; defaults to the connect address
    pub server_name: Option<String>,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TlsConfig {
    /// Create a new TLS configuration with secure defaults.
    pub fn new() -> Self {
        Self {
            verify_certificates: true,
            custom_roots: Vec::new(),
            server_name: None,
        }
    }

    /// Disable certificate verification.
    ///
    /// # Security Warning
    ///
    /// This is **insecure** and should only be used for testing or development.
    #[must_use]
    pub fn disable_verification(mut self) -> Self {
        self.verify_certificates = false;
        self
    }

    /// Add a custom DER-encoded root certificate.
    #[must_use]
    pub fn add_root_certificate(mut self, cert: Vec<u8>) -> Self {
        self.custom_roots.push(cert);
        self
    }

    /// Override the name used for SNI and certificate checks.
    #[must_use]
    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    /// Build the rustls client configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Tls`] if system or custom roots cannot be loaded.
    pub fn client_config(&self) -> Result<Arc<rustls::ClientConfig>, NetError> {
        let config = if self.verify_certificates {
            let mut root_store = RootCertStore::empty();

            let native_certs = rustls_native_certs::load_native_certs().map_err(|e| {
                NetError::Tls(format!("Failed to load system certificates: {}", e))
            })?;
            let (added, ignored) = root_store.add_parsable_certificates(native_certs);
            tracing::debug!("Loaded {} system roots ({} ignored)", added, ignored);

            for cert_bytes in &self.custom_roots {
                root_store
                    .add(CertificateDer::from(cert_bytes.clone()))
                    .map_err(|e| NetError::Tls(format!("Invalid custom certificate: {}", e)))?;
            }

            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth()
        } else {
            tracing::warn!("TLS certificate verification is DISABLED - insecure!");

            rustls::ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoCertificateVerification))
                .with_no_client_auth()
        };
        Ok(Arc::new(config))
    }
}

/// TLS server configuration: a DER certificate chain and its PKCS#8 key.
#[derive(Clone)]
pub struct TlsServerConfig {
    /// End-entity certificate first, followed by intermediates
    pub cert_chain: Vec<Vec<u8>>,
    /// PKCS#8 private key for the end-entity certificate
    pub private_key: Vec<u8>,
}

impl TlsServerConfig {
    pub fn new(cert_chain: Vec<Vec<u8>>, private_key: Vec<u8>) -> Self {
        Self {
            cert_chain,
            private_key,
        }
    }

    /// Build the rustls server configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Tls`] if the certificate or key is rejected.
    pub fn server_config(&self) -> Result<Arc<rustls::ServerConfig>, NetError> {
        let certs = self
            .cert_chain
            .iter()
            .map(|der| CertificateDer::from(der.clone()))
            .collect();
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(self.private_key.clone()));

        let config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|e| NetError::Tls(format!("Invalid certificate or key: {}", e)))?;
        Ok(Arc::new(config))
    }
}

impl std::fmt::Debug for TlsServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsServerConfig")
            .field("cert_chain_len", &self.cert_chain.len())
            .finish_non_exhaustive()
    }
}

/// rustls-backed [`SecureSession`].
pub struct TlsSession {
    conn: rustls::Connection,
}

impl TlsSession {
    /// Client session for `server_name`.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Tls`] if the name is not a valid DNS name or IP
    /// address, or the configuration cannot be built.
    pub fn client(config: &TlsConfig, server_name: &str) -> Result<Self, NetError> {
        let name = config.server_name.as_deref().unwrap_or(server_name);
        let server_name = ServerName::try_from(name.to_string())
            .map_err(|e| NetError::Tls(format!("Invalid server name '{}': {}", name, e)))?;
        let conn = rustls::ClientConnection::new(config.client_config()?, server_name)
            .map_err(|e| NetError::Tls(e.to_string()))?;
        Ok(Self { conn: conn.into() })
    }

    /// Server session using a prepared rustls configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Tls`] if rustls refuses the configuration.
    pub fn server(config: Arc<rustls::ServerConfig>) -> Result<Self, NetError> {
        let conn =
            rustls::ServerConnection::new(config).map_err(|e| NetError::Tls(e.to_string()))?;
        Ok(Self { conn: conn.into() })
    }

    /// Negotiated protocol version, once the handshake is done.
    pub fn protocol_version(&self) -> Option<rustls::ProtocolVersion> {
        self.conn.protocol_version()
    }

    fn write_pending(&mut self, socket: &socket2::Socket) -> io::Result<()> {
        let mut io: &socket2::Socket = socket;
        while self.conn.wants_write() {
            self.conn.write_tls(&mut io)?;
        }
        Ok(())
    }
}

impl SecureSession for TlsSession {
    fn handshake(&mut self, socket: &socket2::Socket) -> io::Result<()> {
        let mut io: &socket2::Socket = socket;
        while self.conn.is_handshaking() {
            let (read, written) = self.conn.complete_io(&mut io)?;
            if read == 0 && written == 0 && self.conn.is_handshaking() {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "peer closed during TLS handshake",
                ));
            }
        }
        self.write_pending(socket)
    }

    fn wrap_send(&mut self, socket: &socket2::Socket, data: &[u8]) -> io::Result<usize> {
        // Flush first so the plaintext buffer limit does not stall us.
        match self.write_pending(socket) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => return Err(e),
        }
        let accepted = self.conn.writer().write(data)?;
        if accepted == 0 && !data.is_empty() {
            return Err(io::Error::from(io::ErrorKind::WouldBlock));
        }
        match self.write_pending(socket) {
            Ok(()) => Ok(accepted),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(accepted),
            Err(e) => Err(e),
        }
    }

    fn wrap_receive(
        &mut self,
        socket: &socket2::Socket,
        buf: &mut [u8],
    ) -> io::Result<ReceiveOutcome> {
        let mut io: &socket2::Socket = socket;
        loop {
            match self.conn.reader().read(buf) {
                Ok(0) => return Ok(ReceiveOutcome::Closed),
                Ok(n) => return Ok(ReceiveOutcome::Data(n)),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Ok(ReceiveOutcome::Closed)
                }
                Err(e) => return Err(e),
            }

            match self.conn.read_tls(&mut io) {
                Ok(0) => return Ok(ReceiveOutcome::Closed),
                Ok(_) => {
                    self.conn
                        .process_new_packets()
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                    if self.conn.wants_write() {
                        let _ = self.write_pending(socket);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(ReceiveOutcome::NoData)
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn wants_write(&self) -> bool {
        self.conn.wants_write()
    }

    fn flush(&mut self, socket: &socket2::Socket) -> io::Result<()> {
        self.write_pending(socket)
    }

    fn shutdown(&mut self, socket: &socket2::Socket) {
        self.conn.send_close_notify();
        if let Err(e) = self.write_pending(socket) {
            tracing::debug!("TLS close_notify not delivered: {}", e);
        }
    }
}

/// Certificate verifier that accepts any server certificate.
#[derive(Debug)]
struct NoCertificateVerification;

impl rustls::client::danger::ServerCertVerifier for NoCertificateVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
