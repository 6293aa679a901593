//! Outbound client with auto-reconnect and heartbeat.
//!
//! A [`Client`] owns one logical connection over its lifetime. Each
//! successful connect creates a fresh [`Connection`]; dropped connections are
//! never reused. Two optional background threads support it:
//!
//! - **Reconnect loop**: while enabled, waits for the connection to drop, then
//!   retries the last address every interval until a connect succeeds.
//! - **Heartbeat loop**: while enabled, sends the heartbeat payload every
//!   interval when connected. Failed beats go through the normal send-error
//!   path and are otherwise ignored.
//!
//! Both loops sleep on a condition variable, so disabling them or calling
//! [`Client::disconnect`] wakes them immediately.
//!
//! # Examples
//!
//! ```no_run
//! use std::time::Duration;
//! use tcpnet::{Client, ClientConfig};
//!
//! # fn example() -> Result<(), tcpnet::NetError> {
//! let config = ClientConfig::builder()
//!     .host("127.0.0.1")
//!     .port(7777)
//!     .auto_reconnect(Duration::from_secs(2))
//!     .build()?;
//!
//! let client = Client::new(config)?;
//! client.set_handlers(tcpnet::ClientHandlers::default().on_data(|data| {
//!     println!("received {} bytes", data.len());
//! }));
//! client.connect_config()?;
//! client.send(b"hello\r\n")?;
//! client.disconnect();
//! # Ok(())
//! # }
//! ```

use crate::config::ClientConfig;
use crate::connection::{connect_socket, Connection, ConnectionHandlers};
use crate::errors::NetError;
use crate::stats::ClientStatistics;
use crate::transport::{TlsConfig, TlsSession};
use bytes::Bytes;
use chrono::Utc;
use parking_lot::{Condvar, Mutex, MutexGuard, RwLock};
use std::net::SocketAddrV4;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tcpnet_common::{ConnectionState, ErrorCode, SocketOptions};
use tcpnet_proto::RateLimiter;
use tracing::{debug, info, warn};

/// Default delay between reconnect attempts.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(5_000);

/// Default heartbeat period.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(30_000);

type Callback = Arc<dyn Fn() + Send + Sync>;
type ClientDataHandler = Arc<dyn Fn(Bytes) + Send + Sync>;
type ClientErrorHandler = Arc<dyn Fn(ErrorCode, &str) + Send + Sync>;

/// Client-level callbacks. They run on the thread that observed the event.
#[derive(Clone, Default)]
pub struct ClientHandlers {
    pub on_connected: Option<Callback>,
    pub on_disconnected: Option<Callback>,
    pub on_data: Option<ClientDataHandler>,
    pub on_error: Option<ClientErrorHandler>,
}

impl ClientHandlers {
    /// Set the connected handler.
    #[must_use]
    pub fn on_connected(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connected = Some(Arc::new(f));
        self
    }

    /// Set the disconnected handler.
    #[must_use]
    pub fn on_disconnected(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_disconnected = Some(Arc::new(f));
        self
    }

    /// Set the data handler.
    #[must_use]
    pub fn on_data(mut self, f: impl Fn(Bytes) + Send + Sync + 'static) -> Self {
        self.on_data = Some(Arc::new(f));
        self
    }

    /// Set the error handler.
    #[must_use]
    pub fn on_error(mut self, f: impl Fn(ErrorCode, &str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }
}

struct ReconnectControl {
    enabled: bool,
    interval: Duration,
}

struct HeartbeatControl {
    enabled: bool,
    interval: Duration,
    payload: Bytes,
}

#[derive(Default)]
struct StatsState {
    total_connections: u64,
    reconnections: u64,
    retired_bytes_sent: u64,
    retired_bytes_received: u64,
    last_connected_at: Option<chrono::DateTime<Utc>>,
    connected_since: Option<Instant>,
    total_connected_time: Duration,
}

struct ClientInner {
    options: Mutex<SocketOptions>,
    default_timeout: Mutex<Duration>,
    state: Mutex<ConnectionState>,
    /// Lock order: `stats` before `connection`.
    connection: Mutex<Option<Connection>>,
    remote: Mutex<Option<(String, u16)>>,
    /// Endpoint from the configuration, used by `connect_config`.
    configured: Option<(String, u16)>,
    handlers: RwLock<ClientHandlers>,
    tls: Mutex<Option<TlsConfig>>,
    send_limiter: Mutex<Option<Arc<RateLimiter>>>,
    /// Serializes connect attempts from callers and the reconnect loop.
    connect_lock: Mutex<()>,
    reconnect: Mutex<ReconnectControl>,
    reconnect_signal: Condvar,
    reconnect_thread: Mutex<Option<JoinHandle<()>>>,
    heartbeat: Mutex<HeartbeatControl>,
    heartbeat_signal: Condvar,
    heartbeat_thread: Mutex<Option<JoinHandle<()>>>,
    stats: Mutex<StatsState>,
}

/// TCP client driving one logical connection across reconnects.
///
/// Dropping the client disconnects it.
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    /// Create a client from a validated configuration.
    ///
    /// Reconnect and heartbeat settings take effect immediately; nothing
    /// connects until [`Client::connect_config`] or another connect call.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Config`] if the configuration is invalid or its
    /// TLS files cannot be read.
    pub fn new(config: ClientConfig) -> Result<Self, NetError> {
        config.validate()?;
        let client = Self::build(
            config.socket.clone(),
            Some((config.connection.host.clone(), config.connection.port)),
        );
        *client.inner.default_timeout.lock() = config.timeout();

        if let Some(tls) = config
            .tls
            .as_ref()
            .map(|t| t.to_tls_config())
            .transpose()?
            .flatten()
        {
            client.enable_tls(tls);
        }
        if let Some(limit) = &config.rate_limit {
            client.set_send_limiter(Some(Arc::new(limit.build())));
        }
        if config.heartbeat.enabled {
            client.set_heartbeat_data(config.heartbeat.payload.clone().into_bytes());
            client.enable_heartbeat(true, config.heartbeat_interval());
        }
        if config.reconnect.enabled {
            client.enable_auto_reconnect(true, config.reconnect_interval());
        }
        Ok(client)
    }

    /// Create an unconfigured client using `options` for every socket.
    pub fn with_options(options: SocketOptions) -> Self {
        Self::build(options, None)
    }

    fn build(options: SocketOptions, configured: Option<(String, u16)>) -> Self {
        let default_timeout = options.connect_timeout;
        Self {
            inner: Arc::new(ClientInner {
                options: Mutex::new(options),
                default_timeout: Mutex::new(default_timeout),
                state: Mutex::new(ConnectionState::Disconnected),
                connection: Mutex::new(None),
                remote: Mutex::new(None),
                configured,
                handlers: RwLock::new(ClientHandlers::default()),
                tls: Mutex::new(None),
                send_limiter: Mutex::new(None),
                connect_lock: Mutex::new(()),
                reconnect: Mutex::new(ReconnectControl {
                    enabled: false,
                    interval: DEFAULT_RECONNECT_INTERVAL,
                }),
                reconnect_signal: Condvar::new(),
                reconnect_thread: Mutex::new(None),
                heartbeat: Mutex::new(HeartbeatControl {
                    enabled: false,
                    interval: DEFAULT_HEARTBEAT_INTERVAL,
                    payload: Bytes::new(),
                }),
                heartbeat_signal: Condvar::new(),
                heartbeat_thread: Mutex::new(None),
                stats: Mutex::new(StatsState::default()),
            }),
        }
    }

    /// Replace the callbacks.
    pub fn set_handlers(&self, handlers: ClientHandlers) {
        *self.inner.handlers.write() = handlers;
    }

    /// Encrypt every future connection with TLS.
    pub fn enable_tls(&self, config: TlsConfig) {
        *self.inner.tls.lock() = Some(config);
    }

    /// Gate [`Client::send`] through a rate limiter.
    pub fn set_send_limiter(&self, limiter: Option<Arc<RateLimiter>>) {
        *self.inner.send_limiter.lock() = limiter;
    }

    /// Connect using the socket options' connect timeout.
    ///
    /// # Errors
    ///
    /// See [`Client::connect_with_timeout`].
    pub fn connect(&self, host: &str, port: u16) -> Result<(), NetError> {
        let timeout = *self.inner.default_timeout.lock();
        self.inner.connect_internal(host, port, timeout)
    }

    /// Connect to `host:port`, waiting at most `timeout` for the TCP handshake.
    ///
    /// An existing connection is closed first.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Timeout`] when the wait expires,
    /// [`NetError::ConnectionFailed`] when the peer refuses or the socket
    /// reports an error, [`NetError::InvalidAddress`] for unusable addresses
    /// and [`NetError::Tls`] if the TLS handshake fails.
    pub fn connect_with_timeout(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<(), NetError> {
        self.inner.connect_internal(host, port, timeout)
    }

    /// Connect to the configured (or last used) address.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Config`] if no address is known, otherwise as
    /// [`Client::connect_with_timeout`].
    pub fn connect_config(&self) -> Result<(), NetError> {
        let last = self.inner.remote.lock().clone();
        let (host, port) = last
            .or_else(|| self.inner.configured.clone())
            .ok_or_else(|| NetError::Config("No remote address configured".to_string()))?;
        self.connect(&host, port)
    }

    /// Connect on a background thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned; the connect result is
    /// delivered through the join handle.
    pub fn connect_async(
        &self,
        host: &str,
        port: u16,
    ) -> Result<JoinHandle<Result<(), NetError>>, NetError> {
        let inner = Arc::clone(&self.inner);
        let host = host.to_string();
        let timeout = *self.inner.default_timeout.lock();
        thread::Builder::new()
            .name("tcpnet-connect".to_string())
            .spawn(move || inner.connect_internal(&host, port, timeout))
            .map_err(|e| NetError::Internal(format!("failed to spawn connect thread: {}", e)))
    }

    /// Disconnect and stop the reconnect and heartbeat loops.
    ///
    /// The disconnected handler runs once if a connection was open.
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    /// Send through the current connection.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::NotConnected`] without a live connection, or the
    /// connection's send error.
    pub fn send(&self, data: &[u8]) -> Result<(), NetError> {
        let conn = self.inner.current_connection().ok_or(NetError::NotConnected)?;
        let limiter = self.inner.send_limiter.lock().clone();
        match limiter {
            Some(limiter) => conn.send_limited(data, &limiter),
            None => conn.send(data),
        }
    }

    /// Non-blocking receive on the current connection.
    ///
    /// The receive loop consumes data as it arrives, so this only returns
    /// bytes the loop has not yet picked up.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::NotConnected`] without a connection and
    /// [`NetError::ConnectionClosed`] once it has closed.
    pub fn receive(&self, max: usize) -> Result<Option<Bytes>, NetError> {
        let conn = self.inner.current_connection().ok_or(NetError::NotConnected)?;
        conn.receive(max)
    }

    /// Enable or disable the reconnect loop.
    pub fn enable_auto_reconnect(&self, enabled: bool, interval: Duration) {
        {
            let mut control = self.inner.reconnect.lock();
            control.enabled = enabled;
            control.interval = interval;
            self.inner.reconnect_signal.notify_all();
        }
        if enabled {
            self.inner.ensure_loop(&self.inner.reconnect_thread, "tcpnet-reconnect", |inner| {
                inner.reconnect_loop();
            });
        } else {
            join_unless_current(self.inner.reconnect_thread.lock().take());
        }
    }

    /// Enable or disable the heartbeat loop.
    pub fn enable_heartbeat(&self, enabled: bool, interval: Duration) {
        {
            let mut control = self.inner.heartbeat.lock();
            control.enabled = enabled;
            control.interval = interval;
            self.inner.heartbeat_signal.notify_all();
        }
        if enabled {
            self.inner.ensure_loop(&self.inner.heartbeat_thread, "tcpnet-heartbeat", |inner| {
                inner.heartbeat_loop();
            });
        } else {
            join_unless_current(self.inner.heartbeat_thread.lock().take());
        }
    }

    /// Payload sent on every heartbeat. Empty disables sending.
    pub fn set_heartbeat_data(&self, payload: impl Into<Bytes>) {
        self.inner.heartbeat.lock().payload = payload.into();
    }

    pub fn is_auto_reconnect_enabled(&self) -> bool {
        self.inner.reconnect.lock().enabled
    }

    pub fn is_heartbeat_enabled(&self) -> bool {
        self.inner.heartbeat.lock().enabled
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    /// Returns true while a connection is established.
    pub fn is_connected(&self) -> bool {
        self.inner
            .current_connection()
            .is_some_and(|conn| conn.is_connected())
    }

    /// The current connection, if any.
    pub fn connection(&self) -> Option<Connection> {
        self.inner.current_connection()
    }

    /// Last address passed to a connect call.
    pub fn remote_endpoint(&self) -> Option<(String, u16)> {
        self.inner.remote.lock().clone()
    }

    /// Local address of the current connection.
    pub fn local_addr(&self) -> Option<SocketAddrV4> {
        self.inner.current_connection().map(|conn| conn.local_addr())
    }

    /// Remote address of the current connection.
    pub fn remote_addr(&self) -> Option<SocketAddrV4> {
        self.inner.current_connection().map(|conn| conn.remote_addr())
    }

    /// Snapshot of the statistics, including the live connection's counters.
    pub fn statistics(&self) -> ClientStatistics {
        self.inner.statistics()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.inner.disconnect();
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state())
            .field("remote", &self.remote_endpoint())
            .finish_non_exhaustive()
    }
}

impl ClientInner {
    fn current_connection(&self) -> Option<Connection> {
        self.connection.lock().clone()
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }

    fn connect_internal(
        self: &Arc<Self>,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<(), NetError> {
        let _connecting = self.connect_lock.lock();

        let existing = self.current_connection();
        if let Some(existing) = existing {
            debug!("Closing existing connection before connecting to {}:{}", host, port);
            existing.close();
            self.connection.lock().take();
        }

        self.set_state(ConnectionState::Connecting);
        *self.remote.lock() = Some((host.to_string(), port));

        match self.establish(host, port, timeout) {
            Ok(conn) => {
                info!("Client connected to {}", conn.remote_addr());
                let handler = self.handlers.read().on_connected.clone();
                if let Some(handler) = handler {
                    handler();
                }
                Ok(())
            }
            Err(e) => {
                self.set_state(ConnectionState::Error);
                warn!("Connect to {}:{} failed: {}", host, port, e);
                let handler = self.handlers.read().on_error.clone();
                if let Some(handler) = handler {
                    handler(e.code(), &e.to_string());
                }
                Err(e)
            }
        }
    }

    fn establish(self: &Arc<Self>, host: &str, port: u16, timeout: Duration) -> Result<Connection, NetError> {
        let options = self.options.lock().clone();
        let socket = connect_socket(host, port, options, timeout)?;
        let conn = Connection::from_socket(socket)?;

        let tls = self.tls.lock().clone();
        if let Some(tls) = tls {
            conn.secure(Box::new(TlsSession::client(&tls, host)?))?;
        }
        conn.set_handlers(self.connection_handlers());

        {
            let mut stats = self.stats.lock();
            stats.total_connections += 1;
            stats.last_connected_at = Some(Utc::now());
            stats.connected_since = Some(Instant::now());
            *self.connection.lock() = Some(conn.clone());
        }

        if let Err(e) = conn.start() {
            let mut stats = self.stats.lock();
            stats.connected_since = None;
            self.connection.lock().take();
            return Err(e);
        }
        self.set_state(ConnectionState::Connected);
        Ok(conn)
    }

    /// Per-connection handlers forwarding to the client. They hold only a
    /// weak reference so a connection never keeps its client alive.
    fn connection_handlers(self: &Arc<Self>) -> ConnectionHandlers {
        let on_data = Arc::downgrade(self);
        let on_error = Arc::downgrade(self);
        let on_disconnected = Arc::downgrade(self);

        ConnectionHandlers::default()
            .on_data(move |_, data| {
                if let Some(inner) = on_data.upgrade() {
                    let handler = inner.handlers.read().on_data.clone();
                    if let Some(handler) = handler {
                        handler(data);
                    }
                }
            })
            .on_error(move |_, code, message| {
                if let Some(inner) = on_error.upgrade() {
                    inner.set_state(ConnectionState::Error);
                    let handler = inner.handlers.read().on_error.clone();
                    if let Some(handler) = handler {
                        handler(code, message);
                    }
                }
            })
            .on_disconnected(move |conn| {
                if let Some(inner) = Weak::upgrade(&on_disconnected) {
                    inner.connection_ended(conn);
                }
            })
    }

    /// Fold a finished connection into the statistics and wake the reconnect loop.
    fn connection_ended(&self, conn: &Connection) {
        {
            let mut stats = self.stats.lock();
            let mut slot = self.connection.lock();
            if slot.as_ref() == Some(conn) {
                *slot = None;
            }
            stats.retired_bytes_sent += conn.bytes_sent();
            stats.retired_bytes_received += conn.bytes_received();
            if let Some(since) = stats.connected_since.take() {
                stats.total_connected_time += since.elapsed();
            }
        }

        {
            let mut state = self.state.lock();
            if *state != ConnectionState::Connecting {
                *state = ConnectionState::Disconnected;
            }
        }

        {
            let _control = self.reconnect.lock();
            self.reconnect_signal.notify_all();
        }

        let handler = self.handlers.read().on_disconnected.clone();
        if let Some(handler) = handler {
            handler();
        }
    }

    fn needs_reconnect(&self) -> bool {
        if self.remote.lock().is_none() {
            return false;
        }
        let live = self
            .current_connection()
            .is_some_and(|conn| !conn.state().is_terminal());
        !live
            && matches!(
                *self.state.lock(),
                ConnectionState::Disconnected | ConnectionState::Error
            )
    }

    fn reconnect_loop(self: &Arc<Self>) {
        let mut control = self.reconnect.lock();
        loop {
            if !control.enabled {
                break;
            }
            if !self.needs_reconnect() {
                self.reconnect_signal.wait(&mut control);
                continue;
            }

            let interval = control.interval;
            let timed_out = self
                .reconnect_signal
                .wait_for(&mut control, interval)
                .timed_out();
            if !control.enabled {
                break;
            }
            if !timed_out {
                continue;
            }

            MutexGuard::unlocked(&mut control, || self.reconnect_once());
        }
        debug!("Reconnect loop stopped");
    }

    fn reconnect_once(self: &Arc<Self>) {
        if !self.needs_reconnect() {
            return;
        }
        let Some((host, port)) = self.remote.lock().clone() else {
            return;
        };
        let timeout = *self.default_timeout.lock();

        info!("Reconnecting to {}:{}", host, port);
        match self.connect_internal(&host, port, timeout) {
            Ok(()) => {
                self.stats.lock().reconnections += 1;
            }
            Err(e) => debug!("Reconnect attempt failed: {}", e),
        }
    }

    fn heartbeat_loop(self: &Arc<Self>) {
        let mut control = self.heartbeat.lock();
        loop {
            if !control.enabled {
                break;
            }
            let interval = control.interval;
            let timed_out = self
                .heartbeat_signal
                .wait_for(&mut control, interval)
                .timed_out();
            if !control.enabled {
                break;
            }
            if !timed_out || control.payload.is_empty() {
                continue;
            }

            let payload = control.payload.clone();
            MutexGuard::unlocked(&mut control, || {
                if let Some(conn) = self.current_connection().filter(Connection::is_connected) {
                    if let Err(e) = conn.send(&payload) {
                        debug!("Heartbeat not sent: {}", e);
                    }
                }
            });
        }
        debug!("Heartbeat loop stopped");
    }

    /// Spawn a loop thread unless one is already running.
    fn ensure_loop(
        self: &Arc<Self>,
        slot: &Mutex<Option<JoinHandle<()>>>,
        name: &str,
        body: fn(&Arc<ClientInner>),
    ) {
        let mut slot = slot.lock();
        if let Some(handle) = slot.as_ref() {
            if !handle.is_finished() {
                return;
            }
        }
        join_unless_current(slot.take());

        let inner = Arc::clone(self);
        match thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(&inner))
        {
            Ok(handle) => *slot = Some(handle),
            Err(e) => warn!("Failed to spawn {}: {}", name, e),
        }
    }

    fn disconnect(&self) {
        {
            let mut state = self.state.lock();
            if *state != ConnectionState::Disconnected {
                *state = ConnectionState::Disconnecting;
            }
        }

        {
            let mut control = self.reconnect.lock();
            control.enabled = false;
            self.reconnect_signal.notify_all();
        }
        {
            let mut control = self.heartbeat.lock();
            control.enabled = false;
            self.heartbeat_signal.notify_all();
        }
        join_unless_current(self.reconnect_thread.lock().take());
        join_unless_current(self.heartbeat_thread.lock().take());

        // Closing releases the session and socket, joins the receive loop
        // and fires the disconnected handler through `connection_ended`.
        if let Some(conn) = self.current_connection() {
            conn.close();
        }
        self.connection.lock().take();
        self.set_state(ConnectionState::Disconnected);
    }

    fn statistics(&self) -> ClientStatistics {
        let stats = self.stats.lock();
        let current = self.connection.lock().clone();
        let (live_sent, live_received) = current
            .map_or((0, 0), |conn| (conn.bytes_sent(), conn.bytes_received()));

        ClientStatistics {
            total_connections: stats.total_connections,
            reconnections: stats.reconnections,
            bytes_sent: stats.retired_bytes_sent + live_sent,
            bytes_received: stats.retired_bytes_received + live_received,
            last_connected_at: stats.last_connected_at,
            total_connected_time: stats.total_connected_time
                + stats.connected_since.map_or(Duration::ZERO, |since| since.elapsed()),
        }
    }
}

/// Join a loop thread, unless we are that thread.
fn join_unless_current(handle: Option<JoinHandle<()>>) {
    if let Some(handle) = handle {
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            warn!("Client loop thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TlsSettings;

    #[test]
    fn test_new_client_is_disconnected() {
        let client = Client::with_options(SocketOptions::default());
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(!client.is_connected());
        assert!(matches!(client.send(b"x"), Err(NetError::NotConnected)));
        assert!(matches!(client.connect_config(), Err(NetError::Config(_))));
        assert_eq!(client.statistics(), ClientStatistics::default());
    }

    #[test]
    fn test_enable_and_disable_loops() {
        let client = Client::with_options(SocketOptions::default());
        client.enable_auto_reconnect(true, Duration::from_millis(50));
        client.enable_heartbeat(true, Duration::from_millis(50));
        assert!(client.is_auto_reconnect_enabled());
        assert!(client.is_heartbeat_enabled());

        let start = Instant::now();
        client.enable_auto_reconnect(false, Duration::from_secs(60));
        client.enable_heartbeat(false, Duration::from_secs(60));
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(client.inner.reconnect_thread.lock().is_none());
        assert!(client.inner.heartbeat_thread.lock().is_none());
    }

    #[test]
    fn test_disconnect_wakes_long_waits() {
        let client = Client::with_options(SocketOptions::default());
        client.enable_auto_reconnect(true, Duration::from_secs(3600));
        client.enable_heartbeat(true, Duration::from_secs(3600));

        let start = Instant::now();
        client.disconnect();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(!client.is_auto_reconnect_enabled());
        assert!(!client.is_heartbeat_enabled());
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_connect_to_closed_port_fails() {
        let free = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = free.local_addr().unwrap().port();
        drop(free);

        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        let client = Client::with_options(SocketOptions::default());
        client.set_handlers(ClientHandlers::default().on_error(move |code, _| sink.lock().push(code)));

        let err = client
            .connect_with_timeout("127.0.0.1", port, Duration::from_millis(200))
            .unwrap_err();
        assert!(matches!(err, NetError::ConnectionFailed(_) | NetError::Timeout(_)));
        assert_eq!(client.state(), ConnectionState::Error);
        assert_eq!(errors.lock().len(), 1);
        assert_eq!(client.remote_endpoint(), Some(("127.0.0.1".to_string(), port)));
    }

    #[test]
    fn test_new_applies_enabled_tls_only() {
        let insecure = TlsSettings {
            enabled: true,
            server_name: Some("localhost".to_string()),
            ca_file: None,
            danger_accept_invalid_certs: true,
        };
        let config = ClientConfig::builder()
            .host("127.0.0.1")
            .port(7777)
            .tls(insecure.clone())
            .build()
            .unwrap();
        let client = Client::new(config).unwrap();
        assert!(client.inner.tls.lock().is_some());

        let disabled = TlsSettings {
            enabled: false,
            ..insecure
        };
        let config = ClientConfig::builder()
            .host("127.0.0.1")
            .port(7777)
            .tls(disabled)
            .build()
            .unwrap();
        let client = Client::new(config).unwrap();
        assert!(client.inner.tls.lock().is_none());
    }

    #[test]
    fn test_configured_reconnect_waits_for_first_connect() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let config = ClientConfig::builder()
            .host("127.0.0.1")
            .port(port)
            .auto_reconnect(Duration::from_millis(20))
            .build()
            .unwrap();

        let client = Client::new(config).unwrap();
        assert!(client.is_auto_reconnect_enabled());
        std::thread::sleep(Duration::from_millis(200));
        assert!(!client.is_connected());
        assert_eq!(client.remote_endpoint(), None);

        client.connect_config().unwrap();
        assert!(client.is_connected());
        assert_eq!(client.remote_endpoint(), Some(("127.0.0.1".to_string(), port)));
        client.disconnect();
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        assert!(matches!(
            Client::new(ClientConfig::default()),
            Err(NetError::Config(_))
        ));
    }
}
