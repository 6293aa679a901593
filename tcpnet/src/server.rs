//! Listening server with a connection registry.
//!
//! [`Server::start`] binds and listens, then runs two threads:
//!
//! - **Accept loop**: accepts peers on a non-blocking listener, wraps each in
//!   a [`Connection`], registers it, wires the server handlers into it and
//!   fires the connected handler. Failed accepts pause briefly.
//! - **Cleanup sweep**: every cleanup interval (or immediately on stop) drops
//!   registry entries that are no longer `Connected`.
//!
//! Statistics are computed from the registry when queried.

use crate::config::ServerConfig;
use crate::connection::{Connection, ConnectionHandlers, ConnectionId};
use crate::errors::NetError;
use crate::stats::ServerStatistics;
use crate::transport::{TlsServerConfig, TlsSession};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tcpnet_common::{ErrorCode, SocketOptions};
use tcpnet_proto::Socket;
use tracing::{debug, error, info, warn};

/// Pause after a would-block or failed accept.
const ACCEPT_POLL: Duration = Duration::from_millis(10);

/// Default period of the cleanup sweep.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(5);

type ConnectionCallback = Arc<dyn Fn(&Connection) + Send + Sync>;
type ServerDataHandler = Arc<dyn Fn(&Connection, Bytes) + Send + Sync>;
type ServerErrorHandler = Arc<dyn Fn(&Connection, ErrorCode, &str) + Send + Sync>;

/// Server-level callbacks, invoked from accept and receive loop threads.
#[derive(Clone, Default)]
pub struct ServerHandlers {
    pub on_connected: Option<ConnectionCallback>,
    pub on_disconnected: Option<ConnectionCallback>,
    pub on_data: Option<ServerDataHandler>,
    pub on_error: Option<ServerErrorHandler>,
}

impl ServerHandlers {
    #[must_use]
    pub fn on_connected(mut self, f: impl Fn(&Connection) + Send + Sync + 'static) -> Self {
        self.on_connected = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_disconnected(mut self, f: impl Fn(&Connection) + Send + Sync + 'static) -> Self {
        self.on_disconnected = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_data(mut self, f: impl Fn(&Connection, Bytes) + Send + Sync + 'static) -> Self {
        self.on_data = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_error(
        mut self,
        f: impl Fn(&Connection, ErrorCode, &str) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }
}

struct ServerInner {
    options: Mutex<SocketOptions>,
    listener: Mutex<Option<Arc<Socket>>>,
    local: Mutex<Option<SocketAddrV4>>,
    running: AtomicBool,
    connections: Mutex<HashMap<ConnectionId, Connection>>,
    handlers: RwLock<ServerHandlers>,
    tls: Mutex<Option<Arc<rustls::ServerConfig>>>,
    cleanup_interval: Mutex<Duration>,
    cleanup_lock: Mutex<()>,
    cleanup_signal: Condvar,
    accept_thread: Mutex<Option<JoinHandle<()>>>,
    cleanup_thread: Mutex<Option<JoinHandle<()>>>,
    total_connections: AtomicU64,
    start_time: Mutex<Option<DateTime<Utc>>>,
    /// Serializes start and stop.
    lifecycle: Mutex<()>,
}

/// TCP server accepting peers into a registry.
///
/// Dropping the server stops it.
pub struct Server {
    inner: Arc<ServerInner>,
    config: Option<ServerConfig>,
}

impl Server {
    /// Create a server from a validated configuration. Call
    /// [`Server::start_config`] to begin listening.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Config`] for invalid settings or unreadable TLS
    /// files, and [`NetError::Tls`] if the certificate or key is rejected.
    pub fn new(config: ServerConfig) -> Result<Self, NetError> {
        config.validate()?;
        let mut server = Self::with_options(config.socket.clone());
        server.set_cleanup_interval(config.cleanup_interval());
        if let Some(tls) = &config.tls {
            server.enable_tls(&tls.load()?)?;
        }
        server.config = Some(config);
        Ok(server)
    }

    /// Create an unconfigured server using `options` for every socket.
    pub fn with_options(options: SocketOptions) -> Self {
        Self {
            inner: Arc::new(ServerInner {
                options: Mutex::new(options),
                listener: Mutex::new(None),
                local: Mutex::new(None),
                running: AtomicBool::new(false),
                connections: Mutex::new(HashMap::new()),
                handlers: RwLock::new(ServerHandlers::default()),
                tls: Mutex::new(None),
                cleanup_interval: Mutex::new(DEFAULT_CLEANUP_INTERVAL),
                cleanup_lock: Mutex::new(()),
                cleanup_signal: Condvar::new(),
                accept_thread: Mutex::new(None),
                cleanup_thread: Mutex::new(None),
                total_connections: AtomicU64::new(0),
                start_time: Mutex::new(None),
                lifecycle: Mutex::new(()),
            }),
            config: None,
        }
    }

    /// Replace the callbacks. Already registered connections keep forwarding
    /// to the new set.
    pub fn set_handlers(&self, handlers: ServerHandlers) {
        *self.inner.handlers.write() = handlers;
    }

    /// Require TLS on every accepted connection.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Tls`] if the certificate or key is rejected.
    pub fn enable_tls(&self, config: &TlsServerConfig) -> Result<(), NetError> {
        *self.inner.tls.lock() = Some(config.server_config()?);
        Ok(())
    }

    /// Period of the cleanup sweep. Takes effect on the next wait.
    pub fn set_cleanup_interval(&self, interval: Duration) {
        *self.inner.cleanup_interval.lock() = interval;
        let _sweep = self.inner.cleanup_lock.lock();
        self.inner.cleanup_signal.notify_all();
    }

    /// Start with the bind settings of the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Config`] if the server was not built from a
    /// configuration, otherwise as [`Server::start`].
    pub fn start_config(&self) -> Result<(), NetError> {
        let bind = self
            .config
            .as_ref()
            .map(|config| config.bind.clone())
            .ok_or_else(|| NetError::Config("Server has no configuration".to_string()))?;
        self.start(&bind.address, bind.port, bind.backlog)
    }

    /// Bind `address:port`, listen and spawn the accept and cleanup loops.
    ///
    /// Port 0 binds an ephemeral port; see [`Server::local_port`].
    ///
    /// # Errors
    ///
    /// Returns [`NetError::InvalidAddress`], [`NetError::InvalidSocket`],
    /// [`NetError::BindFailed`] or [`NetError::ListenFailed`]. A running
    /// server yields [`NetError::Internal`].
    pub fn start(&self, address: &str, port: u16, backlog: i32) -> Result<(), NetError> {
        let _lifecycle = self.inner.lifecycle.lock();
        if self.inner.running.load(Ordering::Acquire) {
            return Err(NetError::Internal("Server is already running".to_string()));
        }

        let ip: Ipv4Addr = address
            .parse()
            .map_err(|_| NetError::InvalidAddress(address.to_string()))?;
        let listener = Socket::new(self.inner.options.lock().clone());
        listener
            .create()
            .map_err(|e| NetError::InvalidSocket(e.to_string()))?;
        listener
            .bind(SocketAddrV4::new(ip, port))
            .map_err(|e| NetError::BindFailed(format!("{}:{}: {}", address, port, e)))?;
        listener
            .listen(backlog)
            .map_err(|e| NetError::ListenFailed(e.to_string()))?;
        if !listener.set_non_blocking(true) {
            return Err(NetError::ListenFailed(
                "failed to switch listener to non-blocking mode".to_string(),
            ));
        }
        let local = listener.local_addr()?;

        let listener = Arc::new(listener);
        *self.inner.listener.lock() = Some(Arc::clone(&listener));
        *self.inner.local.lock() = Some(local);
        *self.inner.start_time.lock() = Some(Utc::now());
        self.inner.running.store(true, Ordering::Release);

        let accept = {
            let inner = Arc::clone(&self.inner);
            thread::Builder::new()
                .name("tcpnet-accept".to_string())
                .spawn(move || inner.accept_loop(&listener))
        };
        let cleanup = {
            let inner = Arc::clone(&self.inner);
            thread::Builder::new()
                .name("tcpnet-cleanup".to_string())
                .spawn(move || inner.cleanup_loop())
        };

        let spawned = match (accept, cleanup) {
            (Ok(accept), Ok(cleanup)) => {
                *self.inner.accept_thread.lock() = Some(accept);
                *self.inner.cleanup_thread.lock() = Some(cleanup);
                Ok(())
            }
            (accept, cleanup) => {
                *self.inner.accept_thread.lock() = accept.ok();
                *self.inner.cleanup_thread.lock() = cleanup.ok();
                Err(NetError::Internal("failed to spawn server threads".to_string()))
            }
        };
        if let Err(e) = spawned {
            self.inner.shutdown();
            return Err(e);
        }

        info!("Server listening on {}", local);
        Ok(())
    }

    /// Stop listening, join both loops, then close every connection.
    pub fn stop(&self) {
        let _lifecycle = self.inner.lifecycle.lock();
        if !self.inner.running.load(Ordering::Acquire) {
            return;
        }
        self.inner.shutdown();
        info!("Server stopped");
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Bound address while running.
    pub fn local_address(&self) -> Option<SocketAddrV4> {
        *self.inner.local.lock()
    }

    /// Bound port while running (the ephemeral port when started with 0).
    pub fn local_port(&self) -> Option<u16> {
        self.local_address().map(|addr| addr.port())
    }

    /// Snapshot of the registered connections.
    pub fn connections(&self) -> Vec<Connection> {
        self.inner.connections.lock().values().cloned().collect()
    }

    pub fn connection(&self, id: ConnectionId) -> Option<Connection> {
        self.inner.connections.lock().get(&id).cloned()
    }

    /// Number of registered connections, including ones awaiting cleanup.
    pub fn connection_count(&self) -> usize {
        self.inner.connections.lock().len()
    }

    /// Close and unregister one connection. Returns false if unknown.
    pub fn close_connection(&self, id: ConnectionId) -> bool {
        let removed = self.inner.connections.lock().remove(&id);
        match removed {
            Some(conn) => {
                conn.close();
                true
            }
            None => false,
        }
    }

    /// Send to one connection.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::NotConnected`] for unknown ids, or the send error.
    pub fn send_to(&self, id: ConnectionId, data: &[u8]) -> Result<(), NetError> {
        let conn = self.connection(id).ok_or(NetError::NotConnected)?;
        conn.send(data)
    }

    /// Send to every connected peer and return how many sends succeeded.
    ///
    /// A failure on one connection does not stop delivery to the others.
    pub fn broadcast(&self, data: &[u8]) -> usize {
        let targets: Vec<Connection> = self
            .inner
            .connections
            .lock()
            .values()
            .filter(|conn| conn.is_connected())
            .cloned()
            .collect();

        targets
            .iter()
            .filter(|conn| match conn.send(data) {
                Ok(()) => true,
                Err(e) => {
                    debug!("Broadcast to connection {} failed: {}", conn.id(), e);
                    false
                }
            })
            .count()
    }

    /// Statistics computed from the live registry.
    pub fn statistics(&self) -> ServerStatistics {
        let connections = self.inner.connections.lock();
        let mut stats = ServerStatistics {
            total_connections: self.inner.total_connections.load(Ordering::Relaxed),
            start_time: *self.inner.start_time.lock(),
            ..Default::default()
        };
        for conn in connections.values() {
            if conn.is_connected() {
                stats.active_connections += 1;
            }
            stats.total_bytes_sent += conn.bytes_sent();
            stats.total_bytes_received += conn.bytes_received();
        }
        stats
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("running", &self.is_running())
            .field("local", &self.local_address())
            .field("connections", &self.connection_count())
            .finish_non_exhaustive()
    }
}

impl ServerInner {
    fn accept_loop(self: &Arc<Self>, listener: &Socket) {
        debug!("Accept loop started");
        while self.running.load(Ordering::Acquire) {
            match listener.accept() {
                Ok((raw, peer)) => {
                    if self.tls.lock().is_some() {
                        self.admit_in_background(raw, peer);
                    } else if let Err(e) = self.admit(raw) {
                        warn!("Rejected connection from {}: {}", peer, e);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL);
                }
                Err(e) => {
                    if self.running.load(Ordering::Acquire) {
                        debug!("Accept failed: {}", e);
                    }
                    thread::sleep(ACCEPT_POLL);
                }
            }
        }
        debug!("Accept loop stopped");
    }

    /// Run the TLS handshake off the accept thread so a silent peer cannot
    /// hold up other clients.
    fn admit_in_background(self: &Arc<Self>, raw: socket2::Socket, peer: SocketAddrV4) {
        let inner = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("tcpnet-handshake".to_string())
            .spawn(move || {
                if let Err(e) = inner.admit(raw) {
                    warn!("Rejected connection from {}: {}", peer, e);
                }
            });
        if let Err(e) = spawned {
            warn!("Cannot spawn handshake thread for {}: {}", peer, e);
        }
    }

    fn admit(self: &Arc<Self>, raw: socket2::Socket) -> Result<(), NetError> {
        let socket = Socket::from_raw(raw, self.options.lock().clone());
        let conn = Connection::from_socket(socket)?;

        let tls = self.tls.lock().clone();
        if let Some(tls) = tls {
            conn.secure(Box::new(TlsSession::server(tls)?))?;
        }

        self.connections.lock().insert(conn.id(), conn.clone());
        if !self.running.load(Ordering::Acquire) {
            // Stopped while the handshake ran.
            self.connections.lock().remove(&conn.id());
            conn.close();
            return Err(NetError::ConnectionClosed);
        }
        conn.set_handlers(self.connection_handlers());
        self.total_connections.fetch_add(1, Ordering::Relaxed);

        if let Err(e) = conn.start() {
            self.connections.lock().remove(&conn.id());
            return Err(e);
        }
        info!("Accepted connection {} from {}", conn.id(), conn.remote_addr());

        let handler = self.handlers.read().on_connected.clone();
        if let Some(handler) = handler {
            handler(&conn);
        }
        Ok(())
    }

    /// Forward per-connection events to the server handlers. The server is
    /// held weakly so registered connections do not keep it alive.
    fn connection_handlers(self: &Arc<Self>) -> ConnectionHandlers {
        let on_data = Arc::downgrade(self);
        let on_error = Arc::downgrade(self);
        let on_disconnected = Arc::downgrade(self);

        ConnectionHandlers::default()
            .on_data(move |conn, data| {
                if let Some(handler) = handler_of(&on_data, |h| h.on_data.clone()) {
                    handler(conn, data);
                }
            })
            .on_error(move |conn, code, message| {
                if let Some(handler) = handler_of(&on_error, |h| h.on_error.clone()) {
                    handler(conn, code, message);
                }
            })
            .on_disconnected(move |conn| {
                let Some(inner) = on_disconnected.upgrade() else {
                    return;
                };
                inner.connections.lock().remove(&conn.id());
                let handler = inner.handlers.read().on_disconnected.clone();
                drop(inner);
                if let Some(handler) = handler {
                    handler(conn);
                }
            })
    }

    fn cleanup_loop(&self) {
        let mut guard = self.cleanup_lock.lock();
        while self.running.load(Ordering::Acquire) {
            let interval = *self.cleanup_interval.lock();
            self.cleanup_signal.wait_for(&mut guard, interval);
            if !self.running.load(Ordering::Acquire) {
                break;
            }
            self.sweep();
        }
        debug!("Cleanup loop stopped");
    }

    /// Drop registry entries that are no longer connected.
    fn sweep(&self) {
        let mut connections = self.connections.lock();
        let before = connections.len();
        connections.retain(|_, conn| conn.is_connected());
        let removed = before - connections.len();
        if removed > 0 {
            debug!("Cleanup removed {} connection(s)", removed);
        }
    }

    fn shutdown(&self) {
        self.running.store(false, Ordering::Release);

        if let Some(listener) = self.listener.lock().take() {
            listener.close();
        }
        {
            let _sweep = self.cleanup_lock.lock();
            self.cleanup_signal.notify_all();
        }

        for slot in [&self.accept_thread, &self.cleanup_thread] {
            let handle = slot.lock().take();
            if let Some(handle) = handle {
                if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                    error!("Server thread panicked");
                }
            }
        }

        let connections: Vec<Connection> =
            self.connections.lock().drain().map(|(_, conn)| conn).collect();
        for conn in &connections {
            conn.close();
        }
        *self.local.lock() = None;
    }
}

fn handler_of<T>(
    server: &Weak<ServerInner>,
    pick: impl FnOnce(&ServerHandlers) -> Option<T>,
) -> Option<T> {
    let inner = server.upgrade()?;
    let handlers = inner.handlers.read();
    pick(&handlers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use std::time::Instant;

    fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if check() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        check()
    }

    fn running_server() -> Server {
        let server = Server::with_options(SocketOptions::default());
        server.start("127.0.0.1", 0, 16).unwrap();
        server
    }

    #[test]
    fn test_start_binds_ephemeral_port() {
        let server = running_server();
        assert!(server.is_running());
        assert!(server.local_port().unwrap() > 0);

        server.stop();
        assert!(!server.is_running());
        assert!(server.local_port().is_none());
        server.stop();
    }

    #[test]
    fn test_start_twice_fails() {
        let server = running_server();
        assert!(matches!(
            server.start("127.0.0.1", 0, 16),
            Err(NetError::Internal(_))
        ));
    }

    #[test]
    fn test_bind_conflict_fails_fast() {
        let first = running_server();
        let port = first.local_port().unwrap();

        let mut options = SocketOptions::default();
        options.reuse_address = false;
        let second = Server::with_options(options);
        let result = second.start("127.0.0.1", port, 16);
        assert!(matches!(result, Err(NetError::BindFailed(_))));
        assert!(!second.is_running());
    }

    #[test]
    fn test_invalid_address() {
        let server = Server::with_options(SocketOptions::default());
        assert!(matches!(
            server.start("not-an-ip", 0, 16),
            Err(NetError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_accept_registers_and_echoes() {
        let server = running_server();
        server.set_handlers(ServerHandlers::default().on_data(|conn, data| {
            let _ = conn.send(&data);
        }));

        let mut peer = TcpStream::connect(("127.0.0.1", server.local_port().unwrap())).unwrap();
        assert!(wait_until(Duration::from_secs(2), || server.connection_count() == 1));

        peer.write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        peer.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");

        // The counter is bumped after the write returns, so the peer can see
        // the bytes first.
        assert!(wait_until(Duration::from_secs(2), || {
            server.statistics().total_bytes_sent == 4
        }));
        let stats = server.statistics();
        assert_eq!(stats.total_connections, 1);
        assert_eq!(stats.active_connections, 1);
        assert_eq!(stats.total_bytes_received, 4);
    }

    #[test]
    fn test_peer_disconnect_leaves_registry_before_handler() {
        let server = running_server();
        server.set_cleanup_interval(Duration::from_secs(3600));
        let (tx, rx) = crossbeam_channel::unbounded();
        server.set_handlers(ServerHandlers::default().on_disconnected(move |conn| {
            let _ = tx.send(conn.id());
        }));

        let peer = TcpStream::connect(("127.0.0.1", server.local_port().unwrap())).unwrap();
        assert!(wait_until(Duration::from_secs(2), || server.connection_count() == 1));
        let id = server.connections()[0].id();
        drop(peer);

        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), id);
        assert_eq!(server.connection_count(), 0);
        assert!(server.connection(id).is_none());
        assert_eq!(server.statistics().active_connections, 0);
        assert_eq!(server.statistics().total_connections, 1);
    }

    /// Connect a peer that resets the connection when dropped.
    fn resetting_peer(server: &Server) -> socket2::Socket {
        let stream = TcpStream::connect(("127.0.0.1", server.local_port().unwrap())).unwrap();
        let peer = socket2::Socket::from(stream);
        peer.set_linger(Some(Duration::ZERO)).unwrap();
        peer
    }

    fn recording_server() -> (Server, Arc<Mutex<Vec<ErrorCode>>>, Arc<AtomicU64>) {
        let server = running_server();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let disconnects = Arc::new(AtomicU64::new(0));
        let sink = Arc::clone(&errors);
        let counter = Arc::clone(&disconnects);
        server.set_handlers(
            ServerHandlers::default()
                .on_error(move |_, code, _| sink.lock().push(code))
                .on_disconnected(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
        );
        (server, errors, disconnects)
    }

    #[test]
    fn test_peer_reset_reports_closed_once() {
        let (server, errors, disconnects) = recording_server();
        let peer = resetting_peer(&server);
        assert!(wait_until(Duration::from_secs(2), || server.connection_count() == 1));

        drop(peer);
        assert!(wait_until(Duration::from_secs(2), || {
            disconnects.load(Ordering::SeqCst) == 1
        }));
        thread::sleep(Duration::from_millis(50));
        assert_eq!(*errors.lock(), vec![ErrorCode::ConnectionClosed]);
        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(server.connection_count(), 0);
    }

    #[test]
    fn test_local_close_swallows_reset() {
        let (server, errors, disconnects) = recording_server();
        let _peer = resetting_peer(&server);
        assert!(wait_until(Duration::from_secs(2), || server.connection_count() == 1));

        server.stop();
        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
        assert!(errors.lock().is_empty());
    }

    #[test]
    fn test_cleanup_removes_closed_connections() {
        let server = running_server();
        server.set_cleanup_interval(Duration::from_millis(20));

        let peer = TcpStream::connect(("127.0.0.1", server.local_port().unwrap())).unwrap();
        assert!(wait_until(Duration::from_secs(2), || server.connection_count() == 1));
        drop(peer);

        assert!(wait_until(Duration::from_secs(2), || server.connection_count() == 0));
        assert_eq!(server.statistics().total_connections, 1);
    }

    #[test]
    fn test_close_connection() {
        let server = running_server();
        let mut peer = TcpStream::connect(("127.0.0.1", server.local_port().unwrap())).unwrap();
        assert!(wait_until(Duration::from_secs(2), || server.connection_count() == 1));

        let id = server.connections()[0].id();
        assert!(server.close_connection(id));
        assert!(!server.close_connection(id));
        assert!(matches!(server.send_to(id, b"x"), Err(NetError::NotConnected)));

        let mut buf = [0u8; 1];
        peer.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        assert_eq!(peer.read(&mut buf).unwrap_or(0), 0);
    }

    #[test]
    fn test_stop_closes_connections() {
        let server = running_server();
        let disconnects = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&disconnects);
        server.set_handlers(ServerHandlers::default().on_disconnected(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let _a = TcpStream::connect(("127.0.0.1", server.local_port().unwrap())).unwrap();
        let _b = TcpStream::connect(("127.0.0.1", server.local_port().unwrap())).unwrap();
        assert!(wait_until(Duration::from_secs(2), || server.connection_count() == 2));

        server.stop();
        assert_eq!(server.connection_count(), 0);
        assert_eq!(disconnects.load(Ordering::SeqCst), 2);
    }
}
