//! A single established TCP session and its receive loop.
//!
//! A [`Connection`] is created from a connected [`Socket`] in the
//! `Connecting` state. [`Connection::start`] switches the socket to
//! non-blocking mode, flips the state to `Connected` and spawns exactly one
//! receive-loop thread which polls the socket and hands every chunk of data
//! to the data handler.
//!
//! # Lifecycle
//!
//! ```text
//! Connecting -> Connected -> Disconnecting -> Disconnected
//!      \            \
//!       +------------+----> Error -> Disconnected
//! ```
//!
//! [`Connection::close`] raises the stop flag, shuts the socket down (which
//! unblocks the loop), joins the loop thread and only then reports
//! `Disconnected`. The disconnected handler fires exactly once whether the
//! connection was closed locally, by the peer, or after an error.
//!
//! The loop thread holds only a weak reference and upgrades it per
//! iteration, so dropping every handle lets the loop wind down on its own.

use crate::errors::NetError;
use crate::transport::SecureSession;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::io;
use std::net::SocketAddrV4;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use tcpnet_common::{ConnectionState, ErrorCode, SocketOptions};
use tcpnet_proto::{RateLimiter, Socket};
use tracing::{debug, error, info, warn};

/// Pause between receive attempts when no data is available.
const IDLE_POLL: Duration = Duration::from_millis(10);

/// Pause between send attempts when the kernel buffer is full.
const SEND_RETRY: Duration = Duration::from_millis(1);

/// Default receive buffer size of the loop.
pub const DEFAULT_RECEIVE_BUFFER: usize = 4096;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection identifier, used as the registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Numeric value of the identifier.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of a single non-blocking receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// `n` bytes were read.
    Data(usize),
    /// Nothing available right now; try again later.
    NoData,
    /// The connection is closed or has failed.
    Closed,
}

/// Called on the receive-loop thread with a copy of each received chunk.
pub type DataHandler = Arc<dyn Fn(&Connection, Bytes) + Send + Sync>;
/// Called once when the connection reaches `Disconnected`.
pub type DisconnectHandler = Arc<dyn Fn(&Connection) + Send + Sync>;
/// Called when an I/O error is surfaced.
pub type ErrorHandler = Arc<dyn Fn(&Connection, ErrorCode, &str) + Send + Sync>;

/// Callbacks attached to a connection.
///
/// Handlers run on whichever thread observed the event (usually the receive
/// loop) and should return promptly.
#[derive(Clone, Default)]
pub struct ConnectionHandlers {
    pub on_data: Option<DataHandler>,
    pub on_disconnected: Option<DisconnectHandler>,
    pub on_error: Option<ErrorHandler>,
}

impl ConnectionHandlers {
    /// Set the data handler.
    #[must_use]
    pub fn on_data(mut self, f: impl Fn(&Connection, Bytes) + Send + Sync + 'static) -> Self {
        self.on_data = Some(Arc::new(f));
        self
    }

    /// Set the disconnected handler.
    #[must_use]
    pub fn on_disconnected(mut self, f: impl Fn(&Connection) + Send + Sync + 'static) -> Self {
        self.on_disconnected = Some(Arc::new(f));
        self
    }

    /// Set the error handler.
    #[must_use]
    pub fn on_error(
        mut self,
        f: impl Fn(&Connection, ErrorCode, &str) + Send + Sync + 'static,
    ) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }
}

/// Point-in-time view of a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub remote_address: String,
    pub remote_port: u16,
    pub local_address: String,
    pub local_port: u16,
    pub state: ConnectionState,
    pub connected_at: Option<DateTime<Utc>>,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

struct Inner {
    id: ConnectionId,
    socket: Socket,
    remote: SocketAddrV4,
    local: SocketAddrV4,
    state: Mutex<ConnectionState>,
    connected_at: Mutex<Option<DateTime<Utc>>>,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    /// Serializes writers for the whole duration of a send.
    send_lock: Mutex<()>,
    /// Serializes readers.
    recv_lock: Mutex<()>,
    /// Held for each individual call into the encryption session.
    session: Mutex<Option<Box<dyn SecureSession>>>,
    handlers: RwLock<ConnectionHandlers>,
    stop: AtomicBool,
    /// Set when close was requested from the loop thread itself.
    finalize_on_exit: AtomicBool,
    finalized: AtomicBool,
    /// Held by external closers so concurrent closes join one at a time.
    close_lock: Mutex<()>,
    receive_thread: Mutex<Option<JoinHandle<()>>>,
    receive_thread_id: Mutex<Option<ThreadId>>,
    receive_buffer_size: usize,
}

/// Handle to one peer session. Cheap to clone.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Wrap a connected socket. The connection starts in `Connecting`.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket has no peer (not connected) or is not IPv4.
    pub fn from_socket(socket: Socket) -> Result<Self, NetError> {
        let remote = socket.peer_addr().map_err(|e| match ErrorCode::from_io(&e) {
            ErrorCode::ConnectionClosed => NetError::NotConnected,
            _ => NetError::Io(e),
        })?;
        let local = socket.local_addr()?;

        Ok(Self {
            inner: Arc::new(Inner {
                id: ConnectionId::next(),
                socket,
                remote,
                local,
                state: Mutex::new(ConnectionState::Connecting),
                connected_at: Mutex::new(None),
                bytes_sent: AtomicU64::new(0),
                bytes_received: AtomicU64::new(0),
                send_lock: Mutex::new(()),
                recv_lock: Mutex::new(()),
                session: Mutex::new(None),
                handlers: RwLock::new(ConnectionHandlers::default()),
                stop: AtomicBool::new(false),
                finalize_on_exit: AtomicBool::new(false),
                finalized: AtomicBool::new(false),
                close_lock: Mutex::new(()),
                receive_thread: Mutex::new(None),
                receive_thread_id: Mutex::new(None),
                receive_buffer_size: DEFAULT_RECEIVE_BUFFER,
            }),
        })
    }

    /// Connect to `host:port` and start the receive loop with `handlers`.
    ///
    /// Convenience for pool factories and simple tools; [`crate::Client`]
    /// adds reconnect and heartbeat on top of the same steps.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Timeout`] if the connect does not complete within
    /// `timeout`, and other variants for addressing and socket failures.
    pub fn connect(
        host: &str,
        port: u16,
        options: SocketOptions,
        timeout: Duration,
        handlers: ConnectionHandlers,
    ) -> Result<Self, NetError> {
        let socket = connect_socket(host, port, options, timeout)?;
        let conn = Self::from_socket(socket)?;
        conn.set_handlers(handlers);
        conn.start()?;
        Ok(conn)
    }

    /// Run `session`'s handshake on the still-blocking socket and route all
    /// further I/O through it. Must be called before [`Connection::start`].
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Tls`] if the handshake fails, and
    /// [`NetError::Internal`] if the connection has already started.
    pub fn secure(&self, mut session: Box<dyn SecureSession>) -> Result<(), NetError> {
        if self.state() != ConnectionState::Connecting {
            return Err(NetError::Internal(
                "encryption must be set up before the connection starts".to_string(),
            ));
        }
        let raw = self.inner.socket.handle().ok_or(NetError::ConnectionClosed)?;
        session
            .handshake(&raw)
            .map_err(|e| NetError::Tls(format!("Handshake with {} failed: {}", self.inner.remote, e)))?;
        debug!("Connection {} secured", self.inner.id);
        *self.inner.session.lock() = Some(session);
        Ok(())
    }

    /// Replace the callbacks.
    pub fn set_handlers(&self, handlers: ConnectionHandlers) {
        *self.inner.handlers.write() = handlers;
    }

    /// Enter `Connected` and spawn the receive loop.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is not in `Connecting`, the socket
    /// cannot be made non-blocking, or the thread cannot be spawned.
    pub fn start(&self) -> Result<(), NetError> {
        {
            let state = self.inner.state.lock();
            if *state != ConnectionState::Connecting {
                return Err(NetError::Internal(format!(
                    "cannot start connection in state {}",
                    *state
                )));
            }
        }
        if !self.inner.socket.set_non_blocking(true) {
            return Err(NetError::InvalidSocket(
                "failed to switch socket to non-blocking mode".to_string(),
            ));
        }

        let weak = Arc::downgrade(&self.inner);
        let buffer_size = self.inner.receive_buffer_size;
        *self.inner.connected_at.lock() = Some(Utc::now());
        *self.inner.state.lock() = ConnectionState::Connected;

        let handle = thread::Builder::new()
            .name(format!("tcpnet-recv-{}", self.inner.id.get()))
            .spawn(move || receive_loop(&weak, buffer_size))
            .map_err(|e| {
                *self.inner.state.lock() = ConnectionState::Error;
                NetError::Internal(format!("failed to spawn receive loop: {}", e))
            })?;
        *self.inner.receive_thread.lock() = Some(handle);

        debug!(
            "Connection {} started: local={} -> remote={}",
            self.inner.id, self.inner.local, self.inner.remote
        );
        Ok(())
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    /// Returns true while in `Connected`.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn remote_addr(&self) -> SocketAddrV4 {
        self.inner.remote
    }

    pub fn local_addr(&self) -> SocketAddrV4 {
        self.inner.local
    }

    pub fn connected_at(&self) -> Option<DateTime<Utc>> {
        *self.inner.connected_at.lock()
    }

    pub fn bytes_sent(&self) -> u64 {
        self.inner.bytes_sent.load(Ordering::Acquire)
    }

    pub fn bytes_received(&self) -> u64 {
        self.inner.bytes_received.load(Ordering::Acquire)
    }

    /// Whether an encryption session wraps this connection.
    pub fn is_secure(&self) -> bool {
        self.inner.session.lock().is_some()
    }

    /// Snapshot of addressing, state and counters.
    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            id: self.inner.id,
            remote_address: self.inner.remote.ip().to_string(),
            remote_port: self.inner.remote.port(),
            local_address: self.inner.local.ip().to_string(),
            local_port: self.inner.local.port(),
            state: self.state(),
            connected_at: self.connected_at(),
            bytes_sent: self.bytes_sent(),
            bytes_received: self.bytes_received(),
        }
    }

    /// Send all of `data`.
    ///
    /// Concurrent senders are serialized; partial writes are continued and
    /// would-block is retried in place. The sent-byte counter grows by exactly
    /// the number of bytes handed to the transport, even on failure.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::NotConnected`] outside `Connected`, and
    /// [`NetError::SendFailed`] or [`NetError::ConnectionClosed`] if the
    /// transport fails part way.
    pub fn send(&self, data: &[u8]) -> Result<(), NetError> {
        let _writer = self.inner.send_lock.lock();
        self.send_serialized(data)
    }

    /// Send `data`, waiting on `limiter` before each bucket-sized chunk.
    ///
    /// The send lock is held for the whole call, so the chunks of one payload
    /// are never interleaved with another sender's.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::SendFailed`] if the limiter has zero capacity, plus
    /// everything [`Connection::send`] can return.
    pub fn send_limited(&self, data: &[u8], limiter: &RateLimiter) -> Result<(), NetError> {
        let capacity = usize::try_from(limiter.bucket_size()).unwrap_or(usize::MAX);
        if capacity == 0 && !data.is_empty() {
            return Err(NetError::SendFailed("rate limiter has zero capacity".to_string()));
        }

        let _writer = self.inner.send_lock.lock();
        for chunk in data.chunks(capacity.max(1)) {
            limiter.wait_for_bytes(chunk.len() as u64);
            self.send_serialized(chunk)?;
        }
        Ok(())
    }

    fn send_serialized(&self, data: &[u8]) -> Result<(), NetError> {
        if !self.is_connected() {
            return Err(NetError::NotConnected);
        }
        let raw = self.inner.socket.handle().ok_or(NetError::ConnectionClosed)?;

        let mut offset = 0;
        let mut failure = None;
        while offset < data.len() {
            if self.inner.stop.load(Ordering::Acquire) {
                return Err(NetError::ConnectionClosed);
            }

            let result = {
                let mut session = self.inner.session.lock();
                match session.as_mut() {
                    Some(session) => session.wrap_send(&raw, &data[offset..]),
                    None => {
                        let mut writer: &socket2::Socket = &raw;
                        io::Write::write(&mut writer, &data[offset..])
                    }
                }
            };

            match result {
                Ok(0) => {
                    failure = Some((ErrorCode::ConnectionClosed, "peer stopped accepting data".to_string()));
                    break;
                }
                Ok(n) => {
                    offset += n;
                    self.inner.bytes_sent.fetch_add(n as u64, Ordering::AcqRel);
                }
                Err(e) if ErrorCode::from_io(&e).is_transient() => thread::sleep(SEND_RETRY),
                Err(e) => {
                    failure = Some((ErrorCode::from_io(&e), e.to_string()));
                    break;
                }
            }
        }

        if failure.is_none() {
            failure = self.flush_session(&raw);
        }

        match failure {
            None => Ok(()),
            Some((code, message)) => {
                self.report_error(code, &format!("Send to {} failed: {}", self.inner.remote, message));
                if code == ErrorCode::ConnectionClosed {
                    Err(NetError::ConnectionClosed)
                } else {
                    Err(NetError::SendFailed(message))
                }
            }
        }
    }

    /// Drain encrypted output left inside the session.
    fn flush_session(&self, raw: &socket2::Socket) -> Option<(ErrorCode, String)> {
        loop {
            if self.inner.stop.load(Ordering::Acquire) {
                return Some((ErrorCode::ConnectionClosed, "connection closing".to_string()));
            }
            let result = {
                let mut session = self.inner.session.lock();
                match session.as_mut() {
                    Some(session) if session.wants_write() => session.flush(raw),
                    _ => return None,
                }
            };
            match result {
                Ok(()) => {}
                Err(e) if ErrorCode::from_io(&e).is_transient() => thread::sleep(SEND_RETRY),
                Err(e) => return Some((ErrorCode::from_io(&e), e.to_string())),
            }
        }
    }

    /// Attempt one non-blocking receive into `buf`.
    ///
    /// While the receive loop runs it competes for the same data, so this is
    /// mainly useful for connections whose loop has not been started.
    pub fn receive_raw(&self, buf: &mut [u8]) -> ReceiveOutcome {
        let Some(raw) = self.inner.socket.handle() else {
            return ReceiveOutcome::Closed;
        };
        let reader_guard = self.inner.recv_lock.lock();

        let result = {
            let mut session = self.inner.session.lock();
            match session.as_mut() {
                Some(session) => session.wrap_receive(&raw, buf),
                None => {
                    let mut reader: &socket2::Socket = &raw;
                    match io::Read::read(&mut reader, buf) {
                        Ok(0) if !buf.is_empty() => Ok(ReceiveOutcome::Closed),
                        Ok(n) => Ok(ReceiveOutcome::Data(n)),
                        Err(e) => Err(e),
                    }
                }
            }
        };

        match result {
            Ok(ReceiveOutcome::Data(n)) => {
                self.inner.bytes_received.fetch_add(n as u64, Ordering::AcqRel);
                ReceiveOutcome::Data(n)
            }
            Ok(outcome) => outcome,
            Err(e) => {
                let code = ErrorCode::from_io(&e);
                if code.is_transient() {
                    return ReceiveOutcome::NoData;
                }
                drop(reader_guard);
                let code = if code == ErrorCode::UnknownError {
                    ErrorCode::ReceiveFailed
                } else {
                    code
                };
                self.report_error(code, &format!("Receive from {} failed: {}", self.inner.remote, e));
                ReceiveOutcome::Closed
            }
        }
    }

    /// Receive up to `max` bytes without blocking.
    ///
    /// Returns `Ok(None)` when nothing is available yet.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::ConnectionClosed`] once the connection is closed or failed.
    pub fn receive(&self, max: usize) -> Result<Option<Bytes>, NetError> {
        let mut buf = vec![0u8; max];
        match self.receive_raw(&mut buf) {
            ReceiveOutcome::Data(n) => {
                buf.truncate(n);
                Ok(Some(Bytes::from(buf)))
            }
            ReceiveOutcome::NoData => Ok(None),
            ReceiveOutcome::Closed => Err(NetError::ConnectionClosed),
        }
    }

    /// Close the connection. No-op once `Disconnected`.
    ///
    /// Marks the connection `Disconnecting`, raises the stop flag, shuts the
    /// socket down, joins the receive loop, then flips to `Disconnected` and
    /// fires the disconnected handler. When called from the receive loop
    /// itself (for example inside a data handler) the last two steps run as
    /// the loop exits.
    pub fn close(&self) {
        if self.on_receive_thread() {
            if self.begin_teardown() {
                self.inner.finalize_on_exit.store(true, Ordering::Release);
            }
            return;
        }

        {
            let _closing = self.inner.close_lock.lock();
            if !self.begin_teardown() && self.state() == ConnectionState::Disconnected {
                return;
            }

            let handle = self.inner.receive_thread.lock().take();
            if let Some(handle) = handle {
                if handle.join().is_err() {
                    warn!("Receive loop of connection {} panicked", self.inner.id);
                }
            }
        }
        self.finalize();
    }

    /// Steps 1 and 2 of the close protocol. Returns false if already torn down.
    fn begin_teardown(&self) -> bool {
        {
            let mut state = self.inner.state.lock();
            if *state == ConnectionState::Disconnected {
                return false;
            }
            *state = ConnectionState::Disconnecting;
        }
        let first = !self.inner.stop.swap(true, Ordering::AcqRel);
        self.shutdown_transport();
        first
    }

    fn shutdown_transport(&self) {
        if let Some(raw) = self.inner.socket.handle() {
            if let Some(mut session) = self.inner.session.lock().take() {
                session.shutdown(&raw);
            }
        }
        self.inner.socket.close();
    }

    /// Flip to `Disconnected` and fire the handler, exactly once.
    fn finalize(&self) {
        if self.inner.finalized.swap(true, Ordering::AcqRel) {
            return;
        }
        *self.inner.state.lock() = ConnectionState::Disconnected;
        info!(
            "Connection {} to {} disconnected (sent={}, received={})",
            self.inner.id,
            self.inner.remote,
            self.bytes_sent(),
            self.bytes_received()
        );

        let handler = self.inner.handlers.read().on_disconnected.clone();
        if let Some(handler) = handler {
            handler(self);
        }
    }

    /// Surface an error once, unless it is reset noise from an intentional close.
    fn report_error(&self, code: ErrorCode, message: &str) {
        if code.is_transient() {
            return;
        }
        if self.inner.stop.load(Ordering::Acquire) && code == ErrorCode::ConnectionClosed {
            debug!("Connection {}: ignoring during close: {}", self.inner.id, message);
            return;
        }

        {
            let mut state = self.inner.state.lock();
            if *state == ConnectionState::Disconnected {
                return;
            }
            *state = ConnectionState::Error;
        }
        error!("Connection {}: {}", self.inner.id, message);

        let handler = self.inner.handlers.read().on_error.clone();
        if let Some(handler) = handler {
            handler(self, code, message);
        }
    }

    fn on_receive_thread(&self) -> bool {
        *self.inner.receive_thread_id.lock() == Some(thread::current().id())
    }

    fn dispatch_data(&self, data: Bytes) {
        let handler = self.inner.handlers.read().on_data.clone();
        if let Some(handler) = handler {
            handler(self, data);
        }
    }

    /// The receive loop ended because the peer closed or I/O failed.
    fn terminate_from_loop(&self) {
        let owns_teardown = !self.inner.stop.swap(true, Ordering::AcqRel);
        if owns_teardown {
            {
                let mut state = self.inner.state.lock();
                if *state == ConnectionState::Connected {
                    *state = ConnectionState::Disconnecting;
                }
            }
            self.shutdown_transport();
            self.finalize();
        } else if self.inner.finalize_on_exit.load(Ordering::Acquire) {
            self.finalize();
        }
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Connection {}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("remote", &self.inner.remote)
            .field("state", &self.state())
            .finish()
    }
}

fn receive_loop(weak: &Weak<Inner>, buffer_size: usize) {
    let mut buf = vec![0u8; buffer_size];
    match weak.upgrade() {
        Some(inner) => *inner.receive_thread_id.lock() = Some(thread::current().id()),
        None => return,
    }
    loop {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let conn = Connection { inner };
        if conn.inner.stop.load(Ordering::Acquire) {
            conn.terminate_from_loop();
            return;
        }

        match conn.receive_raw(&mut buf) {
            ReceiveOutcome::Data(n) => {
                if conn.inner.stop.load(Ordering::Acquire) {
                    conn.terminate_from_loop();
                    return;
                }
                conn.dispatch_data(Bytes::copy_from_slice(&buf[..n]));
            }
            ReceiveOutcome::NoData => {
                drop(conn);
                thread::sleep(IDLE_POLL);
            }
            ReceiveOutcome::Closed => {
                debug!("Receive loop of connection {} ending", conn.inner.id);
                conn.terminate_from_loop();
                return;
            }
        }
    }
}

/// Create a socket and connect it to `host:port` within `timeout`.
///
/// # Errors
///
/// Returns [`NetError::InvalidAddress`] if the host does not resolve to
/// IPv4, [`NetError::Timeout`] when the readiness wait expires, and
/// [`NetError::ConnectionFailed`] for any other connect failure.
pub fn connect_socket(
    host: &str,
    port: u16,
    options: SocketOptions,
    timeout: Duration,
) -> Result<Socket, NetError> {
    let addr = tcpnet_proto::addr::socket_addr(host, port)
        .ok_or_else(|| NetError::InvalidAddress(format!("{}:{}", host, port)))?;

    let socket = Socket::new(options);
    socket
        .create()
        .map_err(|e| NetError::InvalidSocket(e.to_string()))?;

    match socket.connect_timeout(addr, timeout) {
        Ok(()) => {
            info!(
                "Connected via TCP: local={} -> remote={}",
                socket
                    .local_addr()
                    .map_or_else(|_| "?".to_string(), |a| a.to_string()),
                addr
            );
            Ok(socket)
        }
        Err(e) => {
            socket.close();
            match ErrorCode::from_io(&e) {
                ErrorCode::Timeout | ErrorCode::WouldBlock => Err(NetError::Timeout(timeout)),
                _ => Err(NetError::ConnectionFailed(format!(
                    "Failed to connect to {}: {}",
                    addr, e
                ))),
            }
        }
    }
}
