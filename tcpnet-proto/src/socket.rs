//! Owned TCP socket handle with best-effort option application.
//!
//! [`Socket`] wraps at most one [`socket2::Socket`]. The handle is kept behind
//! an [`Arc`] so an I/O call can borrow it without holding the internal lock;
//! [`Socket::close`] shuts the handle down (which makes a concurrently blocked
//! `recv`/`send`/`accept` return) and drops this owner's reference. The file
//! descriptor is released only when the last in-flight call finishes, so it is
//! never closed twice nor reused underneath a running call.
//!
//! # Examples
//!
//! ```no_run
//! use std::net::{Ipv4Addr, SocketAddrV4};
//! use tcpnet_common::SocketOptions;
//! use tcpnet_proto::socket::Socket;
//!
//! # fn example() -> std::io::Result<()> {
//! let listener = Socket::new(SocketOptions::default());
//! listener.create()?;
//! listener.bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0))?;
//! listener.listen(16)?;
//! println!("listening on {}", listener.local_addr()?);
//! listener.close();
//! # Ok(())
//! # }
//! ```

use parking_lot::Mutex;
use socket2::{Domain, Protocol, SockAddr, Type};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddrV4};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tcpnet_common::SocketOptions;
use tracing::{debug, warn};

/// Shared reference to an OS socket handle.
pub type RawHandle = Arc<socket2::Socket>;

/// A stream socket owning at most one OS handle.
pub struct Socket {
    handle: Mutex<Option<RawHandle>>,
    non_blocking: AtomicBool,
    options: Mutex<SocketOptions>,
}

impl Socket {
    /// Create an empty socket that will use `options` once a handle exists.
    pub fn new(options: SocketOptions) -> Self {
        Self {
            handle: Mutex::new(None),
            non_blocking: AtomicBool::new(false),
            options: Mutex::new(options),
        }
    }

    /// Adopt an already connected handle, typically one returned by [`Socket::accept`].
    ///
    /// Options are applied best effort, as with [`Socket::create`].
    pub fn from_raw(raw: socket2::Socket, options: SocketOptions) -> Self {
        apply_options(&raw, &options);
        Self {
            handle: Mutex::new(Some(Arc::new(raw))),
            non_blocking: AtomicBool::new(false),
            options: Mutex::new(options),
        }
    }

    /// Replace any existing handle with a fresh IPv4 stream socket.
    ///
    /// # Errors
    ///
    /// Returns an error only if the OS refuses to allocate a socket. Failing
    /// to apply an individual option is logged and otherwise ignored.
    pub fn create(&self) -> io::Result<()> {
        let raw = socket2::Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
        apply_options(&raw, &self.options.lock());

        let previous = self.handle.lock().replace(Arc::new(raw));
        if let Some(previous) = previous {
            let _ = previous.shutdown(Shutdown::Both);
        }
        self.non_blocking.store(false, Ordering::Release);
        Ok(())
    }

    /// Shut down and release the handle. Idempotent, callable from any thread.
    pub fn close(&self) {
        let taken = self.handle.lock().take();
        if let Some(raw) = taken {
            match raw.shutdown(Shutdown::Both) {
                Ok(()) => debug!("Socket shut down"),
                // Listening or never-connected sockets report NotConnected.
                Err(e) if e.kind() == io::ErrorKind::NotConnected => {}
                Err(e) => debug!("Socket shutdown failed: {}", e),
            }
        }
    }

    /// Returns true while a handle is held.
    pub fn is_valid(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// Lend the current handle to an I/O call.
    pub fn handle(&self) -> Option<RawHandle> {
        self.handle.lock().clone()
    }

    fn require_handle(&self) -> io::Result<RawHandle> {
        self.handle()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "socket is closed"))
    }

    /// Switch between blocking and non-blocking I/O.
    ///
    /// Returns false, leaving the mode unchanged, if there is no handle or the
    /// OS rejects the change.
    pub fn set_non_blocking(&self, enabled: bool) -> bool {
        let Some(raw) = self.handle() else {
            return false;
        };
        match raw.set_nonblocking(enabled) {
            Ok(()) => {
                self.non_blocking.store(enabled, Ordering::Release);
                true
            }
            Err(e) => {
                warn!("Failed to set non-blocking={}: {}", enabled, e);
                false
            }
        }
    }

    /// Current I/O mode as last set through this wrapper.
    pub fn is_non_blocking(&self) -> bool {
        self.non_blocking.load(Ordering::Acquire)
    }

    /// Store new options and re-apply them to the current handle.
    ///
    /// Returns true only if every option applied.
    pub fn set_options(&self, options: SocketOptions) -> bool {
        let applied = match self.handle() {
            Some(raw) => apply_options(&raw, &options),
            None => true,
        };
        *self.options.lock() = options;
        applied
    }

    /// Options applied to this socket.
    pub fn options(&self) -> SocketOptions {
        self.options.lock().clone()
    }

    /// Bind to a local IPv4 address.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the address is in use or unavailable.
    pub fn bind(&self, addr: SocketAddrV4) -> io::Result<()> {
        self.require_handle()?.bind(&SockAddr::from(addr))
    }

    /// Start listening with the given backlog.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the socket cannot listen.
    pub fn listen(&self, backlog: i32) -> io::Result<()> {
        self.require_handle()?.listen(backlog)
    }

    /// Accept one pending connection.
    ///
    /// # Errors
    ///
    /// Returns `WouldBlock` on a non-blocking listener with nothing pending, or
    /// the OS error (including after [`Socket::close`]).
    pub fn accept(&self) -> io::Result<(socket2::Socket, SocketAddrV4)> {
        let raw = self.require_handle()?;
        let (peer, addr) = raw.accept()?;
        let addr = addr
            .as_socket_ipv4()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "accepted non-IPv4 peer"))?;
        // Accepted sockets may inherit the listener's non-blocking flag.
        peer.set_nonblocking(false)?;
        Ok((peer, addr))
    }

    /// Connect with a readiness wait bounded by `timeout`.
    ///
    /// The handle is switched to non-blocking for the attempt, the pending
    /// error status is checked once writable, and blocking mode is restored.
    ///
    /// # Errors
    ///
    /// Returns `TimedOut` if the deadline passes, or the pending socket error.
    pub fn connect_timeout(&self, addr: SocketAddrV4, timeout: Duration) -> io::Result<()> {
        let raw = self.require_handle()?;
        let result = raw.connect_timeout(&SockAddr::from(addr), timeout);
        self.non_blocking.store(false, Ordering::Release);
        result
    }

    /// Local address of the handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket is closed or not IPv4.
    pub fn local_addr(&self) -> io::Result<SocketAddrV4> {
        ipv4(self.require_handle()?.local_addr()?)
    }

    /// Remote address of the handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket is closed, unconnected or not IPv4.
    pub fn peer_addr(&self) -> io::Result<SocketAddrV4> {
        ipv4(self.require_handle()?.peer_addr()?)
    }

    /// Fetch and clear the pending `SO_ERROR` value.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket is closed or the query fails.
    pub fn take_error(&self) -> io::Result<Option<io::Error>> {
        self.require_handle()?.take_error()
    }

    /// Write once, returning the count accepted by the kernel.
    ///
    /// # Errors
    ///
    /// Returns the raw OS error, including `WouldBlock` in non-blocking mode.
    pub fn send(&self, data: &[u8]) -> io::Result<usize> {
        let raw = self.require_handle()?;
        let mut writer: &socket2::Socket = &raw;
        writer.write(data)
    }

    /// Read once into `buf`. `Ok(0)` means the peer closed the stream.
    ///
    /// # Errors
    ///
    /// Returns the raw OS error, including `WouldBlock` in non-blocking mode.
    pub fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let raw = self.require_handle()?;
        let mut reader: &socket2::Socket = &raw;
        reader.read(buf)
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Socket")
            .field("valid", &self.is_valid())
            .field("non_blocking", &self.is_non_blocking())
            .finish()
    }
}

fn ipv4(addr: SockAddr) -> io::Result<SocketAddrV4> {
    addr.as_socket_ipv4()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "not an IPv4 address"))
}

fn timeout_value(timeout: Duration) -> Option<Duration> {
    (!timeout.is_zero()).then_some(timeout)
}

/// Apply every option, logging failures. Returns true if all succeeded.
fn apply_options(raw: &socket2::Socket, options: &SocketOptions) -> bool {
    let results = [
        ("SO_REUSEADDR", raw.set_reuse_address(options.reuse_address)),
        ("SO_KEEPALIVE", raw.set_keepalive(options.keep_alive)),
        ("TCP_NODELAY", raw.set_nodelay(options.no_delay)),
        ("SO_SNDBUF", raw.set_send_buffer_size(options.send_buffer_size)),
        ("SO_RCVBUF", raw.set_recv_buffer_size(options.receive_buffer_size)),
        ("SO_SNDTIMEO", raw.set_write_timeout(timeout_value(options.send_timeout))),
        ("SO_RCVTIMEO", raw.set_read_timeout(timeout_value(options.receive_timeout))),
    ];

    let mut all_applied = true;
    for (name, result) in results {
        if let Err(e) = result {
            warn!("Failed to apply socket option {}: {}", name, e);
            all_applied = false;
        }
    }
    all_applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::thread;
    use std::time::Instant;

    fn loopback_listener() -> (Socket, SocketAddrV4) {
        let listener = Socket::new(SocketOptions::default());
        listener.create().unwrap();
        listener
            .bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0))
            .unwrap();
        listener.listen(8).unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr)
    }

    #[test]
    fn test_create_and_close_is_idempotent() {
        let socket = Socket::new(SocketOptions::default());
        assert!(!socket.is_valid());
        socket.create().unwrap();
        assert!(socket.is_valid());
        socket.close();
        socket.close();
        assert!(!socket.is_valid());
    }

    #[test]
    fn test_set_non_blocking_without_handle_fails() {
        let socket = Socket::new(SocketOptions::default());
        assert!(!socket.set_non_blocking(true));
        assert!(!socket.is_non_blocking());

        socket.create().unwrap();
        assert!(socket.set_non_blocking(true));
        assert!(socket.is_non_blocking());
    }

    #[test]
    fn test_connect_send_recv() {
        let (listener, addr) = loopback_listener();

        let client = Socket::new(SocketOptions::default());
        client.create().unwrap();
        client.connect_timeout(addr, Duration::from_secs(2)).unwrap();
        assert!(!client.is_non_blocking());

        let (accepted, peer) = listener.accept().unwrap();
        let server = Socket::from_raw(accepted, SocketOptions::default());
        assert_eq!(peer, client.local_addr().unwrap());

        assert_eq!(client.send(b"ping").unwrap(), 4);
        let mut buf = [0u8; 16];
        let n = server.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ping");
    }

    #[test]
    fn test_close_unblocks_pending_recv() {
        let (listener, addr) = loopback_listener();
        let client = Arc::new(Socket::new(SocketOptions::default()));
        client.create().unwrap();
        client.connect_timeout(addr, Duration::from_secs(2)).unwrap();
        let _accepted = listener.accept().unwrap();

        let reader = Arc::clone(&client);
        let started = Instant::now();
        let handle = thread::spawn(move || {
            let mut buf = [0u8; 8];
            reader.recv(&mut buf)
        });

        thread::sleep(Duration::from_millis(50));
        client.close();
        let result = handle.join().unwrap();
        assert!(matches!(result, Ok(0) | Err(_)));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_io_after_close_is_not_connected() {
        let socket = Socket::new(SocketOptions::default());
        let err = socket.send(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[test]
    fn test_zero_timeout_disables_timeout() {
        assert_eq!(timeout_value(Duration::ZERO), None);
        assert_eq!(
            timeout_value(Duration::from_millis(5)),
            Some(Duration::from_millis(5))
        );
    }
}
