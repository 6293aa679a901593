//! Bounded pool of reusable connections.
//!
//! The pool hands out idle connections first, creates new ones through its
//! factory while below the limit, and otherwise blocks until a connection is
//! released or the limit is raised.
//!
//! Released connections go straight back to the idle set without a liveness
//! check; a caller can receive a connection whose peer has gone away and will
//! see the failure on first use.

use crate::connection::Connection;
use crate::errors::NetError;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

type Factory<T> = Arc<dyn Fn() -> Result<T, NetError> + Send + Sync>;

struct PoolState<T> {
    idle: Vec<T>,
    active: Vec<T>,
    /// Slots reserved by callers running the factory.
    creating: usize,
    max_connections: usize,
    factory: Option<Factory<T>>,
}

/// A connection cache holding at most `max_connections` items, idle and
/// active combined.
pub struct ConnectionPool<T = Connection> {
    state: Mutex<PoolState<T>>,
    available: Condvar,
}

impl<T: Clone + PartialEq + Send> ConnectionPool<T> {
    pub fn new(max_connections: usize) -> Self {
        Self {
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                active: Vec::new(),
                creating: 0,
                max_connections,
                factory: None,
            }),
            available: Condvar::new(),
        }
    }

    /// Create a pool with a factory already installed.
    pub fn with_factory(
        max_connections: usize,
        factory: impl Fn() -> Result<T, NetError> + Send + Sync + 'static,
    ) -> Self {
        let pool = Self::new(max_connections);
        pool.set_factory(factory);
        pool
    }

    /// Install the function that creates new connections.
    pub fn set_factory(&self, factory: impl Fn() -> Result<T, NetError> + Send + Sync + 'static) {
        self.state.lock().factory = Some(Arc::new(factory));
    }

    /// Take a connection, blocking while the pool is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Config`] without a factory, or the factory's error.
    pub fn acquire(&self) -> Result<T, NetError> {
        self.acquire_until(None)?.ok_or(NetError::Internal(
            "pool wait ended without a connection".to_string(),
        ))
    }

    /// Take a connection without blocking. `Ok(None)` when exhausted.
    ///
    /// # Errors
    ///
    /// As [`ConnectionPool::acquire`].
    pub fn try_acquire(&self) -> Result<Option<T>, NetError> {
        self.acquire_until(Some(Instant::now()))
    }

    /// Take a connection, waiting at most `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Timeout`] if none became available in time,
    /// otherwise as [`ConnectionPool::acquire`].
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<T, NetError> {
        self.acquire_until(Some(Instant::now() + timeout))?
            .ok_or(NetError::Timeout(timeout))
    }

    fn acquire_until(&self, deadline: Option<Instant>) -> Result<Option<T>, NetError> {
        let factory = {
            let mut state = self.state.lock();
            loop {
                if let Some(conn) = state.idle.pop() {
                    state.active.push(conn.clone());
                    return Ok(Some(conn));
                }
                if state.active.len() + state.creating < state.max_connections {
                    let factory = state
                        .factory
                        .clone()
                        .ok_or_else(|| NetError::Config("Pool has no factory".to_string()))?;
                    state.creating += 1;
                    break factory;
                }
                match deadline {
                    Some(deadline) => {
                        if Instant::now() >= deadline {
                            return Ok(None);
                        }
                        self.available.wait_until(&mut state, deadline);
                    }
                    None => self.available.wait(&mut state),
                }
            }
        };

        // The slot is reserved, so the factory runs without the lock.
        let created = factory();
        let mut state = self.state.lock();
        state.creating -= 1;
        match created {
            Ok(conn) => {
                state.active.push(conn.clone());
                debug!("Pool created connection ({} active)", state.active.len());
                Ok(Some(conn))
            }
            Err(e) => {
                self.available.notify_one();
                Err(e)
            }
        }
    }

    /// Return a connection to the idle set and wake one waiter.
    ///
    /// Connections the pool did not hand out are ignored.
    pub fn release(&self, conn: T) {
        let mut state = self.state.lock();
        if let Some(index) = state.active.iter().position(|active| *active == conn) {
            state.active.swap_remove(index);
            state.idle.push(conn);
            self.available.notify_one();
        }
    }

    /// Forget every connection, idle and active.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.idle.clear();
        state.active.clear();
        self.available.notify_all();
    }

    /// Change the limit and wake all waiters.
    pub fn set_max_connections(&self, max: usize) {
        self.state.lock().max_connections = max;
        self.available.notify_all();
    }

    pub fn max_connections(&self) -> usize {
        self.state.lock().max_connections
    }

    pub fn active_connections(&self) -> usize {
        self.state.lock().active.len()
    }

    pub fn idle_connections(&self) -> usize {
        self.state.lock().idle.len()
    }
}

impl ConnectionPool<Connection> {
    /// Close and forget every connection.
    pub fn close_all(&self) {
        let drained: Vec<Connection> = {
            let mut state = self.state.lock();
            let mut all = std::mem::take(&mut state.idle);
            all.append(&mut state.active);
            self.available.notify_all();
            all
        };
        for conn in &drained {
            conn.close();
        }
    }
}

impl<T> std::fmt::Debug for ConnectionPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ConnectionPool")
            .field("idle", &state.idle.len())
            .field("active", &state.active.len())
            .field("max_connections", &state.max_connections)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;

    fn counting_pool(max: usize) -> (ConnectionPool<u32>, Arc<AtomicU32>) {
        let created = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&created);
        let pool = ConnectionPool::with_factory(max, move || {
            Ok(counter.fetch_add(1, Ordering::SeqCst) + 1)
        });
        (pool, created)
    }

    #[test]
    fn test_reuses_idle_connection() {
        let (pool, created) = counting_pool(2);
        let first = pool.acquire().unwrap();
        pool.release(first);
        assert_eq!(pool.idle_connections(), 1);

        let again = pool.acquire().unwrap();
        assert_eq!(again, first);
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert_eq!(pool.active_connections(), 1);
    }

    #[test]
    fn test_try_acquire_when_exhausted() {
        let (pool, _) = counting_pool(1);
        let held = pool.acquire().unwrap();
        assert_eq!(pool.try_acquire().unwrap(), None);
        pool.release(held);
        assert_eq!(pool.try_acquire().unwrap(), Some(held));
    }

    #[test]
    fn test_acquire_timeout_expires() {
        let (pool, _) = counting_pool(1);
        let _held = pool.acquire().unwrap();

        let start = Instant::now();
        let result = pool.acquire_timeout(Duration::from_millis(50));
        assert!(matches!(result, Err(NetError::Timeout(_))));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_second_acquire_blocks_until_release() {
        let (pool, _) = counting_pool(1);
        let pool = Arc::new(pool);
        let held = pool.acquire().unwrap();

        let waiter = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || pool.acquire().unwrap())
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!waiter.is_finished());

        pool.release(held);
        assert_eq!(waiter.join().unwrap(), held);
    }

    #[test]
    fn test_raising_limit_wakes_waiter() {
        let (pool, created) = counting_pool(1);
        let pool = Arc::new(pool);
        let _held = pool.acquire().unwrap();

        let waiter = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || pool.acquire().unwrap())
        };
        thread::sleep(Duration::from_millis(20));
        pool.set_max_connections(2);

        assert_eq!(waiter.join().unwrap(), 2);
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_missing_factory() {
        let pool: ConnectionPool<u32> = ConnectionPool::new(1);
        assert!(matches!(pool.acquire(), Err(NetError::Config(_))));
    }

    #[test]
    fn test_factory_error_propagates() {
        let pool: ConnectionPool<u32> =
            ConnectionPool::with_factory(1, || Err(NetError::ConnectionFailed("down".into())));
        assert!(matches!(pool.acquire(), Err(NetError::ConnectionFailed(_))));
        assert_eq!(pool.active_connections(), 0);
    }

    #[test]
    fn test_clear_and_foreign_release() {
        let (pool, _) = counting_pool(2);
        let a = pool.acquire().unwrap();
        pool.release(99);
        assert_eq!(pool.idle_connections(), 0);

        pool.release(a);
        pool.clear();
        assert_eq!(pool.idle_connections(), 0);
        assert_eq!(pool.active_connections(), 0);
    }
}
