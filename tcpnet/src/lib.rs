//! Connection-oriented TCP engine.
//!
//! This crate turns the primitives of `tcpnet-proto` into managed TCP
//! endpoints: connections with their own receive loop, clients that reconnect
//! and send heartbeats, servers with a connection registry, and a bounded
//! connection pool.
//!
//! # Features
//!
//! - **Managed lifecycle**: every connection follows one state machine and
//!   reports its disconnect exactly once
//! - **Auto-reconnect and heartbeat**: opt-in client loops that wake
//!   immediately when disabled
//! - **Bounded connect**: connects are limited by a timeout
//! - **TLS**: optional rustls session wrapped around raw socket I/O
//! - **Backpressure**: token-bucket rate limiting for outbound data
//! - **Configuration management**: TOML files, builders and CLI arguments
//!
//! # Quick Start
//!
//! ```no_run
//! use tcpnet::{Server, ServerHandlers};
//! use tcpnet_common::SocketOptions;
//!
//! # fn main() -> Result<(), tcpnet::NetError> {
//! let server = Server::with_options(SocketOptions::default());
//! server.set_handlers(ServerHandlers::default().on_data(|conn, data| {
//!     let _ = conn.send(&data);
//! }));
//! server.start("127.0.0.1", 7777, 128)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! Every long-running loop is an OS thread:
//!
//! - **Receive loop**: one per [`Connection`], polls the socket and dispatches data
//! - **Reconnect and heartbeat loops**: one each per [`Client`] when enabled
//! - **Accept and cleanup loops**: one each per running [`Server`]
//!
//! Callbacks run on these threads and should return promptly. The
//! [`events`] module bridges them into a channel for applications that want
//! to handle events on a thread of their own.
//!
//! # Error Handling
//!
//! Fallible calls return [`NetError`]. Loop threads cannot return errors, so
//! they report them through the error callback with an
//! [`ErrorCode`](tcpnet_common::ErrorCode), at most once per failure, and
//! never for would-block conditions or resets caused by a local close.
//!
//! # Safety
//!
//! This crate is `#![forbid(unsafe_code)]` and uses only safe Rust.

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod connection;
pub mod context;
pub mod errors;
pub mod events;
pub mod pool;
pub mod server;
pub mod stats;
pub mod transport;

// Optional CLI support
#[cfg(feature = "cli")]
pub mod args;

// Re-exports
pub use client::{Client, ClientHandlers};
pub use config::{ClientConfig, ServerConfig};
pub use connection::{
    connect_socket, Connection, ConnectionHandlers, ConnectionId, ConnectionInfo, ReceiveOutcome,
};
pub use context::Context;
pub use errors::NetError;
pub use events::ConnectionEvent;
pub use pool::ConnectionPool;
pub use server::{Server, ServerHandlers};
pub use stats::{ClientStatistics, ServerStatistics};
pub use transport::{SecureSession, TlsConfig, TlsServerConfig, TlsSession};
