//! Channel bridge for connection events.
//!
//! Handlers run on loop threads. Applications that prefer to consume events
//! from one thread of their own can install handlers built here and read a
//! [`crossbeam_channel::Receiver`] instead.
//!
//! ```no_run
//! use tcpnet::{events, Server};
//! use tcpnet_common::SocketOptions;
//!
//! # fn example() -> Result<(), tcpnet::NetError> {
//! let server = Server::with_options(SocketOptions::default());
//! let (handlers, events) = events::server_channel();
//! server.set_handlers(handlers);
//! server.start("127.0.0.1", 7777, 16)?;
//!
//! for event in events.iter() {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```

use crate::client::ClientHandlers;
use crate::connection::{ConnectionHandlers, ConnectionId};
use crate::server::ServerHandlers;
use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender};
use tcpnet_common::ErrorCode;

/// An event observed on a connection.
///
/// `id` is set for events raised by a specific [`crate::Connection`]; client
/// events leave it empty since a client has only one connection at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Connection established (client) or accepted (server).
    Connected { id: Option<ConnectionId> },

    /// Data received.
    Data { id: Option<ConnectionId>, data: Bytes },

    /// Connection closed.
    Disconnected { id: Option<ConnectionId> },

    /// Error surfaced by the connection.
    Error {
        id: Option<ConnectionId>,
        code: ErrorCode,
        message: String,
    },
}

impl ConnectionEvent {
    /// The connection that raised this event, if known.
    pub fn id(&self) -> Option<ConnectionId> {
        match self {
            Self::Connected { id }
            | Self::Data { id, .. }
            | Self::Disconnected { id }
            | Self::Error { id, .. } => *id,
        }
    }
}

/// Client handlers forwarding into a new unbounded channel.
pub fn client_channel() -> (ClientHandlers, Receiver<ConnectionEvent>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (client_handlers(tx), rx)
}

/// Client handlers forwarding into `tx`. Events are dropped once the
/// receiver is gone.
pub fn client_handlers(tx: Sender<ConnectionEvent>) -> ClientHandlers {
    let connected = tx.clone();
    let disconnected = tx.clone();
    let data = tx.clone();
    let error = tx;

    ClientHandlers::default()
        .on_connected(move || {
            let _ = connected.send(ConnectionEvent::Connected { id: None });
        })
        .on_disconnected(move || {
            let _ = disconnected.send(ConnectionEvent::Disconnected { id: None });
        })
        .on_data(move |bytes| {
            let _ = data.send(ConnectionEvent::Data { id: None, data: bytes });
        })
        .on_error(move |code, message| {
            let _ = error.send(ConnectionEvent::Error {
                id: None,
                code,
                message: message.to_string(),
            });
        })
}

/// Server handlers forwarding into a new unbounded channel.
pub fn server_channel() -> (ServerHandlers, Receiver<ConnectionEvent>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (server_handlers(tx), rx)
}

/// Server handlers forwarding into `tx`.
pub fn server_handlers(tx: Sender<ConnectionEvent>) -> ServerHandlers {
    let connected = tx.clone();
    let disconnected = tx.clone();
    let data = tx.clone();
    let error = tx;

    ServerHandlers::default()
        .on_connected(move |conn| {
            let _ = connected.send(ConnectionEvent::Connected { id: Some(conn.id()) });
        })
        .on_disconnected(move |conn| {
            let _ = disconnected.send(ConnectionEvent::Disconnected { id: Some(conn.id()) });
        })
        .on_data(move |conn, bytes| {
            let _ = data.send(ConnectionEvent::Data {
                id: Some(conn.id()),
                data: bytes,
            });
        })
        .on_error(move |conn, code, message| {
            let _ = error.send(ConnectionEvent::Error {
                id: Some(conn.id()),
                code,
                message: message.to_string(),
            });
        })
}

/// Handlers for a standalone [`crate::Connection`]. It has no connected
/// event; the connection is live once started.
pub fn connection_channel() -> (ConnectionHandlers, Receiver<ConnectionEvent>) {
    let (tx, rx) = crossbeam_channel::unbounded();
    let disconnected = tx.clone();
    let data = tx.clone();
    let error = tx;

    let handlers = ConnectionHandlers::default()
        .on_disconnected(move |conn| {
            let _ = disconnected.send(ConnectionEvent::Disconnected { id: Some(conn.id()) });
        })
        .on_data(move |conn, bytes| {
            let _ = data.send(ConnectionEvent::Data {
                id: Some(conn.id()),
                data: bytes,
            });
        })
        .on_error(move |conn, code, message| {
            let _ = error.send(ConnectionEvent::Error {
                id: Some(conn.id()),
                code,
                message: message.to_string(),
            });
        });
    (handlers, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_handlers_forward() {
        let (handlers, rx) = client_channel();
        (handlers.on_connected.unwrap())();
        (handlers.on_data.unwrap())(Bytes::from_static(b"hi"));
        (handlers.on_error.unwrap())(ErrorCode::Timeout, "slow");
        (handlers.on_disconnected.unwrap())();

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                ConnectionEvent::Connected { id: None },
                ConnectionEvent::Data {
                    id: None,
                    data: Bytes::from_static(b"hi")
                },
                ConnectionEvent::Error {
                    id: None,
                    code: ErrorCode::Timeout,
                    message: "slow".to_string()
                },
                ConnectionEvent::Disconnected { id: None },
            ]
        );
    }

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let (handlers, rx) = client_channel();
        drop(rx);
        (handlers.on_connected.unwrap())();
    }
}
