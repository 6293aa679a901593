//! Shared pieces of the demo programs: logging setup, per-connection message
//! framing and the chat room.

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use tcpnet::{Connection, ConnectionId, ServerStatistics};
use tcpnet_proto::{Framer, FramingConfig, MessageFramer};
use tracing::{debug, info, warn};

/// Line framing used when a configuration does not choose one.
pub fn default_framing() -> FramingConfig {
    FramingConfig::Delimiter {
        delimiter: "\r\n".to_string(),
        include_delimiter: false,
    }
}

/// Install the `tracing` subscriber. `RUST_LOG` overrides `-v`.
pub fn init_logging(verbose: u8) {
    let level = tcpnet::args::log_level(verbose);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| level.into()),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// One framer per peer, so partial messages of different peers never mix.
pub struct MessageSessions {
    framing: FramingConfig,
    outgoing: Framer,
    framers: Mutex<HashMap<ConnectionId, Framer>>,
}

impl MessageSessions {
    pub fn new(framing: FramingConfig) -> Self {
        Self {
            outgoing: Framer::from_config(&framing),
            framing,
            framers: Mutex::new(HashMap::new()),
        }
    }

    /// Feed a chunk from `id` and return its complete messages as text.
    pub fn feed(&self, id: ConnectionId, data: &[u8]) -> Vec<String> {
        let mut framers = self.framers.lock();
        let framer = framers
            .entry(id)
            .or_insert_with(|| Framer::from_config(&self.framing));
        framer
            .unframe(data)
            .iter()
            .map(|message| String::from_utf8_lossy(message).into_owned())
            .collect()
    }

    /// Forget the carry-over of a departed peer.
    pub fn remove(&self, id: ConnectionId) {
        self.framers.lock().remove(&id);
    }

    /// Frame `text` for the wire.
    ///
    /// # Errors
    ///
    /// Returns an error if the message is too long for the framing.
    pub fn frame(&self, text: &str) -> anyhow::Result<Bytes> {
        self.outgoing.frame(text.as_bytes())
    }

    /// Frame and send `text`, logging failures.
    pub fn send(&self, conn: &Connection, text: &str) {
        let result = self
            .frame(text)
            .and_then(|wire| conn.send(&wire).map_err(anyhow::Error::from));
        if let Err(e) = result {
            warn!("Send to {} failed: {:#}", conn.remote_addr(), e);
        }
    }
}

/// What the chat server does with one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatAction {
    /// Nothing to do.
    Ignore,
    /// Reply to the sender only.
    Reply(Vec<String>),
    /// Relay to everybody else.
    Relay(String),
    /// Say goodbye and close the sender.
    Quit,
}

/// Members of a chat and the rules for their messages.
pub struct ChatRoom {
    sessions: MessageSessions,
    members: Mutex<HashMap<ConnectionId, Connection>>,
}

impl ChatRoom {
    pub fn new(framing: FramingConfig) -> Self {
        Self {
            sessions: MessageSessions::new(framing),
            members: Mutex::new(HashMap::new()),
        }
    }

    pub fn member_count(&self) -> usize {
        self.members.lock().len()
    }

    /// Register a new member, greet it and tell the others.
    pub fn join(&self, conn: &Connection) {
        self.members.lock().insert(conn.id(), conn.clone());
        info!("Client connected from {}", conn.remote_addr());
        self.sessions
            .send(conn, "Welcome to Chat Server! Type '/help' for commands.");
        self.relay(conn.id(), &format!("User {} joined the chat", conn.remote_addr()));
    }

    /// Remove a member and tell the others.
    pub fn leave(&self, conn: &Connection) {
        let was_member = self.members.lock().remove(&conn.id()).is_some();
        self.sessions.remove(conn.id());
        if was_member {
            info!("Client disconnected: {}", conn.remote_addr());
            self.relay(conn.id(), &format!("User {} left the chat", conn.remote_addr()));
        }
    }

    /// Handle raw data from `conn`. `stats` is consulted for `/stats`.
    pub fn receive(&self, conn: &Connection, data: &[u8], stats: impl Fn() -> Option<ServerStatistics>) {
        for line in self.sessions.feed(conn.id(), data) {
            debug!("Message from {}: {}", conn.remote_addr(), line);
            match self.action(conn, &line, &stats) {
                ChatAction::Ignore => {}
                ChatAction::Reply(lines) => {
                    for reply in lines {
                        self.sessions.send(conn, &reply);
                    }
                }
                ChatAction::Relay(message) => self.relay(conn.id(), &message),
                ChatAction::Quit => {
                    self.sessions.send(conn, "Goodbye!");
                    conn.close();
                    return;
                }
            }
        }
    }

    /// Decide what to do with one line from `conn`.
    pub fn action(
        &self,
        conn: &Connection,
        line: &str,
        stats: &impl Fn() -> Option<ServerStatistics>,
    ) -> ChatAction {
        let line = line.trim_end();
        if line.is_empty() {
            return ChatAction::Ignore;
        }
        if !line.starts_with('/') {
            return ChatAction::Relay(format!("[{}] {}", conn.remote_addr(), line));
        }

        match line {
            "/help" => ChatAction::Reply(vec![
                "Available commands:".to_string(),
                "  /help - Show this help message".to_string(),
                "  /users - List connected users".to_string(),
                "  /stats - Show server statistics".to_string(),
                "  /quit - Disconnect from server".to_string(),
            ]),
            "/users" => {
                let mut reply = vec!["Connected users:".to_string()];
                let members = self.members.lock();
                let mut users: Vec<String> = members
                    .values()
                    .filter(|member| member.is_connected())
                    .map(|member| format!("  {}", member.remote_addr()))
                    .collect();
                users.sort();
                reply.extend(users);
                ChatAction::Reply(reply)
            }
            "/stats" => match stats() {
                Some(stats) => ChatAction::Reply(vec![
                    "Server Statistics:".to_string(),
                    format!("  Active connections: {}", stats.active_connections),
                    format!("  Total connections: {}", stats.total_connections),
                    format!("  Total bytes sent: {}", stats.total_bytes_sent),
                    format!("  Total bytes received: {}", stats.total_bytes_received),
                ]),
                None => ChatAction::Reply(vec!["Statistics unavailable".to_string()]),
            },
            "/quit" => ChatAction::Quit,
            _ => ChatAction::Reply(vec![
                "Unknown command. Type '/help' for available commands.".to_string(),
            ]),
        }
    }

    /// Send `message` to every connected member except `sender`.
    fn relay(&self, sender: ConnectionId, message: &str) {
        let targets: Vec<Connection> = self
            .members
            .lock()
            .values()
            .filter(|member| member.id() != sender && member.is_connected())
            .cloned()
            .collect();
        for target in &targets {
            self.sessions.send(target, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::net::TcpListener;
    use std::time::Duration;
    use tcpnet::ConnectionHandlers;
    use tcpnet_common::SocketOptions;

    /// A started connection to a throwaway listener, plus the listener.
    fn connection() -> (Connection, TcpListener) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let conn = Connection::connect(
            "127.0.0.1",
            port,
            SocketOptions::default(),
            Duration::from_secs(2),
            ConnectionHandlers::default(),
        )
        .unwrap();
        (conn, listener)
    }

    #[test]
    fn test_sessions_keep_peers_apart() {
        let sessions = MessageSessions::new(default_framing());
        let (a, _la) = connection();
        let (b, _lb) = connection();

        assert!(sessions.feed(a.id(), b"hel").is_empty());
        assert_eq!(sessions.feed(b.id(), b"x\r\n"), vec!["x"]);
        assert_eq!(sessions.feed(a.id(), b"lo\r\n"), vec!["hello"]);

        sessions.remove(a.id());
        assert!(sessions.feed(a.id(), b"tail").is_empty());
        assert_eq!(&sessions.frame("hi").unwrap()[..], b"hi\r\n");
    }

    #[test]
    fn test_chat_actions() {
        let room = ChatRoom::new(default_framing());
        let (conn, _listener) = connection();
        let no_stats = || None;

        assert_eq!(room.action(&conn, "  ", &no_stats), ChatAction::Ignore);
        assert_eq!(room.action(&conn, "/quit", &no_stats), ChatAction::Quit);
        assert_eq!(
            room.action(&conn, "hello ", &no_stats),
            ChatAction::Relay(format!("[{}] hello", conn.remote_addr()))
        );
        match room.action(&conn, "/help", &no_stats) {
            ChatAction::Reply(lines) => assert_eq!(lines.len(), 5),
            other => panic!("unexpected {:?}", other),
        }
        match room.action(&conn, "/bogus", &no_stats) {
            ChatAction::Reply(lines) => assert!(lines[0].starts_with("Unknown command")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_users_and_stats() {
        let room = ChatRoom::new(default_framing());
        let (conn, _listener) = connection();
        room.join(&conn);
        assert_eq!(room.member_count(), 1);

        let stats = || {
            Some(ServerStatistics {
                total_connections: 4,
                active_connections: 1,
                ..Default::default()
            })
        };
        assert_eq!(
            room.action(&conn, "/users", &stats),
            ChatAction::Reply(vec![
                "Connected users:".to_string(),
                format!("  {}", conn.remote_addr())
            ])
        );
        match room.action(&conn, "/stats", &stats) {
            ChatAction::Reply(lines) => assert_eq!(lines[2], "  Total connections: 4"),
            other => panic!("unexpected {:?}", other),
        }

        room.leave(&conn);
        assert_eq!(room.member_count(), 0);
    }
}
