//! Client and server statistics snapshots.

use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Aggregate statistics of a [`Client`](crate::Client) across reconnects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientStatistics {
    /// Successful connects, including reconnects.
    pub total_connections: u64,
    /// Connects made by the reconnect loop.
    pub reconnections: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub last_connected_at: Option<DateTime<Utc>>,
    /// Time spent connected, including the current session.
    pub total_connected_time: Duration,
}

/// Statistics of a [`Server`](crate::Server), computed when queried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerStatistics {
    /// Connections accepted since start.
    pub total_connections: u64,
    /// Registered connections currently in `Connected`.
    pub active_connections: usize,
    /// Bytes sent by the registered connections.
    pub total_bytes_sent: u64,
    /// Bytes received by the registered connections.
    pub total_bytes_received: u64,
    pub start_time: Option<DateTime<Utc>>,
}

impl ServerStatistics {
    /// Time since the server started, if running.
    pub fn uptime(&self) -> Option<Duration> {
        let start = self.start_time?;
        (Utc::now() - start).to_std().ok()
    }
}

impl fmt::Display for ClientStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} connections ({} reconnects), sent {}, received {}, connected {:.1}s",
            self.total_connections,
            self.reconnections,
            human_bytes(self.bytes_sent),
            human_bytes(self.bytes_received),
            self.total_connected_time.as_secs_f64()
        )
    }
}

impl fmt::Display for ServerStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} active / {} total connections, sent {}, received {}",
            self.active_connections,
            self.total_connections,
            human_bytes(self.total_bytes_sent),
            human_bytes(self.total_bytes_received)
        )
    }
}

/// Simple IEC-style byte formatter (bytes, KiB, MiB, GiB).
pub fn human_bytes(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;
    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

    let b = bytes as f64;
    if b >= GIB {
        format!("{:.3} GiB", b / GIB)
    } else if b >= MIB {
        format!("{:.3} MiB", b / MIB)
    } else if b >= KIB {
        format!("{:.3} KiB", b / KIB)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_bytes() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(2048), "2.000 KiB");
        assert_eq!(human_bytes(3 * 1024 * 1024), "3.000 MiB");
    }

    #[test]
    fn test_display() {
        let stats = ClientStatistics {
            total_connections: 3,
            reconnections: 2,
            bytes_sent: 10,
            ..Default::default()
        };
        let text = stats.to_string();
        assert!(text.starts_with("3 connections (2 reconnects)"));
        assert!(text.contains("sent 10 B"));
    }

    #[test]
    fn test_uptime() {
        let stats = ServerStatistics::default();
        assert!(stats.uptime().is_none());

        let stats = ServerStatistics {
            start_time: Some(Utc::now() - chrono::Duration::seconds(2)),
            ..Default::default()
        };
        assert!(stats.uptime().unwrap() >= Duration::from_secs(1));
    }
}
