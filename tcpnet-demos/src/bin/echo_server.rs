//! Line-based echo server.
//!
//! Every line is answered with `Echo: <line>`; `quit` closes the session.
//! Connect with `telnet localhost 7777`.

use anyhow::{Context as _, Result};
use std::sync::Arc;
use tcpnet::args::ServerArgs;
use tcpnet::{Server, ServerConfig, ServerHandlers};
use tcpnet_demos::{default_framing, init_logging, MessageSessions};
use tracing::{error, info};

fn main() -> Result<()> {
    let args = ServerArgs::parse();
    init_logging(args.verbose);

    let config = ServerConfig::from_args(&args).context("Invalid server configuration")?;
    let sessions = Arc::new(MessageSessions::new(
        config.framing.clone().unwrap_or_else(default_framing),
    ));
    let server = Server::new(config)?;

    let on_connected = Arc::clone(&sessions);
    let on_data = Arc::clone(&sessions);
    let on_disconnected = Arc::clone(&sessions);
    server.set_handlers(
        ServerHandlers::default()
            .on_connected(move |conn| {
                info!("Client connected from {}", conn.remote_addr());
                on_connected.send(conn, "Welcome to Echo Server! Type 'quit' to disconnect.");
            })
            .on_data(move |conn, data| {
                for message in on_data.feed(conn.id(), &data) {
                    info!("Received from {}: {}", conn.remote_addr(), message);
                    if message == "quit" {
                        on_data.send(conn, "Goodbye!");
                        conn.close();
                        return;
                    }
                    on_data.send(conn, &format!("Echo: {}", message));
                }
            })
            .on_disconnected(move |conn| {
                info!("Client disconnected: {}", conn.remote_addr());
                on_disconnected.remove(conn.id());
            })
            .on_error(|conn, code, message| {
                error!("Connection error for {} ({:?}): {}", conn.remote_addr(), code, message);
            }),
    );

    server.start_config().context("Failed to start echo server")?;
    if let Some(addr) = server.local_address() {
        info!("Echo server listening on {}", addr);
    }

    println!("Press Enter to stop server...");
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;

    let stats = server.statistics();
    server.stop();

    println!("Final Server Statistics:");
    println!("  Total connections: {}", stats.total_connections);
    println!("  Total bytes sent: {}", stats.total_bytes_sent);
    println!("  Total bytes received: {}", stats.total_bytes_received);
    Ok(())
}
