//! Multi-user chat server.
//!
//! Lines from one user are relayed to everybody else. Commands: `/help`,
//! `/users`, `/stats`, `/quit`.

use anyhow::{Context as _, Result};
use std::sync::Arc;
use tcpnet::args::ServerArgs;
use tcpnet::{Server, ServerConfig, ServerHandlers};
use tcpnet_demos::{default_framing, init_logging, ChatRoom};
use tracing::{error, info};

const CHAT_PORT: u16 = 9999;

fn main() -> Result<()> {
    let args = ServerArgs::parse();
    init_logging(args.verbose);

    let mut config = ServerConfig::from_args(&args).context("Invalid server configuration")?;
    if args.port.is_none() && args.config.is_none() {
        config.bind.port = CHAT_PORT;
    }
    let room = Arc::new(ChatRoom::new(
        config.framing.clone().unwrap_or_else(default_framing),
    ));
    let server = Arc::new(Server::new(config)?);

    // Handlers hold the server weakly; it owns them.
    let stats_source = Arc::downgrade(&server);
    let on_connected = Arc::clone(&room);
    let on_data = Arc::clone(&room);
    let on_disconnected = Arc::clone(&room);
    server.set_handlers(
        ServerHandlers::default()
            .on_connected(move |conn| on_connected.join(conn))
            .on_data(move |conn, data| {
                on_data.receive(conn, &data, || {
                    stats_source.upgrade().map(|server| server.statistics())
                });
            })
            .on_disconnected(move |conn| on_disconnected.leave(conn))
            .on_error(|conn, code, message| {
                error!("Connection error for {} ({:?}): {}", conn.remote_addr(), code, message);
            }),
    );

    server.start_config().context("Failed to start chat server")?;
    if let Some(addr) = server.local_address() {
        info!("Chat server listening on {}", addr);
    }

    println!("Press Enter to stop server...");
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;

    let stats = server.statistics();
    server.stop();
    println!("Final Server Statistics: {}", stats);
    Ok(())
}
