//! Interactive echo client. An empty line quits.

use anyhow::{Context as _, Result};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tcpnet::args::ClientArgs;
use tcpnet::{Client, ClientConfig, ClientHandlers};
use tcpnet_demos::{default_framing, init_logging};
use tcpnet_proto::{Framer, MessageFramer};
use tracing::{error, info};

/// Pause that lets the server's reply arrive before the next prompt.
const REPLY_PAUSE: Duration = Duration::from_millis(100);

fn main() -> Result<()> {
    let args = ClientArgs::parse();
    init_logging(args.verbose);

    let config = ClientConfig::from_args(&args).context("Invalid client configuration")?;
    let framing = config.framing.clone().unwrap_or_else(default_framing);
    let framer = Arc::new(Framer::from_config(&framing));
    let (host, port) = (config.connection.host.clone(), config.connection.port);
    let client = Client::new(config)?;

    let on_connected = Arc::clone(&framer);
    let on_data = Arc::clone(&framer);
    client.set_handlers(
        ClientHandlers::default()
            .on_connected(move || {
                on_connected.reset();
                info!("Connected to echo server");
            })
            .on_disconnected(|| info!("Disconnected from echo server"))
            .on_data(move |data| {
                for message in on_data.unframe(&data) {
                    println!("Server: {}", String::from_utf8_lossy(&message));
                }
            })
            .on_error(|code, message| error!("Error ({:?}): {}", code, message)),
    );

    println!("Connecting to {}:{}...", host, port);
    client.connect_config().context("Failed to connect to server")?;
    thread::sleep(REPLY_PAUSE);

    println!("Type messages to send (empty line to quit):");
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    while client.is_connected() {
        print!("You: ");
        io::stdout().flush()?;
        let Some(line) = lines.next().transpose()? else {
            break;
        };
        if line.is_empty() {
            break;
        }
        client.send(&framer.frame(line.as_bytes())?)?;
        thread::sleep(REPLY_PAUSE);
    }

    if client.is_connected() {
        client.send(&framer.frame(b"quit")?)?;
        thread::sleep(REPLY_PAUSE);
    }
    client.disconnect();

    let stats = client.statistics();
    println!("Connection Statistics:");
    println!("  Total connections: {}", stats.total_connections);
    println!("  Bytes sent: {}", stats.bytes_sent);
    println!("  Bytes received: {}", stats.bytes_received);
    Ok(())
}
