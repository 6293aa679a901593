//! Chat client. Type lines to talk, `/quit` to leave.

use anyhow::{Context as _, Result};
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tcpnet::args::ClientArgs;
use tcpnet::{Client, ClientConfig, ClientHandlers};
use tcpnet_demos::{default_framing, init_logging};
use tcpnet_proto::{Framer, MessageFramer};
use tracing::error;

const CHAT_PORT: u16 = 9999;

fn main() -> Result<()> {
    let args = ClientArgs::parse();
    init_logging(args.verbose);

    let mut config = ClientConfig::from_args(&args).context("Invalid client configuration")?;
    let port_given = args.port.is_some()
        || args.config.is_some()
        || args.server.as_deref().is_some_and(|server| server.contains(':'));
    if !port_given {
        config.connection.port = CHAT_PORT;
    }
    let framing = config.framing.clone().unwrap_or_else(default_framing);
    let framer = Arc::new(Framer::from_config(&framing));
    let client = Client::new(config)?;

    let running = Arc::new(AtomicBool::new(true));
    let on_disconnected = Arc::clone(&running);
    let on_connected = Arc::clone(&framer);
    let on_data = Arc::clone(&framer);
    client.set_handlers(
        ClientHandlers::default()
            .on_connected(move || {
                on_connected.reset();
                println!("Connected to chat server!");
                println!("Type messages to send (/quit to exit):");
            })
            .on_disconnected(move || {
                println!("Disconnected from chat server!");
                on_disconnected.store(false, Ordering::SeqCst);
            })
            .on_data(move |data| {
                for message in on_data.unframe(&data) {
                    let text = String::from_utf8_lossy(&message);
                    let text = text.trim_end();
                    if !text.is_empty() {
                        print!("\r{}\nYou: ", text);
                        let _ = io::stdout().flush();
                    }
                }
            })
            .on_error(|code, message| error!("Error ({:?}): {}", code, message)),
    );

    client.connect_config().context("Failed to connect to chat server")?;

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    while running.load(Ordering::SeqCst) && client.is_connected() {
        print!("You: ");
        io::stdout().flush()?;
        let Some(line) = lines.next().transpose()? else {
            break;
        };
        if line.is_empty() {
            continue;
        }
        client.send(&framer.frame(line.as_bytes())?)?;
        if line == "/quit" {
            break;
        }
    }
    client.disconnect();

    let stats = client.statistics();
    println!("Connection Statistics: {}", stats);
    Ok(())
}
