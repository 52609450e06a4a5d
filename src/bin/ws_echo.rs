//! Terminal WebSocket client
//!
//! Connects to the configured endpoint, sends every stdin line as a text
//! message and prints lifecycle events as they arrive. Lines starting with
//! `/` are commands:
//!
//! - `/status`      print the connection status
//! - `/connect`     start connecting
//! - `/disconnect`  close and stop reconnecting
//! - `/quit`        disconnect and exit
//!
//! Ctrl+C or end of input also exits.

use anyhow::Result;
use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use wsmanager_suite::bin_common::{
    init_tracing, load_config_from_env, parse_args, ConfigType, WsEchoSettings,
};
use wsmanager_suite::wsmanager::{
    HandshakeResponse, StatusObserver, WsManager, WsManagerError,
};

/// Grace period for the close handshake before the process exits
const CLOSE_GRACE: Duration = Duration::from_millis(500);

struct PrintObserver;

fn stamp() -> String {
    Local::now().format("%H:%M:%S%.3f").to_string()
}

impl StatusObserver for PrintObserver {
    fn on_open(&self, response: &HandshakeResponse) {
        println!("[{}] open (HTTP {})", stamp(), response.status);
    }

    fn on_text(&self, text: &str) {
        println!("[{}] < {}", stamp(), text);
    }

    fn on_binary(&self, data: &[u8]) {
        println!("[{}] < {} bytes", stamp(), data.len());
    }

    fn on_reconnect(&self) {
        println!("[{}] reconnecting...", stamp());
    }

    fn on_closing(&self, code: u16, reason: &str) {
        println!("[{}] closing {} {}", stamp(), code, reason);
    }

    fn on_closed(&self, code: u16, reason: &str) {
        println!("[{}] closed {} {}", stamp(), code, reason);
    }

    fn on_failure(&self, error: &WsManagerError, response: Option<&HandshakeResponse>) {
        match response {
            Some(response) => println!("[{}] failure: {} (HTTP {})", stamp(), error, response.status),
            None => println!("[{}] failure: {}", stamp(), error),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config_path = match parse_args().into_iter().next() {
        Some(path) => ConfigType::Custom(path),
        None => ConfigType::WsEcho,
    };
    let config_path = load_config_from_env(config_path);
    info!("Loading settings from {}", config_path.display());
    let settings = WsEchoSettings::load(&config_path)?;

    let manager = WsManager::builder()
        .url(settings.url.clone())
        .reconnect(settings.reconnect)
        .reconnect_config(settings.reconnect_policy.clone())
        .transport_config(settings.transport.clone())
        .observer(Arc::new(PrintObserver))
        .build()?;

    println!("Connecting to {}", manager.url());
    println!("Type a line to send it, /quit or Ctrl+C to stop\n");
    manager.start_connect();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match line.trim() {
                    "" => {}
                    "/quit" => break,
                    "/status" => println!(
                        "status: {} (reconnect attempts: {})",
                        manager.current_status(),
                        manager.reconnect_attempts()
                    ),
                    "/connect" => manager.start_connect(),
                    "/disconnect" => manager.stop_connect(),
                    text => {
                        if !manager.send_text(text) {
                            println!("not sent: {}", manager.current_status());
                        }
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C)");
                break;
            }
        }
    }

    manager.stop_connect();
    tokio::time::sleep(CLOSE_GRACE).await;

    println!("Shutdown complete");
    // The blocking stdin reader would keep the runtime from shutting down
    std::process::exit(0)
}
