//! Simple chat server example built on the broadcast hub
//!
//! Run with: cargo run --example chat_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example chat_server                    # binds to 0.0.0.0:9001
//!   cargo run --example chat_server localhost          # binds to 127.0.0.1:9001
//!   cargo run --example chat_server 127.0.0.1:9002     # binds to 127.0.0.1:9002
//!
//! ## Chatting
//!
//! Connect two or more clients and type:
//!
//!   websocat ws://localhost:9001
//!   wscat -c ws://localhost:9001
//!
//! Every message is relayed to all connected clients as `<id>:<text>`;
//! joins and leaves are announced to everyone.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use wshub_rs::{HubServer, ServerConfig};

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:9001
/// - "localhost:9002" -> 127.0.0.1:9002
/// - "127.0.0.1" -> 127.0.0.1:9001
/// - "0.0.0.0:9001" -> 0.0.0.0:9001
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = 9001;

    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: chat_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:9001)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let bind_addr = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => "0.0.0.0:9001".parse().unwrap(),
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wshub_rs=debug".parse()?)
                .add_directive("chat_server=debug".parse()?),
        )
        .init();

    let config = ServerConfig {
        bind_addr,
        ..ServerConfig::default()
    };

    println!("Starting chat server on {}", config.bind_addr);
    println!();
    println!("Connect with: websocat ws://{}", config.bind_addr);
    println!();

    let server = Arc::new(HubServer::new(config));

    // Out-of-band broadcast: a periodic notice pushed straight through the
    // hub handle, no connection involved.
    let hub = server.hub().clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(300));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            hub.broadcast("server: still here").await;
        }
    });

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                eprintln!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
        }
    }

    Ok(())
}
