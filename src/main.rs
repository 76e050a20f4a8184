//! roomhub chat server
//!
//! Runs the group-chat backend over the TCP/JSON-lines transport.
//!
//! Usage:
//!   cargo run -- server                    # Run on the default port
//!   cargo run -- server --port 5000       # Run on a specific port

use std::env;
use std::sync::Arc;

use anyhow::Result;
use roomhub::storage::{MemoryStore, MessageStore, NullStore};
use roomhub::{ChatConfig, ChatServer};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    match args[1].as_str() {
        "server" => {
            run_server(&args).await?;
        }
        "help" | "--help" | "-h" => {
            print_usage();
        }
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            print_usage();
            return Ok(());
        }
    }

    Ok(())
}

fn print_usage() {
    println!("Roomhub - Real-Time Group-Chat Backend");
    println!();
    println!("USAGE:");
    println!("    cargo run -- server [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    server              Start the chat server");
    println!("    help                Show this help message");
    println!();
    println!("OPTIONS:");
    println!("    --port <PORT>       Port to listen on (default: 5000)");
    println!("    --history <NUM>     History window size (default: 100)");
    println!("    --replay <NUM>      Messages replayed on join (default: 50)");
    println!("    --no-store          Run without the in-process durable store");
    println!();
    println!("PROTOCOL:");
    println!("    Clients speak newline-delimited JSON. Inbound events:");
    println!("    Join, Send, SendPrivate, React, Disconnect. Outbound:");
    println!("    MessageReceived, UserListUpdated, Error, ReactionsUpdated,");
    println!("    AllReactionsLoaded.");
    println!();
    println!("EXAMPLES:");
    println!("    cargo run -- server");
    println!("    cargo run -- server --port 6000 --history 200");
    println!("    RUST_LOG=debug cargo run -- server");
}

fn parse_flag(args: &[String], flag: &str, default: usize) -> usize {
    for i in 0..args.len() {
        if args[i] == flag && i + 1 < args.len() {
            if let Ok(value) = args[i + 1].parse() {
                return value;
            }
        }
    }
    default
}

// Parsed as u16 so an out-of-range value falls back to the default
// instead of truncating.
fn parse_port(args: &[String]) -> u16 {
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            if let Ok(value) = args[i + 1].parse() {
                return value;
            }
        }
    }
    5000
}

async fn run_server(args: &[String]) -> Result<()> {
    let port = parse_port(args);

    let config = ChatConfig {
        bind_addr: format!("0.0.0.0:{}", port).parse()?,
        history_capacity: parse_flag(args, "--history", 100),
        replay_limit: parse_flag(args, "--replay", 50),
        ..Default::default()
    };

    info!("Configuration:");
    info!("  - Bind address: {}", config.bind_addr);
    info!("  - History window: {} messages", config.history_capacity);
    info!("  - Replay limit: {} messages", config.replay_limit);
    info!("  - Reaction kinds: {:?}", config.reaction_kinds);

    let store: Arc<dyn MessageStore> = if args.iter().any(|a| a == "--no-store") {
        Arc::new(NullStore)
    } else {
        Arc::new(MemoryStore::new())
    };

    let server = ChatServer::new(config, store);

    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
