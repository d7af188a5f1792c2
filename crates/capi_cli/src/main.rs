//! CAPI CLI
//!
//! Command-line tools for the Content API sync protocol.
//!
//! # Commands
//!
//! - `sign` - Build and sign a request from a payload file
//! - `verify` - Check the signature of a message file
//! - `send` - Send a request to a remote endpoint
//! - `handle` - Run a message through a local in-memory endpoint

mod commands;

use capi_client::RemoteEndpoint;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Content API sync tools.
#[derive(Parser)]
#[command(name = "capi")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and sign a request from a JSON array of payloads
    Sign {
        /// Payload file
        payloads: PathBuf,

        /// API key
        #[arg(short, long)]
        key: String,

        /// Shared secret
        #[arg(short, long)]
        secret: String,

        /// Write the message here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check the key and digest of a signed message file
    Verify {
        /// Message file
        message: PathBuf,

        /// API key
        #[arg(short, long)]
        key: String,

        /// Shared secret
        #[arg(short, long)]
        secret: String,
    },

    /// Send a request to a remote endpoint
    Send {
        /// Payload file
        payloads: PathBuf,

        /// Endpoint URI
        #[arg(short, long)]
        uri: String,

        /// API key
        #[arg(short, long)]
        key: String,

        /// Shared secret
        #[arg(short, long)]
        secret: String,

        /// Request timeout in seconds
        #[arg(short, long, default_value = "30")]
        timeout: u64,
    },

    /// Run a message through a local endpoint backed by an in-memory store
    Handle {
        /// Message file
        message: PathBuf,

        /// Endpoint configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Base URL for permalinks
        #[arg(short, long, default_value = "http://localhost")]
        base_url: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Sign {
            payloads,
            key,
            secret,
            output,
        } => {
            commands::sign::run(&payloads, &key, &secret, output.as_deref())?;
        }
        Commands::Verify {
            message,
            key,
            secret,
        } => {
            commands::verify::run(&message, &key, &secret)?;
        }
        Commands::Send {
            payloads,
            uri,
            key,
            secret,
            timeout,
        } => {
            let endpoint = RemoteEndpoint::new(uri, key, secret);
            commands::send::run(&payloads, &endpoint, timeout)?;
        }
        Commands::Handle {
            message,
            config,
            base_url,
        } => {
            commands::handle::run(&config, &message, &base_url)?;
        }
        Commands::Version => {
            println!("CAPI CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
