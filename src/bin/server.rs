//! RelayKV Server Binary
//!
//! Starts the TCP server and, unless standalone, the replication sockets.

use std::path::PathBuf;

use clap::Parser;
use relaykv::{logging, Config, Server};

/// RelayKV Server
#[derive(Parser, Debug)]
#[command(name = "relaykv-server")]
#[command(about = "Networked key-value store with best-effort UDP replication")]
#[command(version)]
struct Args {
    /// Client listen address (host:port)
    #[arg(long, default_value = "127.0.0.1:1234")]
    tcp_listen: String,

    /// Cluster listen address for replicated mutations (host:port)
    #[arg(long, default_value = "127.0.0.1:8000")]
    udp_listen: String,

    /// Destination for replication datagrams
    #[arg(long, default_value = "255.255.255.255:8000")]
    broadcast: String,

    /// Bind address of the replication sender [default: <udp-listen ip>:8001]
    #[arg(long)]
    broadcast_source: Option<String>,

    /// Run outside of a cluster (no replication)
    #[arg(long)]
    standalone: bool,

    /// Log file
    #[arg(long, default_value = "server.log")]
    log: PathBuf,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,
}

fn main() {
    let args = Args::parse();

    // Build config from args
    let mut builder = Config::builder()
        .client_addr(&args.tcp_listen)
        .cluster_addr(&args.udp_listen)
        .broadcast_addr(&args.broadcast)
        .standalone(args.standalone)
        .max_connections(args.max_connections)
        .log_file(&args.log);
    if let Some(source) = &args.broadcast_source {
        builder = builder.broadcast_source_addr(source);
    }
    let config = builder.build();

    if let Err(e) = logging::init(config.log_file.as_deref()) {
        eprintln!("Failed to open log file {}: {}", args.log.display(), e);
        std::process::exit(1);
    }

    tracing::info!("RelayKV Server v{}", relaykv::VERSION);
    tracing::info!("Client address: {}", config.client_addr);
    tracing::info!("Standalone: {}", config.standalone);

    let server = match Server::bind(config) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
