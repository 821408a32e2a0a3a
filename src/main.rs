//! Audio stream proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │                STREAM PROXY                  │
//!   GET /proxy?url=...   │  ┌─────────┐   ┌─────────┐   ┌───────────┐   │
//!   ─────────────────────┼─▶│  http   │──▶│security │──▶│ upstream  │───┼──▶ Upstream
//!                        │  │ server  │   │ policy  │   │  client   │   │    (no Referer)
//!                        │  └─────────┘   └─────────┘   └─────┬─────┘   │
//!                        │                                    │         │
//!   streamed body + CORS │  ┌─────────┐                       │         │
//!   ◀────────────────────┼──│response │◀──────────────────────┘         │
//!                        │  └─────────┘                                 │
//!                        │                                              │
//!                        │  config (+watch) · observability · lifecycle │
//!                        └──────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use audio_stream_proxy::config::{load_config, watcher::ConfigWatcher, ProxyConfig};
use audio_stream_proxy::http::HttpServer;
use audio_stream_proxy::lifecycle::{signals, Shutdown};
use audio_stream_proxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "audio-stream-proxy")]
#[command(about = "Streams audio from referrer-protected upstreams with permissive CORS", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Reload the configuration file when it changes.
    #[arg(short, long, requires = "config")]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind.to_string();
    }

    logging::init_logging(&config.observability.log_level);
    tracing::info!("audio-stream-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        path = %config.listener.path,
        upstream_timeout_secs = config.upstream.timeout_secs,
        forward_range = config.upstream.forward_range,
        allowed_hosts = config.security.allowed_hosts.len(),
        "Configuration loaded"
    );
    if config.security.allowed_hosts.is_empty() {
        tracing::warn!("No host allow-list configured; any http(s) target will be proxied");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    // Keep the watcher alive for the lifetime of the server.
    let (_watcher, config_updates) = match (&cli.config, cli.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path, config.clone());
            (Some(watcher.run()?), updates)
        }
        _ => (None, mpsc::unbounded_channel().1),
    };

    let shutdown = Arc::new(Shutdown::new());
    let server_shutdown = shutdown.subscribe();
    signals::spawn_signal_handler(shutdown);

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
