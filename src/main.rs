//! vhost-router
//!
//! Serves requests through a hierarchy of hosts and virtual hosts, each with
//! an ordered route table, and dispatches action routes to registered
//! native functions.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ endpoint ──▶ http server ──▶ host registry ──▶ route table
//!                                                  (Host header)     (first match)
//!                                                                        │
//!                                                                        ▼
//!     Client Response                                               target / stage
//!     ◀────────────── connection ◀──────────────────────────────── (action handler)
//!
//!     Cross-cutting: config (+ watcher), lifecycle, observability, admin API
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use vhost_router::action::ActionRegistry;
use vhost_router::config::watcher::ConfigWatcher;
use vhost_router::config::{load_config, ServerConfig};
use vhost_router::http::HttpServer;
use vhost_router::lifecycle::build_context;
use vhost_router::lifecycle::signals::{next_signal, SignalEvent};
use vhost_router::lifecycle::Shutdown;
use vhost_router::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "vhost-router")]
#[command(about = "Virtual-host routing HTTP server", long_about = None)]
struct Cli {
    /// Configuration file (TOML). Built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the route table and exit.
    #[arg(long)]
    print_routes: bool,

    /// With --print-routes, print every route attribute.
    #[arg(long, requires = "print_routes")]
    full: bool,

    /// With --print-routes, the host to print instead of the default host.
    #[arg(long, requires = "print_routes")]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    logging::init(&config.observability.log_level);

    if cli.print_routes {
        return print_routes(&config, cli.host.as_deref(), cli.full);
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        hosts = config.hosts.len(),
        "vhost-router starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = Arc::new(HttpServer::new(config, ActionRegistry::new())?);
    let shutdown = Arc::new(Shutdown::new());

    let serving = {
        let server = server.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { server.run(&shutdown).await })
    };

    // Dropping the watcher stops it, so it lives as long as the loop.
    let (_watcher, mut updates) = match &cli.config {
        Some(path) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            let handle = watcher
                .run()
                .map_err(|e| tracing::warn!(error = %e, "Config watcher not started"))
                .ok();
            (handle, Some(rx))
        }
        None => (None, None),
    };

    loop {
        tokio::select! {
            event = next_signal() => match event {
                SignalEvent::Shutdown => break,
                SignalEvent::Reload => match &cli.config {
                    Some(path) => match load_config(path) {
                        Ok(config) => reload(&server, config),
                        Err(e) => tracing::error!(error = %e, "Reload failed, keeping current configuration"),
                    },
                    None => tracing::warn!("Reload requested without a config file"),
                },
            },
            Some(config) = recv(&mut updates) => reload(&server, config),
        }
    }

    tracing::info!("Shutting down");
    shutdown.trigger();
    serving.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn recv(
    updates: &mut Option<tokio::sync::mpsc::UnboundedReceiver<ServerConfig>>,
) -> Option<ServerConfig> {
    match updates {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn reload(server: &HttpServer, config: ServerConfig) {
    if let Err(e) = server.reload(config) {
        tracing::error!(error = %e, "Reload failed, keeping current configuration");
    }
}

fn print_routes(
    config: &ServerConfig,
    host: Option<&str>,
    full: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = build_context(config, ActionRegistry::new())?;
    let host = match host {
        Some(name) => Some(
            ctx.hosts()
                .lookup(name)
                .ok_or_else(|| format!("unknown host: {name}"))?,
        ),
        None => None,
    };
    match ctx.log_routes(host.as_ref(), full) {
        Some(report) => println!("{report}"),
        None => eprintln!("No default host configured"),
    }
    ctx.stop();
    Ok(())
}
