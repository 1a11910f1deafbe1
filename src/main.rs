use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use visitguard::config::VisitguardConfig;
use visitguard::http::HttpServer;
use visitguard::ratelimit::{spawn_sweeper, RateLimiter};

/// Sliding-window admission service for booking endpoints.
#[derive(Parser, Debug)]
#[command(name = "visitguard", version, about)]
struct Args {
    /// Configuration file (YAML, TOML or JSON)
    #[arg(short, long)]
    config: Option<String>,

    /// Address to serve HTTP on, overriding the configuration
    #[arg(long)]
    http_addr: Option<SocketAddr>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);
    if args.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("Starting Visitguard");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = VisitguardConfig::load(args.config.as_deref())?;
    if let Some(addr) = args.http_addr {
        config.server.http_addr = addr;
    }
    info!(
        http_addr = %config.server.http_addr,
        max_requests = config.rate_limiting.max_requests,
        window_ms = config.rate_limiting.window_ms,
        "Configuration loaded"
    );

    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limiting.limits()));
    info!("Rate limiter initialized");

    let sweeper = config
        .rate_limiting
        .sweep_interval()
        .map(|interval| spawn_sweeper(rate_limiter.clone(), interval));

    let http_server = HttpServer::new(config.server.http_addr, rate_limiter);

    // Run the server with graceful shutdown on Ctrl+C
    let result = http_server.serve_with_shutdown(shutdown_signal()).await;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    result?;

    info!("Visitguard stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
