//! TaskPrio Server

use std::net::SocketAddr;

use clap::{Parser, ValueEnum};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use taskprio_core::{BoundsMode, PriorityBounds};
use taskprio_server::{http, AppState, Config};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BoundsArg {
    /// Silently clamp out-of-range priorities.
    Clamp,
    /// Reject explicit out-of-range priorities.
    Reject,
}

impl From<BoundsArg> for BoundsMode {
    fn from(arg: BoundsArg) -> Self {
        match arg {
            BoundsArg::Clamp => BoundsMode::Clamp,
            BoundsArg::Reject => BoundsMode::Reject,
        }
    }
}

/// TaskPrio priority rule engine server.
#[derive(Parser, Debug)]
#[command(name = "taskprio-server", about = "Task priority rule engine with HTTP API")]
struct Args {
    /// HTTP server address
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// Lowest valid priority
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    min_priority: i32,

    /// Highest valid priority
    #[arg(long, default_value = "100", allow_negative_numbers = true)]
    max_priority: i32,

    /// What to do with explicit priorities outside the valid range
    #[arg(long, value_enum, default_value = "clamp")]
    bounds_mode: BoundsArg,

    /// Default log directive, overridden by RUST_LOG
    #[arg(long, default_value = "taskprio=info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_target(true)
        .init();

    let bounds = PriorityBounds::new(
        args.min_priority,
        args.max_priority,
        args.bounds_mode.into(),
    )?;
    let config = Config {
        bind_addr: args.bind,
        ..Config::default()
    }
    .with_bounds(bounds);
    let addr: SocketAddr = config.bind_addr.parse()?;

    info!(
        addr = %addr,
        min_priority = bounds.min,
        max_priority = bounds.max,
        mode = ?bounds.mode,
        "Starting TaskPrio server"
    );

    let state = AppState::new(config);
    let shutdown = state.shutdown.clone();
    let router = http::create_router(state);

    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
            shutdown.cancel();
        })
        .await?;

    info!("Server stopped");
    Ok(())
}
