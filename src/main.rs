//! Backend-for-frontend dispatcher.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request           ┌──────────────────────────────────────────────────┐
//!     ─────────────────────────┼─▶ http front door (POST /dispatch)               │
//!                              │        │                                         │
//!                              │        ▼                                         │
//!                              │   dispatcher ──▶ registry (service, endpoint)     │
//!                              │        │                                         │
//!                              │        ├──▶ circuit breaker (per service)        │
//!                              │        ├──▶ response cache (TTL, reads only)     │
//!                              │        └──▶ retry executor ──▶ transport ───────┼──▶ Upstream API
//!                              │                                                  │
//!                              │   admin API · metrics · structured logs          │
//!                              └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use bff_dispatch::config::load_config;
use bff_dispatch::lifecycle;
use bff_dispatch::observability::logging;

#[derive(Parser)]
#[command(name = "bff-dispatch")]
#[command(about = "Resilient dispatcher in front of third-party HTTP APIs", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml", env = "BFF_CONFIG")]
    config: PathBuf,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {}", args.config.display(), e);
            return ExitCode::FAILURE;
        }
    };

    if args.check {
        println!("Configuration OK: {} service(s)", config.services.len());
        return ExitCode::SUCCESS;
    }

    if let Err(e) = logging::init(&config.observability) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        services = config.services.len(),
        "bff-dispatch starting"
    );

    match lifecycle::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal startup error");
            ExitCode::FAILURE
        }
    }
}
