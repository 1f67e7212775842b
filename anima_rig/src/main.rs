//! # Anima Rig Binary
//!
//! Runs the tick loop over the origins declared in `rig.toml`, with the
//! idle behavior family animating them until Ctrl-C.
//!
//! # Usage
//!
//! ```bash
//! # Run with the sample config and the simulation backend
//! anima_rig --config anima_rig/config/rig.toml
//!
//! # Threaded behavior family, linear easing, ten seconds
//! anima_rig -c anima_rig/config/rig.toml --threaded --profile linear --duration 10
//!
//! # Verbose JSON logs
//! anima_rig -c anima_rig/config/rig.toml -v --json
//! ```

use anima_common::consts::DEFAULT_CONFIG_PATH;
use anima_common::prelude::LogLevel;
use anima_core::fsm::Strategy;
use anima_rig::{BackendRegistry, IdleOptions, RigCore, idle_family};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Anima Rig - tick loop runtime with pluggable backends
#[derive(Parser, Debug)]
#[command(name = "anima_rig")]
#[command(version)]
#[command(about = "Tick loop runtime with pluggable backends for animated heads")]
#[command(long_about = None)]
struct Args {
    /// Path to the rig configuration file (rig.toml)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Backend to drive (overrides `rig.backend`)
    #[arg(short, long)]
    backend: Option<String>,

    /// Easing profile at startup (overrides `rig.profile`)
    #[arg(short, long)]
    profile: Option<String>,

    /// Run the behavior family with one thread per machine
    #[arg(long)]
    threaded: bool,

    /// Stop after this many seconds
    #[arg(short, long, value_name = "SECS")]
    duration: Option<f64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("Rig startup failed: {}", e);
        eprintln!("anima_rig: {e}");
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let deadline = match args.duration {
        Some(secs) => Some(Instant::now() + Duration::try_from_secs_f64(secs)?),
        None => None,
    };

    let mut config = RigCore::load_config(&args.config)?;
    setup_tracing(&args, config.shared.log_level);

    info!(
        "Anima Rig v{} starting ({})...",
        env!("CARGO_PKG_VERSION"),
        config.shared.service_name
    );

    if let Some(profile) = &args.profile {
        info!("Profile from CLI: {}", profile);
        config.rig.profile = profile.clone();
    }
    if let Some(backend) = &args.backend {
        info!("Backend from CLI: {}", backend);
        config.rig.backend = backend.clone();
    }
    let backend_name = config.rig.backend.clone();

    let registry = BackendRegistry::with_builtin()?;
    info!("Available backends: {:?}", registry.list_backends());

    let mut rig = RigCore::new(config)?;
    rig.init(&registry, &backend_name)?;

    let strategy = if args.threaded {
        Strategy::threaded()
    } else {
        Strategy::Cooperative
    };
    let running = rig.running_flag();
    let mut family = idle_family(
        rig.pools(),
        Arc::clone(&running),
        strategy,
        IdleOptions::default(),
    )?;

    let abort = family.abort_handle();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
        abort.abort();
    })?;

    let behavior = thread::Builder::new()
        .name("behavior".to_string())
        .spawn(move || family.run(None))?;

    if let Err(e) = rig.run_until(deadline) {
        error!("Tick loop error: {}", e);
    }

    match behavior.join() {
        Ok(Ok(exit)) => info!("Behavior family finished: {:?}", exit),
        Ok(Err(e)) => warn!("Behavior family failed: {}", e),
        Err(_) => error!("Behavior thread panicked"),
    }

    rig.shutdown()?;
    info!("Anima Rig shutdown complete");
    Ok(())
}

/// Setup tracing subscriber from CLI arguments and the configured level.
fn setup_tracing(args: &Args, level: LogLevel) {
    let level = if args.verbose {
        LogLevel::Debug
    } else {
        level
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_directive()));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
