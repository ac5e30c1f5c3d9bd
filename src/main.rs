//! drive-coach - driving behaviour coaching from vehicle telemetry
//!
//! # Usage
//!
//! ```bash
//! # List drivers and their trips
//! drive-coach drivers
//! drive-coach trips alice
//!
//! # Severity of every window in a trip
//! drive-coach windows alice 2024-05-01_0800
//!
//! # Coach-mode analysis of one window (or the whole trip without an index)
//! drive-coach --stub analyze alice 2024-05-01_0800 3 --coach
//!
//! # Stream a driver's first trip, one window per tick
//! drive-coach stream alice --tick-secs 5
//!
//! # With a GGUF model (requires the `llm` feature)
//! LLM_MODEL_PATH=models/coach.gguf cargo run --release --features llm -- stream alice
//! ```
//!
//! # Environment Variables
//!
//! - `DRIVE_COACH_CONFIG`: Path to the TOML config (default: ./coach_config.toml)
//! - `LLM_MODEL_PATH`: GGUF model file, overrides `[inference] model_path`
//! - `RUST_LOG`: Logging level (default: info)

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use drive_coach::config::{self, CoachConfig};
use drive_coach::llm::{StubGenerator, TextGenerator};
use drive_coach::storage::SledStore;
use drive_coach::types::{FeedbackMode, UserRole};
use drive_coach::{CoachService, StartOutcome, TickOutcome};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "drive-coach")]
#[command(about = "Driving behaviour coaching from vehicle telemetry")]
#[command(version)]
struct CliArgs {
    /// Path to a TOML config file (overrides DRIVE_COACH_CONFIG)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Use the canned-response generator instead of a model
    #[arg(long, global = true)]
    stub: bool,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// List drivers with trip data
    Drivers,

    /// List a driver's trips
    Trips { driver: String },

    /// Show the severity of every window in a trip
    Windows { driver: String, trip: String },

    /// Generate coaching for one window, or for the trip's first window
    Analyze {
        driver: String,
        trip: String,
        index: Option<usize>,
        /// Coach-facing wording
        #[arg(long)]
        coach: bool,
    },

    /// Stream coaching for a driver's first trip
    Stream {
        driver: String,
        /// Seconds between scheduler ticks (default from config)
        #[arg(long)]
        tick_secs: Option<u64>,
    },

    /// Register a user in the coaching log
    Register {
        user: String,
        /// `driver` or `coach`
        role: UserRole,
    },

    /// Show recently logged coaching results and registered users
    History {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

// ============================================================================
// Setup
// ============================================================================

fn load_config(path: Option<&PathBuf>) -> Result<CoachConfig> {
    let config = match path {
        Some(path) => {
            let mut config = CoachConfig::load_from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?;
            config.apply_env_overrides();
            for w in config.validate() {
                warn!(field = %w.field, "{}", w);
            }
            config
        }
        None => CoachConfig::load(),
    };
    Ok(config)
}

/// Pick the text generator: stub when asked for, otherwise the GGUF model.
async fn build_generator(config: &CoachConfig, force_stub: bool) -> Result<Arc<dyn TextGenerator>> {
    if force_stub || config.inference.use_stub {
        info!("Using stub generator");
        return Ok(Arc::new(StubGenerator));
    }

    #[cfg(feature = "llm")]
    {
        let Some(path) = config.inference.model_path.as_deref() else {
            bail!("no model configured; set LLM_MODEL_PATH or pass --stub");
        };
        info!(cuda = drive_coach::llm::is_cuda_available(), "Loading coaching model");
        let backend = drive_coach::llm::MistralRsBackend::load(path).await?;
        Ok(Arc::new(backend))
    }
    #[cfg(not(feature = "llm"))]
    {
        if config.inference.model_path.is_some() {
            warn!("Built without the `llm` feature, model_path ignored");
        }
        bail!("no inference backend available; rebuild with --features llm or pass --stub")
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn run_stream(service: &CoachService, driver: &str, tick: Duration, cancel: CancellationToken) -> Result<()> {
    let Some(status) = service.driver_status(driver) else {
        bail!("unknown driver '{driver}'");
    };
    service.login(driver, driver);
    info!(driver_id = %status.driver_id, "Driver online");

    let mut session = service.new_session(driver);
    match service.start_session(&mut session)? {
        StartOutcome::NoTrips => {
            println!("{driver} has no trips");
            service.logout(driver, Some(&mut session));
            return Ok(());
        }
        StartOutcome::NoWindows { trip_id } => {
            println!("{trip_id}: no valid windows");
            service.logout(driver, Some(&mut session));
            return Ok(());
        }
        StartOutcome::Streaming { trip_id, windows } => {
            println!("Streaming {trip_id} ({} windows)", windows.len());
            for w in &windows {
                println!("  window {:>2}  {}", w.window_index, w.severity);
            }
        }
    }

    let mut interval = tokio::time::interval(tick);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(session = %session.id(), "Streaming cancelled");
                break;
            }
            _ = interval.tick() => {
                match service.tick(&mut session) {
                    TickOutcome::Surfaced(analysis) => {
                        let marker = if analysis.severity.is_alert() { " !" } else { "" };
                        println!(
                            "\n[window {} | {}{marker}]\n{}",
                            analysis.window_index, analysis.severity, analysis.coaching
                        );
                    }
                    TickOutcome::Pending { index } => {
                        tracing::debug!(window = index, "Waiting for coaching");
                    }
                    TickOutcome::Complete | TickOutcome::Idle => break,
                }
            }
        }
    }

    service.logout(driver, Some(&mut session));
    Ok(())
}

fn run_history(config: &CoachConfig, limit: usize) -> Result<()> {
    let store = SledStore::open(&config.store.path)
        .with_context(|| format!("opening {}", config.store.path.display()))?;

    let users = store.users()?;
    println!("Registered users ({}):", users.len());
    for user in users {
        println!("  {:<20} {:<7} {}", user.user_id, user.role, user.registered_at.to_rfc3339());
    }

    println!("\nCoaching results ({} total, newest first):", store.record_count());
    for stored in store.recent_records(limit)? {
        let r = &stored.record;
        println!(
            "  {} {}/{} window {} [{}]: {}",
            stored.stored_at.to_rfc3339(),
            r.driver_id,
            r.trip_id,
            r.window_index,
            r.severity,
            r.coaching
        );
    }
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    config::init(load_config(args.config.as_ref())?);
    let config = config::get();

    if let SubCommand::History { limit } = args.command {
        return run_history(config, limit);
    }

    let service = CoachService::from_config(config).context("starting coaching log")?;

    match args.command {
        SubCommand::Drivers => {
            for driver in service.list_drivers()? {
                println!("{driver}");
            }
        }
        SubCommand::Trips { driver } => {
            for trip in service.list_trips(&driver)? {
                println!("{trip}");
            }
        }
        SubCommand::Windows { driver, trip } => {
            for w in service.window_severities(&driver, &trip)? {
                println!("{:>2}  {}", w.window_index, w.severity);
            }
        }
        SubCommand::Analyze { driver, trip, index, coach } => {
            service.gateway().inject(build_generator(config, args.stub).await?)?;
            let json = match index {
                Some(index) if coach => serde_json::to_value(service.analyze_window(&driver, &trip, index).await?)?,
                Some(index) => {
                    let window = service.registry().prepare_window(&driver, &trip, index)?;
                    let coaching = service
                        .gateway()
                        .generate(&window.summary, window.severity, FeedbackMode::Driver)
                        .await?;
                    serde_json::json!({
                        "window_index": window.index,
                        "severity": window.severity,
                        "summary": window.summary,
                        "coaching": coaching,
                    })
                }
                None => serde_json::to_value(service.analyze_trip(&driver, &trip).await?)?,
            };
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        SubCommand::Stream { driver, tick_secs } => {
            service.gateway().inject(build_generator(config, args.stub).await?)?;

            // Graceful shutdown via Ctrl+C
            let cancel = CancellationToken::new();
            let shutdown_token = cancel.clone();
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Received Ctrl+C, stopping stream");
                shutdown_token.cancel();
            });

            let secs = tick_secs.unwrap_or(config.scheduler.tick_interval_secs).max(1);
            run_stream(&service, &driver, Duration::from_secs(secs), cancel).await?;
            info!("{}", service.gateway().stats().await);
        }
        SubCommand::Register { user, role } => {
            service.register_user(&user, role);
            service.flush().await;
            println!("registered {user} as {role}");
        }
        SubCommand::History { .. } => {}
    }

    service.shutdown().await;
    Ok(())
}
