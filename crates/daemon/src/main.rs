//! GraspExec - Main Entry Point
//! Opens simulated arms, runs one grasp sequence per active side, releases

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::io::ErrorKind;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use graspexec_core::application::{
    abort_channel, ExecutorPorts, GraspExecutor, GraspSettings, RunOutcome, SequenceRunner,
};
use graspexec_core::domain::TrajectoryFeed;
use graspexec_core::port::id_provider::UuidProvider;
use graspexec_core::port::time_provider::SystemTimeProvider;
use graspexec_core::port::{GraspParams, TracingReportSink};
use graspexec_infra_sim::{SimGraspFactory, SimMotionFactory};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_OPTIONS_PATH: &str = "~/.graspexec/options.json";
const DEFAULT_TRAJECTORY_PATH: &str = "~/.graspexec/trajectory.json";
const DEFAULT_TICK_MS: u64 = 100;
const LOG_FILE_NAME: &str = "graspexec.log";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging; the guard flushes the file sink on exit
    let _log_guard = init_logging()?;
    info!("GraspExec v{} starting...", VERSION);

    // 2. Load configuration
    let options_path = env_path("GRASPEXEC_OPTIONS", DEFAULT_OPTIONS_PATH);
    let trajectory_path = env_path("GRASPEXEC_TRAJECTORY", DEFAULT_TRAJECTORY_PATH);
    let grasp_enabled = std::env::var("GRASPEXEC_GRASP")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let tick_ms: u64 = env_or("GRASPEXEC_TICK_MS", DEFAULT_TICK_MS);
    let time_scale: f64 = env_or("GRASPEXEC_SIM_TIME_SCALE", 1.0);

    let options = load_json(&options_path, "options")?;
    let feed = TrajectoryFeed::from_value(load_json(&trajectory_path, "trajectory")?)
        .with_context(|| format!("malformed trajectory feed in {}", trajectory_path))?;

    // 3. Setup dependencies (DI wiring)
    let motion = Arc::new(SimMotionFactory::new().with_time_scale(time_scale));
    let hands = Arc::new(SimGraspFactory::new().with_time_scale(time_scale));

    let ports = ExecutorPorts {
        motion,
        grasp: Some(hands),
        reports: Arc::new(TracingReportSink),
        time_provider: Arc::new(SystemTimeProvider),
        id_provider: Arc::new(UuidProvider),
    };
    let grasp = if grasp_enabled {
        GraspSettings {
            model_file_right: std::env::var("GRASPEXEC_MODEL_RIGHT").ok(),
            model_file_left: std::env::var("GRASPEXEC_MODEL_LEFT").ok(),
            ..GraspSettings::enabled(GraspParams::default())
        }
    } else {
        GraspSettings::disabled()
    };

    // 4. Configure: open and home every active arm
    let mut executor = GraspExecutor::new(ports, grasp);
    executor
        .configure(&options)
        .await
        .map_err(|e| anyhow::anyhow!("Configuration failed: {}", e))?;

    if let Err(e) = executor.set_trajectory_feed(feed) {
        warn!(error = %e, "Trajectory feed rejected, running home-anchored plans");
    }

    // 5. Run until every side completes or Ctrl+C
    let executor = Arc::new(executor);
    let (abort_handle, abort_token) = abort_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received. Stopping sequence...");
            abort_handle.abort();
        }
    });

    info!("Press Ctrl+C to stop");
    let runner = SequenceRunner::new(Arc::clone(&executor))
        .with_tick_interval(Duration::from_millis(tick_ms));
    let outcome = runner.run(abort_token).await;

    // 6. Release always runs
    if let Err(e) = executor.release().await {
        error!(error = %e, "Release incomplete");
    }

    match outcome.map_err(|e| anyhow::anyhow!("Sequence failed: {}", e))? {
        RunOutcome::Completed { ticks } => info!(ticks, "Grasp sequence completed"),
        RunOutcome::Aborted { ticks, pending } => {
            warn!(ticks, pending = ?pending, "Grasp sequence aborted")
        }
        RunOutcome::BudgetExhausted { ticks, pending } => {
            warn!(ticks, pending = ?pending, "Grasp sequence out of ticks")
        }
    }

    info!("Shutdown complete.");
    Ok(())
}

/// Console layer (json | pretty) plus an optional daily rolling file
fn init_logging() -> Result<Option<WorkerGuard>> {
    let log_format = std::env::var("GRASPEXEC_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("graspexec=info"))
        .context("Failed to create env filter")?;

    let (file_layer, guard) = match std::env::var("GRASPEXEC_LOG_DIR") {
        Ok(dir) => {
            let appender =
                tracing_appender::rolling::daily(shellexpand::tilde(&dir).into_owned(), LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        Err(_) => (None, None),
    };

    match log_format.as_str() {
        "json" => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(env_filter)
                .with(file_layer)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            // Development: Pretty formatting with colors
            tracing_subscriber::registry()
                .with(env_filter)
                .with(file_layer)
                .with(fmt::layer().pretty())
                .init();
        }
    }

    Ok(guard)
}

fn env_path(key: &str, default: &str) -> String {
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    shellexpand::tilde(&raw).into_owned()
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Read a JSON file; a missing file yields an empty object
fn load_json(path: &str, what: &str) -> Result<Value> {
    match std::fs::read_to_string(path) {
        Ok(text) => serde_json::from_str(&text)
            .with_context(|| format!("invalid JSON in {} file {}", what, path)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path, "No {} file, using defaults", what);
            Ok(json!({}))
        }
        Err(e) => Err(e).with_context(|| format!("cannot read {} file {}", what, path)),
    }
}
