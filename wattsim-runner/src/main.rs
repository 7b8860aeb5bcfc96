// Wattsim Runner - Scheduled energy telemetry simulator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Wattsim Runner
//!
//! Runs the Wattsim engine on its schedule and exposes Prometheus metrics.
//!
//! ## Usage
//!
//! ```bash
//! # Three in-memory devices, reproducible
//! wattsim-runner --device kitchen --device office --device garage --seed 42
//!
//! # Persist to wattsim.json plus JSON-lines logs beside it, history and suggestions disabled
//! wattsim-runner --store wattsim.json --config runner.json --basic
//! ```

mod config;
mod metrics;
mod scheduler;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use clap::Parser;
use config::{RunnerConfig, RunnerError};
use metrics::encode_metrics;
use scheduler::{RunnerState, Scheduler};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;
use wattsim::{DocumentStore, Engine, Features, FileStore, MemoryStore};

/// Wattsim energy telemetry simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "9100")]
    port: u16,

    /// JSON config file (engine settings and devices)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Devices document of the file store; logs are written beside it (in-memory when omitted)
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Device to simulate (repeatable)
    #[arg(short, long = "device")]
    devices: Vec<String>,

    /// Random seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Disable history logging and suggestions
    #[arg(long)]
    basic: bool,

    /// Draws for the startup distribution self-test (0 disables it)
    #[arg(long, default_value = "1000")]
    self_test: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Application state shared across handlers.
struct AppState {
    engine: Arc<Engine>,
    runner: Arc<RunnerState>,
    start_time: std::time::Instant,
}

#[tokio::main]
async fn main() -> Result<(), RunnerError> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Wattsim Runner v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args)?;
    let store = open_store(&args, &config)?;
    let engine = Arc::new(Engine::new(config.engine, store)?);

    if args.self_test > 0 {
        log_self_test(&engine, args.self_test);
    }

    let mut scheduler = Scheduler::new(Arc::clone(&engine));
    scheduler.start();

    let state = Arc::new(AppState {
        engine,
        runner: scheduler.state(),
        start_time: std::time::Instant::now(),
    });

    // Build router
    let app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/status", get(status_handler))
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Starting server on http://{}", addr);
    info!("Metrics endpoint: http://{}/metrics", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.stop();
    Ok(())
}

/// Merge the config file with command-line overrides.
fn load_config(args: &Args) -> Result<RunnerConfig, RunnerError> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading config from {}", path.display());
            RunnerConfig::load(path)?
        }
        None => RunnerConfig::default(),
    };

    config.add_devices(args.devices.iter().cloned());
    if let Some(seed) = args.seed {
        config.engine.seed = Some(seed);
    }
    if args.basic {
        config.engine.features = Features::basic();
    }
    config.engine.validate()?;

    info!(
        "Features: history={}, suggestions={}, clear policy {:?}",
        config.engine.features.history,
        config.engine.features.suggestions,
        config.engine.clear_policy
    );
    Ok(config)
}

/// Open the document store and register the configured devices.
fn open_store(args: &Args, config: &RunnerConfig) -> Result<Arc<dyn DocumentStore>, RunnerError> {
    let store: Arc<dyn DocumentStore> = match &args.store {
        Some(path) => {
            let store = FileStore::open(path)?;
            if !config.devices.is_empty() {
                store.add_devices(&config.devices)?;
            }
            info!("Using file store at {}", store.path().display());
            Arc::new(store)
        }
        None => {
            if config.devices.is_empty() {
                return Err(RunnerError::NoDevices);
            }
            info!("Using in-memory store");
            Arc::new(MemoryStore::with_devices(&config.devices))
        }
    };

    let devices = store.device_ids()?;
    if devices.is_empty() {
        warn!("Store lists no devices; cycles will be idle until some are added");
    } else {
        info!("Simulating {} devices: {}", devices.len(), devices.join(", "));
    }
    Ok(store)
}

/// Log the generator's tier mix over `n` baseline draws.
fn log_self_test(engine: &Engine, n: usize) {
    let counts = engine.sample_distribution(n);
    info!("Distribution self-test over {} draws:", n);
    for (tier, count, share) in counts.shares() {
        info!("  {:<9} {:>6} ({:.1}%)", tier, count, share * 100.0);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// Root handler - shows a simple HTML page.
async fn root_handler() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Wattsim Runner</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 800px; margin: 50px auto; padding: 20px; }
        h1 { color: #2c3e50; }
        a { color: #3498db; text-decoration: none; }
        a:hover { text-decoration: underline; }
        .endpoints { background: #f8f9fa; padding: 20px; border-radius: 8px; margin: 20px 0; }
        .endpoint { margin: 10px 0; }
        code { background: #e9ecef; padding: 2px 6px; border-radius: 4px; }
    </style>
</head>
<body>
    <h1>Wattsim Runner</h1>
    <p>Simulated IoT energy meters: readings, grouped alerts and contextual suggestions.</p>

    <div class="endpoints">
        <h2>Endpoints</h2>
        <div class="endpoint"><a href="/metrics">/metrics</a> - Prometheus metrics</div>
        <div class="endpoint"><a href="/health">/health</a> - Health check</div>
        <div class="endpoint"><a href="/ready">/ready</a> - Readiness check</div>
        <div class="endpoint"><a href="/status">/status</a> - Status information (JSON)</div>
    </div>

    <h2>Metrics</h2>
    <ul>
        <li><code>wattsim_readings_total</code> - Readings per tier</li>
        <li><code>wattsim_device_reading_kwh</code> - Latest reading per device</li>
        <li><code>wattsim_buffered_readings</code> - Readings awaiting aggregation</li>
        <li><code>wattsim_alerts_total</code> - Alerts per predominant tier</li>
        <li><code>wattsim_suggestions_total</code> - Suggestions per tier</li>
        <li><code>wattsim_suggestions_purged_total</code> - Suggestions removed by retention</li>
        <li><code>wattsim_store_errors_total</code> - Failed store operations</li>
        <li><code>wattsim_cycle_duration_seconds</code> - Last duration of each cycle</li>
    </ul>
</body>
</html>"#,
    )
}

/// Metrics handler - returns Prometheus text format.
async fn metrics_handler() -> impl IntoResponse {
    let metrics = encode_metrics();
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        metrics,
    )
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Readiness check handler: ready after the first update cycle.
async fn ready_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.runner.is_ready() {
        (StatusCode::OK, "Ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Starting")
    }
}

/// Status information response.
#[derive(Serialize)]
struct StatusResponse {
    version: String,
    uptime_secs: u64,
    running: bool,
    devices: u64,
    update_cycles: u64,
    aggregation_cycles: u64,
    retention_sweeps: u64,
    alerts: u64,
    suggestions: u64,
    buffered_readings: usize,
    buffered_devices: Vec<String>,
    history: bool,
    suggestions_enabled: bool,
}

/// Status handler - returns JSON status information.
async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let runner = &state.runner;
    let features = state.engine.config().features;

    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        running: runner.running.load(Ordering::SeqCst),
        devices: runner.devices.load(Ordering::SeqCst),
        update_cycles: runner.update_cycles.load(Ordering::SeqCst),
        aggregation_cycles: runner.aggregation_cycles.load(Ordering::SeqCst),
        retention_sweeps: runner.retention_sweeps.load(Ordering::SeqCst),
        alerts: runner.alerts.load(Ordering::SeqCst),
        suggestions: runner.suggestions.load(Ordering::SeqCst),
        buffered_readings: state.engine.buffers().total_len(),
        buffered_devices: state.engine.buffers().device_ids(),
        history: features.history,
        suggestions_enabled: features.suggestions,
    })
}
