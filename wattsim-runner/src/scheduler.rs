// Wattsim Runner - Cycle scheduler
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Periodic driving of the engine cycles.
//!
//! Three independent loops run on the tokio runtime:
//!
//! - update: immediately at startup, then every `update_interval_ms`;
//! - aggregation: once after `aggregation_kickoff_ms`, then every
//!   `aggregation_interval_ms` counted from startup;
//! - retention: every `retention_interval_ms`, first run one period in.
//!
//! Each cycle body is synchronous store I/O and runs on the blocking pool.
//! Ticks missed while a cycle is still running are delayed, not bunched.

use crate::metrics;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use wattsim::{Engine, ScheduleConfig};

/// Shared scheduler state.
#[derive(Debug, Default)]
pub struct RunnerState {
    /// Loops are spawned and not yet stopped.
    pub running: AtomicBool,
    /// Devices listed by the store in the last update cycle.
    pub devices: AtomicU64,
    /// Completed update cycles.
    pub update_cycles: AtomicU64,
    /// Completed aggregation cycles.
    pub aggregation_cycles: AtomicU64,
    /// Completed retention sweeps.
    pub retention_sweeps: AtomicU64,
    /// Alerts written since startup.
    pub alerts: AtomicU64,
    /// Suggestions written since startup.
    pub suggestions: AtomicU64,
}

impl RunnerState {
    /// At least one update cycle has completed.
    pub fn is_ready(&self) -> bool {
        self.update_cycles.load(Ordering::SeqCst) > 0
    }
}

/// Drives the engine cycles on fixed periods.
pub struct Scheduler {
    engine: Arc<Engine>,
    state: Arc<RunnerState>,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    /// Create a stopped scheduler.
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            state: Arc::new(RunnerState::default()),
            handles: Vec::new(),
        }
    }

    /// Shared state, for status reporting.
    pub fn state(&self) -> Arc<RunnerState> {
        Arc::clone(&self.state)
    }

    /// Spawn the three cycle loops.
    pub fn start(&mut self) {
        if self.state.running.swap(true, Ordering::SeqCst) {
            warn!("Scheduler already running");
            return;
        }

        let schedule = self.engine.config().schedule.clone();
        let start = Instant::now();
        info!(
            "Scheduling cycles: update every {} ms, aggregation every {} ms (first after {} ms), retention every {} ms",
            schedule.update_interval_ms,
            schedule.aggregation_interval_ms,
            schedule.aggregation_kickoff_ms,
            schedule.retention_interval_ms
        );

        self.handles.push(tokio::spawn(update_loop(
            Arc::clone(&self.engine),
            Arc::clone(&self.state),
            schedule.clone(),
        )));
        self.handles.push(tokio::spawn(aggregation_loop(
            Arc::clone(&self.engine),
            Arc::clone(&self.state),
            schedule.clone(),
            start,
        )));
        self.handles.push(tokio::spawn(retention_loop(
            Arc::clone(&self.engine),
            Arc::clone(&self.state),
            schedule,
            start,
        )));
    }

    /// Abort the cycle loops. A cycle already on the blocking pool finishes.
    pub fn stop(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
        if self.state.running.swap(false, Ordering::SeqCst) {
            info!("Scheduler stopped");
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn period(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

/// Run one cycle on the blocking pool and record its duration.
async fn run_cycle<R, F>(engine: &Arc<Engine>, name: &'static str, cycle: F) -> Option<R>
where
    F: FnOnce(&Engine) -> R + Send + 'static,
    R: Send + 'static,
{
    let engine = Arc::clone(engine);
    let started = Instant::now();
    match tokio::task::spawn_blocking(move || cycle(&engine)).await {
        Ok(report) => {
            metrics::record_cycle_duration(name, started.elapsed().as_secs_f64());
            Some(report)
        }
        Err(e) => {
            error!("{} cycle did not complete: {}", name, e);
            None
        }
    }
}

async fn update_loop(engine: Arc<Engine>, state: Arc<RunnerState>, schedule: ScheduleConfig) {
    let mut ticker = interval(period(schedule.update_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(report) = run_cycle(&engine, "update", Engine::run_update_cycle).await else {
            continue;
        };

        metrics::record_update(&report);
        metrics::update_buffered(engine.buffers().total_len());
        state.update_cycles.fetch_add(1, Ordering::SeqCst);

        if !report.listing_failed {
            state
                .devices
                .store(report.devices as u64, Ordering::SeqCst);
            debug!(
                "Update cycle: {} readings ({} critical, {} warning, {} excellent)",
                report.readings.len(),
                report.tiers.critical,
                report.tiers.warning,
                report.tiers.excellent
            );
        }
    }
}

async fn aggregation_loop(
    engine: Arc<Engine>,
    state: Arc<RunnerState>,
    schedule: ScheduleConfig,
    start: Instant,
) {
    let every = period(schedule.aggregation_interval_ms);
    sleep_until(start + period(schedule.aggregation_kickoff_ms)).await;
    aggregate_once(&engine, &state).await;

    let mut ticker = interval_at(start + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        aggregate_once(&engine, &state).await;
    }
}

async fn aggregate_once(engine: &Arc<Engine>, state: &RunnerState) {
    let Some(report) = run_cycle(engine, "aggregation", Engine::run_aggregation_cycle).await else {
        return;
    };

    metrics::record_aggregation(&report);
    metrics::update_buffered(engine.buffers().total_len());
    state.aggregation_cycles.fetch_add(1, Ordering::SeqCst);
    state
        .alerts
        .fetch_add(report.alerts.len() as u64, Ordering::SeqCst);
    state
        .suggestions
        .fetch_add(report.suggestions.len() as u64, Ordering::SeqCst);

    if !report.listing_failed {
        let tiers = report.tiers();
        info!(
            "Aggregation cycle: {} alerts ({} critical, {} warning, {} excellent), {} suggestions",
            report.alerts.len(),
            tiers.critical,
            tiers.warning,
            tiers.excellent,
            report.suggestions.len()
        );
    }
}

async fn retention_loop(
    engine: Arc<Engine>,
    state: Arc<RunnerState>,
    schedule: ScheduleConfig,
    start: Instant,
) {
    let every = period(schedule.retention_interval_ms);
    let mut ticker = interval_at(start + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Some(report) = run_cycle(&engine, "retention", Engine::run_retention_sweep).await {
            metrics::record_sweep(&report);
            state.retention_sweeps.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;
    use wattsim::{EngineConfig, MemoryStore};

    fn fast_engine(store: Arc<MemoryStore>) -> Arc<Engine> {
        let mut config = EngineConfig::new().with_seed(3);
        config.schedule = ScheduleConfig {
            update_interval_ms: 10,
            aggregation_interval_ms: 60,
            aggregation_kickoff_ms: 35,
            retention_interval_ms: 50,
        };
        Arc::new(Engine::new(config, store).unwrap())
    }

    #[tokio::test]
    async fn test_run_cycle_returns_report() {
        let store = Arc::new(MemoryStore::with_devices(["d1", "d2"]));
        let engine = fast_engine(store);

        let report = run_cycle(&engine, "update", Engine::run_update_cycle)
            .await
            .unwrap();
        assert_eq!(report.readings.len(), 2);
        assert_eq!(engine.buffers().total_len(), 2);
    }

    // The clock is paused: sleeps advance virtual time once every task is
    // idle, and running blocking cycles hold the clock back.

    #[tokio::test(start_paused = true)]
    async fn test_loops_drive_all_cycles() {
        let store = Arc::new(MemoryStore::with_devices(["d1", "d2", "d3"]));
        let engine = fast_engine(store.clone());

        let mut scheduler = Scheduler::new(engine);
        let state = scheduler.state();
        scheduler.start();
        assert!(state.running.load(Ordering::SeqCst));

        // Updates at 0, 10, .., 290; aggregations at 35, 60, .., 240;
        // sweeps at 50, 100, .., 250
        sleep(Duration::from_millis(295)).await;
        scheduler.stop();

        assert!(!state.running.load(Ordering::SeqCst));
        assert_eq!(state.update_cycles.load(Ordering::SeqCst), 30);
        assert_eq!(state.aggregation_cycles.load(Ordering::SeqCst), 5);
        assert_eq!(state.retention_sweeps.load(Ordering::SeqCst), 5);
        assert_eq!(state.devices.load(Ordering::SeqCst), 3);
        assert_eq!(store.alerts().len(), 15);
        assert_eq!(state.alerts.load(Ordering::SeqCst), 15);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_runs_before_first_aggregation() {
        let store = Arc::new(MemoryStore::with_devices(["d1"]));
        let engine = fast_engine(store.clone());

        let mut scheduler = Scheduler::new(engine);
        let state = scheduler.state();
        scheduler.start();

        sleep(Duration::from_millis(25)).await;
        assert!(state.is_ready());
        assert_eq!(state.update_cycles.load(Ordering::SeqCst), 3);
        assert_eq!(state.aggregation_cycles.load(Ordering::SeqCst), 0);
        assert!(store.alerts().is_empty());

        // Kickoff aggregation at 35 ms collects the four buffered readings
        sleep(Duration::from_millis(15)).await;
        assert_eq!(state.aggregation_cycles.load(Ordering::SeqCst), 1);
        let alerts = store.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert.samples, 4);
        scheduler.stop();
    }

    #[tokio::test]
    async fn test_start_twice_is_noop() {
        let store = Arc::new(MemoryStore::with_devices(["d1"]));
        let mut scheduler = Scheduler::new(fast_engine(store));
        scheduler.start();
        scheduler.start();
        assert_eq!(scheduler.handles.len(), 3);
        scheduler.stop();
        assert!(scheduler.handles.is_empty());
    }
}
