// Wattsim - Energy consumption telemetry simulator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Simulation engine.
//!
//! The [`Engine`] owns the per-device buffers, the random source and the
//! clock, and exposes the three cycles a scheduler drives:
//!
//! - [`Engine::run_update_cycle`]: one new reading per device;
//! - [`Engine::run_aggregation_cycle`]: one alert (and maybe a suggestion)
//!   per device with buffered readings;
//! - [`Engine::run_retention_sweep`]: purge of old suggestions.
//!
//! Cycles take `&self` and may run concurrently. Shared state is only locked
//! for in-memory work, never across a store call. Store failures are logged
//! and counted in the returned report; they never abort the other devices of
//! a cycle.

use crate::aggregator::{aggregate, AggregatedAlert};
use crate::buffer::BufferStore;
use crate::classifier::classify;
use crate::config::{ClearPolicy, EngineConfig};
use crate::context::{Clock, SystemClock};
use crate::error::Result;
use crate::generator::Generator;
use crate::protocol::{Reading, TierCounts};
use crate::store::{AlertRecord, DocumentStore, HistoryRecord, SuggestionRecord};
use crate::suggestion::{Suggestion, SuggestionGenerator};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// Outcome of one update cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateReport {
    /// Devices listed by the store.
    pub devices: usize,
    /// Readings written and buffered.
    pub readings: Vec<(String, Reading)>,
    /// Tiers of the buffered readings.
    pub tiers: TierCounts,
    /// Device updates that failed.
    pub failed_updates: usize,
    /// History appends that failed.
    pub failed_history: usize,
    /// The device listing itself failed; nothing else was attempted.
    pub listing_failed: bool,
}

/// Outcome of one aggregation cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregationReport {
    /// Devices listed by the store.
    pub devices: usize,
    /// Alerts successfully written.
    pub alerts: Vec<AggregatedAlert>,
    /// Suggestions successfully written.
    pub suggestions: Vec<Suggestion>,
    /// Alert writes that failed.
    pub failed_alerts: usize,
    /// Suggestion writes that failed.
    pub failed_suggestions: usize,
    /// The device listing itself failed; nothing else was attempted.
    pub listing_failed: bool,
}

impl AggregationReport {
    /// Alerts per predominant tier.
    pub fn tiers(&self) -> TierCounts {
        self.alerts.iter().map(|a| a.tier).collect()
    }
}

/// Outcome of one retention sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Suggestions deleted.
    pub purged: usize,
    /// The purge failed.
    pub failed: bool,
}

/// Simulation engine shared by the scheduled cycles.
pub struct Engine {
    config: EngineConfig,
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    rng: Mutex<Box<dyn RngCore + Send>>,
    buffers: BufferStore,
    generator: Generator,
    suggestions: SuggestionGenerator,
}

impl Engine {
    /// Create an engine reading the system clock.
    ///
    /// The random source is seeded from `config.seed` when set.
    pub fn new(config: EngineConfig, store: Arc<dyn DocumentStore>) -> Result<Self> {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    /// Create an engine with an explicit clock.
    pub fn with_clock(
        config: EngineConfig,
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let rng: Box<dyn RngCore + Send> = match config.seed {
            Some(s) => Box::new(StdRng::seed_from_u64(s)),
            None => Box::new(StdRng::from_entropy()),
        };

        Ok(Self {
            buffers: BufferStore::new(config.buffer_capacity),
            generator: Generator::new(config.generator.clone()),
            suggestions: SuggestionGenerator::new(config.suggestion.clone()),
            rng: Mutex::new(rng),
            config,
            store,
            clock,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Per-device buffers.
    pub fn buffers(&self) -> &BufferStore {
        &self.buffers
    }

    /// Value generator.
    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    /// Run `f` with exclusive access to the random source.
    pub fn with_rng<T>(&self, f: impl FnOnce(&mut dyn RngCore) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        f(rng.as_mut())
    }

    /// Generate, persist and buffer one reading per device.
    pub fn run_update_cycle(&self) -> UpdateReport {
        let mut report = UpdateReport::default();

        let devices = match self.store.device_ids() {
            Ok(ids) => ids,
            Err(e) => {
                error!("Failed to list devices for update cycle: {}", e);
                report.listing_failed = true;
                return report;
            }
        };
        report.devices = devices.len();

        for device_id in devices {
            let previous = self.buffers.head_value(&device_id);
            let value = self.with_rng(|rng| self.generator.generate(previous, rng));
            let now = self.clock.now_utc();

            if let Err(e) = self.store.update_reading(&device_id, value, now) {
                warn!("Failed to update reading for {}: {}", device_id, e);
                report.failed_updates += 1;
                continue;
            }

            if self.config.features.history {
                let record = HistoryRecord {
                    device_id: device_id.clone(),
                    reading: value,
                    recorded_at: now,
                };
                if let Err(e) = self.store.append_history(record) {
                    warn!("Failed to record history for {}: {}", device_id, e);
                    report.failed_history += 1;
                }
            }

            let classification = classify(value);
            let reading = Reading::new(value, classification.tier, classification.message, now);
            let buffered = self.buffers.push(&device_id, reading.clone());

            debug!(
                "{} -> {:.2} kWh -> {} ({} buffered)",
                device_id, value, classification.tier, buffered
            );

            report.tiers.record(classification.tier);
            report.readings.push((device_id, reading));
        }

        report
    }

    /// Aggregate every buffered device into an alert, with optional suggestion.
    pub fn run_aggregation_cycle(&self) -> AggregationReport {
        let mut report = AggregationReport::default();

        let devices = match self.store.device_ids() {
            Ok(ids) => ids,
            Err(e) => {
                error!("Failed to list devices for aggregation cycle: {}", e);
                report.listing_failed = true;
                return report;
            }
        };
        report.devices = devices.len();

        for device_id in devices {
            let readings = self.buffers.take(&device_id);
            let Some(alert) = aggregate(&device_id, &readings) else {
                continue;
            };
            let now = self.clock.now_utc();

            let record = AlertRecord {
                alert: alert.clone(),
                created_at: now,
            };
            if let Err(e) = self.store.append_alert(record) {
                error!("Failed to emit alert for {}: {}", device_id, e);
                report.failed_alerts += 1;
                match self.config.clear_policy {
                    ClearPolicy::OnSuccess => self.buffers.restore(&device_id, readings),
                    ClearPolicy::Always => {
                        warn!("Dropped {} samples of {}", readings.len(), device_id)
                    }
                }
                continue;
            }

            info!(
                "Alert for {}: {} ({}), mean {:.2} kWh over {} samples",
                device_id, alert.tier, alert.message, alert.mean_reading, alert.samples
            );

            if self.config.features.suggestions {
                if let Some(suggestion) = self.maybe_suggest(&alert) {
                    let record = SuggestionRecord {
                        suggestion: suggestion.clone(),
                        created_at: now,
                    };
                    match self.store.append_suggestion(record) {
                        Ok(()) => {
                            info!("Suggestion for {}: {}", device_id, suggestion.short_message);
                            report.suggestions.push(suggestion);
                        }
                        Err(e) => {
                            warn!("Failed to emit suggestion for {}: {}", device_id, e);
                            report.failed_suggestions += 1;
                        }
                    }
                }
            }

            report.alerts.push(alert);
        }

        report
    }

    fn maybe_suggest(&self, alert: &AggregatedAlert) -> Option<Suggestion> {
        let context = self.clock.context();
        self.with_rng(|rng| {
            if !self.suggestions.should_suggest(alert.tier, rng) {
                return None;
            }
            Some(self.suggestions.suggest(
                &alert.device_id,
                alert.tier,
                alert.mean_reading,
                context,
                rng,
            ))
        })
    }

    /// Delete suggestions older than the retention window.
    pub fn run_retention_sweep(&self) -> SweepReport {
        let now = self.clock.now_utc();
        let Some(cutoff) = self
            .config
            .retention_window()
            .and_then(|window| now.checked_sub_signed(window))
        else {
            error!(
                "Retention window of {} ms reaches before the earliest representable time",
                self.config.retention_window_ms
            );
            return SweepReport {
                purged: 0,
                failed: true,
            };
        };

        match self.store.purge_suggestions_before(cutoff) {
            Ok(purged) => {
                info!("Purged {} suggestions older than {}", purged, cutoff);
                SweepReport {
                    purged,
                    failed: false,
                }
            }
            Err(e) => {
                error!("Failed to purge old suggestions: {}", e);
                SweepReport {
                    purged: 0,
                    failed: true,
                }
            }
        }
    }

    /// Baseline distribution over `n` draws, using the engine's random source.
    pub fn sample_distribution(&self, n: usize) -> TierCounts {
        self.with_rng(|rng| self.generator.sample_distribution(n, rng))
    }
}
