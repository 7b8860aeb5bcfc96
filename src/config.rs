// Wattsim - Energy consumption telemetry simulator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Engine configuration.
//!
//! Every struct deserializes with `#[serde(default)]`, so a config file only
//! needs the fields it overrides.

use crate::error::{Result, WattsimError};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

/// Default per-device buffer capacity.
pub const DEFAULT_BUFFER_CAPACITY: usize = 15;

/// Default suggestion retention window: 7 days.
pub const DEFAULT_RETENTION_WINDOW_MS: u64 = 7 * 24 * 60 * 60 * 1000;

/// Master configuration for the simulation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Value generator settings.
    pub generator: GeneratorConfig,

    /// Suggestion generator settings.
    pub suggestion: SuggestionConfig,

    /// Cycle periods.
    pub schedule: ScheduleConfig,

    /// Optional capabilities (history logging, suggestions).
    pub features: Features,

    /// Maximum readings kept per device between aggregations.
    pub buffer_capacity: usize,

    /// When a device buffer is cleared after aggregation.
    pub clear_policy: ClearPolicy,

    /// Suggestions older than this are deleted by the retention sweep.
    pub retention_window_ms: u64,

    /// Random seed for reproducible runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            generator: GeneratorConfig::default(),
            suggestion: SuggestionConfig::default(),
            schedule: ScheduleConfig::default(),
            features: Features::full(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            clear_policy: ClearPolicy::default(),
            retention_window_ms: DEFAULT_RETENTION_WINDOW_MS,
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Create a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set enabled features.
    pub fn with_features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }

    /// Set buffer clear policy.
    pub fn with_clear_policy(mut self, policy: ClearPolicy) -> Self {
        self.clear_policy = policy;
        self
    }

    /// Set per-device buffer capacity.
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Set generator settings.
    pub fn with_generator(mut self, generator: GeneratorConfig) -> Self {
        self.generator = generator;
        self
    }

    /// Set suggestion settings.
    pub fn with_suggestion(mut self, suggestion: SuggestionConfig) -> Self {
        self.suggestion = suggestion;
        self
    }

    /// Check every field for values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.generator.validate()?;
        self.suggestion.validate()?;
        self.schedule.validate()?;
        if self.buffer_capacity == 0 {
            return Err(WattsimError::Config(
                "buffer_capacity must be at least 1".to_string(),
            ));
        }
        if self.retention_window().is_none() {
            return Err(WattsimError::Config(format!(
                "retention_window_ms {} is out of range",
                self.retention_window_ms
            )));
        }
        Ok(())
    }

    /// Retention window as a time delta, `None` when it does not fit one.
    pub fn retention_window(&self) -> Option<TimeDelta> {
        i64::try_from(self.retention_window_ms)
            .ok()
            .and_then(TimeDelta::try_milliseconds)
    }
}

/// Value generator configuration.
///
/// Band shares select which tier band a baseline draw lands in; the
/// remainder after `critical_share + warning_share` goes to the excellent
/// band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Probability of drawing from the critical band [3.2, 3.5].
    pub critical_share: f64,
    /// Probability of drawing from the warning band [2.2, 3.2).
    pub warning_share: f64,
    /// Half-width of the uniform jitter added to baseline draws.
    pub jitter: f64,
    /// Probability of following the previous reading instead of a fresh draw.
    pub trend_probability: f64,
    /// Half-width of the uniform step applied in trend mode.
    pub trend_step: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            critical_share: 0.25,
            warning_share: 0.35,
            jitter: 0.05,
            trend_probability: 0.2,
            trend_step: 0.15,
        }
    }
}

impl GeneratorConfig {
    /// Expected share of the excellent band.
    pub fn excellent_share(&self) -> f64 {
        (1.0 - self.critical_share - self.warning_share).max(0.0)
    }

    fn validate(&self) -> Result<()> {
        check_probability("generator.critical_share", self.critical_share)?;
        check_probability("generator.warning_share", self.warning_share)?;
        check_probability("generator.trend_probability", self.trend_probability)?;
        if self.critical_share + self.warning_share > 1.0 {
            return Err(WattsimError::Config(format!(
                "generator band shares sum to {} (max 1.0)",
                self.critical_share + self.warning_share
            )));
        }
        if self.jitter < 0.0 || self.trend_step < 0.0 {
            return Err(WattsimError::Config(
                "generator jitter and trend_step must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Suggestion generator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionConfig {
    /// Probability of appending a contextual tip to the description.
    pub tip_probability: f64,
    /// Probability of emitting a suggestion for an excellent alert.
    pub excellent_probability: f64,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            tip_probability: 0.7,
            excellent_probability: 1.0 / 3.0,
        }
    }
}

impl SuggestionConfig {
    fn validate(&self) -> Result<()> {
        check_probability("suggestion.tip_probability", self.tip_probability)?;
        check_probability(
            "suggestion.excellent_probability",
            self.excellent_probability,
        )
    }
}

/// Periods of the three engine cycles, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Reading update cycle period.
    pub update_interval_ms: u64,
    /// Aggregation cycle period.
    pub aggregation_interval_ms: u64,
    /// Delay before the first aggregation cycle.
    pub aggregation_kickoff_ms: u64,
    /// Retention sweep period.
    pub retention_interval_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 2_000,
            aggregation_interval_ms: 30_000,
            aggregation_kickoff_ms: 5_000,
            retention_interval_ms: 24 * 60 * 60 * 1000,
        }
    }
}

impl ScheduleConfig {
    fn validate(&self) -> Result<()> {
        if self.update_interval_ms == 0
            || self.aggregation_interval_ms == 0
            || self.retention_interval_ms == 0
        {
            return Err(WattsimError::Config(
                "schedule intervals must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Optional engine capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Features {
    /// Append every reading to the `device_history` collection.
    pub history: bool,
    /// Emit suggestions after aggregated alerts.
    pub suggestions: bool,
}

impl Features {
    /// Readings and alerts only.
    pub fn basic() -> Self {
        Self {
            history: false,
            suggestions: false,
        }
    }

    /// Readings, alerts, history and suggestions.
    pub fn full() -> Self {
        Self {
            history: true,
            suggestions: true,
        }
    }
}

impl Default for Features {
    fn default() -> Self {
        Self::full()
    }
}

/// When to clear a device buffer after its alert has been aggregated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearPolicy {
    /// Clear only once the alert write succeeded; failed writes keep the
    /// samples for the next cycle.
    #[default]
    OnSuccess,
    /// Clear after every aggregation, whatever the write outcome.
    Always,
}

fn check_probability(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(WattsimError::Config(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )))
    }
}
