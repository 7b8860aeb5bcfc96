// Wattsim - Energy consumption telemetry simulator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Synthetic consumption value generation.
//!
//! A baseline draw first picks a tier band with the configured shares, then a
//! uniform value inside that band plus a small jitter. When the device has a
//! previous reading, a configurable fraction of draws follows it instead,
//! producing short runs of correlated values.

use crate::classifier::{classify, CRITICAL_THRESHOLD, WARNING_THRESHOLD};
use crate::config::GeneratorConfig;
use crate::protocol::{TierCounts, MAX_READING, MIN_READING};
use rand::{Rng, RngCore};

/// Decimal places kept on every generated value.
const DECIMALS: i32 = 5;

/// Value generator.
#[derive(Debug, Clone, Default)]
pub struct Generator {
    config: GeneratorConfig,
}

impl Generator {
    /// Create a generator with the given configuration.
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate a reading, trend-following `previous` when present.
    pub fn generate(&self, previous: Option<f64>, rng: &mut dyn RngCore) -> f64 {
        match previous {
            Some(last) if rng.gen::<f64>() < self.config.trend_probability => {
                let step = symmetric(rng, self.config.trend_step);
                clamp_reading(round_reading(last + step))
            }
            _ => self.baseline(rng),
        }
    }

    /// Independent draw from the target tier mix.
    pub fn baseline(&self, rng: &mut dyn RngCore) -> f64 {
        let r: f64 = rng.gen();
        let u: f64 = rng.gen();

        let value = if r < self.config.critical_share {
            CRITICAL_THRESHOLD + u * (MAX_READING - CRITICAL_THRESHOLD)
        } else if r < self.config.critical_share + self.config.warning_share {
            WARNING_THRESHOLD + u * (CRITICAL_THRESHOLD - WARNING_THRESHOLD)
        } else {
            MIN_READING + u * (WARNING_THRESHOLD - MIN_READING)
        };

        let value = value + symmetric(rng, self.config.jitter);
        clamp_reading(round_reading(value))
    }

    /// Classify `n` baseline draws and count the tiers.
    ///
    /// Used as a start-up self-test of the generator's distribution.
    pub fn sample_distribution(&self, n: usize, rng: &mut dyn RngCore) -> TierCounts {
        (0..n).map(|_| classify(self.baseline(rng)).tier).collect()
    }
}

/// Uniform value in [-half_width, +half_width).
fn symmetric(rng: &mut dyn RngCore, half_width: f64) -> f64 {
    rng.gen::<f64>() * 2.0 * half_width - half_width
}

fn round_reading(value: f64) -> f64 {
    let scale = 10f64.powi(DECIMALS);
    (value * scale).round() / scale
}

fn clamp_reading(value: f64) -> f64 {
    value.clamp(MIN_READING, MAX_READING)
}
