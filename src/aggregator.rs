// Wattsim - Energy consumption telemetry simulator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Alert aggregation
//!
//! Reduces a device's buffered readings to one [`AggregatedAlert`]. The
//! predominant tier is chosen by a weighted majority that favours critical:
//!
//! 1. critical, if at least a third of the readings are critical;
//! 2. warning, if warnings outnumber excellent readings;
//! 3. excellent otherwise.

use crate::protocol::{Reading, Tier, TierCounts};
use serde::{Deserialize, Serialize};

/// Summary of one device's buffer at aggregation time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedAlert {
    pub device_id: String,
    /// Predominant tier
    pub tier: Tier,
    /// Fixed message for the predominant tier
    pub message: String,
    /// Arithmetic mean of the readings
    pub mean_reading: f64,
    /// Largest reading
    pub max_reading: f64,
    /// Occurrences of each tier
    pub counts: TierCounts,
    /// Number of readings aggregated
    pub samples: usize,
}

/// Message attached to an aggregated alert of the given tier
pub fn alert_message(tier: Tier) -> &'static str {
    match tier {
        Tier::Critical => "critical consumption",
        Tier::Warning => "elevated consumption",
        Tier::Excellent => "stable consumption",
    }
}

/// Pick the predominant tier from a set of counts
///
/// The critical test compares against a fractional third of the total, so
/// one critical reading in three is enough.
pub fn predominant_tier(counts: &TierCounts) -> Tier {
    let total = counts.total() as f64;
    if counts.critical as f64 >= total / 3.0 {
        Tier::Critical
    } else if counts.warning > counts.excellent {
        Tier::Warning
    } else {
        Tier::Excellent
    }
}

/// Aggregate a buffer of readings; `None` when the buffer is empty
pub fn aggregate(device_id: &str, readings: &[Reading]) -> Option<AggregatedAlert> {
    if readings.is_empty() {
        return None;
    }

    let counts: TierCounts = readings.iter().map(|r| r.tier).collect();
    let tier = predominant_tier(&counts);

    let sum: f64 = readings.iter().map(|r| r.value).sum();
    let max = readings
        .iter()
        .map(|r| r.value)
        .fold(f64::NEG_INFINITY, f64::max);

    Some(AggregatedAlert {
        device_id: device_id.to_string(),
        tier,
        message: alert_message(tier).to_string(),
        mean_reading: sum / readings.len() as f64,
        max_reading: max,
        counts,
        samples: readings.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use approx::assert_relative_eq;
    use chrono::Utc;

    fn reading(value: f64) -> Reading {
        let c = classify(value);
        Reading::new(value, c.tier, c.message, Utc::now())
    }

    fn readings(values: &[f64]) -> Vec<Reading> {
        values.iter().map(|&v| reading(v)).collect()
    }

    #[test]
    fn test_empty_buffer() {
        assert!(aggregate("d1", &[]).is_none());
    }

    #[test]
    fn test_one_of_each_is_critical() {
        let alert = aggregate("d1", &readings(&[3.3, 2.5, 1.0])).unwrap();
        assert_eq!(alert.tier, Tier::Critical);
        assert_eq!(alert.message, "critical consumption");
    }

    #[test]
    fn test_warning_majority() {
        let alert = aggregate("d1", &readings(&[2.5, 2.8, 1.0])).unwrap();
        assert_eq!(alert.tier, Tier::Warning);
        assert_eq!(alert.message, "elevated consumption");
    }

    #[test]
    fn test_all_excellent() {
        let alert = aggregate("d1", &readings(&[1.0, 1.5, 2.0])).unwrap();
        assert_eq!(alert.tier, Tier::Excellent);
        assert_eq!(alert.message, "stable consumption");
        assert_relative_eq!(alert.mean_reading, 1.5, epsilon = 1e-12);
        assert_relative_eq!(alert.max_reading, 2.0);
    }

    #[test]
    fn test_warning_tie_goes_to_excellent() {
        let alert = aggregate("d1", &readings(&[2.5, 1.0])).unwrap();
        assert_eq!(alert.tier, Tier::Excellent);
    }

    #[test]
    fn test_critical_threshold_is_fractional() {
        // 2 of 7: 2 < 7/3 (2.33), so not critical even though floor(7/3) = 2
        let values = [3.3, 3.4, 2.5, 2.5, 2.5, 1.0, 1.0];
        let alert = aggregate("d1", &readings(&values)).unwrap();
        assert_eq!(alert.tier, Tier::Warning);

        // 3 of 9 meets the third exactly
        let values = [3.3, 3.4, 3.5, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        let alert = aggregate("d1", &readings(&values)).unwrap();
        assert_eq!(alert.tier, Tier::Critical);
    }

    #[test]
    fn test_counts_sum_to_samples() {
        let values = [3.3, 2.5, 1.0, 1.2, 2.9, 3.45];
        let alert = aggregate("d1", &readings(&values)).unwrap();
        assert_eq!(alert.samples, 6);
        assert_eq!(alert.counts.total(), 6);
        assert_eq!(alert.counts.critical, 2);
        assert_eq!(alert.counts.warning, 2);
        assert_eq!(alert.counts.excellent, 2);
    }

    #[test]
    fn test_deterministic() {
        let buffer = readings(&[3.3, 2.5, 1.0, 1.2, 2.9]);
        let a = aggregate("d1", &buffer).unwrap();
        let b = aggregate("d1", &buffer).unwrap();
        assert_eq!(a, b);
    }
}
