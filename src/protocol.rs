// Wattsim - Energy consumption telemetry simulator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Core data types shared by every stage of the simulator
//!
//! This module defines the severity [`Tier`], the classified [`Reading`]
//! held in per-device buffers, and [`TierCounts`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest reading the simulator ever produces (kWh)
pub const MIN_READING: f64 = 0.5;

/// Highest reading the simulator ever produces (kWh)
pub const MAX_READING: f64 = 3.5;

/// Severity tier of a consumption reading
///
/// Ordered by severity: `Excellent < Warning < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Consumption within the ideal range
    Excellent,
    /// Above-normal consumption
    Warning,
    /// Extremely high consumption
    Critical,
}

impl Tier {
    /// All tiers, most severe first
    pub const ALL: [Tier; 3] = [Tier::Critical, Tier::Warning, Tier::Excellent];

    /// Lowercase name, as stored in alert and suggestion records
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Critical => "critical",
            Tier::Warning => "warning",
            Tier::Excellent => "excellent",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A classified consumption reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// Consumption in kWh, always within [`MIN_READING`, `MAX_READING`]
    pub value: f64,
    /// Tier assigned by the classifier
    pub tier: Tier,
    /// Human-readable classification message
    pub message: String,
    /// When the reading was generated
    pub created_at: DateTime<Utc>,
}

impl Reading {
    /// Create a reading from a value and its classification
    pub fn new(value: f64, tier: Tier, message: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            value,
            tier,
            message: message.into(),
            created_at,
        }
    }
}

/// Occurrences of each tier in a set of readings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    pub critical: usize,
    pub warning: usize,
    pub excellent: usize,
}

impl TierCounts {
    /// Count one occurrence of `tier`
    pub fn record(&mut self, tier: Tier) {
        match tier {
            Tier::Critical => self.critical += 1,
            Tier::Warning => self.warning += 1,
            Tier::Excellent => self.excellent += 1,
        }
    }

    /// Occurrences of `tier`
    pub fn get(&self, tier: Tier) -> usize {
        match tier {
            Tier::Critical => self.critical,
            Tier::Warning => self.warning,
            Tier::Excellent => self.excellent,
        }
    }

    /// Sum over all tiers
    pub fn total(&self) -> usize {
        self.critical + self.warning + self.excellent
    }

    /// Fraction of the total that falls in `tier` (0.0 when empty)
    pub fn share(&self, tier: Tier) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.get(tier) as f64 / total as f64
        }
    }

    /// Count and share of each tier, most severe first
    pub fn shares(&self) -> [(Tier, usize, f64); 3] {
        Tier::ALL.map(|t| (t, self.get(t), self.share(t)))
    }
}

impl FromIterator<Tier> for TierCounts {
    fn from_iter<I: IntoIterator<Item = Tier>>(iter: I) -> Self {
        let mut counts = TierCounts::default();
        for tier in iter {
            counts.record(tier);
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering() {
        assert!(Tier::Critical > Tier::Warning);
        assert!(Tier::Warning > Tier::Excellent);
    }

    #[test]
    fn test_tier_serde_lowercase() {
        let json = serde_json::to_string(&Tier::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
        let tier: Tier = serde_json::from_str("\"excellent\"").unwrap();
        assert_eq!(tier, Tier::Excellent);
    }

    #[test]
    fn test_tier_counts_from_iter() {
        let counts: TierCounts = [Tier::Critical, Tier::Warning, Tier::Warning]
            .into_iter()
            .collect();
        assert_eq!(counts.critical, 1);
        assert_eq!(counts.warning, 2);
        assert_eq!(counts.excellent, 0);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_tier_counts_shares() {
        let counts = TierCounts {
            critical: 1,
            warning: 1,
            excellent: 2,
        };
        let rows = counts.shares();
        assert_eq!(rows[0], (Tier::Critical, 1, 0.25));
        assert_eq!(rows[1], (Tier::Warning, 1, 0.25));
        assert_eq!(rows[2], (Tier::Excellent, 2, 0.5));

        let empty = TierCounts::default().shares();
        assert!(empty.iter().all(|&(_, n, share)| n == 0 && share == 0.0));
    }

    #[test]
    fn test_tier_counts_share() {
        let empty = TierCounts::default();
        assert_eq!(empty.share(Tier::Critical), 0.0);

        let counts = TierCounts {
            critical: 1,
            warning: 1,
            excellent: 2,
        };
        assert!((counts.share(Tier::Excellent) - 0.5).abs() < 1e-12);
    }
}
