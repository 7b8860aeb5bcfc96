// Wattsim - Energy consumption telemetry simulator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Reading classification module
//!
//! Maps a consumption value onto a severity [`Tier`] using two fixed
//! thresholds. The tiers partition the whole real line with no gaps:
//!
//! | Range              | Tier      |
//! |--------------------|-----------|
//! | `v >= 3.2`         | critical  |
//! | `2.2 <= v < 3.2`   | warning   |
//! | `v < 2.2`          | excellent |

use crate::protocol::Tier;

/// Readings at or above this value are critical (kWh)
pub const CRITICAL_THRESHOLD: f64 = 3.2;

/// Readings at or above this value (and below critical) are warnings (kWh)
pub const WARNING_THRESHOLD: f64 = 2.2;

/// Classification result for a single reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Assigned tier
    pub tier: Tier,
    /// Fixed message for the tier
    pub message: &'static str,
}

impl Classification {
    /// Classification for a tier, with its fixed message
    pub fn for_tier(tier: Tier) -> Self {
        let message = match tier {
            Tier::Critical => "extremely high consumption",
            Tier::Warning => "above-normal consumption",
            Tier::Excellent => "consumption within ideal range",
        };
        Self { tier, message }
    }
}

/// Classify a consumption value. Total over `f64`.
pub fn classify(value: f64) -> Classification {
    let tier = if value >= CRITICAL_THRESHOLD {
        Tier::Critical
    } else if value >= WARNING_THRESHOLD {
        Tier::Warning
    } else {
        Tier::Excellent
    };
    Classification::for_tier(tier)
}
