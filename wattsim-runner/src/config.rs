// Wattsim Runner - Configuration loading
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Runner configuration.
//!
//! A JSON file holds the engine configuration plus the device list used to
//! seed the store. Every field is optional:
//!
//! ```json
//! {
//!   "engine": { "seed": 7, "schedule": { "update_interval_ms": 1000 } },
//!   "devices": ["kitchen", "office"]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use wattsim::{EngineConfig, StoreError, WattsimError};

/// Errors that stop the runner from starting.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Engine error: {0}")]
    Engine(#[from] WattsimError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("No devices to simulate; pass --device or list them in the config")]
    NoDevices,
}

/// Engine settings plus devices to register at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Engine configuration.
    pub engine: EngineConfig,
    /// Device identifiers registered in the store at startup.
    pub devices: Vec<String>,
}

impl RunnerConfig {
    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RunnerError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Parse from a JSON string.
    pub fn from_json(raw: &str) -> Result<Self, RunnerError> {
        let config: Self = serde_json::from_str(raw)?;
        config.engine.validate()?;
        Ok(config)
    }

    /// Add devices not already listed, keeping order.
    pub fn add_devices(&mut self, ids: impl IntoIterator<Item = String>) {
        for id in ids {
            if !self.devices.contains(&id) {
                self.devices.push(id);
            }
        }
    }
}
