// Wattsim - Energy consumption telemetry simulator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Document store abstraction
//!
//! The engine persists everything through [`DocumentStore`], which models a
//! document database with four logical collections:
//!
//! - `devices`: one document per device with its latest reading;
//! - `device_history`: one record per generated reading;
//! - `alerts`: one record per aggregated alert;
//! - `suggestions`: one record per suggestion, purged after a retention window.
//!
//! [`MemoryStore`] keeps the collections in process; [`FileStore`] persists
//! the devices as a JSON document and the other collections as JSON-lines logs.

pub mod file;

pub use file::FileStore;

use crate::aggregator::AggregatedAlert;
use crate::error::StoreError;
use crate::suggestion::Suggestion;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Backend the engine reads devices from and writes results to
pub trait DocumentStore: Send + Sync {
    /// Ids of all known devices, in a stable order
    fn device_ids(&self) -> StoreResult<Vec<String>>;

    /// Set a device's current reading and last-update time
    fn update_reading(&self, device_id: &str, reading: f64, at: DateTime<Utc>) -> StoreResult<()>;

    /// Append to `device_history`
    fn append_history(&self, record: HistoryRecord) -> StoreResult<()>;

    /// Append to `alerts`
    fn append_alert(&self, record: AlertRecord) -> StoreResult<()>;

    /// Append to `suggestions`
    fn append_suggestion(&self, record: SuggestionRecord) -> StoreResult<()>;

    /// Delete suggestions created strictly before `cutoff`; returns how many
    fn purge_suggestions_before(&self, cutoff: DateTime<Utc>) -> StoreResult<usize>;
}

/// Document of the `devices` collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    /// Latest reading (kWh); `None` until the first update
    pub reading: Option<f64>,
    /// Time of the latest update
    pub last_updated: Option<DateTime<Utc>>,
}

/// Record of the `device_history` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub device_id: String,
    pub reading: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Record of the `alerts` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    #[serde(flatten)]
    pub alert: AggregatedAlert,
    pub created_at: DateTime<Utc>,
}

/// Record of the `suggestions` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRecord {
    #[serde(flatten)]
    pub suggestion: Suggestion,
    pub created_at: DateTime<Utc>,
}

/// The four collections as one serializable document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Collections {
    pub devices: BTreeMap<String, DeviceRecord>,
    pub device_history: Vec<HistoryRecord>,
    pub alerts: Vec<AlertRecord>,
    pub suggestions: Vec<SuggestionRecord>,
}

impl Collections {
    /// Register a device if it is not known yet
    pub fn add_device(&mut self, device_id: &str) {
        self.devices.entry(device_id.to_string()).or_default();
    }

    fn device_ids(&self) -> Vec<String> {
        self.devices.keys().cloned().collect()
    }

    fn update_reading(&mut self, device_id: &str, reading: f64, at: DateTime<Utc>) -> StoreResult<()> {
        let device = self
            .devices
            .get_mut(device_id)
            .ok_or_else(|| StoreError::DeviceNotFound(device_id.to_string()))?;
        device.reading = Some(reading);
        device.last_updated = Some(at);
        Ok(())
    }

    fn purge_suggestions_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.suggestions.len();
        self.suggestions.retain(|s| s.created_at >= cutoff);
        before - self.suggestions.len()
    }
}

/// In-process document store
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with the given devices registered
    pub fn with_devices<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let store = Self::new();
        for id in ids {
            store.add_device(id.as_ref());
        }
        store
    }

    fn read(&self) -> RwLockReadGuard<'_, Collections> {
        self.collections.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Collections> {
        self.collections.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a device
    pub fn add_device(&self, device_id: &str) {
        self.write().add_device(device_id);
    }

    /// Remove a device; its history, alerts and suggestions stay
    pub fn remove_device(&self, device_id: &str) -> Option<DeviceRecord> {
        self.write().devices.remove(device_id)
    }

    /// Current document of a device
    pub fn device(&self, device_id: &str) -> Option<DeviceRecord> {
        self.read().devices.get(device_id).cloned()
    }

    /// Copy of `device_history`
    pub fn history(&self) -> Vec<HistoryRecord> {
        self.read().device_history.clone()
    }

    /// Copy of `alerts`
    pub fn alerts(&self) -> Vec<AlertRecord> {
        self.read().alerts.clone()
    }

    /// Copy of `suggestions`
    pub fn suggestions(&self) -> Vec<SuggestionRecord> {
        self.read().suggestions.clone()
    }

    /// Copy of every collection
    pub fn snapshot(&self) -> Collections {
        self.read().clone()
    }
}

impl DocumentStore for MemoryStore {
    fn device_ids(&self) -> StoreResult<Vec<String>> {
        Ok(self.read().device_ids())
    }

    fn update_reading(&self, device_id: &str, reading: f64, at: DateTime<Utc>) -> StoreResult<()> {
        self.write().update_reading(device_id, reading, at)
    }

    fn append_history(&self, record: HistoryRecord) -> StoreResult<()> {
        self.write().device_history.push(record);
        Ok(())
    }

    fn append_alert(&self, record: AlertRecord) -> StoreResult<()> {
        self.write().alerts.push(record);
        Ok(())
    }

    fn append_suggestion(&self, record: SuggestionRecord) -> StoreResult<()> {
        self.write().suggestions.push(record);
        Ok(())
    }

    fn purge_suggestions_before(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        Ok(self.write().purge_suggestions_before(cutoff))
    }
}
