// Wattsim - Energy consumption telemetry simulator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Per-device reading buffers
//!
//! An [`AlertBuffer`] keeps the most recent classified readings of one device,
//! newest first, bounded by a fixed capacity. [`BufferStore`] owns one buffer
//! per device and is shared between the update and aggregation cycles, so
//! every access goes through a single mutex held only for in-memory work.

use crate::protocol::Reading;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// Bounded, most-recent-first sequence of readings for one device
#[derive(Debug, Clone)]
pub struct AlertBuffer {
    readings: VecDeque<Reading>,
    capacity: usize,
}

impl AlertBuffer {
    /// Create an empty buffer holding at most `capacity` readings
    pub fn new(capacity: usize) -> Self {
        Self {
            readings: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a reading to the front, dropping the oldest past capacity
    pub fn push(&mut self, reading: Reading) {
        self.readings.push_front(reading);
        self.readings.truncate(self.capacity);
    }

    /// Most recent reading
    pub fn head(&self) -> Option<&Reading> {
        self.readings.front()
    }

    /// Readings, newest first
    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.readings.iter()
    }

    /// Number of readings held
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    /// True when no readings are held
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Maximum number of readings held
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Remove and return all readings, newest first
    pub fn drain(&mut self) -> Vec<Reading> {
        self.readings.drain(..).collect()
    }

    /// Put back older readings behind the current ones
    ///
    /// Readings pushed since the drain stay in front; anything beyond
    /// capacity is dropped from the old end.
    pub fn restore(&mut self, older: Vec<Reading>) {
        for reading in older {
            if self.readings.len() >= self.capacity {
                break;
            }
            self.readings.push_back(reading);
        }
    }

    /// Remove all readings
    pub fn clear(&mut self) {
        self.readings.clear();
    }
}

/// Buffers of every device seen by the engine
#[derive(Debug)]
pub struct BufferStore {
    buffers: Mutex<HashMap<String, AlertBuffer>>,
    capacity: usize,
}

impl BufferStore {
    /// Create an empty store; buffers are created lazily per device
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, AlertBuffer>> {
        // Buffers hold plain data; a panic elsewhere cannot leave them half-written
        self.buffers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Per-device capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Value of the most recent reading for a device
    pub fn head_value(&self, device_id: &str) -> Option<f64> {
        self.lock()
            .get(device_id)
            .and_then(|b| b.head())
            .map(|r| r.value)
    }

    /// Push a reading for a device and return the new buffer length
    pub fn push(&self, device_id: &str, reading: Reading) -> usize {
        let mut buffers = self.lock();
        let buffer = buffers
            .entry(device_id.to_string())
            .or_insert_with(|| AlertBuffer::new(self.capacity));
        buffer.push(reading);
        buffer.len()
    }

    /// Copy of a device's readings, newest first
    pub fn snapshot(&self, device_id: &str) -> Vec<Reading> {
        self.lock()
            .get(device_id)
            .map(|b| b.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Take all readings of a device, leaving its buffer empty
    pub fn take(&self, device_id: &str) -> Vec<Reading> {
        self.lock()
            .get_mut(device_id)
            .map(AlertBuffer::drain)
            .unwrap_or_default()
    }

    /// Return readings previously taken from a device
    pub fn restore(&self, device_id: &str, readings: Vec<Reading>) {
        let mut buffers = self.lock();
        buffers
            .entry(device_id.to_string())
            .or_insert_with(|| AlertBuffer::new(self.capacity))
            .restore(readings);
    }

    /// Empty a device's buffer
    pub fn clear(&self, device_id: &str) {
        if let Some(buffer) = self.lock().get_mut(device_id) {
            buffer.clear();
        }
    }

    /// Number of readings buffered for a device
    pub fn len(&self, device_id: &str) -> usize {
        self.lock().get(device_id).map_or(0, AlertBuffer::len)
    }

    /// True when no device has a buffered reading
    pub fn is_empty(&self) -> bool {
        self.lock().values().all(AlertBuffer::is_empty)
    }

    /// Readings buffered across all devices
    pub fn total_len(&self) -> usize {
        self.lock().values().map(AlertBuffer::len).sum()
    }

    /// Devices that have a buffer (possibly empty)
    pub fn device_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Tier;
    use chrono::Utc;

    fn reading(value: f64) -> Reading {
        Reading::new(value, Tier::Excellent, "test", Utc::now())
    }

    #[test]
    fn test_push_newest_first() {
        let mut buffer = AlertBuffer::new(15);
        buffer.push(reading(1.0));
        buffer.push(reading(2.0));
        assert_eq!(buffer.head().unwrap().value, 2.0);
        let values: Vec<f64> = buffer.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![2.0, 1.0]);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut buffer = AlertBuffer::new(15);
        for i in 0..16 {
            buffer.push(reading(i as f64));
        }
        assert_eq!(buffer.len(), 15);
        assert_eq!(buffer.head().unwrap().value, 15.0);
        // Reading 0 was the oldest and is gone
        assert!(buffer.iter().all(|r| r.value != 0.0));
        assert_eq!(buffer.iter().last().unwrap().value, 1.0);
    }

    #[test]
    fn test_restore_keeps_newer_in_front() {
        let mut buffer = AlertBuffer::new(4);
        buffer.push(reading(1.0));
        buffer.push(reading(2.0));
        let taken = buffer.drain();
        assert!(buffer.is_empty());

        buffer.push(reading(3.0));
        buffer.restore(taken);
        let values: Vec<f64> = buffer.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_restore_respects_capacity() {
        let mut buffer = AlertBuffer::new(2);
        buffer.push(reading(1.0));
        buffer.push(reading(2.0));
        let taken = buffer.drain();
        buffer.push(reading(3.0));
        buffer.restore(taken);
        let values: Vec<f64> = buffer.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![3.0, 2.0]);
    }

    #[test]
    fn test_store_lazy_creation() {
        let store = BufferStore::new(15);
        assert_eq!(store.head_value("d1"), None);
        assert_eq!(store.len("d1"), 0);
        assert!(store.device_ids().is_empty());

        assert_eq!(store.push("d1", reading(1.5)), 1);
        assert_eq!(store.head_value("d1"), Some(1.5));
        assert_eq!(store.device_ids(), vec!["d1".to_string()]);
    }

    #[test]
    fn test_store_take_and_clear() {
        let store = BufferStore::new(15);
        store.push("d1", reading(1.0));
        store.push("d1", reading(2.0));
        store.push("d2", reading(3.0));
        assert_eq!(store.total_len(), 3);

        let taken = store.take("d1");
        assert_eq!(taken.len(), 2);
        assert_eq!(store.len("d1"), 0);
        assert!(store.take("unknown").is_empty());

        store.clear("d2");
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_capacity_per_device() {
        let store = BufferStore::new(15);
        for i in 0..20 {
            store.push("d1", reading(i as f64));
        }
        assert_eq!(store.len("d1"), 15);
        assert_eq!(store.snapshot("d1").len(), 15);
    }
}
