// Wattsim - Energy consumption telemetry simulator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! File-backed document store
//!
//! The `devices` collection is a small pretty-printed JSON document at the
//! store path, rewritten through a temporary file and a rename on every
//! reading update:
//!
//! ```text
//! { "devices": { "<id>": { "reading": 2.41, "lastUpdated": "..." } } }
//! ```
//!
//! The append-only collections are JSON-lines logs next to it, one record
//! per line, so an append costs the same however long the log already is:
//!
//! ```text
//! wattsim.json                    devices
//! wattsim.device_history.jsonl    device_history
//! wattsim.alerts.jsonl            alerts
//! wattsim.suggestions.jsonl       suggestions
//! ```
//!
//! Only the retention sweep rewrites a log, and only when it removes records.

use super::{
    AlertRecord, Collections, DeviceRecord, DocumentStore, HistoryRecord, StoreResult,
    SuggestionRecord,
};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

type DeviceMap = BTreeMap<String, DeviceRecord>;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DeviceDocument {
    devices: DeviceMap,
}

#[derive(Serialize)]
struct DeviceDocumentRef<'a> {
    devices: &'a DeviceMap,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Append-only JSON-lines file
#[derive(Debug)]
struct JsonLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonLog {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    fn append<T: Serialize>(&self, record: &T) -> StoreResult<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let _guard = lock(&self.lock);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)?;
        Ok(())
    }

    fn read_all<T: DeserializeOwned>(&self) -> StoreResult<Vec<T>> {
        let _guard = lock(&self.lock);
        self.read_unlocked()
    }

    fn read_unlocked<T: DeserializeOwned>(&self) -> StoreResult<Vec<T>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&self.path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }

    /// Keep the records matching `keep`; returns how many were removed
    fn retain<T, F>(&self, keep: F) -> StoreResult<usize>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(&T) -> bool,
    {
        let _guard = lock(&self.lock);
        let records: Vec<T> = self.read_unlocked()?;
        let before = records.len();
        let kept: Vec<T> = records.into_iter().filter(|r| keep(r)).collect();
        let removed = before - kept.len();
        if removed == 0 {
            return Ok(0);
        }

        let tmp = self.path.with_extension("jsonl.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            for record in &kept {
                serde_json::to_writer(&mut writer, record)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(removed)
    }
}

/// Document store persisted to a JSON document plus JSON-lines logs
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    devices: Mutex<DeviceMap>,
    history: JsonLog,
    alerts: JsonLog,
    suggestions: JsonLog,
}

impl FileStore {
    /// Open a store, loading the devices document if it exists
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let devices = if path.exists() {
            let bytes = fs::read(&path)?;
            serde_json::from_slice::<DeviceDocument>(&bytes)?.devices
        } else {
            DeviceMap::new()
        };
        let log = |name: &str| JsonLog::new(path.with_extension(format!("{}.jsonl", name)));

        Ok(Self {
            history: log("device_history"),
            alerts: log("alerts"),
            suggestions: log("suggestions"),
            devices: Mutex::new(devices),
            path,
        })
    }

    /// Path of the devices document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Paths of the `device_history`, `alerts` and `suggestions` logs
    pub fn log_paths(&self) -> [&Path; 3] {
        [
            &self.history.path,
            &self.alerts.path,
            &self.suggestions.path,
        ]
    }

    /// Register devices and persist; nothing is registered if the write fails
    pub fn add_devices<I, S>(&self, ids: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut devices = lock(&self.devices);
        let mut added = Vec::new();
        for id in ids {
            let id = id.as_ref();
            if !devices.contains_key(id) {
                devices.insert(id.to_string(), DeviceRecord::default());
                added.push(id.to_string());
            }
        }
        if added.is_empty() {
            return Ok(());
        }
        if let Err(e) = self.persist_devices(&devices) {
            for id in &added {
                devices.remove(id);
            }
            return Err(e);
        }
        Ok(())
    }

    /// Read every collection back from disk
    pub fn snapshot(&self) -> StoreResult<Collections> {
        Ok(Collections {
            devices: lock(&self.devices).clone(),
            device_history: self.history.read_all()?,
            alerts: self.alerts.read_all()?,
            suggestions: self.suggestions.read_all()?,
        })
    }

    fn persist_devices(&self, devices: &DeviceMap) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(&DeviceDocumentRef { devices })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl DocumentStore for FileStore {
    fn device_ids(&self) -> StoreResult<Vec<String>> {
        Ok(lock(&self.devices).keys().cloned().collect())
    }

    fn update_reading(&self, device_id: &str, reading: f64, at: DateTime<Utc>) -> StoreResult<()> {
        let mut devices = lock(&self.devices);
        let device = devices
            .get_mut(device_id)
            .ok_or_else(|| StoreError::DeviceNotFound(device_id.to_string()))?;
        let previous = std::mem::replace(
            device,
            DeviceRecord {
                reading: Some(reading),
                last_updated: Some(at),
            },
        );

        if let Err(e) = self.persist_devices(&devices) {
            if let Some(device) = devices.get_mut(device_id) {
                *device = previous;
            }
            return Err(e);
        }
        Ok(())
    }

    fn append_history(&self, record: HistoryRecord) -> StoreResult<()> {
        self.history.append(&record)
    }

    fn append_alert(&self, record: AlertRecord) -> StoreResult<()> {
        self.alerts.append(&record)
    }

    fn append_suggestion(&self, record: SuggestionRecord) -> StoreResult<()> {
        self.suggestions.append(&record)
    }

    fn purge_suggestions_before(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        self.suggestions
            .retain(|s: &SuggestionRecord| s.created_at >= cutoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TemporalContext;
    use crate::protocol::Tier;
    use crate::suggestion::Suggestion;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_720_000_000 + secs, 0).unwrap()
    }

    fn history(device_id: &str, reading: f64, secs: i64) -> HistoryRecord {
        HistoryRecord {
            device_id: device_id.to_string(),
            reading,
            recorded_at: ts(secs),
        }
    }

    fn suggestion_at(created_at: DateTime<Utc>) -> SuggestionRecord {
        SuggestionRecord {
            suggestion: Suggestion {
                device_id: "d1".to_string(),
                tier: Tier::Critical,
                short_message: "short".to_string(),
                description: "long".to_string(),
                related_reading: 3.3,
                read: false,
                context: TemporalContext::default(),
            },
            created_at,
        }
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("store.json")).unwrap();
        assert!(store.device_ids().unwrap().is_empty());
        assert_eq!(store.snapshot().unwrap(), Collections::default());
    }

    #[test]
    fn test_log_paths_next_to_document() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("wattsim.json")).unwrap();
        let [history, alerts, suggestions] = store.log_paths();
        assert_eq!(history, dir.path().join("wattsim.device_history.jsonl"));
        assert_eq!(alerts, dir.path().join("wattsim.alerts.jsonl"));
        assert_eq!(suggestions, dir.path().join("wattsim.suggestions.jsonl"));
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");

        {
            let store = FileStore::open(&path).unwrap();
            store.add_devices(["d1", "d2"]).unwrap();
            store.update_reading("d1", 2.75, ts(0)).unwrap();
            store.append_history(history("d1", 2.75, 0)).unwrap();
        }

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.device_ids().unwrap(), vec!["d1", "d2"]);
        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.devices["d1"].reading, Some(2.75));
        assert_eq!(snapshot.devices["d2"].reading, None);
        assert_eq!(snapshot.device_history, vec![history("d1", 2.75, 0)]);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_appends_leave_devices_document_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let store = FileStore::open(&path).unwrap();
        store.add_devices(["d1"]).unwrap();
        store.update_reading("d1", 1.5, ts(0)).unwrap();
        let document = fs::read(&path).unwrap();

        for i in 0..500 {
            store.append_history(history("d1", 1.5, i)).unwrap();
        }

        // One line per record, and the devices document is not rewritten
        assert_eq!(fs::read(&path).unwrap(), document);
        let raw = fs::read_to_string(store.log_paths()[0]).unwrap();
        assert_eq!(raw.lines().count(), 500);
        assert!(raw.lines().all(|l| l.starts_with("{\"deviceId\":\"d1\"")));
    }

    #[test]
    fn test_purge_rewrites_suggestions_log() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("store.json")).unwrap();
        let now = ts(0);
        for days in [10, 8, 1, 0] {
            store
                .append_suggestion(suggestion_at(now - Duration::days(days)))
                .unwrap();
        }

        let removed = store
            .purge_suggestions_before(now - Duration::days(7))
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.purge_suggestions_before(now - Duration::days(7)).unwrap(), 0);

        let kept = store.snapshot().unwrap().suggestions;
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|s| s.created_at >= now - Duration::days(7)));

        // Appends continue on the rewritten log
        store.append_suggestion(suggestion_at(now)).unwrap();
        assert_eq!(store.snapshot().unwrap().suggestions.len(), 3);
    }

    #[test]
    fn test_unknown_device_not_persisted() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("store.json")).unwrap();
        let result = store.update_reading("ghost", 1.0, ts(0));
        assert!(matches!(result, Err(StoreError::DeviceNotFound(_))));
    }

    #[test]
    fn test_corrupt_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, b"not json").unwrap();
        assert!(matches!(
            FileStore::open(&path),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn test_corrupt_log_line_rejected() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("store.json")).unwrap();
        store.append_history(history("d1", 1.0, 0)).unwrap();
        fs::write(store.log_paths()[0], b"{\"deviceId\":").unwrap();
        assert!(matches!(
            store.snapshot(),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn test_write_failure_rolls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("store.json");
        // Parent directory does not exist, so every write fails
        let store = FileStore::open(&path).unwrap();
        assert!(store.add_devices(["d1"]).is_err());
        assert!(store.device_ids().unwrap().is_empty());

        let result = store.append_history(history("d1", 1.0, 0));
        assert!(matches!(result, Err(StoreError::Io(_))));
    }

    #[test]
    fn test_failed_update_keeps_previous_reading() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("data");
        fs::create_dir(&sub).unwrap();
        let store = FileStore::open(sub.join("store.json")).unwrap();
        store.add_devices(["d1"]).unwrap();
        store.update_reading("d1", 1.25, ts(0)).unwrap();

        fs::remove_dir_all(&sub).unwrap();
        assert!(store.update_reading("d1", 3.4, ts(2)).is_err());

        let device = &store.snapshot().unwrap().devices["d1"];
        assert_eq!(device.reading, Some(1.25));
        assert_eq!(device.last_updated, Some(ts(0)));
    }
}
