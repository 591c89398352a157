//! Flat JSON snapshot of the bar store.
//!
//! Layout:
//! ```json
//! { "bars": { "<instrument>": [ {"time": ..., "open": ..., ...} ] },
//!   "last_alert_time": { "<instrument>": 1704186900.0 },
//!   "dedupe_map": { "<instrument>": { "LONG": 1704186900.0 } },
//!   "paused_until": { "<instrument>": 1704190500.0 },
//!   "timestamp": "2024-01-02T09:15:00" }
//! ```
//!
//! Writes go to `<path>.tmp` and are renamed into place, so a reader never
//! sees a partial file.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::alerts::AlertState;
use super::StoreError;
use crate::domain::Bar;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub bars: BTreeMap<String, Vec<Bar>>,
    #[serde(default)]
    pub last_alert_time: BTreeMap<String, f64>,
    #[serde(default)]
    pub dedupe_map: BTreeMap<String, BTreeMap<String, f64>>,
    #[serde(default)]
    pub paused_until: BTreeMap<String, f64>,
    pub timestamp: NaiveDateTime,
}

impl Snapshot {
    pub(crate) fn new(bars: BTreeMap<String, Vec<Bar>>, alerts: AlertState, timestamp: NaiveDateTime) -> Self {
        Self {
            bars,
            last_alert_time: alerts.last_alert_time,
            dedupe_map: alerts.dedupe_map,
            paused_until: alerts.paused_until,
            timestamp,
        }
    }

    pub fn alert_state(&self) -> AlertState {
        AlertState {
            last_alert_time: self.last_alert_time.clone(),
            dedupe_map: self.dedupe_map.clone(),
            paused_until: self.paused_until.clone(),
        }
    }

    pub fn bar_count(&self) -> usize {
        self.bars.values().map(Vec::len).sum()
    }

    /// Read and validate a snapshot file.
    ///
    /// A missing file and an unparseable or invalid one are distinct errors;
    /// neither is ever treated as an empty snapshot.
    pub fn read(path: &Path) -> Result<Self, StoreError> {
        let raw = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::SnapshotMissing {
                path: path.to_path_buf(),
            },
            _ => StoreError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        let snapshot: Snapshot = serde_json::from_str(&raw).map_err(|e| StoreError::SnapshotCorrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        for (instrument, bars) in &snapshot.bars {
            if let Some(bad) = bars.iter().find(|b| !b.is_valid()) {
                return Err(StoreError::SnapshotCorrupt {
                    path: path.to_path_buf(),
                    reason: format!("invalid bar for {instrument} at {}", bad.time),
                });
            }
        }

        Ok(snapshot)
    }

    /// Serialize to `<path>.tmp`, then rename over `path`.
    pub fn write_atomic(&self, path: &Path) -> Result<(), StoreError> {
        let io_err = |source: io::Error| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string(self).map_err(|e| StoreError::SnapshotCorrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let tmp = tmp_path(path);
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            io_err(e)
        })
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap()
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let mut bars = BTreeMap::new();
        bars.insert("A".to_string(), vec![Bar::new(ts(), 1.0, 2.0, 0.5, 1.5, 10.0)]);
        let mut alerts = AlertState::default();
        alerts.mark_emitted("A", 1_704_186_900.0);
        let snapshot = Snapshot::new(bars, alerts, ts());

        snapshot.write_atomic(&path).unwrap();
        assert!(!tmp_path(&path).exists());

        let back = Snapshot::read(&path).unwrap();
        assert_eq!(back, snapshot);
        assert_eq!(back.bar_count(), 1);
    }

    #[test]
    fn json_layout_uses_documented_keys() {
        let snapshot = Snapshot::new(BTreeMap::new(), AlertState::default(), ts());
        let value = serde_json::to_value(&snapshot).unwrap();
        for key in ["bars", "last_alert_time", "dedupe_map", "paused_until", "timestamp"] {
            assert!(value.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(value["timestamp"], "2024-01-02T09:15:00");
    }

    #[test]
    fn missing_and_corrupt_are_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(
            Snapshot::read(&missing),
            Err(StoreError::SnapshotMissing { .. })
        ));

        let corrupt = dir.path().join("bad.json");
        fs::write(&corrupt, "{ not json").unwrap();
        assert!(matches!(
            Snapshot::read(&corrupt),
            Err(StoreError::SnapshotCorrupt { .. })
        ));
    }

    #[test]
    fn invalid_bar_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inverted.json");
        let json = r#"{"bars":{"A":[{"time":"2024-01-02T09:15:00","open":1.0,"high":0.5,"low":2.0,"close":1.0,"volume":1.0}]},"timestamp":"2024-01-02T09:15:00"}"#;
        fs::write(&path, json).unwrap();
        assert!(matches!(
            Snapshot::read(&path),
            Err(StoreError::SnapshotCorrupt { .. })
        ));
    }
}
