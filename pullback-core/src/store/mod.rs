//! Bar store: bounded rolling 1-minute history per instrument.
//!
//! Concurrency layout:
//! - `histories`: registry of per-instrument cells. Each cell has its own
//!   mutex, so instruments never contend with each other. The critical
//!   section is a ring push/evict and nothing else.
//! - `gate`: read-held by every ingestion, write-held by snapshot save/load
//!   so a snapshot sees one consistent point in time.
//! - Callbacks run after every lock is released, on the caller's thread.
//!
//! Replay shares all of this with live ingestion. Running both against the
//! same instruments at once is a caller error that the store does not detect.

pub mod alerts;
pub mod callbacks;
pub mod clock;
pub mod snapshot;

pub use alerts::AlertState;
pub use callbacks::{CallbackError, CallbackId, CallbackResult};
pub use clock::{Clock, ManualClock, SystemClock};
pub use snapshot::Snapshot;

use chrono::{DateTime, NaiveDateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::domain::{Bar, Direction, InstrumentKey, Series};
use callbacks::CallbackRegistry;
use clock::epoch_seconds;

/// About three trading sessions of 1-minute bars.
pub const DEFAULT_MAX_LEN: usize = 300;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid bar for {instrument} at {time}")]
    InvalidBar {
        instrument: String,
        time: NaiveDateTime,
    },

    #[error("no snapshot path configured")]
    NoSnapshotPath,

    #[error("snapshot not found: {}", path.display())]
    SnapshotMissing { path: PathBuf },

    #[error("snapshot corrupt: {}: {reason}", path.display())]
    SnapshotCorrupt { path: PathBuf, reason: String },

    #[error("snapshot I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Bars kept per instrument.
    pub max_len: usize,
    /// Default target for [`BarStore::save`] / [`BarStore::load`].
    pub snapshot_path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_len: DEFAULT_MAX_LEN,
            snapshot_path: None,
        }
    }
}

type History = Arc<Mutex<VecDeque<Bar>>>;

pub struct BarStore {
    config: StoreConfig,
    histories: RwLock<HashMap<InstrumentKey, History>>,
    gate: RwLock<()>,
    alerts: Mutex<AlertState>,
    callbacks: CallbackRegistry,
    bars_closed: AtomicU64,
    /// Replays in flight across all instruments.
    replaying: AtomicUsize,
    clock: Arc<dyn Clock>,
}

/// Holds one unit of the replay depth; released on drop, unwinding included.
struct ReplayGuard<'a>(&'a AtomicUsize);

impl<'a> ReplayGuard<'a> {
    fn enter(depth: &'a AtomicUsize) -> Self {
        depth.fetch_add(1, Ordering::AcqRel);
        Self(depth)
    }
}

impl Drop for ReplayGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl BarStore {
    pub fn new(config: StoreConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: StoreConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            histories: RwLock::new(HashMap::new()),
            gate: RwLock::new(()),
            alerts: Mutex::new(AlertState::default()),
            callbacks: CallbackRegistry::default(),
            bars_closed: AtomicU64::new(0),
            replaying: AtomicUsize::new(0),
            clock,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn capacity(&self) -> usize {
        self.config.max_len.max(1)
    }

    fn history(&self, instrument: &str) -> Option<History> {
        self.histories.read().get(instrument).cloned()
    }

    fn history_or_insert(&self, instrument: &str) -> History {
        if let Some(history) = self.history(instrument) {
            return history;
        }
        let capacity = self.capacity();
        self.histories
            .write()
            .entry(instrument.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(VecDeque::with_capacity(capacity))))
            .clone()
    }

    fn store_bar(&self, instrument: &str, bar: Bar) {
        let _gate = self.gate.read();
        let history = self.history_or_insert(instrument);
        {
            let mut bars = history.lock();
            while bars.len() >= self.capacity() {
                bars.pop_front();
            }
            bars.push_back(bar);
        }
        self.bars_closed.fetch_add(1, Ordering::Relaxed);
    }

    // ── Ingestion ─────────────────────────────────────────────────────

    /// Store a closed bar, then notify bar-close observers.
    ///
    /// Bars are not deduplicated by timestamp; see
    /// [`LastSeenGate`](crate::strategy::LastSeenGate).
    pub fn append(&self, instrument: &str, bar: Bar) -> Result<(), StoreError> {
        if !bar.is_valid() {
            return Err(StoreError::InvalidBar {
                instrument: instrument.to_string(),
                time: bar.time,
            });
        }
        self.store_bar(instrument, bar);
        self.callbacks.dispatch(instrument, &bar);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn append_ohlcv(
        &self,
        instrument: &str,
        time: NaiveDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Bar, StoreError> {
        let bar = Bar::new(time, open, high, low, close, volume);
        self.append(instrument, bar)?;
        Ok(bar)
    }

    /// Bulk-load historical bars for one instrument.
    ///
    /// Invalid bars are skipped. Returns the number stored.
    pub fn replay<I>(&self, instrument: &str, bars: I, invoke_callbacks: bool) -> usize
    where
        I: IntoIterator<Item = Bar>,
    {
        let _replaying = ReplayGuard::enter(&self.replaying);
        let mut stored = 0;
        let mut skipped = 0;

        for bar in bars {
            if !bar.is_valid() {
                skipped += 1;
                continue;
            }
            self.store_bar(instrument, bar);
            stored += 1;
            if invoke_callbacks {
                self.callbacks.dispatch(instrument, &bar);
            }
        }

        tracing::debug!(instrument = %instrument, stored, skipped, "replay finished");
        stored
    }

    // ── Accessors (copies, never the live buffer) ─────────────────────

    pub fn get_last_n(&self, instrument: &str, n: usize) -> Vec<Bar> {
        let Some(history) = self.history(instrument) else {
            return Vec::new();
        };
        let bars = history.lock();
        let skip = bars.len().saturating_sub(n);
        bars.iter().skip(skip).copied().collect()
    }

    pub fn get_last_bar(&self, instrument: &str) -> Option<Bar> {
        self.history(instrument)?.lock().back().copied()
    }

    fn column(&self, instrument: &str, n: usize, f: impl Fn(&Bar) -> f64) -> Vec<f64> {
        self.get_last_n(instrument, n).iter().map(f).collect()
    }

    pub fn highs(&self, instrument: &str, n: usize) -> Vec<f64> {
        self.column(instrument, n, |b| b.high)
    }

    pub fn lows(&self, instrument: &str, n: usize) -> Vec<f64> {
        self.column(instrument, n, |b| b.low)
    }

    pub fn closes(&self, instrument: &str, n: usize) -> Vec<f64> {
        self.column(instrument, n, |b| b.close)
    }

    pub fn volumes(&self, instrument: &str, n: usize) -> Vec<f64> {
        self.column(instrument, n, |b| b.volume)
    }

    pub fn series(&self, instrument: &str, n: usize) -> Series {
        Series::from_bars(&self.get_last_n(instrument, n))
    }

    pub fn len(&self, instrument: &str) -> usize {
        self.history(instrument).map_or(0, |h| h.lock().len())
    }

    pub fn has_enough_data(&self, instrument: &str, min_bars: usize) -> bool {
        self.len(instrument) >= min_bars
    }

    /// Instruments with a history, sorted.
    pub fn instruments(&self) -> Vec<InstrumentKey> {
        let mut keys: Vec<_> = self.histories.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    // ── Metrics ───────────────────────────────────────────────────────

    /// Bars stored since construction (live and replay).
    pub fn bars_closed(&self) -> u64 {
        self.bars_closed.load(Ordering::Relaxed)
    }

    /// True while any instrument is mid-replay.
    pub fn is_replaying(&self) -> bool {
        self.replaying.load(Ordering::Acquire) > 0
    }

    /// Observer errors and panics caught during dispatch.
    pub fn callback_failures(&self) -> u64 {
        self.callbacks.failures()
    }

    // ── Callbacks ─────────────────────────────────────────────────────

    pub fn register_on_bar_close<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(&str, &Bar) -> CallbackResult + Send + Sync + 'static,
    {
        self.callbacks.register(Arc::new(callback))
    }

    /// Returns false if the id was not registered.
    pub fn unregister_on_bar_close(&self, id: CallbackId) -> bool {
        self.callbacks.unregister(id)
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.len()
    }

    // ── Alert throttling ──────────────────────────────────────────────

    fn now(&self) -> f64 {
        epoch_seconds(self.clock.now())
    }

    pub fn can_emit_alert(&self, instrument: &str, cooldown: Duration) -> bool {
        let now = self.now();
        self.alerts.lock().can_emit(instrument, cooldown, now)
    }

    pub fn mark_alert_emitted(&self, instrument: &str) {
        let now = self.now();
        self.alerts.lock().mark_emitted(instrument, now);
    }

    /// True if this `(instrument, direction)` already alerted within `window`;
    /// otherwise records it and returns false.
    pub fn dedupe_alert(&self, instrument: &str, direction: Direction, window: Duration) -> bool {
        let now = self.now();
        self.alerts.lock().dedupe(instrument, direction, window, now)
    }

    pub fn pause_instrument(&self, instrument: &str, until: DateTime<Utc>) {
        self.alerts.lock().pause(instrument, epoch_seconds(until));
    }

    pub fn alert_state(&self) -> AlertState {
        self.alerts.lock().clone()
    }

    // ── Snapshot ──────────────────────────────────────────────────────

    fn snapshot_target(&self, path: Option<&Path>) -> Result<PathBuf, StoreError> {
        path.map(Path::to_path_buf)
            .or_else(|| self.config.snapshot_path.clone())
            .ok_or(StoreError::NoSnapshotPath)
    }

    /// Point-in-time copy of every history and the alert state.
    pub fn snapshot(&self) -> Snapshot {
        let _gate = self.gate.write();
        let bars: BTreeMap<String, Vec<Bar>> = self
            .histories
            .read()
            .iter()
            .map(|(key, history)| (key.clone(), history.lock().iter().copied().collect()))
            .collect();
        let alerts = self.alerts.lock().clone();
        Snapshot::new(bars, alerts, self.clock.now().naive_utc())
    }

    /// Write a snapshot to `path`, or the configured path.
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf, StoreError> {
        let target = self.snapshot_target(path)?;
        let snapshot = self.snapshot();
        snapshot.write_atomic(&target)?;
        tracing::info!(
            path = %target.display(),
            instruments = snapshot.bars.len(),
            bars = snapshot.bar_count(),
            "snapshot saved"
        );
        Ok(target)
    }

    /// Replace all histories and alert state from a snapshot file.
    ///
    /// Histories longer than `max_len` keep their newest bars. Returns the
    /// number of bars restored.
    pub fn load(&self, path: Option<&Path>) -> Result<usize, StoreError> {
        let target = self.snapshot_target(path)?;
        let snapshot = Snapshot::read(&target)?;
        let alerts = snapshot.alert_state();
        let capacity = self.capacity();

        let mut restored = 0;
        let histories: HashMap<InstrumentKey, History> = snapshot
            .bars
            .into_iter()
            .map(|(key, bars)| {
                let skip = bars.len().saturating_sub(capacity);
                let kept: VecDeque<Bar> = bars.into_iter().skip(skip).collect();
                restored += kept.len();
                (key, Arc::new(Mutex::new(kept)))
            })
            .collect();

        {
            let _gate = self.gate.write();
            *self.histories.write() = histories;
            *self.alerts.lock() = alerts;
        }

        tracing::info!(path = %target.display(), bars = restored, "snapshot loaded");
        Ok(restored)
    }
}

impl Default for BarStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl std::fmt::Debug for BarStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BarStore")
            .field("config", &self.config)
            .field("instruments", &self.histories.read().len())
            .field("bars_closed", &self.bars_closed())
            .finish()
    }
}
