//! Timeframe aggregation: closed 1-minute bars into coarse candles.
//!
//! Close detection lags by one input bar: a bucket is only known to be closed
//! when the first bar of the next bucket arrives. There are no wall-clock
//! timers, and downstream thresholds depend on this exact timing.

pub mod timeframe;

pub use timeframe::Timeframe;

use chrono::NaiveDateTime;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use crate::domain::{Bar, InstrumentKey};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Timeframes built per instrument, in minutes.
    pub timeframes: Vec<Timeframe>,
    /// Timeframe whose close drives evaluation.
    pub primary: Timeframe,
    /// Closed candles kept per timeframe.
    pub history_len: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            timeframes: vec![Timeframe::M5, Timeframe::M15],
            primary: Timeframe::M5,
            history_len: 300,
        }
    }
}

#[derive(Debug, Default)]
struct FrameState {
    current: Option<Bar>,
    closed: VecDeque<Bar>,
    last_closed: Option<NaiveDateTime>,
}

impl FrameState {
    /// Fold `bar` in. Returns true when this closed the previous bucket.
    fn update(&mut self, timeframe: Timeframe, bar: &Bar, history_len: usize) -> bool {
        let bucket = timeframe.bucket_start(bar.time);

        match self.current.as_mut() {
            Some(candle) if candle.time == bucket => {
                candle.high = candle.high.max(bar.high);
                candle.low = candle.low.min(bar.low);
                candle.close = bar.close;
                candle.volume += bar.volume;
                false
            }
            _ => {
                let seeded = Bar { time: bucket, ..*bar };
                match self.current.replace(seeded) {
                    Some(finished) => {
                        self.last_closed = Some(finished.time);
                        while self.closed.len() >= history_len.max(1) {
                            self.closed.pop_front();
                        }
                        self.closed.push_back(finished);
                        true
                    }
                    None => false,
                }
            }
        }
    }
}

type Frames = Arc<Mutex<BTreeMap<Timeframe, FrameState>>>;

/// Per-instrument candle builder for several timeframes at once.
///
/// Safe to share; each instrument has its own lock.
#[derive(Debug)]
pub struct TimeframeAggregator {
    config: AggregationConfig,
    instruments: RwLock<HashMap<InstrumentKey, Frames>>,
}

impl TimeframeAggregator {
    pub fn new(config: AggregationConfig) -> Self {
        Self {
            config,
            instruments: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    pub fn primary(&self) -> Timeframe {
        self.config.primary
    }

    fn frames(&self, instrument: &str) -> Option<Frames> {
        self.instruments.read().get(instrument).cloned()
    }

    fn frames_or_insert(&self, instrument: &str) -> Frames {
        if let Some(frames) = self.frames(instrument) {
            return frames;
        }
        self.instruments
            .write()
            .entry(instrument.to_string())
            .or_default()
            .clone()
    }

    /// Feed one closed 1-minute bar to every configured timeframe.
    ///
    /// Returns the timeframes whose previous candle this bar closed.
    pub fn update_all(&self, instrument: &str, bar: &Bar) -> Vec<Timeframe> {
        let frames = self.frames_or_insert(instrument);
        let mut frames = frames.lock();
        let mut closed = Vec::new();

        for &timeframe in &self.config.timeframes {
            let state = frames.entry(timeframe).or_default();
            if state.update(timeframe, bar, self.config.history_len) {
                closed.push(timeframe);
            }
        }
        closed
    }

    /// Feed one bar; true iff the primary timeframe's candle just closed.
    pub fn update(&self, instrument: &str, bar: &Bar) -> bool {
        self.update_all(instrument, bar).contains(&self.config.primary)
    }

    /// The in-progress (not yet closed) candle.
    pub fn latest(&self, instrument: &str, timeframe: Timeframe) -> Option<Bar> {
        let frames = self.frames(instrument)?;
        let frames = frames.lock();
        frames.get(&timeframe)?.current
    }

    /// Up to `lookback` most recent closed candles, oldest first.
    pub fn history(&self, instrument: &str, timeframe: Timeframe, lookback: usize) -> Vec<Bar> {
        let Some(frames) = self.frames(instrument) else {
            return Vec::new();
        };
        let frames = frames.lock();
        let Some(state) = frames.get(&timeframe) else {
            return Vec::new();
        };
        let skip = state.closed.len().saturating_sub(lookback);
        state.closed.iter().skip(skip).copied().collect()
    }

    /// Bucket start of the most recently closed candle.
    pub fn last_closed_time(&self, instrument: &str, timeframe: Timeframe) -> Option<NaiveDateTime> {
        let frames = self.frames(instrument)?;
        let frames = frames.lock();
        frames.get(&timeframe)?.last_closed
    }

    /// Forget all candles for one instrument.
    pub fn reset(&self, instrument: &str) {
        self.instruments.write().remove(instrument);
    }
}

impl Default for TimeframeAggregator {
    fn default() -> Self {
        Self::new(AggregationConfig::default())
    }
}
