//! Bar: the fundamental market data unit.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// OHLCV bar for a single instrument over one time bucket.
///
/// Raw feed bars cover one minute; aggregated candles reuse the same type with
/// `time` set to the bucket start. Bars are immutable once stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bucket start, minute resolution.
    pub time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(time: NaiveDateTime, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Finite prices, `high >= low`, non-negative finite volume.
    pub fn is_valid(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        prices.iter().all(|p| p.is_finite())
            && self.volume.is_finite()
            && self.volume >= 0.0
            && self.high >= self.low
    }

    /// High minus low.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Column-oriented copy of a bar sequence, oldest first.
///
/// Indicator functions take plain slices; this is the bridge from stored bars
/// to those slices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    pub opens: Vec<f64>,
    pub highs: Vec<f64>,
    pub lows: Vec<f64>,
    pub closes: Vec<f64>,
    pub volumes: Vec<f64>,
}

impl Series {
    pub fn from_bars(bars: &[Bar]) -> Self {
        let mut series = Self {
            opens: Vec::with_capacity(bars.len()),
            highs: Vec::with_capacity(bars.len()),
            lows: Vec::with_capacity(bars.len()),
            closes: Vec::with_capacity(bars.len()),
            volumes: Vec::with_capacity(bars.len()),
        };
        for bar in bars {
            series.opens.push(bar.open);
            series.highs.push(bar.high);
            series.lows.push(bar.low);
            series.closes.push(bar.close);
            series.volumes.push(bar.volume);
        }
        series
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.closes.last().copied()
    }
}
