//! VWAP: session volume-weighted average price.
//!
//! One accumulator per instrument, fed the close and volume of every raw bar.
//! It lives for a trading session; [`VwapAccumulator::reset`] is the only way
//! to clear it.
//!
//! With `window = None` the sums are cumulative, so cumulative volume never
//! decreases. With `window = Some(n)` only the last `n` samples count.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::indicators::round_to;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VwapConfig {
    /// Rolling window in samples; `None` = cumulative for the session.
    pub window: Option<usize>,
    /// VWAP values kept for the slope.
    pub slope_window: usize,
    /// Distance (percent) inside which price counts as NEAR.
    pub acceptance_band_pct: f64,
}

impl Default for VwapConfig {
    fn default() -> Self {
        Self {
            window: None,
            slope_window: 7,
            acceptance_band_pct: 0.3,
        }
    }
}

/// Where price sits relative to VWAP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VwapAcceptance {
    Above,
    Below,
    Near,
}

impl VwapAcceptance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Above => "ABOVE",
            Self::Below => "BELOW",
            Self::Near => "NEAR",
        }
    }
}

impl fmt::Display for VwapAcceptance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VwapPressure {
    Buying,
    Selling,
    Neutral,
}

/// VWAP context at a given price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VwapContext {
    pub vwap: Option<f64>,
    /// (price - vwap) / vwap * 100.
    pub distance_pct: f64,
    pub slope: f64,
    pub acceptance: VwapAcceptance,
    pub pressure: VwapPressure,
    /// -2..=2.
    pub score: f64,
    pub comment: String,
}

impl VwapContext {
    /// Context used when no volume has been seen yet.
    pub fn unavailable() -> Self {
        Self {
            vwap: None,
            distance_pct: 0.0,
            slope: 0.0,
            acceptance: VwapAcceptance::Near,
            pressure: VwapPressure::Neutral,
            score: 0.0,
            comment: "VWAP unavailable".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VwapAccumulator {
    config: VwapConfig,
    price_volume_sum: f64,
    volume_sum: f64,
    price_volume_window: VecDeque<f64>,
    volume_window: VecDeque<f64>,
    history: VecDeque<f64>,
}

impl VwapAccumulator {
    pub fn new(config: VwapConfig) -> Self {
        Self {
            price_volume_sum: 0.0,
            volume_sum: 0.0,
            price_volume_window: VecDeque::new(),
            volume_window: VecDeque::new(),
            history: VecDeque::with_capacity(config.slope_window),
            config,
        }
    }

    /// Clear all sums and history (session start).
    pub fn reset(&mut self) {
        self.price_volume_sum = 0.0;
        self.volume_sum = 0.0;
        self.price_volume_window.clear();
        self.volume_window.clear();
        self.history.clear();
    }

    /// Add one sample. Non-positive or non-finite volume is ignored.
    pub fn update(&mut self, price: f64, volume: f64) -> Option<f64> {
        if !price.is_finite() || !volume.is_finite() || volume <= 0.0 {
            return None;
        }

        match self.config.window {
            Some(window) if window > 0 => {
                if self.volume_window.len() == window {
                    self.price_volume_window.pop_front();
                    self.volume_window.pop_front();
                }
                self.price_volume_window.push_back(price * volume);
                self.volume_window.push_back(volume);
                // Re-summed rather than adjusted to avoid float drift.
                self.price_volume_sum = self.price_volume_window.iter().sum();
                self.volume_sum = self.volume_window.iter().sum();
            }
            _ => {
                self.price_volume_sum += price * volume;
                self.volume_sum += volume;
            }
        }

        let vwap = self.value()?;
        if self.config.slope_window > 0 {
            if self.history.len() == self.config.slope_window {
                self.history.pop_front();
            }
            self.history.push_back(vwap);
        }
        Some(vwap)
    }

    pub fn value(&self) -> Option<f64> {
        if self.volume_sum <= 0.0 {
            return None;
        }
        Some(self.price_volume_sum / self.volume_sum)
    }

    pub fn cumulative_volume(&self) -> f64 {
        self.volume_sum
    }

    /// (newest - oldest) / newest over the slope history; 0 with fewer than 2 samples.
    pub fn slope(&self) -> f64 {
        match (self.history.front(), self.history.back()) {
            (Some(oldest), Some(newest)) if self.history.len() >= 2 => {
                (newest - oldest) / newest.max(1e-9)
            }
            _ => 0.0,
        }
    }

    pub fn context(&self, price: f64) -> VwapContext {
        let Some(vwap) = self.value() else {
            return VwapContext::unavailable();
        };
        if !price.is_finite() {
            return VwapContext::unavailable();
        }

        let distance_pct = (price - vwap) / vwap * 100.0;
        let slope = self.slope();
        let band = self.config.acceptance_band_pct;

        let acceptance = if distance_pct > band {
            VwapAcceptance::Above
        } else if distance_pct < -band {
            VwapAcceptance::Below
        } else {
            VwapAcceptance::Near
        };

        let (pressure, score, comment) = match acceptance {
            VwapAcceptance::Above if slope > 0.0 => {
                (VwapPressure::Buying, 1.5, "above VWAP with rising slope")
            }
            VwapAcceptance::Below if slope < 0.0 => {
                (VwapPressure::Selling, -1.5, "below VWAP with falling slope")
            }
            VwapAcceptance::Near => (VwapPressure::Neutral, 0.0, "near VWAP"),
            _ => (VwapPressure::Neutral, -0.4, "weak VWAP alignment"),
        };

        VwapContext {
            vwap: Some(round_to(vwap, 6)),
            distance_pct: round_to(distance_pct, 3),
            slope: round_to(slope, 6),
            acceptance,
            pressure,
            score: f64::clamp(score, -2.0, 2.0),
            comment: comment.to_string(),
        }
    }
}

impl Default for VwapAccumulator {
    fn default() -> Self {
        Self::new(VwapConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn cumulative_vwap_is_exact() {
        let mut acc = VwapAccumulator::default();
        assert_eq!(acc.update(10.0, 100.0), Some(10.0));
        assert_eq!(acc.update(20.0, 100.0), Some(15.0));
        assert_eq!(acc.value(), Some(15.0));
    }

    #[test]
    fn zero_volume_is_ignored() {
        let mut acc = VwapAccumulator::default();
        assert!(acc.update(10.0, 0.0).is_none());
        assert!(acc.value().is_none());
        assert_eq!(acc.context(10.0), VwapContext::unavailable());
    }

    #[test]
    fn windowed_vwap_forgets_old_samples() {
        let mut acc = VwapAccumulator::new(VwapConfig {
            window: Some(2),
            ..VwapConfig::default()
        });
        acc.update(10.0, 100.0);
        acc.update(20.0, 100.0);
        let v = acc.update(30.0, 100.0).unwrap();
        assert_approx(v, 25.0, DEFAULT_EPSILON);
        assert_approx(acc.cumulative_volume(), 200.0, DEFAULT_EPSILON);
    }

    #[test]
    fn cumulative_volume_never_decreases() {
        let mut acc = VwapAccumulator::default();
        let mut last = 0.0;
        for (p, v) in [(10.0, 5.0), (11.0, 0.0), (9.0, 7.0), (12.0, -3.0)] {
            acc.update(p, v);
            assert!(acc.cumulative_volume() >= last);
            last = acc.cumulative_volume();
        }
    }

    #[test]
    fn reset_clears_state() {
        let mut acc = VwapAccumulator::default();
        acc.update(10.0, 100.0);
        acc.update(12.0, 100.0);
        acc.reset();
        assert!(acc.value().is_none());
        assert_eq!(acc.slope(), 0.0);
    }

    #[test]
    fn rising_vwap_above_price_is_buying() {
        let mut acc = VwapAccumulator::default();
        for p in [100.0, 101.0, 102.0] {
            acc.update(p, 1000.0);
        }
        // VWAP = 101, slope > 0, price 1% above.
        let ctx = acc.context(102.01);
        assert_eq!(ctx.acceptance, VwapAcceptance::Above);
        assert_eq!(ctx.pressure, VwapPressure::Buying);
        assert_eq!(ctx.score, 1.5);
    }

    #[test]
    fn falling_vwap_below_price_is_selling() {
        let mut acc = VwapAccumulator::default();
        for p in [102.0, 101.0, 100.0] {
            acc.update(p, 1000.0);
        }
        let ctx = acc.context(99.0);
        assert_eq!(ctx.acceptance, VwapAcceptance::Below);
        assert_eq!(ctx.pressure, VwapPressure::Selling);
        assert_eq!(ctx.score, -1.5);
    }

    #[test]
    fn near_and_misaligned_contexts() {
        let mut acc = VwapAccumulator::default();
        for p in [102.0, 101.0, 100.0] {
            acc.update(p, 1000.0);
        }
        // VWAP = 101, falling.
        let near = acc.context(101.1);
        assert_eq!(near.acceptance, VwapAcceptance::Near);
        assert_eq!(near.score, 0.0);

        let misaligned = acc.context(103.0);
        assert_eq!(misaligned.acceptance, VwapAcceptance::Above);
        assert_eq!(misaligned.pressure, VwapPressure::Neutral);
        assert_eq!(misaligned.score, -0.4);
    }

    #[test]
    fn slope_uses_bounded_history() {
        let mut acc = VwapAccumulator::new(VwapConfig {
            slope_window: 2,
            ..VwapConfig::default()
        });
        acc.update(10.0, 1.0);
        assert_eq!(acc.slope(), 0.0);
        acc.update(20.0, 1.0); // vwap 15
        acc.update(30.0, 2.0); // vwap 22.5
        assert_approx(acc.slope(), (22.5 - 15.0) / 22.5, DEFAULT_EPSILON);
    }
}
