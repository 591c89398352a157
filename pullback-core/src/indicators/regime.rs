//! Market regime: trend suitability of the coarse timeframe.
//!
//! Combines the simplified ADX with ATR normalized by the recent average close:
//!
//! | state        | rule                              | strength                      |
//! |--------------|-----------------------------------|-------------------------------|
//! | STRONG_TREND | ADX >= 28 and volNorm > 0.004     | min(10, 6 + (ADX - 28) * 0.15) |
//! | TREND        | ADX >= 20 and volNorm > 0.0025    | min(10, 4 + (ADX - 20) * 0.2)  |
//! | RANGE        | otherwise                         | max(0.5, ADX * 0.08)           |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::indicators::adx::adx;
use crate::indicators::atr::atr;
use crate::indicators::round_to;
use crate::indicators::sma::trailing_mean;

/// Regime classification.
///
/// Decision scoring works on three tiers; the other labels seen in strategy
/// configs parse onto them (see [`FromStr`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegimeState {
    /// Chop. `WEAK` and `COMPRESSION` are aliases.
    Range,
    /// Tradable trend. `EARLY_TREND` is an alias.
    Trend,
    /// Strong trend. `TRENDING` is an alias.
    StrongTrend,
}

impl RegimeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Range => "RANGE",
            Self::Trend => "TREND",
            Self::StrongTrend => "STRONG_TREND",
        }
    }

    /// Whether setups may be taken in this regime.
    pub fn is_tradable(&self) -> bool {
        !matches!(self, Self::Range)
    }
}

impl fmt::Display for RegimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegimeState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RANGE" | "WEAK" | "COMPRESSION" => Ok(Self::Range),
            "TREND" | "EARLY_TREND" => Ok(Self::Trend),
            "STRONG_TREND" | "TRENDING" => Ok(Self::StrongTrend),
            other => Err(format!("unknown regime label: {other}")),
        }
    }
}

/// Regime detector parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    pub min_bars: usize,
    pub atr_period: usize,
    pub adx_period: usize,
    /// Closes averaged to normalize ATR.
    pub avg_close_window: usize,
    pub strong_adx: f64,
    pub strong_vol_norm: f64,
    pub trend_adx: f64,
    pub trend_vol_norm: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            min_bars: 25,
            atr_period: 14,
            adx_period: 14,
            avg_close_window: 24,
            strong_adx: 28.0,
            strong_vol_norm: 0.004,
            trend_adx: 20.0,
            trend_vol_norm: 0.0025,
        }
    }
}

/// Output of [`detect_regime`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeResult {
    pub state: RegimeState,
    /// 0.5..=10.
    pub strength: f64,
    pub atr: f64,
    pub adx: f64,
    pub comment: String,
}

impl RegimeResult {
    fn fallback(comment: &str) -> Self {
        Self {
            state: RegimeState::Range,
            strength: 0.5,
            atr: 0.0,
            adx: 0.0,
            comment: comment.to_string(),
        }
    }
}

/// Classify the regime of a coarse-timeframe series.
pub fn detect_regime(highs: &[f64], lows: &[f64], closes: &[f64], config: &RegimeConfig) -> RegimeResult {
    if highs.len() < config.min_bars {
        return RegimeResult::fallback("insufficient data");
    }

    let (Some(atr_value), Some(adx_value)) = (
        atr(highs, lows, closes, config.atr_period),
        adx(highs, lows, closes, config.adx_period),
    ) else {
        return RegimeResult::fallback("indicators unavailable");
    };

    let avg_close = trailing_mean(closes, config.avg_close_window).unwrap_or(0.0);
    let vol_norm = if avg_close > 0.0 { atr_value / avg_close } else { 0.0 };

    let (state, strength, comment) = if adx_value >= config.strong_adx && vol_norm > config.strong_vol_norm {
        (
            RegimeState::StrongTrend,
            (6.0 + (adx_value - config.strong_adx) * 0.15).min(10.0),
            "strong trend",
        )
    } else if adx_value >= config.trend_adx && vol_norm > config.trend_vol_norm {
        (
            RegimeState::Trend,
            (4.0 + (adx_value - config.trend_adx) * 0.2).min(10.0),
            "tradable trend",
        )
    } else {
        (RegimeState::Range, (adx_value * 0.08).max(0.5), "range / chop")
    };

    RegimeResult {
        state,
        strength: round_to(strength.clamp(0.0, 10.0), 2),
        atr: round_to(atr_value, 6),
        adx: round_to(adx_value, 2),
        comment: comment.to_string(),
    }
}
