//! Higher-timeframe bias: fast/slow SMA structure confirmed by VWAP.
//!
//! - BULLISH: fast SMA > slow SMA, last close > slow SMA, last close >= VWAP
//! - BEARISH: fast SMA < slow SMA, last close < slow SMA, last close <= VWAP
//! - NEUTRAL otherwise
//!
//! Without a VWAP value the structure alone decides.

use serde::{Deserialize, Serialize};

use crate::domain::BiasDirection;
use crate::indicators::round_to;
use crate::indicators::sma::sma;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiasConfig {
    pub fast_period: usize,
    pub slow_period: usize,
}

impl Default for BiasConfig {
    fn default() -> Self {
        Self {
            fast_period: 9,
            slow_period: 21,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HtfBias {
    pub direction: BiasDirection,
    /// Diagnostic label, e.g. `BULLISH_ABOVE_VWAP`.
    pub label: String,
    /// Fast/slow SMA spread in percent of the slow SMA.
    pub strength: f64,
}

impl HtfBias {
    fn neutral(label: &str) -> Self {
        Self {
            direction: BiasDirection::Neutral,
            label: label.to_string(),
            strength: 0.0,
        }
    }
}

pub fn htf_bias(closes: &[f64], vwap: Option<f64>, config: &BiasConfig) -> HtfBias {
    let (Some(fast), Some(slow), Some(&last)) = (
        sma(closes, config.fast_period),
        sma(closes, config.slow_period),
        closes.last(),
    ) else {
        return HtfBias::neutral("NEUTRAL_INSUFFICIENT_DATA");
    };
    if slow <= 0.0 {
        return HtfBias::neutral("NEUTRAL_INSUFFICIENT_DATA");
    }

    let strength = round_to((fast - slow).abs() / slow * 100.0, 3);

    let bullish_structure = fast > slow && last > slow;
    let bearish_structure = fast < slow && last < slow;

    let (direction, label) = match vwap {
        Some(v) if bullish_structure && last >= v => (BiasDirection::Bullish, "BULLISH_ABOVE_VWAP"),
        Some(v) if bearish_structure && last <= v => (BiasDirection::Bearish, "BEARISH_BELOW_VWAP"),
        Some(_) if bullish_structure => (BiasDirection::Neutral, "NEUTRAL_BELOW_VWAP"),
        Some(_) if bearish_structure => (BiasDirection::Neutral, "NEUTRAL_ABOVE_VWAP"),
        None if bullish_structure => (BiasDirection::Bullish, "BULLISH_STRUCTURE"),
        None if bearish_structure => (BiasDirection::Bearish, "BEARISH_STRUCTURE"),
        _ => (BiasDirection::Neutral, "NEUTRAL_MIXED"),
    };

    HtfBias {
        direction,
        label: label.to_string(),
        strength: if direction == BiasDirection::Neutral { 0.0 } else { strength },
    }
}
