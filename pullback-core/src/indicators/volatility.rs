//! Volatility suitability and move phase.
//!
//! Two views of the same question:
//! - [`analyze_volatility`]: ATR normalized by the recent average close
//!   (LOW chop / NORMAL tradable / HIGH exhaustion risk)
//! - [`volatility_phase`]: the last close-to-close move measured in ATRs
//!   (CONTRACTING / BUILDING / EXPANDING / EXHAUSTION)

use serde::{Deserialize, Serialize};

use crate::indicators::atr::atr;
use crate::indicators::round_to;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolatilityConfig {
    pub atr_period: usize,
    /// Closes averaged to normalize ATR.
    pub avg_window: usize,
    pub low_vol_norm: f64,
    pub high_vol_norm: f64,
    /// Phase boundaries in ATR multiples.
    pub contracting_below: f64,
    pub building_below: f64,
    pub expanding_below: f64,
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            atr_period: 14,
            avg_window: 10,
            low_vol_norm: 0.002,
            high_vol_norm: 0.006,
            contracting_below: 0.15,
            building_below: 0.5,
            expanding_below: 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolatilityState {
    Low,
    Normal,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityContext {
    pub state: VolatilityState,
    pub score: f64,
    pub atr: f64,
    pub vol_norm: f64,
    pub comment: String,
}

pub fn analyze_volatility(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    config: &VolatilityConfig,
) -> VolatilityContext {
    let atr_value = atr(highs, lows, closes, config.atr_period);
    let Some(atr_value) = atr_value.filter(|_| config.avg_window > 0 && closes.len() >= config.avg_window)
    else {
        return VolatilityContext {
            state: VolatilityState::Low,
            score: -0.5,
            atr: 0.0,
            vol_norm: 0.0,
            comment: "insufficient data".to_string(),
        };
    };

    let window = &closes[closes.len() - config.avg_window..];
    let avg_price = window.iter().sum::<f64>() / config.avg_window as f64;
    let vol_norm = if avg_price > 0.0 { atr_value / avg_price } else { 0.0 };

    let (state, score, comment) = if vol_norm < config.low_vol_norm {
        (VolatilityState::Low, -0.6, "low volatility")
    } else if vol_norm < config.high_vol_norm {
        (VolatilityState::Normal, 0.8, "tradable volatility")
    } else {
        (VolatilityState::High, -0.4, "high volatility")
    };

    VolatilityContext {
        state,
        score,
        atr: round_to(atr_value, 6),
        vol_norm: round_to(vol_norm, 4),
        comment: comment.to_string(),
    }
}

/// Size of the latest move relative to ATR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolatilityPhase {
    Contracting,
    Building,
    Expanding,
    Exhaustion,
}

impl VolatilityPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contracting => "CONTRACTING",
            Self::Building => "BUILDING",
            Self::Expanding => "EXPANDING",
            Self::Exhaustion => "EXHAUSTION",
        }
    }

    /// Score contribution of the phase.
    pub fn score(&self) -> f64 {
        match self {
            Self::Contracting => -0.5,
            Self::Building => 0.6,
            Self::Expanding => 1.0,
            Self::Exhaustion => -0.8,
        }
    }

    /// Setups are not taken in a dead or a blown-out market.
    pub fn rejects_setup(&self) -> bool {
        matches!(self, Self::Contracting | Self::Exhaustion)
    }
}

/// Classify `current_move` (last close minus previous close) against ATR.
///
/// Missing or non-positive ATR reads as CONTRACTING.
pub fn volatility_phase(current_move: f64, atr_value: Option<f64>, config: &VolatilityConfig) -> VolatilityPhase {
    let Some(atr_value) = atr_value.filter(|a| *a > 0.0) else {
        return VolatilityPhase::Contracting;
    };

    let ratio = current_move.abs() / atr_value;
    if ratio < config.contracting_below {
        VolatilityPhase::Contracting
    } else if ratio < config.building_below {
        VolatilityPhase::Building
    } else if ratio < config.expanding_below {
        VolatilityPhase::Expanding
    } else {
        VolatilityPhase::Exhaustion
    }
}
