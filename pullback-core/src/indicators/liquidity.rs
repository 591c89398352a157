//! Liquidity suitability from average traded volume.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiquidityConfig {
    pub lookback: usize,
    /// Absolute average-volume floor per bar.
    pub min_avg_volume: f64,
}

impl Default for LiquidityConfig {
    fn default() -> Self {
        Self {
            lookback: 30,
            min_avg_volume: 250_000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LiquidityState {
    Illiquid,
    Tradable,
    HighLiquid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityContext {
    pub state: LiquidityState,
    /// -1..=1.
    pub score: f64,
    pub avg_volume: f64,
    pub comment: String,
}

impl LiquidityContext {
    pub fn is_liquid(&self) -> bool {
        self.state != LiquidityState::Illiquid
    }
}

pub fn analyze_liquidity(volumes: &[f64], config: &LiquidityConfig) -> LiquidityContext {
    let lookback = config.lookback;
    if lookback == 0 || volumes.len() < lookback {
        return LiquidityContext {
            state: LiquidityState::Illiquid,
            score: -1.0,
            avg_volume: 0.0,
            comment: "insufficient data".to_string(),
        };
    }

    let avg = volumes[volumes.len() - lookback..].iter().sum::<f64>() / lookback as f64;

    let (state, score, comment) = if avg < config.min_avg_volume {
        (LiquidityState::Illiquid, -1.0, "below liquidity threshold")
    } else if avg < config.min_avg_volume * 3.0 {
        (LiquidityState::Tradable, 0.5, "adequate liquidity")
    } else {
        (LiquidityState::HighLiquid, 1.0, "high liquidity")
    };

    LiquidityContext {
        state,
        score,
        avg_volume: avg.round(),
        comment: comment.to_string(),
    }
}
