//! Volume participation: last bar's volume relative to the recent mean.

use serde::{Deserialize, Serialize};

use crate::indicators::round_to;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    pub lookback: usize,
    /// Relative volume below this is LOW.
    pub low_ratio: f64,
    /// Relative volume below this (and not LOW) is NORMAL.
    pub high_ratio: f64,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            lookback: 20,
            low_ratio: 0.7,
            high_ratio: 1.4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolumeState {
    Low,
    Normal,
    High,
}

impl VolumeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Normal => "NORMAL",
            Self::High => "HIGH",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeContext {
    pub state: VolumeState,
    pub score: f64,
    pub relative_volume: f64,
    pub avg_volume: f64,
    pub comment: String,
}

impl VolumeContext {
    fn low(comment: &str) -> Self {
        Self {
            state: VolumeState::Low,
            score: -0.5,
            relative_volume: 0.0,
            avg_volume: 0.0,
            comment: comment.to_string(),
        }
    }
}

pub fn analyze_volume(volumes: &[f64], config: &VolumeConfig) -> VolumeContext {
    let lookback = config.lookback;
    if lookback == 0 || volumes.len() < lookback {
        return VolumeContext::low("insufficient volume");
    }

    let avg = volumes[volumes.len() - lookback..].iter().sum::<f64>() / lookback as f64;
    if avg <= 0.0 {
        return VolumeContext::low("zero volume");
    }

    let current = volumes[volumes.len() - 1];
    let rel = current / avg;

    let (state, score, comment) = if rel < config.low_ratio {
        (VolumeState::Low, -0.6, "low participation")
    } else if rel < config.high_ratio {
        (VolumeState::Normal, 0.6, "normal participation")
    } else {
        (VolumeState::High, 1.2, "high participation")
    };

    VolumeContext {
        state,
        score,
        relative_volume: round_to(rel, 2),
        avg_volume: avg.round(),
        comment: comment.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_history_is_low() {
        let ctx = analyze_volume(&[1000.0; 5], &VolumeConfig::default());
        assert_eq!(ctx.state, VolumeState::Low);
        assert_eq!(ctx.score, -0.5);
        assert_eq!(ctx.comment, "insufficient volume");
    }

    #[test]
    fn zero_volume_is_low() {
        let ctx = analyze_volume(&[0.0; 20], &VolumeConfig::default());
        assert_eq!(ctx.score, -0.5);
        assert_eq!(ctx.comment, "zero volume");
    }

    #[test]
    fn relative_volume_tiers() {
        let config = VolumeConfig::default();
        let mut volumes = vec![1000.0; 20];

        let normal = analyze_volume(&volumes, &config);
        assert_eq!(normal.state, VolumeState::Normal);
        assert_eq!(normal.score, 0.6);
        assert_eq!(normal.relative_volume, 1.0);

        // mean 1045 with a 1900 print → rel ~1.82
        volumes[19] = 1900.0;
        let high = analyze_volume(&volumes, &config);
        assert_eq!(high.state, VolumeState::High);
        assert_eq!(high.score, 1.2);

        volumes[19] = 100.0;
        let low = analyze_volume(&volumes, &config);
        assert_eq!(low.state, VolumeState::Low);
        assert_eq!(low.score, -0.6);
    }
}
