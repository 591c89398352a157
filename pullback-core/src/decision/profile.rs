//! Decision profiles: the weight and threshold sets of the decision formula.
//!
//! `standard` fuses pullback, HTF, regime, VWAP and liquidity. `extended`
//! raises the bar slightly and also fuses volume, volatility phase, price
//! action and SR location.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedWeights {
    /// Volume scores below this reject.
    pub volume_floor: f64,
    pub volume_weight: f64,
    pub volatility_weight: f64,
    pub price_action_weight: f64,
    pub sr_location_weight: f64,
    /// Proximity threshold passed to the SR location score.
    pub sr_proximity: f64,
}

impl Default for ExtendedWeights {
    fn default() -> Self {
        Self {
            volume_floor: 0.0,
            volume_weight: 0.5,
            volatility_weight: 0.5,
            price_action_weight: 0.8,
            sr_location_weight: 1.0,
            sr_proximity: 0.025,
        }
    }
}

/// Fields missing from a config file take the standard defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionProfile {
    pub name: String,
    pub htf_bonus: f64,
    pub trend_bonus: f64,
    pub strong_trend_bonus: f64,
    /// Fraction of the VWAP context score added (never subtracted).
    pub vwap_weight: f64,
    pub liquidity_weight: f64,
    pub liquidity_cap: f64,
    pub min_score: f64,
    pub max_score: f64,
    pub execute_threshold: f64,
    pub prepare_threshold: f64,
    /// A missing key means the standard formula.
    #[serde(default)]
    pub extended: Option<ExtendedWeights>,
}

impl DecisionProfile {
    pub fn standard() -> Self {
        Self {
            name: "standard".to_string(),
            htf_bonus: 1.0,
            trend_bonus: 0.6,
            strong_trend_bonus: 1.0,
            vwap_weight: 0.5,
            liquidity_weight: 0.4,
            liquidity_cap: 1.0,
            min_score: 0.0,
            max_score: 10.0,
            execute_threshold: 6.0,
            prepare_threshold: 4.5,
            extended: None,
        }
    }

    pub fn extended() -> Self {
        Self {
            name: "extended".to_string(),
            execute_threshold: 6.2,
            prepare_threshold: 4.8,
            extended: Some(ExtendedWeights::default()),
            ..Self::standard()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.min_score > self.max_score {
            return Err(format!("decision '{}': min_score exceeds max_score", self.name));
        }
        if self.prepare_threshold > self.execute_threshold {
            return Err(format!(
                "decision '{}': prepare_threshold {} exceeds execute_threshold {}",
                self.name, self.prepare_threshold, self.execute_threshold
            ));
        }
        if self.execute_threshold > self.max_score {
            return Err(format!(
                "decision '{}': execute_threshold is unreachable above max_score",
                self.name
            ));
        }
        Ok(())
    }
}

impl Default for DecisionProfile {
    fn default() -> Self {
        Self::standard()
    }
}
