//! Pipeline configuration.
//!
//! Every table and field carries `#[serde(default)]`, so a TOML file only
//! needs to state what it overrides:
//!
//! ```toml
//! profile = "extended"
//!
//! [store]
//! max_len = 600
//!
//! [decision]
//! execute_threshold = 6.5
//! ```
//!
//! `profile` picks the setup and decision profiles; an explicit `[setup]` or
//! `[decision]` table replaces the profile's choice outright.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::aggregate::{AggregationConfig, Timeframe};
use crate::decision::DecisionProfile;
use crate::indicators::{BiasConfig, LiquidityConfig, RegimeConfig, VolatilityConfig, VolumeConfig, VwapConfig};
use crate::setup::SetupProfile;
use crate::store::StoreConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Named bundle of setup + decision profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    /// Structural setups, standard decision weights.
    #[default]
    Standard,
    /// Continuation setups on the 1-minute series, extended decision weights.
    Extended,
}

impl ProfileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Extended => "extended",
        }
    }

    pub fn setup_profile(&self) -> SetupProfile {
        match self {
            Self::Standard => SetupProfile::structural(),
            Self::Extended => SetupProfile::continuation(),
        }
    }

    pub fn decision_profile(&self) -> DecisionProfile {
        match self {
            Self::Standard => DecisionProfile::standard(),
            Self::Extended => DecisionProfile::extended(),
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "extended" => Ok(Self::Extended),
            other => Err(format!("unknown profile: {other} (expected standard or extended)")),
        }
    }
}

/// How much history one evaluation looks at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Closed primary candles fed to regime, bias, SR and liquidity.
    pub coarse_lookback: usize,
    /// 1-minute bars fed to fine-entry setup profiles.
    pub fine_lookback: usize,
    /// Timeframe whose closes drive the HTF bias; `None` means the primary.
    pub bias_timeframe: Option<Timeframe>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            coarse_lookback: 60,
            fine_lookback: 120,
            bias_timeframe: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub profile: ProfileKind,
    pub store: StoreConfig,
    pub aggregation: AggregationConfig,
    pub evaluation: EvaluationConfig,
    pub regime: RegimeConfig,
    pub vwap: VwapConfig,
    pub volume: VolumeConfig,
    pub volatility: VolatilityConfig,
    pub liquidity: LiquidityConfig,
    pub bias: BiasConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup: Option<SetupProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<DecisionProfile>,
}

impl PipelineConfig {
    pub fn with_profile(profile: ProfileKind) -> Self {
        Self {
            profile,
            ..Self::default()
        }
    }

    pub fn effective_setup(&self) -> SetupProfile {
        self.setup.clone().unwrap_or_else(|| self.profile.setup_profile())
    }

    pub fn effective_decision(&self) -> DecisionProfile {
        self.decision.clone().unwrap_or_else(|| self.profile.decision_profile())
    }

    pub fn bias_timeframe(&self) -> Timeframe {
        self.evaluation.bias_timeframe.unwrap_or(self.aggregation.primary)
    }

    /// The same configuration with the profile's choices written out.
    pub fn resolved(&self) -> Self {
        Self {
            setup: Some(self.effective_setup()),
            decision: Some(self.effective_decision()),
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.store.max_len == 0 {
            return invalid("store.max_len must be positive".into());
        }

        let agg = &self.aggregation;
        if agg.timeframes.is_empty() {
            return invalid("aggregation.timeframes is empty".into());
        }
        if let Some(tf) = agg.timeframes.iter().find(|tf| !tf.is_valid()) {
            return invalid(format!("timeframe {tf} does not divide a day"));
        }
        if !agg.timeframes.contains(&agg.primary) {
            return invalid(format!("primary timeframe {} is not in aggregation.timeframes", agg.primary));
        }
        if !agg.timeframes.contains(&self.bias_timeframe()) {
            return invalid(format!(
                "bias timeframe {} is not in aggregation.timeframes",
                self.bias_timeframe()
            ));
        }
        if agg.history_len == 0 {
            return invalid("aggregation.history_len must be positive".into());
        }
        if self.evaluation.coarse_lookback == 0 {
            return invalid("evaluation.coarse_lookback must be positive".into());
        }

        if self.bias.fast_period == 0 || self.bias.fast_period >= self.bias.slow_period {
            return invalid(format!(
                "bias.fast_period {} must be positive and below slow_period {}",
                self.bias.fast_period, self.bias.slow_period
            ));
        }
        if self.volume.low_ratio > self.volume.high_ratio {
            return invalid("volume.low_ratio exceeds high_ratio".into());
        }
        let vol = &self.volatility;
        if vol.low_vol_norm > vol.high_vol_norm {
            return invalid(format!(
                "volatility.low_vol_norm {} exceeds high_vol_norm {}",
                vol.low_vol_norm, vol.high_vol_norm
            ));
        }
        if !(vol.contracting_below < vol.building_below && vol.building_below < vol.expanding_below) {
            return invalid(format!(
                "volatility phase bounds must ascend: contracting {} < building {} < expanding {}",
                vol.contracting_below, vol.building_below, vol.expanding_below
            ));
        }
        if self.vwap.window == Some(0) {
            return invalid("vwap.window must be positive when set".into());
        }

        let setup = self.effective_setup();
        setup.validate().map_err(ConfigError::Invalid)?;
        if self.evaluation.coarse_lookback < setup.min_coarse_bars {
            return invalid(format!(
                "evaluation.coarse_lookback {} is below setup '{}' min_coarse_bars {}",
                self.evaluation.coarse_lookback, setup.name, setup.min_coarse_bars
            ));
        }
        self.effective_decision().validate().map_err(ConfigError::Invalid)?;
        Ok(())
    }

    /// blake3 hex digest of the resolved configuration's JSON form.
    ///
    /// Two configs with the same effective parameters share a fingerprint,
    /// whether the profile tables were written out or not.
    pub fn fingerprint(&self) -> String {
        match serde_json::to_vec(&self.resolved()) {
            Ok(json) => blake3::hash(&json).to_hex().to_string(),
            // Only reachable with non-string map keys, which this tree has none of.
            Err(_) => blake3::hash(format!("{:?}", self.resolved()).as_bytes()).to_hex().to_string(),
        }
    }

    /// Parse and validate.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
