//! Setup profiles: named weight and threshold sets for the detector.
//!
//! - `structural`: everything on the coarse series. Location proportional to
//!   proximity, fixed confirmation weights, CONFIRMED at 4.8 and POTENTIAL at 3.2.
//! - `continuation`: structure from the coarse series, timing from the 1-minute
//!   series. Tighter extension guard, volume gate, CONFIRMED only at 5.5.

use serde::{Deserialize, Serialize};

use crate::indicators::SrConfig;

/// Which series supplies price, ATR, rejection and volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySeries {
    Coarse,
    Fine,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LocationScoring {
    /// `max(0, (max_proximity - distance) / max_proximity) * scale`
    Proportional { scale: f64 },
    /// `min(cap, max(0, (max_proximity - distance) * slope))`
    Linear { slope: f64, cap: f64 },
}

impl LocationScoring {
    pub fn score(&self, distance: f64, max_proximity: f64) -> f64 {
        let room = (max_proximity - distance).max(0.0);
        match *self {
            Self::Proportional { scale } if max_proximity > 0.0 => room / max_proximity * scale,
            Self::Proportional { .. } => 0.0,
            Self::Linear { slope, cap } => (room * slope).min(cap),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum VolumeScoring {
    /// `weight` when the volume score clears the floor, else 0.
    Fixed { weight: f64 },
    /// The volume score itself, capped.
    Capped { cap: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum VolatilityScoring {
    /// `expanding` in the EXPANDING phase, `other` otherwise.
    Tiered { expanding: f64, other: f64 },
    /// The phase score itself, capped.
    Capped { cap: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetupWeights {
    pub location: LocationScoring,
    /// Added when the last bar rejects in the trade direction.
    pub rejection: f64,
    pub volume: VolumeScoring,
    pub volatility: VolatilityScoring,
    /// Added on a directional resume; `None` drops the component.
    #[serde(default)]
    pub reaction: Option<f64>,
}

/// Fields missing from a config file take the structural defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupProfile {
    pub name: String,
    pub entry: EntrySeries,
    /// Minimum bars on the entry series.
    pub min_bars: usize,
    /// Minimum bars on the coarse series.
    pub min_coarse_bars: usize,
    pub sr: SrConfig,
    /// Nearest-level search bound (0.03 = 3%).
    pub max_proximity: f64,
    pub atr_period: usize,
    /// Bars back for the overextension guard.
    pub extension_lookback: usize,
    /// Displacement beyond this many ATRs is a chase, not a pullback.
    pub extension_atr_mult: f64,
    /// Bars back for the directional resume check.
    pub resume_lookback: usize,
    pub volume_floor: f64,
    /// Reject outright when the volume score is under the floor.
    pub volume_gates: bool,
    pub weights: SetupWeights,
    pub confirm_threshold: f64,
    /// `None` (or a missing key) means CONFIRMED only.
    #[serde(default)]
    pub potential_threshold: Option<f64>,
}

impl SetupProfile {
    pub fn structural() -> Self {
        Self {
            name: "structural".to_string(),
            entry: EntrySeries::Coarse,
            min_bars: 30,
            min_coarse_bars: 30,
            sr: SrConfig {
                lookback: 240,
                ..SrConfig::default()
            },
            max_proximity: 0.03,
            atr_period: 14,
            extension_lookback: 5,
            extension_atr_mult: 2.2,
            resume_lookback: 2,
            volume_floor: 0.3,
            volume_gates: false,
            weights: SetupWeights {
                location: LocationScoring::Proportional { scale: 2.0 },
                rejection: 1.2,
                volume: VolumeScoring::Fixed { weight: 0.8 },
                volatility: VolatilityScoring::Tiered {
                    expanding: 1.0,
                    other: 0.4,
                },
                reaction: Some(0.6),
            },
            confirm_threshold: 4.8,
            potential_threshold: Some(3.2),
        }
    }

    pub fn continuation() -> Self {
        Self {
            name: "continuation".to_string(),
            entry: EntrySeries::Fine,
            min_bars: 40,
            min_coarse_bars: 20,
            sr: SrConfig::default(),
            max_proximity: 0.025,
            atr_period: 14,
            extension_lookback: 7,
            extension_atr_mult: 1.4,
            resume_lookback: 2,
            volume_floor: 0.8,
            volume_gates: true,
            weights: SetupWeights {
                location: LocationScoring::Linear { slope: 80.0, cap: 3.0 },
                rejection: 2.0,
                volume: VolumeScoring::Capped { cap: 2.0 },
                volatility: VolatilityScoring::Capped { cap: 1.5 },
                reaction: None,
            },
            confirm_threshold: 5.5,
            potential_threshold: None,
        }
    }

    /// Threshold ordering problems, if any.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_proximity <= 0.0 {
            return Err(format!("setup '{}': max_proximity must be positive", self.name));
        }
        if let Some(potential) = self.potential_threshold {
            if potential > self.confirm_threshold {
                return Err(format!(
                    "setup '{}': potential_threshold {potential} exceeds confirm_threshold {}",
                    self.name, self.confirm_threshold
                ));
            }
        }
        if self.min_bars <= self.extension_lookback.max(self.resume_lookback) {
            return Err(format!(
                "setup '{}': min_bars must exceed the extension and resume lookbacks",
                self.name
            ));
        }
        Ok(())
    }
}

impl Default for SetupProfile {
    fn default() -> Self {
        Self::structural()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn builtin_profiles_are_valid() {
        assert!(SetupProfile::structural().validate().is_ok());
        assert!(SetupProfile::continuation().validate().is_ok());
    }

    #[test]
    fn location_scoring_modes() {
        let proportional = LocationScoring::Proportional { scale: 2.0 };
        assert_approx(proportional.score(0.015, 0.03), 1.0, DEFAULT_EPSILON);
        assert_eq!(proportional.score(0.05, 0.03), 0.0);

        let linear = LocationScoring::Linear { slope: 80.0, cap: 3.0 };
        assert_approx(linear.score(0.02, 0.025), 0.4, 1e-9);
        assert_eq!(linear.score(0.0, 0.25), 3.0);
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let mut profile = SetupProfile::structural();
        profile.potential_threshold = Some(6.0);
        assert!(profile.validate().is_err());
    }

    #[test]
    fn profile_round_trips_through_toml() {
        let profile = SetupProfile::continuation();
        let text = toml::to_string(&profile).unwrap();
        let back: SetupProfile = toml::from_str(&text).unwrap();
        assert_eq!(back, profile);
    }

    #[test]
    fn missing_potential_threshold_means_confirmed_only() {
        let back: SetupProfile = toml::from_str(
            r#"
            name = "custom"
            confirm_threshold = 5.0
            "#,
        )
        .unwrap();
        assert_eq!(back.potential_threshold, None);
        assert_eq!(back.min_bars, SetupProfile::structural().min_bars);
    }
}
