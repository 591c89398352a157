//! Pullback setup detection.
//!
//! A setup is price sitting near a structural level that agrees with the
//! higher-timeframe bias, not overextended, in a live volatility phase, with
//! a rejection wick or a directional resume to confirm it.

pub mod detector;
pub mod profile;

pub use detector::SetupDetector;
pub use profile::{EntrySeries, LocationScoring, SetupProfile, SetupWeights, VolatilityScoring, VolumeScoring};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::Direction;
use crate::indicators::{NearestLevel, RejectionKind, VolatilityPhase, VolumeState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalClass {
    Confirmed,
    Potential,
}

impl SignalClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "CONFIRMED",
            Self::Potential => "POTENTIAL",
        }
    }
}

impl fmt::Display for SignalClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named parts of a setup score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupComponent {
    Location,
    Rejection,
    Volume,
    Volatility,
    Reaction,
}

/// Diagnostic labels carried with a signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetupContext {
    pub volatility: VolatilityPhase,
    pub volume: VolumeState,
    pub rejection: Option<RejectionKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullbackSignal {
    pub class: SignalClass,
    pub direction: Direction,
    /// Sum of components, 2 decimals.
    pub score: f64,
    pub nearest: NearestLevel,
    pub components: BTreeMap<SetupComponent, f64>,
    pub context: SetupContext,
    pub reason: String,
}

impl PullbackSignal {
    pub fn is_confirmed(&self) -> bool {
        self.class == SignalClass::Confirmed
    }
}
