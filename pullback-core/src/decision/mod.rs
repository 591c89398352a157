//! Decision engine: fuses a setup with regime, bias, VWAP and liquidity into
//! one classified, bounded decision.

pub mod engine;
pub mod profile;

pub use engine::{DecisionEngine, DecisionInputs};
pub use profile::{DecisionProfile, ExtendedWeights};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionState {
    Ignore,
    PrepareLong,
    PrepareShort,
    ExecuteLong,
    ExecuteShort,
}

impl DecisionState {
    pub fn prepare(direction: Direction) -> Self {
        match direction {
            Direction::Long => Self::PrepareLong,
            Direction::Short => Self::PrepareShort,
        }
    }

    pub fn execute(direction: Direction) -> Self {
        match direction {
            Direction::Long => Self::ExecuteLong,
            Direction::Short => Self::ExecuteShort,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ignore => "IGNORE",
            Self::PrepareLong => "PREPARE_LONG",
            Self::PrepareShort => "PREPARE_SHORT",
            Self::ExecuteLong => "EXECUTE_LONG",
            Self::ExecuteShort => "EXECUTE_SHORT",
        }
    }

    /// Anything but IGNORE.
    pub fn is_actionable(&self) -> bool {
        !matches!(self, Self::Ignore)
    }

    pub fn is_execute(&self) -> bool {
        matches!(self, Self::ExecuteLong | Self::ExecuteShort)
    }
}

impl fmt::Display for DecisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical score components. The extended profile adds the last four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreComponent {
    Pullback,
    Htf,
    Regime,
    Vwap,
    Liquidity,
    Volume,
    Volatility,
    PriceAction,
    SrLocation,
}

/// Output contract to the execution collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResult {
    pub state: DecisionState,
    /// Clamped to the profile range, 2 decimals.
    pub score: f64,
    pub direction: Option<Direction>,
    pub components: BTreeMap<ScoreComponent, f64>,
    /// Diagnostic labels layered on by the orchestrator (`regime`, `htf_bias`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    pub reason: String,
}

impl DecisionResult {
    pub fn ignore(reason: impl Into<String>) -> Self {
        Self {
            state: DecisionState::Ignore,
            score: 0.0,
            direction: None,
            components: BTreeMap::new(),
            labels: BTreeMap::new(),
            reason: reason.into(),
        }
    }

    pub fn with_label(mut self, key: &str, value: impl Into<String>) -> Self {
        self.labels.insert(key.to_string(), value.into());
        self
    }
}
