//! The setup detector.
//!
//! Steps, each an early `None`:
//! 1. enough bars on the coarse and entry series
//! 2. nearest SR zone within `max_proximity`, aligned with the bias
//!    (support + BULLISH → LONG, resistance + BEARISH → SHORT)
//! 3. ATR available and the move over `extension_lookback` bars within
//!    `extension_atr_mult` ATRs
//! 4. volatility phase not CONTRACTING / EXHAUSTION
//! 5. rejection wick in the trade direction OR a directional resume
//! 6. volume gate (profiles with `volume_gates`)
//!
//! Then components are summed and classified against the profile thresholds.

use std::collections::BTreeMap;

use super::profile::{EntrySeries, SetupProfile, VolatilityScoring, VolumeScoring};
use super::{PullbackSignal, SetupComponent, SetupContext, SignalClass};
use crate::domain::{BiasDirection, Direction, Series};
use crate::indicators::{
    analyze_volume, atr, compute_sr_levels, nearest_level, rejection_info, round_to, volatility_phase,
    LevelKind, VolatilityConfig, VolatilityPhase, VolumeConfig,
};

#[derive(Debug, Clone, Default)]
pub struct SetupDetector {
    profile: SetupProfile,
    volume: VolumeConfig,
    volatility: VolatilityConfig,
}

impl SetupDetector {
    pub fn new(profile: SetupProfile, volume: VolumeConfig, volatility: VolatilityConfig) -> Self {
        Self {
            profile,
            volume,
            volatility,
        }
    }

    pub fn profile(&self) -> &SetupProfile {
        &self.profile
    }

    /// Look for a setup.
    ///
    /// `coarse` supplies the structure (SR zones). `fine` is the 1-minute
    /// series, required only by profiles with a fine entry series.
    pub fn detect(&self, coarse: &Series, fine: Option<&Series>, bias: BiasDirection) -> Option<PullbackSignal> {
        let p = &self.profile;

        if coarse.len() < p.min_coarse_bars {
            return None;
        }
        let entry = match p.entry {
            EntrySeries::Coarse => coarse,
            EntrySeries::Fine => fine?,
        };
        let lookback = p.extension_lookback.max(p.resume_lookback).max(1);
        if entry.len() < p.min_bars || entry.len() <= lookback {
            return None;
        }

        let closes = &entry.closes;
        let n = closes.len();
        let price = closes[n - 1];

        // Location and alignment
        let levels = compute_sr_levels(&coarse.highs, &coarse.lows, &p.sr);
        let nearest = nearest_level(price, &levels, p.max_proximity)?;
        let direction = match (nearest.kind, bias) {
            (LevelKind::Support, BiasDirection::Bullish) => Direction::Long,
            (LevelKind::Resistance, BiasDirection::Bearish) => Direction::Short,
            _ => return None,
        };

        // Overextension
        let atr_value = atr(&entry.highs, &entry.lows, closes, p.atr_period).filter(|a| *a > 0.0)?;
        let swing = (price - closes[n - 1 - p.extension_lookback]).abs();
        if swing > atr_value * p.extension_atr_mult {
            return None;
        }

        // Volatility phase
        let phase = volatility_phase(price - closes[n - 2], Some(atr_value), &self.volatility);
        if phase.rejects_setup() {
            return None;
        }

        // Confirmation: previous close stands in for the open
        let rejection = rejection_info(closes[n - 2], entry.highs[n - 1], entry.lows[n - 1], price);
        let rejection_ok = rejection.kind.is_some_and(|k| k.confirms(direction));
        let resume_ok = (price - closes[n - 1 - p.resume_lookback]) * direction.sign() > 0.0;
        if !(rejection_ok || resume_ok) {
            return None;
        }

        // Participation
        let volume = analyze_volume(&entry.volumes, &self.volume);
        let volume_ok = volume.score >= p.volume_floor;
        if p.volume_gates && !volume_ok {
            return None;
        }

        let mut components = BTreeMap::new();
        components.insert(
            SetupComponent::Location,
            round_to(p.weights.location.score(nearest.distance, p.max_proximity), 2),
        );
        components.insert(
            SetupComponent::Rejection,
            if rejection_ok { p.weights.rejection } else { 0.0 },
        );
        components.insert(
            SetupComponent::Volume,
            match p.weights.volume {
                VolumeScoring::Fixed { weight } if volume_ok => weight,
                VolumeScoring::Fixed { .. } => 0.0,
                VolumeScoring::Capped { cap } => volume.score.min(cap),
            },
        );
        components.insert(
            SetupComponent::Volatility,
            match p.weights.volatility {
                VolatilityScoring::Tiered { expanding, .. } if phase == VolatilityPhase::Expanding => expanding,
                VolatilityScoring::Tiered { other, .. } => other,
                VolatilityScoring::Capped { cap } => phase.score().min(cap),
            },
        );
        if let Some(reaction) = p.weights.reaction {
            components.insert(SetupComponent::Reaction, if resume_ok { reaction } else { 0.0 });
        }

        let score = round_to(components.values().sum(), 2);
        let class = if score >= p.confirm_threshold {
            SignalClass::Confirmed
        } else if p.potential_threshold.is_some_and(|t| score >= t) {
            SignalClass::Potential
        } else {
            tracing::trace!(score, profile = %p.name, "setup below threshold");
            return None;
        };

        Some(PullbackSignal {
            class,
            direction,
            score,
            nearest,
            components,
            context: SetupContext {
                volatility: phase,
                volume: volume.state,
                rejection: rejection.kind,
            },
            reason: format!("{}_{}_{}", p.name.to_ascii_uppercase(), class, direction),
        })
    }
}
