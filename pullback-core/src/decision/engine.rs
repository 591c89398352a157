//! The decision formula.
//!
//! Sequential gates; a failed gate returns IGNORE with score 0 and no
//! direction:
//! 1. no pullback signal
//! 2. POTENTIAL signal → PREPARE on the pullback score alone
//! 3. bias must match direction (+ HTF bonus)
//! 4. RANGE regime rejects (+ TREND / STRONG_TREND bonus)
//! 5. VWAP on the wrong side rejects (+ non-negative share of VWAP score)
//! 6. negative liquidity rejects (+ capped share of liquidity score)
//! 7. extended profile: volume floor, volatility phase, price action, SR location
//!
//! The sum is clamped to the profile range, rounded to 2 decimals and then
//! classified. The result depends on the inputs and the profile only.

use std::collections::BTreeMap;

use super::profile::{DecisionProfile, ExtendedWeights};
use super::{DecisionResult, DecisionState, ScoreComponent};
use crate::domain::{BiasDirection, Direction, Series};
use crate::indicators::{
    analyze_volume, atr, price_action_context, round_to, sr_location_score, volatility_phase, LiquidityContext,
    RegimeState, VolatilityConfig, VolumeConfig, VwapAcceptance, VwapContext,
};
use crate::setup::{PullbackSignal, SignalClass};

/// Everything one evaluation looks at.
#[derive(Debug, Clone, Copy)]
pub struct DecisionInputs<'a> {
    pub pullback: Option<&'a PullbackSignal>,
    pub regime: RegimeState,
    pub bias: BiasDirection,
    pub vwap: &'a VwapContext,
    pub liquidity: &'a LiquidityContext,
    /// Coarse series; read by the extended profile only.
    pub series: &'a Series,
}

#[derive(Debug, Clone, Default)]
pub struct DecisionEngine {
    profile: DecisionProfile,
    volume: VolumeConfig,
    volatility: VolatilityConfig,
}

impl DecisionEngine {
    pub fn new(profile: DecisionProfile, volume: VolumeConfig, volatility: VolatilityConfig) -> Self {
        Self {
            profile,
            volume,
            volatility,
        }
    }

    pub fn profile(&self) -> &DecisionProfile {
        &self.profile
    }

    fn bound(&self, score: f64) -> f64 {
        round_to(score.clamp(self.profile.min_score, self.profile.max_score), 2)
    }

    pub fn decide(&self, inputs: &DecisionInputs<'_>) -> DecisionResult {
        let p = &self.profile;

        let Some(pullback) = inputs.pullback else {
            return DecisionResult::ignore("no pullback");
        };
        let direction = pullback.direction;

        if pullback.class == SignalClass::Potential {
            let score = self.bound(pullback.score);
            return DecisionResult {
                state: DecisionState::prepare(direction),
                score,
                direction: Some(direction),
                components: BTreeMap::from([(ScoreComponent::Pullback, score)]),
                labels: BTreeMap::new(),
                reason: "potential pullback".to_string(),
            };
        }

        let mut components = BTreeMap::new();
        let mut score = pullback.score;
        components.insert(ScoreComponent::Pullback, pullback.score);

        if inputs.bias != direction.required_bias() {
            return DecisionResult::ignore("htf mismatch");
        }
        score += p.htf_bonus;
        components.insert(ScoreComponent::Htf, p.htf_bonus);

        let regime_bonus = match inputs.regime {
            RegimeState::Range => return DecisionResult::ignore("bad regime"),
            RegimeState::Trend => p.trend_bonus,
            RegimeState::StrongTrend => p.strong_trend_bonus,
        };
        score += regime_bonus;
        components.insert(ScoreComponent::Regime, regime_bonus);

        match (direction, inputs.vwap.acceptance) {
            (Direction::Long, VwapAcceptance::Below) => return DecisionResult::ignore("below vwap"),
            (Direction::Short, VwapAcceptance::Above) => return DecisionResult::ignore("above vwap"),
            _ => {}
        }
        let vwap_add = (inputs.vwap.score * p.vwap_weight).max(0.0);
        score += vwap_add;
        components.insert(ScoreComponent::Vwap, round_to(vwap_add, 2));

        if inputs.liquidity.score < 0.0 {
            return DecisionResult::ignore("illiquid");
        }
        let liquidity_add = (inputs.liquidity.score * p.liquidity_weight).min(p.liquidity_cap);
        score += liquidity_add;
        components.insert(ScoreComponent::Liquidity, round_to(liquidity_add, 2));

        if let Some(ext) = &p.extended {
            match self.extended_components(ext, pullback, inputs.series) {
                Ok(extra) => {
                    for (component, value) in extra {
                        score += value;
                        components.insert(component, round_to(value, 3));
                    }
                }
                Err(reason) => return DecisionResult::ignore(reason),
            }
        }

        let score = self.bound(score);

        let (state, reason) = if score >= p.execute_threshold {
            (DecisionState::execute(direction), "confirmed pullback")
        } else if score >= p.prepare_threshold {
            (DecisionState::prepare(direction), "developing pullback")
        } else {
            (DecisionState::Ignore, "weak setup")
        };

        DecisionResult {
            state,
            score,
            direction: state.is_actionable().then_some(direction),
            components,
            labels: BTreeMap::new(),
            reason: reason.to_string(),
        }
    }

    fn extended_components(
        &self,
        ext: &ExtendedWeights,
        pullback: &PullbackSignal,
        series: &Series,
    ) -> Result<Vec<(ScoreComponent, f64)>, &'static str> {
        let direction = pullback.direction;

        let volume = analyze_volume(&series.volumes, &self.volume);
        if volume.score < ext.volume_floor {
            return Err("weak volume");
        }

        let closes = &series.closes;
        let current_move = match closes.len() {
            n if n >= 2 => closes[n - 1] - closes[n - 2],
            _ => 0.0,
        };
        let atr_value = atr(&series.highs, &series.lows, closes, self.volatility.atr_period);
        let phase = volatility_phase(current_move, atr_value, &self.volatility);
        if phase.rejects_setup() {
            return Err("volatility phase");
        }

        let price_action = price_action_context(&series.opens, &series.highs, &series.lows, closes);
        let location = sr_location_score(Some(&pullback.nearest), direction, ext.sr_proximity);

        Ok(vec![
            (ScoreComponent::Volume, volume.score * ext.volume_weight),
            (ScoreComponent::Volatility, phase.score() * ext.volatility_weight),
            (
                ScoreComponent::PriceAction,
                price_action.score * direction.sign() * ext.price_action_weight,
            ),
            (ScoreComponent::SrLocation, location * ext.sr_location_weight),
        ])
    }
}
