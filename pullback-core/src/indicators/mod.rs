//! Indicator library.
//!
//! Every function here is pure: it takes explicit slices (oldest first) and
//! returns either a value or an explicit "unavailable" result (`None`, or a
//! context whose label says so) when history is too short. Nothing panics on
//! short input.
//!
//! The only stateful piece is [`VwapAccumulator`], which the orchestrator owns
//! one of per instrument.

pub mod adx;
pub mod atr;
pub mod bias;
pub mod liquidity;
pub mod price_action;
pub mod regime;
pub mod sma;
pub mod sr;
pub mod volatility;
pub mod volume;
pub mod vwap;

pub use adx::adx;
pub use atr::{atr, true_range, DEFAULT_ATR_PERIOD};
pub use bias::{htf_bias, BiasConfig, HtfBias};
pub use liquidity::{analyze_liquidity, LiquidityConfig, LiquidityContext, LiquidityState};
pub use price_action::{
    price_action_context, rejection_info, PriceActionContext, RejectionInfo, RejectionKind,
};
pub use regime::{detect_regime, RegimeConfig, RegimeResult, RegimeState};
pub use sma::{sma, trailing_mean};
pub use sr::{
    compute_sr_levels, nearest_level, simple_sr, sr_location_score, LevelKind, NearestLevel,
    SrConfig, SrLevels, SrZone,
};
pub use volatility::{
    analyze_volatility, volatility_phase, VolatilityConfig, VolatilityContext, VolatilityPhase,
    VolatilityState,
};
pub use volume::{analyze_volume, VolumeConfig, VolumeContext, VolumeState};
pub use vwap::{VwapAcceptance, VwapAccumulator, VwapConfig, VwapContext, VwapPressure};

/// Round half away from zero to `decimals` places.
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

/// Fifteen bars (period 14 + 1) of a choppy climb from 10.2 to 12.3.
#[cfg(test)]
pub const FIXTURE_HIGHS: [f64; 15] = [
    10.5, 11.0, 11.2, 10.9, 11.4, 11.8, 11.6, 12.0, 12.3, 12.1, 12.6, 12.4, 12.9, 13.1, 12.8,
];
#[cfg(test)]
pub const FIXTURE_LOWS: [f64; 15] = [
    9.8, 10.2, 10.6, 10.3, 10.7, 11.1, 11.0, 11.3, 11.7, 11.5, 11.9, 11.8, 12.2, 12.5, 12.1,
];
#[cfg(test)]
pub const FIXTURE_CLOSES: [f64; 15] = [
    10.2, 10.8, 10.9, 10.5, 11.2, 11.5, 11.3, 11.9, 12.0, 11.8, 12.4, 12.0, 12.7, 12.8, 12.3,
];
