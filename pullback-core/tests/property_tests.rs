//! Property tests for pipeline invariants.
//!
//! Uses proptest to verify:
//! 1. History bound: a store never holds more than `max_len` bars per instrument
//! 2. SR zones: ordered, capped, strength within 1..=5
//! 3. Decisions: score inside the profile range, IGNORE carries no direction,
//!    identical inputs give identical results
//! 4. Aggregation: one close per completed bucket, one bar late
//! 5. VWAP stays inside the sampled price range

use chrono::{Duration, NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use std::collections::BTreeMap;

use pullback_core::aggregate::{AggregationConfig, Timeframe, TimeframeAggregator};
use pullback_core::decision::{DecisionEngine, DecisionInputs, DecisionProfile, DecisionState};
use pullback_core::domain::{Bar, BiasDirection, Direction, Series};
use pullback_core::indicators::{
    analyze_liquidity, compute_sr_levels, LevelKind, LiquidityConfig, NearestLevel, RegimeState, SrConfig,
    VolatilityConfig, VolatilityPhase, VolumeConfig, VolumeState, VwapAccumulator, VwapConfig,
};
use pullback_core::setup::{PullbackSignal, SetupContext, SignalClass};
use pullback_core::store::{BarStore, StoreConfig};

fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 4)
        .unwrap()
        .and_hms_opt(9, 15, 0)
        .unwrap()
}

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (50.0..150.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

/// A random walk of (high, low) pairs.
fn arb_highs_lows(len: std::ops::Range<usize>) -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
    prop::collection::vec((-1.0..1.0_f64, 0.05..1.0_f64), len).prop_map(|steps| {
        let mut mid = 100.0;
        let mut highs = Vec::with_capacity(steps.len());
        let mut lows = Vec::with_capacity(steps.len());
        for (step, half_range) in steps {
            mid = (mid + step).max(10.0);
            highs.push(mid + half_range);
            lows.push(mid - half_range);
        }
        (highs, lows)
    })
}

fn arb_regime() -> impl Strategy<Value = RegimeState> {
    prop_oneof![
        Just(RegimeState::Range),
        Just(RegimeState::Trend),
        Just(RegimeState::StrongTrend),
    ]
}

fn arb_bias() -> impl Strategy<Value = BiasDirection> {
    prop_oneof![
        Just(BiasDirection::Bullish),
        Just(BiasDirection::Bearish),
        Just(BiasDirection::Neutral),
    ]
}

fn arb_signal() -> impl Strategy<Value = Option<PullbackSignal>> {
    prop::option::of(
        (any::<bool>(), any::<bool>(), 0.0..9.0_f64, 0.0..0.03_f64).prop_map(
            |(confirmed, long, score, distance)| {
                let direction = if long { Direction::Long } else { Direction::Short };
                PullbackSignal {
                    class: if confirmed { SignalClass::Confirmed } else { SignalClass::Potential },
                    direction,
                    score: (score * 100.0).round() / 100.0,
                    nearest: NearestLevel {
                        kind: if long { LevelKind::Support } else { LevelKind::Resistance },
                        level: 100.0,
                        distance,
                        strength: 2,
                    },
                    components: BTreeMap::new(),
                    context: SetupContext {
                        volatility: VolatilityPhase::Expanding,
                        volume: VolumeState::Normal,
                        rejection: None,
                    },
                    reason: "prop".into(),
                }
            },
        ),
    )
}

fn coarse_series(closes: &[f64], volume: f64) -> Series {
    Series {
        opens: closes.iter().map(|c| c - 0.1).collect(),
        highs: closes.iter().map(|c| c + 0.5).collect(),
        lows: closes.iter().map(|c| c - 0.5).collect(),
        closes: closes.to_vec(),
        volumes: vec![volume; closes.len()],
    }
}

// ── 1. History bound ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn store_history_is_bounded(max_len in 1usize..50, n in 0usize..200) {
        let store = BarStore::new(StoreConfig { max_len, snapshot_path: None });
        for i in 0..n {
            let c = 100.0 + i as f64;
            store.append("A", Bar::new(t0() + Duration::minutes(i as i64), c, c, c, c, 1.0)).unwrap();
        }
        prop_assert_eq!(store.len("A"), n.min(max_len));
        let bars = store.get_last_n("A", usize::MAX);
        if let Some(last) = bars.last() {
            prop_assert_eq!(last.close, 100.0 + (n - 1) as f64);
        }
        prop_assert!(bars.windows(2).all(|w| w[0].time < w[1].time));
    }
}

// ── 2. SR zones ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn sr_zones_are_ordered_and_capped(
        (highs, lows) in arb_highs_lows(0..300),
        max_levels in 1usize..5,
    ) {
        let config = SrConfig { max_levels, ..SrConfig::default() };
        let levels = compute_sr_levels(&highs, &lows, &config);

        prop_assert!(levels.supports.len() <= max_levels);
        prop_assert!(levels.resistances.len() <= max_levels);
        prop_assert!(levels.supports.windows(2).all(|w| w[0].level <= w[1].level));
        prop_assert!(levels.resistances.windows(2).all(|w| w[0].level >= w[1].level));
        for zone in levels.supports.iter().chain(&levels.resistances) {
            prop_assert!((1..=5).contains(&zone.strength));
            prop_assert!(zone.strength <= zone.count);
        }
    }
}

// ── 3. Decisions ─────────────────────────────────────────────────────

proptest! {
    #[test]
    fn decision_is_bounded_and_deterministic(
        pullback in arb_signal(),
        regime in arb_regime(),
        bias in arb_bias(),
        vwap_price in arb_price(),
        price in arb_price(),
        volume in 0.0..2_000_000.0_f64,
        extended in any::<bool>(),
    ) {
        let profile = if extended { DecisionProfile::extended() } else { DecisionProfile::standard() };
        let engine = DecisionEngine::new(profile.clone(), VolumeConfig::default(), VolatilityConfig::default());

        let mut acc = VwapAccumulator::new(VwapConfig::default());
        acc.update(vwap_price, 1_000.0);
        acc.update(price, 1_000.0);
        let vwap = acc.context(price);

        let closes: Vec<f64> = (0..40).map(|i| price - 2.0 + i as f64 * 0.05).collect();
        let series = coarse_series(&closes, volume);
        let liquidity = analyze_liquidity(&series.volumes, &LiquidityConfig::default());

        let inputs = DecisionInputs {
            pullback: pullback.as_ref(),
            regime,
            bias,
            vwap: &vwap,
            liquidity: &liquidity,
            series: &series,
        };
        let first = engine.decide(&inputs);
        let second = engine.decide(&inputs);
        prop_assert_eq!(&first, &second);

        prop_assert!(first.score >= profile.min_score && first.score <= profile.max_score);
        prop_assert_eq!((first.score * 100.0).round() / 100.0, first.score);
        match first.state {
            DecisionState::Ignore => prop_assert!(first.direction.is_none()),
            _ => {
                let signal = pullback.as_ref().unwrap();
                prop_assert_eq!(first.direction, Some(signal.direction));
                prop_assert!(first.score >= profile.prepare_threshold || signal.class == SignalClass::Potential);
            }
        }
        if first.state.is_execute() {
            prop_assert!(first.score >= profile.execute_threshold);
            prop_assert_eq!(bias, pullback.as_ref().unwrap().direction.required_bias());
            prop_assert_ne!(regime, RegimeState::Range);
        }
    }
}

// ── 4. Aggregation ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn aggregator_closes_once_per_bucket(n in 1usize..200, minutes in prop_oneof![Just(1u32), Just(3u32), Just(5u32), Just(15u32)]) {
        let timeframe = Timeframe::from_minutes(minutes);
        let aggregator = TimeframeAggregator::new(AggregationConfig {
            timeframes: vec![timeframe],
            primary: timeframe,
            history_len: 1_000,
        });

        let mut closes = 0;
        for i in 0..n {
            let bar = Bar::new(t0() + Duration::minutes(i as i64), 100.0, 101.0, 99.0, 100.0, 10.0);
            if aggregator.update("A", &bar) {
                closes += 1;
            }
        }

        // 09:15 is aligned to every tested width.
        let expected = (n - 1) / minutes as usize;
        prop_assert_eq!(closes, expected);
        let history = aggregator.history("A", timeframe, usize::MAX);
        prop_assert_eq!(history.len(), expected);
        for candle in &history {
            prop_assert_eq!(candle.volume, 10.0 * minutes as f64);
        }
    }
}

// ── 5. VWAP ──────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn vwap_stays_within_sampled_prices(
        samples in prop::collection::vec((arb_price(), 1.0..10_000.0_f64), 1..100),
    ) {
        let mut acc = VwapAccumulator::new(VwapConfig::default());
        for &(price, volume) in &samples {
            acc.update(price, volume);
        }
        let lo = samples.iter().map(|s| s.0).fold(f64::INFINITY, f64::min);
        let hi = samples.iter().map(|s| s.0).fold(f64::NEG_INFINITY, f64::max);
        let vwap = acc.value().unwrap();
        prop_assert!(vwap >= lo - 1e-9 && vwap <= hi + 1e-9);
    }
}
