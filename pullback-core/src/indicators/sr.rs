//! Support & resistance zones.
//!
//! 1. Local extrema over a centered window (a point is a local max/min iff it
//!    is >= / <= every point in the half-window on each side)
//! 2. Same-type extrema clustered when within `cluster_tolerance` of the
//!    running cluster mean
//! 3. Zone strength = min(member count, 5)
//! 4. The `max_levels` zones closest to the latest bar's midpoint are kept:
//!    supports ascending, resistances descending

use serde::{Deserialize, Serialize};

use crate::domain::Direction;
use crate::indicators::round_to;

/// Strength saturates at this many cluster members.
pub const MAX_ZONE_STRENGTH: usize = 5;

/// SR computation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SrConfig {
    /// Bars considered, counted back from the latest.
    pub lookback: usize,
    /// Centered extrema window width.
    pub extrema_window: usize,
    /// Fractional tolerance around the running cluster mean (0.0045 = 0.45%).
    pub cluster_tolerance: f64,
    pub max_levels: usize,
}

impl Default for SrConfig {
    fn default() -> Self {
        Self {
            lookback: 225,
            extrema_window: 9,
            cluster_tolerance: 0.0045,
            max_levels: 3,
        }
    }
}

/// A clustered price level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SrZone {
    pub level: f64,
    pub count: usize,
    pub strength: usize,
}

/// Supports ascending, resistances descending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SrLevels {
    pub supports: Vec<SrZone>,
    pub resistances: Vec<SrZone>,
}

impl SrLevels {
    pub fn is_empty(&self) -> bool {
        self.supports.is_empty() && self.resistances.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LevelKind {
    Support,
    Resistance,
}

impl LevelKind {
    /// The trade direction this level favours.
    pub fn favoured_direction(&self) -> Direction {
        match self {
            Self::Support => Direction::Long,
            Self::Resistance => Direction::Short,
        }
    }
}

/// Closest zone to a price, as found by [`nearest_level`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NearestLevel {
    pub kind: LevelKind,
    pub level: f64,
    /// Fractional distance (0.01 = 1%).
    pub distance: f64,
    pub strength: usize,
}

/// Indices and values of local maxima and minima.
pub fn local_extrema(values: &[f64], window: usize) -> (Vec<(usize, f64)>, Vec<(usize, f64)>) {
    let n = values.len();
    let mut maxima = Vec::new();
    let mut minima = Vec::new();

    if window == 0 || n < window * 2 + 1 {
        return (maxima, minima);
    }

    let half = window / 2;

    for i in half..n - half {
        let center = values[i];
        let neighbours = values[i - half..i].iter().chain(&values[i + 1..=i + half]);

        let (mut is_max, mut is_min) = (true, true);
        for &x in neighbours {
            is_max &= center >= x;
            is_min &= center <= x;
        }

        if is_max {
            maxima.push((i, center));
        }
        if is_min {
            minima.push((i, center));
        }
    }

    (maxima, minima)
}

/// Cluster peak values into zones, ordered by level ascending.
pub fn cluster_levels(peaks: &[f64], tolerance: f64) -> Vec<SrZone> {
    if peaks.is_empty() {
        return Vec::new();
    }

    let mut sorted = peaks.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut clusters: Vec<Vec<f64>> = Vec::new();
    let mut current = vec![sorted[0]];

    for &p in &sorted[1..] {
        let avg = current.iter().sum::<f64>() / current.len() as f64;
        if (p - avg).abs() <= avg * tolerance {
            current.push(p);
        } else {
            clusters.push(std::mem::replace(&mut current, vec![p]));
        }
    }
    clusters.push(current);

    clusters
        .into_iter()
        .map(|members| {
            let level = members.iter().sum::<f64>() / members.len() as f64;
            SrZone {
                level: round_to(level, 6),
                count: members.len(),
                strength: members.len().min(MAX_ZONE_STRENGTH),
            }
        })
        .collect()
}

/// Structural SR zones over the last `lookback` bars.
pub fn compute_sr_levels(highs: &[f64], lows: &[f64], config: &SrConfig) -> SrLevels {
    let highs = tail(highs, config.lookback);
    let lows = tail(lows, config.lookback);

    if highs.is_empty() || lows.is_empty() {
        return SrLevels::default();
    }

    let (maxima, _) = local_extrema(highs, config.extrema_window);
    let (_, minima) = local_extrema(lows, config.extrema_window);

    let resistance_peaks: Vec<f64> = maxima.into_iter().map(|(_, v)| v).collect();
    let support_peaks: Vec<f64> = minima.into_iter().map(|(_, v)| v).collect();

    let mut resistances = cluster_levels(&resistance_peaks, config.cluster_tolerance);
    let mut supports = cluster_levels(&support_peaks, config.cluster_tolerance);

    // Midpoint of the latest bar.
    let reference = (highs[highs.len() - 1] + lows[lows.len() - 1]) / 2.0;

    keep_closest(&mut supports, reference, config.max_levels);
    keep_closest(&mut resistances, reference, config.max_levels);

    supports.sort_by(|a, b| a.level.total_cmp(&b.level));
    resistances.sort_by(|a, b| b.level.total_cmp(&a.level));

    SrLevels { supports, resistances }
}

fn keep_closest(zones: &mut Vec<SrZone>, reference: f64, max_levels: usize) {
    zones.sort_by(|a, b| (a.level - reference).abs().total_cmp(&(b.level - reference).abs()));
    zones.truncate(max_levels);
}

fn tail(values: &[f64], lookback: usize) -> &[f64] {
    &values[values.len().saturating_sub(lookback)..]
}

/// Fallback levels: lowest low and highest high over `lookback` bars.
pub fn simple_sr(highs: &[f64], lows: &[f64], lookback: usize) -> Option<(f64, f64)> {
    let highs = tail(highs, lookback);
    let lows = tail(lows, lookback);
    if highs.is_empty() || lows.is_empty() {
        return None;
    }
    let support = lows.iter().copied().fold(f64::INFINITY, f64::min);
    let resistance = highs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some((support, resistance))
}

/// Nearest zone to `price` within `max_search` fractional distance.
///
/// Support distance is measured relative to the level, resistance distance
/// relative to the price. On ties the support wins.
pub fn nearest_level(price: f64, levels: &SrLevels, max_search: f64) -> Option<NearestLevel> {
    let supports = levels.supports.iter().map(|z| NearestLevel {
        kind: LevelKind::Support,
        level: z.level,
        distance: (price - z.level).abs() / z.level.max(1e-9),
        strength: z.strength,
    });
    let resistances = levels.resistances.iter().map(|z| NearestLevel {
        kind: LevelKind::Resistance,
        level: z.level,
        distance: (z.level - price).abs() / price.max(1e-9),
        strength: z.strength,
    });

    let mut best: Option<NearestLevel> = None;
    for candidate in supports.chain(resistances) {
        if best.map_or(true, |b| candidate.distance < b.distance) {
            best = Some(candidate);
        }
    }

    best.filter(|b| b.distance <= max_search)
}

/// Signed location quality in [-1, 1].
///
/// Positive when the level favours `direction` (support for longs, resistance
/// for shorts), negative when it opposes it. Magnitude is proximity within
/// `proximity_threshold` times a strength factor `min(1.6, 0.7 + 0.18 * strength)`.
pub fn sr_location_score(
    nearest: Option<&NearestLevel>,
    direction: Direction,
    proximity_threshold: f64,
) -> f64 {
    let Some(nearest) = nearest else {
        return 0.0;
    };
    if proximity_threshold <= 0.0 || nearest.distance > proximity_threshold {
        return 0.0;
    }

    let closeness = (proximity_threshold - nearest.distance) / proximity_threshold;
    let strength_factor = (0.7 + 0.18 * nearest.strength as f64).min(1.6);
    let sign = if nearest.kind.favoured_direction() == direction {
        1.0
    } else {
        -1.0
    };

    round_to((sign * closeness * strength_factor).clamp(-1.0, 1.0), 3)
}
