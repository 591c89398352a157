//! ADX: simplified Average Directional Index.
//!
//! Steps:
//! 1. Compute +DM and -DM from consecutive bars (gated: a move only counts
//!    when it is positive and beats the opposite move)
//! 2. Sum the last `period` values of each
//! 3. +DI = 100 * sum(+DM) / ATR, -DI = 100 * sum(-DM) / ATR
//! 4. ADX = 100 * |+DI - -DI| / (+DI + -DI)
//!
//! There is no Wilder smoothing: the regime thresholds were tuned against this
//! single-window form, so it must not be swapped for the textbook indicator.

use crate::indicators::atr::atr;

/// Directional movement series, one element per bar after the first.
pub fn directional_movement(highs: &[f64], lows: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let n = highs.len().min(lows.len());
    let mut plus_dm = Vec::with_capacity(n.saturating_sub(1));
    let mut minus_dm = Vec::with_capacity(n.saturating_sub(1));

    for i in 1..n {
        let up = highs[i] - highs[i - 1];
        let down = lows[i - 1] - lows[i];

        plus_dm.push(if up > down && up > 0.0 { up } else { 0.0 });
        minus_dm.push(if down > up && down > 0.0 { down } else { 0.0 });
    }

    (plus_dm, minus_dm)
}

/// Simplified ADX over the last `period` bars.
///
/// `None` below `period + 1` bars or when ATR is zero.
pub fn adx(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || highs.len() < period + 1 {
        return None;
    }

    let (plus_dm, minus_dm) = directional_movement(highs, lows);

    let atr_value = atr(highs, lows, closes, period)?;
    if atr_value == 0.0 {
        return None;
    }

    let tail = |series: &[f64]| -> f64 { series[series.len().saturating_sub(period)..].iter().sum() };

    let plus_di = tail(&plus_dm) / atr_value * 100.0;
    let minus_di = tail(&minus_dm) / atr_value * 100.0;
    let di_sum = plus_di + minus_di;

    if di_sum == 0.0 {
        return Some(0.0);
    }

    Some((plus_di - minus_di).abs() / di_sum * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn directional_movement_gating() {
        // bar1: up 2, down -1 → +DM 2
        // bar2: up -3, down 4 → -DM 4
        // bar3: up 1, down 1 → neither dominates
        let highs = [10.0, 12.0, 9.0, 10.0];
        let lows = [8.0, 9.0, 5.0, 4.0];
        let (plus, minus) = directional_movement(&highs, &lows);
        assert_eq!(plus, vec![2.0, 0.0, 0.0]);
        assert_eq!(minus, vec![0.0, 4.0, 0.0]);
    }

    #[test]
    fn adx_monotone_rise_is_100() {
        let highs: Vec<f64> = (0..20).map(|i| 101.0 + i as f64).collect();
        let lows: Vec<f64> = (0..20).map(|i| 99.0 + i as f64).collect();
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let value = adx(&highs, &lows, &closes, 14).unwrap();
        assert_approx(value, 100.0, DEFAULT_EPSILON);
    }

    #[test]
    fn adx_flat_market_is_zero() {
        let highs = vec![101.0; 20];
        let lows = vec![99.0; 20];
        let closes = vec![100.0; 20];
        assert_eq!(adx(&highs, &lows, &closes, 14), Some(0.0));
    }

    #[test]
    fn adx_too_few_bars() {
        let highs = vec![101.0; 14];
        let lows = vec![99.0; 14];
        let closes = vec![100.0; 14];
        assert!(adx(&highs, &lows, &closes, 14).is_none());
    }

    #[test]
    fn adx_at_exactly_period_plus_one_bars() {
        use crate::indicators::{FIXTURE_CLOSES, FIXTURE_HIGHS, FIXTURE_LOWS};

        // +DM sum 3.5, -DM sum 1.1; ATR cancels out of the ratio.
        // ADX = 100 * (3.5 - 1.1) / (3.5 + 1.1)
        let value = adx(&FIXTURE_HIGHS, &FIXTURE_LOWS, &FIXTURE_CLOSES, 14).unwrap();
        assert_approx(value, 240.0 / 4.6, 1e-9);

        assert!(adx(&FIXTURE_HIGHS[1..], &FIXTURE_LOWS[1..], &FIXTURE_CLOSES[1..], 14).is_none());
    }

    #[test]
    fn adx_zero_atr_is_unavailable() {
        let flat = vec![100.0; 20];
        assert!(adx(&flat, &flat, &flat, 14).is_none());
    }
}
