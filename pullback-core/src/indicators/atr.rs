//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|)
//! ATR is the plain arithmetic mean of the last `period` true ranges.
//! Needs period+1 bars (the first bar has no previous close).

/// Default ATR period.
pub const DEFAULT_ATR_PERIOD: usize = 14;

/// Compute the True Range series.
///
/// The output starts at the second bar, so it is one element shorter than the
/// input. Fewer than two bars yield an empty series.
pub fn true_range(highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<f64> {
    let n = highs.len().min(lows.len()).min(closes.len());
    if n < 2 {
        return Vec::new();
    }

    (1..n)
        .map(|i| {
            let h = highs[i];
            let l = lows[i];
            let pc = closes[i - 1];
            (h - l).max((h - pc).abs()).max((l - pc).abs())
        })
        .collect()
}

/// Mean of the last `period` true ranges, or `None` below `period + 1` bars.
pub fn atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 {
        return None;
    }
    let tr = true_range(highs, lows, closes);
    if tr.len() < period {
        return None;
    }
    let window = &tr[tr.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn true_range_basic() {
        let highs = [105.0, 108.0, 107.0];
        let lows = [95.0, 100.0, 98.0];
        let closes = [102.0, 106.0, 99.0];
        let tr = true_range(&highs, &lows, &closes);
        // TR[1] = max(8, |108-102|, |100-102|) = 8
        // TR[2] = max(9, |107-106|, |98-106|) = 9
        assert_eq!(tr.len(), 2);
        assert_approx(tr[0], 8.0, DEFAULT_EPSILON);
        assert_approx(tr[1], 9.0, DEFAULT_EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        // Gap up: prev close 100, current bar 108-115
        let tr = true_range(&[102.0, 115.0], &[97.0, 108.0], &[100.0, 112.0]);
        assert_approx(tr[0], 15.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_is_plain_mean_of_last_period() {
        let highs = [105.0, 108.0, 107.0, 103.0, 106.0];
        let lows = [95.0, 100.0, 98.0, 97.0, 100.0];
        let closes = [102.0, 106.0, 99.0, 101.0, 105.0];
        // TR = [8, 9, 6, 6]; last 3 → (9 + 6 + 6) / 3 = 7
        let value = atr(&highs, &lows, &closes, 3).unwrap();
        assert_approx(value, 7.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_unavailable_below_period_plus_one() {
        let highs = [105.0, 108.0, 107.0];
        let lows = [95.0, 100.0, 98.0];
        let closes = [102.0, 106.0, 99.0];
        assert!(atr(&highs, &lows, &closes, 3).is_none());
        assert!(atr(&highs, &lows, &closes, 2).is_some());
        assert!(atr(&highs, &lows, &closes, 0).is_none());
    }

    #[test]
    fn atr_default_period_on_fifteen_bars() {
        use crate::indicators::{FIXTURE_CLOSES, FIXTURE_HIGHS, FIXTURE_LOWS};

        // TR = [0.8, 0.6, 0.6, 0.9, 0.7, 0.6, 0.7, 0.6, 0.6, 0.8, 0.6, 0.9, 0.6, 0.7]
        // sum 9.7 over 14
        let value = atr(&FIXTURE_HIGHS, &FIXTURE_LOWS, &FIXTURE_CLOSES, DEFAULT_ATR_PERIOD).unwrap();
        assert_approx(value, 9.7 / 14.0, DEFAULT_EPSILON);

        // One bar short: 14 bars give only 13 true ranges.
        assert!(atr(
            &FIXTURE_HIGHS[1..],
            &FIXTURE_LOWS[1..],
            &FIXTURE_CLOSES[1..],
            DEFAULT_ATR_PERIOD
        )
        .is_none());
    }
}
