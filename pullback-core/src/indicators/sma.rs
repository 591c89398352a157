//! Simple Moving Average (SMA).
//!
//! Mean of the last `period` values. Only the latest value is needed by the
//! pipeline, so there is no rolling series form.

/// Mean of the last `period` values, or `None` with fewer than `period` values.
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    Some(values[values.len() - period..].iter().sum::<f64>() / period as f64)
}

/// Mean of up to the last `window` values. `None` on empty input.
///
/// Unlike [`sma`], a short input is averaged over what is there.
pub fn trailing_mean(values: &[f64], window: usize) -> Option<f64> {
    let take = window.min(values.len());
    if take == 0 {
        return None;
    }
    Some(values[values.len() - take..].iter().sum::<f64>() / take as f64)
}
