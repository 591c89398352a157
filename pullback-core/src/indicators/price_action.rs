//! Wick rejection analysis.
//!
//! A candle rejects a level when one wick dominates its range: BULLISH when
//! the lower wick is more than 35% of the range and 1.2x the body, BEARISH
//! symmetric on the upper wick. The bullish test runs first.

use serde::{Deserialize, Serialize};

use crate::domain::Direction;
use crate::indicators::round_to;

/// Minimum wick fraction of the range.
pub const WICK_FRACTION: f64 = 0.35;
/// Wick must exceed the body fraction by this factor.
pub const WICK_OVER_BODY: f64 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionKind {
    Bullish,
    Bearish,
}

impl RejectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bullish => "BULLISH",
            Self::Bearish => "BEARISH",
        }
    }

    /// Whether this rejection confirms a setup in `direction`.
    pub fn confirms(&self, direction: Direction) -> bool {
        matches!(
            (self, direction),
            (Self::Bullish, Direction::Long) | (Self::Bearish, Direction::Short)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RejectionInfo {
    pub kind: Option<RejectionKind>,
    /// 0..=1.
    pub score: f64,
    pub upper_wick: f64,
    pub lower_wick: f64,
    pub body: f64,
    pub range: f64,
}

pub fn rejection_info(open: f64, high: f64, low: f64, close: f64) -> RejectionInfo {
    let body = (close - open).abs();
    let range = (high - low).max(1e-9);

    let upper_wick = (high - close.max(open)).max(0.0);
    let lower_wick = (close.min(open) - low).max(0.0);

    let upper_frac = upper_wick / range;
    let lower_frac = lower_wick / range;
    let body_frac = body / range;

    let (kind, score) = if lower_frac > WICK_FRACTION && lower_frac > body_frac * WICK_OVER_BODY {
        (Some(RejectionKind::Bullish), ((lower_frac - WICK_FRACTION) / 0.5).min(1.0))
    } else if upper_frac > WICK_FRACTION && upper_frac > body_frac * WICK_OVER_BODY {
        (Some(RejectionKind::Bearish), ((upper_frac - WICK_FRACTION) / 0.5).min(1.0))
    } else {
        (None, 0.0)
    };

    RejectionInfo {
        kind,
        score: round_to(score, 3),
        upper_wick: round_to(upper_wick, 6),
        lower_wick: round_to(lower_wick, 6),
        body: round_to(body, 6),
        range: round_to(range, 6),
    }
}

/// Signed rejection of the latest bar: positive bullish, negative bearish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceActionContext {
    pub kind: Option<RejectionKind>,
    pub rejection_score: f64,
    /// -1..=1.
    pub score: f64,
    pub comment: String,
}

pub fn price_action_context(opens: &[f64], highs: &[f64], lows: &[f64], closes: &[f64]) -> PriceActionContext {
    let (Some(&o), Some(&h), Some(&l), Some(&c)) = (opens.last(), highs.last(), lows.last(), closes.last())
    else {
        return PriceActionContext {
            kind: None,
            rejection_score: 0.0,
            score: 0.0,
            comment: "no data".to_string(),
        };
    };

    let rejection = rejection_info(o, h, l, c);
    let (score, comment) = match rejection.kind {
        Some(RejectionKind::Bullish) => (rejection.score, "bullish rejection"),
        Some(RejectionKind::Bearish) => (-rejection.score, "bearish rejection"),
        None => (0.0, "no rejection"),
    };

    PriceActionContext {
        kind: rejection.kind,
        rejection_score: rejection.score,
        score,
        comment: comment.to_string(),
    }
}
