//! Alert throttling state: per-instrument cooldown, per-direction dedupe and
//! explicit pauses. All instants are Unix epoch seconds.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::domain::Direction;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertState {
    pub last_alert_time: BTreeMap<String, f64>,
    /// instrument → direction (`LONG` / `SHORT`) → last emission.
    pub dedupe_map: BTreeMap<String, BTreeMap<String, f64>>,
    pub paused_until: BTreeMap<String, f64>,
}

impl AlertState {
    pub fn is_paused(&self, instrument: &str, now: f64) -> bool {
        self.paused_until
            .get(instrument)
            .is_some_and(|&until| now < until)
    }

    /// False while paused or within `cooldown` of the last emission.
    pub fn can_emit(&self, instrument: &str, cooldown: Duration, now: f64) -> bool {
        if self.is_paused(instrument, now) {
            return false;
        }
        match self.last_alert_time.get(instrument) {
            Some(&last) => now - last >= cooldown.as_secs_f64(),
            None => true,
        }
    }

    pub fn mark_emitted(&mut self, instrument: &str, now: f64) {
        self.last_alert_time.insert(instrument.to_string(), now);
    }

    /// True if `(instrument, direction)` already fired within `window`.
    /// Otherwise records `now` and returns false.
    pub fn dedupe(&mut self, instrument: &str, direction: Direction, window: Duration, now: f64) -> bool {
        let per_direction = self.dedupe_map.entry(instrument.to_string()).or_default();
        if let Some(&last) = per_direction.get(direction.as_str()) {
            if now - last < window.as_secs_f64() {
                return true;
            }
        }
        per_direction.insert(direction.as_str().to_string(), now);
        false
    }

    pub fn pause(&mut self, instrument: &str, until: f64) {
        self.paused_until.insert(instrument.to_string(), until);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIFTEEN_MIN: Duration = Duration::from_secs(900);

    #[test]
    fn cooldown_blocks_until_elapsed() {
        let mut state = AlertState::default();
        assert!(state.can_emit("A", FIFTEEN_MIN, 1_000.0));
        state.mark_emitted("A", 1_000.0);
        assert!(!state.can_emit("A", FIFTEEN_MIN, 1_899.0));
        assert!(state.can_emit("A", FIFTEEN_MIN, 1_900.0));
        assert!(state.can_emit("B", FIFTEEN_MIN, 1_001.0));
    }

    #[test]
    fn pause_blocks_until_expiry() {
        let mut state = AlertState::default();
        state.pause("A", 5_000.0);
        assert!(!state.can_emit("A", FIFTEEN_MIN, 4_999.0));
        assert!(state.can_emit("A", FIFTEEN_MIN, 5_000.0));
    }

    #[test]
    fn dedupe_queries_and_marks() {
        let mut state = AlertState::default();
        assert!(!state.dedupe("A", Direction::Long, FIFTEEN_MIN, 100.0));
        assert!(state.dedupe("A", Direction::Long, FIFTEEN_MIN, 200.0));
        // other direction is independent
        assert!(!state.dedupe("A", Direction::Short, FIFTEEN_MIN, 200.0));
        // window expired: records again
        assert!(!state.dedupe("A", Direction::Long, FIFTEEN_MIN, 1_000.0));
        assert_eq!(state.dedupe_map["A"]["LONG"], 1_000.0);
    }
}
