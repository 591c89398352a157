//! Last-seen timestamp gate for feeds that redeliver closed bars.

use chrono::NaiveDateTime;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::domain::InstrumentKey;

/// Admits a bar only when it is newer than the last one admitted for the
/// same instrument. Put it in front of [`BarStore::append`](crate::store::BarStore::append)
/// when the feed can repeat itself.
#[derive(Debug, Default)]
pub struct LastSeenGate {
    last_seen: Mutex<HashMap<InstrumentKey, NaiveDateTime>>,
}

impl LastSeenGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// True (and recorded) when `time` is strictly after the last admitted
    /// time for `instrument`. Repeats and out-of-order bars are refused.
    pub fn admit(&self, instrument: &str, time: NaiveDateTime) -> bool {
        let mut last_seen = self.last_seen.lock();
        match last_seen.get_mut(instrument) {
            Some(last) if time <= *last => false,
            Some(last) => {
                *last = time;
                true
            }
            None => {
                last_seen.insert(instrument.to_string(), time);
                true
            }
        }
    }

    pub fn last_seen(&self, instrument: &str) -> Option<NaiveDateTime> {
        self.last_seen.lock().get(instrument).copied()
    }

    pub fn forget(&self, instrument: &str) {
        self.last_seen.lock().remove(instrument);
    }
}
