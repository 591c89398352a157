//! Domain types shared by every pipeline stage.

pub mod bar;
pub mod direction;

pub use bar::{Bar, Series};
pub use direction::{BiasDirection, Direction};

/// Instrument key type alias (feed-assigned identifier, e.g. `NSE_EQ|INE002A01018`).
pub type InstrumentKey = String;
