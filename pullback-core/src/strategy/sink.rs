//! Decision sinks: where evaluated decisions go.

use chrono::NaiveDateTime;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::Write;
use thiserror::Error;

use crate::decision::DecisionResult;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink rejected decision: {0}")]
    Rejected(String),

    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One evaluation's output, with the context a consumer needs to act on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionEvent {
    pub instrument: String,
    /// Bucket start of the primary candle that triggered the evaluation.
    pub candle_time: Option<NaiveDateTime>,
    /// Close of the 1-minute bar that closed the candle.
    pub price: f64,
    pub decision: DecisionResult,
}

/// Receiver of decisions.
///
/// Implementations must be cheap and must not call back into the
/// orchestrator. A returned error is logged and counted; it never stops the
/// pipeline or other sinks.
pub trait DecisionSink: Send + Sync {
    fn on_decision(&self, event: &DecisionEvent) -> Result<(), SinkError>;
}

/// Keeps every event in memory. Used by replay and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<DecisionEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn events(&self) -> Vec<DecisionEvent> {
        self.events.lock().clone()
    }

    /// Take everything collected so far.
    pub fn drain(&self) -> Vec<DecisionEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl DecisionSink for MemorySink {
    fn on_decision(&self, event: &DecisionEvent) -> Result<(), SinkError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Writes one JSON object per line.
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
    actionable_only: bool,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W, actionable_only: bool) -> Self {
        Self {
            writer: Mutex::new(writer),
            actionable_only,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> DecisionSink for JsonLinesSink<W> {
    fn on_decision(&self, event: &DecisionEvent) -> Result<(), SinkError> {
        if self.actionable_only && !event.decision.state.is_actionable() {
            return Ok(());
        }
        let line = serde_json::to_string(event)?;
        let mut writer = self.writer.lock();
        writeln!(writer, "{line}")?;
        Ok(())
    }
}
