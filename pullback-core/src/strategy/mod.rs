//! Wiring: store → aggregator → indicators → detector → decision → sinks.

pub mod gate;
pub mod orchestrator;
pub mod sink;

pub use gate::LastSeenGate;
pub use orchestrator::StrategyOrchestrator;
pub use sink::{DecisionEvent, DecisionSink, JsonLinesSink, MemorySink, SinkError};
