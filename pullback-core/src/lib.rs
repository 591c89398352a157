//! Pullback Core: a real-time pullback pipeline over 1-minute bars.
//!
//! - Bar store: bounded per-instrument history, bar-close callbacks, alert
//!   throttling, JSON snapshots
//! - Timeframe aggregation with one-bar-lag close detection
//! - Indicator library (ATR, ADX, regime, SR zones, VWAP, bias, volume,
//!   volatility, liquidity, price action)
//! - Setup detection and the decision engine
//! - The orchestrator that drives one evaluation per coarse-candle close

pub mod aggregate;
pub mod config;
pub mod decision;
pub mod domain;
pub mod indicators;
pub mod setup;
pub mod store;
pub mod strategy;

pub use config::{ConfigError, PipelineConfig, ProfileKind};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything shared across ingestion threads is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain
        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::Series>();
        require_sync::<domain::Series>();

        // Shared state
        require_send::<store::BarStore>();
        require_sync::<store::BarStore>();
        require_send::<aggregate::TimeframeAggregator>();
        require_sync::<aggregate::TimeframeAggregator>();
        require_send::<strategy::StrategyOrchestrator>();
        require_sync::<strategy::StrategyOrchestrator>();
        require_send::<strategy::LastSeenGate>();
        require_sync::<strategy::LastSeenGate>();
        require_send::<strategy::MemorySink>();
        require_sync::<strategy::MemorySink>();

        // Stages
        require_send::<setup::SetupDetector>();
        require_sync::<setup::SetupDetector>();
        require_send::<decision::DecisionEngine>();
        require_sync::<decision::DecisionEngine>();
        require_send::<indicators::VwapAccumulator>();
        require_sync::<indicators::VwapAccumulator>();

        // Outputs
        require_send::<decision::DecisionResult>();
        require_sync::<decision::DecisionResult>();
        require_send::<strategy::DecisionEvent>();
        require_sync::<strategy::DecisionEvent>();
        require_send::<config::PipelineConfig>();
        require_sync::<config::PipelineConfig>();
    }

    /// Sinks are shared as trait objects across instruments.
    #[test]
    fn decision_sink_is_object_safe() {
        fn _accepts(_sink: std::sync::Arc<dyn strategy::DecisionSink>) {}
        _accepts(std::sync::Arc::new(strategy::MemorySink::new()));
    }
}
