//! The per-instrument evaluation pipeline.
//!
//! For every closed 1-minute bar:
//!
//! 1. update the instrument's session VWAP with (close, volume)
//! 2. feed the timeframe aggregator
//! 3. if the primary candle just closed, evaluate once:
//!    regime → bias → setup → liquidity → decision
//! 4. hand the decision to every registered sink
//!
//! No lock is held across stages, so a slow sink only delays the instrument
//! that produced the decision.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::sink::{DecisionEvent, DecisionSink};
use crate::aggregate::TimeframeAggregator;
use crate::config::{ConfigError, PipelineConfig};
use crate::decision::{DecisionEngine, DecisionInputs};
use crate::domain::{Bar, InstrumentKey, Series};
use crate::indicators::{analyze_liquidity, detect_regime, htf_bias, VwapAccumulator, VwapContext};
use crate::setup::{EntrySeries, SetupDetector};
use crate::store::callbacks::panic_message;
use crate::store::{BarStore, CallbackId};

type VwapCell = Arc<Mutex<VwapAccumulator>>;

pub struct StrategyOrchestrator {
    config: PipelineConfig,
    store: Arc<BarStore>,
    aggregator: TimeframeAggregator,
    detector: SetupDetector,
    engine: DecisionEngine,
    /// One accumulator per instrument; the map lock is never held across an update.
    vwap: RwLock<HashMap<InstrumentKey, VwapCell>>,
    sinks: RwLock<Vec<Arc<dyn DecisionSink>>>,
    evaluations: AtomicU64,
    sink_failures: AtomicU64,
}

impl StrategyOrchestrator {
    /// Validate `config` and build the pipeline over `store`.
    ///
    /// The orchestrator reads the store's 1-minute history for fine-entry
    /// setups; it does not observe the store until [`attach`](Self::attach).
    pub fn new(config: PipelineConfig, store: Arc<BarStore>) -> Result<Self, ConfigError> {
        config.validate()?;

        let setup = config.effective_setup();
        let decision = config.effective_decision();
        tracing::info!(
            profile = %config.profile,
            setup = %setup.name,
            decision = %decision.name,
            fingerprint = %config.fingerprint(),
            "strategy orchestrator configured"
        );

        Ok(Self {
            aggregator: TimeframeAggregator::new(config.aggregation.clone()),
            detector: SetupDetector::new(setup, config.volume.clone(), config.volatility.clone()),
            engine: DecisionEngine::new(decision, config.volume.clone(), config.volatility.clone()),
            vwap: RwLock::new(HashMap::new()),
            sinks: RwLock::new(Vec::new()),
            evaluations: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
            store,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<BarStore> {
        &self.store
    }

    pub fn aggregator(&self) -> &TimeframeAggregator {
        &self.aggregator
    }

    /// Register as a bar-close observer on the store.
    ///
    /// The store holds the orchestrator weakly; once the last `Arc` is
    /// dropped the callback turns into a no-op.
    pub fn attach(self: &Arc<Self>) -> CallbackId {
        let weak = Arc::downgrade(self);
        self.store.register_on_bar_close(move |instrument, bar| {
            if let Some(orchestrator) = weak.upgrade() {
                orchestrator.on_bar(instrument, bar);
            }
            Ok(())
        })
    }

    pub fn detach(&self, id: CallbackId) -> bool {
        self.store.unregister_on_bar_close(id)
    }

    pub fn add_sink(&self, sink: Arc<dyn DecisionSink>) {
        self.sinks.write().push(sink);
    }

    /// Evaluations run since construction.
    pub fn evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }

    pub fn sink_failures(&self) -> u64 {
        self.sink_failures.load(Ordering::Relaxed)
    }

    /// Process one closed 1-minute bar. Returns the decision when this bar
    /// closed a primary candle.
    pub fn on_bar(&self, instrument: &str, bar: &Bar) -> Option<DecisionEvent> {
        self.vwap_cell_or_insert(instrument)
            .lock()
            .update(bar.close, bar.volume);

        if !self.aggregator.update(instrument, bar) {
            return None;
        }

        let event = self.evaluate(instrument);
        self.publish(&event);
        Some(event)
    }

    /// Run the decision pipeline on the instrument's current state.
    ///
    /// Normally driven by [`on_bar`](Self::on_bar); callable directly to
    /// re-evaluate without new data. Does not publish to sinks.
    pub fn evaluate(&self, instrument: &str) -> DecisionEvent {
        self.evaluations.fetch_add(1, Ordering::Relaxed);

        let primary = self.aggregator.primary();
        let lookback = self.config.evaluation.coarse_lookback;
        let coarse = Series::from_bars(&self.aggregator.history(instrument, primary, lookback));

        let price = self
            .store
            .get_last_bar(instrument)
            .map(|bar| bar.close)
            .or_else(|| coarse.last_close())
            .unwrap_or(0.0);

        let regime = detect_regime(&coarse.highs, &coarse.lows, &coarse.closes, &self.config.regime);

        let vwap = self
            .vwap_cell(instrument)
            .map(|cell| cell.lock().context(price))
            .unwrap_or_else(VwapContext::unavailable);

        let bias_timeframe = self.config.bias_timeframe();
        let bias = if bias_timeframe == primary {
            htf_bias(&coarse.closes, vwap.vwap, &self.config.bias)
        } else {
            let bars = self.aggregator.history(instrument, bias_timeframe, lookback);
            let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
            htf_bias(&closes, vwap.vwap, &self.config.bias)
        };

        let fine = match self.detector.profile().entry {
            EntrySeries::Fine => Some(self.store.series(instrument, self.config.evaluation.fine_lookback)),
            EntrySeries::Coarse => None,
        };
        let pullback = self.detector.detect(&coarse, fine.as_ref(), bias.direction);

        let liquidity = analyze_liquidity(&coarse.volumes, &self.config.liquidity);

        let decision = self
            .engine
            .decide(&DecisionInputs {
                pullback: pullback.as_ref(),
                regime: regime.state,
                bias: bias.direction,
                vwap: &vwap,
                liquidity: &liquidity,
                series: &coarse,
            })
            .with_label("regime", regime.state.as_str())
            .with_label("htf_bias", bias.label.clone());

        if decision.state.is_execute() {
            tracing::info!(
                instrument = %instrument,
                state = %decision.state,
                score = decision.score,
                reason = %decision.reason,
                "execute decision"
            );
        } else {
            tracing::debug!(
                instrument = %instrument,
                state = %decision.state,
                score = decision.score,
                regime = %regime.state,
                bias = %bias.label,
                reason = %decision.reason,
                "evaluated"
            );
        }

        DecisionEvent {
            instrument: instrument.to_string(),
            candle_time: self.aggregator.last_closed_time(instrument, primary),
            price,
            decision,
        }
    }

    fn publish(&self, event: &DecisionEvent) {
        let sinks: Vec<Arc<dyn DecisionSink>> = self.sinks.read().clone();

        for sink in sinks {
            match catch_unwind(AssertUnwindSafe(|| sink.on_decision(event))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    self.sink_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(instrument = %event.instrument, error = %err, "decision sink failed");
                }
                Err(payload) => {
                    self.sink_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        instrument = %event.instrument,
                        panic = %panic_message(payload.as_ref()),
                        "decision sink panicked"
                    );
                }
            }
        }
    }

    /// Session start: clear every instrument's VWAP.
    pub fn reset_session(&self) {
        let cells: Vec<VwapCell> = self.vwap.read().values().cloned().collect();
        for cell in cells {
            cell.lock().reset();
        }
    }

    pub fn reset_vwap(&self, instrument: &str) {
        if let Some(cell) = self.vwap_cell(instrument) {
            cell.lock().reset();
        }
    }

    /// Current session VWAP, if any volume has been seen.
    pub fn vwap(&self, instrument: &str) -> Option<f64> {
        self.vwap_cell(instrument).and_then(|cell| cell.lock().value())
    }

    fn vwap_cell(&self, instrument: &str) -> Option<VwapCell> {
        self.vwap.read().get(instrument).cloned()
    }

    fn vwap_cell_or_insert(&self, instrument: &str) -> VwapCell {
        if let Some(cell) = self.vwap_cell(instrument) {
            return cell;
        }
        self.vwap
            .write()
            .entry(instrument.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(VwapAccumulator::new(self.config.vwap.clone()))))
            .clone()
    }
}
