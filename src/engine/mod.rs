//! Driver — fans the tick stream into the core components.
//!
//! One tick consumer feeds the plan monitor and the tracker's
//! latest-price map; a timer-driven sweep resolves expired predictions
//! and asks the advisor for new ones; trade decisions from the
//! (external) decision pipeline pass through the execution gate. The
//! engine owns no I/O of its own — everything external goes through
//! the injected collaborators.

pub mod candles;
pub mod feed;

use anyhow::Result;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use crate::alerts::{Alert, AlertSink};
use crate::advisor::{Advisor, PredictionRequest};
use crate::config::{EngineConfig, TrackerConfig};
use crate::gate::ExecutionGate;
use crate::monitor::PlanMonitor;
use crate::tracker::PredictionTracker;
use crate::types::{
    ExecutionState, GateResult, PlanNotification, Prediction, PriceTick, TradeDecision,
};
use candles::CandleBuilder;

pub struct Engine {
    gate: ExecutionGate,
    monitor: PlanMonitor,
    tracker: PredictionTracker,
    advisor: Arc<dyn Advisor>,
    sink: Arc<dyn AlertSink>,
    tracker_config: TrackerConfig,
    engine_config: EngineConfig,
    /// Latest observed price per symbol; feeds the expiry sweep.
    prices: RwLock<HashMap<String, f64>>,
    builders: RwLock<HashMap<String, CandleBuilder>>,
}

impl Engine {
    pub fn new(
        gate: ExecutionGate,
        monitor: PlanMonitor,
        tracker: PredictionTracker,
        advisor: Arc<dyn Advisor>,
        sink: Arc<dyn AlertSink>,
        tracker_config: TrackerConfig,
        engine_config: EngineConfig,
    ) -> Self {
        info!(
            advisor = advisor.name(),
            sink = sink.name(),
            symbols = ?engine_config.prediction_symbols,
            "Engine assembled"
        );
        Self {
            gate,
            monitor,
            tracker,
            advisor,
            sink,
            tracker_config,
            engine_config,
            prices: RwLock::new(HashMap::new()),
            builders: RwLock::new(HashMap::new()),
        }
    }

    pub fn monitor(&self) -> &PlanMonitor {
        &self.monitor
    }

    pub fn tracker(&self) -> &PredictionTracker {
        &self.tracker
    }

    /// Copy of the latest-price map.
    pub fn latest_prices(&self) -> HashMap<String, f64> {
        self.prices.read().expect("price map lock poisoned").clone()
    }

    /// Fan one tick into the price map, the candle builders, and the
    /// plan monitor. Returns the monitor's fired notifications.
    pub async fn handle_tick(&self, tick: &PriceTick) -> Vec<PlanNotification> {
        {
            let mut prices = self.prices.write().expect("price map lock poisoned");
            prices.insert(tick.symbol.clone(), tick.last);
        }
        {
            let mut builders = self.builders.write().expect("candle map lock poisoned");
            builders
                .entry(tick.symbol.clone())
                .or_insert_with(|| {
                    CandleBuilder::new(
                        self.engine_config.candle_window_secs,
                        self.engine_config.max_candles,
                    )
                })
                .push(tick);
        }

        self.monitor.check(tick).await
    }

    /// Resolve every expired prediction against the latest prices and
    /// announce the outcomes. Sink failures are logged per alert and
    /// never abort the sweep.
    pub async fn run_expiry_sweep(&self) -> Vec<Prediction> {
        let prices = self.latest_prices();
        let resolved = self.tracker.check_expired(&prices);
        if resolved.is_empty() {
            return resolved;
        }

        let alerts: Vec<Alert> = resolved.iter().map(Alert::prediction_resolved).collect();
        let outcomes = join_all(alerts.iter().map(|a| self.sink.send(a))).await;
        for (alert, outcome) in alerts.iter().zip(outcomes) {
            if let Err(e) = outcome {
                warn!(title = %alert.title, error = %e, "Resolution alert delivery failed");
            }
        }
        resolved
    }

    /// Ask the advisor for a fresh prediction on one symbol, feeding it
    /// the tracker's own record so it can adapt. Returns the tracked
    /// prediction if the advisor produced one.
    pub async fn seek_prediction(&self, symbol: &str) -> Result<Option<Prediction>> {
        let Some(current_price) = self.latest_prices().get(symbol).copied() else {
            debug!(symbol, "No price observed yet, skipping prediction");
            return Ok(None);
        };

        // One open prediction per symbol at a time.
        if self.tracker.active().iter().any(|p| p.symbol == symbol) {
            return Ok(None);
        }

        let candles = {
            let builders = self.builders.read().expect("candle map lock poisoned");
            builders.get(symbol).map(|b| b.snapshot()).unwrap_or_default()
        };
        let recent_outcomes = self
            .tracker
            .recent_history(self.tracker_config.history_context)
            .into_iter()
            .filter(|p| p.symbol == symbol)
            .collect();

        let request = PredictionRequest {
            symbol: symbol.to_string(),
            current_price,
            candles,
            recent_outcomes,
            stats: self.tracker.stats(),
            min_confidence: self.tracker_config.min_confidence,
            window_minutes: self.tracker_config.default_window_minutes,
        };

        let Some(draft) = self.advisor.predict(&request).await? else {
            return Ok(None);
        };

        let prediction = self.tracker.add(draft);
        if let Err(e) = self.sink.send(&Alert::prediction_opened(&prediction)).await {
            warn!(id = %prediction.id, error = %e, "Prediction alert delivery failed");
        }
        Ok(Some(prediction))
    }

    /// Run one trade decision through the execution gate and announce
    /// the verdict.
    pub async fn consider(
        &self,
        decision: &TradeDecision,
        state: &ExecutionState,
    ) -> GateResult {
        let result = self.gate.decide(decision, state);
        let alert = if result.allow {
            Alert::execution_approved(decision, &result)
        } else {
            Alert::execution_blocked(decision, &result)
        };
        if let Err(e) = self.sink.send(&alert).await {
            warn!(symbol = %decision.symbol, error = %e, "Gate alert delivery failed");
        }
        result
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
