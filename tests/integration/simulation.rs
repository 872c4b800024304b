//! End-to-end simulation: scripted ticks through the assembled core.
//!
//! Replays deterministic price sequences through the engine and
//! asserts on fired notifications, resolved predictions, recorded
//! alerts, and stats consistency.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

use sentinel::advisor::MomentumAdvisor;
use sentinel::alerts::AlertKind;
use sentinel::config::{EngineConfig, GateConfig, MonitorConfig, TrackerConfig};
use sentinel::engine::feed::{ReplaySource, TickSource};
use sentinel::engine::Engine;
use sentinel::gate::ExecutionGate;
use sentinel::monitor::PlanMonitor;
use sentinel::tracker::{PredictionDraft, PredictionTracker};
use sentinel::types::{
    ExecutionState, OperatingMode, PlanStatus, PredictionOutcome, PriceTick, RiskCheck,
    TradeAction, TradeDecision, TradePlan,
};

use crate::mock_store::{MemoryPlanStore, RecordingSink};

fn plan(id: &str, symbol: &str, entry: f64, stop: f64, target: f64) -> TradePlan {
    TradePlan {
        id: id.to_string(),
        symbol: symbol.to_string(),
        entry_price: Some(entry),
        stop_loss: Some(stop),
        target1: Some(target),
        target2: None,
        target3: None,
        status: PlanStatus::Active,
        created_at: Utc::now(),
    }
}

fn ticks(symbol: &str, prices: &[f64]) -> Vec<PriceTick> {
    prices
        .iter()
        .map(|p| PriceTick::new(symbol, *p, Utc::now()))
        .collect()
}

fn assemble(
    store: Arc<MemoryPlanStore>,
    sink: Arc<RecordingSink>,
    gate_config: GateConfig,
) -> Engine {
    let monitor = PlanMonitor::new(store, sink.clone(), MonitorConfig::default());
    Engine::new(
        ExecutionGate::new(gate_config),
        monitor,
        PredictionTracker::new(),
        Arc::new(MomentumAdvisor),
        sink,
        TrackerConfig::default(),
        EngineConfig::default(),
    )
}

fn full_auto() -> GateConfig {
    GateConfig {
        mode: OperatingMode::FullAuto,
        auto_execute_threshold: 80.0,
        max_daily_trades: 5,
        max_daily_loss: 500.0,
        cooldown_minutes: 30,
        consecutive_loss_limit: 3,
    }
}

#[tokio::test]
async fn test_plan_levels_fire_through_the_stack() {
    let store = Arc::new(MemoryPlanStore::new(vec![plan(
        "p1", "AAPL", 100.0, 95.0, 110.0,
    )]));
    let sink = Arc::new(RecordingSink::new());
    let engine = assemble(store, sink.clone(), full_auto());

    assert_eq!(engine.monitor().load_plans().await.unwrap(), 1);

    // 98 seeds the previous price; the jump to 109.5 crosses the entry
    // and lands inside the target's approach band.
    let mut source = ReplaySource::new(ticks("AAPL", &[98.0, 109.5]));
    let mut fired = Vec::new();
    while let Some(tick) = source.next_tick().await.unwrap() {
        fired.extend(engine.handle_tick(&tick).await);
    }

    assert_eq!(fired.len(), 2);
    let crossed = fired.iter().find(|n| !n.approaching).unwrap();
    let approaching = fired.iter().find(|n| n.approaching).unwrap();
    assert_eq!(crossed.level.to_string(), "entry");
    assert_eq!(approaching.level.to_string(), "target1");

    // Every notification reached the sink as a structured alert.
    let alerts = sink.alerts();
    let plan_alerts: Vec<_> = alerts
        .iter()
        .filter(|a| a.kind == AlertKind::PlanLevel)
        .collect();
    assert_eq!(plan_alerts.len(), 2);
    assert!(plan_alerts.iter().all(|a| a.payload["plan_id"] == "p1"));
}

#[tokio::test]
async fn test_notify_once_holds_across_replay() {
    let store = Arc::new(MemoryPlanStore::new(vec![plan(
        "p1", "AAPL", 100.0, 95.0, 110.0,
    )]));
    let sink = Arc::new(RecordingSink::new());
    let engine = assemble(store, sink.clone(), full_auto());
    engine.monitor().load_plans().await.unwrap();

    // Hovering inside the entry's approach band for several ticks.
    let mut source = ReplaySource::new(ticks("AAPL", &[100.3, 100.2, 100.4, 100.3]));
    let mut fired = Vec::new();
    while let Some(tick) = source.next_tick().await.unwrap() {
        fired.extend(engine.handle_tick(&tick).await);
    }
    assert_eq!(fired.len(), 1);

    // Reset re-arms the plan.
    assert!(engine.monitor().reset_notifications("p1"));
    assert_eq!(engine.handle_tick(&ticks("AAPL", &[100.3])[0]).await.len(), 1);
}

#[tokio::test]
async fn test_store_failure_leaves_registry_intact() {
    let store = Arc::new(MemoryPlanStore::new(vec![plan(
        "p1", "AAPL", 100.0, 95.0, 110.0,
    )]));
    let sink = Arc::new(RecordingSink::new());
    let engine = assemble(store.clone(), sink, full_auto());

    engine.monitor().load_plans().await.unwrap();
    assert_eq!(engine.monitor().plan_count(), 1);

    store.set_error("database offline");
    assert!(engine.monitor().load_plans().await.is_err());
    // The registry still holds the previously loaded plan.
    assert_eq!(engine.monitor().plan_count(), 1);

    store.clear_error();
    store.replace_plans(vec![
        plan("p2", "MSFT", 400.0, 390.0, 420.0),
        plan("p3", "MSFT", 405.0, 395.0, 425.0),
    ]);
    assert_eq!(engine.monitor().load_plans().await.unwrap(), 2);
    assert_eq!(engine.monitor().plan_count(), 2);
}

#[tokio::test]
async fn test_prediction_lifecycle_through_sweep() {
    let store = Arc::new(MemoryPlanStore::new(Vec::new()));
    let sink = Arc::new(RecordingSink::new());
    let engine = assemble(store, sink.clone(), full_auto());

    engine.handle_tick(&PriceTick::new("AAPL", 100.0, Utc::now())).await;

    // A zero-width window expires immediately.
    engine.tracker().add(PredictionDraft {
        symbol: "AAPL".to_string(),
        action: TradeAction::Buy,
        confidence: 75.0,
        entry_price: 100.0,
        target_price: 105.0,
        stop_loss: 97.0,
        window_minutes: 0,
        reasoning: "scripted".to_string(),
    });
    engine.handle_tick(&PriceTick::new("AAPL", 101.0, Utc::now())).await;

    let resolved = engine.run_expiry_sweep().await;
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].outcome, Some(PredictionOutcome::Right));

    let stats = engine.tracker().stats();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.right, 1);

    assert!(sink
        .alerts()
        .iter()
        .any(|a| a.kind == AlertKind::PredictionResolved));
}

#[tokio::test]
async fn test_gate_scenario_daily_limit_blocks_high_confidence() {
    // A maxed-out day blocks a high-confidence, risk-approved decision.
    let store = Arc::new(MemoryPlanStore::new(Vec::new()));
    let sink = Arc::new(RecordingSink::new());
    let engine = assemble(store, sink.clone(), full_auto());

    let decision = TradeDecision {
        symbol: "AAPL".to_string(),
        action: TradeAction::Buy,
        confidence: 95.0,
        reasoning: "strong signal".to_string(),
        risk: Some(RiskCheck::approved()),
        consensus: None,
    };
    let state = ExecutionState {
        daily_trade_count: 5,
        ..ExecutionState::default()
    };

    let verdict = engine.consider(&decision, &state).await;
    assert!(!verdict.allow);
    assert!(verdict.block_reason.contains("daily trade limit"));

    let blocked: Vec<_> = sink
        .alerts()
        .into_iter()
        .filter(|a| a.kind == AlertKind::ExecutionBlocked)
        .collect();
    assert_eq!(blocked.len(), 1);
    assert!(blocked[0].payload["block_reason"]
        .as_str()
        .unwrap()
        .contains("daily trade limit"));
}

#[tokio::test]
async fn test_stats_stay_consistent_over_mixed_resolutions() {
    let tracker = PredictionTracker::new();

    // Three explicit evaluations: target hit, stop hit, unresolved.
    for (target_exit, resolves) in [(105.0, true), (97.0, true), (101.0, false)] {
        let p = tracker.add(PredictionDraft {
            symbol: "AAPL".to_string(),
            action: TradeAction::Buy,
            confidence: 70.0,
            entry_price: 100.0,
            target_price: 105.0,
            stop_loss: 97.0,
            window_minutes: 60,
            reasoning: String::new(),
        });
        assert_eq!(tracker.evaluate(&p.id, target_exit).is_some(), resolves);
    }

    // Sweep the straggler once its window has lapsed.
    let mut prices = HashMap::new();
    prices.insert("AAPL".to_string(), 99.0);
    let resolved = tracker.check_expired_at(&prices, Utc::now() + chrono::Duration::minutes(61));
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].outcome, Some(PredictionOutcome::Wrong));

    let stats = tracker.stats();
    assert_eq!(stats.tracked, 3);
    assert_eq!(stats.total, 3);
    assert_eq!(stats.right + stats.wrong + stats.expired, 3);
    assert!((stats.win_rate - stats.right as f64 / 3.0 * 100.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_sink_outage_never_stops_the_tick_path() {
    let store = Arc::new(MemoryPlanStore::new(vec![plan(
        "p1", "AAPL", 100.0, 95.0, 110.0,
    )]));
    let sink = Arc::new(RecordingSink::new());
    let engine = assemble(store, sink.clone(), full_auto());
    engine.monitor().load_plans().await.unwrap();

    sink.set_error("webhook 503");
    let mut source = ReplaySource::new(ticks("AAPL", &[98.0, 101.0]));
    let mut fired = Vec::new();
    while let Some(tick) = source.next_tick().await.unwrap() {
        fired.extend(engine.handle_tick(&tick).await);
    }

    // Evaluation still happened and reported the cross.
    assert_eq!(fired.len(), 1);
    assert!(!fired[0].approaching);
    assert!(sink.alerts().is_empty());
}
