//! SENTINEL — Decision & Monitoring Core for an Automated Trading Assistant
//!
//! Entry point. Loads configuration, initialises structured logging,
//! assembles the gate/monitor/tracker behind their collaborators, and
//! runs the tick/sweep loop with graceful shutdown.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use sentinel::advisor::MomentumAdvisor;
use sentinel::alerts::LogSink;
use sentinel::config::AppConfig;
use sentinel::engine::feed::{ReplaySource, SyntheticSource, TickSource};
use sentinel::engine::Engine;
use sentinel::gate::ExecutionGate;
use sentinel::monitor::PlanMonitor;
use sentinel::storage::JsonPlanStore;
use sentinel::tracker::PredictionTracker;
use sentinel::types::{ExecutionState, TradeDecision};

const BANNER: &str = r#"
 ____  _____ _   _ _____ ___ _   _ _____ _
/ ___|| ____| \ | |_   _|_ _| \ | | ____| |
\___ \|  _| |  \| | | |  | ||  \| |  _| | |
 ___) | |___| |\  | | |  | || |\  | |___| |___
|____/|_____|_| \_| |_| |___|_| \_|_____|_____|

  Decision & Monitoring Core — Trading Assistant
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML (defaults when absent)
    let cfg = AppConfig::load_or_default("config.toml")?;

    // Initialise structured logging
    init_logging();

    println!("{BANNER}");
    info!(
        mode = %cfg.gate.mode,
        threshold = cfg.gate.auto_execute_threshold,
        approach_pct = cfg.monitor.approach_threshold_pct,
        symbols = ?cfg.engine.prediction_symbols,
        "SENTINEL starting up"
    );

    // -- Collaborators -----------------------------------------------------

    let store = Arc::new(JsonPlanStore::new(&cfg.engine.plan_store_path));
    let sink = Arc::new(LogSink);

    // Monitor events flow through a channel consumed below, decoupled
    // from the monitor's registry lock.
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<sentinel::types::PlanNotification>();
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            info!(
                plan_id = %event.plan_id,
                level = %event.level,
                approaching = event.approaching,
                distance = format!("{:+.2}%", event.distance_pct),
                "Plan level event"
            );
        }
    });

    let monitor = PlanMonitor::new(store.clone(), sink.clone(), cfg.monitor.clone())
        .with_event_sender(events_tx);

    // -- Price feed --------------------------------------------------------

    let mut source: Box<dyn TickSource> = match std::env::var("SENTINEL_REPLAY_FILE") {
        Ok(path) => {
            info!(path, "Replaying recorded ticks");
            Box::new(ReplaySource::from_file(&path)?)
        }
        Err(_) => {
            info!("No replay file configured — using the synthetic demo feed");
            let universe: Vec<(String, f64)> = cfg
                .engine
                .prediction_symbols
                .iter()
                .enumerate()
                .map(|(i, s)| (s.clone(), 100.0 * (i + 1) as f64))
                .collect();

            // Give the demo feed something to watch: one plan per
            // symbol near its base price, unless plans already exist.
            seed_demo_plans(&store, &universe).await;

            Box::new(SyntheticSource::new(universe))
        }
    };

    // -- Engine ------------------------------------------------------------

    let engine = Engine::new(
        ExecutionGate::new(cfg.gate.clone()),
        monitor,
        PredictionTracker::new(),
        Arc::new(MomentumAdvisor),
        sink,
        cfg.tracker.clone(),
        cfg.engine.clone(),
    );

    // A failed load is survivable: start with an empty registry and
    // let the operator retry.
    match engine.monitor().load_plans().await {
        Ok(count) => info!(count, "Plans under watch"),
        Err(e) => warn!(error = %e, "Plan load failed — starting with an empty registry"),
    }

    // -- Main loop ---------------------------------------------------------

    let mut tick_interval =
        tokio::time::interval(Duration::from_secs(cfg.engine.tick_interval_secs.max(1)));
    let mut sweep_interval =
        tokio::time::interval(Duration::from_secs(cfg.engine.sweep_interval_secs.max(1)));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    // Execution bookkeeping lives with the driver; the gate only reads
    // snapshots of it.
    let mut exec_state = ExecutionState::default();

    info!(
        tick_secs = cfg.engine.tick_interval_secs,
        sweep_secs = cfg.engine.sweep_interval_secs,
        "Entering main loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                match source.next_tick().await {
                    Ok(Some(tick)) => {
                        let fired = engine.handle_tick(&tick).await;
                        if !fired.is_empty() {
                            debug!(symbol = %tick.symbol, count = fired.len(), "Level notifications fired");
                        }
                    }
                    Ok(None) => {
                        info!("Tick stream ended.");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "Tick fetch failed — continuing");
                    }
                }
            }
            _ = sweep_interval.tick() => {
                run_sweep(&engine, &cfg, &mut exec_state).await;
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    let stats = engine.tracker().stats();
    info!(
        plans = engine.monitor().plan_count(),
        predictions_tracked = stats.tracked,
        resolved = stats.total,
        win_rate = format!("{:.1}%", stats.win_rate),
        "SENTINEL shut down cleanly."
    );

    Ok(())
}

/// One timer pass: resolve expired predictions, ask for new ones, and
/// run any resulting proposal through the gate.
async fn run_sweep(engine: &Engine, cfg: &AppConfig, exec_state: &mut ExecutionState) {
    let resolved = engine.run_expiry_sweep().await;
    for prediction in &resolved {
        info!(id = %prediction.id, "{prediction}");
    }

    for symbol in &cfg.engine.prediction_symbols {
        match engine.seek_prediction(symbol).await {
            Ok(Some(prediction)) => {
                // Feed the fresh forecast through the gate as a trade
                // proposal; the decision pipeline proper is external.
                let decision = TradeDecision {
                    symbol: prediction.symbol.clone(),
                    action: prediction.action,
                    confidence: prediction.confidence,
                    reasoning: prediction.reasoning.clone(),
                    risk: None,
                    consensus: None,
                };
                let verdict = engine.consider(&decision, exec_state).await;
                if verdict.allow {
                    exec_state.daily_trade_count += 1;
                    exec_state.last_trade_at = Some(chrono::Utc::now());
                }
            }
            Ok(None) => {}
            Err(e) => warn!(symbol, error = %e, "Prediction generation failed"),
        }
    }

    let statuses = engine.monitor().get_all_plan_statuses(&engine.latest_prices());
    for status in &statuses {
        debug!(
            plan_id = %status.plan_id,
            symbol = %status.symbol,
            levels = status.levels.len(),
            "Plan status"
        );
    }

    info!(stats = %engine.tracker().stats(), "Sweep complete");
}

/// Create one pending plan per demo symbol if the store is empty.
async fn seed_demo_plans(store: &JsonPlanStore, universe: &[(String, f64)]) {
    use sentinel::storage::{PlanFilter, PlanStore};

    match store.plans(PlanFilter::any()).await {
        Ok(existing) if existing.is_empty() => {
            for (symbol, base) in universe {
                if let Err(e) = store.create_plan(
                    symbol,
                    Some(base * 1.01),
                    Some(base * 0.97),
                    Some(base * 1.05),
                    None,
                    None,
                ) {
                    warn!(symbol, error = %e, "Demo plan creation failed");
                }
            }
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Could not inspect plan store"),
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sentinel=info"));

    let json_logging = std::env::var("SENTINEL_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
