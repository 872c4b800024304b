//! Plan monitor — watches trade plans against the live tick stream.
//!
//! Owns a registry of plans keyed by instrument symbol, consumes price
//! observations one at a time, and emits notifications when a plan's
//! entry/stop/target levels are approached or crossed. Plans are
//! loaded from the persistence collaborator; notifications go out
//! through the alert sink and an optional event channel, always after
//! the registry lock has been released.

pub mod levels;

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::alerts::{Alert, AlertSink};
use crate::config::MonitorConfig;
use crate::storage::{PlanFilter, PlanStore};
use crate::types::{LevelKind, PlanNotification, PlanStatus, PriceTick, TradePlan};

// ---------------------------------------------------------------------------
// Per-plan monitoring state
// ---------------------------------------------------------------------------

/// A loaded plan plus the bookkeeping the monitor keeps for it.
#[derive(Debug, Clone)]
pub struct PlanState {
    pub plan: TradePlan,
    /// Levels that have already fired under notify-once.
    pub notified: HashSet<LevelKind>,
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Price observed on the previous tick; crossing detection needs it.
    pub last_price: Option<f64>,
}

impl PlanState {
    fn new(plan: TradePlan) -> Self {
        Self {
            plan,
            notified: HashSet::new(),
            last_checked_at: None,
            last_price: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Read-only projections
// ---------------------------------------------------------------------------

/// Distance of the current price from one plan level.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LevelDistance {
    pub level: LevelKind,
    pub price: f64,
    /// Absent when no current price is known for the symbol.
    pub distance_pct: Option<f64>,
    pub notified: bool,
}

/// Display snapshot of one monitored plan. Copies only — the registry
/// is never exposed by reference.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PlanStatusView {
    pub plan_id: String,
    pub symbol: String,
    pub status: PlanStatus,
    pub current_price: Option<f64>,
    pub levels: Vec<LevelDistance>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

pub struct PlanMonitor {
    store: Arc<dyn PlanStore>,
    sink: Arc<dyn AlertSink>,
    config: MonitorConfig,
    /// Plans grouped by symbol. One exclusive lock, held only for
    /// registry mutation — never across a collaborator call.
    registry: RwLock<HashMap<String, Vec<PlanState>>>,
    events: Option<UnboundedSender<PlanNotification>>,
}

impl PlanMonitor {
    pub fn new(store: Arc<dyn PlanStore>, sink: Arc<dyn AlertSink>, config: MonitorConfig) -> Self {
        Self {
            store,
            sink,
            config,
            registry: RwLock::new(HashMap::new()),
            events: None,
        }
    }

    /// Attach an event channel; every fired notification is pushed onto
    /// it in addition to the alert sink.
    pub fn with_event_sender(mut self, events: UnboundedSender<PlanNotification>) -> Self {
        self.events = Some(events);
        self
    }

    /// Replace the registry with pending/active plans from the store.
    ///
    /// Propagates the store error unmodified; on failure the previous
    /// registry is left untouched. Returns the number of plans loaded.
    pub async fn load_plans(&self) -> Result<usize> {
        // Fetch before taking the lock — no I/O under the lock.
        let plans = self.store.plans(PlanFilter::monitorable()).await?;

        let mut fresh: HashMap<String, Vec<PlanState>> = HashMap::new();
        for plan in plans {
            fresh
                .entry(plan.symbol.clone())
                .or_default()
                .push(PlanState::new(plan));
        }
        let count = fresh.values().map(Vec::len).sum();

        *self.registry.write().expect("plan registry lock poisoned") = fresh;
        info!(count, "Plan registry loaded");
        Ok(count)
    }

    /// Register one plan without a full reload.
    pub fn add_plan(&self, plan: TradePlan) {
        if !plan.status.is_monitorable() {
            debug!(plan_id = %plan.id, status = %plan.status, "Registering a non-monitorable plan");
        }
        let mut registry = self.registry.write().expect("plan registry lock poisoned");
        debug!(plan_id = %plan.id, symbol = %plan.symbol, "Plan added to monitor");
        registry
            .entry(plan.symbol.clone())
            .or_default()
            .push(PlanState::new(plan));
    }

    /// Drop a plan by id, independent of its persisted status.
    /// Returns whether it was registered.
    pub fn remove_plan(&self, id: &str) -> bool {
        let mut registry = self.registry.write().expect("plan registry lock poisoned");
        let mut removed = false;
        registry.retain(|_, states| {
            let before = states.len();
            states.retain(|s| s.plan.id != id);
            removed |= states.len() != before;
            !states.is_empty()
        });
        if removed {
            debug!(plan_id = id, "Plan removed from monitor");
        }
        removed
    }

    /// Number of plans currently registered.
    pub fn plan_count(&self) -> usize {
        self.registry
            .read()
            .expect("plan registry lock poisoned")
            .values()
            .map(Vec::len)
            .sum()
    }

    /// Clear the notified set for one plan so its levels can fire again.
    pub fn reset_notifications(&self, id: &str) -> bool {
        let mut registry = self.registry.write().expect("plan registry lock poisoned");
        for states in registry.values_mut() {
            if let Some(state) = states.iter_mut().find(|s| s.plan.id == id) {
                state.notified.clear();
                debug!(plan_id = id, "Plan notifications reset");
                return true;
            }
        }
        false
    }

    /// The hot path: evaluate every registered plan for the tick's
    /// symbol against its last-traded price.
    ///
    /// Returns the fired notifications after delivering them to the
    /// event channel and the alert sink; a failed delivery is logged
    /// and never blocks the rest (at-most-once, no retry here).
    pub async fn check(&self, tick: &PriceTick) -> Vec<PlanNotification> {
        let fired = self.evaluate_tick(tick);

        for notification in &fired {
            if let Some(events) = &self.events {
                if events.send(notification.clone()).is_err() {
                    debug!("Event receiver dropped, skipping event delivery");
                }
            }
            if let Err(e) = self.sink.send(&Alert::from_notification(notification)).await {
                warn!(
                    plan_id = %notification.plan_id,
                    level = %notification.level,
                    error = %e,
                    "Alert delivery failed"
                );
            }
        }

        fired
    }

    /// Level evaluation under the registry write lock. Pure with
    /// respect to collaborators: only registry state is touched.
    fn evaluate_tick(&self, tick: &PriceTick) -> Vec<PlanNotification> {
        let mut fired = Vec::new();
        let mut registry = self.registry.write().expect("plan registry lock poisoned");

        let Some(states) = registry.get_mut(&tick.symbol) else {
            return fired;
        };

        for state in states.iter_mut() {
            // All level checks for this tick see the price observed
            // before it; the state is advanced only afterwards.
            let prev = state.last_price;

            for (kind, level_price) in state.plan.levels() {
                if self.config.notify_once && state.notified.contains(&kind) {
                    continue;
                }

                let distance = levels::distance_pct(tick.last, level_price);
                let mut hit = false;

                if levels::is_approaching(distance, self.config.approach_threshold_pct) {
                    fired.push(self.notification(state, kind, level_price, tick, distance, true));
                    hit = true;
                }

                if let Some(prev) = prev {
                    if levels::crossed(prev, tick.last, level_price) {
                        fired.push(self.notification(state, kind, level_price, tick, distance, false));
                        hit = true;
                    }
                }

                if hit {
                    state.notified.insert(kind);
                }
            }

            state.last_checked_at = Some(tick.timestamp);
            state.last_price = Some(tick.last);
        }

        fired
    }

    fn notification(
        &self,
        state: &PlanState,
        level: LevelKind,
        level_price: f64,
        tick: &PriceTick,
        distance_pct: f64,
        approaching: bool,
    ) -> PlanNotification {
        PlanNotification {
            plan_id: state.plan.id.clone(),
            symbol: state.plan.symbol.clone(),
            level,
            level_price,
            current_price: tick.last,
            distance_pct,
            approaching,
            at: tick.timestamp,
        }
    }

    /// Snapshot of one plan's level distances at the given price.
    /// Read-only; never touches notified-state.
    pub fn get_plan_status(&self, id: &str, current_price: f64) -> Option<PlanStatusView> {
        let registry = self.registry.read().expect("plan registry lock poisoned");
        registry
            .values()
            .flatten()
            .find(|s| s.plan.id == id)
            .map(|s| Self::status_view(s, Some(current_price)))
    }

    /// Snapshots for every registered plan; symbols missing from the
    /// price map get a view without distances.
    pub fn get_all_plan_statuses(&self, prices: &HashMap<String, f64>) -> Vec<PlanStatusView> {
        let registry = self.registry.read().expect("plan registry lock poisoned");
        let mut views: Vec<PlanStatusView> = registry
            .values()
            .flatten()
            .map(|s| Self::status_view(s, prices.get(&s.plan.symbol).copied()))
            .collect();
        views.sort_by(|a, b| a.plan_id.cmp(&b.plan_id));
        views
    }

    fn status_view(state: &PlanState, current_price: Option<f64>) -> PlanStatusView {
        let levels = state
            .plan
            .levels()
            .into_iter()
            .map(|(kind, price)| LevelDistance {
                level: kind,
                price,
                distance_pct: current_price.map(|p| levels::distance_pct(p, price)),
                notified: state.notified.contains(&kind),
            })
            .collect();

        PlanStatusView {
            plan_id: state.plan.id.clone(),
            symbol: state.plan.symbol.clone(),
            status: state.plan.status,
            current_price,
            levels,
            last_checked_at: state.last_checked_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
