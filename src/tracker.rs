//! Prediction tracker — the paper-trading scoreboard.
//!
//! Owns the lifecycle of outstanding predictions and evaluates them
//! against incoming prices or elapsed time. Resolved predictions move
//! from the active registry into an append-only history exactly once,
//! and the running `PaperStats` are updated incrementally on every
//! resolution. All read APIs return copies; the single lock is never
//! held across a collaborator call.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, info};

use crate::types::{minutes, PaperStats, Prediction, PredictionOutcome, TradeAction};

// ---------------------------------------------------------------------------
// Draft input
// ---------------------------------------------------------------------------

/// The structured output of the prediction-generation collaborator,
/// before the tracker assigns it an id and a window.
#[derive(Debug, Clone)]
pub struct PredictionDraft {
    pub symbol: String,
    pub action: TradeAction,
    /// Self-reported confidence (0–100).
    pub confidence: f64,
    pub entry_price: f64,
    pub target_price: f64,
    pub stop_loss: f64,
    pub window_minutes: i64,
    pub reasoning: String,
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// Active registry, history, and stats move together under one lock so
/// projections always see a consistent snapshot.
#[derive(Debug, Default)]
struct TrackerInner {
    active: HashMap<String, Prediction>,
    history: Vec<Prediction>,
    stats: PaperStats,
}

#[derive(Debug, Default)]
pub struct PredictionTracker {
    inner: RwLock<TrackerInner>,
}

impl PredictionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new prediction. Assigns an id from the symbol and
    /// the creation timestamp, and folds the confidence into the
    /// running average. Returns a copy of the stored prediction.
    pub fn add(&self, draft: PredictionDraft) -> Prediction {
        let created_at = Utc::now();
        let nanos = created_at.timestamp_nanos_opt().unwrap_or_default();
        let prediction = Prediction {
            id: format!("{}-{}", draft.symbol, nanos),
            symbol: draft.symbol,
            action: draft.action,
            confidence: draft.confidence,
            entry_price: draft.entry_price,
            target_price: draft.target_price,
            stop_loss: draft.stop_loss,
            window_minutes: draft.window_minutes,
            created_at,
            expires_at: created_at + minutes(draft.window_minutes),
            reasoning: draft.reasoning,
            evaluated: false,
            exit_price: None,
            outcome: None,
            pnl_percent: None,
        };

        let mut inner = self.inner.write().expect("prediction registry lock poisoned");
        inner.stats.record_added(prediction.confidence);
        inner.active.insert(prediction.id.clone(), prediction.clone());
        info!(
            id = %prediction.id,
            action = %prediction.action,
            confidence = prediction.confidence,
            "Prediction tracked"
        );
        prediction
    }

    /// On-demand evaluation of one prediction at the given price.
    pub fn evaluate(&self, id: &str, current_price: f64) -> Option<Prediction> {
        self.evaluate_at(id, current_price, Utc::now())
    }

    /// Evaluation with an explicit clock.
    ///
    /// Classification: once the window has elapsed the prediction
    /// resolves Right on positive P&L and Expired otherwise; before
    /// that, reaching the target resolves Right and reaching the stop
    /// resolves Wrong. Anything else leaves the prediction active for
    /// a later call.
    ///
    /// Returns `Some` only when this call resolved the prediction.
    /// An unknown or already-evaluated id is a no-op returning `None`.
    pub fn evaluate_at(
        &self,
        id: &str,
        current_price: f64,
        now: DateTime<Utc>,
    ) -> Option<Prediction> {
        let mut inner = self.inner.write().expect("prediction registry lock poisoned");

        let outcome = {
            let prediction = inner.active.get(id)?;
            let pnl = prediction.pnl_percent_at(current_price);
            if prediction.is_expired_at(now) {
                if pnl > 0.0 {
                    Some(PredictionOutcome::Right)
                } else {
                    Some(PredictionOutcome::Expired)
                }
            } else if prediction.target_reached(current_price) {
                Some(PredictionOutcome::Right)
            } else if prediction.stop_hit(current_price) {
                Some(PredictionOutcome::Wrong)
            } else {
                None
            }
        };
        let outcome = outcome?;

        let prediction = inner.active.remove(id)?;
        Some(Self::resolve(&mut inner, prediction, outcome, current_price))
    }

    /// Timer-driven sweep: force-resolve every active prediction whose
    /// window has elapsed and whose symbol has a current price,
    /// classifying purely on P&L sign (Right on gain, Wrong otherwise
    /// — time is the terminal condition, targets and stops are not
    /// re-checked). Returns the newly resolved predictions.
    pub fn check_expired(&self, prices: &HashMap<String, f64>) -> Vec<Prediction> {
        self.check_expired_at(prices, Utc::now())
    }

    pub fn check_expired_at(
        &self,
        prices: &HashMap<String, f64>,
        now: DateTime<Utc>,
    ) -> Vec<Prediction> {
        let mut inner = self.inner.write().expect("prediction registry lock poisoned");

        let due: Vec<String> = inner
            .active
            .values()
            .filter(|p| p.is_expired_at(now) && prices.contains_key(&p.symbol))
            .map(|p| p.id.clone())
            .collect();

        let mut resolved = Vec::with_capacity(due.len());
        for id in due {
            let Some(prediction) = inner.active.remove(&id) else {
                continue;
            };
            let Some(price) = prices.get(&prediction.symbol).copied() else {
                continue;
            };
            let outcome = if prediction.pnl_percent_at(price) > 0.0 {
                PredictionOutcome::Right
            } else {
                PredictionOutcome::Wrong
            };
            resolved.push(Self::resolve(&mut inner, prediction, outcome, price));
        }

        if !resolved.is_empty() {
            debug!(count = resolved.len(), "Expired predictions resolved");
        }
        resolved
    }

    /// Apply one resolution: mutate the prediction, append to history,
    /// fold into the stats. The prediction never changes again.
    fn resolve(
        inner: &mut TrackerInner,
        mut prediction: Prediction,
        outcome: PredictionOutcome,
        exit_price: f64,
    ) -> Prediction {
        let pnl = prediction.pnl_percent_at(exit_price);
        prediction.evaluated = true;
        prediction.exit_price = Some(exit_price);
        prediction.outcome = Some(outcome);
        prediction.pnl_percent = Some(pnl);

        inner.history.push(prediction.clone());
        inner.stats.record_resolved(outcome, pnl);

        info!(
            id = %prediction.id,
            outcome = %outcome,
            pnl = format!("{pnl:+.2}%"),
            win_rate = format!("{:.1}%", inner.stats.win_rate),
            "Prediction resolved"
        );
        prediction
    }

    /// Copies of all unevaluated predictions, oldest first.
    pub fn active(&self) -> Vec<Prediction> {
        let inner = self.inner.read().expect("prediction registry lock poisoned");
        let mut predictions: Vec<Prediction> = inner.active.values().cloned().collect();
        predictions.sort_by_key(|p| p.created_at);
        predictions
    }

    /// Snapshot of the running aggregates.
    pub fn stats(&self) -> PaperStats {
        self.inner
            .read()
            .expect("prediction registry lock poisoned")
            .stats
            .clone()
    }

    /// The last `n` resolved predictions, most recent first.
    pub fn recent_history(&self, n: usize) -> Vec<Prediction> {
        let inner = self.inner.read().expect("prediction registry lock poisoned");
        inner.history.iter().rev().take(n).cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn buy_draft() -> PredictionDraft {
        PredictionDraft {
            symbol: "AAPL".to_string(),
            action: TradeAction::Buy,
            confidence: 80.0,
            entry_price: 100.0,
            target_price: 105.0,
            stop_loss: 97.0,
            window_minutes: 60,
            reasoning: "momentum".to_string(),
        }
    }

    fn sell_draft() -> PredictionDraft {
        PredictionDraft {
            symbol: "MSFT".to_string(),
            action: TradeAction::Sell,
            confidence: 70.0,
            entry_price: 400.0,
            target_price: 392.0,
            stop_loss: 406.0,
            window_minutes: 30,
            reasoning: "exhaustion".to_string(),
        }
    }

    #[test]
    fn test_add_assigns_id_and_window() {
        let tracker = PredictionTracker::new();
        let p = tracker.add(buy_draft());
        assert!(p.id.starts_with("AAPL-"));
        assert_eq!(p.expires_at - p.created_at, minutes(60));
        assert!(!p.evaluated);
        assert_eq!(tracker.active().len(), 1);
        assert_eq!(tracker.stats().tracked, 1);
        assert!((tracker.stats().avg_confidence - 80.0).abs() < 1e-10);
    }

    #[test]
    fn test_add_updates_running_avg_confidence() {
        let tracker = PredictionTracker::new();
        tracker.add(buy_draft()); // 80
        tracker.add(sell_draft()); // 70
        assert!((tracker.stats().avg_confidence - 75.0).abs() < 1e-10);
    }

    #[test]
    fn test_evaluate_target_hit_resolves_right() {
        // BUY entry 100, target 105, evaluated at 105 before expiry.
        let tracker = PredictionTracker::new();
        let p = tracker.add(buy_draft());

        let resolved = tracker.evaluate(&p.id, 105.0).unwrap();
        assert_eq!(resolved.outcome, Some(PredictionOutcome::Right));
        assert!((resolved.pnl_percent.unwrap() - 5.0).abs() < 1e-9);
        assert_eq!(resolved.exit_price, Some(105.0));
        assert!(resolved.evaluated);

        assert!(tracker.active().is_empty());
        assert_eq!(tracker.recent_history(10).len(), 1);
    }

    #[test]
    fn test_evaluate_stop_hit_resolves_wrong() {
        // BUY stop 97, evaluated at 97 before expiry.
        let tracker = PredictionTracker::new();
        let p = tracker.add(buy_draft());

        let resolved = tracker.evaluate(&p.id, 97.0).unwrap();
        assert_eq!(resolved.outcome, Some(PredictionOutcome::Wrong));
        assert!((resolved.pnl_percent.unwrap() - (-3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_evaluate_after_expiry_right_or_expired() {
        // Past the window: 101 resolves RIGHT, 99 resolves EXPIRED.
        let tracker = PredictionTracker::new();
        let p1 = tracker.add(buy_draft());
        let p2 = tracker.add(buy_draft());
        let later = Utc::now() + minutes(61);

        let resolved = tracker.evaluate_at(&p1.id, 101.0, later).unwrap();
        assert_eq!(resolved.outcome, Some(PredictionOutcome::Right));
        assert!(resolved.pnl_percent.unwrap() > 0.0);

        let resolved = tracker.evaluate_at(&p2.id, 99.0, later).unwrap();
        assert_eq!(resolved.outcome, Some(PredictionOutcome::Expired));
    }

    #[test]
    fn test_evaluate_unresolved_keeps_prediction_active() {
        let tracker = PredictionTracker::new();
        let p = tracker.add(buy_draft());

        // 102: no target, no stop, window still open.
        assert!(tracker.evaluate(&p.id, 102.0).is_none());
        assert_eq!(tracker.active().len(), 1);

        // Still evaluable until it resolves.
        assert!(tracker.evaluate(&p.id, 105.0).is_some());
    }

    #[test]
    fn test_evaluate_unknown_or_resolved_id_is_noop() {
        let tracker = PredictionTracker::new();
        assert!(tracker.evaluate("nope", 100.0).is_none());

        let p = tracker.add(buy_draft());
        tracker.evaluate(&p.id, 105.0).unwrap();
        // A second evaluation of the same id resolves nothing and
        // leaves the history untouched.
        assert!(tracker.evaluate(&p.id, 97.0).is_none());
        assert_eq!(tracker.recent_history(10).len(), 1);
        assert_eq!(tracker.stats().total, 1);
    }

    #[test]
    fn test_sell_prediction_directionality() {
        let tracker = PredictionTracker::new();
        let p = tracker.add(sell_draft());

        // Price falls to target: a short gains.
        let resolved = tracker.evaluate(&p.id, 392.0).unwrap();
        assert_eq!(resolved.outcome, Some(PredictionOutcome::Right));
        assert!((resolved.pnl_percent.unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_check_expired_resolves_on_pnl_sign() {
        let tracker = PredictionTracker::new();
        let winner = tracker.add(buy_draft());
        let loser = tracker.add(sell_draft());
        let later = Utc::now() + minutes(120);

        let mut prices = HashMap::new();
        prices.insert("AAPL".to_string(), 101.0); // +1% for the long
        prices.insert("MSFT".to_string(), 404.0); // -1% for the short

        let resolved = tracker.check_expired_at(&prices, later);
        assert_eq!(resolved.len(), 2);

        let w = resolved.iter().find(|p| p.id == winner.id).unwrap();
        let l = resolved.iter().find(|p| p.id == loser.id).unwrap();
        assert_eq!(w.outcome, Some(PredictionOutcome::Right));
        assert_eq!(l.outcome, Some(PredictionOutcome::Wrong));
        assert!(tracker.active().is_empty());
    }

    #[test]
    fn test_check_expired_skips_unexpired_and_unpriced() {
        let tracker = PredictionTracker::new();
        tracker.add(buy_draft()); // AAPL, 60m window
        tracker.add(sell_draft()); // MSFT, 30m window

        let mut prices = HashMap::new();
        prices.insert("AAPL".to_string(), 101.0);

        // 45 minutes in: MSFT is due but has no price; AAPL has a
        // price but is not due.
        let resolved = tracker.check_expired_at(&prices, Utc::now() + minutes(45));
        assert!(resolved.is_empty());
        assert_eq!(tracker.active().len(), 2);
    }

    #[test]
    fn test_stats_consistency_over_batch() {
        // After N resolutions, counts and win rate line up.
        let tracker = PredictionTracker::new();
        let outcomes = [105.0, 97.0, 105.0, 97.0, 105.0]; // R, W, R, W, R
        for price in outcomes {
            let p = tracker.add(buy_draft());
            tracker.evaluate(&p.id, price).unwrap();
        }

        let stats = tracker.stats();
        assert_eq!(stats.total, 5);
        assert_eq!(stats.right + stats.wrong + stats.expired, 5);
        assert_eq!(stats.right, 3);
        assert!((stats.win_rate - 60.0).abs() < 1e-9);
        assert!((stats.best_pnl_percent - 5.0).abs() < 1e-9);
        assert!((stats.worst_pnl_percent - (-3.0)).abs() < 1e-9);
        // Mean of [5, -3, 5, -3, 5].
        assert!((stats.avg_pnl_percent - 1.8).abs() < 1e-9);
    }

    #[test]
    fn test_recent_history_most_recent_first() {
        let tracker = PredictionTracker::new();
        let first = tracker.add(buy_draft());
        let second = tracker.add(buy_draft());
        tracker.evaluate(&first.id, 105.0).unwrap();
        tracker.evaluate(&second.id, 97.0).unwrap();

        let recent = tracker.recent_history(1);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, second.id);

        let all = tracker.recent_history(10);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].id, first.id);
    }

    #[test]
    fn test_history_entries_never_mutate() {
        let tracker = PredictionTracker::new();
        let p = tracker.add(buy_draft());
        tracker.evaluate(&p.id, 105.0).unwrap();

        let before = tracker.recent_history(1);
        // Sweeps and further evaluations cannot touch resolved entries.
        tracker.check_expired_at(&HashMap::new(), Utc::now() + minutes(120));
        let _ = tracker.evaluate(&p.id, 50.0);
        let after = tracker.recent_history(1);

        assert_eq!(before[0].exit_price, after[0].exit_price);
        assert_eq!(before[0].outcome, after[0].outcome);
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let tracker = PredictionTracker::new();
        let p = tracker.add(buy_draft());
        // Exactly at expires_at counts as elapsed.
        let resolved = tracker.evaluate_at(&p.id, 99.0, p.expires_at).unwrap();
        assert_eq!(resolved.outcome, Some(PredictionOutcome::Expired));
    }
}
