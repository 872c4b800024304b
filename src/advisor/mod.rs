//! Prediction generation seam.
//!
//! Defines the `Advisor` trait the driver calls to produce new
//! predictions. The request deliberately carries the tracker's own
//! recent outcomes and stats so a generator can adapt to its track
//! record. LLM-backed advisors live outside this crate; the built-in
//! `MomentumAdvisor` is a deterministic heuristic that keeps the
//! assistant functional offline.

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::tracker::PredictionDraft;
use crate::types::{Candle, PaperStats, Prediction, TradeAction};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Everything a generator gets to see for one symbol.
#[derive(Debug, Clone)]
pub struct PredictionRequest {
    pub symbol: String,
    pub current_price: f64,
    /// Oldest first.
    pub candles: Vec<Candle>,
    /// The tracker's recent resolved predictions for this symbol.
    pub recent_outcomes: Vec<Prediction>,
    /// The tracker's running aggregates.
    pub stats: PaperStats,
    /// Outputs below this confidence are "no prediction".
    pub min_confidence: f64,
    pub window_minutes: i64,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Abstraction over prediction generators.
///
/// Returns `Ok(None)` when the generator declines to forecast —
/// below-threshold confidence is a normal outcome, not an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Advisor: Send + Sync {
    async fn predict(&self, request: &PredictionRequest) -> Result<Option<PredictionDraft>>;

    /// Generator name for logging and identification.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Momentum heuristic
// ---------------------------------------------------------------------------

/// Deterministic momentum-following generator.
///
/// Direction follows the close-to-close drift over the candle window;
/// confidence scales with the drift magnitude and is discounted when
/// the tracker's own record says the generator has been cold.
pub struct MomentumAdvisor;

impl MomentumAdvisor {
    /// Minimum candles before a forecast is attempted.
    const MIN_CANDLES: usize = 5;
    const BASE_CONFIDENCE: f64 = 55.0;
    const MAX_CONFIDENCE: f64 = 90.0;
    /// Confidence points per percent of drift.
    const DRIFT_WEIGHT: f64 = 8.0;
    /// Discount applied when win rate has been poor over a real sample.
    const COLD_STREAK_DISCOUNT: f64 = 10.0;
    const TARGET_PCT: f64 = 1.5;
    const STOP_PCT: f64 = 1.0;

    fn drift_pct(candles: &[Candle], current_price: f64) -> Option<f64> {
        let first = candles.first()?;
        if first.close <= 0.0 {
            return None;
        }
        Some((current_price - first.close) / first.close * 100.0)
    }
}

#[async_trait]
impl Advisor for MomentumAdvisor {
    async fn predict(&self, request: &PredictionRequest) -> Result<Option<PredictionDraft>> {
        if request.candles.len() < Self::MIN_CANDLES {
            debug!(
                symbol = %request.symbol,
                candles = request.candles.len(),
                "Not enough history to forecast"
            );
            return Ok(None);
        }

        let Some(drift) = Self::drift_pct(&request.candles, request.current_price) else {
            return Ok(None);
        };
        if drift == 0.0 {
            return Ok(None);
        }

        let action = if drift > 0.0 {
            TradeAction::Buy
        } else {
            TradeAction::Sell
        };

        let mut confidence =
            (Self::BASE_CONFIDENCE + drift.abs() * Self::DRIFT_WEIGHT).min(Self::MAX_CONFIDENCE);
        // Adapt to the tracker's feedback: a cold record earns less trust.
        if request.stats.total >= 5 && request.stats.win_rate < 40.0 {
            confidence -= Self::COLD_STREAK_DISCOUNT;
        }

        if confidence < request.min_confidence {
            debug!(
                symbol = %request.symbol,
                confidence = format!("{confidence:.1}"),
                threshold = request.min_confidence,
                "No prediction: confidence below threshold"
            );
            return Ok(None);
        }

        let price = request.current_price;
        let (target_price, stop_loss) = match action {
            TradeAction::Sell => (
                price * (1.0 - Self::TARGET_PCT / 100.0),
                price * (1.0 + Self::STOP_PCT / 100.0),
            ),
            _ => (
                price * (1.0 + Self::TARGET_PCT / 100.0),
                price * (1.0 - Self::STOP_PCT / 100.0),
            ),
        };

        Ok(Some(PredictionDraft {
            symbol: request.symbol.clone(),
            action,
            confidence,
            entry_price: price,
            target_price,
            stop_loss,
            window_minutes: request.window_minutes,
            reasoning: format!(
                "{:.2}% drift over {} candles",
                drift,
                request.candles.len(),
            ),
        }))
    }

    fn name(&self) -> &str {
        "momentum"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
