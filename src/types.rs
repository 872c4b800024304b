//! Shared types for the SENTINEL core.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that the gate, monitor,
//! tracker, and collaborator modules can depend on them without
//! circular references.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Trade decisions
// ---------------------------------------------------------------------------

/// Direction of a proposed trade (or a prediction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
}

impl TradeAction {
    /// Whether there is anything to execute for this action.
    pub fn is_executable(&self) -> bool {
        !matches!(self, TradeAction::Hold)
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "BUY"),
            TradeAction::Sell => write!(f, "SELL"),
            TradeAction::Hold => write!(f, "HOLD"),
        }
    }
}

impl std::str::FromStr for TradeAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BUY" | "LONG" => Ok(TradeAction::Buy),
            "SELL" | "SHORT" => Ok(TradeAction::Sell),
            "HOLD" | "WAIT" => Ok(TradeAction::Hold),
            _ => Err(anyhow::anyhow!("Unknown trade action: {s}")),
        }
    }
}

/// Outcome of an upstream risk evaluation attached to a decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskCheck {
    pub approved: bool,
    /// Ordered list of violated rules (empty when approved).
    pub violations: Vec<String>,
}

impl RiskCheck {
    pub fn approved() -> Self {
        Self {
            approved: true,
            violations: Vec::new(),
        }
    }

    pub fn rejected(violations: Vec<String>) -> Self {
        Self {
            approved: false,
            violations,
        }
    }
}

/// Agreement ratio among the independent signal agents backing a decision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Consensus {
    pub agreeing_agents: u32,
    pub total_agents: u32,
}

impl Consensus {
    /// Every agent agrees with the proposed action.
    pub fn is_unanimous(&self) -> bool {
        self.total_agents > 0 && self.agreeing_agents == self.total_agents
    }
}

impl fmt::Display for Consensus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} agents", self.agreeing_agents, self.total_agents)
    }
}

/// A trade decision produced by the (external) decision pipeline.
///
/// Immutable input to the execution gate; the gate never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeDecision {
    pub symbol: String,
    pub action: TradeAction,
    /// Self-reported confidence (0–100).
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default)]
    pub risk: Option<RiskCheck>,
    #[serde(default)]
    pub consensus: Option<Consensus>,
}

impl fmt::Display for TradeDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} conf={:.0}%", self.action, self.symbol, self.confidence)
    }
}

/// Snapshot of the caller's execution bookkeeping at decision time.
///
/// Owned by the caller; the gate only reads it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExecutionState {
    pub daily_trade_count: u32,
    pub daily_loss_amount: f64,
    pub last_trade_at: Option<DateTime<Utc>>,
    pub consecutive_losses: u32,
}

/// Verdict of the execution gate for one decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateResult {
    pub allow: bool,
    /// Empty if and only if `allow` is true.
    pub block_reason: String,
    /// Check names passed before the first failure, in evaluation order.
    pub checks_passed: Vec<String>,
    /// The single failing check, if any.
    pub checks_failed: Vec<String>,
}

impl fmt::Display for GateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.allow {
            write!(f, "ALLOW ({} checks passed)", self.checks_passed.len())
        } else {
            write!(f, "BLOCK: {}", self.block_reason)
        }
    }
}

/// Execution operating mode.
///
/// An unrecognized mode string deserialises to `Unknown`, which the
/// gate treats as a hard deny — misconfiguration, not a trading signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    Manual,
    NotifyOnly,
    SemiAuto,
    FullAuto,
    Unknown,
}

impl Serialize for OperatingMode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for OperatingMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(parse_mode(&s))
    }
}

fn parse_mode(s: &str) -> OperatingMode {
    match s.to_lowercase().as_str() {
        "manual" => OperatingMode::Manual,
        "notify_only" | "notify-only" => OperatingMode::NotifyOnly,
        "semi_auto" | "semi-auto" => OperatingMode::SemiAuto,
        "full_auto" | "full-auto" => OperatingMode::FullAuto,
        _ => OperatingMode::Unknown,
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatingMode::Manual => write!(f, "manual"),
            OperatingMode::NotifyOnly => write!(f, "notify_only"),
            OperatingMode::SemiAuto => write!(f, "semi_auto"),
            OperatingMode::FullAuto => write!(f, "full_auto"),
            OperatingMode::Unknown => write!(f, "unknown"),
        }
    }
}

impl std::str::FromStr for OperatingMode {
    type Err = std::convert::Infallible;

    /// Never fails: anything unrecognized becomes `Unknown` so the
    /// misconfiguration surfaces as a gate denial instead of a parse error.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(parse_mode(s))
    }
}

// ---------------------------------------------------------------------------
// Market data
// ---------------------------------------------------------------------------

/// A single price observation for one instrument.
///
/// Symbol and last-traded price are the only required fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTick {
    pub symbol: String,
    pub last: f64,
    #[serde(default)]
    pub prev_close: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl PriceTick {
    pub fn new(symbol: &str, last: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.to_string(),
            last,
            prev_close: None,
            volume: None,
            timestamp,
        }
    }

    /// Change from previous close as a signed percentage, if known.
    pub fn change_pct(&self) -> Option<f64> {
        self.prev_close
            .filter(|c| *c != 0.0)
            .map(|c| (self.last - c) / c * 100.0)
    }
}

impl fmt::Display for PriceTick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {:.4}", self.symbol, self.last)
    }
}

/// An aggregated OHLCV bar, supplied to the prediction advisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub start: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

// ---------------------------------------------------------------------------
// Trade plans
// ---------------------------------------------------------------------------

/// Lifecycle status of a persisted trade plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Pending,
    Active,
    Done,
    Cancelled,
}

impl PlanStatus {
    /// Statuses worth watching against live prices.
    pub fn is_monitorable(&self) -> bool {
        matches!(self, PlanStatus::Pending | PlanStatus::Active)
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStatus::Pending => write!(f, "pending"),
            PlanStatus::Active => write!(f, "active"),
            PlanStatus::Done => write!(f, "done"),
            PlanStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// The five price levels a plan can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelKind {
    Entry,
    StopLoss,
    Target1,
    Target2,
    Target3,
}

impl LevelKind {
    /// Fixed evaluation order — keeps same-tick multi-level behavior
    /// reproducible.
    pub const ALL: &'static [LevelKind] = &[
        LevelKind::Entry,
        LevelKind::StopLoss,
        LevelKind::Target1,
        LevelKind::Target2,
        LevelKind::Target3,
    ];
}

impl fmt::Display for LevelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelKind::Entry => write!(f, "entry"),
            LevelKind::StopLoss => write!(f, "stop_loss"),
            LevelKind::Target1 => write!(f, "target1"),
            LevelKind::Target2 => write!(f, "target2"),
            LevelKind::Target3 => write!(f, "target3"),
        }
    }
}

/// Deserialise a price level; a zero (the legacy "not set" sentinel)
/// becomes `None` so it cannot be confused with a real price.
fn de_level<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.filter(|p| *p > 0.0))
}

/// A persisted trade intent with price levels to watch.
///
/// Created by the planning workflow and owned by the persistence
/// collaborator; the monitor only holds copies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradePlan {
    pub id: String,
    pub symbol: String,
    #[serde(default, deserialize_with = "de_level")]
    pub entry_price: Option<f64>,
    #[serde(default, deserialize_with = "de_level")]
    pub stop_loss: Option<f64>,
    #[serde(default, deserialize_with = "de_level")]
    pub target1: Option<f64>,
    #[serde(default, deserialize_with = "de_level")]
    pub target2: Option<f64>,
    #[serde(default, deserialize_with = "de_level")]
    pub target3: Option<f64>,
    pub status: PlanStatus,
    pub created_at: DateTime<Utc>,
}

impl TradePlan {
    /// The set price levels in `LevelKind::ALL` order.
    pub fn levels(&self) -> Vec<(LevelKind, f64)> {
        LevelKind::ALL
            .iter()
            .filter_map(|kind| self.level(*kind).map(|p| (*kind, p)))
            .collect()
    }

    pub fn level(&self, kind: LevelKind) -> Option<f64> {
        match kind {
            LevelKind::Entry => self.entry_price,
            LevelKind::StopLoss => self.stop_loss,
            LevelKind::Target1 => self.target1,
            LevelKind::Target2 => self.target2,
            LevelKind::Target3 => self.target3,
        }
    }

    /// Helper to build a test plan with entry/stop/one target.
    #[cfg(test)]
    pub fn sample(id: &str, symbol: &str) -> Self {
        TradePlan {
            id: id.to_string(),
            symbol: symbol.to_string(),
            entry_price: Some(100.0),
            stop_loss: Some(95.0),
            target1: Some(110.0),
            target2: None,
            target3: None,
            status: PlanStatus::Active,
            created_at: Utc::now(),
        }
    }
}

impl fmt::Display for TradePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} ({} levels)",
            self.id,
            self.symbol,
            self.status,
            self.levels().len(),
        )
    }
}

/// Event emitted when a plan level is approached or crossed.
///
/// Ephemeral — produced, delivered, never stored by the monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanNotification {
    pub plan_id: String,
    pub symbol: String,
    pub level: LevelKind,
    pub level_price: f64,
    pub current_price: f64,
    /// Signed distance from the level: negative means price is below it.
    pub distance_pct: f64,
    /// True for "approaching", false for "crossed".
    pub approaching: bool,
    pub at: DateTime<Utc>,
}

impl fmt::Display for PlanNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} @ {:.4} (level {:.4}, {:+.2}%)",
            self.symbol,
            if self.approaching { "approaching" } else { "crossed" },
            self.level,
            self.plan_id,
            self.current_price,
            self.level_price,
            self.distance_pct,
        )
    }
}

// ---------------------------------------------------------------------------
// Predictions
// ---------------------------------------------------------------------------

/// Terminal classification of a resolved prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PredictionOutcome {
    Right,
    Wrong,
    Expired,
}

impl fmt::Display for PredictionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictionOutcome::Right => write!(f, "RIGHT"),
            PredictionOutcome::Wrong => write!(f, "WRONG"),
            PredictionOutcome::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// A time-boxed directional forecast evaluated against later prices.
///
/// Active while unevaluated; once resolved it moves to the append-only
/// history and is never mutated again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub symbol: String,
    pub action: TradeAction,
    /// Self-reported confidence (0–100).
    pub confidence: f64,
    pub entry_price: f64,
    pub target_price: f64,
    pub stop_loss: f64,
    pub window_minutes: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub reasoning: String,
    pub evaluated: bool,
    pub exit_price: Option<f64>,
    pub outcome: Option<PredictionOutcome>,
    pub pnl_percent: Option<f64>,
}

impl Prediction {
    /// Directional P&L at the given price, as a signed percentage.
    pub fn pnl_percent_at(&self, price: f64) -> f64 {
        let raw = (price - self.entry_price) / self.entry_price * 100.0;
        match self.action {
            TradeAction::Sell => -raw,
            _ => raw,
        }
    }

    /// Whether the target has been reached in the predicted direction.
    pub fn target_reached(&self, price: f64) -> bool {
        match self.action {
            TradeAction::Sell => price <= self.target_price,
            _ => price >= self.target_price,
        }
    }

    /// Whether the stop has been reached against the predicted direction.
    pub fn stop_hit(&self, price: f64) -> bool {
        match self.action {
            TradeAction::Sell => price >= self.stop_loss,
            _ => price <= self.stop_loss,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} entry={:.4} target={:.4} stop={:.4} conf={:.0}%",
            self.action,
            self.symbol,
            self.entry_price,
            self.target_price,
            self.stop_loss,
            self.confidence,
        )?;
        if let (Some(outcome), Some(pnl)) = (self.outcome, self.pnl_percent) {
            write!(f, " → {outcome} ({pnl:+.2}%)")?;
        }
        Ok(())
    }
}

/// Running aggregates over resolved predictions.
///
/// Updated incrementally on every add/resolution — never recomputed
/// from scratch.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PaperStats {
    /// Every prediction ever added (drives the confidence average).
    pub tracked: u64,
    /// Resolved predictions (right + wrong + expired).
    pub total: u64,
    pub right: u64,
    pub wrong: u64,
    pub expired: u64,
    /// right / total, as a percentage.
    pub win_rate: f64,
    /// Mean confidence over all tracked predictions.
    pub avg_confidence: f64,
    /// Mean P&L percent over resolved predictions.
    pub avg_pnl_percent: f64,
    pub best_pnl_percent: f64,
    pub worst_pnl_percent: f64,
}

impl PaperStats {
    /// Fold a newly added prediction's confidence into the running mean.
    pub fn record_added(&mut self, confidence: f64) {
        self.tracked += 1;
        self.avg_confidence += (confidence - self.avg_confidence) / self.tracked as f64;
    }

    /// Fold one resolution into the aggregates: outcome counter, then
    /// incremental mean P&L, then running best/worst, then win rate.
    pub fn record_resolved(&mut self, outcome: PredictionOutcome, pnl_percent: f64) {
        match outcome {
            PredictionOutcome::Right => self.right += 1,
            PredictionOutcome::Wrong => self.wrong += 1,
            PredictionOutcome::Expired => self.expired += 1,
        }
        self.total += 1;
        self.avg_pnl_percent += (pnl_percent - self.avg_pnl_percent) / self.total as f64;
        if self.total == 1 {
            self.best_pnl_percent = pnl_percent;
            self.worst_pnl_percent = pnl_percent;
        } else {
            self.best_pnl_percent = self.best_pnl_percent.max(pnl_percent);
            self.worst_pnl_percent = self.worst_pnl_percent.min(pnl_percent);
        }
        self.win_rate = self.right as f64 / self.total as f64 * 100.0;
    }
}

impl fmt::Display for PaperStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} resolved (R{}/W{}/E{}) | win_rate={:.1}% | avg_pnl={:+.2}% | best={:+.2}% worst={:+.2}%",
            self.total,
            self.right,
            self.wrong,
            self.expired,
            self.win_rate,
            self.avg_pnl_percent,
            self.best_pnl_percent,
            self.worst_pnl_percent,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for SENTINEL.
#[derive(Debug, thiserror::Error)]
pub enum SentinelError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Notification error ({sink}): {message}")]
    Notification { sink: String, message: String },

    #[error("Advisor error: {0}")]
    Advisor(String),

    #[error("Price feed error: {0}")]
    Feed(String),

    #[error("Plan not found: {0}")]
    PlanNotFound(String),

    #[error("Prediction not found: {0}")]
    PredictionNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience constructor for domain durations.
pub fn minutes(n: i64) -> Duration {
    Duration::minutes(n)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
