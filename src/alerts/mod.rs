//! Notification delivery seam.
//!
//! Defines the `AlertSink` trait consumed by the monitor and the
//! driver, and the structured `Alert` envelope they send through it.
//! Delivery transports (webhook, telegram, email) live outside this
//! crate; the built-in `LogSink` writes alerts to the log stream.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use tracing::info;
use uuid::Uuid;

use crate::types::{GateResult, PlanNotification, Prediction, TradeDecision};

// ---------------------------------------------------------------------------
// Alert envelope
// ---------------------------------------------------------------------------

/// Category tag carried by every alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    PlanLevel,
    PredictionOpened,
    PredictionResolved,
    ExecutionApproved,
    ExecutionBlocked,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::PlanLevel => write!(f, "plan_level"),
            AlertKind::PredictionOpened => write!(f, "prediction_opened"),
            AlertKind::PredictionResolved => write!(f, "prediction_resolved"),
            AlertKind::ExecutionApproved => write!(f, "execution_approved"),
            AlertKind::ExecutionBlocked => write!(f, "execution_blocked"),
        }
    }
}

/// A structured notification handed to the sink: type tag, title,
/// human-readable message, and a key/value payload for machine use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
    pub payload: serde_json::Value,
    pub at: DateTime<Utc>,
}

impl Alert {
    pub fn new(kind: AlertKind, title: String, message: String, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            title,
            message,
            payload,
            at: Utc::now(),
        }
    }

    /// Wrap a plan-level event; the payload mirrors every notification field.
    pub fn from_notification(n: &PlanNotification) -> Self {
        let verb = if n.approaching { "approaching" } else { "crossed" };
        Self::new(
            AlertKind::PlanLevel,
            format!("{} {} {}", n.symbol, verb, n.level),
            format!("{n}"),
            json!({
                "plan_id": n.plan_id,
                "symbol": n.symbol,
                "level": n.level.to_string(),
                "level_price": n.level_price,
                "current_price": n.current_price,
                "distance_pct": n.distance_pct,
                "approaching": n.approaching,
            }),
        )
    }

    pub fn prediction_opened(p: &Prediction) -> Self {
        Self::new(
            AlertKind::PredictionOpened,
            format!("New {} prediction for {}", p.action, p.symbol),
            format!("{p}"),
            serde_json::to_value(p).unwrap_or(serde_json::Value::Null),
        )
    }

    pub fn prediction_resolved(p: &Prediction) -> Self {
        let outcome = p
            .outcome
            .map(|o| o.to_string())
            .unwrap_or_else(|| "UNRESOLVED".to_string());
        Self::new(
            AlertKind::PredictionResolved,
            format!("{} prediction {}", p.symbol, outcome),
            format!("{p}"),
            serde_json::to_value(p).unwrap_or(serde_json::Value::Null),
        )
    }

    pub fn execution_approved(decision: &TradeDecision, result: &GateResult) -> Self {
        Self::new(
            AlertKind::ExecutionApproved,
            format!("Execution approved: {} {}", decision.action, decision.symbol),
            format!("{decision} — {result}"),
            json!({
                "symbol": decision.symbol,
                "action": decision.action.to_string(),
                "confidence": decision.confidence,
                "checks_passed": result.checks_passed,
            }),
        )
    }

    pub fn execution_blocked(decision: &TradeDecision, result: &GateResult) -> Self {
        Self::new(
            AlertKind::ExecutionBlocked,
            format!("Execution blocked: {} {}", decision.action, decision.symbol),
            format!("{decision} — {result}"),
            json!({
                "symbol": decision.symbol,
                "action": decision.action.to_string(),
                "confidence": decision.confidence,
                "block_reason": result.block_reason,
                "checks_failed": result.checks_failed,
            }),
        )
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.title, self.message)
    }
}

// ---------------------------------------------------------------------------
// Sink trait + log implementation
// ---------------------------------------------------------------------------

/// Abstraction over notification delivery.
///
/// Implementations own their retry/timeout policy; callers treat a
/// send as at-most-once and never retry themselves.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<()>;

    /// Sink name for logging and identification.
    fn name(&self) -> &str;
}

/// Sink that writes alerts to the tracing stream. Useful as a default
/// and for dry runs.
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    async fn send(&self, alert: &Alert) -> Result<()> {
        info!(
            kind = %alert.kind,
            title = %alert.title,
            payload = %alert.payload,
            "{}",
            alert.message,
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
