//! Execution gate — the auto-execution policy chain.
//!
//! Pure and stateless: given a trade decision and the caller's current
//! execution bookkeeping, returns allow/deny with an explicit reason
//! and an audit trail of the checks evaluated. Calling it twice with
//! identical inputs yields identical output, so decisions can be
//! replayed for audit and property-tested.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::config::GateConfig;
use crate::types::{ExecutionState, GateResult, OperatingMode, TradeDecision};

/// Audit names of the eight checks, in evaluation order.
pub mod checks {
    pub const OPERATING_MODE: &str = "operating_mode";
    pub const CONFIDENCE: &str = "confidence";
    pub const RISK_APPROVAL: &str = "risk_approval";
    pub const DAILY_TRADE_LIMIT: &str = "daily_trade_limit";
    pub const DAILY_LOSS_LIMIT: &str = "daily_loss_limit";
    pub const COOLDOWN: &str = "cooldown";
    pub const LOSS_STREAK: &str = "loss_streak";
    pub const ACTION: &str = "action";
}

type Check = fn(&GateConfig, &TradeDecision, &ExecutionState, DateTime<Utc>) -> Result<(), String>;

/// Fixed evaluation order; the chain short-circuits on the first failure.
const CHAIN: [(&str, Check); 8] = [
    (checks::OPERATING_MODE, check_operating_mode),
    (checks::CONFIDENCE, check_confidence),
    (checks::RISK_APPROVAL, check_risk_approval),
    (checks::DAILY_TRADE_LIMIT, check_daily_trade_limit),
    (checks::DAILY_LOSS_LIMIT, check_daily_loss_limit),
    (checks::COOLDOWN, check_cooldown),
    (checks::LOSS_STREAK, check_loss_streak),
    (checks::ACTION, check_action),
];

/// The policy chain. Holds only configuration — no mutable state —
/// so it is safe to call from any number of concurrent callers.
#[derive(Debug, Clone)]
pub struct ExecutionGate {
    config: GateConfig,
}

impl ExecutionGate {
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    /// Decide whether the proposed trade may execute automatically.
    pub fn decide(&self, decision: &TradeDecision, state: &ExecutionState) -> GateResult {
        self.decide_at(decision, state, Utc::now())
    }

    /// Same as [`decide`](Self::decide) with an explicit clock, for
    /// referentially transparent replay and tests.
    pub fn decide_at(
        &self,
        decision: &TradeDecision,
        state: &ExecutionState,
        now: DateTime<Utc>,
    ) -> GateResult {
        let mut passed: Vec<String> = Vec::new();

        for (name, check) in CHAIN {
            match check(&self.config, decision, state, now) {
                Ok(()) => passed.push(name.to_string()),
                Err(reason) => {
                    debug!(
                        symbol = %decision.symbol,
                        check = name,
                        reason = %reason,
                        "Execution blocked"
                    );
                    return GateResult {
                        allow: false,
                        block_reason: reason,
                        checks_passed: passed,
                        checks_failed: vec![name.to_string()],
                    };
                }
            }
        }

        debug!(symbol = %decision.symbol, action = %decision.action, "Execution allowed");
        GateResult {
            allow: true,
            block_reason: String::new(),
            checks_passed: passed,
            checks_failed: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Individual checks
// ---------------------------------------------------------------------------

fn check_operating_mode(
    config: &GateConfig,
    decision: &TradeDecision,
    _state: &ExecutionState,
    _now: DateTime<Utc>,
) -> Result<(), String> {
    match config.mode {
        OperatingMode::FullAuto => Ok(()),
        OperatingMode::SemiAuto => match &decision.consensus {
            // Absent consensus satisfies semi-auto.
            None => Ok(()),
            Some(c) if c.is_unanimous() => Ok(()),
            Some(c) => Err(format!(
                "semi_auto requires unanimous consensus, got {c}"
            )),
        },
        OperatingMode::Manual => Err("manual mode: automatic execution disabled".to_string()),
        OperatingMode::NotifyOnly => {
            Err("notify_only mode: automatic execution disabled".to_string())
        }
        OperatingMode::Unknown => Err("unrecognized operating mode".to_string()),
    }
}

fn check_confidence(
    config: &GateConfig,
    decision: &TradeDecision,
    _state: &ExecutionState,
    _now: DateTime<Utc>,
) -> Result<(), String> {
    if decision.confidence >= config.auto_execute_threshold {
        Ok(())
    } else {
        Err(format!(
            "confidence {:.1} below auto-execute threshold {:.1}",
            decision.confidence, config.auto_execute_threshold,
        ))
    }
}

fn check_risk_approval(
    _config: &GateConfig,
    decision: &TradeDecision,
    _state: &ExecutionState,
    _now: DateTime<Utc>,
) -> Result<(), String> {
    match &decision.risk {
        // No risk check attached counts as implicit approval.
        None => Ok(()),
        Some(risk) if risk.approved => Ok(()),
        Some(risk) => Err(format!(
            "risk check rejected: {}",
            risk.violations.join("; "),
        )),
    }
}

fn check_daily_trade_limit(
    config: &GateConfig,
    _decision: &TradeDecision,
    state: &ExecutionState,
    _now: DateTime<Utc>,
) -> Result<(), String> {
    if config.max_daily_trades > 0 && state.daily_trade_count >= config.max_daily_trades {
        Err(format!(
            "daily trade limit reached ({}/{})",
            state.daily_trade_count, config.max_daily_trades,
        ))
    } else {
        Ok(())
    }
}

fn check_daily_loss_limit(
    config: &GateConfig,
    _decision: &TradeDecision,
    state: &ExecutionState,
    _now: DateTime<Utc>,
) -> Result<(), String> {
    if config.max_daily_loss > 0.0 && state.daily_loss_amount >= config.max_daily_loss {
        Err(format!(
            "daily loss limit reached (${:.2}/${:.2})",
            state.daily_loss_amount, config.max_daily_loss,
        ))
    } else {
        Ok(())
    }
}

fn check_cooldown(
    config: &GateConfig,
    _decision: &TradeDecision,
    state: &ExecutionState,
    now: DateTime<Utc>,
) -> Result<(), String> {
    if config.cooldown_minutes <= 0 {
        return Ok(());
    }
    let Some(last) = state.last_trade_at else {
        return Ok(());
    };
    let window = Duration::minutes(config.cooldown_minutes);
    let elapsed = now - last;
    if elapsed < window {
        Err(format!(
            "cooldown: {}m since last trade, {}m required",
            elapsed.num_minutes(),
            config.cooldown_minutes,
        ))
    } else {
        Ok(())
    }
}

fn check_loss_streak(
    config: &GateConfig,
    _decision: &TradeDecision,
    state: &ExecutionState,
    _now: DateTime<Utc>,
) -> Result<(), String> {
    if config.consecutive_loss_limit > 0
        && state.consecutive_losses >= config.consecutive_loss_limit
    {
        Err(format!(
            "consecutive-loss breaker tripped ({}/{})",
            state.consecutive_losses, config.consecutive_loss_limit,
        ))
    } else {
        Ok(())
    }
}

fn check_action(
    _config: &GateConfig,
    decision: &TradeDecision,
    _state: &ExecutionState,
    _now: DateTime<Utc>,
) -> Result<(), String> {
    if decision.action.is_executable() {
        Ok(())
    } else {
        Err(format!("nothing to execute for action {}", decision.action))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
