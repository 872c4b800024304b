//! Mock collaborators for integration testing.
//!
//! Provides deterministic `PlanStore` and `AlertSink` implementations
//! backed by in-memory state — fully controllable from test code, with
//! no external dependencies.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Mutex;

use sentinel::alerts::{Alert, AlertSink};
use sentinel::storage::{PlanFilter, PlanStore};
use sentinel::types::TradePlan;

/// In-memory plan store. Plans and failure behavior are fully
/// controllable from test code.
pub struct MemoryPlanStore {
    plans: Mutex<Vec<TradePlan>>,
    /// If set, all operations will return this error.
    force_error: Mutex<Option<String>>,
}

impl MemoryPlanStore {
    pub fn new(plans: Vec<TradePlan>) -> Self {
        Self {
            plans: Mutex::new(plans),
            force_error: Mutex::new(None),
        }
    }

    /// Force all subsequent operations to return an error.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    /// Clear any forced error.
    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    pub fn replace_plans(&self, plans: Vec<TradePlan>) {
        *self.plans.lock().unwrap() = plans;
    }
}

#[async_trait]
impl PlanStore for MemoryPlanStore {
    async fn plans(&self, filter: PlanFilter) -> Result<Vec<TradePlan>> {
        if let Some(msg) = self.force_error.lock().unwrap().clone() {
            return Err(anyhow!(msg));
        }
        Ok(self
            .plans
            .lock()
            .unwrap()
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }
}

/// Sink that records every alert it is handed.
pub struct RecordingSink {
    alerts: Mutex<Vec<Alert>>,
    force_error: Mutex<Option<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            alerts: Mutex::new(Vec::new()),
            force_error: Mutex::new(None),
        }
    }

    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    /// All alerts recorded so far.
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn send(&self, alert: &Alert) -> Result<()> {
        if let Some(msg) = self.force_error.lock().unwrap().clone() {
            return Err(anyhow!(msg));
        }
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}
