//! Plan persistence.
//!
//! Defines the `PlanStore` trait the monitor loads plans through, and
//! a JSON-file implementation sufficient for a single assistant
//! instance. A database-backed store can be slotted in behind the same
//! trait later.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use crate::types::{PlanStatus, TradePlan};

// ---------------------------------------------------------------------------
// Trait + filter
// ---------------------------------------------------------------------------

/// Status filter for plan queries. An empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct PlanFilter {
    pub statuses: Vec<PlanStatus>,
}

impl PlanFilter {
    /// Match any status.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with_statuses(statuses: impl Into<Vec<PlanStatus>>) -> Self {
        Self {
            statuses: statuses.into(),
        }
    }

    /// The filter the monitor uses: plans still worth watching.
    pub fn monitorable() -> Self {
        Self::with_statuses(vec![PlanStatus::Pending, PlanStatus::Active])
    }

    pub fn matches(&self, plan: &TradePlan) -> bool {
        self.statuses.is_empty() || self.statuses.contains(&plan.status)
    }
}

/// Abstraction over trade-plan persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Fetch plans matching the filter.
    async fn plans(&self, filter: PlanFilter) -> Result<Vec<TradePlan>>;
}

// ---------------------------------------------------------------------------
// JSON file store
// ---------------------------------------------------------------------------

/// File-backed plan store: one pretty-printed JSON array per file.
/// A missing file reads as an empty store.
pub struct JsonPlanStore {
    path: PathBuf,
}

impl JsonPlanStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_all(&self) -> Result<Vec<TradePlan>> {
        if !Path::new(&self.path).exists() {
            debug!(path = %self.path.display(), "No plan file found, starting empty");
            return Ok(Vec::new());
        }
        let json = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read plans from {}", self.path.display()))?;
        let plans: Vec<TradePlan> = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse plans from {}", self.path.display()))?;
        Ok(plans)
    }

    fn write_all(&self, plans: &[TradePlan]) -> Result<()> {
        let json = serde_json::to_string_pretty(plans).context("Failed to serialise plans")?;
        std::fs::write(&self.path, &json)
            .with_context(|| format!("Failed to write plans to {}", self.path.display()))?;
        debug!(path = %self.path.display(), count = plans.len(), "Plans saved");
        Ok(())
    }

    /// Insert or replace a plan by id.
    pub fn save_plan(&self, plan: &TradePlan) -> Result<()> {
        let mut plans = self.read_all()?;
        match plans.iter_mut().find(|p| p.id == plan.id) {
            Some(existing) => *existing = plan.clone(),
            None => plans.push(plan.clone()),
        }
        self.write_all(&plans)
    }

    /// Remove a plan by id. Returns whether it existed.
    pub fn delete_plan(&self, id: &str) -> Result<bool> {
        let mut plans = self.read_all()?;
        let before = plans.len();
        plans.retain(|p| p.id != id);
        let removed = plans.len() != before;
        if removed {
            self.write_all(&plans)?;
        }
        Ok(removed)
    }

    /// Mint a new plan with a generated id and persist it.
    /// Used by the planning workflow; levels may be partially set.
    pub fn create_plan(
        &self,
        symbol: &str,
        entry_price: Option<f64>,
        stop_loss: Option<f64>,
        target1: Option<f64>,
        target2: Option<f64>,
        target3: Option<f64>,
    ) -> Result<TradePlan> {
        let plan = TradePlan {
            id: Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            entry_price,
            stop_loss,
            target1,
            target2,
            target3,
            status: PlanStatus::Pending,
            created_at: Utc::now(),
        };
        self.save_plan(&plan)?;
        info!(plan_id = %plan.id, symbol, "Plan created");
        Ok(plan)
    }
}

#[async_trait]
impl PlanStore for JsonPlanStore {
    async fn plans(&self, filter: PlanFilter) -> Result<Vec<TradePlan>> {
        let plans = self.read_all()?;
        Ok(plans.into_iter().filter(|p| filter.matches(p)).collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
