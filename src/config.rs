//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs,
//! one section per component. Every field has a serde default so a
//! partial config file (or none at all) still yields a runnable setup.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

use crate::types::OperatingMode;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub gate: GateConfig,
    pub monitor: MonitorConfig,
    pub tracker: TrackerConfig,
    pub engine: EngineConfig,
}

/// Policy limits for the execution gate.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GateConfig {
    pub mode: OperatingMode,
    /// Minimum confidence (0–100) for automatic execution; equality passes.
    pub auto_execute_threshold: f64,
    /// 0 means unlimited.
    pub max_daily_trades: u32,
    /// 0 means unlimited.
    pub max_daily_loss: f64,
    /// 0 disables the cooldown.
    pub cooldown_minutes: i64,
    /// 0 disables the breaker.
    pub consecutive_loss_limit: u32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            mode: OperatingMode::NotifyOnly,
            auto_execute_threshold: 80.0,
            max_daily_trades: 5,
            max_daily_loss: 500.0,
            cooldown_minutes: 30,
            consecutive_loss_limit: 3,
        }
    }
}

/// Tuning for the plan monitor.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MonitorConfig {
    /// A level within this absolute distance (percent) counts as approached.
    pub approach_threshold_pct: f64,
    /// Suppress repeat notifications per level until explicitly reset.
    pub notify_once: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            approach_threshold_pct: 0.5,
            notify_once: true,
        }
    }
}

/// Tuning for prediction generation.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrackerConfig {
    /// Advisor outputs below this confidence are discarded ("no prediction").
    pub min_confidence: f64,
    pub default_window_minutes: i64,
    /// How much of the tracker's own history to feed back to the advisor.
    pub history_context: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            min_confidence: 60.0,
            default_window_minutes: 60,
            history_context: 10,
        }
    }
}

/// Driver loop timing and instrument universe.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngineConfig {
    pub tick_interval_secs: u64,
    pub sweep_interval_secs: u64,
    pub prediction_symbols: Vec<String>,
    pub candle_window_secs: i64,
    pub max_candles: usize,
    /// Plan store location for the JSON persistence collaborator.
    pub plan_store_path: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 2,
            sweep_interval_secs: 60,
            prediction_symbols: vec!["AAPL".to_string(), "MSFT".to_string()],
            candle_window_secs: 60,
            max_candles: 120,
            plan_store_path: "sentinel_plans.json".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Load from a TOML file if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if std::path::Path::new(path).exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}
