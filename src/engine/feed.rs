//! Price feed seam.
//!
//! The live streaming client is an external collaborator; the driver
//! only needs something that yields ticks one at a time. `ReplaySource`
//! plays back a scripted or recorded sequence (tests, backfills);
//! `SyntheticSource` generates a deterministic wave so the assistant
//! can run end-to-end with no market connection.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::path::Path;

use crate::types::PriceTick;

/// Abstraction over tick delivery. `None` means the stream has ended.
#[async_trait]
pub trait TickSource: Send {
    async fn next_tick(&mut self) -> Result<Option<PriceTick>>;
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

/// Plays back a fixed sequence of ticks, then ends.
pub struct ReplaySource {
    ticks: VecDeque<PriceTick>,
}

impl ReplaySource {
    pub fn new(ticks: Vec<PriceTick>) -> Self {
        Self {
            ticks: ticks.into(),
        }
    }

    /// Load a recorded JSON array of ticks.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read tick replay from {}", path.display()))?;
        let ticks: Vec<PriceTick> = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse tick replay from {}", path.display()))?;
        Ok(Self::new(ticks))
    }
}

#[async_trait]
impl TickSource for ReplaySource {
    async fn next_tick(&mut self) -> Result<Option<PriceTick>> {
        Ok(self.ticks.pop_front())
    }
}

// ---------------------------------------------------------------------------
// Synthetic
// ---------------------------------------------------------------------------

/// Deterministic demo feed: each symbol walks a slow two-frequency
/// wave around its base price. Never ends.
pub struct SyntheticSource {
    symbols: Vec<(String, f64)>,
    step: u64,
}

impl SyntheticSource {
    const FAST_AMPLITUDE: f64 = 0.015;
    const SLOW_AMPLITUDE: f64 = 0.005;

    pub fn new(symbols: Vec<(String, f64)>) -> Self {
        Self { symbols, step: 0 }
    }

    fn price_at(base: f64, k: f64) -> f64 {
        base * (1.0 + Self::FAST_AMPLITUDE * (0.25 * k).sin() + Self::SLOW_AMPLITUDE * (0.04 * k).sin())
    }
}

#[async_trait]
impl TickSource for SyntheticSource {
    async fn next_tick(&mut self) -> Result<Option<PriceTick>> {
        if self.symbols.is_empty() {
            return Ok(None);
        }
        let index = (self.step as usize) % self.symbols.len();
        let cycle = self.step / self.symbols.len() as u64;
        let (symbol, base) = &self.symbols[index];
        self.step += 1;

        let mut tick = PriceTick::new(symbol, Self::price_at(*base, cycle as f64), Utc::now());
        tick.prev_close = Some(*base);
        Ok(Some(tick))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
