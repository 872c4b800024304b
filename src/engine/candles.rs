//! Tick-to-candle aggregation for the advisor's history window.

use chrono::{TimeZone, Utc};
use std::collections::VecDeque;

use crate::types::{Candle, PriceTick};

/// Buckets ticks into fixed-width OHLCV bars, keeping a bounded tail.
#[derive(Debug)]
pub struct CandleBuilder {
    window_secs: i64,
    max_candles: usize,
    closed: VecDeque<Candle>,
    current: Option<Candle>,
}

impl CandleBuilder {
    pub fn new(window_secs: i64, max_candles: usize) -> Self {
        Self {
            window_secs: window_secs.max(1),
            max_candles: max_candles.max(1),
            closed: VecDeque::new(),
            current: None,
        }
    }

    /// Fold one tick into the current bar, rolling to a new bar when
    /// the tick lands in a later bucket.
    pub fn push(&mut self, tick: &PriceTick) {
        let secs = tick.timestamp.timestamp();
        let bucket = secs - secs.rem_euclid(self.window_secs);
        let bucket_start = Utc
            .timestamp_opt(bucket, 0)
            .single()
            .unwrap_or(tick.timestamp);
        let volume = tick.volume.unwrap_or(0.0);

        match &mut self.current {
            Some(candle) if candle.start == bucket_start => {
                candle.high = candle.high.max(tick.last);
                candle.low = candle.low.min(tick.last);
                candle.close = tick.last;
                candle.volume += volume;
            }
            _ => {
                if let Some(done) = self.current.take() {
                    self.closed.push_back(done);
                    if self.closed.len() > self.max_candles {
                        self.closed.pop_front();
                    }
                }
                self.current = Some(Candle {
                    start: bucket_start,
                    open: tick.last,
                    high: tick.last,
                    low: tick.last,
                    close: tick.last,
                    volume,
                });
            }
        }
    }

    /// All bars oldest-first, including the still-open one.
    pub fn snapshot(&self) -> Vec<Candle> {
        let mut candles: Vec<Candle> = self.closed.iter().cloned().collect();
        if let Some(current) = &self.current {
            candles.push(current.clone());
        }
        candles
    }
}
