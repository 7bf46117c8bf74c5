//! OHLCV bar as delivered by the candle feed.

use serde::{Deserialize, Serialize};

/// One OHLCV bar. Timestamps are exchange open times in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Candle with all prices set to `price` (useful for live-tick windows and tests).
    pub fn flat(timestamp: i64, price: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
        }
    }

    /// Split a window into aligned close/high/low/volume columns.
    pub fn columns(candles: &[Candle]) -> (Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>) {
        let mut close = Vec::with_capacity(candles.len());
        let mut high = Vec::with_capacity(candles.len());
        let mut low = Vec::with_capacity(candles.len());
        let mut volume = Vec::with_capacity(candles.len());

        for c in candles {
            close.push(c.close);
            high.push(c.high);
            low.push(c.low);
            volume.push(c.volume);
        }

        (close, high, low, volume)
    }
}
