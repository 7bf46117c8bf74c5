//! Entry decision produced by the scorer and sizer for one tick.

use rust_decimal::Decimal;

use super::Side;

/// Fully sized entry signal. Consumed immediately by the lifecycle manager.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub side: Side,
    /// Composite score, 0..=5
    pub score: u8,
    pub take_profit_offset: f64,
    pub stop_loss_offset: f64,
    pub trail_stop_distance: f64,
    pub trail_offset_distance: f64,
    pub quantity: Decimal,
}

impl Signal {
    /// Absolute take-profit price for an entry at `entry`.
    pub fn take_profit_price(&self, entry: f64) -> f64 {
        entry + self.take_profit_offset * self.side.sign()
    }

    /// Absolute stop-loss price for an entry at `entry`.
    pub fn stop_loss_price(&self, entry: f64) -> f64 {
        entry - self.stop_loss_offset * self.side.sign()
    }

    /// Initial trailing level: entry minus (trail + offset) for longs, mirrored for shorts.
    pub fn initial_trailing_stop(&self, entry: f64) -> f64 {
        entry - (self.trail_stop_distance + self.trail_offset_distance) * self.side.sign()
    }

    /// Trail value registered with an exchange-managed trailing stop.
    pub fn exchange_trail_value(&self) -> f64 {
        self.trail_stop_distance - self.trail_offset_distance
    }
}
