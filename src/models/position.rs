//! The single open position owned by the lifecycle manager.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Order side used when opening in this direction.
    pub fn order_side(&self) -> &'static str {
        match self {
            Side::Long => "BUY",
            Side::Short => "SELL",
        }
    }

    /// Order side used when closing a position in this direction.
    pub fn closing_side(&self) -> &'static str {
        match self {
            Side::Long => "SELL",
            Side::Short => "BUY",
        }
    }

    /// Exchange position side label.
    pub fn position_side(&self) -> &'static str {
        match self {
            Side::Long => "LONG",
            Side::Short => "SHORT",
        }
    }

    /// +1 for longs, -1 for shorts.
    pub fn sign(&self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.position_side())
    }
}

/// An open trade with its protective levels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub side: Side,

    /// Contract quantity
    pub quantity: Decimal,

    /// Fill price at entry
    pub entry_price: f64,

    pub entry_time: DateTime<Utc>,

    /// Absolute take-profit price
    pub take_profit: f64,

    /// Absolute stop-loss price
    pub stop_loss: f64,

    /// Current trailing stop level (only ever moves in the trade's favor)
    pub trailing_stop: f64,

    /// Distance between price and trailing level once trailing is active
    pub trail_distance: f64,

    /// Favorable move required before the trailing level starts following price
    pub trail_offset: f64,

    /// Exchange order reference, when the exchange returned one
    #[serde(default)]
    pub order_ref: Option<String>,
}

impl Position {
    /// Quantity as a float for price arithmetic.
    pub fn quantity_f64(&self) -> f64 {
        self.quantity.to_f64().unwrap_or(0.0)
    }

    /// Realized P&L if the whole position were closed at `price`.
    pub fn pnl_at(&self, price: f64) -> f64 {
        match self.side {
            Side::Long => (price - self.entry_price) * self.quantity_f64(),
            Side::Short => (self.entry_price - price) * self.quantity_f64(),
        }
    }

    /// Favorable price excursion from entry (negative when under water).
    pub fn favorable_move(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.side.sign()
    }

    /// Whether `price` has crossed the trailing level.
    pub fn trailing_breached(&self, price: f64) -> bool {
        match self.side {
            Side::Long => price < self.trailing_stop,
            Side::Short => price > self.trailing_stop,
        }
    }
}
