//! Data models for candles, signals, positions, and closed trades.

mod candle;
mod position;
mod signal;
mod trade;

pub use candle::Candle;
pub use position::{Position, Side};
pub use signal::Signal;
pub use trade::{ClosedTrade, ExitReason};
