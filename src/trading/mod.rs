//! Trading logic: scoring, sizing, adaptive targets, and the position lifecycle.

mod adjustment;
mod config;
mod lifecycle;
mod memory;
mod risk;
mod signal;
mod trailing;

pub use adjustment::{oracle_for, AdjustmentOracle};
pub use config::{ConfigError, RiskConfig, StrategyConfig, TrailingMode};
pub use lifecycle::{LifecycleError, PositionManager};
pub use memory::TradeMemory;
pub use risk::RiskSizer;
pub use signal::{EntryVeto, SignalScorer, MIN_CANDLES};

#[cfg(test)]
pub(crate) use signal::tests::breakout_candles;
