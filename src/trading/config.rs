//! Strategy and risk configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid parameter detected at startup. Not recoverable per tick.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be positive (got {value})")]
    NotPositive { field: &'static str, value: String },

    #[error("max_qty must be >= 1 (got {0})")]
    MaxQtyBelowOne(Decimal),

    #[error("min_score must be within 3..=5 (got {0})")]
    ScoreOutOfRange(u8),

    #[error("memory_capacity must be at least 1")]
    EmptyMemory,

    #[error("{0}")]
    Invalid(String),
}

fn require_positive_f64(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value: value.to_string() })
    }
}

fn require_positive_dec(field: &'static str, value: Decimal) -> Result<(), ConfigError> {
    if value > Decimal::ZERO {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value: value.to_string() })
    }
}

/// Longest accepted cooldown: one week.
pub const MAX_COOLDOWN_MINUTES: i64 = 7 * 24 * 60;

/// Quantities are rounded to this many decimal places.
pub const QTY_DECIMALS: u32 = 3;

/// Where the TP/SL adjustment factor comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentMode {
    /// Four-tier table over the recent average P&L
    Tiered,
    /// 1.2 after a positive average, 0.7 otherwise
    Sign,
}

/// Who maintains the trailing stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailingMode {
    /// Registered once with the exchange after entry
    Exchange,
    /// Recomputed locally every tick with a ratchet
    Manual,
}

/// Reference balance the daily loss is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawdownReference {
    InitialCapital,
    StartingBalance,
}

/// Signal, target and trailing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    // === Indicators ===
    pub atr_period: usize,

    // === Entry Rules ===
    /// Minimum composite score (3-5) to enter
    pub min_score: u8,

    /// Minutes that must elapse after an entry before the next one
    pub cooldown_minutes: i64,

    // === Targets (multiples of the latest ATR) ===
    pub tp_multiplier: f64,
    pub sl_multiplier: f64,
    pub trail_multiplier: f64,
    pub offset_multiplier: f64,

    // === Adaptive behaviour ===
    pub adjustment: AdjustmentMode,
    pub trailing: TrailingMode,

    /// Number of recent P&Ls kept in trade memory
    pub memory_capacity: usize,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            atr_period: 14,
            min_score: 3,
            cooldown_minutes: 20,
            tp_multiplier: 2.2,
            sl_multiplier: 1.3,
            trail_multiplier: 0.9,
            offset_multiplier: 0.6,
            adjustment: AdjustmentMode::Tiered,
            trailing: TrailingMode::Manual,
            memory_capacity: 10,
        }
    }
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.atr_period == 0 {
            return Err(ConfigError::NotPositive { field: "atr_period", value: "0".into() });
        }
        if !(3..=5).contains(&self.min_score) {
            return Err(ConfigError::ScoreOutOfRange(self.min_score));
        }
        if !(0..=MAX_COOLDOWN_MINUTES).contains(&self.cooldown_minutes) {
            return Err(ConfigError::Invalid(format!(
                "cooldown_minutes must be within 0..={} (got {})",
                MAX_COOLDOWN_MINUTES, self.cooldown_minutes
            )));
        }
        require_positive_f64("tp_multiplier", self.tp_multiplier)?;
        require_positive_f64("sl_multiplier", self.sl_multiplier)?;
        require_positive_f64("trail_multiplier", self.trail_multiplier)?;
        if !(self.offset_multiplier.is_finite() && self.offset_multiplier >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "offset_multiplier must be >= 0 (got {})",
                self.offset_multiplier
            )));
        }
        if self.memory_capacity == 0 {
            return Err(ConfigError::EmptyMemory);
        }
        Ok(())
    }
}

/// Position sizing and daily drawdown parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Equity at which sizing starts from 1 contract
    pub initial_capital: Decimal,

    /// Equity step ("palier") that adds one growth increment
    pub step_size: Decimal,

    /// Growth per step in percent ("progression")
    pub step_growth_pct: Decimal,

    /// Hard cap on quantity
    pub max_qty: Decimal,

    /// Daily realized loss limit, percent of the drawdown reference
    pub max_drawdown_pct: Decimal,

    pub drawdown_reference: DrawdownReference,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            initial_capital: dec!(100),
            step_size: dec!(50),
            step_growth_pct: dec!(8),
            max_qty: dec!(9999),
            max_drawdown_pct: dec!(5),
            drawdown_reference: DrawdownReference::InitialCapital,
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive_dec("initial_capital", self.initial_capital)?;
        require_positive_dec("step_size", self.step_size)?;
        if self.step_growth_pct < Decimal::ZERO {
            return Err(ConfigError::Invalid(format!(
                "step_growth_pct must be >= 0 (got {})",
                self.step_growth_pct
            )));
        }
        if self.max_qty < Decimal::ONE {
            return Err(ConfigError::MaxQtyBelowOne(self.max_qty));
        }
        if self.max_qty.normalize().scale() > QTY_DECIMALS {
            return Err(ConfigError::Invalid(format!(
                "max_qty must have at most {} decimal places (got {})",
                QTY_DECIMALS, self.max_qty
            )));
        }
        require_positive_dec("max_drawdown_pct", self.max_drawdown_pct)?;
        Ok(())
    }
}
