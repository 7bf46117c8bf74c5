//! Maps recent trade performance to a multiplicative TP/SL scaling factor.

use tracing::debug;

use super::config::AdjustmentMode;

/// Source of the adjustment factor applied to take-profit and stop-loss distances.
pub trait AdjustmentOracle: Send + Sync {
    /// Factor for the given recent P&Ls (oldest first). Empty history yields 1.0.
    fn factor(&self, recent_pnls: &[f64]) -> f64;
}

fn average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Step table over the average of the last ten results.
#[derive(Debug, Clone, Copy, Default)]
pub struct TieredOracle;

impl TieredOracle {
    pub const WINDOW: usize = 10;

    /// Factor for a given average P&L.
    pub fn factor_for(avg_pnl: f64) -> f64 {
        if avg_pnl >= 15.0 {
            1.3
        } else if avg_pnl >= 5.0 {
            1.1
        } else if avg_pnl >= 0.0 {
            1.0
        } else {
            0.7
        }
    }
}

impl AdjustmentOracle for TieredOracle {
    fn factor(&self, recent_pnls: &[f64]) -> f64 {
        let start = recent_pnls.len().saturating_sub(Self::WINDOW);
        let Some(avg) = average(&recent_pnls[start..]) else {
            return 1.0;
        };
        let factor = Self::factor_for(avg);
        debug!(avg_pnl = avg, factor = factor, "Tiered adjustment factor");
        factor
    }
}

/// Widens after a positive average, tightens otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignOracle;

impl AdjustmentOracle for SignOracle {
    fn factor(&self, recent_pnls: &[f64]) -> f64 {
        match average(recent_pnls) {
            None => 1.0,
            Some(avg) if avg > 0.0 => 1.2,
            Some(_) => 0.7,
        }
    }
}

/// Build the oracle selected in configuration.
pub fn oracle_for(mode: AdjustmentMode) -> Box<dyn AdjustmentOracle> {
    match mode {
        AdjustmentMode::Tiered => Box::new(TieredOracle),
        AdjustmentMode::Sign => Box::new(SignOracle),
    }
}
