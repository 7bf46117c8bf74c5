//! Breakout/trend/volume/volatility scoring and entry decisions.
//!
//! This module defines the rules for:
//! - Directional breakout conditions over the trailing 8-candle window
//! - The 0-5 composite score gating every entry
//! - Turning an accepted assessment into ATR-scaled targets

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::indicators::IndicatorSet;
use crate::models::{Candle, Side, Signal};

use super::config::StrategyConfig;

/// Candles in the breakout lookback, excluding the current one.
pub const BREAKOUT_LOOKBACK: usize = 8;

/// Minimum window length the scorer accepts.
pub const MIN_CANDLES: usize = BREAKOUT_LOOKBACK + 1;

/// Why an entry was not attempted on this tick.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryVeto {
    /// Too soon after the previous entry
    Cooldown { remaining_secs: i64 },
    /// Candle window shorter than the breakout lookback
    InsufficientData { have: usize, need: usize },
    /// Composite score under the configured minimum
    LowScore { score: u8, min: u8 },
    /// Score passed but neither directional condition holds
    NoDirection { score: u8 },
    /// Daily drawdown breaker tripped
    RiskBlocked,
}

impl std::fmt::Display for EntryVeto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryVeto::Cooldown { remaining_secs } => {
                write!(f, "cooldown active: {}s remaining", remaining_secs)
            }
            EntryVeto::InsufficientData { have, need } => {
                write!(f, "not enough candles: {} < {}", have, need)
            }
            EntryVeto::LowScore { score, min } => write!(f, "score too low: {} < {}", score, min),
            EntryVeto::NoDirection { score } => {
                write!(f, "score {} but no directional breakout", score)
            }
            EntryVeto::RiskBlocked => write!(f, "daily drawdown limit reached"),
        }
    }
}

/// Every condition evaluated on the latest candle.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalAssessment {
    pub close: f64,
    pub bull_break: bool,
    pub bear_break: bool,
    pub volume_ok: bool,
    pub volatility_ok: bool,
    pub trend_up: bool,
    pub trend_down: bool,
    pub rsi: f64,
    /// Latest ATR, base unit of every target distance
    pub atr: f64,
    /// Composite score, 0..=5
    pub score: u8,
}

impl SignalAssessment {
    pub fn long_condition(&self) -> bool {
        self.bull_break && self.volume_ok && self.volatility_ok && self.trend_up
    }

    pub fn short_condition(&self) -> bool {
        self.bear_break && self.volume_ok && self.volatility_ok && self.trend_down
    }
}

/// Composite score: one point each for trend, volume, volatility, RSI extremity and
/// strictly ordered EMAs.
pub fn score_signal(
    trend_ok: bool,
    volume_ok: bool,
    volatility_ok: bool,
    rsi: f64,
    ema21: f64,
    ema50: f64,
    ema200: f64,
) -> u8 {
    let mut score = 0;
    if trend_ok {
        score += 1;
    }
    if volume_ok {
        score += 1;
    }
    if volatility_ok {
        score += 1;
    }
    if rsi > 60.0 || rsi < 40.0 {
        score += 1;
    }
    if (ema21 > ema50 && ema50 > ema200) || (ema21 < ema50 && ema50 < ema200) {
        score += 1;
    }
    score
}

/// Signal scorer.
pub struct SignalScorer {
    config: StrategyConfig,
}

impl SignalScorer {
    pub fn new(config: StrategyConfig) -> Self {
        Self { config }
    }

    /// Evaluate the latest candle of `candles` against its indicators.
    pub fn assess(&self, candles: &[Candle]) -> Result<SignalAssessment, EntryVeto> {
        let n = candles.len();
        if n < MIN_CANDLES {
            return Err(EntryVeto::InsufficientData { have: n, need: MIN_CANDLES });
        }

        let ind = IndicatorSet::compute(candles, self.config.atr_period);
        let last = n - 1;
        let close = candles[last].close;
        let volume = candles[last].volume;

        let window = &candles[last - BREAKOUT_LOOKBACK..last];
        let prior_high = window.iter().map(|c| c.close).fold(f64::NEG_INFINITY, f64::max);
        let prior_low = window.iter().map(|c| c.close).fold(f64::INFINITY, f64::min);

        let ema21 = ind.ema21[last];
        let ema50 = ind.ema50[last];
        let ema200 = ind.ema200[last];
        let rsi = ind.rsi14[last];
        let atr = ind.atr[last];

        let bull_break = close > prior_high && close > ema21 && rsi > 55.0;
        let bear_break = close < prior_low && close < ema21 && rsi < 45.0;
        let volume_ok = volume > ind.volume_avg20[last] * 0.8;
        let volatility_ok = atr > ind.atr_avg100[last] * 1.1;
        let trend_up = ema21 > ema50 && ema50 > ema200;
        let trend_down = ema21 < ema50 && ema50 < ema200;

        let score = score_signal(
            trend_up || trend_down,
            volume_ok,
            volatility_ok,
            rsi,
            ema21,
            ema50,
            ema200,
        );

        info!(score = score, close = close, rsi = rsi, atr = atr, "Signal scored");

        Ok(SignalAssessment {
            close,
            bull_break,
            bear_break,
            volume_ok,
            volatility_ok,
            trend_up,
            trend_down,
            rsi,
            atr,
            score,
        })
    }

    /// Direction to enter, or the veto that stops it.
    pub fn entry_side(&self, assessment: &SignalAssessment) -> Result<Side, EntryVeto> {
        if assessment.score < self.config.min_score {
            debug!(score = assessment.score, "Signal ignored: score too low");
            return Err(EntryVeto::LowScore {
                score: assessment.score,
                min: self.config.min_score,
            });
        }

        if assessment.long_condition() {
            Ok(Side::Long)
        } else if assessment.short_condition() {
            Ok(Side::Short)
        } else {
            Err(EntryVeto::NoDirection { score: assessment.score })
        }
    }

    /// Build the sized signal: TP widened and SL tightened by `adjust_factor`.
    pub fn build_signal(
        &self,
        assessment: &SignalAssessment,
        side: Side,
        quantity: Decimal,
        adjust_factor: f64,
    ) -> Signal {
        let atr = assessment.atr;
        let factor = if adjust_factor > 0.0 { adjust_factor } else { 1.0 };

        Signal {
            side,
            score: assessment.score,
            take_profit_offset: atr * self.config.tp_multiplier * factor,
            stop_loss_offset: atr * self.config.sl_multiplier / factor,
            trail_stop_distance: atr * self.config.trail_multiplier,
            trail_offset_distance: atr * self.config.offset_multiplier,
            quantity,
        }
    }
}
