//! Technical indicators over aligned candle columns.
//!
//! Every function is pure and returns a vector the same length as its input.
//! Insufficient data is a policy rather than an error: when the input is shorter than the
//! period, the output is all zeros. Positions before a rolling window fills are zero too.

use tracing::debug;

use crate::models::Candle;

pub const EMA_FAST: usize = 21;
pub const EMA_MID: usize = 50;
pub const EMA_SLOW: usize = 200;
pub const RSI_PERIOD: usize = 14;
pub const ATR_AVG_PERIOD: usize = 100;
pub const VOLUME_AVG_PERIOD: usize = 20;

/// Exponential moving average with smoothing 2/(period+1), seeded from the first value.
pub fn ema(series: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || series.len() < period {
        debug!(period, len = series.len(), "EMA: not enough data");
        return vec![0.0; series.len()];
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(series.len());
    let mut prev = series[0];
    out.push(prev);

    for &x in &series[1..] {
        prev = alpha * x + (1.0 - alpha) * prev;
        out.push(prev);
    }

    out
}

/// Simple rolling mean over the trailing `period` values.
pub fn sma(series: &[f64], period: usize) -> Vec<f64> {
    let n = series.len();
    let mut out = vec![0.0; n];

    if period == 0 || n < period {
        debug!(period, len = n, "SMA: not enough data");
        return out;
    }

    let mut sum: f64 = series[..period].iter().sum();
    out[period - 1] = sum / period as f64;

    for i in period..n {
        sum += series[i] - series[i - period];
        out[i] = sum / period as f64;
    }

    out
}

/// Relative strength index over rolling average gains and losses.
///
/// No losses in the window gives 100; a window with neither gains nor losses gives 50.
/// The first `period` positions (no complete window of price changes yet) are zero.
pub fn rsi(series: &[f64], period: usize) -> Vec<f64> {
    let n = series.len();
    let mut out = vec![0.0; n];

    if period == 0 || n < period {
        debug!(period, len = n, "RSI: not enough data");
        return out;
    }

    let mut gains = vec![0.0; n];
    let mut losses = vec![0.0; n];
    for i in 1..n {
        let delta = series[i] - series[i - 1];
        if delta > 0.0 {
            gains[i] = delta;
        } else {
            losses[i] = -delta;
        }
    }

    for i in period..n {
        let window = i + 1 - period..=i;
        let avg_gain = gains[window.clone()].iter().sum::<f64>() / period as f64;
        let avg_loss = losses[window].iter().sum::<f64>() / period as f64;

        out[i] = if avg_loss == 0.0 {
            if avg_gain == 0.0 {
                50.0
            } else {
                100.0
            }
        } else {
            let rs = avg_gain / avg_loss;
            100.0 - 100.0 / (1.0 + rs)
        };
    }

    out
}

/// True range per bar. The first bar has no previous close, so it is just high - low.
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let n = high.len().min(low.len()).min(close.len());
    let mut tr = Vec::with_capacity(n);

    for i in 0..n {
        let range = high[i] - low[i];
        if i == 0 {
            tr.push(range);
        } else {
            let prev_close = close[i - 1];
            tr.push(
                range
                    .max((high[i] - prev_close).abs())
                    .max((low[i] - prev_close).abs()),
            );
        }
    }

    tr
}

/// Average true range: rolling mean of the true range over `period` bars.
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    let n = high.len().min(low.len()).min(close.len());
    if period == 0 || n < period {
        debug!(period, len = n, "ATR: not enough data");
        return vec![0.0; close.len()];
    }

    sma(&true_range(high, low, close), period)
}

/// All indicator series the signal scorer needs, aligned to the candle window.
#[derive(Debug, Clone, Default)]
pub struct IndicatorSet {
    pub ema21: Vec<f64>,
    pub ema50: Vec<f64>,
    pub ema200: Vec<f64>,
    pub rsi14: Vec<f64>,
    pub atr: Vec<f64>,
    pub atr_avg100: Vec<f64>,
    pub volume_avg20: Vec<f64>,
}

impl IndicatorSet {
    /// Compute every series from a candle window.
    pub fn compute(candles: &[Candle], atr_period: usize) -> Self {
        let (close, high, low, volume) = Candle::columns(candles);
        let atr = atr(&high, &low, &close, atr_period);
        let atr_avg100 = sma(&atr, ATR_AVG_PERIOD);

        Self {
            ema21: ema(&close, EMA_FAST),
            ema50: ema(&close, EMA_MID),
            ema200: ema(&close, EMA_SLOW),
            rsi14: rsi(&close, RSI_PERIOD),
            atr,
            atr_avg100,
            volume_avg20: sma(&volume, VOLUME_AVG_PERIOD),
        }
    }

    /// Most recent ATR value, zero when unavailable.
    pub fn last_atr(&self) -> f64 {
        self.atr.last().copied().unwrap_or(0.0)
    }
}
