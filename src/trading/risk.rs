//! Stepped position sizing and the daily drawdown circuit breaker.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use tracing::{debug, error, info, warn};

use super::config::{DrawdownReference, RiskConfig, QTY_DECIMALS};

/// Sizes orders from equity and tracks realized losses for the current day.
#[derive(Debug, Clone)]
pub struct RiskSizer {
    config: RiskConfig,
    daily_loss: Decimal,
    last_reset_date: NaiveDate,
    starting_balance: Decimal,
}

impl RiskSizer {
    /// Create a sizer for `today`, snapshotting the starting balance from `equity` when known.
    pub fn new(config: RiskConfig, today: NaiveDate, equity: Option<f64>) -> Self {
        let starting_balance = Self::snapshot(&config, equity);
        info!(
            starting_balance = %starting_balance,
            max_drawdown_pct = %config.max_drawdown_pct,
            "Risk sizer initialized"
        );

        Self {
            config,
            daily_loss: Decimal::ZERO,
            last_reset_date: today,
            starting_balance,
        }
    }

    /// Realized losses accumulated today.
    pub fn daily_loss(&self) -> Decimal {
        self.daily_loss
    }

    /// Balance snapshot taken at the start of the current day.
    pub fn starting_balance(&self) -> Decimal {
        self.starting_balance
    }

    /// Loss amount above which trading is blocked for the rest of the day.
    pub fn drawdown_limit(&self) -> Decimal {
        let reference = match self.config.drawdown_reference {
            DrawdownReference::InitialCapital => self.config.initial_capital,
            DrawdownReference::StartingBalance => self.starting_balance,
        };
        reference * (self.config.max_drawdown_pct / dec!(100))
    }

    /// Reset the daily accounting when the calendar date changed. Returns true on rollover.
    pub fn roll_if_new_day(&mut self, today: NaiveDate, equity: Option<f64>) -> bool {
        if today == self.last_reset_date {
            return false;
        }

        self.daily_loss = Decimal::ZERO;
        self.last_reset_date = today;
        self.starting_balance = Self::snapshot(&self.config, equity);

        info!(
            date = %today,
            starting_balance = %self.starting_balance,
            "New trading day, daily loss and starting balance reset"
        );
        true
    }

    /// Order quantity for the given equity: one contract plus one growth increment per
    /// full step above the initial capital, clamped to [1, max_qty] and rounded to 3 places.
    ///
    /// Equity beyond the decimal range saturates, so the result never shrinks as equity grows.
    pub fn calculate_quantity(&mut self, equity: f64, today: NaiveDate) -> Decimal {
        self.roll_if_new_day(today, Some(equity));

        let equity_dec = match Decimal::try_from(equity) {
            Ok(value) => value,
            Err(_) if equity > 0.0 => Decimal::MAX,
            Err(_) => Decimal::ZERO,
        };
        let steps = equity_dec
            .checked_sub(self.config.initial_capital)
            .and_then(|excess| excess.checked_div(self.config.step_size))
            .map(|steps| steps.floor())
            .unwrap_or(Decimal::MAX)
            .max(Decimal::ZERO);
        let raw_qty = steps
            .checked_mul(self.config.step_growth_pct / dec!(100))
            .and_then(|growth| growth.checked_add(Decimal::ONE))
            .unwrap_or(Decimal::MAX);

        // Rounding must not lift the result over the cap
        let cap = self
            .config
            .max_qty
            .round_dp_with_strategy(QTY_DECIMALS, RoundingStrategy::ToZero);
        let qty = raw_qty
            .max(Decimal::ONE)
            .min(self.config.max_qty)
            .round_dp(QTY_DECIMALS)
            .min(cap);

        debug!(equity = equity, steps = %steps, qty = %qty, "Position size calculated");
        qty
    }

    /// Whether today's realized losses exceed the drawdown limit.
    ///
    /// Fails open: with no balance available the breaker cannot be evaluated and trading
    /// is allowed. Callers that need strict capital protection must alarm on a missing
    /// balance separately.
    pub fn is_blocked(&mut self, balance: Option<f64>, today: NaiveDate) -> bool {
        self.roll_if_new_day(today, balance);

        if balance.is_none() {
            error!("Balance unavailable, drawdown breaker cannot be evaluated (allowing trading)");
            return false;
        }

        let limit = self.drawdown_limit();
        if self.daily_loss > limit {
            warn!(
                daily_loss = %self.daily_loss,
                limit = %limit,
                "Daily drawdown exceeded, trading blocked"
            );
            true
        } else {
            debug!(daily_loss = %self.daily_loss, limit = %limit, "Drawdown OK");
            false
        }
    }

    /// Record a realized trade result. Only losses count toward the daily limit.
    pub fn record_result(&mut self, profit: f64, today: NaiveDate) {
        self.roll_if_new_day(today, None);

        if profit < 0.0 {
            let loss = Decimal::try_from(profit.abs()).unwrap_or(Decimal::ZERO);
            self.daily_loss += loss;
            warn!(loss = %loss, daily_loss = %self.daily_loss, "Loss added to daily total");
        }
    }

    fn snapshot(config: &RiskConfig, equity: Option<f64>) -> Decimal {
        match equity.and_then(|e| Decimal::try_from(e).ok()) {
            Some(balance) => balance,
            None => {
                warn!("Balance unavailable, falling back to initial capital");
                config.initial_capital
            }
        }
    }
}
