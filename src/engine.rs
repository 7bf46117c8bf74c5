//! Engine runner: one atomic evaluation per tick.
//!
//! Handles:
//! - Refreshing the candle window on its own cadence
//! - Managing the open position (trailing, TP/SL, trailing breach, close and record)
//! - Evaluating entries behind the cooldown, drawdown, data and score vetoes
//! - Driving ticks on an interval until Ctrl-C

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::api::{Balance, CandleFeed, ExchangeClient, ExchangeError};
use crate::db::TradeLogStore;
use crate::indicators::IndicatorSet;
use crate::models::{Candle, ClosedTrade, Position};
use crate::trading::{
    oracle_for, AdjustmentOracle, ConfigError, EntryVeto, LifecycleError, PositionManager,
    RiskConfig, RiskSizer, SignalScorer, StrategyConfig, TradeMemory, TrailingMode,
};

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Exchange symbol, e.g. `BTC-USDT`
    pub symbol: String,

    /// Candle timeframe requested from the feed
    pub timeframe: String,

    /// Candles kept in the working window
    pub candle_limit: usize,

    /// Seconds between candle refreshes
    pub candle_refresh_secs: u64,

    /// Seconds between ticks
    pub tick_interval_secs: u64,

    /// JSON file holding the recent P&Ls
    pub trade_log_path: PathBuf,

    pub strategy: StrategyConfig,

    pub risk: RiskConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbol: "BTC-USDT".to_string(),
            timeframe: "3m".to_string(),
            candle_limit: 250,
            candle_refresh_secs: 180,
            tick_interval_secs: 1,
            trade_log_path: PathBuf::from("recent_trades.json"),
            strategy: StrategyConfig::default(),
            risk: RiskConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults, overlaid with the JSON file at `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Invalid(format!("cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| ConfigError::Invalid(format!("cannot parse {}: {}", path.display(), e)))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::Invalid("symbol must not be empty".to_string()));
        }
        if self.candle_limit < crate::trading::MIN_CANDLES {
            return Err(ConfigError::Invalid(format!(
                "candle_limit must be at least {} (got {})",
                crate::trading::MIN_CANDLES,
                self.candle_limit
            )));
        }
        if self.tick_interval_secs == 0 {
            return Err(ConfigError::NotPositive {
                field: "tick_interval_secs",
                value: "0".to_string(),
            });
        }
        self.strategy.validate()?;
        self.risk.validate()?;
        Ok(())
    }
}

/// Per-tick failure. Logged by the runner, never fatal.
#[derive(Debug, Error)]
pub enum TickError {
    #[error("collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl From<ExchangeError> for TickError {
    fn from(e: ExchangeError) -> Self {
        TickError::CollaboratorUnavailable(e.to_string())
    }
}

impl From<LifecycleError> for TickError {
    fn from(e: LifecycleError) -> Self {
        match e {
            LifecycleError::Exchange(inner) => inner.into(),
            other => TickError::InvariantViolation(other.to_string()),
        }
    }
}

/// What a tick did.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// Flat, and an entry was not attempted
    Vetoed(EntryVeto),
    Opened(Position),
    /// Position still open after the checks
    Holding { price: f64, trailing_stop: f64 },
    Closed(ClosedTrade),
}

/// The decision engine.
pub struct Engine {
    config: EngineConfig,
    exchange: Arc<dyn ExchangeClient>,
    feed: Arc<dyn CandleFeed>,
    store: Arc<dyn TradeLogStore>,

    scorer: SignalScorer,
    oracle: Box<dyn AdjustmentOracle>,
    risk: RiskSizer,
    memory: TradeMemory,
    positions: PositionManager,

    candles: Vec<Candle>,
    last_refresh: Option<DateTime<Utc>>,

    // Shutdown signal
    shutdown: Arc<AtomicBool>,
}

fn local_date(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&Local).date_naive()
}

impl Engine {
    /// Validate the configuration and restore trade memory from the store.
    pub async fn new(
        config: EngineConfig,
        exchange: Arc<dyn ExchangeClient>,
        feed: Arc<dyn CandleFeed>,
        store: Arc<dyn TradeLogStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let capacity = config.strategy.memory_capacity;
        let history = match store.load_recent(capacity).await {
            Ok(history) => history,
            Err(e) => {
                warn!(error = %e, "Trade log unreadable, starting with empty memory");
                Vec::new()
            }
        };
        let memory = TradeMemory::from_history(capacity, &history);

        let equity = match exchange.get_balance().await {
            Ok(balance) => Some(balance.equity),
            Err(e) => {
                warn!(error = %e, "Balance unavailable at startup");
                None
            }
        };
        let risk = RiskSizer::new(config.risk.clone(), local_date(Utc::now()), equity);

        info!(
            symbol = %config.symbol,
            timeframe = %config.timeframe,
            adjustment = ?config.strategy.adjustment,
            trailing = ?config.strategy.trailing,
            "Engine initialized"
        );

        Ok(Self {
            scorer: SignalScorer::new(config.strategy.clone()),
            oracle: oracle_for(config.strategy.adjustment),
            positions: PositionManager::new(config.symbol.clone()),
            config,
            exchange,
            feed,
            store,
            risk,
            memory,
            candles: Vec::new(),
            last_refresh: None,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn memory(&self) -> &TradeMemory {
        &self.memory
    }

    pub fn positions(&self) -> &PositionManager {
        &self.positions
    }

    /// Main run loop.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        info!(
            symbol = %self.config.symbol,
            tick_secs = self.config.tick_interval_secs,
            "Starting engine loop"
        );

        let mut ticker = interval(Duration::from_secs(self.config.tick_interval_secs));

        // Register shutdown handler
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received");
            shutdown.store(true, Ordering::SeqCst);
        });

        while !self.shutdown.load(Ordering::SeqCst) {
            ticker.tick().await;

            match self.tick(Utc::now()).await {
                Ok(TickOutcome::Opened(p)) => {
                    info!(side = %p.side, entry = p.entry_price, qty = %p.quantity, "Entered")
                }
                Ok(TickOutcome::Closed(t)) => {
                    info!(pnl = t.pnl, reason = %t.reason, "Exited")
                }
                Ok(outcome) => debug!(outcome = ?outcome, "Tick"),
                Err(e) => error!(error = %e, "Error in engine tick"),
            }
        }

        info!(
            state = self.positions.state().label(),
            remembered = self.memory.len(),
            "Engine stopped"
        );
        Ok(())
    }

    /// One evaluation at `now`.
    ///
    /// A failed collaborator call abandons the tick before any state changes; the next
    /// tick starts from fresh inputs.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<TickOutcome, TickError> {
        self.refresh_candles(now).await;

        let price = self.exchange.get_price(&self.config.symbol).await?;
        if !(price.is_finite() && price > 0.0) {
            return Err(TickError::CollaboratorUnavailable(format!("invalid price {}", price)));
        }

        let balance = match self.exchange.get_balance().await {
            Ok(balance) => Some(balance),
            Err(e) => {
                warn!(error = %e, "Balance unavailable");
                None
            }
        };

        let today = local_date(now);
        self.risk.roll_if_new_day(today, balance.map(|b| b.equity));

        if self.positions.position().is_some() {
            self.manage_position(price, now, today).await
        } else {
            self.evaluate_entry(price, balance, now, today).await
        }
    }

    async fn refresh_candles(&mut self, now: DateTime<Utc>) {
        let due = match self.last_refresh {
            None => true,
            Some(last) => (now - last).num_seconds() >= self.config.candle_refresh_secs as i64,
        };
        if !due && !self.candles.is_empty() {
            return;
        }

        let candles = self
            .feed
            .fetch_recent_candles(&self.config.symbol, &self.config.timeframe, self.config.candle_limit)
            .await;

        if candles.is_empty() {
            warn!("No candles received, keeping previous window");
            return;
        }

        debug!(count = candles.len(), "Candle window refreshed");
        self.candles = candles;
        self.last_refresh = Some(now);
    }

    /// Working window with the latest close replaced by the live price.
    fn live_window(&self, price: f64) -> Vec<Candle> {
        let mut window = self.candles.clone();
        if let Some(last) = window.last_mut() {
            last.close = price;
        }
        window
    }

    async fn manage_position(
        &mut self,
        price: f64,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> Result<TickOutcome, TickError> {
        let manual = self.config.strategy.trailing == TrailingMode::Manual;

        if manual {
            let atr = IndicatorSet::compute(&self.live_window(price), self.config.strategy.atr_period)
                .last_atr();
            if let Err(e) = self
                .positions
                .update_trailing(
                    self.exchange.as_ref(),
                    price,
                    atr,
                    self.config.strategy.trail_multiplier,
                )
                .await
            {
                warn!(error = %e, "Trailing update skipped");
            }
        }

        let Some(reason) = self.positions.evaluate_exit(price, manual) else {
            let trailing_stop = self.positions.position().map(|p| p.trailing_stop).unwrap_or(0.0);
            return Ok(TickOutcome::Holding { price, trailing_stop });
        };

        let trade = self
            .positions
            .close_trade(self.exchange.as_ref(), price, reason, now)
            .await?;
        self.record(&trade, today).await;

        Ok(TickOutcome::Closed(trade))
    }

    async fn record(&mut self, trade: &ClosedTrade, today: NaiveDate) {
        self.memory.push(trade.pnl);
        self.risk.record_result(trade.pnl, today);

        if let Err(e) = self.store.append_pnl(trade.pnl).await {
            error!(error = %e, pnl = trade.pnl, "Failed to persist P&L");
        }
        if let Err(e) = self.store.record_trade(trade).await {
            warn!(error = %e, "Failed to journal trade");
        }
    }

    async fn evaluate_entry(
        &mut self,
        price: f64,
        balance: Option<Balance>,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> Result<TickOutcome, TickError> {
        if let Err(veto) = self.positions.can_trade(now, self.config.strategy.cooldown_minutes) {
            return Ok(TickOutcome::Vetoed(veto));
        }

        if self.risk.is_blocked(balance.map(|b| b.balance), today) {
            return Ok(TickOutcome::Vetoed(EntryVeto::RiskBlocked));
        }

        let window = self.live_window(price);
        let assessment = match self.scorer.assess(&window) {
            Ok(assessment) => assessment,
            Err(veto) => {
                debug!(veto = %veto, "Entry skipped");
                return Ok(TickOutcome::Vetoed(veto));
            }
        };

        let side = match self.scorer.entry_side(&assessment) {
            Ok(side) => side,
            Err(veto) => return Ok(TickOutcome::Vetoed(veto)),
        };

        let equity = match balance {
            Some(b) => b.equity,
            None => {
                warn!("Equity unavailable, sizing from initial capital");
                self.config.risk.initial_capital.to_f64().unwrap_or(0.0)
            }
        };
        let quantity = self.risk.calculate_quantity(equity, today);
        let factor = self.oracle.factor(&self.memory.values());
        let signal = self.scorer.build_signal(&assessment, side, quantity, factor);

        info!(
            side = %side,
            score = signal.score,
            qty = %quantity,
            factor = factor,
            "Entry signal"
        );

        let position = self
            .positions
            .open_trade(
                self.exchange.as_ref(),
                &signal,
                price,
                now,
                self.config.strategy.trailing,
            )
            .await?;

        Ok(TickOutcome::Opened(position.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{PaperExchange, StaticFeed};
    use crate::db::InMemoryTradeLog;
    use crate::models::{ExitReason, Side};
    use crate::trading::breakout_candles;
    use chrono::Duration as ChronoDuration;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct Harness {
        engine: Engine,
        exchange: Arc<PaperExchange>,
        feed: Arc<StaticFeed>,
        store: Arc<InMemoryTradeLog>,
    }

    async fn harness_with(config: EngineConfig, candles: Vec<Candle>, history: &[f64]) -> Harness {
        let price = candles.last().map(|c| c.close).unwrap_or(100.0);
        let exchange = Arc::new(PaperExchange::new(price, 100.0));
        let feed = Arc::new(StaticFeed::new(candles));
        let store = Arc::new(InMemoryTradeLog::with_history(10, history));

        let engine = Engine::new(config, exchange.clone(), feed.clone(), store.clone())
            .await
            .unwrap();

        Harness { engine, exchange, feed, store }
    }

    async fn harness(side: Side) -> Harness {
        harness_with(EngineConfig::default(), breakout_candles(side), &[]).await
    }

    fn quiet_candles() -> Vec<Candle> {
        (0..260)
            .map(|i| Candle::flat(i as i64 * 180_000, 100.0, 1000.0))
            .collect()
    }

    #[tokio::test]
    async fn test_long_round_trip() {
        let mut h = harness(Side::Long).await;
        let t0 = Utc::now();

        let position = match h.engine.tick(t0).await.unwrap() {
            TickOutcome::Opened(p) => p,
            other => panic!("expected entry, got {:?}", other),
        };
        assert_eq!(position.side, Side::Long);
        assert_eq!(position.quantity, dec!(1));
        assert!(position.take_profit > position.entry_price);
        assert!(position.stop_loss < position.entry_price);

        h.exchange.set_price(139.0).await;
        let trade = match h.engine.tick(t0 + ChronoDuration::seconds(1)).await.unwrap() {
            TickOutcome::Closed(t) => t,
            other => panic!("expected exit, got {:?}", other),
        };
        assert_eq!(trade.reason, ExitReason::TakeProfit);
        assert!((trade.pnl - (139.0 - position.entry_price)).abs() < 1e-9);

        assert!(h.engine.positions().is_flat());
        assert_eq!(h.engine.memory().values(), vec![trade.pnl]);
        assert_eq!(h.store.load_recent(10).await.unwrap(), vec![trade.pnl]);
        assert_eq!(h.store.trades().await.len(), 1);
        assert_eq!(h.engine.risk.daily_loss(), dec!(0));
        assert!(!h.exchange.stop_updates().await.is_empty());
    }

    #[tokio::test]
    async fn test_short_stop_loss_records_loss() {
        let mut h = harness(Side::Short).await;
        let t0 = Utc::now();

        let position = match h.engine.tick(t0).await.unwrap() {
            TickOutcome::Opened(p) => p,
            other => panic!("expected entry, got {:?}", other),
        };
        assert_eq!(position.side, Side::Short);

        let exit = position.stop_loss + 0.5;
        h.exchange.set_price(exit).await;
        let trade = match h.engine.tick(t0 + ChronoDuration::seconds(1)).await.unwrap() {
            TickOutcome::Closed(t) => t,
            other => panic!("expected exit, got {:?}", other),
        };

        assert_eq!(trade.reason, ExitReason::StopLoss);
        assert!(trade.pnl < 0.0);
        let loss = Decimal::try_from(trade.pnl.abs()).unwrap();
        assert_eq!(h.engine.risk.daily_loss(), loss);
    }

    #[tokio::test]
    async fn test_holding_between_targets() {
        let mut h = harness(Side::Long).await;
        let t0 = Utc::now();
        h.engine.tick(t0).await.unwrap();

        match h.engine.tick(t0 + ChronoDuration::seconds(1)).await.unwrap() {
            TickOutcome::Holding { price, .. } => assert!((price - 134.9).abs() < 1e-9),
            other => panic!("expected hold, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_manual_trailing_locks_in_profit() {
        let mut h = harness(Side::Long).await;
        let t0 = Utc::now();
        let position = match h.engine.tick(t0).await.unwrap() {
            TickOutcome::Opened(p) => p,
            other => panic!("expected entry, got {:?}", other),
        };

        // Past the activation offset, short of TP: the stop follows price
        h.exchange.set_price(136.5).await;
        let stop = match h.engine.tick(t0 + ChronoDuration::seconds(1)).await.unwrap() {
            TickOutcome::Holding { trailing_stop, .. } => trailing_stop,
            other => panic!("expected hold, got {:?}", other),
        };
        assert!(stop > position.entry_price);
        assert_eq!(h.exchange.stop_updates().await, vec![stop]);

        h.exchange.set_price(135.0).await;
        let trade = match h.engine.tick(t0 + ChronoDuration::seconds(2)).await.unwrap() {
            TickOutcome::Closed(t) => t,
            other => panic!("expected exit, got {:?}", other),
        };
        assert_eq!(trade.reason, ExitReason::TrailingStop);
        assert!(trade.pnl > 0.0);
        assert_eq!(h.engine.memory().values(), vec![trade.pnl]);
        assert_eq!(h.store.load_recent(10).await.unwrap(), vec![trade.pnl]);
        assert_eq!(h.engine.risk.daily_loss(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_manual_trailing_breach_records_loss() {
        // Stop loss wider than the initial trailing distance, so the trailing level trips first
        let mut config = EngineConfig::default();
        config.strategy.sl_multiplier = 3.0;
        let mut h = harness_with(config, breakout_candles(Side::Long), &[]).await;
        let t0 = Utc::now();
        let position = match h.engine.tick(t0).await.unwrap() {
            TickOutcome::Opened(p) => p,
            other => panic!("expected entry, got {:?}", other),
        };
        assert!(position.stop_loss < position.trailing_stop);

        h.exchange.set_price(position.trailing_stop - 0.2).await;
        let trade = match h.engine.tick(t0 + ChronoDuration::seconds(1)).await.unwrap() {
            TickOutcome::Closed(t) => t,
            other => panic!("expected exit, got {:?}", other),
        };

        assert_eq!(trade.reason, ExitReason::TrailingStop);
        assert!(trade.pnl < 0.0);
        assert!(h.engine.positions().is_flat());
        assert_eq!(h.engine.memory().values(), vec![trade.pnl]);
        assert_eq!(h.store.load_recent(10).await.unwrap(), vec![trade.pnl]);
        assert_eq!(h.store.trades().await.len(), 1);
        let loss = Decimal::try_from(trade.pnl.abs()).unwrap();
        assert_eq!(h.engine.risk.daily_loss(), loss);
    }

    #[tokio::test]
    async fn test_cooldown_veto() {
        let mut h = harness(Side::Long).await;
        let t0 = Utc::now();
        h.engine.tick(t0).await.unwrap();

        h.exchange.set_price(139.0).await;
        h.engine.tick(t0 + ChronoDuration::seconds(1)).await.unwrap();

        // Same breakout, still inside the 20 minute window
        h.exchange.set_price(134.9).await;
        let outcome = h.engine.tick(t0 + ChronoDuration::seconds(2)).await.unwrap();
        assert!(matches!(outcome, TickOutcome::Vetoed(EntryVeto::Cooldown { .. })));

        let outcome = h.engine.tick(t0 + ChronoDuration::minutes(21)).await.unwrap();
        assert!(matches!(outcome, TickOutcome::Opened(_)));
    }

    #[tokio::test]
    async fn test_risk_block_veto() {
        let mut h = harness(Side::Long).await;
        let now = Utc::now();
        let today = local_date(now);
        h.engine.risk.record_result(-3.0, today);
        h.engine.risk.record_result(-3.0, today);

        let outcome = h.engine.tick(now).await.unwrap();
        assert!(matches!(outcome, TickOutcome::Vetoed(EntryVeto::RiskBlocked)));
        assert!(h.engine.positions().is_flat());
    }

    #[tokio::test]
    async fn test_low_score_veto() {
        let mut h = harness_with(EngineConfig::default(), quiet_candles(), &[]).await;
        let outcome = h.engine.tick(Utc::now()).await.unwrap();
        assert!(matches!(outcome, TickOutcome::Vetoed(EntryVeto::LowScore { .. })));
    }

    #[tokio::test]
    async fn test_insufficient_data_veto() {
        let candles = quiet_candles()[..5].to_vec();
        let mut h = harness_with(EngineConfig::default(), candles, &[]).await;
        let outcome = h.engine.tick(Utc::now()).await.unwrap();
        assert!(matches!(
            outcome,
            TickOutcome::Vetoed(EntryVeto::InsufficientData { have: 5, .. })
        ));
    }

    #[tokio::test]
    async fn test_price_outage_skips_tick() {
        let mut h = harness(Side::Long).await;
        h.exchange.set_price_unavailable(true).await;

        let result = h.engine.tick(Utc::now()).await;
        assert!(matches!(result, Err(TickError::CollaboratorUnavailable(_))));
        assert!(h.engine.positions().is_flat());
        assert!(h.engine.positions().last_entry_at().is_none());
    }

    #[tokio::test]
    async fn test_rejected_entry_stays_flat() {
        let mut h = harness(Side::Long).await;
        h.exchange.set_reject_orders(true).await;

        let result = h.engine.tick(Utc::now()).await;
        assert!(matches!(result, Err(TickError::CollaboratorUnavailable(_))));
        assert!(h.engine.positions().is_flat());

        // Next tick re-evaluates from scratch
        h.exchange.set_reject_orders(false).await;
        let outcome = h.engine.tick(Utc::now()).await.unwrap();
        assert!(matches!(outcome, TickOutcome::Opened(_)));
    }

    #[tokio::test]
    async fn test_balance_outage_fails_open() {
        let mut h = harness(Side::Long).await;
        h.exchange.set_balance_unavailable(true).await;

        match h.engine.tick(Utc::now()).await.unwrap() {
            TickOutcome::Opened(p) => assert_eq!(p.quantity, dec!(1)),
            other => panic!("expected entry, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_history_widens_targets() {
        let mut plain = harness(Side::Long).await;
        let base = plain.engine.tick(Utc::now()).await.unwrap();
        let mut h = harness_with(EngineConfig::default(), breakout_candles(Side::Long), &[20.0, 20.0]).await;
        let widened = h.engine.tick(Utc::now()).await.unwrap();

        match (base, widened) {
            (TickOutcome::Opened(a), TickOutcome::Opened(b)) => {
                let tp_a = a.take_profit - a.entry_price;
                let tp_b = b.take_profit - b.entry_price;
                assert!((tp_b / tp_a - 1.3).abs() < 1e-9);
            }
            other => panic!("expected two entries, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exchange_trailing_mode() {
        let mut config = EngineConfig::default();
        config.strategy.trailing = TrailingMode::Exchange;
        let mut h = harness_with(config, breakout_candles(Side::Long), &[]).await;
        let t0 = Utc::now();

        h.engine.tick(t0).await.unwrap();
        assert_eq!(h.exchange.trailing_orders().await.len(), 1);

        // Price rises without reaching TP: no local stop updates in exchange mode
        h.exchange.set_price(136.0).await;
        let outcome = h.engine.tick(t0 + ChronoDuration::seconds(1)).await.unwrap();
        assert!(matches!(outcome, TickOutcome::Holding { .. }));
        assert!(h.exchange.stop_updates().await.is_empty());
    }

    #[tokio::test]
    async fn test_candle_refresh_cadence() {
        let mut h = harness_with(EngineConfig::default(), quiet_candles(), &[]).await;
        let t0 = Utc::now();

        h.engine.tick(t0).await.unwrap();
        h.engine.tick(t0 + ChronoDuration::seconds(1)).await.unwrap();
        assert_eq!(h.feed.fetch_count(), 1);

        h.engine.tick(t0 + ChronoDuration::seconds(181)).await.unwrap();
        assert_eq!(h.feed.fetch_count(), 2);
    }

    #[test]
    fn test_config_validation() {
        assert!(EngineConfig::default().validate().is_ok());

        let mut config = EngineConfig::default();
        config.candle_limit = 3;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.risk.step_size = dec!(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotPositive { field: "step_size", .. })
        ));
    }

    #[test]
    fn test_config_file_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(
            &path,
            r#"{"symbol": "ETH-USDT", "strategy": {"cooldown_minutes": 5}, "risk": {"drawdown_reference": "starting_balance"}}"#,
        )
        .unwrap();

        let config = EngineConfig::load(Some(path.as_path())).unwrap();
        assert_eq!(config.symbol, "ETH-USDT");
        assert_eq!(config.strategy.cooldown_minutes, 5);
        assert_eq!(config.strategy.tp_multiplier, 2.2);
        assert_eq!(config.timeframe, "3m");

        let missing = dir.path().join("missing.json");
        assert!(EngineConfig::load(Some(missing.as_path())).is_err());
    }
}
