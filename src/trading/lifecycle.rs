//! Single-position state machine: FLAT -> OPENING -> OPEN -> CLOSING -> FLAT.
//!
//! The manager owns the only `Position` in the process. Every transition that depends on
//! the exchange is abandoned (state restored) when the exchange call fails, so a failed
//! tick never leaves a half-open or half-closed position behind.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::api::{ExchangeClient, ExchangeError, OrderRequest};
use crate::models::{ClosedTrade, ExitReason, Position, Side, Signal};

use super::config::TrailingMode;
use super::signal::EntryVeto;
use super::trailing::next_trailing_stop;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("a {0} position is already open")]
    PositionAlreadyOpen(Side),

    #[error("no open position")]
    NoOpenPosition,

    #[error("exchange error: {0}")]
    Exchange(#[from] ExchangeError),
}

#[derive(Debug, Clone, Default)]
pub enum PositionState {
    #[default]
    Flat,
    Opening,
    Open(Position),
    Closing(Position),
}

impl PositionState {
    pub fn label(&self) -> &'static str {
        match self {
            PositionState::Flat => "flat",
            PositionState::Opening => "opening",
            PositionState::Open(_) => "open",
            PositionState::Closing(_) => "closing",
        }
    }
}

/// TP/SL check: longs exit at `price >= tp` or `price <= sl`, shorts mirrored.
pub fn check_exit_conditions(price: f64, take_profit: f64, stop_loss: f64, side: Side) -> Option<ExitReason> {
    match side {
        Side::Long if price >= take_profit => Some(ExitReason::TakeProfit),
        Side::Long if price <= stop_loss => Some(ExitReason::StopLoss),
        Side::Short if price <= take_profit => Some(ExitReason::TakeProfit),
        Side::Short if price >= stop_loss => Some(ExitReason::StopLoss),
        _ => None,
    }
}

/// Owner of the open position.
pub struct PositionManager {
    symbol: String,
    state: PositionState,
    last_entry_at: Option<DateTime<Utc>>,
}

impl PositionManager {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            state: PositionState::Flat,
            last_entry_at: None,
        }
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }

    pub fn is_flat(&self) -> bool {
        matches!(self.state, PositionState::Flat)
    }

    pub fn position(&self) -> Option<&Position> {
        match &self.state {
            PositionState::Open(p) | PositionState::Closing(p) => Some(p),
            _ => None,
        }
    }

    pub fn last_entry_at(&self) -> Option<DateTime<Utc>> {
        self.last_entry_at
    }

    /// Cooldown gate: refuses entries within `cooldown_minutes` of the previous one.
    pub fn can_trade(&self, now: DateTime<Utc>, cooldown_minutes: i64) -> Result<(), EntryVeto> {
        let Some(last) = self.last_entry_at else {
            return Ok(());
        };

        // A cooldown past chrono's range never expires
        let Some(ready_at) = Duration::try_minutes(cooldown_minutes)
            .and_then(|cooldown| last.checked_add_signed(cooldown))
        else {
            warn!(cooldown_minutes = cooldown_minutes, "Cooldown out of range");
            return Err(EntryVeto::Cooldown {
                remaining_secs: cooldown_minutes.saturating_mul(60),
            });
        };
        if now < ready_at {
            let remaining_secs = (ready_at - now).num_seconds();
            debug!(remaining_secs = remaining_secs, "Cooldown active");
            return Err(EntryVeto::Cooldown { remaining_secs });
        }
        Ok(())
    }

    /// Submit the entry for `signal` at the reference `price`.
    ///
    /// Protective levels are absolute prices computed from the fill (or `price` when the
    /// exchange reports no fill). In exchange trailing mode a trailing order is registered
    /// after the fill; failing to register it does not undo the entry.
    pub async fn open_trade(
        &mut self,
        exchange: &dyn ExchangeClient,
        signal: &Signal,
        price: f64,
        now: DateTime<Utc>,
        trailing_mode: TrailingMode,
    ) -> Result<&Position, LifecycleError> {
        match &self.state {
            PositionState::Flat => {}
            PositionState::Open(p) | PositionState::Closing(p) => {
                error!(side = %p.side, "Refusing to open a second position");
                return Err(LifecycleError::PositionAlreadyOpen(p.side));
            }
            PositionState::Opening => return Err(LifecycleError::PositionAlreadyOpen(signal.side)),
        }

        let request = OrderRequest {
            symbol: self.symbol.clone(),
            side: signal.side,
            quantity: signal.quantity,
            take_profit: Some(signal.take_profit_price(price)),
            stop_loss: Some(signal.stop_loss_price(price)),
            trailing_stop: None,
        };

        info!(
            side = %signal.side,
            qty = %signal.quantity,
            price = price,
            tp = request.take_profit,
            sl = request.stop_loss,
            score = signal.score,
            "Opening position"
        );

        self.state = PositionState::Opening;
        let ack = match exchange.open_market_order(&request).await {
            Ok(ack) => ack,
            Err(e) => {
                warn!(error = %e, "Entry rejected");
                self.state = PositionState::Flat;
                return Err(e.into());
            }
        };

        let entry_price = ack.fill_price.filter(|p| *p > 0.0).unwrap_or(price);
        let position = Position {
            side: signal.side,
            quantity: signal.quantity,
            entry_price,
            entry_time: now,
            take_profit: signal.take_profit_price(entry_price),
            stop_loss: signal.stop_loss_price(entry_price),
            trailing_stop: signal.initial_trailing_stop(entry_price),
            trail_distance: signal.trail_stop_distance,
            trail_offset: signal.trail_offset_distance,
            order_ref: ack.order_ref,
        };

        if trailing_mode == TrailingMode::Exchange {
            let trail_value = signal.exchange_trail_value();
            if let Err(e) = exchange
                .place_trailing(&self.symbol, signal.side, signal.quantity, trail_value)
                .await
            {
                warn!(error = %e, trail = trail_value, "Trailing stop registration failed");
            }
        }

        info!(
            side = %position.side,
            entry = entry_price,
            tp = position.take_profit,
            sl = position.stop_loss,
            trailing = position.trailing_stop,
            order_ref = ?position.order_ref,
            "Position opened"
        );

        self.last_entry_at = Some(now);
        self.state = PositionState::Open(position);
        match &self.state {
            PositionState::Open(p) => Ok(p),
            _ => Err(LifecycleError::NoOpenPosition),
        }
    }

    /// Exit check for the open position: TP/SL first, then the local trailing level.
    pub fn evaluate_exit(&self, price: f64, check_trailing: bool) -> Option<ExitReason> {
        let PositionState::Open(position) = &self.state else {
            return None;
        };

        if let Some(reason) =
            check_exit_conditions(price, position.take_profit, position.stop_loss, position.side)
        {
            return Some(reason);
        }

        if check_trailing && position.trailing_breached(price) {
            return Some(ExitReason::TrailingStop);
        }
        None
    }

    /// Recompute the trailing level and push it to the exchange when it tightens.
    ///
    /// Returns the new level if it moved. The local level only changes once the exchange
    /// accepted it.
    pub async fn update_trailing(
        &mut self,
        exchange: &dyn ExchangeClient,
        price: f64,
        atr: f64,
        trail_multiplier: f64,
    ) -> Result<Option<f64>, LifecycleError> {
        let PositionState::Open(position) = &mut self.state else {
            return Err(LifecycleError::NoOpenPosition);
        };

        let next = next_trailing_stop(position, price, atr, trail_multiplier);
        if next == position.trailing_stop {
            return Ok(None);
        }

        exchange.modify_stop_loss(&self.symbol, next, position.side).await?;

        debug!(from = position.trailing_stop, to = next, price = price, "Trailing stop tightened");
        position.trailing_stop = next;
        Ok(Some(next))
    }

    /// Flatten the open position.
    ///
    /// On failure the position stays open and the next tick re-evaluates it.
    pub async fn close_trade(
        &mut self,
        exchange: &dyn ExchangeClient,
        price: f64,
        reason: ExitReason,
        now: DateTime<Utc>,
    ) -> Result<ClosedTrade, LifecycleError> {
        let position = match std::mem::take(&mut self.state) {
            PositionState::Open(p) => p,
            other => {
                self.state = other;
                return Err(LifecycleError::NoOpenPosition);
            }
        };

        self.state = PositionState::Closing(position.clone());
        let ack = match exchange.close_market_order(&self.symbol, position.side).await {
            Ok(ack) => ack,
            Err(e) => {
                warn!(error = %e, reason = %reason, "Close failed, position kept open");
                self.state = PositionState::Open(position);
                return Err(e.into());
            }
        };

        let exit_price = ack.fill_price.filter(|p| *p > 0.0).unwrap_or(price);
        let pnl = position.pnl_at(exit_price);

        info!(
            side = %position.side,
            entry = position.entry_price,
            exit = exit_price,
            pnl = pnl,
            reason = %reason,
            "Position closed"
        );

        self.state = PositionState::Flat;
        Ok(ClosedTrade {
            side: position.side,
            quantity: position.quantity,
            entry_price: position.entry_price,
            exit_price,
            entry_time: position.entry_time,
            exit_time: now,
            pnl,
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::PaperExchange;
    use rust_decimal_macros::dec;

    fn signal(side: Side) -> Signal {
        Signal {
            side,
            score: 4,
            take_profit_offset: 4.0,
            stop_loss_offset: 2.0,
            trail_stop_distance: 0.9,
            trail_offset_distance: 0.6,
            quantity: dec!(2),
        }
    }

    #[test]
    fn test_check_exit_conditions() {
        assert_eq!(check_exit_conditions(104.0, 104.0, 98.0, Side::Long), Some(ExitReason::TakeProfit));
        assert_eq!(check_exit_conditions(98.0, 104.0, 98.0, Side::Long), Some(ExitReason::StopLoss));
        assert_eq!(check_exit_conditions(101.0, 104.0, 98.0, Side::Long), None);
        assert_eq!(check_exit_conditions(96.0, 96.0, 102.0, Side::Short), Some(ExitReason::TakeProfit));
        assert_eq!(check_exit_conditions(102.5, 96.0, 102.0, Side::Short), Some(ExitReason::StopLoss));
        assert_eq!(check_exit_conditions(99.0, 96.0, 102.0, Side::Short), None);
    }

    #[tokio::test]
    async fn test_round_trip_long() {
        let exchange = PaperExchange::new(100.0, 1000.0);
        let mut manager = PositionManager::new("BTC-USDT");
        let now = Utc::now();

        let position = manager
            .open_trade(&exchange, &signal(Side::Long), 100.0, now, TrailingMode::Manual)
            .await
            .unwrap();
        assert_eq!(position.take_profit, 104.0);
        assert_eq!(position.stop_loss, 98.0);
        assert!((position.trailing_stop - 98.5).abs() < 1e-9);
        assert_eq!(manager.last_entry_at(), Some(now));

        exchange.set_price(104.5).await;
        assert_eq!(manager.evaluate_exit(104.5, true), Some(ExitReason::TakeProfit));

        let trade = manager
            .close_trade(&exchange, 104.5, ExitReason::TakeProfit, now)
            .await
            .unwrap();
        assert_eq!(trade.exit_price, 104.5);
        assert!((trade.pnl - 9.0).abs() < 1e-9);
        assert!(manager.is_flat());
    }

    #[tokio::test]
    async fn test_second_open_is_rejected() {
        let exchange = PaperExchange::new(100.0, 1000.0);
        let mut manager = PositionManager::new("BTC-USDT");
        let now = Utc::now();

        manager
            .open_trade(&exchange, &signal(Side::Long), 100.0, now, TrailingMode::Manual)
            .await
            .unwrap();
        let result = manager
            .open_trade(&exchange, &signal(Side::Short), 100.0, now, TrailingMode::Manual)
            .await;

        assert!(matches!(result, Err(LifecycleError::PositionAlreadyOpen(Side::Long))));
        assert_eq!(manager.position().map(|p| p.side), Some(Side::Long));
    }

    #[tokio::test]
    async fn test_rejected_entry_returns_to_flat() {
        let exchange = PaperExchange::new(100.0, 1000.0);
        exchange.set_reject_orders(true).await;
        let mut manager = PositionManager::new("BTC-USDT");

        let result = manager
            .open_trade(&exchange, &signal(Side::Long), 100.0, Utc::now(), TrailingMode::Manual)
            .await;

        assert!(matches!(result, Err(LifecycleError::Exchange(ExchangeError::Rejected(_)))));
        assert!(manager.is_flat());
        assert!(manager.last_entry_at().is_none());
    }

    #[tokio::test]
    async fn test_failed_close_keeps_position() {
        let exchange = PaperExchange::new(100.0, 1000.0);
        let mut manager = PositionManager::new("BTC-USDT");
        let now = Utc::now();
        manager
            .open_trade(&exchange, &signal(Side::Short), 100.0, now, TrailingMode::Manual)
            .await
            .unwrap();

        exchange.set_reject_orders(true).await;
        let result = manager.close_trade(&exchange, 97.0, ExitReason::TakeProfit, now).await;

        assert!(result.is_err());
        assert_eq!(manager.state().label(), "open");
    }

    #[tokio::test]
    async fn test_close_when_flat() {
        let exchange = PaperExchange::new(100.0, 1000.0);
        let mut manager = PositionManager::new("BTC-USDT");
        let result = manager
            .close_trade(&exchange, 100.0, ExitReason::StopLoss, Utc::now())
            .await;
        assert!(matches!(result, Err(LifecycleError::NoOpenPosition)));
    }

    #[tokio::test]
    async fn test_exchange_trailing_registration() {
        let exchange = PaperExchange::new(100.0, 1000.0);
        let mut manager = PositionManager::new("BTC-USDT");
        manager
            .open_trade(&exchange, &signal(Side::Long), 100.0, Utc::now(), TrailingMode::Exchange)
            .await
            .unwrap();

        let orders = exchange.trailing_orders().await;
        assert_eq!(orders.len(), 1);
        assert!((orders[0] - 0.3).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_manual_trailing_tightens_and_breaches() {
        let exchange = PaperExchange::new(100.0, 1000.0);
        let mut manager = PositionManager::new("BTC-USDT");
        manager
            .open_trade(&exchange, &signal(Side::Long), 100.0, Utc::now(), TrailingMode::Manual)
            .await
            .unwrap();

        // Not yet past the activation offset
        assert_eq!(manager.update_trailing(&exchange, 100.3, 1.0, 0.9).await.unwrap(), None);

        let level = manager.update_trailing(&exchange, 103.0, 1.0, 0.9).await.unwrap();
        assert!((level.unwrap() - 102.1).abs() < 1e-9);
        assert_eq!(exchange.stop_updates().await.len(), 1);

        // Pullback leaves the level alone
        assert_eq!(manager.update_trailing(&exchange, 102.5, 1.0, 0.9).await.unwrap(), None);

        assert_eq!(manager.evaluate_exit(102.0, true), Some(ExitReason::TrailingStop));
        assert_eq!(manager.evaluate_exit(102.0, false), None);
    }

    #[test]
    fn test_cooldown() {
        let mut manager = PositionManager::new("BTC-USDT");
        let now = Utc::now();
        assert!(manager.can_trade(now, 20).is_ok());

        manager.last_entry_at = Some(now);
        let veto = manager.can_trade(now + Duration::minutes(5), 20).unwrap_err();
        assert_eq!(veto, EntryVeto::Cooldown { remaining_secs: 15 * 60 });
        assert!(manager.can_trade(now + Duration::minutes(20), 20).is_ok());
    }

    #[test]
    fn test_cooldown_out_of_range_vetoes() {
        let mut manager = PositionManager::new("BTC-USDT");
        let now = Utc::now();
        manager.last_entry_at = Some(now);

        let veto = manager.can_trade(now, 1_000_000_000_000_000).unwrap_err();
        assert!(matches!(veto, EntryVeto::Cooldown { remaining_secs } if remaining_secs > 0));
        assert!(manager.can_trade(now + Duration::days(365), i64::MAX).is_err());
    }
}
