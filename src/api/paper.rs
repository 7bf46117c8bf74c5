//! In-process paper exchange.
//!
//! Fills at the current quote, realizes P&L into the balance on close, and records every
//! stop update so runs can be inspected afterwards. Faults can be injected per call type.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::models::Side;

use super::exchange::{Balance, ExchangeClient, ExchangeError, OrderAck, OrderRequest};

#[derive(Debug, Clone)]
struct PaperFill {
    side: Side,
    quantity: f64,
    entry_price: f64,
}

#[derive(Debug, Default)]
struct PaperState {
    price: f64,
    balance: f64,
    price_down: bool,
    balance_down: bool,
    reject_orders: bool,
    open: Option<PaperFill>,
    order_count: u64,
    stop_updates: Vec<f64>,
    trailing_orders: Vec<f64>,
}

/// Simulated exchange holding one position at a time.
pub struct PaperExchange {
    state: Mutex<PaperState>,
    /// Live quote source; when set, the stored price follows it
    quotes: Option<Arc<dyn ExchangeClient>>,
}

impl PaperExchange {
    pub fn new(price: f64, balance: f64) -> Self {
        Self {
            state: Mutex::new(PaperState {
                price,
                balance,
                ..Default::default()
            }),
            quotes: None,
        }
    }

    /// Paper account priced from another client's quotes.
    pub fn with_quotes(quotes: Arc<dyn ExchangeClient>, balance: f64) -> Self {
        let mut exchange = Self::new(0.0, balance);
        exchange.quotes = Some(quotes);
        exchange
    }

    pub async fn set_price(&self, price: f64) {
        self.state.lock().await.price = price;
    }

    pub async fn set_price_unavailable(&self, down: bool) {
        self.state.lock().await.price_down = down;
    }

    pub async fn set_balance_unavailable(&self, down: bool) {
        self.state.lock().await.balance_down = down;
    }

    pub async fn set_reject_orders(&self, reject: bool) {
        self.state.lock().await.reject_orders = reject;
    }

    pub async fn balance(&self) -> f64 {
        self.state.lock().await.balance
    }

    #[cfg(test)]
    pub async fn has_open_position(&self) -> bool {
        self.state.lock().await.open.is_some()
    }

    /// Every stop level pushed through `modify_stop_loss`, oldest first.
    pub async fn stop_updates(&self) -> Vec<f64> {
        self.state.lock().await.stop_updates.clone()
    }

    /// Trail values registered through `place_trailing`.
    pub async fn trailing_orders(&self) -> Vec<f64> {
        self.state.lock().await.trailing_orders.clone()
    }

    fn next_ref(state: &mut PaperState) -> String {
        state.order_count += 1;
        format!("paper-{}", state.order_count)
    }

    fn unrealized(state: &PaperState) -> f64 {
        state
            .open
            .as_ref()
            .map(|fill| (state.price - fill.entry_price) * fill.quantity * fill.side.sign())
            .unwrap_or(0.0)
    }
}

#[async_trait]
impl ExchangeClient for PaperExchange {
    async fn get_price(&self, symbol: &str) -> Result<f64, ExchangeError> {
        if let Some(quotes) = &self.quotes {
            let price = quotes.get_price(symbol).await?;
            self.state.lock().await.price = price;
            return Ok(price);
        }

        let state = self.state.lock().await;
        if state.price_down || state.price <= 0.0 {
            return Err(ExchangeError::Unavailable("price".to_string()));
        }
        Ok(state.price)
    }

    async fn get_balance(&self) -> Result<Balance, ExchangeError> {
        let state = self.state.lock().await;
        if state.balance_down {
            return Err(ExchangeError::Unavailable("balance".to_string()));
        }
        Ok(Balance {
            balance: state.balance,
            equity: state.balance + Self::unrealized(&state),
        })
    }

    async fn open_market_order(&self, order: &OrderRequest) -> Result<OrderAck, ExchangeError> {
        let mut state = self.state.lock().await;
        if state.reject_orders {
            return Err(ExchangeError::Rejected("paper exchange rejecting orders".to_string()));
        }
        if state.open.is_some() {
            return Err(ExchangeError::Rejected("position already open".to_string()));
        }

        let quantity = order.quantity.to_f64().unwrap_or(0.0);
        let entry_price = state.price;
        state.open = Some(PaperFill {
            side: order.side,
            quantity,
            entry_price,
        });
        let order_ref = Self::next_ref(&mut state);

        info!(
            order_ref = %order_ref,
            side = %order.side,
            qty = %order.quantity,
            price = entry_price,
            "Paper fill"
        );

        Ok(OrderAck {
            order_ref: Some(order_ref),
            fill_price: Some(entry_price),
        })
    }

    async fn close_market_order(&self, _symbol: &str, side: Side) -> Result<OrderAck, ExchangeError> {
        let mut state = self.state.lock().await;
        if state.reject_orders {
            return Err(ExchangeError::Rejected("paper exchange rejecting orders".to_string()));
        }

        let fill = match state.open.take() {
            Some(fill) if fill.side == side => fill,
            other => {
                state.open = other;
                return Err(ExchangeError::Rejected(format!("no {} position to close", side)));
            }
        };

        let exit_price = state.price;
        let pnl = (exit_price - fill.entry_price) * fill.quantity * fill.side.sign();
        state.balance += pnl;
        let order_ref = Self::next_ref(&mut state);

        info!(order_ref = %order_ref, price = exit_price, pnl = pnl, "Paper close");

        Ok(OrderAck {
            order_ref: Some(order_ref),
            fill_price: Some(exit_price),
        })
    }

    async fn place_trailing(
        &self,
        _symbol: &str,
        side: Side,
        quantity: Decimal,
        trail_value: f64,
    ) -> Result<(), ExchangeError> {
        debug!(side = %side, qty = %quantity, trail = trail_value, "Paper trailing stop");
        self.state.lock().await.trailing_orders.push(trail_value);
        Ok(())
    }

    async fn modify_stop_loss(&self, _symbol: &str, price: f64, side: Side) -> Result<(), ExchangeError> {
        let mut state = self.state.lock().await;
        if state.reject_orders {
            return Err(ExchangeError::Rejected("paper exchange rejecting orders".to_string()));
        }
        debug!(side = %side, stop = price, "Paper stop update");
        state.stop_updates.push(price);
        Ok(())
    }
}
