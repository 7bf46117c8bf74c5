//! Exchange client contract consumed by the engine.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::models::Side;

/// Failures surfaced by an exchange client.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("{0} unavailable")]
    Unavailable(String),

    #[error("order rejected: {0}")]
    Rejected(String),

    #[error("response missing field `{0}`")]
    MissingField(&'static str),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Account balance snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Balance {
    pub balance: f64,
    pub equity: f64,
}

/// Market order with optional absolute protective levels.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trailing_stop: Option<f64>,
}

/// Successful order acknowledgment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderAck {
    pub order_ref: Option<String>,
    /// Average fill price, when the venue reports one
    pub fill_price: Option<f64>,
}

#[async_trait]
pub trait ExchangeClient: Send + Sync {
    async fn get_price(&self, symbol: &str) -> Result<f64, ExchangeError>;

    async fn get_balance(&self) -> Result<Balance, ExchangeError>;

    /// Submit a market entry. A rejection is `Err(ExchangeError::Rejected)`.
    async fn open_market_order(&self, order: &OrderRequest) -> Result<OrderAck, ExchangeError>;

    /// Flatten the position held on `side`.
    async fn close_market_order(&self, symbol: &str, side: Side) -> Result<OrderAck, ExchangeError>;

    /// Register an exchange-managed trailing stop.
    async fn place_trailing(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        trail_value: f64,
    ) -> Result<(), ExchangeError>;

    /// Move the protective stop of the position held on `side`.
    async fn modify_stop_loss(&self, symbol: &str, price: f64, side: Side) -> Result<(), ExchangeError>;
}
