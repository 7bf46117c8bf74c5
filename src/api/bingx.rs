//! BingX perpetual swap client.
//!
//! Prices come from the public quote endpoint. Account and order calls do not reach the
//! venue: they log the payload that would be sent and return a synthetic acknowledgment.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::models::Side;

use super::exchange::{Balance, ExchangeClient, ExchangeError, OrderAck, OrderRequest};

const BINGX_API_BASE: &str = "https://open-api.bingx.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const SYNTHETIC_BALANCE: f64 = 1000.0;

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    price: Option<String>,
}

/// Parse a `/openApi/swap/v2/quote/price` response body.
pub fn parse_price_response(body: &str) -> Result<f64, ExchangeError> {
    let response: QuoteResponse = serde_json::from_str(body)?;
    if response.code != 0 {
        return Err(ExchangeError::Unavailable(format!(
            "quote (code {}: {})",
            response.code, response.msg
        )));
    }

    response
        .data
        .and_then(|d| d.price)
        .ok_or(ExchangeError::MissingField("price"))?
        .parse::<f64>()
        .map_err(|_| ExchangeError::MissingField("price"))
}

/// BingX client with live quotes and simulated execution.
pub struct BingxClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    synthetic_balance: f64,
}

impl BingxClient {
    pub fn new(api_key: Option<String>) -> Result<Self, ExchangeError> {
        Self::with_base_url(BINGX_API_BASE.to_string(), api_key)
    }

    /// Create with custom base URL (for testing).
    pub fn with_base_url(base_url: String, api_key: Option<String>) -> Result<Self, ExchangeError> {
        let http = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;

        if api_key.is_none() {
            warn!("BINGX_API_KEY not set; orders are simulated");
        }

        Ok(Self {
            http,
            base_url,
            api_key,
            synthetic_balance: SYNTHETIC_BALANCE,
        })
    }

    #[cfg(test)]
    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    fn ack(&self, action: &str, payload: serde_json::Value) -> OrderAck {
        let order_ref = uuid::Uuid::new_v4().to_string();
        info!(action = action, order_ref = %order_ref, payload = %payload, "BingX request (simulated)");
        OrderAck {
            order_ref: Some(order_ref),
            fill_price: None,
        }
    }
}

#[async_trait]
impl ExchangeClient for BingxClient {
    async fn get_price(&self, symbol: &str) -> Result<f64, ExchangeError> {
        let url = format!("{}/openApi/swap/v2/quote/price?symbol={}", self.base_url, symbol);
        debug!(url = %url, "Fetching price");

        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ExchangeError::Unavailable(format!("quote (HTTP {})", response.status())));
        }

        let body = response.text().await?;
        parse_price_response(&body)
    }

    async fn get_balance(&self) -> Result<Balance, ExchangeError> {
        Ok(Balance {
            balance: self.synthetic_balance,
            equity: self.synthetic_balance,
        })
    }

    async fn open_market_order(&self, order: &OrderRequest) -> Result<OrderAck, ExchangeError> {
        let payload = json!({
            "symbol": order.symbol,
            "side": order.side.order_side(),
            "positionSide": order.side.position_side(),
            "type": "MARKET",
            "quantity": order.quantity.to_string(),
            "takeProfit": order.take_profit,
            "stopLoss": order.stop_loss,
            "trailingStop": order.trailing_stop,
        });
        Ok(self.ack("open", payload))
    }

    async fn close_market_order(&self, symbol: &str, side: Side) -> Result<OrderAck, ExchangeError> {
        let payload = json!({
            "symbol": symbol,
            "side": side.closing_side(),
            "positionSide": side.position_side(),
            "type": "MARKET",
            "closePosition": true,
        });
        Ok(self.ack("close", payload))
    }

    async fn place_trailing(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        trail_value: f64,
    ) -> Result<(), ExchangeError> {
        let payload = json!({
            "symbol": symbol,
            "side": side.closing_side(),
            "positionSide": side.position_side(),
            "type": "TRAILING_STOP_MARKET",
            "quantity": quantity.to_string(),
            "priceRate": trail_value,
        });
        self.ack("trailing", payload);
        Ok(())
    }

    async fn modify_stop_loss(&self, symbol: &str, price: f64, side: Side) -> Result<(), ExchangeError> {
        let payload = json!({
            "symbol": symbol,
            "side": side.closing_side(),
            "positionSide": side.position_side(),
            "type": "STOP_MARKET",
            "stopPrice": price,
        });
        self.ack("modify_stop", payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_price_response() {
        let body = r#"{"code":0,"msg":"","data":{"symbol":"BTC-USDT","price":"64250.5","time":1700000000000}}"#;
        assert_eq!(parse_price_response(body).unwrap(), 64250.5);
    }

    #[test]
    fn test_parse_price_error_code() {
        let body = r#"{"code":100400,"msg":"symbol not exist","data":null}"#;
        assert!(matches!(parse_price_response(body), Err(ExchangeError::Unavailable(_))));
    }

    #[test]
    fn test_parse_price_missing_field() {
        let body = r#"{"code":0,"msg":"","data":{"symbol":"BTC-USDT"}}"#;
        assert!(matches!(parse_price_response(body), Err(ExchangeError::MissingField("price"))));
        assert!(matches!(parse_price_response("not json"), Err(ExchangeError::Decode(_))));
    }

    #[tokio::test]
    async fn test_simulated_calls_acknowledge() {
        let client = BingxClient::new(None).unwrap();
        assert!(!client.has_credentials());

        let balance = client.get_balance().await.unwrap();
        assert_eq!(balance.equity, 1000.0);

        let order = OrderRequest {
            symbol: "BTC-USDT".to_string(),
            side: Side::Long,
            quantity: dec!(1.08),
            take_profit: Some(101.0),
            stop_loss: Some(99.0),
            trailing_stop: None,
        };
        let ack = client.open_market_order(&order).await.unwrap();
        assert!(ack.order_ref.is_some());
        assert!(client.close_market_order("BTC-USDT", Side::Long).await.is_ok());
        assert!(client.modify_stop_loss("BTC-USDT", 99.5, Side::Long).await.is_ok());
    }
}
