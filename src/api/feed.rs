//! Candle feeds: Binance public klines and a static in-memory window.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::models::Candle;

use super::exchange::ExchangeError;

const BINANCE_API_BASE: &str = "https://api.binance.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of recent OHLCV bars, oldest first. Failures yield an empty window.
#[async_trait]
pub trait CandleFeed: Send + Sync {
    async fn fetch_recent_candles(&self, symbol: &str, timeframe: &str, limit: usize) -> Vec<Candle>;
}

/// `BTC-USDT` -> `BTCUSDT`.
pub fn binance_symbol(symbol: &str) -> String {
    symbol.replace(['-', '/'], "").to_uppercase()
}

fn field(row: &[Value], idx: usize) -> Result<f64, ExchangeError> {
    let value = row.get(idx).ok_or(ExchangeError::MissingField("kline column"))?;
    match value {
        Value::String(s) => s.parse().map_err(|_| ExchangeError::MissingField("kline column")),
        Value::Number(n) => n.as_f64().ok_or(ExchangeError::MissingField("kline column")),
        _ => Err(ExchangeError::MissingField("kline column")),
    }
}

/// Parse a Binance `/api/v3/klines` body: arrays of `[openTime, open, high, low, close, volume, ...]`.
pub fn parse_klines(body: &str) -> Result<Vec<Candle>, ExchangeError> {
    let rows: Vec<Vec<Value>> = serde_json::from_str(body)?;
    rows.iter()
        .map(|row| {
            let timestamp = row
                .first()
                .and_then(Value::as_i64)
                .ok_or(ExchangeError::MissingField("open time"))?;
            Ok(Candle {
                timestamp,
                open: field(row, 1)?,
                high: field(row, 2)?,
                low: field(row, 3)?,
                close: field(row, 4)?,
                volume: field(row, 5)?,
            })
        })
        .collect()
}

/// Binance spot klines feed.
pub struct BinanceFeed {
    http: Client,
    base_url: String,
}

impl BinanceFeed {
    pub fn new() -> Result<Self, ExchangeError> {
        Self::with_base_url(BINANCE_API_BASE.to_string())
    }

    /// Create with custom base URL (for testing).
    pub fn with_base_url(base_url: String) -> Result<Self, ExchangeError> {
        let http = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self { http, base_url })
    }

    async fn fetch(&self, symbol: &str, timeframe: &str, limit: usize) -> Result<Vec<Candle>, ExchangeError> {
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url,
            binance_symbol(symbol),
            timeframe,
            limit
        );
        debug!(url = %url, "Fetching candles");

        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ExchangeError::Unavailable(format!("klines (HTTP {})", response.status())));
        }

        let body = response.text().await?;
        parse_klines(&body)
    }
}

#[async_trait]
impl CandleFeed for BinanceFeed {
    async fn fetch_recent_candles(&self, symbol: &str, timeframe: &str, limit: usize) -> Vec<Candle> {
        match self.fetch(symbol, timeframe, limit).await {
            Ok(candles) => {
                debug!(count = candles.len(), "Candles fetched");
                candles
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Candle fetch failed");
                Vec::new()
            }
        }
    }
}

/// Fixed candle window, replaceable between ticks.
#[derive(Default)]
pub struct StaticFeed {
    candles: Mutex<Vec<Candle>>,
    fetches: AtomicUsize,
}

impl StaticFeed {
    pub fn new(candles: Vec<Candle>) -> Self {
        Self {
            candles: Mutex::new(candles),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Number of fetches served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CandleFeed for StaticFeed {
    async fn fetch_recent_candles(&self, _symbol: &str, _timeframe: &str, limit: usize) -> Vec<Candle> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let candles = self.candles.lock().await;
        let start = candles.len().saturating_sub(limit);
        candles[start..].to_vec()
    }
}
