//! Trade log persistence.
//!
//! The engine only needs two things from storage: append a realized P&L and reload the
//! most recent ones at startup. Stores may additionally journal full closed trades.

mod json;
mod sqlite;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::models::ClosedTrade;

pub use json::JsonTradeLog;
pub use sqlite::SqliteTradeLog;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("trade log I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("trade log is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Persistence contract for recent trade results.
#[async_trait]
pub trait TradeLogStore: Send + Sync {
    /// Append one realized P&L. The store keeps only its newest entries.
    async fn append_pnl(&self, pnl: f64) -> Result<(), StoreError>;

    /// Up to `max_count` most recent P&Ls, oldest first. Absent store -> empty.
    async fn load_recent(&self, max_count: usize) -> Result<Vec<f64>, StoreError>;

    /// Journal a closed trade. Stores without a journal ignore it.
    async fn record_trade(&self, _trade: &ClosedTrade) -> Result<(), StoreError> {
        Ok(())
    }
}

fn tail(values: &[f64], max_count: usize) -> Vec<f64> {
    values[values.len().saturating_sub(max_count)..].to_vec()
}

/// Non-persistent store for ephemeral runs.
pub struct InMemoryTradeLog {
    capacity: usize,
    pnls: Mutex<Vec<f64>>,
    trades: Mutex<Vec<ClosedTrade>>,
}

impl InMemoryTradeLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            pnls: Mutex::new(Vec::new()),
            trades: Mutex::new(Vec::new()),
        }
    }

    pub fn with_history(capacity: usize, history: &[f64]) -> Self {
        Self {
            capacity,
            pnls: Mutex::new(tail(history, capacity)),
            trades: Mutex::new(Vec::new()),
        }
    }

    /// Trades journaled so far.
    pub async fn trades(&self) -> Vec<ClosedTrade> {
        self.trades.lock().await.clone()
    }
}

#[async_trait]
impl TradeLogStore for InMemoryTradeLog {
    async fn append_pnl(&self, pnl: f64) -> Result<(), StoreError> {
        let mut pnls = self.pnls.lock().await;
        pnls.push(pnl);
        *pnls = tail(&pnls, self.capacity);
        Ok(())
    }

    async fn load_recent(&self, max_count: usize) -> Result<Vec<f64>, StoreError> {
        Ok(tail(&self.pnls.lock().await, max_count))
    }

    async fn record_trade(&self, trade: &ClosedTrade) -> Result<(), StoreError> {
        self.trades.lock().await.push(trade.clone());
        Ok(())
    }
}
