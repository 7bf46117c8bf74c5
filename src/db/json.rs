//! Flat JSON file of recent P&Ls (`recent_trades.json`).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{tail, StoreError, TradeLogStore};

/// Older logs stored `{"pnl": x}` objects instead of bare numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredPnl {
    Value(f64),
    Record { pnl: f64 },
}

impl StoredPnl {
    fn value(&self) -> f64 {
        match self {
            StoredPnl::Value(v) | StoredPnl::Record { pnl: v } => *v,
        }
    }
}

/// JSON array store, rewritten in full on every append.
pub struct JsonTradeLog {
    path: PathBuf,
    capacity: usize,
}

impl JsonTradeLog {
    pub fn new(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            capacity,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Vec<f64>, StoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        let entries: Vec<StoredPnl> = serde_json::from_str(&raw)?;
        Ok(entries.iter().map(StoredPnl::value).collect())
    }
}

#[async_trait]
impl TradeLogStore for JsonTradeLog {
    async fn append_pnl(&self, pnl: f64) -> Result<(), StoreError> {
        let mut values = match self.read_all().await {
            Ok(values) => values,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Unreadable trade log, starting over");
                Vec::new()
            }
        };

        values.push(pnl);
        let kept = tail(&values, self.capacity);
        tokio::fs::write(&self.path, serde_json::to_string_pretty(&kept)?).await?;

        debug!(path = %self.path.display(), count = kept.len(), "Trade log saved");
        Ok(())
    }

    async fn load_recent(&self, max_count: usize) -> Result<Vec<f64>, StoreError> {
        Ok(tail(&self.read_all().await?, max_count))
    }
}
