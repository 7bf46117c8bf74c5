//! SQLite trade log: pruned P&L history plus a closed-trade journal.

use async_trait::async_trait;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::{debug, info};

use crate::models::ClosedTrade;

use super::{StoreError, TradeLogStore};

/// Journal row for one closed trade.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JournalEntry {
    pub id: i64,
    pub side: String,
    pub quantity: String,
    pub entry_price: f64,
    pub exit_price: f64,
    pub pnl: f64,
    pub reason: String,
    pub entry_time: String,
    pub exit_time: String,
}

/// SQLite-backed store.
pub struct SqliteTradeLog {
    pool: SqlitePool,
    capacity: usize,
}

impl SqliteTradeLog {
    /// Connect and run migrations.
    pub async fn new(database_url: &str, capacity: usize) -> Result<Self, StoreError> {
        // One connection: `sqlite::memory:` gives every connection its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await?;

        let store = Self { pool, capacity };
        store.run_migrations().await?;
        info!(url = %database_url, "Trade journal ready");

        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pnl_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pnl REAL NOT NULL,
                recorded_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trade_journal (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                side TEXT NOT NULL,
                quantity TEXT NOT NULL,
                entry_price REAL NOT NULL,
                exit_price REAL NOT NULL,
                pnl REAL NOT NULL,
                reason TEXT NOT NULL,
                entry_time TEXT NOT NULL,
                exit_time TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Most recent journal entries, newest first.
    pub async fn journal(&self, limit: i64) -> Result<Vec<JournalEntry>, StoreError> {
        let rows = sqlx::query_as::<_, JournalEntry>(
            "SELECT * FROM trade_journal ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl TradeLogStore for SqliteTradeLog {
    async fn append_pnl(&self, pnl: f64) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO pnl_log (pnl) VALUES (?)")
            .bind(pnl)
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "DELETE FROM pnl_log WHERE id NOT IN (SELECT id FROM pnl_log ORDER BY id DESC LIMIT ?)",
        )
        .bind(self.capacity as i64)
        .execute(&self.pool)
        .await?;

        debug!(pnl = pnl, "P&L logged");
        Ok(())
    }

    async fn load_recent(&self, max_count: usize) -> Result<Vec<f64>, StoreError> {
        let rows: Vec<(f64,)> = sqlx::query_as(
            "SELECT pnl FROM (SELECT id, pnl FROM pnl_log ORDER BY id DESC LIMIT ?) ORDER BY id ASC",
        )
        .bind(max_count as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(pnl,)| pnl).collect())
    }

    async fn record_trade(&self, trade: &ClosedTrade) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO trade_journal
                (side, quantity, entry_price, exit_price, pnl, reason, entry_time, exit_time)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(trade.side.position_side())
        .bind(trade.quantity.to_string())
        .bind(trade.entry_price)
        .bind(trade.exit_price)
        .bind(trade.pnl)
        .bind(trade.reason.label())
        .bind(trade.entry_time.to_rfc3339())
        .bind(trade.exit_time.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
