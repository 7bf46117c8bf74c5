//! Bounded FIFO history of recent realized P&Ls.

use std::collections::VecDeque;

use tracing::{debug, info};

/// Default number of trades remembered.
pub const DEFAULT_CAPACITY: usize = 10;

/// Most recent trade results, oldest first. Never holds more than `capacity` entries.
#[derive(Debug, Clone)]
pub struct TradeMemory {
    capacity: usize,
    recent: VecDeque<f64>,
}

impl Default for TradeMemory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl TradeMemory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            recent: VecDeque::with_capacity(capacity),
        }
    }

    /// Rebuild from persisted history, keeping only the newest `capacity` values.
    pub fn from_history(capacity: usize, history: &[f64]) -> Self {
        let mut memory = Self::new(capacity);
        let start = history.len().saturating_sub(memory.capacity);
        for &pnl in &history[start..] {
            memory.recent.push_back(pnl);
        }
        info!(count = memory.len(), capacity = memory.capacity, "Trade memory loaded");
        memory
    }

    /// Append a result, evicting the oldest one when full.
    pub fn push(&mut self, pnl: f64) {
        if self.recent.len() == self.capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(pnl);
        debug!(pnl = pnl, count = self.recent.len(), "Trade added to memory");
    }

    /// Mean of the remembered results, `None` when empty.
    pub fn average(&self) -> Option<f64> {
        if self.recent.is_empty() {
            return None;
        }
        Some(self.recent.iter().sum::<f64>() / self.recent.len() as f64)
    }

    /// Remembered results, oldest first.
    pub fn values(&self) -> Vec<f64> {
        self.recent.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }
}
