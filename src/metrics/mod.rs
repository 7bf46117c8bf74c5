//! Trade performance statistics.

mod calculator;

pub use calculator::MemoryStats;
