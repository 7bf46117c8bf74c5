//! Exchange and market-data collaborators.

mod bingx;
mod exchange;
mod feed;
mod paper;

pub use bingx::BingxClient;
pub use exchange::{Balance, ExchangeClient, ExchangeError, OrderRequest};
pub use feed::{BinanceFeed, CandleFeed, StaticFeed};
pub use paper::PaperExchange;
