use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// A current market price observation for a symbol.
#[derive(Debug, Clone, Copy)]
pub struct PriceQuote {
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Price resolution collaborator. Market-order execution asks this for the
/// execution price; the engine itself never reaches out to a data feed.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Latest known price for a symbol, or None when the symbol is unknown
    /// or the feed has nothing for it.
    async fn latest_price(&self, symbol: &str) -> Option<PriceQuote>;
}

/// Fixed in-process price table. Used by the binary for smoke runs and by
/// tests that need a deterministic feed.
#[derive(Debug, Default)]
pub struct StaticPriceSource {
    prices: HashMap<String, f64>,
}

impl StaticPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, symbol: &str, price: f64) -> Self {
        self.prices.insert(symbol.to_string(), price);
        self
    }

    pub fn set(&mut self, symbol: &str, price: f64) {
        self.prices.insert(symbol.to_string(), price);
    }
}

#[async_trait]
impl PriceSource for StaticPriceSource {
    async fn latest_price(&self, symbol: &str) -> Option<PriceQuote> {
        self.prices.get(symbol).map(|&price| PriceQuote {
            price,
            timestamp: Utc::now(),
        })
    }
}
