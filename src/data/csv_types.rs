use serde::{Deserialize, Serialize};

/// One OHLCV bar. `timestamp` is the bar open in unix seconds.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct PriceBar {
    pub timestamp: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceBar {
    /// A bar whose open, high, low and close are all `price`.
    pub fn flat(timestamp: u64, price: f64) -> Self {
        Self {
            timestamp,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0.0,
        }
    }
}
