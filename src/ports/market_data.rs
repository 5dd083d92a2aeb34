use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Market data error type
#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("History fetch failed for {symbol}: {reason}")]
    HistoryError { symbol: String, reason: String },

    #[error("Tick fetch failed for {symbol}: {reason}")]
    TickError { symbol: String, reason: String },

    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),
}

/// One daily bar. Only the close participates in spread computation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
}

/// Ordered daily close history for one instrument; an immutable snapshot
/// taken once per decision cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    pub bars: Vec<Bar>,
}

impl PriceSeries {
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|bar| bar.close).collect()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|bar| bar.close)
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

/// Market data port trait
///
/// `daily_bars` returns up to `lookback` trailing daily bars; returning
/// fewer is not an error here - the spread model decides whether the
/// history is usable. `last_tick` returns `None` when no live quote is
/// available, in which case the last bar close stands in.
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    async fn daily_bars(
        &self,
        symbol: &str,
        lookback: usize,
    ) -> Result<PriceSeries, MarketDataError>;

    async fn last_tick(&self, symbol: &str) -> Result<Option<f64>, MarketDataError>;
}
