//! Replay Adapters
//!
//! Collaborator implementations backed by a JSONL dump of daily closes:
//! a market data feed that serves trailing bars up to a movable cursor, a
//! simulated account with fixed buying power, and a paper execution gateway
//! that fills orders at the current close with random adverse slippage.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use rand::Rng;
use serde::Deserialize;
use thiserror::Error;

use crate::ports::account::{AccountError, AccountPort};
use crate::ports::execution::{
    ExecutionError, ExecutionPort, FillEvent, OrderAck, OrderIntent, OrderRequest, OrderSide,
};
use crate::ports::market_data::{Bar, MarketDataError, MarketDataPort, PriceSeries};

/// One line of the dump file.
#[derive(Debug, Clone, Deserialize)]
struct DumpedDailyEntry {
    date: NaiveDate,
    closes: HashMap<String, f64>,
    #[serde(default)]
    ticks: HashMap<String, f64>,
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to open replay dump {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read replay dump: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse replay entry '{line}': {source}")]
    Parse {
        line: String,
        source: serde_json::Error,
    },
    #[error("replay dump is empty")]
    Empty,
}

/// Daily close feed replayed from a JSONL dump.
///
/// The cursor marks "today"; `daily_bars` serves the trailing window up to
/// and including it, so the engine sees exactly what it would have seen live.
#[derive(Debug)]
pub struct ReplayFeed {
    entries: Vec<DumpedDailyEntry>,
    cursor: AtomicUsize,
}

impl ReplayFeed {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ReplayError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);

        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: DumpedDailyEntry =
                serde_json::from_str(&line).map_err(|source| ReplayError::Parse {
                    line: line.clone(),
                    source,
                })?;
            entries.push(entry);
        }

        if entries.is_empty() {
            return Err(ReplayError::Empty);
        }
        entries.sort_by_key(|entry| entry.date);

        Ok(Self {
            entries,
            cursor: AtomicUsize::new(0),
        })
    }

    /// The trading day at the cursor.
    pub fn current_day(&self) -> NaiveDate {
        self.entries[self.cursor.load(Ordering::SeqCst).min(self.entries.len() - 1)].date
    }

    /// Advance one day; `None` once the dump is exhausted.
    pub fn advance(&self) -> Option<NaiveDate> {
        let current = self.cursor.load(Ordering::SeqCst);
        if current + 1 < self.entries.len() {
            self.cursor.store(current + 1, Ordering::SeqCst);
            Some(self.entries[current + 1].date)
        } else {
            None
        }
    }

    pub fn total_days(&self) -> usize {
        self.entries.len()
    }

    fn current_close(&self, symbol: &str) -> Option<f64> {
        let cursor = self.cursor.load(Ordering::SeqCst).min(self.entries.len() - 1);
        self.entries[cursor].closes.get(symbol).copied()
    }
}

#[async_trait]
impl MarketDataPort for ReplayFeed {
    async fn daily_bars(
        &self,
        symbol: &str,
        lookback: usize,
    ) -> Result<PriceSeries, MarketDataError> {
        let cursor = self.cursor.load(Ordering::SeqCst).min(self.entries.len() - 1);
        let bars: Vec<Bar> = self.entries[..=cursor]
            .iter()
            .filter_map(|entry| {
                entry.closes.get(symbol).map(|&close| Bar {
                    timestamp: entry.date.and_time(NaiveTime::MIN).and_utc(),
                    close,
                })
            })
            .collect();

        if bars.is_empty() {
            return Err(MarketDataError::UnknownSymbol(symbol.to_string()));
        }

        let start = bars.len().saturating_sub(lookback);
        Ok(PriceSeries {
            symbol: symbol.to_string(),
            bars: bars[start..].to_vec(),
        })
    }

    async fn last_tick(&self, symbol: &str) -> Result<Option<f64>, MarketDataError> {
        let cursor = self.cursor.load(Ordering::SeqCst).min(self.entries.len() - 1);
        Ok(self.entries[cursor].ticks.get(symbol).copied())
    }
}

/// Simulated account with configured buying power.
#[derive(Debug)]
pub struct SimAccount {
    buying_power: f64,
}

impl SimAccount {
    pub fn new(buying_power: f64) -> Self {
        Self { buying_power }
    }
}

#[async_trait]
impl AccountPort for SimAccount {
    async fn buying_power(&self) -> Result<f64, AccountError> {
        Ok(self.buying_power)
    }
}

/// Paper execution gateway.
///
/// Fills every accepted order at the current replay close plus random
/// adverse slippage, and tracks per-symbol positions so close-intent orders
/// can unwind the full recorded quantity.
pub struct PaperExecution {
    feed: Arc<ReplayFeed>,
    slippage_bps: u32,
    open_positions: Mutex<HashMap<String, i64>>,
    pending_fills: Mutex<Vec<FillEvent>>,
}

impl PaperExecution {
    pub fn new(feed: Arc<ReplayFeed>, slippage_bps: u32) -> Self {
        Self {
            feed,
            slippage_bps,
            open_positions: Mutex::new(HashMap::new()),
            pending_fills: Mutex::new(Vec::new()),
        }
    }

    fn fill_price(&self, close: f64, side: OrderSide) -> f64 {
        let bps = if self.slippage_bps == 0 {
            0.0
        } else {
            rand::thread_rng().gen_range(0..=self.slippage_bps) as f64
        };
        // slippage is always adverse: buys pay up, sells receive less
        match side {
            OrderSide::Buy => close * (1.0 + bps / 10_000.0),
            OrderSide::Sell => close * (1.0 - bps / 10_000.0),
        }
    }

    fn lock_positions(&self) -> std::sync::MutexGuard<'_, HashMap<String, i64>> {
        self.open_positions
            .lock()
            .expect("paper position lock poisoned")
    }
}

#[async_trait]
impl ExecutionPort for PaperExecution {
    async fn submit(&self, order: OrderRequest) -> Result<OrderAck, ExecutionError> {
        let Some(close) = self.feed.current_close(&order.symbol) else {
            return Err(ExecutionError::SubmitError(format!(
                "no price for {} on {}",
                order.symbol,
                self.feed.current_day()
            )));
        };

        let (quantity, side) = match order.intent {
            OrderIntent::Open => {
                let quantity = order.quantity.ok_or_else(|| {
                    ExecutionError::InvalidOrder("open order without quantity".to_string())
                })?;
                let signed = match order.side {
                    OrderSide::Buy => quantity as i64,
                    OrderSide::Sell => -(quantity as i64),
                };
                *self.lock_positions().entry(order.symbol.clone()).or_insert(0) += signed;
                (quantity, order.side)
            }
            OrderIntent::Close => {
                let Some(held) = self.lock_positions().remove(&order.symbol) else {
                    return Ok(OrderAck::Rejected {
                        reason: format!("no open position in {}", order.symbol),
                    });
                };
                if held == 0 {
                    return Ok(OrderAck::Rejected {
                        reason: format!("no open position in {}", order.symbol),
                    });
                }
                (held.unsigned_abs(), order.side)
            }
        };

        let fill = FillEvent {
            symbol: order.symbol.clone(),
            filled_quantity: quantity,
            filled_price: self.fill_price(close, side),
            side,
        };
        tracing::debug!(
            symbol = %fill.symbol,
            quantity = fill.filled_quantity,
            price = fill.filled_price,
            side = %fill.side,
            "paper fill"
        );
        self.pending_fills
            .lock()
            .expect("paper fill lock poisoned")
            .push(fill);

        Ok(OrderAck::Accepted)
    }

    async fn drain_fills(&self) -> Vec<FillEvent> {
        std::mem::take(&mut *self.pending_fills.lock().expect("paper fill lock poisoned"))
    }
}
