//! Recording mock implementations of the collaborator ports.
//!
//! Used by the engine's own tests and the integration suite. Each mock
//! records the calls it receives and serves responses configured up front;
//! failure switches let tests exercise the collaborator-failure paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};

use crate::ports::account::{AccountError, AccountPort};
use crate::ports::execution::{
    ExecutionError, ExecutionPort, FillEvent, OrderAck, OrderRequest,
};
use crate::ports::market_data::{Bar, MarketDataError, MarketDataPort, PriceSeries};

/// Mock market data port with per-symbol canned histories and ticks.
#[derive(Debug, Default)]
pub struct MockMarketData {
    series: Mutex<HashMap<String, Vec<f64>>>,
    ticks: Mutex<HashMap<String, f64>>,
    bar_calls: Mutex<Vec<String>>,
    fail_bars: AtomicBool,
    fail_ticks: AtomicBool,
    /// Artificial latency per daily_bars call, for in-progress guard tests
    bar_delay: Mutex<Option<Duration>>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the close history served for a symbol
    pub fn with_series(self, symbol: &str, closes: Vec<f64>) -> Self {
        self.series
            .lock()
            .unwrap()
            .insert(symbol.to_string(), closes);
        self
    }

    /// Builder method to set the live tick served for a symbol
    pub fn with_tick(self, symbol: &str, tick: f64) -> Self {
        self.ticks.lock().unwrap().insert(symbol.to_string(), tick);
        self
    }

    pub fn with_bar_delay(self, delay: Duration) -> Self {
        *self.bar_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn set_series(&self, symbol: &str, closes: Vec<f64>) {
        self.series
            .lock()
            .unwrap()
            .insert(symbol.to_string(), closes);
    }

    pub fn set_tick(&self, symbol: &str, tick: f64) {
        self.ticks.lock().unwrap().insert(symbol.to_string(), tick);
    }

    pub fn set_fail_bars(&self, fail: bool) {
        self.fail_bars.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_ticks(&self, fail: bool) {
        self.fail_ticks.store(fail, Ordering::SeqCst);
    }

    /// Symbols requested through daily_bars, in call order
    pub fn bar_calls(&self) -> Vec<String> {
        self.bar_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MarketDataPort for MockMarketData {
    async fn daily_bars(
        &self,
        symbol: &str,
        lookback: usize,
    ) -> Result<PriceSeries, MarketDataError> {
        self.bar_calls.lock().unwrap().push(symbol.to_string());

        let delay = *self.bar_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_bars.load(Ordering::SeqCst) {
            return Err(MarketDataError::HistoryError {
                symbol: symbol.to_string(),
                reason: "mock failure".to_string(),
            });
        }

        let closes = self
            .series
            .lock()
            .unwrap()
            .get(symbol)
            .cloned()
            .ok_or_else(|| MarketDataError::UnknownSymbol(symbol.to_string()))?;

        let start = closes.len().saturating_sub(lookback);
        let epoch = NaiveDate::from_ymd_opt(2026, 1, 2)
            .expect("valid fixture date")
            .and_time(NaiveTime::MIN)
            .and_utc();
        let bars = closes[start..]
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                timestamp: epoch + chrono::Duration::days(i as i64),
                close,
            })
            .collect();

        Ok(PriceSeries {
            symbol: symbol.to_string(),
            bars,
        })
    }

    async fn last_tick(&self, symbol: &str) -> Result<Option<f64>, MarketDataError> {
        if self.fail_ticks.load(Ordering::SeqCst) {
            return Err(MarketDataError::TickError {
                symbol: symbol.to_string(),
                reason: "mock failure".to_string(),
            });
        }
        Ok(self.ticks.lock().unwrap().get(symbol).copied())
    }
}

/// Mock account port with a fixed buying power.
#[derive(Debug)]
pub struct MockAccount {
    buying_power: Mutex<f64>,
    fail: AtomicBool,
}

impl MockAccount {
    pub fn new(buying_power: f64) -> Self {
        Self {
            buying_power: Mutex::new(buying_power),
            fail: AtomicBool::new(false),
        }
    }

    pub fn set_buying_power(&self, value: f64) {
        *self.buying_power.lock().unwrap() = value;
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl AccountPort for MockAccount {
    async fn buying_power(&self) -> Result<f64, AccountError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AccountError::QueryError("mock failure".to_string()));
        }
        Ok(*self.buying_power.lock().unwrap())
    }
}

/// Mock execution port that accepts (or rejects) orders and queues fills.
#[derive(Debug, Default)]
pub struct MockExecution {
    submissions: Mutex<Vec<OrderRequest>>,
    pending_fills: Mutex<Vec<FillEvent>>,
    reject_all: AtomicBool,
    fail_all: AtomicBool,
}

impl MockExecution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reject_all(&self, reject: bool) {
        self.reject_all.store(reject, Ordering::SeqCst);
    }

    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Queue a fill to be delivered on the next drain
    pub fn push_fill(&self, fill: FillEvent) {
        self.pending_fills.lock().unwrap().push(fill);
    }

    /// All orders submitted so far, in call order
    pub fn submissions(&self) -> Vec<OrderRequest> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExecutionPort for MockExecution {
    async fn submit(&self, order: OrderRequest) -> Result<OrderAck, ExecutionError> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(ExecutionError::Unavailable("mock failure".to_string()));
        }
        self.submissions.lock().unwrap().push(order);
        if self.reject_all.load(Ordering::SeqCst) {
            return Ok(OrderAck::Rejected {
                reason: "mock rejection".to_string(),
            });
        }
        Ok(OrderAck::Accepted)
    }

    async fn drain_fills(&self) -> Vec<FillEvent> {
        std::mem::take(&mut *self.pending_fills.lock().unwrap())
    }
}

/// Convenience bundle for tests wiring all three collaborators at once.
pub struct MockCollaborators {
    pub market: Arc<MockMarketData>,
    pub account: Arc<MockAccount>,
    pub execution: Arc<MockExecution>,
}

impl MockCollaborators {
    pub fn new(buying_power: f64) -> Self {
        Self {
            market: Arc::new(MockMarketData::new()),
            account: Arc::new(MockAccount::new(buying_power)),
            execution: Arc::new(MockExecution::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::execution::OrderSide;

    #[tokio::test]
    async fn market_mock_serves_trailing_lookback() {
        let mock = MockMarketData::new().with_series("UMAC", (1..=30).map(f64::from).collect());

        let series = mock.daily_bars("UMAC", 20).await.unwrap();
        assert_eq!(series.len(), 20);
        assert_eq!(series.last_close(), Some(30.0));
        assert_eq!(mock.bar_calls(), vec!["UMAC".to_string()]);
    }

    #[tokio::test]
    async fn market_mock_unknown_symbol_errors() {
        let mock = MockMarketData::new();
        assert!(mock.daily_bars("SPY", 20).await.is_err());
    }

    #[tokio::test]
    async fn execution_mock_records_and_drains() {
        let mock = MockExecution::new();
        let ack = mock
            .submit(OrderRequest::open("UMAC", OrderSide::Sell, 1000))
            .await
            .unwrap();
        assert!(ack.is_accepted());

        mock.push_fill(FillEvent {
            symbol: "UMAC".to_string(),
            filled_quantity: 1000,
            filled_price: 20.0,
            side: OrderSide::Sell,
        });
        assert_eq!(mock.drain_fills().await.len(), 1);
        assert!(mock.drain_fills().await.is_empty());
        assert_eq!(mock.submissions().len(), 1);
    }
}
