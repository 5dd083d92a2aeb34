//! Decision Cycle
//!
//! One daily evaluation of the pair: snapshot both price histories, resolve
//! live prices, standardize the spread, run the state machine, and carry out
//! whatever it decided through the account and execution collaborators.
//!
//! Collaborator failures surface as typed `CycleError`s. The coordinator is
//! the single place that decides what a failed cycle means for the day; this
//! module never catches and continues on its own.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::domain::ledger::{LedgerRecord, TradeLedger};
use crate::domain::position::{LegAllocation, PairPosition, SpreadDirection};
use crate::domain::sizing::size_legs;
use crate::domain::spread::{resolve_current_price, SpreadEvaluation, SpreadModel};
use crate::domain::state_machine::{
    PositionState, StateError, Thresholds, TradeDecision, TradeStateMachine,
};
use crate::ports::account::{AccountError, AccountPort};
use crate::ports::execution::{
    ExecutionError, ExecutionPort, FillEvent, OrderAck, OrderRequest, OrderSide,
};
use crate::ports::market_data::{MarketDataError, MarketDataPort};

/// Static per-pair parameters, fixed at configuration time.
#[derive(Debug, Clone)]
pub struct PairSettings {
    pub symbol_a: String,
    pub symbol_b: String,
    pub hedge_ratio: f64,
    pub lookback: usize,
    pub thresholds: Thresholds,
    pub max_position_size: u64,
}

/// Why a cycle produced no z-score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSkipReason {
    InsufficientData,
    Degenerate,
}

/// What a completed (non-erroring) cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Entered(SpreadDirection),
    Exited,
    Held,
    DataSkip(DataSkipReason),
}

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("market data collaborator failed: {0}")]
    MarketData(#[from] MarketDataError),
    #[error("account collaborator failed: {0}")]
    Account(#[from] AccountError),
    #[error("execution gateway failed: {0}")]
    Execution(#[from] ExecutionError),
    #[error("order rejected for {symbol}: {reason}")]
    OrderRejected { symbol: String, reason: String },
    #[error("position bookkeeping failed: {0}")]
    State(#[from] StateError),
}

/// The full per-cycle pipeline behind the daily trigger.
pub struct DecisionCycle {
    settings: PairSettings,
    model: SpreadModel,
    machine: Mutex<TradeStateMachine>,
    market: Arc<dyn MarketDataPort>,
    account: Arc<dyn AccountPort>,
    execution: Arc<dyn ExecutionPort>,
    ledger: Option<TradeLedger>,
}

impl DecisionCycle {
    pub fn new(
        settings: PairSettings,
        market: Arc<dyn MarketDataPort>,
        account: Arc<dyn AccountPort>,
        execution: Arc<dyn ExecutionPort>,
        ledger: Option<TradeLedger>,
    ) -> Self {
        let model = SpreadModel::new(settings.hedge_ratio, settings.lookback);
        let machine = Mutex::new(TradeStateMachine::new(settings.thresholds));
        Self {
            settings,
            model,
            machine,
            market,
            account,
            execution,
            ledger,
        }
    }

    pub fn settings(&self) -> &PairSettings {
        &self.settings
    }

    /// Current state machine state, for status reporting.
    pub async fn position_state(&self) -> PositionState {
        self.machine.lock().await.state()
    }

    /// Run one decision cycle for the given trading day.
    ///
    /// The caller (the coordinator) serializes invocations; this method
    /// assumes it is never re-entered concurrently.
    pub async fn run(&self, trading_day: NaiveDate) -> Result<CycleOutcome, CycleError> {
        let symbol_a = self.settings.symbol_a.as_str();
        let symbol_b = self.settings.symbol_b.as_str();

        let bars_a = self
            .market
            .daily_bars(symbol_a, self.settings.lookback)
            .await?;
        let bars_b = self
            .market
            .daily_bars(symbol_b, self.settings.lookback)
            .await?;

        let (Some(last_a), Some(last_b)) = (bars_a.last_close(), bars_b.last_close()) else {
            tracing::warn!(
                %trading_day,
                "no bars available for at least one leg, skipping cycle"
            );
            return Ok(CycleOutcome::DataSkip(DataSkipReason::InsufficientData));
        };

        // A failed tick lookup degrades to the last close rather than
        // aborting the cycle.
        let tick_a = self.last_tick_or_none(symbol_a).await;
        let tick_b = self.last_tick_or_none(symbol_b).await;
        let current_a = resolve_current_price(last_a, tick_a);
        let current_b = resolve_current_price(last_b, tick_b);

        let evaluation =
            self.model
                .evaluate(&bars_a.closes(), &bars_b.closes(), current_a, current_b);

        match &evaluation {
            SpreadEvaluation::Ok(z) => {
                tracing::info!(
                    %trading_day,
                    z_score = z.value,
                    spread = z.current_spread,
                    mean = z.mean,
                    std_dev = z.std_dev,
                    "spread evaluated"
                );
            }
            SpreadEvaluation::InsufficientData { have, need } => {
                tracing::warn!(%trading_day, have, need, "insufficient history, skipping cycle");
            }
            SpreadEvaluation::Degenerate { mean } => {
                tracing::warn!(%trading_day, mean, "flat spread history, skipping cycle");
            }
        }

        let mut machine = self.machine.lock().await;
        let decision = machine.decide(&evaluation);

        match decision {
            TradeDecision::Hold => match evaluation {
                SpreadEvaluation::InsufficientData { .. } => {
                    Ok(CycleOutcome::DataSkip(DataSkipReason::InsufficientData))
                }
                SpreadEvaluation::Degenerate { .. } => {
                    Ok(CycleOutcome::DataSkip(DataSkipReason::Degenerate))
                }
                SpreadEvaluation::Ok(_) => {
                    tracing::info!(state = %machine.state(), "holding");
                    Ok(CycleOutcome::Held)
                }
            },
            TradeDecision::EnterLongSpread => {
                self.enter(&mut machine, SpreadDirection::LongSpread, current_a, current_b)
                    .await
            }
            TradeDecision::EnterShortSpread => {
                self.enter(&mut machine, SpreadDirection::ShortSpread, current_a, current_b)
                    .await
            }
            TradeDecision::ExitPosition => self.exit(&mut machine, current_a, current_b).await,
        }
    }

    async fn last_tick_or_none(&self, symbol: &str) -> Option<f64> {
        match self.market.last_tick(symbol).await {
            Ok(tick) => tick,
            Err(e) => {
                tracing::debug!(symbol, error = %e, "tick unavailable, falling back to last close");
                None
            }
        }
    }

    async fn enter(
        &self,
        machine: &mut TradeStateMachine,
        direction: SpreadDirection,
        current_a: f64,
        current_b: f64,
    ) -> Result<CycleOutcome, CycleError> {
        let buying_power = self.account.buying_power().await?;
        let Some(size) = size_legs(
            buying_power,
            current_a,
            self.settings.hedge_ratio,
            self.settings.max_position_size,
        ) else {
            tracing::warn!(
                buying_power,
                price_a = current_a,
                "sizing rejected the entry, holding flat"
            );
            return Ok(CycleOutcome::Held);
        };

        let side_a = direction.leg_a_side();
        let side_b = direction.leg_b_side();

        self.submit_accepted(OrderRequest::open(
            self.settings.symbol_a.clone(),
            side_a,
            size.shares_a,
        ))
        .await?;
        // Leg A is live from here; a leg-B rejection leaves one-sided
        // exposure that the operator must resolve manually.
        if let Err(e) = self
            .submit_accepted(OrderRequest::open(
                self.settings.symbol_b.clone(),
                side_b,
                size.shares_b,
            ))
            .await
        {
            tracing::error!(
                symbol = %self.settings.symbol_b,
                error = %e,
                "second leg failed after first leg was accepted; position may be one-legged"
            );
            return Err(e);
        }

        let now = Utc::now();
        let signed_a = signed_quantity(size.shares_a, side_a);
        let signed_b = signed_quantity(size.shares_b, side_b);
        let leg_a = LegAllocation::new(self.settings.symbol_a.clone(), signed_a, current_a, now)
            .map_err(StateError::from)?;
        let leg_b = LegAllocation::new(self.settings.symbol_b.clone(), signed_b, current_b, now)
            .map_err(StateError::from)?;
        machine.apply_entry(PairPosition::new(direction, leg_a, leg_b))?;

        self.reconcile_fills(machine).await;

        tracing::info!(
            %direction,
            shares_a = size.shares_a,
            shares_b = size.shares_b,
            notional = size.notional(current_a, current_b),
            "entered spread position"
        );
        Ok(CycleOutcome::Entered(direction))
    }

    async fn exit(
        &self,
        machine: &mut TradeStateMachine,
        current_a: f64,
        current_b: f64,
    ) -> Result<CycleOutcome, CycleError> {
        let Some(position) = machine.position().cloned() else {
            return Err(CycleError::State(StateError::ExitWhileFlat));
        };

        // Close the full recorded allocation; exits never re-size.
        self.submit_accepted(OrderRequest::close(
            position.leg_a.symbol.clone(),
            closing_side(position.leg_a.requested_shares),
        ))
        .await?;
        self.submit_accepted(OrderRequest::close(
            position.leg_b.symbol.clone(),
            closing_side(position.leg_b.requested_shares),
        ))
        .await?;

        let closed = machine.apply_exit()?;
        let fills = self.execution.drain_fills().await;
        let exit_time = Utc::now();

        let exit_a = exit_price_for(&fills, &closed.leg_a.symbol).unwrap_or(current_a);
        let exit_b = exit_price_for(&fills, &closed.leg_b.symbol).unwrap_or(current_b);

        let records = [
            round_trip_record(&closed.leg_a, exit_a, exit_time),
            round_trip_record(&closed.leg_b, exit_b, exit_time),
        ];
        if let Some(ledger) = &self.ledger {
            if let Err(e) = ledger.append_round_trip(&records) {
                tracing::warn!(error = %e, "failed to append trade ledger records");
            }
        }

        tracing::info!(
            direction = %closed.direction,
            pl_a = records[0].entry_pl,
            pl_b = records[1].entry_pl,
            "closed spread position"
        );
        Ok(CycleOutcome::Exited)
    }

    async fn submit_accepted(&self, order: OrderRequest) -> Result<(), CycleError> {
        let symbol = order.symbol.clone();
        match self.execution.submit(order).await? {
            OrderAck::Accepted => Ok(()),
            OrderAck::Rejected { reason } => Err(CycleError::OrderRejected { symbol, reason }),
        }
    }

    async fn reconcile_fills(&self, machine: &mut TradeStateMachine) {
        for fill in self.execution.drain_fills().await {
            if let Err(e) = machine.record_fill(&fill) {
                tracing::warn!(symbol = %fill.symbol, error = %e, "dropped unmatched fill");
            }
        }
    }
}

fn signed_quantity(shares: u64, side: OrderSide) -> i64 {
    match side {
        OrderSide::Buy => shares as i64,
        OrderSide::Sell => -(shares as i64),
    }
}

/// Side that unwinds a signed allocation.
fn closing_side(signed_shares: i64) -> OrderSide {
    if signed_shares > 0 {
        OrderSide::Sell
    } else {
        OrderSide::Buy
    }
}

fn exit_price_for(fills: &[FillEvent], symbol: &str) -> Option<f64> {
    fills
        .iter()
        .find(|fill| fill.symbol == symbol)
        .map(|fill| fill.filled_price)
}

fn round_trip_record(
    leg: &LegAllocation,
    exit_price: f64,
    exit_time: chrono::DateTime<Utc>,
) -> LedgerRecord {
    LedgerRecord {
        symbol: leg.symbol.clone(),
        entry_time: leg.entry_time,
        exit_time,
        entry_shares: leg.requested_shares,
        entry_price: leg.entry_price,
        // The position is logically at the requested size even when fills
        // lag, so P&L is marked on the requested quantity.
        entry_pl: leg.requested_shares as f64 * (exit_price - leg.entry_price),
        exit_fees: 0.0,
    }
}
