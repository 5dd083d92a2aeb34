//! Domain Layer - Core decision logic for the pairs engine
//!
//! Pure business logic with no I/O: spread statistics, position sizing, the
//! entry/exit state machine, position bookkeeping, and ledger records.

pub mod ledger;
pub mod position;
pub mod sizing;
pub mod spread;
pub mod state_machine;

pub use position::{LegAllocation, PairPosition, SpreadDirection};
pub use sizing::{size_legs, PairSize};
pub use spread::{resolve_current_price, SpreadEvaluation, SpreadModel, ZScore};
pub use state_machine::{PositionState, Thresholds, TradeDecision, TradeStateMachine};
