//! Engine Layer - Daily trigger coordination and the decision cycle
//!
//! The coordinator owns the once-per-day guarantee; the cycle owns one
//! evaluation of the pair. Everything else is domain logic or a port.

pub mod coordinator;
pub mod cycle;

pub use coordinator::{DailyTriggerCoordinator, FailureRetry, FireOutcome, SkipReason};
pub use cycle::{CycleError, CycleOutcome, DataSkipReason, DecisionCycle, PairSettings};
