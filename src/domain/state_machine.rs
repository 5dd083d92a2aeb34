//! Trade State Machine
//!
//! Holds the live position state for the pair and decides entry, hold, or
//! exit from a spread evaluation. Transitions are restricted to
//! Flat -> {LongSpread, ShortSpread} -> Flat; reversing direction always
//! passes through Flat on a later cycle.
//!
//! Deciding and transitioning are split on purpose: `decide` is a pure read,
//! and the `apply_*` methods run only after the execution gateway has
//! accepted the corresponding orders. Exits always close the full recorded
//! allocation; they never consult the sizer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::position::{PairPosition, PositionError, SpreadDirection};
use crate::domain::spread::SpreadEvaluation;
use crate::ports::execution::FillEvent;

/// Position state for the pair. Exactly one is live per pair process-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionState {
    Flat,
    LongSpread,
    ShortSpread,
}

impl std::fmt::Display for PositionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionState::Flat => write!(f, "flat"),
            PositionState::LongSpread => write!(f, "long_spread"),
            PositionState::ShortSpread => write!(f, "short_spread"),
        }
    }
}

/// What the current cycle should do, given the state and the evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeDecision {
    /// Long leg A, short leg B at freshly sized quantities
    EnterLongSpread,
    /// Short leg A, long leg B at freshly sized quantities
    EnterShortSpread,
    /// Close both legs of the existing allocation in full
    ExitPosition,
    /// No order activity this cycle
    Hold,
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("cannot enter {attempted} from {current} state")]
    EntryFromNonFlat {
        current: PositionState,
        attempted: SpreadDirection,
    },
    #[error("cannot exit while flat")]
    ExitWhileFlat,
    #[error("no open position to reconcile a fill against")]
    FillWhileFlat,
    #[error(transparent)]
    Position(#[from] PositionError),
}

/// Entry/exit thresholds in z-score units.
///
/// `entry > exit >= 0` is a configuration invariant enforced at startup;
/// the constructor here is the single place it is checked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    entry: f64,
    exit: f64,
}

#[derive(Debug, Error)]
#[error("entry threshold {entry} must exceed exit threshold {exit} (and exit must be >= 0)")]
pub struct ThresholdError {
    pub entry: f64,
    pub exit: f64,
}

impl Thresholds {
    pub fn new(entry: f64, exit: f64) -> Result<Self, ThresholdError> {
        if !(entry > exit && exit >= 0.0) {
            return Err(ThresholdError { entry, exit });
        }
        Ok(Self { entry, exit })
    }

    pub fn entry(&self) -> f64 {
        self.entry
    }

    pub fn exit(&self) -> f64 {
        self.exit
    }
}

/// The entry/exit state machine for one pair.
#[derive(Debug, Clone)]
pub struct TradeStateMachine {
    thresholds: Thresholds,
    state: PositionState,
    position: Option<PairPosition>,
}

impl TradeStateMachine {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            state: PositionState::Flat,
            position: None,
        }
    }

    pub fn state(&self) -> PositionState {
        self.state
    }

    pub fn position(&self) -> Option<&PairPosition> {
        self.position.as_ref()
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Decide this cycle's action. Pure read; mutates nothing.
    ///
    /// An evaluation that produced no z-score (insufficient or degenerate
    /// history) always holds, whatever the state.
    pub fn decide(&self, evaluation: &SpreadEvaluation) -> TradeDecision {
        let z = match evaluation {
            SpreadEvaluation::Ok(z) => z.value,
            SpreadEvaluation::InsufficientData { .. } | SpreadEvaluation::Degenerate { .. } => {
                return TradeDecision::Hold;
            }
        };

        match self.state {
            PositionState::Flat => {
                if z > self.thresholds.entry {
                    TradeDecision::EnterShortSpread
                } else if z < -self.thresholds.entry {
                    TradeDecision::EnterLongSpread
                } else {
                    TradeDecision::Hold
                }
            }
            // Long spread: entered below the mean, unwound once the spread
            // has reverted up past -exit.
            PositionState::LongSpread => {
                if z > -self.thresholds.exit {
                    TradeDecision::ExitPosition
                } else {
                    TradeDecision::Hold
                }
            }
            // Short spread mirrors long.
            PositionState::ShortSpread => {
                if z < self.thresholds.exit {
                    TradeDecision::ExitPosition
                } else {
                    TradeDecision::Hold
                }
            }
        }
    }

    /// Record an accepted entry. Valid only from Flat.
    pub fn apply_entry(&mut self, position: PairPosition) -> Result<(), StateError> {
        if self.state != PositionState::Flat {
            return Err(StateError::EntryFromNonFlat {
                current: self.state,
                attempted: position.direction,
            });
        }
        self.state = match position.direction {
            SpreadDirection::LongSpread => PositionState::LongSpread,
            SpreadDirection::ShortSpread => PositionState::ShortSpread,
        };
        self.position = Some(position);
        Ok(())
    }

    /// Record an accepted close: reset to Flat and hand back the allocation
    /// that was closed, for ledger emission.
    pub fn apply_exit(&mut self) -> Result<PairPosition, StateError> {
        if self.state == PositionState::Flat {
            return Err(StateError::ExitWhileFlat);
        }
        self.state = PositionState::Flat;
        self.position.take().ok_or(StateError::ExitWhileFlat)
    }

    /// Reconcile a fill confirmation against the open allocation.
    ///
    /// Never transitions the state machine: a partially filled position is
    /// still logically in position at the requested size.
    pub fn record_fill(&mut self, fill: &FillEvent) -> Result<(), StateError> {
        match self.position.as_mut() {
            Some(position) => {
                position.record_fill(fill)?;
                Ok(())
            }
            None => Err(StateError::FillWhileFlat),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::LegAllocation;
    use crate::domain::spread::ZScore;
    use crate::ports::execution::OrderSide;
    use chrono::{TimeZone, Utc};

    fn thresholds() -> Thresholds {
        Thresholds::new(1.4, 0.2).unwrap()
    }

    fn eval(z: f64) -> SpreadEvaluation {
        SpreadEvaluation::Ok(ZScore {
            value: z,
            mean: 10.0,
            std_dev: 2.0,
            current_spread: 10.0 + 2.0 * z,
        })
    }

    fn short_position() -> PairPosition {
        let t = Utc.with_ymd_and_hms(2026, 3, 2, 19, 59, 0).unwrap();
        PairPosition::new(
            SpreadDirection::ShortSpread,
            LegAllocation::new("UMAC", -1000, 20.0, t).unwrap(),
            LegAllocation::new("RCAT", 1389, 15.0, t).unwrap(),
        )
    }

    fn long_position() -> PairPosition {
        let t = Utc.with_ymd_and_hms(2026, 3, 2, 19, 59, 0).unwrap();
        PairPosition::new(
            SpreadDirection::LongSpread,
            LegAllocation::new("UMAC", 1000, 20.0, t).unwrap(),
            LegAllocation::new("RCAT", -1389, 15.0, t).unwrap(),
        )
    }

    #[test]
    fn threshold_invariant_is_enforced() {
        assert!(Thresholds::new(1.4, 0.2).is_ok());
        assert!(Thresholds::new(1.4, 1.4).is_err());
        assert!(Thresholds::new(0.2, 1.4).is_err());
        assert!(Thresholds::new(1.4, -0.1).is_err());
        // exit of exactly zero is allowed
        assert!(Thresholds::new(1.0, 0.0).is_ok());
    }

    #[test]
    fn flat_enters_short_above_entry_threshold() {
        let machine = TradeStateMachine::new(thresholds());
        // The documented scenario: mean 10, stdev 2, current spread 13 -> z = 1.5
        assert_eq!(machine.decide(&eval(1.5)), TradeDecision::EnterShortSpread);
    }

    #[test]
    fn flat_enters_long_below_negative_entry_threshold() {
        let machine = TradeStateMachine::new(thresholds());
        assert_eq!(machine.decide(&eval(-1.5)), TradeDecision::EnterLongSpread);
    }

    #[test]
    fn flat_holds_inside_entry_band() {
        let machine = TradeStateMachine::new(thresholds());
        assert_eq!(machine.decide(&eval(1.4)), TradeDecision::Hold);
        assert_eq!(machine.decide(&eval(-1.4)), TradeDecision::Hold);
        assert_eq!(machine.decide(&eval(0.0)), TradeDecision::Hold);
    }

    #[test]
    fn flat_holds_on_unusable_evaluation() {
        let machine = TradeStateMachine::new(thresholds());
        assert_eq!(
            machine.decide(&SpreadEvaluation::InsufficientData { have: 5, need: 20 }),
            TradeDecision::Hold
        );
        assert_eq!(
            machine.decide(&SpreadEvaluation::Degenerate { mean: 10.0 }),
            TradeDecision::Hold
        );
    }

    #[test]
    fn short_spread_exits_when_spread_reverts() {
        let mut machine = TradeStateMachine::new(thresholds());
        machine.apply_entry(short_position()).unwrap();
        // z = 0.1 < exit threshold 0.2 -> close both legs
        assert_eq!(machine.decide(&eval(0.1)), TradeDecision::ExitPosition);
    }

    #[test]
    fn short_spread_holds_at_or_above_exit_threshold() {
        let mut machine = TradeStateMachine::new(thresholds());
        machine.apply_entry(short_position()).unwrap();
        assert_eq!(machine.decide(&eval(0.2)), TradeDecision::Hold);
        assert_eq!(machine.decide(&eval(1.8)), TradeDecision::Hold);
    }

    #[test]
    fn long_spread_exit_band_mirrors_short() {
        let mut machine = TradeStateMachine::new(thresholds());
        machine.apply_entry(long_position()).unwrap();
        assert_eq!(machine.decide(&eval(-0.1)), TradeDecision::ExitPosition);
        assert_eq!(machine.decide(&eval(-0.2)), TradeDecision::Hold);
        assert_eq!(machine.decide(&eval(-1.8)), TradeDecision::Hold);
    }

    #[test]
    fn in_position_unusable_evaluation_holds() {
        let mut machine = TradeStateMachine::new(thresholds());
        machine.apply_entry(short_position()).unwrap();
        assert_eq!(
            machine.decide(&SpreadEvaluation::Degenerate { mean: 10.0 }),
            TradeDecision::Hold
        );
        assert_eq!(machine.state(), PositionState::ShortSpread);
    }

    #[test]
    fn entry_from_non_flat_is_rejected() {
        let mut machine = TradeStateMachine::new(thresholds());
        machine.apply_entry(short_position()).unwrap();
        let result = machine.apply_entry(long_position());
        assert!(matches!(result, Err(StateError::EntryFromNonFlat { .. })));
        assert_eq!(machine.state(), PositionState::ShortSpread);
    }

    #[test]
    fn exit_while_flat_is_rejected() {
        let mut machine = TradeStateMachine::new(thresholds());
        assert!(matches!(machine.apply_exit(), Err(StateError::ExitWhileFlat)));
    }

    #[test]
    fn exit_returns_the_closed_allocation() {
        let mut machine = TradeStateMachine::new(thresholds());
        machine.apply_entry(short_position()).unwrap();

        let closed = machine.apply_exit().unwrap();
        assert_eq!(closed.direction, SpreadDirection::ShortSpread);
        assert_eq!(machine.state(), PositionState::Flat);
        assert!(machine.position().is_none());
    }

    #[test]
    fn direction_never_reverses_without_passing_flat() {
        // Walk an adversarial z sequence and assert no Long<->Short jump.
        let mut machine = TradeStateMachine::new(thresholds());
        let zs = [
            -2.0, -3.0, 0.5, 2.1, 1.9, -0.1, -2.5, -0.3, 1.6, 0.0, -1.7, 1.5,
        ];

        let mut previous = machine.state();
        for z in zs {
            match machine.decide(&eval(z)) {
                TradeDecision::EnterLongSpread => machine.apply_entry(long_position()).unwrap(),
                TradeDecision::EnterShortSpread => machine.apply_entry(short_position()).unwrap(),
                TradeDecision::ExitPosition => {
                    machine.apply_exit().unwrap();
                }
                TradeDecision::Hold => {}
            }
            let current = machine.state();
            let reversed = (previous == PositionState::LongSpread
                && current == PositionState::ShortSpread)
                || (previous == PositionState::ShortSpread
                    && current == PositionState::LongSpread);
            assert!(!reversed, "direct reversal from {previous} to {current}");
            previous = current;
        }
    }

    #[test]
    fn partial_fill_does_not_transition() {
        let mut machine = TradeStateMachine::new(thresholds());
        machine.apply_entry(short_position()).unwrap();

        machine
            .record_fill(&FillEvent {
                symbol: "UMAC".to_string(),
                filled_quantity: 400,
                filled_price: 20.05,
                side: OrderSide::Sell,
            })
            .unwrap();

        assert_eq!(machine.state(), PositionState::ShortSpread);
        let position = machine.position().unwrap();
        assert_eq!(position.leg_a.filled_shares, -400);
        assert_eq!(position.leg_a.requested_shares, -1000);
    }

    #[test]
    fn fill_while_flat_is_rejected() {
        let mut machine = TradeStateMachine::new(thresholds());
        let result = machine.record_fill(&FillEvent {
            symbol: "UMAC".to_string(),
            filled_quantity: 100,
            filled_price: 20.0,
            side: OrderSide::Buy,
        });
        assert!(matches!(result, Err(StateError::FillWhileFlat)));
    }
}
