//! Pair Position
//!
//! Value types for the live two-legged position: per-leg allocations with
//! signed share counts, and fill reconciliation. A partial fill leaves the
//! position logically open at the requested size; the unfilled remainder is
//! not retried automatically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ports::execution::{FillEvent, OrderSide};

/// Direction of the spread position as a whole.
///
/// LongSpread = long leg A / short leg B; ShortSpread is the inverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpreadDirection {
    LongSpread,
    ShortSpread,
}

impl SpreadDirection {
    /// Order side for leg A when opening in this direction.
    pub fn leg_a_side(&self) -> OrderSide {
        match self {
            SpreadDirection::LongSpread => OrderSide::Buy,
            SpreadDirection::ShortSpread => OrderSide::Sell,
        }
    }

    /// Order side for leg B when opening; always opposite to leg A.
    pub fn leg_b_side(&self) -> OrderSide {
        match self {
            SpreadDirection::LongSpread => OrderSide::Sell,
            SpreadDirection::ShortSpread => OrderSide::Buy,
        }
    }
}

impl std::fmt::Display for SpreadDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpreadDirection::LongSpread => write!(f, "long_spread"),
            SpreadDirection::ShortSpread => write!(f, "short_spread"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PositionError {
    #[error("Invalid requested quantity: {0}")]
    InvalidQuantity(i64),
    #[error("Invalid entry price: {0}")]
    InvalidEntryPrice(f64),
    #[error("Fill for unrelated symbol {0}")]
    UnknownSymbol(String),
}

/// One leg's share of the pair position.
///
/// `requested_shares` is signed: positive = long, negative = short.
/// `filled_shares` tracks confirmations from the execution boundary and may
/// lag the request indefinitely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegAllocation {
    pub symbol: String,
    pub requested_shares: i64,
    pub filled_shares: i64,
    /// Volume-weighted average of confirmed fill prices; the submit-time
    /// price until the first fill arrives.
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
}

impl LegAllocation {
    pub fn new(
        symbol: impl Into<String>,
        requested_shares: i64,
        entry_price: f64,
        entry_time: DateTime<Utc>,
    ) -> Result<Self, PositionError> {
        if requested_shares == 0 {
            return Err(PositionError::InvalidQuantity(requested_shares));
        }
        if !(entry_price > 0.0) {
            return Err(PositionError::InvalidEntryPrice(entry_price));
        }
        Ok(Self {
            symbol: symbol.into(),
            requested_shares,
            filled_shares: 0,
            entry_price,
            entry_time,
        })
    }

    /// Fold a fill confirmation into this leg.
    ///
    /// The fill quantity is signed by its side before accumulation. Entry
    /// price becomes the volume-weighted average of confirmed fills.
    pub fn record_fill(&mut self, fill: &FillEvent) -> Result<(), PositionError> {
        if fill.symbol != self.symbol {
            return Err(PositionError::UnknownSymbol(fill.symbol.clone()));
        }

        let signed_qty = match fill.side {
            OrderSide::Buy => fill.filled_quantity as i64,
            OrderSide::Sell => -(fill.filled_quantity as i64),
        };

        let prior = self.filled_shares.unsigned_abs() as f64;
        let added = fill.filled_quantity as f64;
        if prior + added > 0.0 {
            self.entry_price =
                (self.entry_price * prior + fill.filled_price * added) / (prior + added);
        }
        self.filled_shares += signed_qty;
        Ok(())
    }

    /// Whether confirmations have reached the requested size.
    pub fn is_fully_filled(&self) -> bool {
        self.filled_shares == self.requested_shares
    }
}

/// The live two-legged position for the pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairPosition {
    pub direction: SpreadDirection,
    pub leg_a: LegAllocation,
    pub leg_b: LegAllocation,
    pub entered_at: DateTime<Utc>,
}

impl PairPosition {
    pub fn new(direction: SpreadDirection, leg_a: LegAllocation, leg_b: LegAllocation) -> Self {
        let entered_at = leg_a.entry_time.min(leg_b.entry_time);
        Self {
            direction,
            leg_a,
            leg_b,
            entered_at,
        }
    }

    /// Route a fill to the matching leg. Unknown symbols are an error the
    /// caller reports and drops; they never mutate either leg.
    pub fn record_fill(&mut self, fill: &FillEvent) -> Result<(), PositionError> {
        if fill.symbol == self.leg_a.symbol {
            self.leg_a.record_fill(fill)
        } else if fill.symbol == self.leg_b.symbol {
            self.leg_b.record_fill(fill)
        } else {
            Err(PositionError::UnknownSymbol(fill.symbol.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 19, 59, 0).unwrap()
    }

    fn fill(symbol: &str, qty: u64, price: f64, side: OrderSide) -> FillEvent {
        FillEvent {
            symbol: symbol.to_string(),
            filled_quantity: qty,
            filled_price: price,
            side,
        }
    }

    #[test]
    fn rejects_zero_quantity_and_bad_price() {
        assert!(matches!(
            LegAllocation::new("UMAC", 0, 20.0, now()),
            Err(PositionError::InvalidQuantity(0))
        ));
        assert!(matches!(
            LegAllocation::new("UMAC", 100, 0.0, now()),
            Err(PositionError::InvalidEntryPrice(_))
        ));
    }

    #[test]
    fn fill_accumulates_signed_quantity() {
        let mut leg = LegAllocation::new("UMAC", -1000, 20.0, now()).unwrap();
        leg.record_fill(&fill("UMAC", 400, 20.1, OrderSide::Sell))
            .unwrap();
        assert_eq!(leg.filled_shares, -400);
        assert!(!leg.is_fully_filled());

        leg.record_fill(&fill("UMAC", 600, 19.9, OrderSide::Sell))
            .unwrap();
        assert_eq!(leg.filled_shares, -1000);
        assert!(leg.is_fully_filled());
    }

    #[test]
    fn fill_price_is_volume_weighted() {
        let mut leg = LegAllocation::new("RCAT", 1000, 15.0, now()).unwrap();
        leg.record_fill(&fill("RCAT", 500, 15.2, OrderSide::Buy))
            .unwrap();
        leg.record_fill(&fill("RCAT", 500, 15.0, OrderSide::Buy))
            .unwrap();
        assert_relative_eq!(leg.entry_price, 15.1, epsilon = 1e-9);
    }

    #[test]
    fn fill_for_wrong_symbol_is_rejected() {
        let mut leg = LegAllocation::new("UMAC", 100, 20.0, now()).unwrap();
        let result = leg.record_fill(&fill("RCAT", 100, 15.0, OrderSide::Buy));
        assert!(matches!(result, Err(PositionError::UnknownSymbol(_))));
        assert_eq!(leg.filled_shares, 0);
    }

    #[test]
    fn pair_routes_fills_by_symbol() {
        let leg_a = LegAllocation::new("UMAC", -1000, 20.0, now()).unwrap();
        let leg_b = LegAllocation::new("RCAT", 1389, 15.0, now()).unwrap();
        let mut pos = PairPosition::new(SpreadDirection::ShortSpread, leg_a, leg_b);

        pos.record_fill(&fill("RCAT", 1389, 15.05, OrderSide::Buy))
            .unwrap();
        assert_eq!(pos.leg_b.filled_shares, 1389);
        assert_eq!(pos.leg_a.filled_shares, 0);

        assert!(pos
            .record_fill(&fill("SPY", 1, 400.0, OrderSide::Buy))
            .is_err());
    }

    #[test]
    fn opening_sides_are_always_opposite() {
        assert_eq!(SpreadDirection::LongSpread.leg_a_side(), OrderSide::Buy);
        assert_eq!(SpreadDirection::LongSpread.leg_b_side(), OrderSide::Sell);
        assert_eq!(SpreadDirection::ShortSpread.leg_a_side(), OrderSide::Sell);
        assert_eq!(SpreadDirection::ShortSpread.leg_b_side(), OrderSide::Buy);
    }
}
