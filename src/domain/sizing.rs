//! Position Sizer
//!
//! Converts available buying power into an integer share allocation for both
//! legs. Capital is split evenly between the legs regardless of relative
//! price or volatility; this is a deliberate simplification, not risk-parity
//! sizing. Leg B follows leg A through the fixed hedge ratio with truncating
//! division.

/// Unsigned share counts for both legs of a prospective entry.
///
/// Direction is applied later by the state machine; sizing itself is
/// direction-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairSize {
    pub shares_a: u64,
    pub shares_b: u64,
}

impl PairSize {
    /// Approximate notional deployed across both legs at the given prices.
    pub fn notional(&self, price_a: f64, price_b: f64) -> f64 {
        self.shares_a as f64 * price_a + self.shares_b as f64 * price_b
    }
}

/// Size both legs from available capital.
///
/// `shares_a = min(max_position_size, floor(capital / 2 / price_a))`,
/// `shares_b = floor(shares_a * hedge_ratio)`. Returns `None` when either
/// leg sizes to zero; the caller must not submit orders in that case.
///
/// Pure function: no side effects, no process-wide state.
pub fn size_legs(
    available_capital: f64,
    price_a: f64,
    hedge_ratio: f64,
    max_position_size: u64,
) -> Option<PairSize> {
    if !(available_capital >= 0.0) || price_a <= 0.0 || hedge_ratio <= 0.0 {
        return None;
    }

    let per_leg_capital = available_capital / 2.0;
    let affordable = (per_leg_capital / price_a).floor();
    if !affordable.is_finite() || affordable < 1.0 {
        return None;
    }

    let shares_a = (affordable as u64).min(max_position_size);
    let shares_b = (shares_a as f64 * hedge_ratio).floor() as u64;

    if shares_a == 0 || shares_b == 0 {
        return None;
    }

    Some(PairSize { shares_a, shares_b })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEDGE: f64 = 1.389508;

    #[test]
    fn caps_leg_a_at_max_position() {
        // capital 100_000, price_a 20: floor(50_000 / 20) = 2500, capped at 1000
        let size = size_legs(100_000.0, 20.0, HEDGE, 1000).unwrap();
        assert_eq!(size.shares_a, 1000);
        // floor(1000 * 1.389508) = 1389
        assert_eq!(size.shares_b, 1389);
    }

    #[test]
    fn uses_affordable_shares_below_cap() {
        // floor(5_000 / 20) = 250 < cap
        let size = size_legs(10_000.0, 20.0, HEDGE, 1000).unwrap();
        assert_eq!(size.shares_a, 250);
        assert_eq!(size.shares_b, (250.0 * HEDGE).floor() as u64);
    }

    #[test]
    fn leg_b_truncates_not_rounds() {
        // 3 * 1.389508 = 4.168... -> 4, never 5 even at .9 fractions
        let size = size_legs(1_000.0, 100.0, 1.9, 100).unwrap();
        assert_eq!(size.shares_a, 5);
        assert_eq!(size.shares_b, 9); // floor(5 * 1.9) = floor(9.5)
    }

    #[test]
    fn rejects_when_leg_a_sizes_to_zero() {
        assert_eq!(size_legs(30.0, 20.0, HEDGE, 1000), None);
        assert_eq!(size_legs(0.0, 20.0, HEDGE, 1000), None);
    }

    #[test]
    fn rejects_when_leg_b_sizes_to_zero() {
        // one affordable A share but hedge ratio under 1 floors B to zero
        assert_eq!(size_legs(60.0, 20.0, 0.4, 1000), None);
    }

    #[test]
    fn rejects_nonsense_inputs() {
        assert_eq!(size_legs(-1.0, 20.0, HEDGE, 1000), None);
        assert_eq!(size_legs(f64::NAN, 20.0, HEDGE, 1000), None);
        assert_eq!(size_legs(1_000.0, 0.0, HEDGE, 1000), None);
        assert_eq!(size_legs(1_000.0, 20.0, -1.0, 1000), None);
        assert_eq!(size_legs(1_000.0, 20.0, HEDGE, 0), None);
    }

    #[test]
    fn invariants_hold_across_inputs() {
        for capital in [500.0, 5_000.0, 50_000.0, 500_000.0] {
            for price in [1.0, 7.5, 20.0, 312.0] {
                if let Some(size) = size_legs(capital, price, HEDGE, 1000) {
                    assert!(size.shares_a <= 1000);
                    assert_eq!(size.shares_b, (size.shares_a as f64 * HEDGE).floor() as u64);
                }
            }
        }
    }

    #[test]
    fn notional_covers_both_legs() {
        let size = PairSize {
            shares_a: 10,
            shares_b: 13,
        };
        assert_eq!(size.notional(20.0, 15.0), 10.0 * 20.0 + 13.0 * 15.0);
    }
}
