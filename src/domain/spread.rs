//! Spread Model
//!
//! Computes the hedge-adjusted spread between the two legs and standardizes
//! the current spread against its trailing history.
//!
//! Spread Formula: spread = price_a - hedge_ratio * price_b
//! Z-Score Formula: z = (current_spread - mean) / std_dev
//!
//! The standard deviation is the sample deviation (divide by n - 1). A zero
//! deviation means the spread series is flat and the cycle must be skipped
//! rather than divide by zero.

use serde::{Deserialize, Serialize};

/// A standardized spread deviation for one decision cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZScore {
    /// Current z-score value
    pub value: f64,
    /// Mean of the trailing spread history
    pub mean: f64,
    /// Sample standard deviation of the trailing spread history
    pub std_dev: f64,
    /// Spread computed from the current leg prices
    pub current_spread: f64,
}

impl ZScore {
    /// Check if the spread is stretched above the entry threshold
    pub fn is_stretched_high(&self, threshold: f64) -> bool {
        self.value > threshold
    }

    /// Check if the spread is stretched below the negative entry threshold
    pub fn is_stretched_low(&self, threshold: f64) -> bool {
        self.value < -threshold
    }

    /// Distance from the mean in units of standard deviation
    pub fn deviation_magnitude(&self) -> f64 {
        self.value.abs()
    }

    /// One-sided probability that a normal deviate sits below this z-score.
    ///
    /// Standard normal CDF: Phi(z) = 0.5 * (1 + erf(z / sqrt(2)))
    pub fn confidence(&self) -> f64 {
        use statrs::function::erf::erf;
        0.5 * (1.0 + erf(self.value / f64::sqrt(2.0)))
    }
}

/// Outcome of one spread evaluation.
///
/// The two non-`Ok` variants suppress action for the cycle; neither is a
/// fatal condition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpreadEvaluation {
    /// Histories were usable and the deviation is well-defined
    Ok(ZScore),
    /// Usable overlapping history is shorter than the lookback window
    InsufficientData { have: usize, need: usize },
    /// Spread history has zero sample variance
    Degenerate { mean: f64 },
}

impl SpreadEvaluation {
    /// The z-score, when the evaluation produced one
    pub fn z_score(&self) -> Option<ZScore> {
        match self {
            SpreadEvaluation::Ok(z) => Some(*z),
            _ => None,
        }
    }
}

/// Hedge-adjusted spread model for one instrument pair.
#[derive(Debug, Clone)]
pub struct SpreadModel {
    hedge_ratio: f64,
    lookback: usize,
}

impl SpreadModel {
    pub fn new(hedge_ratio: f64, lookback: usize) -> Self {
        Self {
            hedge_ratio,
            lookback,
        }
    }

    pub fn hedge_ratio(&self) -> f64 {
        self.hedge_ratio
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    /// Evaluate the current spread against the trailing histories.
    ///
    /// Both histories are truncated to the same trailing length
    /// `L = min(len_a, len_b)`, which must be at least the lookback window.
    /// `current_a`/`current_b` are the already-resolved live prices for each
    /// leg (see [`resolve_current_price`]).
    pub fn evaluate(
        &self,
        history_a: &[f64],
        history_b: &[f64],
        current_a: f64,
        current_b: f64,
    ) -> SpreadEvaluation {
        let usable = history_a.len().min(history_b.len());
        if usable < self.lookback {
            return SpreadEvaluation::InsufficientData {
                have: usable,
                need: self.lookback,
            };
        }

        let recent_a = &history_a[history_a.len() - usable..];
        let recent_b = &history_b[history_b.len() - usable..];

        let spreads: Vec<f64> = recent_a
            .iter()
            .zip(recent_b.iter())
            .map(|(&a, &b)| a - self.hedge_ratio * b)
            .collect();

        let mean = spreads.iter().sum::<f64>() / spreads.len() as f64;
        let variance = spreads
            .iter()
            .map(|&s| {
                let diff = s - mean;
                diff * diff
            })
            .sum::<f64>()
            / (spreads.len() - 1) as f64;
        let std_dev = variance.sqrt();

        if std_dev == 0.0 {
            return SpreadEvaluation::Degenerate { mean };
        }

        let current_spread = current_a - self.hedge_ratio * current_b;
        SpreadEvaluation::Ok(ZScore {
            value: (current_spread - mean) / std_dev,
            mean,
            std_dev,
            current_spread,
        })
    }
}

/// Pick the live price for a leg: a valid tick overrides the last bar close.
///
/// A tick is valid when present, finite and strictly positive; otherwise the
/// last close stands in.
pub fn resolve_current_price(last_close: f64, tick: Option<f64>) -> f64 {
    match tick {
        Some(t) if t.is_finite() && t > 0.0 => t,
        _ => last_close,
    }
}
