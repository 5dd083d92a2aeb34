//! Trade Ledger
//!
//! Append-only CSV record of completed entry/exit pairs, one row per leg.
//! The column set is fixed by the downstream analytics consumer, which
//! computes Sharpe/Sortino/drawdown statistics offline; this engine only
//! emits the rows.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const CSV_HEADER: &str = "symbol,entry_time,exit_time,entry_shares,entry_price,entry_pl,exit_fees";

/// One leg of a completed round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub symbol: String,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    /// Signed entry quantity: positive = long, negative = short
    pub entry_shares: i64,
    pub entry_price: f64,
    /// Realized profit/loss for the leg over the round trip
    pub entry_pl: f64,
    pub exit_fees: f64,
}

impl LedgerRecord {
    fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{}",
            self.symbol,
            self.entry_time.to_rfc3339(),
            self.exit_time.to_rfc3339(),
            self.entry_shares,
            self.entry_price,
            self.entry_pl,
            self.exit_fees
        )
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to open ledger {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to append to ledger: {0}")]
    Write(#[from] std::io::Error),
}

/// Append-only CSV trade ledger.
///
/// Appends are best-effort from the engine's point of view: the cycle logs a
/// failed append and carries on, so a full disk never wedges trading.
#[derive(Debug, Clone)]
pub struct TradeLedger {
    path: PathBuf,
}

impl TradeLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append both legs of a completed round trip, writing the header first
    /// when the file is new or empty.
    pub fn append_round_trip(&self, legs: &[LedgerRecord]) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| LedgerError::Open {
                    path: self.path.clone(),
                    source,
                })?;
            }
        }

        let needs_header = std::fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| LedgerError::Open {
                path: self.path.clone(),
                source,
            })?;
        let mut writer = BufWriter::new(file);

        if needs_header {
            writeln!(writer, "{}", CSV_HEADER)?;
        }
        for leg in legs {
            writeln!(writer, "{}", leg.to_csv_row())?;
        }
        writer.flush()?;
        Ok(())
    }
}
