//! Daily Trigger Coordinator
//!
//! Guarantees the decision cycle runs at most once per trading day and never
//! concurrently, however many instrument instances deliver trigger
//! callbacks. One mutex serializes every read and write of the trigger
//! record; the in-progress check and the claim are a single critical
//! section, and the cycle body runs outside it so a slow collaborator never
//! blocks the check for other callers.
//!
//! Cycle failures are caught here and logged; they never propagate to the
//! trigger source. Whether a failed day may be retried the same day is a
//! configured policy, not a hard-coded choice.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use serde::Deserialize;

use crate::engine::cycle::{CycleOutcome, DecisionCycle};

/// Process-wide singleton tracking daily-trigger progress.
///
/// Mutated only by the coordinator, always under its mutex.
#[derive(Debug, Default)]
struct TriggerRecord {
    last_processed_day: Option<NaiveDate>,
    execution_in_progress: bool,
}

/// Why a fire() call did not run the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// This trading day (or a later one) has already been processed
    AlreadyProcessed,
    /// Another fire() call is mid-cycle
    InProgress,
}

/// Result of a trigger firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// The cycle ran to completion
    Completed(CycleOutcome),
    /// The cycle failed on a collaborator; the failure was caught and logged
    Aborted,
    /// The cycle did not run
    Skipped(SkipReason),
}

/// What a collaborator failure means for the rest of the trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureRetry {
    /// Leave the day unprocessed; a later fire() the same day retries
    SameDay,
    /// Mark the day processed; the next attempt happens tomorrow
    #[default]
    NextDay,
}

/// Serializes the daily decision cycle across all trigger sources.
pub struct DailyTriggerCoordinator {
    cycle: Arc<DecisionCycle>,
    record: Mutex<TriggerRecord>,
    failure_retry: FailureRetry,
    armed: AtomicBool,
}

impl DailyTriggerCoordinator {
    pub fn new(cycle: Arc<DecisionCycle>, failure_retry: FailureRetry) -> Self {
        Self {
            cycle,
            record: Mutex::new(TriggerRecord::default()),
            failure_retry,
            armed: AtomicBool::new(true),
        }
    }

    /// Whether the coordinator is ready for the next trigger delivery.
    ///
    /// Scheduling the actual fire event is the trigger source's job; the
    /// coordinator only reports armed / not armed.
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// The most recently completed trading day, if any.
    pub fn last_processed_day(&self) -> Option<NaiveDate> {
        self.lock_record().last_processed_day
    }

    /// Handle one trigger delivery for `trading_day`.
    ///
    /// The check of the trigger record and the in-progress claim are one
    /// atomic unit; two concurrent calls for the same day can never both
    /// pass it. The guard is NOT held while the cycle runs.
    pub async fn fire(&self, trading_day: NaiveDate) -> FireOutcome {
        {
            let mut record = self.lock_record();
            if record.execution_in_progress {
                tracing::info!(%trading_day, "trigger skipped: cycle already in progress");
                return FireOutcome::Skipped(SkipReason::InProgress);
            }
            // >= keeps last_processed_day strictly increasing even if a
            // stale trigger arrives after midnight.
            if record
                .last_processed_day
                .is_some_and(|last| last >= trading_day)
            {
                tracing::info!(%trading_day, "trigger skipped: day already processed");
                return FireOutcome::Skipped(SkipReason::AlreadyProcessed);
            }
            record.execution_in_progress = true;
        }
        self.armed.store(false, Ordering::SeqCst);

        let result = self.cycle.run(trading_day).await;

        let outcome = {
            let mut record = self.lock_record();
            record.execution_in_progress = false;
            match result {
                Ok(outcome) => {
                    record.last_processed_day = Some(trading_day);
                    FireOutcome::Completed(outcome)
                }
                Err(e) => {
                    tracing::error!(%trading_day, error = %e, "decision cycle aborted");
                    if self.failure_retry == FailureRetry::NextDay {
                        record.last_processed_day = Some(trading_day);
                    }
                    FireOutcome::Aborted
                }
            }
        };

        self.armed.store(true, Ordering::SeqCst);
        outcome
    }

    fn lock_record(&self) -> std::sync::MutexGuard<'_, TriggerRecord> {
        self.record.lock().expect("trigger record mutex poisoned")
    }
}
