//! Daily Trigger Scheduler
//!
//! The trigger-source collaborator for live/paper runs: polls the wall
//! clock and delivers fire(today) to the coordinator once the configured
//! time has passed. The coordinator enforces the once-per-day guarantee;
//! the scheduler only decides when to knock.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveTime, Utc};
use tokio::sync::RwLock;

use crate::engine::coordinator::DailyTriggerCoordinator;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Polls the clock and fires the coordinator once per trading day.
pub struct DailyTrigger {
    coordinator: Arc<DailyTriggerCoordinator>,
    fire_time: NaiveTime,
    poll_interval: Duration,
    is_running: Arc<RwLock<bool>>,
}

impl DailyTrigger {
    pub fn new(coordinator: Arc<DailyTriggerCoordinator>, fire_time: NaiveTime) -> Self {
        Self {
            coordinator,
            fire_time,
            poll_interval: DEFAULT_POLL_INTERVAL,
            is_running: Arc::new(RwLock::new(false)),
        }
    }

    /// Set custom poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Run the scheduling loop until `stop` is called.
    pub async fn run(&self) {
        *self.is_running.write().await = true;
        tracing::info!(
            fire_time = %self.fire_time,
            poll_interval = ?self.poll_interval,
            "daily trigger armed"
        );

        while *self.is_running.read().await {
            let now = Utc::now();
            let today = now.date_naive();

            let due = now.time() >= self.fire_time;
            let already_done = self
                .coordinator
                .last_processed_day()
                .is_some_and(|last| last >= today);

            if due && !already_done && self.coordinator.is_armed() {
                tracing::info!(%today, "delivering daily trigger");
                let outcome = self.coordinator.fire(today).await;
                tracing::info!(%today, ?outcome, "daily trigger handled");
            }

            tokio::time::sleep(self.poll_interval).await;
        }

        tracing::info!("daily trigger stopped");
    }

    /// Stop the scheduling loop
    pub async fn stop(&self) {
        *self.is_running.write().await = false;
    }
}

// Shared across tasks (run loop + shutdown handler)
impl Clone for DailyTrigger {
    fn clone(&self) -> Self {
        Self {
            coordinator: Arc::clone(&self.coordinator),
            fire_time: self.fire_time,
            poll_interval: self.poll_interval,
            is_running: Arc::clone(&self.is_running),
        }
    }
}
