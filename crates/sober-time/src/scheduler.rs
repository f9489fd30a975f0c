//! Control-loop scheduler
//!
//! One primitive owns loop pacing: a fixed-interval tick, replaced by a
//! longer backoff after an iteration fails. The loop body never sleeps on its
//! own.

use std::time::Duration;

use tokio::time::{self, Interval, MissedTickBehavior};

/// Scheduler configuration
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Interval between loop iterations
    pub poll_interval: Duration,
    /// Pause after a failed iteration
    pub error_backoff: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            poll_interval: Duration::from_millis(100),
            error_backoff: Duration::from_secs(1),
        }
    }
}

/// Result of one loop iteration, as far as pacing is concerned
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing arrived
    Idle,
    /// An input was processed
    Handled,
    /// The iteration hit an unexpected error
    Failed,
}

#[derive(Clone, Debug, Default)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub handled: u64,
    pub failures: u64,
    pub consecutive_failures: u32,
}

pub struct Scheduler {
    config: SchedulerConfig,
    interval: Option<Interval>,
    stats: SchedulerStats,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Scheduler {
            config,
            interval: None,
            stats: SchedulerStats::default(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Record an outcome and return how long the loop should wait
    pub fn record(&mut self, outcome: TickOutcome) -> Duration {
        self.stats.ticks += 1;
        match outcome {
            TickOutcome::Idle => {
                self.stats.consecutive_failures = 0;
                self.config.poll_interval
            }
            TickOutcome::Handled => {
                self.stats.handled += 1;
                self.stats.consecutive_failures = 0;
                self.config.poll_interval
            }
            TickOutcome::Failed => {
                self.stats.failures += 1;
                self.stats.consecutive_failures = self.stats.consecutive_failures.saturating_add(1);
                self.config.error_backoff
            }
        }
    }

    /// Wait until the next iteration is due.
    ///
    /// Normal iterations follow the fixed interval (a slow iteration delays
    /// the next tick rather than bursting). A failure waits the full backoff
    /// and restarts the interval.
    pub async fn pace(&mut self, outcome: TickOutcome) {
        let delay = self.record(outcome);
        let poll_interval = self.config.poll_interval;
        let interval = self.interval.get_or_insert_with(|| {
            let mut interval = time::interval(poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        if outcome == TickOutcome::Failed {
            time::sleep(delay).await;
            interval.reset();
        } else {
            interval.tick().await;
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}
