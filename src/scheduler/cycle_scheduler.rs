use std::future::Future;
use std::time::Duration;

use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::pipeline::{CycleReport, PipelineCoordinator, PipelineError};

/// Totals reported when the scheduler stops.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct SchedulerSummary {
    pub cycles: usize,
    pub failed_cycles: usize,
    pub committed: usize
}

/// Drives the coordinator on a fixed interval and owns the cycle retry policy.
///
/// Cycles run one after another on the same task, so they can never overlap.
/// A tick that comes due while a cycle is still running is delayed, not stacked.
pub struct Scheduler {
    coordinator: PipelineCoordinator,
    interval: Duration,
    retries: u32,
    retry_delay: Duration
}

impl Scheduler {
    pub fn new(coordinator: PipelineCoordinator, config: &PipelineConfig) -> Self {
        Self {
            coordinator,
            interval: config.cycle_interval(),
            retries: config.cycle_retries,
            retry_delay: config.retry_delay()
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn coordinator(&self) -> &PipelineCoordinator {
        &self.coordinator
    }

    /// Runs one cycle, retrying after `retry_delay` up to `retries` times.
    ///
    /// Returns the last error when every attempt fails.
    pub async fn run_once(&mut self) -> Result<CycleReport, PipelineError> {
        let mut attempt = 0;

        loop {
            match self.coordinator.run_cycle().await {
                Ok(report) => return Ok(report),
                Err(error) if attempt < self.retries && error.is_retryable() => {
                    attempt += 1;
                    warn!(attempt, retries = self.retries, delay = ?self.retry_delay, "Retrying failed cycle: {error}");
                    sleep(self.retry_delay).await;
                }
                Err(error) => return Err(error)
            }
        }
    }

    /// Runs cycles on the configured interval until `shutdown` resolves.
    ///
    /// Shutdown is only observed between cycles, a running cycle is bounded by its own deadline.
    pub async fn run<F>(&mut self, shutdown: F) -> SchedulerSummary
    where
        F: Future<Output = ()>,
    {
        let mut summary = SchedulerSummary::default();
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    summary.cycles += 1;

                    match self.run_once().await {
                        Ok(report) => summary.committed += report.committed,
                        Err(error) => {
                            summary.failed_cycles += 1;
                            error!("Cycle abandoned until the next tick: {error}");
                        }
                    }
                }
            }
        }

        info!(cycles = summary.cycles, failed_cycles = summary.failed_cycles, committed = summary.committed, "Scheduler stopped");

        summary
    }
}
