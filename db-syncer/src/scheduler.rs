//! Periodic fan-out over all sync targets

use crate::syncer::{CycleReport, Syncer};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// How often the shutdown token is checked while waiting between cycles
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Runs every syncer concurrently, then waits `delay` before the next cycle
///
/// A zero delay runs exactly one cycle. Shutdown is observed between cycles
/// and during the wait, never mid-cycle.
#[derive(Debug)]
pub struct Scheduler {
    syncers: Vec<Arc<Syncer>>,
    delay: Duration,
    poll_interval: Duration,
    shutdown: CancellationToken,
}

impl Scheduler {
    /// Create new scheduler
    pub fn new(syncers: Vec<Arc<Syncer>>, delay: Duration, shutdown: CancellationToken) -> Self {
        Self {
            syncers,
            delay,
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown,
        }
    }

    /// Override the shutdown poll interval
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }

    /// Token that stops [`Scheduler::run`]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run every syncer once, concurrently, and wait for all of them
    pub async fn run_cycle(&self) -> Vec<CycleReport> {
        let mut tasks = JoinSet::new();
        for syncer in &self.syncers {
            let syncer = Arc::clone(syncer);
            tasks.spawn(async move { syncer.sync().await });
        }

        let mut reports = Vec::with_capacity(self.syncers.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => error!(error = %e, "Sync task aborted"),
            }
        }

        reports
    }

    /// Loop until shutdown is requested; returns the number of cycles run
    pub async fn run(&self) -> usize {
        let mut cycles = 0;

        while !self.shutdown.is_cancelled() {
            let reports = self.run_cycle().await;
            cycles += 1;

            let failed = reports.iter().filter(|r| !r.is_success()).count();
            info!(
                cycle = cycles,
                targets = reports.len(),
                failed,
                "Sync finished"
            );

            if self.delay.is_zero() {
                break;
            }

            self.wait_delay().await;
        }

        info!(cycles, "Shutdown");
        cycles
    }

    async fn wait_delay(&self) {
        let deadline = Instant::now() + self.delay;

        while !self.shutdown.is_cancelled() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}
