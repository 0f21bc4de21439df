//! Fixed-interval harvest trigger
//!
//! Runs a harvest job every `interval` until cancelled. Runs never overlap:
//! a tick that comes due while a harvest is still running is skipped.

use crate::error::Result;
use crate::harvest::{HarvestReport, Harvester};
use crate::http::RemoteSource;
use crate::store::StayStore;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Default interval between harvests (4 hours)
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(4 * 60 * 60);

/// Work run on every tick
#[async_trait]
pub trait HarvestJob: Send + Sync {
    async fn run(&self) -> Result<HarvestReport>;
}

#[async_trait]
impl<R, S> HarvestJob for Harvester<R, S>
where
    R: RemoteSource,
    S: StayStore,
{
    async fn run(&self) -> Result<HarvestReport> {
        self.harvest().await
    }
}

#[async_trait]
impl<J: HarvestJob + ?Sized> HarvestJob for Arc<J> {
    async fn run(&self) -> Result<HarvestReport> {
        (**self).run().await
    }
}

/// Periodic harvest runner
pub struct Scheduler<J> {
    job: J,
    interval: Duration,
    run_on_startup: bool,
}

impl<J: HarvestJob> Scheduler<J> {
    pub fn new(job: J) -> Self {
        Self {
            job,
            interval: DEFAULT_INTERVAL,
            run_on_startup: false,
        }
    }

    /// Set the interval between runs (at least one second)
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_secs(1));
        self
    }

    /// Run once immediately instead of waiting a full interval
    #[must_use]
    pub fn with_run_on_startup(mut self, run_on_startup: bool) -> Self {
        self.run_on_startup = run_on_startup;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run until `token` is cancelled; returns the number of cycles started.
    ///
    /// A failed cycle is logged and the next tick retries.
    pub async fn run(&self, token: CancellationToken) -> u64 {
        let start = if self.run_on_startup {
            Instant::now()
        } else {
            Instant::now() + self.interval
        };
        let mut ticker = time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval_secs = self.interval.as_secs(),
            run_on_startup = self.run_on_startup,
            "Scheduler started"
        );

        let mut cycles = 0u64;
        loop {
            tokio::select! {
                biased;
                () = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            cycles += 1;
            debug!(cycle = cycles, "Harvest cycle triggered");
            match self.job.run().await {
                Ok(report) => info!(
                    cycle = cycles,
                    records = report.total_records(),
                    failed = report.total_failed(),
                    duration_ms = report.duration_ms,
                    "Harvest cycle complete"
                ),
                Err(e) => error!(cycle = cycles, error = %e, "Harvest cycle failed"),
            }
        }

        info!(cycles, "Scheduler stopped");
        cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Counts runs and cancels the token after `stop_after` of them
    struct CountingJob {
        runs: AtomicU64,
        stop_after: u64,
        token: CancellationToken,
        fail: bool,
    }

    impl CountingJob {
        fn new(stop_after: u64, token: CancellationToken) -> Self {
            Self {
                runs: AtomicU64::new(0),
                stop_after,
                token,
                fail: false,
            }
        }
    }

    #[async_trait]
    impl HarvestJob for CountingJob {
        async fn run(&self) -> Result<HarvestReport> {
            let runs = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            if runs >= self.stop_after {
                self.token.cancel();
            }
            if self.fail {
                return Err(Error::http_status(503, "provider down"));
            }
            Ok(HarvestReport::default())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_every_interval() {
        let token = CancellationToken::new();
        let job = Arc::new(CountingJob::new(3, token.clone()));
        let scheduler = Scheduler::new(Arc::clone(&job)).with_interval(Duration::from_secs(10));

        let started = Instant::now();
        let cycles = scheduler.run(token).await;

        assert_eq!(cycles, 3);
        assert_eq!(job.runs.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_on_startup() {
        let token = CancellationToken::new();
        let job = Arc::new(CountingJob::new(3, token.clone()));
        let scheduler = Scheduler::new(Arc::clone(&job))
            .with_interval(Duration::from_secs(10))
            .with_run_on_startup(true);

        let started = Instant::now();
        scheduler.run(token).await;

        assert_eq!(started.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cycle_does_not_stop_scheduler() {
        let token = CancellationToken::new();
        let mut job = CountingJob::new(2, token.clone());
        job.fail = true;
        let scheduler = Scheduler::new(job).with_interval(Duration::from_secs(60));

        assert_eq!(scheduler.run(token).await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_first_tick() {
        let token = CancellationToken::new();
        let job = CountingJob::new(1, token.clone());
        let scheduler = Scheduler::new(job).with_run_on_startup(true);

        token.cancel();
        assert_eq!(scheduler.run(token).await, 0);
    }

    #[test]
    fn test_interval_floor() {
        let token = CancellationToken::new();
        let scheduler =
            Scheduler::new(CountingJob::new(1, token)).with_interval(Duration::ZERO);
        assert_eq!(scheduler.interval(), Duration::from_secs(1));
    }
}
