//! Fixed-interval scheduler running at most one cycle at a time.
//!
//! A single timer task owns the interval. On each tick it spawns the cycle and
//! awaits it before looking at the timer again, so two cycles can never
//! overlap. A tick that comes due while a cycle is still running fires once
//! the cycle ends; any further missed ticks are dropped
//! ([`MissedTickBehavior::Skip`]).
//!
//! Cycle errors and panics are logged and never stop the timer.
//!
//! ```no_run
//! use mailhook::Scheduler;
//! use std::time::Duration;
//!
//! # async fn example() -> mailhook::Result<()> {
//! let scheduler = Scheduler::start(Duration::from_secs(300), || async {
//!     // one poll cycle
//!     Ok::<_, mailhook::Error>(())
//! })?;
//!
//! // ... later
//! scheduler.stop();
//! scheduler.shutdown().await;
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

/// Lifecycle state of a [`Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for the next tick.
    Idle,
    /// A cycle is executing.
    Running,
    /// No further cycles will start.
    Stopped,
}

impl SchedulerState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            IDLE => SchedulerState::Idle,
            RUNNING => SchedulerState::Running,
            _ => SchedulerState::Stopped,
        }
    }
}

/// Handle to a running schedule.
///
/// Dropping the handle stops future ticks; an in-flight cycle still finishes.
#[derive(Debug)]
pub struct Scheduler {
    interval: Duration,
    state: Arc<AtomicU8>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Starts calling `cycle` every `interval`, first after one full interval.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInterval`] if `interval` is zero, or
    /// [`Error::NoRuntime`] if called outside a tokio runtime.
    pub fn start<F, Fut, T>(interval: Duration, cycle: F) -> Result<Self>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        if interval.is_zero() {
            return Err(Error::InvalidInterval);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| Error::NoRuntime)?;

        let state = Arc::new(AtomicU8::new(IDLE));
        let cancel = CancellationToken::new();

        let task = runtime.spawn(run_loop(
            interval,
            Arc::new(cycle),
            Arc::clone(&state),
            cancel.clone(),
        ));

        info!(interval_secs = interval.as_secs(), "Scheduler started");

        Ok(Self {
            interval,
            state,
            cancel,
            task: Some(task),
        })
    }

    /// Cancels future ticks. Does not interrupt a running cycle.
    ///
    /// Safe to call any number of times.
    pub fn stop(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        let _ = self
            .state
            .compare_exchange(IDLE, STOPPED, Ordering::SeqCst, Ordering::SeqCst);
        debug!("Scheduler stop requested");
    }

    /// Stops the schedule and waits for the in-flight cycle, if any, to finish.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Scheduler task ended abnormally");
            }
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        SchedulerState::from_raw(self.state.load(Ordering::SeqCst))
    }

    /// Returns `true` while a cycle is executing.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    /// The fixed tick interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_loop<F, Fut, T>(
    interval: Duration,
    cycle: Arc<F>,
    state: Arc<AtomicU8>,
    cancel: CancellationToken,
) where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut tick: u64 = 0;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        tick += 1;

        if state
            .compare_exchange(IDLE, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(tick, "Tick skipped, scheduler not idle");
            continue;
        }

        run_tick(tick, Arc::clone(&cycle)).await;

        let _ = state.compare_exchange(RUNNING, IDLE, Ordering::SeqCst, Ordering::SeqCst);
    }

    state.store(STOPPED, Ordering::SeqCst);
    info!("Scheduler stopped");
}

#[instrument(name = "scheduler::tick", skip(cycle))]
async fn run_tick<F, Fut, T>(tick: u64, cycle: Arc<F>)
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    // Spawned so a panicking cycle cannot take the timer task down with it.
    let handle = tokio::spawn(async move { (cycle)().await });

    match handle.await {
        Ok(Ok(_)) => debug!("Cycle finished"),
        Ok(Err(e)) => error!(error = %e, category = %e.category(), "Cycle failed"),
        Err(e) => error!(error = %e, "Cycle panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting(counter: &Arc<AtomicUsize>) -> impl Fn() -> futures::future::Ready<Result<()>> {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(Ok(()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_one_interval() {
        let count = Arc::new(AtomicUsize::new(0));
        let scheduler = Scheduler::start(Duration::from_secs(10), counting(&count)).unwrap();

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(26)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let count = Arc::new(AtomicUsize::new(0));
        let err = Scheduler::start(Duration::ZERO, counting(&count)).unwrap_err();
        assert!(matches!(err, Error::InvalidInterval));
    }

    #[test]
    fn test_start_outside_runtime() {
        let count = Arc::new(AtomicUsize::new(0));
        let err = Scheduler::start(Duration::from_secs(1), counting(&count)).unwrap_err();
        assert!(matches!(err, Error::NoRuntime));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_first_tick() {
        let count = Arc::new(AtomicUsize::new(0));
        let scheduler = Scheduler::start(Duration::from_secs(10), counting(&count)).unwrap();

        scheduler.stop();
        scheduler.stop();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_ticks() {
        let count = Arc::new(AtomicUsize::new(0));
        let scheduler = Scheduler::start(Duration::from_secs(10), counting(&count)).unwrap();
        drop(scheduler);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_cycle_does_not_stop_timer() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let scheduler = Scheduler::start(Duration::from_secs(10), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                assert!(n != 0, "first cycle blows up");
                Ok::<_, Error>(())
            }
        })
        .unwrap();

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_lets_running_cycle_finish() {
        let finished = Arc::new(AtomicUsize::new(0));
        let done = Arc::clone(&finished);
        let scheduler = Scheduler::start(Duration::from_secs(10), move || {
            let done = Arc::clone(&done);
            async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Error>(())
            }
        })
        .unwrap();

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(scheduler.is_running());

        scheduler.stop();
        assert_eq!(scheduler.state(), SchedulerState::Running);

        scheduler.shutdown().await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }
}
