//! Fixed-rate background jobs with a cooperative shutdown signal.

use crate::error::{AgentError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Work performed on every tick of a [`PeriodicTask`].
#[async_trait]
pub trait Tick: Send + Sync + 'static {
    /// Run one unit of work. Long waits inside should race against
    /// `shutdown` so that stopping the task does not block on them.
    async fn tick(&self, shutdown: &ShutdownSignal);

    /// Called once after the loop exits
    fn on_stop(&self) {}
}

/// Read side of a shutdown flag
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
    // Only set for `never()`, keeps the channel open
    _keepalive: Option<Arc<watch::Sender<bool>>>,
}

impl ShutdownSignal {
    /// A signal that is never raised, for one-off work outside a task
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            rx,
            _keepalive: Some(Arc::new(tx)),
        }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has been requested
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                // Owner went away without signalling; treat as shutdown
                return;
            }
        }
    }
}

/// A running fixed-rate job.
///
/// The first tick fires immediately. Ticks that would overlap a still
/// running tick are skipped, so at most one tick of a task is in flight
/// and the schedule picks up again on the next period boundary.
pub struct PeriodicTask {
    name: String,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    pub fn start<T: Tick>(name: impl Into<String>, period: Duration, job: Arc<T>) -> Result<Self> {
        let name = name.into();
        if period.is_zero() {
            return Err(AgentError::Config(format!(
                "Task {} needs a positive period",
                name
            )));
        }

        let (tx, rx) = watch::channel(false);
        let signal = ShutdownSignal {
            rx,
            _keepalive: None,
        };
        let handle = tokio::spawn(run_loop(name.clone(), period, job, signal));

        info!("Started task {} with period {:?}", name, period);
        Ok(Self {
            name,
            shutdown: tx,
            handle,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal the loop to stop and wait for the in-flight tick to wind down
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            warn!("Task {} ended abnormally: {}", self.name, e);
        }
        info!("Stopped task {}", self.name);
    }
}

async fn run_loop<T: Tick>(name: String, period: Duration, job: Arc<T>, shutdown: ShutdownSignal) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let scheduled = tokio::select! {
            biased;
            _ = shutdown.wait() => break,
            at = ticker.tick() => at,
        };

        debug!("Task {} tick", name);
        job.tick(&shutdown).await;

        let elapsed = scheduled.elapsed();
        if elapsed >= period {
            // Overran: resume on the next boundary instead of firing at once
            let missed = u32::try_from(elapsed.as_nanos() / period.as_nanos())
                .unwrap_or(u32::MAX - 1);
            debug!("Task {} overran by {} period(s)", name, missed);
            ticker.reset_at(scheduled + period.saturating_mul(missed + 1));
        }
    }

    job.on_stop();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[derive(Default)]
    struct Counter {
        ticks: AtomicUsize,
        stopped: AtomicBool,
    }

    #[async_trait]
    impl Tick for Counter {
        async fn tick(&self, _shutdown: &ShutdownSignal) {
            self.ticks.fetch_add(1, Ordering::SeqCst);
        }

        fn on_stop(&self) {
            self.stopped.store(true, Ordering::SeqCst);
        }
    }

    /// Blocks every tick until shutdown
    struct Stuck;

    #[async_trait]
    impl Tick for Stuck {
        async fn tick(&self, shutdown: &ShutdownSignal) {
            shutdown.wait().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_at_fixed_rate() {
        let counter = Arc::new(Counter::default());
        let task = PeriodicTask::start("counter", Duration::from_secs(10), counter.clone()).unwrap();

        // First tick is immediate
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(counter.ticks.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(counter.ticks.load(Ordering::SeqCst), 4);

        task.stop().await;
        assert!(counter.stopped.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(counter.ticks.load(Ordering::SeqCst), 4);
    }

    /// First tick takes longer than two periods
    struct Overrun {
        base: Instant,
        starts: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl Tick for Overrun {
        async fn tick(&self, _shutdown: &ShutdownSignal) {
            let first = {
                let mut starts = self.starts.lock().unwrap();
                starts.push(self.base.elapsed().as_secs());
                starts.len() == 1
            };
            if first {
                tokio::time::sleep(Duration::from_secs(25)).await;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrunning_tick_skips_to_next_boundary() {
        let job = Arc::new(Overrun {
            base: Instant::now(),
            starts: Mutex::new(Vec::new()),
        });
        let task = PeriodicTask::start("overrun", Duration::from_secs(10), job.clone()).unwrap();

        tokio::time::sleep(Duration::from_secs(41)).await;
        task.stop().await;

        // 10 and 20 fall inside the first tick; no catch-up at 25
        assert_eq!(*job.starts.lock().unwrap(), vec![0, 30, 40]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop() {
        let counter = Arc::new(Counter::default());

        let task = PeriodicTask::start("counter", Duration::from_secs(5), counter.clone()).unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        task.stop().await;
        let after_first = counter.ticks.load(Ordering::SeqCst);

        let task = PeriodicTask::start("counter", Duration::from_secs(5), counter.clone()).unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(counter.ticks.load(Ordering::SeqCst), after_first + 1);
        task.stop().await;
    }

    #[tokio::test]
    async fn test_stop_interrupts_blocked_tick() {
        let task = PeriodicTask::start("stuck", Duration::from_secs(1), Arc::new(Stuck)).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!task.is_finished());

        tokio::time::timeout(Duration::from_secs(5), task.stop())
            .await
            .expect("stop must not hang on an in-flight tick");
    }

    #[tokio::test]
    async fn test_zero_period_rejected() {
        let result = PeriodicTask::start("bad", Duration::ZERO, Arc::new(Counter::default()));
        assert!(matches!(result, Err(AgentError::Config(_))));
    }

    #[tokio::test]
    async fn test_never_signal_stays_down() {
        let signal = ShutdownSignal::never();
        assert!(!signal.is_shutdown());

        let waited = tokio::time::timeout(Duration::from_millis(20), signal.wait()).await;
        assert!(waited.is_err());
    }
}
