//! Background ambient ticking on a tokio interval.
//!
//! The driver holds only a weak reference to the scheduler. It stops when the
//! handle is shut down, when the handle is dropped, or when the scheduler (and
//! with it the store handle) has been dropped, so no timer outlives the store.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::SchedulerConfig;
use crate::scheduler::DegradationScheduler;

/// Spawns the periodic ambient tick.
#[derive(Debug, Clone, Copy)]
pub struct AmbientDriver;

impl AmbientDriver {
    /// Start ticking `scheduler` every `interval` on the current tokio runtime.
    ///
    /// Each tick passes the measured elapsed seconds since the previous one.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime, or if `interval` is zero.
    #[must_use]
    pub fn spawn(
        scheduler: &Arc<Mutex<DegradationScheduler>>,
        interval: Duration,
    ) -> AmbientHandle {
        let weak: Weak<Mutex<DegradationScheduler>> = Arc::downgrade(scheduler);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            let mut last = Instant::now();

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        debug!("Ambient driver shut down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let Some(scheduler) = weak.upgrade() else {
                            debug!("Scheduler dropped; ambient driver exiting");
                            break;
                        };
                        let now = Instant::now();
                        let dt = now.duration_since(last).as_secs_f64();
                        last = now;
                        scheduler.lock().tick(dt);
                    }
                }
            }
        });

        info!(interval_ms = interval.as_millis(), "Ambient driver started");
        AmbientHandle {
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    /// Start ticking at the configured `tick_interval_seconds` (at least one
    /// second).
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn spawn_configured(
        scheduler: &Arc<Mutex<DegradationScheduler>>,
        config: &SchedulerConfig,
    ) -> AmbientHandle {
        Self::spawn(scheduler, Duration::from_secs(config.tick_interval_seconds.max(1)))
    }
}

/// Owner of a running ambient driver. Dropping it aborts the task.
#[derive(Debug)]
pub struct AmbientHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl AmbientHandle {
    /// Stop the driver and wait for the task to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.join_inner().await;
    }

    /// Wait for the driver to exit on its own (scheduler dropped).
    pub async fn join(mut self) {
        self.join_inner().await;
    }

    /// Whether the background task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    async fn join_inner(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for AmbientHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ErodeConfig;
    use crate::store::MemoryStore;

    fn scheduler() -> Arc<Mutex<DegradationScheduler>> {
        let store = MemoryStore::in_memory().into_shared();
        store.lock().create("a lantern left on the porch");
        Arc::new(Mutex::new(DegradationScheduler::with_seed(
            store,
            &ErodeConfig::default(),
            1,
        )))
    }

    #[tokio::test(start_paused = true)]
    async fn driver_ticks_on_interval() {
        let scheduler = scheduler();
        let handle = AmbientDriver::spawn(&scheduler, Duration::from_secs(5));

        tokio::time::sleep(Duration::from_secs(26)).await;
        let ticks = scheduler.lock().store().lock().counters().snapshot().ticks;
        assert!(ticks >= 4, "expected at least 4 ticks, saw {ticks}");

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn configured_interval_is_used() {
        let scheduler = scheduler();
        let config = SchedulerConfig {
            tick_interval_seconds: 10,
            ..SchedulerConfig::default()
        };
        let handle = AmbientDriver::spawn_configured(&scheduler, &config);

        tokio::time::sleep(Duration::from_secs(25)).await;
        let ticks = scheduler.lock().store().lock().counters().snapshot().ticks;
        assert_eq!(ticks, 2);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_ticking() {
        let scheduler = scheduler();
        let handle = AmbientDriver::spawn(&scheduler, Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        handle.shutdown().await;

        let before = scheduler.lock().store().lock().counters().snapshot().ticks;
        tokio::time::sleep(Duration::from_secs(10)).await;
        let after = scheduler.lock().store().lock().counters().snapshot().ticks;
        assert_eq!(before, after);
    }

    #[tokio::test(start_paused = true)]
    async fn driver_exits_when_scheduler_dropped() {
        let scheduler = scheduler();
        let handle = AmbientDriver::spawn(&scheduler, Duration::from_secs(1));
        drop(scheduler);

        let joined = tokio::time::timeout(Duration::from_secs(30), handle.join()).await;
        assert!(joined.is_ok(), "driver should exit once the scheduler is gone");
    }
}
