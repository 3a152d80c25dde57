//! `Scheduler`: the single facility-wide coordinator that runs one
//! strategy at a time from a FIFO queue (spec §4.3, C5).

pub mod registry;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use registry::{StrategyFactory, StrategyRegistration, StrategyRegistry};

use crate::activity::{ActivityStrategyActor, StrategyStats};

/// One strategy waiting to run, identified by the name it was registered
/// under (spec §4.3, "strategy queue").
pub struct QueuedStrategy {
    pub strategy_name: String,
    pub actor: ActivityStrategyActor,
}

/// Facility-wide status, rebuilt on every periodic snapshot and written to
/// the archive's plain-text status file (spec §4.4, §6).
#[derive(Clone, Debug, Default)]
pub struct SchedulerStatus {
    pub active_strategy: Option<String>,
    pub queue_depth: usize,
    pub last_strategy_stats: Option<StrategyStats>,
}

/// The single coordinator owning the strategy queue and the "one strategy
/// active at a time" invariant (spec §4.3).
///
/// `strategy_active` mirrors the original design's mutex-protected bool:
/// it is the only thing that needs to be locked on the hot path, since the
/// queue itself is only touched by the scheduler's own task.
pub struct Scheduler {
    registry: StrategyRegistry,
    queue: Mutex<VecDeque<QueuedStrategy>>,
    strategy_active: Mutex<bool>,
    queue_notify: Notify,
    status: Mutex<SchedulerStatus>,
    stop_on_strategy_failure: bool,
}

impl Scheduler {
    pub fn new(registry: StrategyRegistry, stop_on_strategy_failure: bool) -> Self {
        Self {
            registry,
            queue: Mutex::new(VecDeque::new()),
            strategy_active: Mutex::new(false),
            queue_notify: Notify::new(),
            status: Mutex::new(SchedulerStatus::default()),
            stop_on_strategy_failure,
        }
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Appends a strategy to the FIFO queue and wakes the run loop if it is
    /// idle.
    pub fn enqueue(&self, queued: QueuedStrategy) {
        let mut queue = self.queue.lock();
        queue.push_back(queued);
        self.status.lock().queue_depth = queue.len();
        self.queue_notify.notify_one();
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_strategy_active(&self) -> bool {
        *self.strategy_active.lock()
    }

    pub fn status(&self) -> SchedulerStatus {
        self.status.lock().clone()
    }

    /// Runs strategies one at a time from the queue until `shutdown` fires.
    /// A strategy that halts itself (exhausts `max_consecutive_failures`)
    /// either stops the whole scheduler or is simply dropped, per
    /// `stop_on_strategy_failure` (spec §4.3).
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("scheduler starting");
        loop {
            let next = self.queue.lock().pop_front();
            let Some(queued) = next else {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = self.queue_notify.notified() => continue,
                }
            };

            *self.strategy_active.lock() = true;
            self.status.lock().active_strategy = Some(queued.strategy_name.clone());
            self.status.lock().queue_depth = self.queue.lock().len();

            let strategy_name = queued.strategy_name.clone();
            let stats_handle = queued.actor.stats_handle();
            let actor_shutdown = shutdown.clone();
            queued.actor.run(actor_shutdown).await;

            *self.strategy_active.lock() = false;
            self.status.lock().active_strategy = None;
            let stats = stats_handle.read().clone();
            self.status.lock().last_strategy_stats = Some(stats.clone());
            info!(strategy = %strategy_name, "strategy finished");

            if self.stop_on_strategy_failure && stats.consecutive_failures > 0 {
                warn!(strategy = %strategy_name, "stopping scheduler after strategy failure");
                break;
            }

            if shutdown.is_cancelled() {
                break;
            }
        }
        info!("scheduler stopped");
    }

    /// Periodically writes the facility status snapshot until shutdown
    /// (spec §4.4, "disk status snapshot").
    pub async fn run_status_snapshot_loop<W>(&self, interval: Duration, shutdown: CancellationToken, mut writer: W)
    where
        W: FnMut(&SchedulerStatus) + Send,
    {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let status = self.status();
                    writer(&status);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn enqueue_then_shutdown_runs_the_queued_strategy() {
        let scheduler = Scheduler::new(StrategyRegistry::new(), false);
        let actor = ActivityStrategyActor::new_idle();
        scheduler.enqueue(QueuedStrategy {
            strategy_name: "idle-1".to_string(),
            actor,
        });
        assert_eq!(scheduler.queue_depth(), 1);

        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            shutdown_clone.cancel();
        });
        scheduler.run(shutdown).await;
        assert_eq!(scheduler.queue_depth(), 0);
        assert!(!scheduler.is_strategy_active());
    }

    #[tokio::test]
    async fn status_snapshot_loop_invokes_writer_on_interval() {
        let scheduler = Scheduler::new(StrategyRegistry::new(), false);
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(35)).await;
            shutdown_clone.cancel();
        });
        scheduler
            .run_status_snapshot_loop(Duration::from_millis(10), shutdown, move |_status| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        assert!(count.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn empty_scheduler_reports_no_active_strategy() {
        let scheduler = Scheduler::new(StrategyRegistry::new(), false);
        assert!(!scheduler.is_strategy_active());
        assert_eq!(scheduler.status().active_strategy, None);
    }
}
