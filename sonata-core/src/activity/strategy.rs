//! The base activity strategy actor: a single-consumer work queue driving
//! repeat/back-off bookkeeping around a strategy-specific body (spec §4.5,
//! C6 "ActivityStrategy").
//!
//! Concrete strategies (target observation, calibration, …) plug their
//! behavior in via [`StrategyBody`] rather than subclassing; the actor
//! itself only knows how to pace repeats and back off after failures.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::work_item::{ActivityOutcome, WorkItem};

/// Boxed future type for the dyn-compatible [`StrategyBody`] trait.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The strategy-specific unit of work run on every tick. Implementations
/// spawn and drive an [`ObserveActivity`](super::observe::ObserveActivity)
/// or equivalent to completion and report how it went.
pub trait StrategyBody: Send + Sync {
    fn run_once(&self) -> BoxFuture<'_, ActivityOutcome>;
}

/// Repeat and back-off policy for a strategy (spec §4.5).
#[derive(Clone, Debug)]
pub struct StrategyConfig {
    /// Stop after this many successful+failed runs. `None` means run until
    /// explicitly stopped.
    pub max_repeats: Option<u32>,
    /// Back-off delay applied after the first consecutive failure.
    pub initial_backoff: Duration,
    /// Ceiling the exponential back-off is clamped to.
    pub max_backoff: Duration,
    /// Stop the strategy entirely after this many consecutive failures.
    pub max_consecutive_failures: u32,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            max_repeats: None,
            initial_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(300),
            max_consecutive_failures: 5,
        }
    }
}

/// Live counters a strategy actor exposes to the scheduler's status
/// snapshot (spec §4.4, §6).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StrategyStats {
    pub runs_completed: u32,
    pub consecutive_failures: u32,
    pub stopped: bool,
}

/// Drives a [`StrategyBody`] through repeated runs with back-off, via a
/// single-consumer work queue.
pub struct ActivityStrategyActor {
    name: String,
    config: StrategyConfig,
    body: Option<Arc<dyn StrategyBody>>,
    tx: mpsc::Sender<WorkItem>,
    rx: mpsc::Receiver<WorkItem>,
    stats: Arc<RwLock<StrategyStats>>,
}

impl ActivityStrategyActor {
    pub fn new(name: impl Into<String>, body: Arc<dyn StrategyBody>, config: StrategyConfig) -> Self {
        let (tx, rx) = mpsc::channel(64);
        Self {
            name: name.into(),
            config,
            body: Some(body),
            tx,
            rx,
            stats: Arc::new(RwLock::new(StrategyStats::default())),
        }
    }

    /// A strategy with no body, used as a registry placeholder and in
    /// tests that only exercise the channel plumbing.
    pub fn new_idle() -> Self {
        let (tx, rx) = mpsc::channel(64);
        Self {
            name: "idle".to_string(),
            config: StrategyConfig::default(),
            body: None,
            tx,
            rx,
            stats: Arc::new(RwLock::new(StrategyStats::default())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A sender producers (the scheduler, component fault handlers) use to
    /// push work onto this strategy's queue.
    pub fn sender(&self) -> mpsc::Sender<WorkItem> {
        self.tx.clone()
    }

    pub fn stats(&self) -> StrategyStats {
        self.stats.read().clone()
    }

    /// A handle to this actor's live stats, so a caller can observe its
    /// outcome after `run()` has consumed the actor itself.
    pub fn stats_handle(&self) -> Arc<RwLock<StrategyStats>> {
        self.stats.clone()
    }

    /// Runs the actor until told to stop, `max_repeats` is reached, or
    /// `max_consecutive_failures` consecutive runs fail.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(strategy = %self.name, "strategy actor starting");
        let _ = self.tx.send(WorkItem::Tick).await;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!(strategy = %self.name, "strategy actor shutting down");
                    break;
                }

                item = self.rx.recv() => {
                    match item {
                        Some(WorkItem::Stop) | None => {
                            info!(strategy = %self.name, "strategy actor stopped");
                            break;
                        }
                        Some(WorkItem::Tick) => {
                            if self.reached_repeat_limit() {
                                break;
                            }
                            self.run_one_tick().await;
                        }
                        Some(WorkItem::ActivityDone { activity_id, outcome }) => {
                            debug!(strategy = %self.name, %activity_id, ?outcome, "activity finished");
                        }
                        Some(WorkItem::ComponentFault { activity_id, error }) => {
                            warn!(strategy = %self.name, %activity_id, %error, "component fault reported to strategy");
                        }
                    }
                }
            }
        }
        self.stats.write().stopped = true;
    }

    fn reached_repeat_limit(&self) -> bool {
        match self.config.max_repeats {
            Some(limit) => self.stats.read().runs_completed >= limit,
            None => false,
        }
    }

    async fn run_one_tick(&mut self) {
        let Some(body) = self.body.clone() else {
            return;
        };

        let outcome = body.run_once().await;
        {
            let mut stats = self.stats.write();
            stats.runs_completed += 1;
            match outcome {
                ActivityOutcome::Succeeded => stats.consecutive_failures = 0,
                ActivityOutcome::Failed | ActivityOutcome::Aborted => {
                    stats.consecutive_failures += 1;
                }
            }
        }

        if self.stats.read().consecutive_failures >= self.config.max_consecutive_failures {
            warn!(strategy = %self.name, "strategy halting after too many consecutive failures");
            let _ = self.tx.send(WorkItem::Stop).await;
            return;
        }

        if self.stats.read().consecutive_failures > 0 {
            let backoff = self.backoff_for(self.stats.read().consecutive_failures);
            debug!(strategy = %self.name, ?backoff, "backing off before next run");
            sleep(backoff).await;
        }

        if !self.reached_repeat_limit() {
            let _ = self.tx.send(WorkItem::Tick).await;
        }
    }

    /// Exponential back-off, doubling per consecutive failure and clamped
    /// to `max_backoff`.
    fn backoff_for(&self, consecutive_failures: u32) -> Duration {
        let scale = 1u32.checked_shl(consecutive_failures.saturating_sub(1)).unwrap_or(u32::MAX);
        let candidate = self.config.initial_backoff.saturating_mul(scale);
        candidate.min(self.config.max_backoff)
    }
}
