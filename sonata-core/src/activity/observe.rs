//! `ObserveActivity`: the ten-state machine one data-collection activity
//! runs through from target selection to archiving (spec §4.6, C7).
//!
//! Each state transition may fan out commands to several components at
//! once (e.g. tuning every detector); a watchdog deadline is armed per
//! fan-out so a single unresponsive component degrades to a fault instead
//! of hanging the activity forever.

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::model::activity_id::ActivityId;
use crate::model::activity_record::ActivityRecord;
use crate::proxy::ComponentError;

/// The ten states an activity passes through. Numbered per spec §4.6 so
/// log lines and the status snapshot can report a stable ordinal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObserveState {
    /// 1. Record allocated, nothing selected yet.
    Created,
    /// 2. Target selector is choosing targets for each beam.
    SelectingTargets,
    /// 3. Tunings and frequency plan computed, not yet sent to components.
    PlanningFrequencies,
    /// 4. Tscope/IFC/DX fan-out in flight: tuning, pointing, preparing.
    SettingUpComponents,
    /// 5. Waiting for the telescope to report on-source.
    WaitingOnSource,
    /// 6. Detectors are collecting data.
    DataCollection,
    /// 7. Collection window elapsed; waiting for final detector reports.
    DataCollectionComplete,
    /// 8. Detections received; building the obs summary.
    SignalDetection,
    /// 9. Secondary candidates require source-confirmation re-observation
    ///    before being handed to follow-up (spec §4.6.6). Skipped unless
    ///    `Operations::needs_secondary_candidate_processing()`.
    SecondaryCandidateProcessing,
    /// 10. Archiving data and releasing components; terminal prior to
    ///     deferred self-destruction.
    Archiving,
    /// Terminal: activity is done and is waiting to be reaped.
    Completed,
    /// Terminal: activity failed and will not retry.
    Failed,
}

impl ObserveState {
    /// True once the activity will not emit any further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, ObserveState::Completed | ObserveState::Failed)
    }

    /// Valid forward transitions (spec §4.6). `SecondaryCandidateProcessing`
    /// is conditionally skipped by [`ObserveActivity::advance`], not by this
    /// table, since whether it applies depends on the activity's operations.
    fn can_transition_to(self, next: ObserveState) -> bool {
        use ObserveState::*;
        matches!(
            (self, next),
            (Created, SelectingTargets)
                | (SelectingTargets, PlanningFrequencies)
                | (SelectingTargets, Failed)
                | (PlanningFrequencies, SettingUpComponents)
                | (PlanningFrequencies, Failed)
                | (SettingUpComponents, WaitingOnSource)
                | (SettingUpComponents, Failed)
                | (WaitingOnSource, DataCollection)
                | (WaitingOnSource, Failed)
                | (DataCollection, DataCollectionComplete)
                | (DataCollection, Failed)
                | (DataCollectionComplete, SignalDetection)
                | (SignalDetection, SecondaryCandidateProcessing)
                | (SignalDetection, Archiving)
                | (SecondaryCandidateProcessing, Archiving)
                | (Archiving, Completed)
                | (Archiving, Failed)
        )
    }
}

/// A fan-out in progress: the full set of components an activity started
/// waiting on, which of them are still outstanding, and the deadline by
/// which they must all respond (spec §4.6, "watchdog").
#[derive(Debug)]
struct Watchdog {
    fanout: HashSet<String>,
    awaiting: HashSet<String>,
    deadline: Instant,
}

impl Watchdog {
    fn new(components: impl IntoIterator<Item = String>, timeout: Duration) -> Self {
        let fanout: HashSet<String> = components.into_iter().collect();
        Self {
            awaiting: fanout.clone(),
            fanout,
            deadline: Instant::now() + timeout,
        }
    }

    fn acknowledge(&mut self, component: &str) {
        self.awaiting.remove(component);
    }

    fn is_satisfied(&self) -> bool {
        self.awaiting.is_empty()
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    /// Components from the original fan-out that acknowledged before
    /// expiry.
    fn survivors(&self) -> Vec<String> {
        self.fanout.difference(&self.awaiting).cloned().collect()
    }

    fn stragglers(&self) -> Vec<String> {
        self.awaiting.iter().cloned().collect()
    }
}

/// How a fan-out watchdog resolved once checked against the clock (spec
/// §4.6.3, §8 boundary behaviors).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchdogOutcome {
    /// No watchdog armed, or every component already acknowledged.
    Satisfied,
    /// Not yet due.
    Pending,
    /// At least one component acknowledged before the deadline; the
    /// stragglers are to be evicted (`stop`/`shutdown`/`resetSocket`) and
    /// the activity continues with the survivors.
    PartialSurvivors { survivors: Vec<String>, stragglers: Vec<String> },
}

/// Errors raised by an invalid or timed-out activity state transition.
#[derive(Debug, thiserror::Error)]
pub enum ObserveActivityError {
    #[error("activity {activity_id}: cannot transition from {from:?} to {to:?}")]
    InvalidTransition {
        activity_id: ActivityId,
        from: ObserveState,
        to: ObserveState,
    },

    #[error("activity {activity_id}: watchdog expired with zero survivors waiting on {remaining:?} in state {state:?}")]
    WatchdogTimeout {
        activity_id: ActivityId,
        state: ObserveState,
        remaining: Vec<String>,
    },

    #[error("activity {activity_id}: component fault during {state:?}: {source}")]
    ComponentFault {
        activity_id: ActivityId,
        state: ObserveState,
        #[source]
        source: ComponentError,
    },
}

/// One running (or completed) data-collection activity.
pub struct ObserveActivity {
    pub record: ActivityRecord,
    state: ObserveState,
    watchdog: Option<Watchdog>,
    /// Set once the activity reaches a terminal state; the owning strategy
    /// defers dropping this activity until disk-safety confirms its data
    /// has been durably archived (spec §4.6.10, "deferred self-destruction").
    safe_to_destroy: bool,
}

/// Default time an activity will wait for every component in a fan-out to
/// acknowledge before treating the stragglers as faulted.
pub const DEFAULT_WATCHDOG_TIMEOUT: Duration = Duration::from_secs(30);

impl ObserveActivity {
    pub fn new(record: ActivityRecord) -> Self {
        Self {
            record,
            state: ObserveState::Created,
            watchdog: None,
            safe_to_destroy: false,
        }
    }

    pub fn state(&self) -> ObserveState {
        self.state
    }

    pub fn activity_id(&self) -> ActivityId {
        self.record.activity_id
    }

    /// True once the activity has both reached a terminal state and been
    /// confirmed safe to drop.
    pub fn is_destroyable(&self) -> bool {
        self.state.is_terminal() && self.safe_to_destroy
    }

    /// Confirms disk-archiving has durably committed this activity's data,
    /// releasing it for destruction.
    pub fn confirm_disk_safety(&mut self) {
        self.safe_to_destroy = true;
    }

    /// Advances to `next`, skipping `SecondaryCandidateProcessing` when the
    /// activity's operations don't call for it.
    pub fn advance(&mut self, next: ObserveState) -> Result<(), ObserveActivityError> {
        let next = if next == ObserveState::SecondaryCandidateProcessing
            && !self.record.operations.needs_secondary_candidate_processing()
        {
            ObserveState::Archiving
        } else {
            next
        };

        if !self.state.can_transition_to(next) {
            return Err(ObserveActivityError::InvalidTransition {
                activity_id: self.activity_id(),
                from: self.state,
                to: next,
            });
        }
        info!(activity_id = %self.activity_id(), from = ?self.state, to = ?next, "activity state transition");
        self.state = next;
        self.watchdog = None;
        Ok(())
    }

    /// Arms a fan-out watchdog for the current state, awaiting a response
    /// from every name in `components`.
    pub fn arm_watchdog(&mut self, components: impl IntoIterator<Item = String>, timeout: Duration) {
        self.watchdog = Some(Watchdog::new(components, timeout));
    }

    /// Records that `component` acknowledged the current fan-out. Returns
    /// true once every awaited component has acknowledged.
    pub fn acknowledge(&mut self, component: &str) -> bool {
        match self.watchdog.as_mut() {
            Some(w) => {
                w.acknowledge(component);
                w.is_satisfied()
            }
            None => true,
        }
    }

    /// Checks the current watchdog against `now`. A fan-out that times out
    /// with at least one survivor does not fail the activity (spec §4.6.3,
    /// §8): the stragglers are reported for eviction and the caller
    /// continues with whoever responded. Only a zero-survivor expiry fails
    /// the activity outright.
    pub fn check_watchdog(&mut self, now: Instant) -> Result<WatchdogOutcome, ObserveActivityError> {
        let Some(watchdog) = self.watchdog.as_ref() else {
            return Ok(WatchdogOutcome::Satisfied);
        };
        if watchdog.is_satisfied() {
            self.watchdog = None;
            return Ok(WatchdogOutcome::Satisfied);
        }
        if !watchdog.is_expired(now) {
            return Ok(WatchdogOutcome::Pending);
        }

        let stragglers = watchdog.stragglers();
        let survivors = watchdog.survivors();
        let state = self.state;
        self.watchdog = None;

        if survivors.is_empty() {
            warn!(activity_id = %self.activity_id(), ?state, ?stragglers, "watchdog expired with zero survivors");
            self.state = ObserveState::Failed;
            return Err(ObserveActivityError::WatchdogTimeout {
                activity_id: self.activity_id(),
                state,
                remaining: stragglers,
            });
        }

        warn!(activity_id = %self.activity_id(), ?state, ?survivors, ?stragglers, "watchdog expired, continuing with survivors");
        Ok(WatchdogOutcome::PartialSurvivors { survivors, stragglers })
    }

    /// Fails the activity immediately in response to a component fault,
    /// regardless of the current watchdog.
    pub fn fail_on_component_fault(&mut self, error: ComponentError) -> ObserveActivityError {
        let state = self.state;
        self.state = ObserveState::Failed;
        self.watchdog = None;
        ObserveActivityError::ComponentFault {
            activity_id: self.activity_id(),
            state,
            source: error,
        }
    }
}
