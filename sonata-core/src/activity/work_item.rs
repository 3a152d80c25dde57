//! The message type driving an [`ActivityStrategyActor`](super::strategy::ActivityStrategyActor)'s
//! single-consumer work queue (spec §4.5, "ActivityStrategy").

use crate::model::activity_id::ActivityId;
use crate::proxy::ComponentError;

/// One unit of work delivered to a strategy actor. Every state change in
/// the strategy and its child activities flows through this queue, so the
/// actor never needs internal locking.
#[derive(Debug)]
pub enum WorkItem {
    /// Drive the strategy forward one step (spawn the next activity, check
    /// back-off timers, etc).
    Tick,
    /// An activity the strategy owns finished, successfully or not.
    ActivityDone {
        activity_id: ActivityId,
        outcome: ActivityOutcome,
    },
    /// A component reported an error affecting one of the strategy's
    /// activities.
    ComponentFault {
        activity_id: ActivityId,
        error: ComponentError,
    },
    /// Request the strategy stop after its current activity (if any)
    /// completes.
    Stop,
}

/// How an activity finished, used to drive the strategy's repeat/back-off
/// bookkeeping (spec §4.5).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActivityOutcome {
    Succeeded,
    Failed,
    Aborted,
}
