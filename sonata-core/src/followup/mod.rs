//! `FollowupEngine`: queues candidates for re-observation by a
//! closed activity-type successor map (spec §4.8, C9).

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::info;

use crate::model::activity_id::ActivityId;

/// Errors raised while building or using a [`FollowupEngine`].
#[derive(Debug, Error, PartialEq)]
pub enum FollowupError {
    #[error("activity type '{0}' has no registered follow-up successor")]
    NoSuccessor(String),

    #[error("successor map references unknown activity type '{0}' as its own successor target")]
    DanglingSuccessor(String),
}

/// A candidate awaiting follow-up re-observation.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingFollowup {
    pub originating_activity: ActivityId,
    pub target_id: i64,
    pub successor_activity_type: String,
}

/// Maps an activity type to the activity type that re-observes its
/// confirmed candidates, and holds the FIFO of candidates awaiting that
/// re-observation.
///
/// The map is validated as closed at construction time: every successor
/// named must itself be a known activity type (spec §4.8, "startup closure
/// validation").
#[derive(Debug)]
pub struct FollowupEngine {
    successor_of: HashMap<String, String>,
    pending: Mutex<VecDeque<PendingFollowup>>,
}

impl FollowupEngine {
    /// Builds an engine from an explicit `activityType -> successorType`
    /// map, rejecting one that is not closed over its own keys.
    pub fn new(successor_of: HashMap<String, String>) -> Result<Self, FollowupError> {
        for successor in successor_of.values() {
            if !successor_of.contains_key(successor.as_str()) {
                return Err(FollowupError::DanglingSuccessor(successor.clone()));
            }
        }
        Ok(Self {
            successor_of,
            pending: Mutex::new(VecDeque::new()),
        })
    }

    /// Queues a confirmed candidate for follow-up, looking up its
    /// successor activity type.
    pub fn enqueue(&self, activity_type: &str, originating_activity: ActivityId, target_id: i64) -> Result<(), FollowupError> {
        let successor = self
            .successor_of
            .get(activity_type)
            .cloned()
            .ok_or_else(|| FollowupError::NoSuccessor(activity_type.to_string()))?;
        info!(%originating_activity, target_id, successor_activity_type = %successor, "queued candidate for follow-up");
        self.pending.lock().push_back(PendingFollowup {
            originating_activity,
            target_id,
            successor_activity_type: successor,
        });
        Ok(())
    }

    /// Pops the next pending follow-up, FIFO.
    pub fn next_pending(&self) -> Option<PendingFollowup> {
        self.pending.lock().pop_front()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn successor_type_for(&self, activity_type: &str) -> Option<&str> {
        self.successor_of.get(activity_type).map(String::as_str)
    }
}
