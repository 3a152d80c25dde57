//! The activity record: the aggregate state an
//! [`ObserveActivity`](crate::activity::observe::ObserveActivity) accumulates
//! as it runs, and what gets handed to persistence and the status snapshot.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::activity_id::ActivityId;
use super::frequency::{DxFrequency, Tuning};
use super::operations::Operations;

/// Summary statistics recorded once an activity finishes collecting data.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObsSummary {
    pub signals_detected: u32,
    pub candidates_found: u32,
    pub followup_candidates_found: u32,
    pub confirmed_candidates_found: u32,
}

/// A point on the sky the primary beam was pointed at.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PrimaryPointing {
    pub ra_rads: f64,
    pub dec_rads: f64,
}

/// The full state of one activity, as it exists mid-run or at completion.
///
/// Field population follows the 10-state machine of spec §4.6: most fields
/// start empty/default and are filled in as the activity progresses through
/// target selection, tuning, and pointing.
#[derive(Clone, Debug)]
pub struct ActivityRecord {
    pub activity_id: ActivityId,
    pub activity_type: String,
    /// Name of the strategy that created this activity, for follow-up and
    /// status reporting back-reference.
    pub strategy_name: String,
    pub operations: Operations,
    pub dx_operations: Operations,
    /// Target ids selected for each beam name.
    pub selected_targets: HashMap<String, i64>,
    pub primary_pointing: Option<PrimaryPointing>,
    /// Tunings assigned to this activity, keyed by tuning name.
    pub tunings: HashMap<String, Tuning>,
    /// Per-detector frequency assignment, keyed by detector name.
    pub dx_frequencies: HashMap<String, DxFrequency>,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub obs_summary: ObsSummary,
    /// Human-readable status line written into the disk status snapshot.
    pub disk_status_message: String,
}

impl ActivityRecord {
    /// Creates a freshly allocated record with no targets, tunings, or
    /// pointing assigned yet.
    pub fn new(activity_id: ActivityId, activity_type: impl Into<String>, strategy_name: impl Into<String>, operations: Operations) -> Self {
        Self {
            activity_id,
            activity_type: activity_type.into(),
            strategy_name: strategy_name.into(),
            operations: operations.normalized(),
            dx_operations: Operations::empty(),
            selected_targets: HashMap::new(),
            primary_pointing: None,
            tunings: HashMap::new(),
            dx_frequencies: HashMap::new(),
            scheduled_start: None,
            obs_summary: ObsSummary::default(),
            disk_status_message: String::new(),
        }
    }

    /// True once at least one target has been selected for every beam the
    /// activity's operations imply are in use.
    pub fn has_targets(&self) -> bool {
        !self.selected_targets.is_empty()
    }

    /// Renders the one-line status text used by the disk status snapshot
    /// (spec §4.4, §6).
    pub fn render_status_line(&self) -> String {
        format!(
            "activity {} [{}] strategy={} targets={} detections={}",
            self.activity_id,
            self.activity_type,
            self.strategy_name,
            self.selected_targets.len(),
            self.obs_summary.signals_detected,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_starts_with_no_targets() {
        let record = ActivityRecord::new(ActivityId::new(1), "target-obs", "strategy-1", Operations::USE_DX);
        assert!(!record.has_targets());
        assert!(record.primary_pointing.is_none());
    }

    #[test]
    fn new_record_normalizes_operations() {
        let record = ActivityRecord::new(ActivityId::new(1), "rf-tune-obs", "strategy-1", Operations::RF_TUNE);
        assert!(record.operations.contains(Operations::USE_IFC));
    }

    #[test]
    fn status_line_reflects_target_and_detection_counts() {
        let mut record = ActivityRecord::new(ActivityId::new(7), "target-obs", "strategy-1", Operations::USE_DX);
        record.selected_targets.insert("beam1".to_string(), 42);
        record.obs_summary.signals_detected = 3;
        let line = record.render_status_line();
        assert!(line.contains("activity 7"));
        assert!(line.contains("targets=1"));
        assert!(line.contains("detections=3"));
    }
}
