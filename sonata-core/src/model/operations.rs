//! The operations bitset — the polymorphism mechanism for activity types.
//!
//! Activity *types* are distinguished by their initial bit pattern, not by
//! subclassing (see spec §3, §9 "Dynamic dispatch of activity types").

use bitflags::bitflags;

bitflags! {
    /// Independent boolean feature flags describing what an activity must do.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Hash)]
    pub struct Operations: u64 {
        /// Fire up the test-signal generator for this activity.
        const TEST_SIGNAL_GEN = 1 << 0;
        /// Use the telescope array controller.
        const USE_TSCOPE = 1 << 1;
        /// Retune the IF chains. Implies [`Operations::USE_IFC`].
        const RF_TUNE = 1 << 2;
        /// Use the IF-chain signal conditioners.
        const USE_IFC = 1 << 3;
        /// Use the detector (DX) fleet.
        const USE_DX = 1 << 4;
        /// Point the telescope at the selected targets.
        const POINT_AT_TARGETS = 1 << 5;
        /// Run the commensal calibration sequence.
        const CALIBRATE = 1 << 6;
        /// This activity is itself a follow-up re-observation.
        const FOLLOW_UP_OBSERVATION = 1 << 7;
        /// This is an ON-source observation.
        const ON_OBSERVATION = 1 << 8;
        /// This is an OFF-source observation.
        const OFF_OBSERVATION = 1 << 9;
        /// Classify every detection on this activity as RFI.
        const CLASSIFY_ALL_AS_RFI_SCAN = 1 << 10;
        /// Persist a recent-RFI mask built from this activity's detections.
        const CREATE_RECENT_RFI_MASK = 1 << 11;
        /// Observe more than one target simultaneously across beams.
        const MULTITARGET_OBSERVATION = 1 << 12;
        /// Force archiving of data centered on the primary beam center.
        const FORCE_ARCHIVING_AROUND_CENTER = 1 << 13;
        /// Suppress reporting of confirmed candidates to the follow-up engine.
        const DO_NOT_REPORT_CONFIRMED_CANDIDATES = 1 << 14;
        /// Let the telescope controller auto-select antennas.
        const AUTOSELECT_ANTS = 1 << 15;
        /// Prepare (but do not point) antennas.
        const PREPARE_ANTS = 1 << 16;
        /// Release previously prepared antennas.
        const FREE_ANTS = 1 << 17;
        /// Reset the beamformer before use.
        const BEAMFORMER_RESET = 1 << 18;
        /// Initialize the beamformer before use.
        const BEAMFORMER_INIT = 1 << 19;
        /// Run beamformer auto-attenuation before use.
        const BEAMFORMER_AUTOATTEN = 1 << 20;
        /// Point antennas and wait for on-target confirmation before proceeding.
        const POINT_ANTS_AND_WAIT = 1 << 21;
        /// Grid observation centered on target.
        const GRID_ON_OBSERVATION = 1 << 22;
        /// Grid observation offset north of target.
        const GRID_NORTH_OBSERVATION = 1 << 23;
        /// Grid observation offset south of target.
        const GRID_SOUTH_OBSERVATION = 1 << 24;
        /// Grid observation offset east of target.
        const GRID_EAST_OBSERVATION = 1 << 25;
        /// Grid observation offset west of target.
        const GRID_WEST_OBSERVATION = 1 << 26;
    }
}

impl Operations {
    /// Normalizes implied bits: setting [`Operations::RF_TUNE`] implies
    /// [`Operations::USE_IFC`] (spec §3).
    pub fn normalized(self) -> Self {
        if self.contains(Operations::RF_TUNE) {
            self | Operations::USE_IFC
        } else {
            self
        }
    }

    /// True if this activity performs data collection that needs detectors.
    pub fn uses_detectors(self) -> bool {
        self.contains(Operations::USE_DX)
    }

    /// True if secondary candidate processing states 9–10 apply (spec §4.6.6).
    pub fn needs_secondary_candidate_processing(self) -> bool {
        self.intersects(
            Operations::MULTITARGET_OBSERVATION | Operations::FORCE_ARCHIVING_AROUND_CENTER,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rf_tune_implies_use_ifc() {
        let ops = Operations::RF_TUNE.normalized();
        assert!(ops.contains(Operations::USE_IFC));
        assert!(ops.contains(Operations::RF_TUNE));
    }

    #[test]
    fn normalized_is_noop_without_rf_tune() {
        let ops = Operations::USE_DX.normalized();
        assert_eq!(ops, Operations::USE_DX);
    }

    #[test]
    fn secondary_candidate_processing_gate() {
        assert!(Operations::MULTITARGET_OBSERVATION.needs_secondary_candidate_processing());
        assert!(Operations::FORCE_ARCHIVING_AROUND_CENTER.needs_secondary_candidate_processing());
        assert!(!Operations::USE_DX.needs_secondary_candidate_processing());
    }

    #[test]
    fn bitset_composition() {
        let ops = Operations::USE_TSCOPE | Operations::USE_DX | Operations::POINT_AT_TARGETS;
        assert!(ops.contains(Operations::USE_TSCOPE));
        assert!(!ops.contains(Operations::CALIBRATE));
    }
}
