//! Core data model: identifiers, the operations bitset, frequency plans,
//! targets, the expected-components tree, and the activity record.

pub mod activity_id;
pub mod activity_record;
pub mod components_tree;
pub mod frequency;
pub mod operations;
pub mod target;

pub use activity_id::{ActivityId, ActivityIdError, ActivityIdSource, DbCounter, FileCounter, NO_ACTIVITY_ID};
pub use activity_record::{ActivityRecord, ObsSummary, PrimaryPointing};
pub use components_tree::{BeamNode, ComponentsTreeError, ExpectedComponentsTree, IfcNode, SiteNode};
pub use frequency::{DxFrequency, FrequencyError, ObsRange, Tuning, UNUSED_SKY_FREQ_MHZ};
pub use operations::Operations;
pub use target::{
    distance_light_years, is_available, remaining_uptime_secs, ApparentPosition, AvoidanceBodies,
    LinearPrecessionResolver, NoAvoidanceBodies, PositionResolver, SiteLocation, Target,
};
