//! Activity strategies and the observation state machine.

pub mod error;
pub mod obs_act_strategy;
pub mod observe;
pub mod strategy;
pub mod work_item;

pub use error::ActivityError;
pub use obs_act_strategy::{
    CommensalCalConfig, ObsActConfig, ObsActStrategy, TargetSelectionMode, TargetValidationMode, TuningPlanStrategy,
};
pub use observe::{ObserveActivity, ObserveActivityError, ObserveState, WatchdogOutcome, DEFAULT_WATCHDOG_TIMEOUT};
pub use strategy::{ActivityStrategyActor, StrategyBody, StrategyConfig, StrategyStats};
pub use work_item::{ActivityOutcome, WorkItem};
