//! Run command - bring up the control core and serve until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use clap::ValueEnum;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

use sonata_core::activity::{
    ActivityStrategyActor, ObsActConfig, ObsActStrategy, StrategyConfig, TargetSelectionMode, TargetValidationMode,
    TuningPlanStrategy,
};
use sonata_core::app::{App, AppConfig};
use sonata_core::model::frequency::ObsRange;
use sonata_core::model::operations::Operations;
use sonata_core::scheduler::{QueuedStrategy, StrategyRegistry};
use sonata_core::selector::{OrderedTargetSelector, SelectorConstraints};

use crate::config_path::config_file_path;
use crate::error::CliError;

/// Selector modes exposed on the command line, mirroring
/// [`TargetSelectionMode`] without requiring `clap` to depend on
/// `sonata-core`'s enum directly.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum SelectionModeArg {
    User,
    SemiAuto,
    Auto,
    AutoRise,
    Commensal,
}

impl From<SelectionModeArg> for TargetSelectionMode {
    fn from(value: SelectionModeArg) -> Self {
        match value {
            SelectionModeArg::User => TargetSelectionMode::User,
            SelectionModeArg::SemiAuto => TargetSelectionMode::SemiAuto,
            SelectionModeArg::Auto => TargetSelectionMode::Auto,
            SelectionModeArg::AutoRise => TargetSelectionMode::AutoRise,
            SelectionModeArg::Commensal => TargetSelectionMode::Commensal,
        }
    }
}

pub struct RunArgs {
    pub config: Option<PathBuf>,

    /// If given, one strategy is enqueued at startup under this name.
    pub strategy_name: Option<String>,
    pub activity_type: String,
    pub beams: Vec<String>,
    pub selection_mode: SelectionModeArg,
    pub target_id: Option<i64>,
    pub range_low_mhz: f64,
    pub range_high_mhz: f64,
    pub bandwidth_mhz: f64,
    pub warn_only_target_validation: bool,
}

pub fn run(args: RunArgs) -> Result<(), CliError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Io(e.to_string()))?;
    runtime.block_on(run_async(args))
}

async fn run_async(args: RunArgs) -> Result<(), CliError> {
    let config_path = args.config.clone().unwrap_or_else(config_file_path);
    let config = AppConfig::load(&config_path)?;

    let _log_guard = sonata_core::fs_layout::init_logging(&sonata_core::fs_layout::ArchiveLayout::new(&config.archive.root))?;

    let app = App::bootstrap(config, StrategyRegistry::new(), std::collections::HashMap::new())?;

    if let Some(name) = args.strategy_name.clone() {
        let obs_config = ObsActConfig {
            activity_type: args.activity_type.clone(),
            strategy_name: name.clone(),
            operations: Operations::USE_DX | Operations::USE_TSCOPE | Operations::POINT_AT_TARGETS,
            beam_names: args.beams.clone(),
            selection_mode: args.selection_mode.into(),
            tuning_plan: TuningPlanStrategy::RangeCenter {
                range: ObsRange::new(args.range_low_mhz, args.range_high_mhz),
                bandwidth_mhz: args.bandwidth_mhz,
            },
            user_target_id: args.target_id,
            commensal_cal: None,
            target_validation: if args.warn_only_target_validation {
                TargetValidationMode::WarnOnly
            } else {
                TargetValidationMode::Enforce
            },
        };
        let selector = Arc::new(OrderedTargetSelector::new(SelectorConstraints::default()));
        let catalog = Arc::new(RwLock::new(Vec::new()));
        let body = Arc::new(ObsActStrategy::new(obs_config, app.activity_ids.clone(), selector, catalog));
        let actor = ActivityStrategyActor::new(name.clone(), body, StrategyConfig::default());
        app.scheduler.enqueue(QueuedStrategy { strategy_name: name, actor });
    }

    info!("sonatad starting");
    let shutdown = CancellationToken::new();
    let shutdown_for_signal = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received interrupt, shutting down");
        shutdown_for_signal.cancel();
    });

    app.run(shutdown).await;
    info!("sonatad stopped");
    Ok(())
}
