//! Application assembly: wires configuration, persistence, the
//! expected-components tree, and the scheduler into one runnable unit
//! behind a single `bootstrap()`/`run()` entry point.

pub mod config;
pub mod error;

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

pub use config::AppConfig;
pub use error::AppError;

use crate::followup::FollowupEngine;
use crate::fs_layout::ArchiveLayout;
use crate::model::activity_id::{ActivityIdSource, FileCounter};
use crate::model::components_tree::ExpectedComponentsTree;
use crate::persistence::{InMemoryStore, Store};
use crate::scheduler::{Scheduler, StrategyRegistry};

/// The assembled application: everything the scheduler needs to run, built
/// once at startup from [`AppConfig`].
pub struct App {
    pub config: AppConfig,
    pub layout: ArchiveLayout,
    pub expected_components: Arc<ExpectedComponentsTree>,
    pub activity_ids: Arc<dyn ActivityIdSource>,
    pub store: Arc<dyn Store>,
    pub followup: Arc<FollowupEngine>,
    pub scheduler: Arc<Scheduler>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("layout", &self.layout)
            .field("expected_components", &self.expected_components)
            .field("followup", &self.followup)
            .finish_non_exhaustive()
    }
}

impl App {
    /// Builds the application from configuration, performing every startup
    /// check the original system performs before accepting connections:
    /// UTC epoch sanity, expected-components manifest parsing, and
    /// follow-up successor-map closure (spec §6).
    pub fn bootstrap(config: AppConfig, registry: StrategyRegistry, successor_of: HashMap<String, String>) -> Result<Self, AppError> {
        crate::persistence::verify_utc_epoch()?;

        let layout = ArchiveLayout::new(&config.archive.root);
        layout.ensure_created()?;

        let manifest = std::fs::read_to_string(&config.archive.expected_components_manifest)
            .map_err(|e| AppError::Config(format!("failed to read expected components manifest: {}", e)))?;
        let expected_components = Arc::new(ExpectedComponentsTree::parse(&manifest)?);

        let activity_ids: Arc<dyn ActivityIdSource> =
            Arc::new(FileCounter::open(&config.archive.activity_id_counter_file)?);

        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new(Vec::new()));

        let followup = Arc::new(FollowupEngine::new(successor_of)?);

        let scheduler = Arc::new(Scheduler::new(registry, config.scheduler.stop_on_strategy_failure));

        info!(
            archive_root = %config.archive.root.display(),
            components = expected_components.beams.len(),
            "application bootstrapped"
        );

        Ok(Self {
            config,
            layout,
            expected_components,
            activity_ids,
            store,
            followup,
            scheduler,
        })
    }

    /// Runs the scheduler and its periodic status snapshot until
    /// `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        let status_path = self.layout.system().join("status.txt");
        let snapshot_shutdown = shutdown.clone();
        let scheduler_for_snapshot = self.scheduler.clone();
        let interval = std::time::Duration::from_secs(self.config.scheduler.status_snapshot_interval_secs);

        let snapshot_task = tokio::spawn(async move {
            scheduler_for_snapshot
                .run_status_snapshot_loop(interval, snapshot_shutdown, move |status| {
                    let text = format!(
                        "active_strategy={:?} queue_depth={}\n",
                        status.active_strategy, status.queue_depth
                    );
                    let _ = crate::fs_layout::write_status_snapshot_atomic(&status_path, &text);
                })
                .await;
        });

        self.scheduler.run(shutdown).await;
        let _ = snapshot_task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config(root: &std::path::Path) -> AppConfig {
        let manifest_path = root.join("system").join("expected_components.txt");
        std::fs::create_dir_all(manifest_path.parent().unwrap()).unwrap();
        std::fs::write(
            &manifest_path,
            "sonata expected components v1.0\nsite s\nifc i s\nbeam b i\ndx dx1 b\n",
        )
        .unwrap();

        AppConfig {
            archive: config::ArchiveConfig {
                root: root.to_path_buf(),
                activity_id_counter_file: root.join("system").join("activity_id.counter"),
                expected_components_manifest: manifest_path,
            },
            network: config::NetworkConfig {
                tscope_bind_addr: "0.0.0.0:10000".to_string(),
                ifc_bind_addr: "0.0.0.0:20000".to_string(),
                dx_bind_addr: "0.0.0.0:30000".to_string(),
            },
            scheduler: config::SchedulerConfig::default(),
        }
    }

    #[test]
    fn bootstrap_succeeds_with_a_well_formed_archive() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample_config(dir.path());
        let mut successors = HashMap::new();
        successors.insert("target-obs".to_string(), "target-obs".to_string());

        let app = App::bootstrap(config, StrategyRegistry::new(), successors).unwrap();
        assert!(app.expected_components.expects("dx1"));
        assert_eq!(app.scheduler.queue_depth(), 0);
    }

    #[test]
    fn bootstrap_fails_on_malformed_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample_config(dir.path());
        std::fs::write(&config.archive.expected_components_manifest, "not a manifest\n").unwrap();

        let err = App::bootstrap(config, StrategyRegistry::new(), HashMap::new()).unwrap_err();
        assert!(matches!(err, AppError::ComponentsTree(_)));
    }
}
