//! Application configuration: an ini-format file on disk, with environment
//! overrides for the handful of settings operators commonly need to flip
//! per deployment (spec §6, ambient configuration).

use std::path::{Path, PathBuf};

use ini::Ini;

use super::error::AppError;

/// Top-level configuration combining every subsystem's settings, a single
/// `AppConfig` passed to application startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub archive: ArchiveConfig,
    pub network: NetworkConfig,
    pub scheduler: SchedulerConfig,
}

/// Filesystem locations the archive layer writes into.
#[derive(Clone, Debug)]
pub struct ArchiveConfig {
    pub root: PathBuf,
    pub activity_id_counter_file: PathBuf,
    pub expected_components_manifest: PathBuf,
}

/// Listen addresses for each component class's acceptor.
#[derive(Clone, Debug)]
pub struct NetworkConfig {
    pub tscope_bind_addr: String,
    pub ifc_bind_addr: String,
    pub dx_bind_addr: String,
}

/// Scheduler-wide policy knobs.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    pub stop_on_strategy_failure: bool,
    pub status_snapshot_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            stop_on_strategy_failure: false,
            status_snapshot_interval_secs: 30,
        }
    }
}

impl AppConfig {
    /// Loads configuration from an ini file at `path`, falling back to
    /// built-in defaults for any section or key not present.
    ///
    /// Recognized sections: `[archive]`, `[network]`, `[scheduler]`.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let ini = Ini::load_from_file(path)
            .map_err(|e| AppError::Config(format!("failed to read {}: {}", path.display(), e)))?;

        let archive_section = ini.section(Some("archive"));
        let archive_root = archive_section
            .and_then(|s| s.get("root"))
            .map(PathBuf::from)
            .ok_or_else(|| AppError::Config("missing required key archive.root".to_string()))?;

        let archive = ArchiveConfig {
            activity_id_counter_file: archive_section
                .and_then(|s| s.get("activity_id_counter_file"))
                .map(PathBuf::from)
                .unwrap_or_else(|| archive_root.join("system").join("activity_id.counter")),
            expected_components_manifest: archive_section
                .and_then(|s| s.get("expected_components_manifest"))
                .map(PathBuf::from)
                .unwrap_or_else(|| archive_root.join("system").join("expected_components.txt")),
            root: archive_root,
        };

        let network_section = ini.section(Some("network"));
        let network = NetworkConfig {
            tscope_bind_addr: network_section
                .and_then(|s| s.get("tscope_bind_addr"))
                .unwrap_or("0.0.0.0:10000")
                .to_string(),
            ifc_bind_addr: network_section
                .and_then(|s| s.get("ifc_bind_addr"))
                .unwrap_or("0.0.0.0:20000")
                .to_string(),
            dx_bind_addr: network_section
                .and_then(|s| s.get("dx_bind_addr"))
                .unwrap_or("0.0.0.0:30000")
                .to_string(),
        };

        let scheduler_section = ini.section(Some("scheduler"));
        let defaults = SchedulerConfig::default();
        let scheduler = SchedulerConfig {
            stop_on_strategy_failure: scheduler_section
                .and_then(|s| s.get("stop_on_strategy_failure"))
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.stop_on_strategy_failure),
            status_snapshot_interval_secs: scheduler_section
                .and_then(|s| s.get("status_snapshot_interval_secs"))
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.status_snapshot_interval_secs),
        };

        Ok(Self { archive, network, scheduler })
    }
}
