//! The archive filesystem layout and the logging/status-snapshot plumbing
//! that writes into it (spec §6).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::EnvFilter;

/// Env var bounding the rotating debug log's file size, in megabytes.
pub const MAX_FILESIZE_ENV_VAR: &str = "SSE_DEBUG_LOG_MAX_FILESIZE_MEGABYTES";

/// Default rotating debug log size, used when the env var is unset.
pub const DEFAULT_MAX_FILESIZE_MB: f64 = 25.0;

/// Accepted range for [`MAX_FILESIZE_ENV_VAR`], in megabytes.
pub const MIN_MAX_FILESIZE_MB: f64 = 0.010;
pub const MAX_MAX_FILESIZE_MB: f64 = 500.0;

/// The archive's fixed subdirectory layout, created under one root.
#[derive(Clone, Debug)]
pub struct ArchiveLayout {
    pub root: PathBuf,
}

impl ArchiveLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn templogs(&self) -> PathBuf {
        self.root.join("templogs")
    }

    pub fn permlogs(&self) -> PathBuf {
        self.root.join("permlogs")
    }

    pub fn systemlogs(&self) -> PathBuf {
        self.root.join("systemlogs")
    }

    pub fn errorlogs(&self) -> PathBuf {
        self.root.join("errorlogs")
    }

    pub fn system(&self) -> PathBuf {
        self.root.join("system")
    }

    pub fn confirmdata(&self) -> PathBuf {
        self.root.join("confirmdata")
    }

    /// Creates every subdirectory, idempotently.
    pub fn ensure_created(&self) -> io::Result<()> {
        for dir in [
            self.templogs(),
            self.permlogs(),
            self.systemlogs(),
            self.errorlogs(),
            self.system(),
            self.confirmdata(),
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// Reads and clamps [`MAX_FILESIZE_ENV_VAR`], falling back to
/// [`DEFAULT_MAX_FILESIZE_MB`] when unset or unparsable.
pub fn configured_max_filesize_mb() -> f64 {
    std::env::var(MAX_FILESIZE_ENV_VAR)
        .ok()
        .and_then(|raw| raw.parse::<f64>().ok())
        .map(|mb| mb.clamp(MIN_MAX_FILESIZE_MB, MAX_MAX_FILESIZE_MB))
        .unwrap_or(DEFAULT_MAX_FILESIZE_MB)
}

/// Installs a `tracing` subscriber writing to a daily-rotating file under
/// `layout.systemlogs()`, plus `RUST_LOG`-driven filtering. Returns the
/// guard that must be kept alive for the life of the process so buffered
/// log lines are flushed on shutdown.
pub fn init_logging(layout: &ArchiveLayout) -> io::Result<WorkerGuard> {
    layout.ensure_created()?;
    let file_appender = rolling::daily(layout.systemlogs(), "sonata-core.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    Ok(guard)
}

/// Atomically writes `contents` to `path` by writing to a sibling temp file
/// and renaming over the target, so a reader never observes a half-written
/// status snapshot (spec §4.4, §6).
pub fn write_status_snapshot_atomic(path: &Path, contents: &str) -> io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_created_makes_every_subdirectory() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArchiveLayout::new(dir.path());
        layout.ensure_created().unwrap();
        assert!(layout.templogs().is_dir());
        assert!(layout.confirmdata().is_dir());
    }

    #[test]
    fn filesize_env_var_is_clamped() {
        std::env::set_var(MAX_FILESIZE_ENV_VAR, "10000");
        assert_eq!(configured_max_filesize_mb(), MAX_MAX_FILESIZE_MB);
        std::env::set_var(MAX_FILESIZE_ENV_VAR, "0.0001");
        assert_eq!(configured_max_filesize_mb(), MIN_MAX_FILESIZE_MB);
        std::env::remove_var(MAX_FILESIZE_ENV_VAR);
        assert_eq!(configured_max_filesize_mb(), DEFAULT_MAX_FILESIZE_MB);
    }

    #[test]
    fn status_snapshot_write_is_atomic_and_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.txt");
        write_status_snapshot_atomic(&path, "all quiet\n").unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "all quiet\n");
        assert!(!path.with_extension("tmp").exists());
    }
}
