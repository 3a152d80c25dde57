//! Resolves the default location of the facility's ini configuration file.

use std::path::PathBuf;

/// Default configuration file path: `$XDG_CONFIG_HOME/sonata/sonata.ini`
/// (or the platform equivalent via the `dirs` crate), falling back to
/// `./sonata.ini` in the working directory if no config directory can be
/// determined.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("sonata").join("sonata.ini"))
        .unwrap_or_else(|| PathBuf::from("sonata.ini"))
}
