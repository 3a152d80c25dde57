//! Status command - print the facility's last-written status snapshot.

use sonata_core::app::AppConfig;
use sonata_core::fs_layout::ArchiveLayout;

use crate::config_path::config_file_path;
use crate::error::CliError;

pub struct StatusArgs {
    pub config: Option<std::path::PathBuf>,
}

pub fn run(args: StatusArgs) -> Result<(), CliError> {
    let path = args.config.unwrap_or_else(config_file_path);
    let config = AppConfig::load(&path)?;
    let layout = ArchiveLayout::new(&config.archive.root);
    let snapshot_path = layout.system().join("status.txt");

    match std::fs::read_to_string(&snapshot_path) {
        Ok(contents) => {
            print!("{}", contents);
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            println!("no status snapshot at {} (is the daemon running?)", snapshot_path.display());
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
