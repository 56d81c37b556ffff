use std::path::PathBuf;
use tagscope_core::DbLayout;
use tracing::info;

pub fn run(dir: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let layout = DbLayout::new(dir);
    info!("Clearing tag tables in: {}...", layout.dir().display());
    let removed = layout.remove_all()?;
    info!("Removed {} table files.", removed);
    Ok(())
}
