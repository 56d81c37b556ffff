use std::path::PathBuf;
use tabled::{Table, Tabled};
use tagscope_core::DbLayout;
use tagscope_core::paths::NEXTKEY;
use tagscope_core::tags::format::{OPTIONS_KEY, VERSION_KEY};
use tagscope_store::{KvStore, OpenOptions};

#[derive(Tabled)]
struct TableRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Backend")]
    backend: String,
    #[tabled(rename = "Records")]
    records: usize,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Options")]
    options: String,
    #[tabled(rename = "Next id")]
    next_id: String,
}

pub fn run(dir: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let layout = DbLayout::new(dir);
    let mut rows = Vec::new();

    for path in [layout.defs_path(), layout.refs_path(), layout.paths_path()] {
        if !path.is_file() {
            continue;
        }
        let store = KvStore::open(&path, OpenOptions::read_only())?;
        let stats = store.stats()?;
        let meta = |name: &str| -> Result<String, tagscope_store::StoreError> {
            Ok(store.get_meta(name)?.unwrap_or_else(|| "-".to_string()))
        };
        rows.push(TableRow {
            file: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            backend: stats.backend.to_string(),
            records: stats.entries,
            version: meta(VERSION_KEY)?,
            options: meta(OPTIONS_KEY)?,
            next_id: meta(NEXTKEY)?,
        });
    }

    if rows.is_empty() {
        println!("No tag tables in {}.", layout.dir().display());
    } else {
        println!("{}", Table::new(rows));
    }
    Ok(())
}
