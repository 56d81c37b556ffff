use std::io::Write;
use std::path::PathBuf;
use tagscope_store::{KvStore, OpenOptions, ScanSpec};

fn escape(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).escape_debug().to_string()
}

pub fn run(file: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let store = KvStore::open(&file, OpenOptions::read_only())?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for entry in store.scan(ScanSpec::all().raw())? {
        let entry = entry?;
        writeln!(out, "{}\t{}", escape(&entry.key), escape(&entry.value))?;
    }
    Ok(())
}
