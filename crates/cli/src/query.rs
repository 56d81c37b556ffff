use clap::{ArgGroup, Args};
use std::path::PathBuf;
use tabled::{Table, Tabled};
use tagscope_core::{
    BackendKind, DbLayout, FileKind, OpenMode, PathTable, ScanMode, TagEntry, TagPattern,
    TagQuery, TagSettings, TagStore, TagTable, normalize_path,
};

#[derive(Args, Debug, Clone)]
#[command(group(ArgGroup::new("table").args(["defs", "refs", "syms"])))]
#[command(group(ArgGroup::new("matching").args(["prefix", "regex"])))]
pub struct QueryArgs {
    /// Tag name, prefix or regular expression. Omit to list everything.
    #[arg(value_name = "PATTERN")]
    pub pattern: Option<String>,
    #[arg(long, value_name = "DIR")]
    pub dbpath: Option<PathBuf>,
    /// Search definitions (default)
    #[arg(long)]
    pub defs: bool,
    /// Search uses of defined names
    #[arg(long)]
    pub refs: bool,
    /// Search uses of names without a definition
    #[arg(long)]
    pub syms: bool,
    /// Treat PATTERN as a prefix
    #[arg(long)]
    pub prefix: bool,
    /// Treat PATTERN as a regular expression
    #[arg(long)]
    pub regex: bool,
    /// Order results by path and line instead of by tag
    #[arg(long)]
    pub by_path: bool,
    /// Only tags of this file
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
    /// List the registered files instead of tags
    #[arg(long, conflicts_with_all = ["pattern", "file"])]
    pub paths: bool,
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct PathRow {
    #[tabled(rename = "Id")]
    file_id: u32,
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Kind")]
    kind: String,
}

fn pattern(args: &QueryArgs) -> Result<TagPattern, regex::Error> {
    Ok(match &args.pattern {
        None => TagPattern::Any,
        Some(p) if args.regex => TagPattern::Regex(regex::bytes::Regex::new(p)?),
        Some(p) if args.prefix => TagPattern::Prefix(p.clone()),
        Some(p) => TagPattern::Exact(p.clone()),
    })
}

fn print_entries(entries: &[TagEntry]) {
    // Same layout as `global -x`: tag, line, path, source line.
    for e in entries {
        println!(
            "{:<16} {:>4} {:<16} {}",
            e.tag,
            e.line,
            e.path,
            e.image.as_deref().unwrap_or_default()
        );
    }
}

pub fn run(args: QueryArgs) -> Result<(), Box<dyn std::error::Error>> {
    let layout = DbLayout::new(crate::db_dir(args.dbpath.clone()));
    let paths = PathTable::open(&layout.paths_path(), OpenMode::ReadOnly, BackendKind::default())?;

    if args.paths {
        let records = paths.entries()?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&records)?);
        } else {
            let rows: Vec<PathRow> = records
                .into_iter()
                .map(|r| PathRow {
                    file_id: r.file_id,
                    path: r.path,
                    kind: match r.kind {
                        FileKind::Source => "source".to_string(),
                        FileKind::Other => "other".to_string(),
                    },
                })
                .collect();
            println!("{}", Table::new(rows));
        }
        return Ok(());
    }

    let table = if args.refs {
        TagTable::References
    } else if args.syms {
        TagTable::Symbols
    } else {
        TagTable::Definitions
    };
    let store = TagStore::open(&layout, table, OpenMode::ReadOnly, &TagSettings::default())?;

    let mut query = TagQuery {
        pattern: pattern(&args)?,
        ..TagQuery::default()
    };
    if let Some(file) = &args.file {
        let cwd = std::env::current_dir()?;
        let canonical = normalize_path(&cwd, file)
            .ok_or_else(|| format!("{} is not a path inside the tree", file.display()))?;
        let file_id = paths
            .path2fid(&canonical)?
            .ok_or_else(|| format!("{} is not registered", canonical))?;
        query.file = Some(file_id);
        query.mode = ScanMode::ByPath;
    }
    if args.by_path {
        query.mode = ScanMode::ByPath;
    }

    let entries = store.scan(&query, &paths)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        print_entries(&entries);
    }
    store.close()?;
    paths.close()?;
    Ok(())
}
