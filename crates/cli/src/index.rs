use crate::IndexArgs;
use std::path::{Path, PathBuf};
use tagscope_core::{
    BackendKind, BuildRequest, CancelFlag, ExtractorSet, IndexReport, Indexer, IndexerConfig,
    SortHelper, SourceEnumerator, TagOptions,
};
use tagscope_java::JavaTagger;
use tracing::{info, warn};

fn config(args: &IndexArgs, request: BuildRequest) -> std::io::Result<IndexerConfig> {
    let root = args.root.clone().unwrap_or_else(|| PathBuf::from("."));
    let root = std::fs::canonicalize(&root)?;
    let request = match request {
        BuildRequest::SingleFile(path) => {
            BuildRequest::SingleFile(resolve_single(&std::env::current_dir()?, &path))
        }
        other => other,
    };

    let mut config = IndexerConfig::new(&root)
        .request(request)
        .options(TagOptions {
            compact: args.compact,
            compress: args.compress,
            compname: args.compname,
        })
        .include_other_files(args.other)
        .skip_unreadable(!args.strict)
        .apply_env();
    if let Some(dir) = &args.dbpath {
        config = config.db_dir(dir.clone());
    }
    if args.sqlite {
        config = config.backend(BackendKind::Sqlite);
    }
    if let Some(sort) = &args.sort {
        config = config.sort(SortHelper::parse(sort));
    }
    Ok(config)
}

/// `--single` names a file as the user sees it from the working directory.
/// Resolve it to the same canonical form as the root; a deleted file keeps
/// its name under the canonical parent.
fn resolve_single(cwd: &Path, path: &Path) -> PathBuf {
    let joined = cwd.join(path);
    if let Ok(canonical) = std::fs::canonicalize(&joined) {
        return canonical;
    }
    match (joined.parent(), joined.file_name()) {
        (Some(parent), Some(name)) => std::fs::canonicalize(parent)
            .map(|p| p.join(name))
            .unwrap_or(joined),
        _ => joined,
    }
}

fn index(config: IndexerConfig, cancel: CancelFlag) -> tagscope_core::Result<IndexReport> {
    let extractors = ExtractorSet::new().with(JavaTagger::new());
    let enumerator = SourceEnumerator::new(&extractors)
        .include_other(config.include_other_files)
        .exclude(config.db_dir.clone());
    Indexer::new(config, &enumerator, &extractors)
        .with_cancel(cancel)
        .run()
}

fn print_summary(report: &IndexReport) {
    println!("mode:        {:?}", report.mode);
    println!("added:       {}", report.added.len());
    println!("deleted:     {}", report.deleted.len());
    println!("removed:     {}", report.removed.len());
    println!("extracted:   {}", report.files_extracted);
    println!("definitions: {}", report.definitions);
    println!("references:  {}", report.references);
    println!(
        "uses:        {} references, {} symbols",
        report.classification.references, report.classification.symbols
    );
    if !report.warnings.is_empty() {
        println!("warnings:    {}", report.warnings.len());
    }
}

pub async fn run(args: IndexArgs, request: BuildRequest) -> Result<(), Box<dyn std::error::Error>> {
    let config = config(&args, request)?;
    info!("Indexing project at: {}...", config.root.display());

    let cancel = CancelFlag::new();
    let mut worker = tokio::task::spawn_blocking({
        let cancel = cancel.clone();
        move || index(config, cancel)
    });

    let report = tokio::select! {
        joined = &mut worker => joined??,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, abandoning the run");
            cancel.cancel();
            worker.await??
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(())
}
