mod clear;
mod dump;
mod index;
mod query;
mod stats;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tagscope_core::BuildRequest;

#[derive(Parser)]
#[command(
    name = "tagscope",
    version,
    about = "Incremental cross-reference tag database for source trees",
    long_about = "Tagscope records where every name in a source tree is defined and used. \
                  Tables are updated incrementally: only files changed since the last run \
                  are parsed again."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the tag tables from scratch
    Build(IndexArgs),
    /// Bring the tag tables up to date with the source tree
    #[command(
        long_about = "Re-extracts files modified since the last run and drops the records of \
                      deleted files. Without an existing database this is a full build."
    )]
    Update {
        #[command(flatten)]
        args: IndexArgs,
        /// Only re-extract this file
        #[arg(long, value_name = "FILE")]
        single: Option<PathBuf>,
    },
    /// Look up definitions, references or symbols
    Query(query::QueryArgs),
    /// Print every record of one table file, meta records included
    Dump {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Show format version, options and record counts
    Stats {
        #[arg(long, value_name = "DIR")]
        dbpath: Option<PathBuf>,
    },
    /// Remove the tag tables
    Clear {
        #[arg(long, value_name = "DIR")]
        dbpath: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct IndexArgs {
    /// Source tree root. Defaults to the current directory.
    #[arg(value_name = "ROOT")]
    pub root: Option<PathBuf>,
    /// Directory holding the tag tables. Defaults to ROOT.
    #[arg(long, value_name = "DIR")]
    pub dbpath: Option<PathBuf>,
    /// Store one record per tag and file with a compressed line list
    #[arg(long)]
    pub compact: bool,
    /// Compress the source line images
    #[arg(long)]
    pub compress: bool,
    /// Do not repeat the tag name inside records
    #[arg(long)]
    pub compname: bool,
    /// Create new tables with the SQLite backend
    #[arg(long)]
    pub sqlite: bool,
    /// Register files no extractor understands
    #[arg(long)]
    pub other: bool,
    /// Sort program for bulk loading, or `internal`
    #[arg(long, value_name = "PROGRAM")]
    pub sort: Option<String>,
    /// Fail on unreadable source files instead of skipping them
    #[arg(long)]
    pub strict: bool,
    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Database directory: explicit flag, then `TAGSCOPE_DBPATH`, then the
/// current directory.
pub(crate) fn db_dir(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| {
        std::env::var(tagscope_core::config::ENV_DBPATH)
            .ok()
            .filter(|d| !d.is_empty())
            .map(PathBuf::from)
    })
    .unwrap_or_else(|| PathBuf::from("."))
}

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let component = match &cli.command {
        Commands::Build(_) | Commands::Update { .. } => "index",
        _ => "cli",
    };
    let _guard = tagscope_core::logging::init_logging(component, true);

    match cli.command {
        Commands::Build(args) => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(index::run(args, BuildRequest::Full))
        }
        Commands::Update { args, single } => {
            let request = match single {
                Some(path) => BuildRequest::SingleFile(path),
                None => BuildRequest::Incremental,
            };
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(index::run(args, request))
        }
        Commands::Query(args) => query::run(args),
        Commands::Dump { file } => dump::run(file),
        Commands::Stats { dbpath } => stats::run(db_dir(dbpath)),
        Commands::Clear { dbpath } => clear::run(db_dir(dbpath)),
    }
}
