pub mod cancel;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod idset;
pub mod indexer;
pub mod logging;
pub mod paths;
pub mod scanner;
pub mod tags;

pub use cancel::CancelFlag;
pub use config::{BuildRequest, IndexerConfig};
pub use db::DbLayout;
pub use error::{FormatError, Result, TagscopeError};
pub use extract::{Extractor, ExtractorSet, ParseWarning, TagEvent, TagKind, TagSink};
pub use idset::IdSet;
pub use indexer::{BuildMode, IndexReport, Indexer, Phase};
pub use paths::{FileKind, FileRecord, PathTable, normalize_path};
pub use scanner::{FileEnumerator, ScannedFile, SourceEnumerator};
pub use tags::{
    Classification, ScanMode, TagEntry, TagOptions, TagPattern, TagQuery, TagSettings, TagStore,
    TagTable,
};
pub use tagscope_store::{BackendKind, OpenMode, SortHelper};
