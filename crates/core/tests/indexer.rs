mod common;

use common::{Workspace, backends};
use std::fs;
use tagscope_core::tags::format::VERSION_KEY;
use tagscope_core::{
    BackendKind, BuildMode, BuildRequest, CancelFlag, FileKind, FormatError, Indexer, OpenMode,
    Phase, ScanMode, SourceEnumerator, TagOptions, TagPattern, TagQuery, TagSettings, TagStore,
    TagTable, TagscopeError,
};
use tagscope_store::{KvStore, OpenOptions};

fn two_file_tree(backend: BackendKind) -> Workspace {
    let ws = Workspace::new(backend);
    ws.write("a.toy", "def foo\n");
    ws.write("src/b.toy", "\ncall foo\n");
    ws
}

#[test]
fn definition_and_reference_land_in_their_tables() {
    for backend in backends() {
        let ws = two_file_tree(backend);
        let report = ws.run(BuildRequest::Full);

        assert_eq!(report.mode, BuildMode::Full);
        assert_eq!(report.files_extracted, 2);
        assert_eq!(report.definitions, 1);
        assert_eq!(report.references, 1);
        assert_eq!(
            ws.locations(TagTable::Definitions, "foo"),
            vec![("./a.toy".to_string(), 1)]
        );
        assert_eq!(
            ws.locations(TagTable::References, "foo"),
            vec![("./src/b.toy".to_string(), 2)]
        );
        assert!(ws.locations(TagTable::Symbols, "foo").is_empty());
    }
}

#[test]
fn run_passes_through_every_phase() {
    let ws = two_file_tree(BackendKind::BTreeFile);
    let report = ws.run(BuildRequest::Full);
    assert_eq!(
        report.phases,
        vec![
            Phase::Scanning,
            Phase::Diffing,
            Phase::Extracting,
            Phase::Writing,
            Phase::Reclassifying,
            Phase::Committing,
            Phase::Done,
        ]
    );
}

#[test]
fn standard_records_keep_the_source_line() {
    let ws = two_file_tree(BackendKind::BTreeFile);
    let config = ws
        .config(BuildRequest::Full)
        .options(TagOptions {
            compact: false,
            compress: true,
            compname: true,
        });
    ws.try_run(config).unwrap();

    let defs = ws.query(TagTable::Definitions, &TagQuery::exact("foo"));
    assert_eq!(defs.len(), 1);
    assert_eq!(defs[0].image.as_deref(), Some("def foo"));
}

#[test]
fn unchanged_rerun_is_a_byte_identical_noop() {
    for backend in backends() {
        let ws = two_file_tree(backend);
        ws.run(BuildRequest::Full);
        let first = ws.run(BuildRequest::Incremental);
        let before = ws.table_bytes();

        let second = ws.run(BuildRequest::Incremental);
        assert_eq!(second.mode, BuildMode::Incremental);
        assert!(first.is_noop(), "{:?}", first);
        assert!(second.is_noop(), "{:?}", second);
        assert_eq!(ws.table_bytes(), before, "{} tables changed", backend);
    }
}

#[test]
fn edited_file_is_reextracted_under_the_same_id() {
    for backend in backends() {
        let ws = two_file_tree(backend);
        ws.run(BuildRequest::Full);
        let fid_a = ws.paths().path2fid("./a.toy").unwrap().unwrap();

        ws.edit("a.toy", "def bar\n\ndef foo\n");
        let report = ws.run(BuildRequest::Incremental);

        assert_eq!(report.added, vec!["./a.toy".to_string()]);
        assert_eq!(report.deleted, vec![fid_a]);
        assert_eq!(ws.paths().path2fid("./a.toy").unwrap(), Some(fid_a));
        assert_eq!(
            ws.locations(TagTable::Definitions, "foo"),
            vec![("./a.toy".to_string(), 3)]
        );
        assert_eq!(
            ws.locations(TagTable::Definitions, "bar"),
            vec![("./a.toy".to_string(), 1)]
        );
        // The untouched file keeps its records.
        assert_eq!(
            ws.locations(TagTable::References, "foo"),
            vec![("./src/b.toy".to_string(), 2)]
        );
    }
}

#[test]
fn deleted_file_leaves_no_trace_and_its_id_is_not_reused() {
    for backend in backends() {
        let ws = two_file_tree(backend);
        ws.run(BuildRequest::Full);
        let fid_b = ws.paths().path2fid("./src/b.toy").unwrap().unwrap();

        ws.remove("src/b.toy");
        let report = ws.run(BuildRequest::Incremental);
        assert_eq!(report.deleted, vec![fid_b]);
        assert_eq!(report.removed, vec!["./src/b.toy".to_string()]);

        let paths = ws.paths();
        assert_eq!(paths.path2fid("./src/b.toy").unwrap(), None);
        assert_eq!(paths.fid2path(fid_b).unwrap(), None);
        drop(paths);

        for table in [TagTable::Definitions, TagTable::References, TagTable::Symbols] {
            let all = ws.query(table, &TagQuery::all());
            assert!(all.iter().all(|e| e.file_id != fid_b), "{:?}", all);
        }

        ws.write("c.toy", "call foo\n");
        ws.run(BuildRequest::Incremental);
        let fid_c = ws.paths().path2fid("./c.toy").unwrap().unwrap();
        assert!(fid_c > fid_b);
    }
}

#[test]
fn symbol_becomes_reference_once_defined() {
    for backend in backends() {
        let ws = Workspace::new(backend);
        ws.write("a.toy", "call bar\ncall bar\n");
        let report = ws.run(BuildRequest::Full);
        assert_eq!(report.classification.symbols, 2);
        assert_eq!(report.classification.references, 0);
        assert_eq!(ws.locations(TagTable::Symbols, "bar").len(), 2);
        assert!(ws.locations(TagTable::References, "bar").is_empty());

        ws.write("b.toy", "def bar\n");
        let report = ws.run(BuildRequest::Incremental);
        assert_eq!(report.added, vec!["./b.toy".to_string()]);
        assert_eq!(report.classification.references, 2);
        assert!(ws.locations(TagTable::Symbols, "bar").is_empty());
        assert_eq!(
            ws.locations(TagTable::References, "bar"),
            vec![("./a.toy".to_string(), 1), ("./a.toy".to_string(), 2)]
        );

        ws.remove("b.toy");
        ws.run(BuildRequest::Incremental);
        assert_eq!(ws.locations(TagTable::Symbols, "bar").len(), 2);
    }
}

#[test]
fn incremental_without_database_builds_from_scratch() {
    let ws = two_file_tree(BackendKind::BTreeFile);
    let report = ws.run(BuildRequest::Incremental);
    assert_eq!(report.mode, BuildMode::Full);
    assert!(ws.layout().present().all());
}

#[test]
fn partial_database_is_a_consistency_error() {
    let ws = two_file_tree(BackendKind::BTreeFile);
    ws.run(BuildRequest::Full);
    fs::remove_file(ws.layout().paths_path()).unwrap();

    let err = ws.try_run(ws.config(BuildRequest::Incremental)).unwrap_err();
    assert!(matches!(err, TagscopeError::Consistency(_)), "{err}");
    assert!(err.to_string().contains("rebuild"));

    // A full build recovers.
    ws.run(BuildRequest::Full);
    assert!(ws.layout().present().all());
}

#[test]
fn format_version_outside_window_is_rejected() {
    for (version, too_new) in [("99", true), ("1", false)] {
        let ws = two_file_tree(BackendKind::BTreeFile);
        ws.run(BuildRequest::Full);

        let mut kv = KvStore::open(ws.layout().defs_path(), OpenOptions::modify()).unwrap();
        kv.put_meta(VERSION_KEY, version).unwrap();
        kv.close().unwrap();

        let err = match TagStore::open(
            &ws.layout(),
            TagTable::Definitions,
            OpenMode::ReadOnly,
            &TagSettings::default(),
        ) {
            Ok(_) => panic!("version {} accepted", version),
            Err(e) => e,
        };
        match err {
            TagscopeError::Format(FormatError::TooNew { found, .. }) => {
                assert!(too_new);
                assert_eq!(found, 99);
            }
            TagscopeError::Format(FormatError::TooOld { found, .. }) => {
                assert!(!too_new);
                assert_eq!(found, 1);
            }
            other => panic!("unexpected error {other}"),
        }
    }
}

#[test]
fn cancelled_full_build_leaves_no_tables() {
    let ws = two_file_tree(BackendKind::Sqlite);
    let extractor = common::ToyExtractor;
    let enumerator = SourceEnumerator::new(&extractor);
    let cancel = CancelFlag::new();
    cancel.cancel();

    let err = Indexer::new(ws.config(BuildRequest::Full), &enumerator, &extractor)
        .with_cancel(cancel)
        .run()
        .unwrap_err();
    assert!(matches!(err, TagscopeError::Cancelled));
    assert!(ws.layout().present().none());
}

#[test]
fn cancelled_update_commits_nothing() {
    for backend in backends() {
        let ws = two_file_tree(backend);
        ws.run(BuildRequest::Full);
        ws.edit("a.toy", "def baz\n");
        ws.remove("src/b.toy");
        let before = ws.table_bytes();

        let extractor = common::ToyExtractor;
        let enumerator = SourceEnumerator::new(&extractor);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = Indexer::new(ws.config(BuildRequest::Incremental), &enumerator, &extractor)
            .with_cancel(cancel)
            .run()
            .unwrap_err();
        assert!(matches!(err, TagscopeError::Cancelled));
        assert_eq!(ws.table_bytes(), before);

        // The interrupted changes are picked up by the next run.
        let report = ws.run(BuildRequest::Incremental);
        assert_eq!(report.added, vec!["./a.toy".to_string()]);
        assert_eq!(report.removed, vec!["./src/b.toy".to_string()]);
    }
}

#[test]
fn single_file_update_touches_only_that_file() {
    let ws = two_file_tree(BackendKind::BTreeFile);
    ws.run(BuildRequest::Full);
    let fid_a = ws.paths().path2fid("./a.toy").unwrap().unwrap();

    ws.edit("a.toy", "def qux\n");
    ws.write("new.toy", "def fresh\n");
    let report = ws.run(BuildRequest::SingleFile("a.toy".into()));

    assert_eq!(report.mode, BuildMode::SingleFile);
    assert!(!report.phases.contains(&Phase::Scanning));
    assert_eq!(report.added, vec!["./a.toy".to_string()]);
    assert_eq!(report.deleted, vec![fid_a]);
    assert_eq!(ws.locations(TagTable::Definitions, "qux").len(), 1);
    assert!(ws.locations(TagTable::Definitions, "foo").is_empty());
    assert!(ws.locations(TagTable::Definitions, "fresh").is_empty());
    assert_eq!(ws.locations(TagTable::Symbols, "foo").len(), 1);
}

#[test]
fn single_file_update_of_vanished_file_unregisters_it() {
    let ws = two_file_tree(BackendKind::BTreeFile);
    ws.run(BuildRequest::Full);
    ws.remove("a.toy");

    let report = ws.run(BuildRequest::SingleFile(ws.root().join("a.toy")));
    assert_eq!(report.mode, BuildMode::SingleFile);
    assert!(report.added.is_empty());
    assert_eq!(report.removed, vec!["./a.toy".to_string()]);
    assert_eq!(ws.paths().path2fid("./a.toy").unwrap(), None);
}

#[test]
fn single_file_update_of_unknown_file_updates_the_tree() {
    let ws = two_file_tree(BackendKind::BTreeFile);
    ws.run(BuildRequest::Full);
    ws.write("new.toy", "def fresh\n");

    let report = ws.run(BuildRequest::SingleFile("new.toy".into()));
    assert_eq!(report.mode, BuildMode::Incremental);
    assert_eq!(report.added, vec!["./new.toy".to_string()]);
}

#[test]
fn single_file_outside_root_is_rejected() {
    let ws = two_file_tree(BackendKind::BTreeFile);
    ws.run(BuildRequest::Full);
    let err = ws
        .try_run(ws.config(BuildRequest::SingleFile("/elsewhere/x.toy".into())))
        .unwrap_err();
    assert!(matches!(err, TagscopeError::OutsideRoot(_)));
}

#[test]
fn other_files_are_registered_without_tags() {
    let ws = two_file_tree(BackendKind::BTreeFile);
    ws.write("README.md", "def not_a_tag\n");
    let config = ws.config(BuildRequest::Full).include_other_files(true);
    let report = ws.try_run(config).unwrap();

    assert_eq!(report.files_extracted, 2);
    let record = ws.paths().lookup("./README.md").unwrap().unwrap();
    assert_eq!(record.kind, FileKind::Other);
    assert!(ws.locations(TagTable::Definitions, "not_a_tag").is_empty());

    // Table files in the tree are never registered.
    assert_eq!(ws.paths().path2fid("./tags.defs").unwrap(), None);
}

#[test]
fn parse_problems_are_reported_and_extraction_goes_on() {
    let ws = Workspace::new(BackendKind::BTreeFile);
    ws.write("a.toy", "def one\n!oops\ndef two\n");
    ws.write("b.toy", "def three\nfail\n");
    let report = ws.run(BuildRequest::Full);

    assert_eq!(report.warnings.len(), 2);
    assert_eq!(report.warnings[0].path, "./a.toy");
    assert_eq!(report.warnings[0].line, 2);
    assert_eq!(report.warnings[1].path, "./b.toy");
    assert_eq!(ws.locations(TagTable::Definitions, "two").len(), 1);
    assert_eq!(ws.locations(TagTable::Definitions, "three").len(), 1);
}

#[test]
fn default_sort_helper_produces_the_same_tables() {
    let ws = two_file_tree(BackendKind::BTreeFile);
    let config = ws
        .config(BuildRequest::Full)
        .sort(tagscope_core::SortHelper::default());
    ws.try_run(config).unwrap();
    assert_eq!(ws.locations(TagTable::References, "foo").len(), 1);
}

#[test]
fn relative_root_stores_tree_relative_paths() {
    for backend in backends() {
        let ws = Workspace::relative(backend);
        ws.write("a.toy", "def foo\n");
        ws.write("src/b.toy", "call foo\n");

        let report = ws.run(BuildRequest::Full);
        assert_eq!(report.files_extracted, 2);
        assert_eq!(
            ws.locations(TagTable::Definitions, "foo"),
            vec![("./a.toy".to_string(), 1)]
        );
        assert_eq!(
            ws.locations(TagTable::References, "foo"),
            vec![("./src/b.toy".to_string(), 1)]
        );

        ws.edit("a.toy", "\ndef foo\n");
        let report = ws.run(BuildRequest::Incremental);
        assert_eq!(report.added, vec!["./a.toy".to_string()]);
        assert_eq!(
            ws.locations(TagTable::Definitions, "foo"),
            vec![("./a.toy".to_string(), 2)]
        );
    }
}

#[test]
fn relative_single_file_resolves_against_the_root() {
    let ws = Workspace::relative(BackendKind::BTreeFile);
    ws.write("a.toy", "def foo\n");
    ws.run(BuildRequest::Full);

    ws.edit("a.toy", "def bar\n");
    ws.run(BuildRequest::SingleFile("a.toy".into()));
    assert!(ws.locations(TagTable::Definitions, "foo").is_empty());
    assert_eq!(ws.locations(TagTable::Definitions, "bar").len(), 1);
}

fn entries_summary(entries: &[tagscope_core::TagEntry]) -> Vec<(String, String, u32)> {
    entries
        .iter()
        .map(|e| (e.tag.clone(), e.path.clone(), e.line))
        .collect()
}

fn three_definition_tree(backend: BackendKind) -> Workspace {
    let ws = Workspace::new(backend);
    ws.write("b.toy", "def zeta\ndef alpha\n");
    ws.write("a.toy", "def alpha_two\n\ndef beta\n");
    ws
}

#[test]
fn by_path_scan_orders_by_path_then_line() {
    for backend in backends() {
        let ws = three_definition_tree(backend);
        ws.run(BuildRequest::Full);

        let entries = ws.query(
            TagTable::Definitions,
            &TagQuery::all().with_mode(ScanMode::ByPath),
        );
        assert_eq!(
            entries_summary(&entries),
            vec![
                ("alpha_two".to_string(), "./a.toy".to_string(), 1),
                ("beta".to_string(), "./a.toy".to_string(), 3),
                ("zeta".to_string(), "./b.toy".to_string(), 1),
                ("alpha".to_string(), "./b.toy".to_string(), 2),
            ]
        );
    }
}

#[test]
fn by_tag_and_physical_scans_see_the_same_records() {
    for backend in backends() {
        let ws = three_definition_tree(backend);
        ws.run(BuildRequest::Full);

        let by_tag = ws.query(TagTable::Definitions, &TagQuery::all());
        let tags: Vec<&str> = by_tag.iter().map(|e| e.tag.as_str()).collect();
        assert_eq!(tags, vec!["alpha", "alpha_two", "beta", "zeta"]);

        let mut physical =
            entries_summary(&ws.query(TagTable::Definitions, &TagQuery::all().with_mode(ScanMode::All)));
        physical.sort();
        let mut expected = entries_summary(&by_tag);
        expected.sort();
        assert_eq!(physical, expected);
    }
}

#[test]
fn prefix_and_regex_patterns_select_tag_names() {
    for backend in backends() {
        let ws = three_definition_tree(backend);
        ws.run(BuildRequest::Full);

        let prefix = TagQuery {
            pattern: TagPattern::Prefix("alpha".to_string()),
            ..TagQuery::default()
        };
        let tags: Vec<String> = ws
            .query(TagTable::Definitions, &prefix)
            .into_iter()
            .map(|e| e.tag)
            .collect();
        assert_eq!(tags, vec!["alpha".to_string(), "alpha_two".to_string()]);

        let regex = TagQuery {
            pattern: TagPattern::Regex(regex::bytes::Regex::new("^[bz]").unwrap()),
            ..TagQuery::default()
        };
        let tags: Vec<String> = ws
            .query(TagTable::Definitions, &regex)
            .into_iter()
            .map(|e| e.tag)
            .collect();
        assert_eq!(tags, vec!["beta".to_string(), "zeta".to_string()]);
    }
}

#[test]
fn compact_definitions_survive_an_incremental_update() {
    for backend in backends() {
        let ws = Workspace::new(backend);
        ws.write("a.toy", "def foo\ndef foo\n\ndef foo\n");
        ws.write("b.toy", "def foo\ncall foo\n");
        let compact = TagOptions {
            compact: true,
            compress: false,
            compname: false,
        };
        ws.try_run(ws.config(BuildRequest::Full).options(compact))
            .unwrap();

        let defs = ws.query(TagTable::Definitions, &TagQuery::exact("foo"));
        assert!(defs.iter().all(|e| e.image.is_none()));
        assert_eq!(
            entries_summary(&defs),
            vec![
                ("foo".to_string(), "./a.toy".to_string(), 1),
                ("foo".to_string(), "./a.toy".to_string(), 2),
                ("foo".to_string(), "./a.toy".to_string(), 4),
                ("foo".to_string(), "./b.toy".to_string(), 1),
            ]
        );

        ws.edit("a.toy", "def foo\ncall foo\n");
        ws.run(BuildRequest::Incremental);
        let defs = ws.query(TagTable::Definitions, &TagQuery::exact("foo"));
        assert!(defs.iter().all(|e| e.image.is_none()));
        assert_eq!(
            ws.locations(TagTable::Definitions, "foo"),
            vec![("./a.toy".to_string(), 1), ("./b.toy".to_string(), 1)]
        );
        assert_eq!(
            ws.locations(TagTable::References, "foo"),
            vec![("./a.toy".to_string(), 2), ("./b.toy".to_string(), 2)]
        );
    }
}
