use std::fs;
use std::io::Write;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use chrono::FixedOffset;
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::tempdir;

use crate::agent::index::builder::build_file_index;
use crate::agent::types::{FileKind, FileMeta, IndexEntry, IndexPolicy, RootSpec};
use crate::shared::config::RootSettings;
use crate::shared::hash::etag_from_size_mtime;
use crate::shared::timefmt::TimeExtractor;

const FOUR_LINES: &str = "2025-01-01 00:00:00 a\n2025-01-01 00:04:59 b\n2025-01-01 00:05:00 c\n2025-01-01 01:00:00 d\n";

fn utc_extractor() -> TimeExtractor {
    TimeExtractor::with_offset(FixedOffset::east_opt(0).unwrap())
}

fn any_root() -> RootSpec {
    let settings: RootSettings = serde_json::from_value(serde_json::json!({ "path": "/" })).unwrap();
    RootSpec::from_settings(&settings)
}

fn meta_for(path: &Path) -> FileMeta {
    let stat = fs::metadata(path).unwrap();
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    FileMeta {
        full_path: path.to_string_lossy().into_owned(),
        parent_dir: path.parent().unwrap().to_string_lossy().into_owned(),
        name: name.clone(),
        size: stat.len(),
        mtime: stat.mtime(),
        inode: stat.ino(),
        file_kind: FileKind::from_name(&name),
        content_etag: etag_from_size_mtime(stat.len(), stat.mtime()),
        owning_root: any_root(),
        file_index: None,
    }
}

fn gzip_bytes(content: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

#[test]
fn indexes_text_file_on_interval_cadence() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("app.log");
    fs::write(&path, FOUR_LINES).unwrap();

    let policy = IndexPolicy {
        interval_secs: 300,
        count_threshold: 1_000_000,
    };
    let index = build_file_index(&meta_for(&path), &policy, &utc_extractor()).unwrap();

    // Entries land on lines a, c and d; b stays inside a's bucket.
    assert_eq!(
        index.time_indexes,
        vec![
            IndexEntry { timestamp: 1735689600, offset: 0 },
            IndexEntry { timestamp: 1735689900, offset: 44 },
            IndexEntry { timestamp: 1735693200, offset: 66 },
        ]
    );
}

#[test]
fn count_threshold_forces_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("burst.log");
    let mut content = String::new();
    for _ in 0..50_001 {
        content.push_str("2025-01-01 00:00:00 x\n");
    }
    fs::write(&path, &content).unwrap();

    let policy = IndexPolicy {
        interval_secs: 300,
        count_threshold: 50_000,
    };
    let index = build_file_index(&meta_for(&path), &policy, &utc_extractor()).unwrap();

    // First line, the count-threshold fire, and the final-line sentinel.
    assert_eq!(index.time_indexes.len(), 3);
    assert_eq!(index.time_indexes[0].offset, 0);
    assert_eq!(index.time_indexes[1].offset, 49_999 * 22);
    assert_eq!(index.time_indexes[2].offset, 50_000 * 22);
    assert!(index
        .time_indexes
        .iter()
        .all(|e| e.timestamp == 1735689600));
}

#[test]
fn index_is_monotonic_in_time_and_offset() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mono.log");
    let mut content = String::new();
    for minute in 0..120 {
        content.push_str(&format!("2025-01-01 {:02}:{:02}:00 tick\n", minute / 60, minute % 60));
    }
    fs::write(&path, &content).unwrap();

    let policy = IndexPolicy::default();
    let index = build_file_index(&meta_for(&path), &policy, &utc_extractor()).unwrap();

    assert!(index.time_indexes.len() > 2);
    for pair in index.time_indexes.windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp);
        assert!(pair[0].offset <= pair[1].offset);
    }
}

#[test]
fn resumed_index_matches_from_scratch() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("grow.log");

    // Index the first two lines only.
    let head: String = FOUR_LINES.lines().take(2).map(|l| format!("{l}\n")).collect();
    fs::write(&path, &head).unwrap();
    let policy = IndexPolicy {
        interval_secs: 300,
        count_threshold: 1_000_000,
    };
    let extractor = utc_extractor();
    let partial = build_file_index(&meta_for(&path), &policy, &extractor).unwrap();
    assert_eq!(partial.time_indexes.last().unwrap().offset, 22);

    // Append the rest and resume from the sentinel.
    fs::write(&path, FOUR_LINES).unwrap();
    let mut meta = meta_for(&path);
    meta.file_index = Some(partial);
    let resumed = build_file_index(&meta, &policy, &extractor).unwrap();

    let scratch = build_file_index(&meta_for(&path), &policy, &extractor).unwrap();
    assert_eq!(resumed.time_indexes, scratch.time_indexes);
}

#[test]
fn shrunken_file_is_reindexed_from_scratch() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("trunc.log");
    fs::write(&path, FOUR_LINES).unwrap();
    let policy = IndexPolicy {
        interval_secs: 300,
        count_threshold: 1_000_000,
    };
    let extractor = utc_extractor();
    let full = build_file_index(&meta_for(&path), &policy, &extractor).unwrap();

    // Truncate below the sentinel offset.
    fs::write(&path, "2025-01-01 00:00:00 a\n").unwrap();
    let mut meta = meta_for(&path);
    meta.file_index = Some(full);
    let rebuilt = build_file_index(&meta, &policy, &extractor).unwrap();

    assert_eq!(rebuilt.time_indexes.len(), 1);
    assert_eq!(rebuilt.time_indexes[0].offset, 0);
}

#[test]
fn lines_without_timestamps_are_skipped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mixed.log");
    fs::write(
        &path,
        "garbage header\n2025-01-01 00:00:00 start\n  continuation\n2025-01-01 01:00:00 end\n",
    )
    .unwrap();

    let policy = IndexPolicy::default();
    let index = build_file_index(&meta_for(&path), &policy, &utc_extractor()).unwrap();

    // Entries point at the timestamped lines only.
    assert_eq!(index.time_indexes.len(), 2);
    assert_eq!(index.time_indexes[0].offset, 15);
    assert_eq!(index.time_indexes[0].timestamp, 1735689600);
    assert_eq!(index.time_indexes[1].timestamp, 1735693200);
}

#[test]
fn gzip_offsets_are_uncompressed_positions() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("app.log.gz");
    fs::write(&path, gzip_bytes(FOUR_LINES)).unwrap();

    let policy = IndexPolicy {
        interval_secs: 300,
        count_threshold: 1_000_000,
    };
    let index = build_file_index(&meta_for(&path), &policy, &utc_extractor()).unwrap();

    assert_eq!(
        index.time_indexes,
        vec![
            IndexEntry { timestamp: 1735689600, offset: 0 },
            IndexEntry { timestamp: 1735689900, offset: 44 },
            IndexEntry { timestamp: 1735693200, offset: 66 },
        ]
    );
}

#[test]
fn gzip_members_are_indexed_as_one_stream() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rotated.log.gz");
    let mut bytes = gzip_bytes("2025-01-01 00:00:00 a\n2025-01-01 00:04:59 b\n");
    bytes.extend(gzip_bytes("2025-01-01 00:05:00 c\n2025-01-01 01:00:00 d\n"));
    fs::write(&path, bytes).unwrap();

    let policy = IndexPolicy {
        interval_secs: 300,
        count_threshold: 1_000_000,
    };
    let index = build_file_index(&meta_for(&path), &policy, &utc_extractor()).unwrap();

    // Offsets keep counting across the member boundary.
    assert_eq!(
        index.time_indexes,
        vec![
            IndexEntry { timestamp: 1735689600, offset: 0 },
            IndexEntry { timestamp: 1735689900, offset: 44 },
            IndexEntry { timestamp: 1735693200, offset: 66 },
        ]
    );
}

#[test]
fn empty_and_all_garbage_files_get_empty_indexes() {
    let dir = tempdir().unwrap();
    let empty = dir.path().join("empty.log");
    fs::write(&empty, "").unwrap();
    let policy = IndexPolicy::default();
    let extractor = utc_extractor();

    let index = build_file_index(&meta_for(&empty), &policy, &extractor).unwrap();
    assert!(index.time_indexes.is_empty());

    let garbage = dir.path().join("garbage.log");
    fs::write(&garbage, "no timestamps here\nat all\n").unwrap();
    let index = build_file_index(&meta_for(&garbage), &policy, &extractor).unwrap();
    assert!(index.time_indexes.is_empty());
    assert_eq!(index.index_etag, meta_for(&garbage).content_etag);
}
