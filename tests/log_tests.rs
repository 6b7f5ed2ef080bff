//! Tests for the record log
//!
//! These tests verify:
//! - Append/read round trips with offset addressing
//! - CRC and bounds validation on point reads
//! - In-place updates and liveness flips
//! - clear/close lifecycle
//! - Compaction: filtering, relocation reporting, atomic swap

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use diskmap::log::{Location, Record, RecordFilter, RecordLog, RecordState};
use diskmap::{DiskMapError, SyncPolicy};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_log() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.log");
    (temp_dir, path)
}

fn open_log(path: &PathBuf) -> RecordLog {
    RecordLog::open(path, SyncPolicy::EveryWrite).unwrap()
}

fn record(key: &[u8], value: &[u8]) -> Record {
    Record::live(key.to_vec(), value.to_vec())
}

/// Filter that keeps everything and remembers reported relocations
#[derive(Default)]
struct KeepAll {
    moves: Vec<(Location, Location)>,
}

impl RecordFilter for KeepAll {
    fn accept(&mut self, _record: &Record, _location: Location) -> bool {
        true
    }

    fn relocate(&mut self, _record: &Record, from: Location, to: Location) {
        self.moves.push((from, to));
    }
}

/// Filter that drops records whose key is in the reject list
struct DropKeys<'a> {
    reject: Vec<&'a [u8]>,
    moves: Vec<(Vec<u8>, Location)>,
}

impl RecordFilter for DropKeys<'_> {
    fn accept(&mut self, record: &Record, _location: Location) -> bool {
        !self.reject.contains(&record.key.as_slice())
    }

    fn relocate(&mut self, record: &Record, _from: Location, to: Location) {
        self.moves.push((record.key.clone(), to));
    }
}

// =============================================================================
// Append / Read Tests
// =============================================================================

#[test]
fn test_append_and_read_round_trip() {
    let (_temp, path) = setup_temp_log();
    let log = open_log(&path);

    let loc = log.append(&record(b"hello", b"world")).unwrap();
    let read = log.read_at(loc).unwrap();

    assert_eq!(read.key, b"hello");
    assert_eq!(read.value, b"world");
    assert_eq!(read.state, RecordState::Live);
}

#[test]
fn test_append_returns_increasing_locations() {
    let (_temp, path) = setup_temp_log();
    let log = open_log(&path);

    let a = log.append(&record(b"a", b"1")).unwrap();
    let b = log.append(&record(b"b", b"22")).unwrap();
    let c = log.append(&record(b"c", b"333")).unwrap();

    assert!(a < b);
    assert!(b < c);

    // Every record still addressable after later appends
    assert_eq!(log.read_at(a).unwrap().value, b"1");
    assert_eq!(log.read_at(b).unwrap().value, b"22");
    assert_eq!(log.read_at(c).unwrap().value, b"333");
}

#[test]
fn test_read_at_invalid_offset() {
    let (_temp, path) = setup_temp_log();
    let log = open_log(&path);
    log.append(&record(b"a", b"1")).unwrap();

    // Inside the file header
    assert!(matches!(
        log.read_at(3),
        Err(DiskMapError::Corruption(_))
    ));

    // Past the end of the file
    let end = log.size().unwrap();
    assert!(matches!(
        log.read_at(end + 100),
        Err(DiskMapError::Corruption(_))
    ));
}

#[test]
fn test_read_detects_corrupted_value() {
    let (_temp, path) = setup_temp_log();
    let log = open_log(&path);
    let loc = log.append(&record(b"key", b"value")).unwrap();
    log.close().unwrap();

    // Flip one byte in the value region (envelope header is 13 bytes)
    let mut file = OpenOptions::new().read(true).write(true).open(&path).unwrap();
    file.seek(SeekFrom::Start(loc + 13 + 3)).unwrap();
    let mut byte = [0u8; 1];
    file.read_exact(&mut byte).unwrap();
    file.seek(SeekFrom::Start(loc + 13 + 3)).unwrap();
    file.write_all(&[byte[0] ^ 0xFF]).unwrap();
    drop(file);

    let log = open_log(&path);
    assert!(matches!(
        log.read_at(loc),
        Err(DiskMapError::Corruption(_))
    ));
}

#[test]
fn test_open_rejects_garbage_file() {
    let (_temp, path) = setup_temp_log();
    std::fs::write(&path, b"NOT_A_DISKMAP_LOG").unwrap();

    let result = RecordLog::open(&path, SyncPolicy::EveryWrite);
    assert!(matches!(result, Err(DiskMapError::Corruption(_))));
}

// =============================================================================
// In-Place Update Tests
// =============================================================================

#[test]
fn test_update_at_same_size() {
    let (_temp, path) = setup_temp_log();
    let log = open_log(&path);
    let loc = log.append(&record(b"key", b"aaaa")).unwrap();

    log.update_at(loc, &record(b"key", b"bbbb")).unwrap();
    assert_eq!(log.read_at(loc).unwrap().value, b"bbbb");
}

#[test]
fn test_update_at_rejects_size_mismatch() {
    let (_temp, path) = setup_temp_log();
    let log = open_log(&path);
    let loc = log.append(&record(b"key", b"short")).unwrap();

    let result = log.update_at(loc, &record(b"key", b"much longer value"));
    assert!(matches!(result, Err(DiskMapError::Corruption(_))));

    // Original untouched
    assert_eq!(log.read_at(loc).unwrap().value, b"short");
}

#[test]
fn test_supersede_flips_state_only() {
    let (_temp, path) = setup_temp_log();
    let log = open_log(&path);
    let loc = log.append(&record(b"key", b"value")).unwrap();

    log.supersede(loc).unwrap();

    // Value still readable, CRC still valid, state flipped
    let read = log.read_at(loc).unwrap();
    assert_eq!(read.state, RecordState::Superseded);
    assert_eq!(read.value, b"value");
}

// =============================================================================
// Size / Clear / Close Tests
// =============================================================================

#[test]
fn test_size_grows_with_appends() {
    let (_temp, path) = setup_temp_log();
    let log = open_log(&path);
    let empty = log.size().unwrap();

    log.append(&record(b"a", b"1")).unwrap();
    let one = log.size().unwrap();
    log.append(&record(b"b", b"2")).unwrap();
    let two = log.size().unwrap();

    assert!(empty < one);
    assert!(one < two);
}

#[test]
fn test_clear_returns_log_to_empty() {
    let (_temp, path) = setup_temp_log();
    let log = open_log(&path);
    let empty = log.size().unwrap();

    log.append(&record(b"a", b"1")).unwrap();
    log.append(&record(b"b", b"2")).unwrap();
    log.clear().unwrap();

    assert_eq!(log.size().unwrap(), empty);

    // Still usable after clear
    let loc = log.append(&record(b"c", b"3")).unwrap();
    assert_eq!(log.read_at(loc).unwrap().value, b"3");
}

#[test]
fn test_close_is_idempotent() {
    let (_temp, path) = setup_temp_log();
    let log = open_log(&path);
    log.append(&record(b"a", b"1")).unwrap();

    log.close().unwrap();
    log.close().unwrap();

    assert!(matches!(
        log.append(&record(b"b", b"2")),
        Err(DiskMapError::Closed)
    ));
    assert!(matches!(log.read_at(8), Err(DiskMapError::Closed)));
    assert!(matches!(log.size(), Err(DiskMapError::Closed)));
}

// =============================================================================
// Scan Tests
// =============================================================================

#[test]
fn test_scan_visits_records_in_log_order() {
    let (_temp, path) = setup_temp_log();
    let log = open_log(&path);
    let a = log.append(&record(b"a", b"1")).unwrap();
    let b = log.append(&record(b"b", b"2")).unwrap();
    log.supersede(a).unwrap();

    let mut seen = Vec::new();
    log.scan(|location, record| {
        seen.push((location, record.key.clone(), record.state));
        Ok(())
    })
    .unwrap();

    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], (a, b"a".to_vec(), RecordState::Superseded));
    assert_eq!(seen[1], (b, b"b".to_vec(), RecordState::Live));
}

// =============================================================================
// Vacuum Tests
// =============================================================================

#[test]
fn test_vacuum_keep_all_preserves_everything() {
    let (_temp, path) = setup_temp_log();
    let log = open_log(&path);
    let a = log.append(&record(b"a", b"1")).unwrap();
    let b = log.append(&record(b"b", b"2")).unwrap();
    let before = log.size().unwrap();

    let mut filter = KeepAll::default();
    log.vacuum(&mut filter).unwrap();

    // Nothing dropped: offsets and size unchanged
    assert_eq!(filter.moves, vec![(a, a), (b, b)]);
    assert_eq!(log.size().unwrap(), before);
    assert_eq!(log.read_at(a).unwrap().value, b"1");
    assert_eq!(log.read_at(b).unwrap().value, b"2");
}

#[test]
fn test_vacuum_drops_rejected_records() {
    let (_temp, path) = setup_temp_log();
    let log = open_log(&path);
    log.append(&record(b"drop_me", b"xxxx")).unwrap();
    let keep = log.append(&record(b"keep", b"yyyy")).unwrap();
    let before = log.size().unwrap();

    let mut filter = DropKeys {
        reject: vec![b"drop_me".as_slice()],
        moves: Vec::new(),
    };
    log.vacuum(&mut filter).unwrap();

    assert!(log.size().unwrap() < before);

    // Survivor was relocated toward the front and reads back at its new
    // location
    assert_eq!(filter.moves.len(), 1);
    let (ref key, new_loc) = filter.moves[0];
    assert_eq!(key.as_slice(), b"keep");
    assert!(new_loc < keep);
    assert_eq!(log.read_at(new_loc).unwrap().value, b"yyyy");
}

#[test]
fn test_vacuum_leaves_no_temp_file() {
    let (temp, path) = setup_temp_log();
    let log = open_log(&path);
    log.append(&record(b"a", b"1")).unwrap();

    log.vacuum(&mut KeepAll::default()).unwrap();

    let names: Vec<String> = std::fs::read_dir(temp.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["test.log".to_string()]);
}

#[test]
fn test_stray_compact_file_is_ignored() {
    // An interrupted compaction leaves a partial temp file behind; the
    // original log must stay fully readable and the next vacuum must
    // succeed regardless.
    let (_temp, path) = setup_temp_log();
    let log = open_log(&path);
    let a = log.append(&record(b"a", b"1")).unwrap();
    let b = log.append(&record(b"b", b"2")).unwrap();
    log.close().unwrap();

    std::fs::write(path.with_extension("compact"), b"partial garbage").unwrap();

    let log = open_log(&path);
    assert_eq!(log.read_at(a).unwrap().value, b"1");
    assert_eq!(log.read_at(b).unwrap().value, b"2");

    log.vacuum(&mut KeepAll::default()).unwrap();
    assert_eq!(log.read_at(a).unwrap().value, b"1");
}

#[test]
fn test_vacuum_on_closed_log_fails() {
    let (_temp, path) = setup_temp_log();
    let log = open_log(&path);
    log.close().unwrap();

    assert!(matches!(
        log.vacuum(&mut KeepAll::default()),
        Err(DiskMapError::Closed)
    ));
}
