//! Tests for log segments
//!
//! These tests verify:
//! - Segment header validation (magic and version)
//! - Clean end of segment vs. truncated or corrupted records
//! - Segment discovery order

mod common;

use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};

use brtrecover::brt::{FileNum, Lsn, TxnId};
use brtrecover::wal::{
    find_log_segments, segment_path, LogEntry, LogReader, LogRecord, LogWriter, LOG_MAGIC, SEGMENT_HEADER_SIZE,
};
use brtrecover::RecoveryError;
use tempfile::TempDir;

use common::LogBuilder;

// =============================================================================
// Helper Functions
// =============================================================================

fn sample_log(count: u64) -> LogBuilder {
    let mut log = LogBuilder::new();
    for i in 0..count {
        log.push(LogRecord::Commit { txnid: TxnId(i) });
    }
    log
}

fn read_all(reader: &mut LogReader) -> Vec<LogEntry> {
    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().unwrap() {
        entries.push(entry);
    }
    entries
}

// =============================================================================
// Header Tests
// =============================================================================

#[test]
fn test_empty_segment_has_no_records() {
    let dir = TempDir::new().unwrap();
    let path = LogBuilder::new().write_segment(dir.path());

    let mut reader = LogReader::open(&path).unwrap();
    assert!(reader.next_entry().unwrap().is_none());
    assert_eq!(reader.offset(), SEGMENT_HEADER_SIZE as u64);
}

#[test]
fn test_wrong_magic_rejected() {
    let dir = TempDir::new().unwrap();
    let path = segment_path(dir.path(), 0);
    fs::write(&path, b"notalog!\x00\x00\x00\x01").unwrap();

    let result = LogReader::open(&path);
    assert!(matches!(result, Err(RecoveryError::BadMagic { .. })));
}

#[test]
fn test_short_header_rejected() {
    let dir = TempDir::new().unwrap();
    let path = segment_path(dir.path(), 0);
    fs::write(&path, &LOG_MAGIC[..5]).unwrap();

    assert!(matches!(LogReader::open(&path), Err(RecoveryError::BadMagic { .. })));
}

#[test]
fn test_unknown_version_rejected() {
    let dir = TempDir::new().unwrap();
    let path = segment_path(dir.path(), 0);
    let mut bytes = LOG_MAGIC.to_vec();
    bytes.extend_from_slice(&2u32.to_be_bytes());
    fs::write(&path, bytes).unwrap();

    match LogReader::open(&path) {
        Err(RecoveryError::UnsupportedVersion { found, expected }) => {
            assert_eq!(found, 2);
            assert_eq!(expected, 1);
        }
        other => panic!("expected UnsupportedVersion, got {:?}", other.map(|_| ())),
    }
}

// =============================================================================
// Record Tests
// =============================================================================

#[test]
fn test_records_read_back_in_order() {
    let dir = TempDir::new().unwrap();
    let log = sample_log(5);
    let path = log.write_segment(dir.path());

    let mut reader = LogReader::open(&path).unwrap();
    let entries = read_all(&mut reader);

    assert_eq!(entries, log.entries());
    assert_eq!(reader.records_read(), 5);
    assert_eq!(entries.last().unwrap().lsn, Lsn(5));
}

#[test]
fn test_truncated_record_is_malformed() {
    let dir = TempDir::new().unwrap();
    let path = sample_log(3).write_segment(dir.path());
    let len = fs::metadata(&path).unwrap().len();
    OpenOptions::new().write(true).open(&path).unwrap().set_len(len - 2).unwrap();

    let mut reader = LogReader::open(&path).unwrap();
    reader.next_entry().unwrap().unwrap();
    reader.next_entry().unwrap().unwrap();
    let third_offset = reader.offset();

    match reader.next_entry() {
        Err(RecoveryError::Malformed { offset, .. }) => assert_eq!(offset, third_offset),
        other => panic!("expected Malformed, got {:?}", other),
    }
}

#[test]
fn test_truncated_frame_header_is_malformed() {
    let dir = TempDir::new().unwrap();
    let path = sample_log(1).write_segment(dir.path());
    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&[1, 2, 3]).unwrap();

    let mut reader = LogReader::open(&path).unwrap();
    reader.next_entry().unwrap().unwrap();
    assert!(matches!(reader.next_entry(), Err(RecoveryError::Malformed { .. })));
}

#[test]
fn test_flipped_byte_fails_checksum() {
    let dir = TempDir::new().unwrap();
    let path = sample_log(2).write_segment(dir.path());

    // Last byte of the second record's payload
    let len = fs::metadata(&path).unwrap().len();
    let mut file = OpenOptions::new().read(true).write(true).open(&path).unwrap();
    file.seek(SeekFrom::Start(len - 1)).unwrap();
    file.write_all(&[0xAA]).unwrap();

    let mut reader = LogReader::open(&path).unwrap();
    reader.next_entry().unwrap().unwrap();
    match reader.next_entry() {
        Err(RecoveryError::Malformed { reason, .. }) => assert!(reason.contains("checksum")),
        other => panic!("expected Malformed, got {:?}", other),
    }
}

#[test]
fn test_writer_refuses_existing_segment() {
    let dir = TempDir::new().unwrap();
    LogWriter::create(dir.path(), 3).unwrap();
    assert!(LogWriter::create(dir.path(), 3).is_err());
}

#[test]
fn test_append_reports_frame_offsets() {
    let dir = TempDir::new().unwrap();
    let mut writer = LogWriter::create(dir.path(), 0).unwrap();
    let first = writer
        .append(&LogEntry::new(Lsn(1), LogRecord::DequeueRoot { filenum: FileNum(1) }))
        .unwrap();
    let second = writer.append(&LogEntry::new(Lsn(2), LogRecord::Checkpoint)).unwrap();

    assert_eq!(first, SEGMENT_HEADER_SIZE as u64);
    assert!(second > first);
    assert_eq!(writer.records_written(), 2);
}

// =============================================================================
// Discovery Tests
// =============================================================================

#[test]
fn test_split_log_discovered_in_order() {
    let dir = TempDir::new().unwrap();
    let log = sample_log(6);
    let written = log.write_split(dir.path(), &[2, 4]);

    let found = find_log_segments(dir.path()).unwrap();
    assert_eq!(found, written);

    let mut entries = Vec::new();
    for path in &found {
        entries.extend(read_all(&mut LogReader::open(path).unwrap()));
    }
    assert_eq!(entries, log.entries());
}
