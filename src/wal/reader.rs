//! WAL Reader
//!
//! Reads entries from one segment. Damage of any kind is an error; nothing is
//! skipped or repaired.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use bytes::Buf;

use crate::error::{RecoveryError, Result};

use super::{LogEntry, FRAME_HEADER_SIZE, LOG_MAGIC, LOG_VERSION, SEGMENT_HEADER_SIZE};

/// Upper bound on one record's payload; anything larger is treated as damage
const MAX_RECORD_SIZE: usize = 64 * 1024 * 1024;

/// Reads entries from a segment file
pub struct LogReader {
    path: PathBuf,
    reader: BufReader<File>,
    /// Offset of the next unread byte
    offset: u64,
    records_read: u64,
}

impl LogReader {
    /// Open a segment and validate its magic header
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let mut header = [0u8; SEGMENT_HEADER_SIZE];
        let n = read_full(&mut reader, &mut header)?;
        if n < SEGMENT_HEADER_SIZE {
            return Err(RecoveryError::BadMagic {
                segment: path.to_path_buf(),
                reason: format!("segment is {} bytes, header needs {}", n, SEGMENT_HEADER_SIZE),
            });
        }

        let mut buf = &header[..];
        let mut magic = [0u8; 8];
        buf.copy_to_slice(&mut magic);
        if &magic != LOG_MAGIC {
            return Err(RecoveryError::BadMagic {
                segment: path.to_path_buf(),
                reason: format!("found {:?}", String::from_utf8_lossy(&magic)),
            });
        }

        let version = buf.get_u32();
        if version != LOG_VERSION {
            return Err(RecoveryError::UnsupportedVersion {
                found: version,
                expected: LOG_VERSION,
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            offset: SEGMENT_HEADER_SIZE as u64,
            records_read: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Offset of the next record
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Read the next entry
    ///
    /// - `Ok(Some(entry))` for a complete, intact record
    /// - `Ok(None)` at a clean end of segment
    /// - `Err(Malformed)` for a truncated frame, bad checksum or undecodable payload
    pub fn next_entry(&mut self) -> Result<Option<LogEntry>> {
        let start = self.offset;

        let mut frame_header = [0u8; FRAME_HEADER_SIZE];
        let n = read_full(&mut self.reader, &mut frame_header)?;
        if n == 0 {
            return Ok(None);
        }
        if n < FRAME_HEADER_SIZE {
            return Err(malformed(start, format!("truncated frame header ({} of {} bytes)", n, FRAME_HEADER_SIZE)));
        }

        let mut buf = &frame_header[..];
        let len = buf.get_u32_le() as usize;
        let crc = buf.get_u32_le();
        if len > MAX_RECORD_SIZE {
            return Err(malformed(start, format!("record length {} exceeds limit", len)));
        }

        let mut payload = vec![0u8; len];
        let n = read_full(&mut self.reader, &mut payload)?;
        if n < len {
            return Err(malformed(start, format!("truncated record ({} of {} bytes)", n, len)));
        }

        let actual = crc32fast::hash(&payload);
        if actual != crc {
            return Err(malformed(
                start,
                format!("checksum mismatch: stored {:#010x}, computed {:#010x}", crc, actual),
            ));
        }

        let entry = LogEntry::decode(&payload).map_err(|e| malformed(start, e.to_string()))?;

        self.offset += (FRAME_HEADER_SIZE + len) as u64;
        self.records_read += 1;
        Ok(Some(entry))
    }
}

impl Iterator for LogReader {
    type Item = Result<LogEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}

fn malformed(offset: u64, reason: String) -> RecoveryError {
    RecoveryError::Malformed { offset, reason }
}

/// Fill `buf` as far as the input allows, returning the bytes read
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
