//! WAL Writer
//!
//! Appends entries to a new segment.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use bytes::{BufMut, BytesMut};

use crate::error::Result;

use super::{segment_path, LogEntry, FRAME_HEADER_SIZE, LOG_MAGIC, LOG_VERSION, SEGMENT_HEADER_SIZE};

/// Writes entries to one segment file
pub struct LogWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    bytes_written: u64,
    records_written: u64,
}

impl LogWriter {
    /// Create segment `index` in `dir`, failing if it already exists
    pub fn create(dir: &Path, index: u64) -> Result<Self> {
        Self::create_at(&segment_path(dir, index))
    }

    /// Create a segment at an explicit path
    pub fn create_at(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().write(true).create_new(true).open(path)?;
        let mut writer = BufWriter::new(file);

        let mut header = BytesMut::with_capacity(SEGMENT_HEADER_SIZE);
        header.put_slice(LOG_MAGIC);
        header.put_u32(LOG_VERSION);
        writer.write_all(&header)?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            bytes_written: SEGMENT_HEADER_SIZE as u64,
            records_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry, returning the offset its frame starts at
    pub fn append(&mut self, entry: &LogEntry) -> Result<u64> {
        let payload = entry.encode()?;

        let mut frame = BytesMut::with_capacity(FRAME_HEADER_SIZE + payload.len());
        frame.put_u32_le(payload.len() as u32);
        frame.put_u32_le(crc32fast::hash(&payload));
        frame.put_slice(&payload);
        self.writer.write_all(&frame)?;

        let offset = self.bytes_written;
        self.bytes_written += frame.len() as u64;
        self.records_written += 1;
        Ok(offset)
    }

    /// Flush buffered frames and fsync
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }
}
