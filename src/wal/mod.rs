//! Write-Ahead Log (WAL) Module
//!
//! Log records and the segment files that hold them.
//!
//! ## Responsibilities
//! - The closed set of log record kinds replay understands
//! - Reading segments strictly: any damage stops the run
//! - Writing segments (tests, benchmarks, staging a log by hand)
//! - Finding segments in a log directory and sweeping rollback temp files
//!
//! ## Segment Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Magic "tokulogg" (8) │ Version BE (4)   │
//! ├─────────────────────────────────────────┤
//! │ Record 1                                │
//! │ ┌─────────┬─────────┬─────────────────┐ │
//! │ │ Len (4) │ CRC (4) │ bincode(Entry)  │ │
//! │ └─────────┴─────────┴─────────────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Record 2 ...                            │
//! └─────────────────────────────────────────┘
//! ```

mod entry;
mod reader;
mod segments;
mod writer;

pub use entry::{LogEntry, LogRecord};
pub use reader::LogReader;
pub use segments::{delete_rolltmp_files, find_log_segments, segment_path, ROLLTMP_PREFIX};
pub use writer::LogWriter;

/// Magic bytes opening every segment
pub const LOG_MAGIC: &[u8; 8] = b"tokulogg";

/// The only segment version this crate reads and writes
pub const LOG_VERSION: u32 = 1;

/// Magic (8) + version (4)
pub const SEGMENT_HEADER_SIZE: usize = 12;

/// Len (4) + CRC (4)
pub const FRAME_HEADER_SIZE: usize = 8;
