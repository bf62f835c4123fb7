//! Error types for brtrecover
//!
//! Provides a unified error type for all recovery operations. Every variant,
//! I/O failures included, aborts the run: replay is all-or-nothing.

use std::path::PathBuf;

use thiserror::Error;

use crate::brt::{BlockNum, FileNum};

/// Result type alias using RecoveryError
pub type Result<T> = std::result::Result<T, RecoveryError>;

/// Unified error type for recovery operations
#[derive(Debug, Error)]
pub enum RecoveryError {
    // -------------------------------------------------------------------------
    // Environmental Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Couldn't run recovery because {} holds the recovery lock {}", holder_description(.holder), .path.display())]
    Locked {
        path: PathBuf,
        holder: Option<u32>,
        #[source]
        source: std::io::Error,
    },

    // -------------------------------------------------------------------------
    // Log Format Errors
    // -------------------------------------------------------------------------
    #[error("Bad log magic in {}: {reason}", .segment.display())]
    BadMagic { segment: PathBuf, reason: String },

    #[error("Unsupported log version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Malformed log record at offset {offset}: {reason}")]
    Malformed { offset: u64, reason: String },

    #[error("Bad log format at record {record} (offset {offset} in {}): {reason}", .segment.display())]
    BadLogFormat {
        segment: PathBuf,
        record: u64,
        offset: u64,
        reason: String,
    },

    #[error("Unsupported log encoding: {0}")]
    Unsupported(&'static str),

    // -------------------------------------------------------------------------
    // Replay Invariant Errors
    // -------------------------------------------------------------------------
    #[error("Replay invariant violated: {0}")]
    Invariant(String),

    #[error("Unknown logical file {0}")]
    UnknownFile(FileNum),

    #[error("No tree header has been replayed for file {0}")]
    NoTree(FileNum),

    #[error("Hash mismatch for block {block}: expected {expected:#010x}, found {found:#010x}")]
    HashMismatch {
        block: BlockNum,
        expected: u32,
        found: u32,
    },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RecoveryError {
    /// Build an invariant violation from anything printable
    pub fn invariant(msg: impl Into<String>) -> Self {
        RecoveryError::Invariant(msg.into())
    }

    /// Process exit code for this error
    ///
    /// Uses the underlying OS error code when there is one, otherwise 1.
    pub fn exit_code(&self) -> i32 {
        let os_code = match self {
            RecoveryError::Io(e) => e.raw_os_error(),
            RecoveryError::Locked { source, .. } => source.raw_os_error(),
            _ => None,
        };
        match os_code {
            Some(code) if code != 0 => code,
            _ => 1,
        }
    }
}

impl From<bincode::Error> for RecoveryError {
    fn from(e: bincode::Error) -> Self {
        RecoveryError::Serialization(e.to_string())
    }
}

fn holder_description(holder: &Option<u32>) -> String {
    match holder {
        Some(pid) => format!("process {}", pid),
        None => "some other process".to_string(),
    }
}
