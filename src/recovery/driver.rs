//! Recovery driver
//!
//! End-to-end run: lock the data directory, sweep temp files, replay every
//! segment in order, then write everything back.

use std::path::{Path, PathBuf};

use crate::brt::Lsn;
use crate::config::RecoveryConfig;
use crate::error::{RecoveryError, Result};
use crate::wal::{delete_rolltmp_files, find_log_segments, LogReader};

use super::{RecoveryContext, RecoveryLock};

/// Summary of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    pub segments_replayed: usize,
    pub records_replayed: u64,
    /// LSN of the last record replayed, if there was one
    pub last_lsn: Option<Lsn>,
    pub temp_files_removed: usize,
}

/// Entry point for a recovery run
pub struct Recovery;

impl Recovery {
    /// Replay the log in `config.log_dir` against the trees in `config.data_dir`
    ///
    /// Evicted nodes are staged in a scratch file until the whole log has
    /// replayed. On failure no replayed node or header reaches a tree file,
    /// and the directory lock is released before the error is returned. Files
    /// created by the log are left in place.
    pub fn run(config: &RecoveryConfig) -> Result<RecoveryResult> {
        if config.cache_size == 0 {
            return Err(RecoveryError::Config("cache size must be non-zero".to_string()));
        }
        let data_dir = config.data_dir.canonicalize()?;
        let log_dir = config.log_dir.canonicalize()?;

        tracing::info!(
            data_dir = %data_dir.display(),
            log_dir = %log_dir.display(),
            "starting recovery"
        );

        let lock = RecoveryLock::acquire(&data_dir)?;

        let temp_files_removed = delete_rolltmp_files(&log_dir)?;
        if temp_files_removed > 0 {
            tracing::info!(count = temp_files_removed, "removed rollback temp files");
        }

        let segments = find_log_segments(&log_dir)?;
        tracing::info!(count = segments.len(), "found log segments");

        let mut ctx = RecoveryContext::new(&data_dir, config.cache_size);
        let mut records_replayed = 0u64;

        for segment in &segments {
            if let Err(e) = replay_segment(&mut ctx, segment, &mut records_replayed) {
                tracing::error!(
                    segment = %segment.display(),
                    record = records_replayed + 1,
                    error = %e,
                    "recovery failed"
                );
                return Err(e);
            }
        }

        ctx.close()?;
        let last_lsn = ctx.last_lsn();
        lock.release()?;

        tracing::info!(
            segments = segments.len(),
            records = records_replayed,
            "recovery complete"
        );

        Ok(RecoveryResult {
            segments_replayed: segments.len(),
            records_replayed,
            last_lsn,
            temp_files_removed,
        })
    }
}

/// Replay every record of one segment, adding to the running record count
pub fn replay_segment(ctx: &mut RecoveryContext, segment: &Path, records: &mut u64) -> Result<()> {
    let mut reader = LogReader::open(segment)?;
    tracing::debug!(segment = %segment.display(), "replaying segment");

    loop {
        let offset = reader.offset();
        let entry = match reader.next_entry() {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(RecoveryError::Malformed { offset, reason }) => {
                return Err(bad_format(segment, *records + 1, offset, reason));
            }
            Err(e) => return Err(e),
        };

        ctx.apply(&entry).map_err(|e| {
            tracing::error!(lsn = %entry.lsn, kind = entry.record.kind(), offset, "record failed to replay");
            e
        })?;
        *records += 1;
    }

    tracing::debug!(
        segment = %segment.display(),
        records = reader.records_read(),
        "segment replayed"
    );
    Ok(())
}

fn bad_format(segment: &Path, record: u64, offset: u64, reason: String) -> RecoveryError {
    RecoveryError::BadLogFormat {
        segment: PathBuf::from(segment),
        record,
        offset,
        reason,
    }
}
