//! Segment discovery and rollback temp-file cleanup

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Name prefix of rollback temp files left behind by a crashed server
pub const ROLLTMP_PREFIX: &str = "__rolltmp.";

const SEGMENT_PREFIX: &str = "log";
const SEGMENT_EXTENSION: &str = "tokulog";

/// Path of segment `index` inside `dir`
pub fn segment_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("{}{:012}.{}", SEGMENT_PREFIX, index, SEGMENT_EXTENSION))
}

/// Every segment in `dir`, ordered by segment index
pub fn find_log_segments(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut segments: Vec<(u64, PathBuf)> = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() {
            if let Some(index) = parse_segment_index(&path) {
                segments.push((index, path));
            }
        }
    }

    segments.sort();
    Ok(segments.into_iter().map(|(_, path)| path).collect())
}

/// "log000000000042.tokulog" → Some(42)
fn parse_segment_index(path: &Path) -> Option<u64> {
    if path.extension()?.to_str()? != SEGMENT_EXTENSION {
        return None;
    }
    let name = path.file_stem()?.to_str()?;
    let digits = name.strip_prefix(SEGMENT_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Delete every rollback temp file in `dir`, returning how many were removed
pub fn delete_rolltmp_files(dir: &Path) -> Result<usize> {
    let mut removed = 0;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let is_rolltmp = entry
            .file_name()
            .to_str()
            .map_or(false, |name| name.starts_with(ROLLTMP_PREFIX));

        if is_rolltmp {
            fs::remove_file(entry.path())?;
            tracing::debug!(path = %entry.path().display(), "removed rollback temp file");
            removed += 1;
        }
    }

    Ok(removed)
}
