//! Cachetable Module
//!
//! Page cache holding decoded tree nodes during replay.
//!
//! ## Responsibilities
//! - Own every resident `TreeNode`; callers only borrow a pinned node
//! - Key pages by (cache file, block number) plus a hash of both
//! - Fetch missing nodes from disk, stage dirty nodes on eviction and close
//! - Write staged nodes into the tree files only when the cache is closed
//! - Reference-count open files
//!
//! ## Pin Protocol
//! ```text
//!   put(file, block, hash, node)      ──▶ resident, pinned
//!   get_and_pin(file, block, hash)    ──▶ resident, pinned (fetched on miss)
//!   unpin(file, block, hash, dirty)   ──▶ resident, evictable
//! ```

mod staging;
mod table;

use std::fmt;

use crate::brt::BlockNum;

pub use table::PageCache;

/// Handle for a file opened through the page cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheFileId(pub u32);

impl fmt::Display for CacheFileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cf{}", self.0)
    }
}

/// Hash identifying a page within the cache
pub fn hash(file: CacheFileId, block: BlockNum) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&file.0.to_le_bytes());
    hasher.update(&block.0.to_le_bytes());
    hasher.finalize()
}
