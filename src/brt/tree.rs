//! Tree handles
//!
//! A handle ties one tree header to the cache file it lives in.

use std::cmp::Ordering;

use crate::cachetable::{CacheFileId, PageCache};
use crate::error::Result;

use super::TreeHeader;

/// Key comparator slot; replay never compares keys, so it stays unset
pub type KeyCompare = fn(&[u8], &[u8]) -> Ordering;

/// Open tree: owns its header for as long as the tree is open
#[derive(Debug)]
pub struct TreeHandle {
    pub cachefile: CacheFileId,
    pub node_size: u32,
    pub flags: u32,
    pub compare: Option<KeyCompare>,
    pub header: TreeHeader,
}

impl TreeHandle {
    pub fn new(cachefile: CacheFileId, header: TreeHeader) -> Self {
        Self {
            cachefile,
            node_size: header.node_size,
            flags: header.flags.first().copied().unwrap_or_default(),
            compare: None,
            header,
        }
    }

    /// Swap in a freshly logged header, dropping the previous one
    pub fn replace_header(&mut self, header: TreeHeader) {
        self.node_size = header.node_size;
        self.flags = header.flags.first().copied().unwrap_or_default();
        self.header = header;
    }

    /// Write the header back and drop this handle's reference to the cache file
    pub fn close(self, cache: &mut PageCache) -> Result<()> {
        cache.write_header(self.cachefile, &self.header)?;
        cache.close_file(self.cachefile)
    }
}
