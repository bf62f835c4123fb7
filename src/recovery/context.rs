//! Recovery context
//!
//! Everything one replay run mutates: the page cache and the logical file
//! table. Records are applied through `apply` (see `dispatch`).

use std::path::{Path, PathBuf};

use crate::brt::{BlockNum, FileNum, Lsn, TreeHandle, TreeNode};
use crate::cachetable::{self, CacheFileId, PageCache};
use crate::error::{RecoveryError, Result};

use super::files::FileTable;

/// State of one replay run
pub struct RecoveryContext {
    /// Absolute root that file names in log records are resolved against
    pub(super) data_dir: PathBuf,
    pub(super) cache: PageCache,
    pub(super) files: FileTable,
    pub(super) last_lsn: Option<Lsn>,
    closed: bool,
}

impl RecoveryContext {
    pub fn new(data_dir: &Path, cache_size: usize) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            cache: PageCache::with_scratch_dir(cache_size, data_dir),
            files: FileTable::new(),
            last_lsn: None,
            closed: false,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    pub fn files(&self) -> &FileTable {
        &self.files
    }

    /// LSN of the last record applied
    pub fn last_lsn(&self) -> Option<Lsn> {
        self.last_lsn
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Resident node for (`filenum`, `block`), if it is cached
    pub fn peek_node(&self, filenum: FileNum, block: BlockNum) -> Option<&TreeNode> {
        let cachefile = self.files.find(filenum)?.cachefile;
        self.cache.peek(cachefile, block)
    }

    /// Open tree for `filenum`, if a header has been replayed for it
    pub fn tree(&self, filenum: FileNum) -> Option<&TreeHandle> {
        self.files.find(filenum)?.tree.as_ref()
    }

    /// Close every tree and file, then write headers and dirty nodes into
    /// the tree files
    ///
    /// Nothing replayed reaches a tree file before this call. Safe to call
    /// more than once; later calls do nothing. Every entry is closed even if
    /// an earlier one fails, and the first failure is returned.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut first_error = None;
        for entry in self.files.drain() {
            let result = match entry.tree {
                Some(tree) => tree.close(&mut self.cache),
                None => self.cache.close_file(entry.cachefile),
            };
            if let Err(e) = result {
                tracing::error!(file = %entry.filenum, error = %e, "failed to close file");
                first_error.get_or_insert(e);
            }
        }

        if let Err(e) = self.cache.close() {
            first_error.get_or_insert(e);
        }

        match first_error {
            Some(e) => {
                self.cache.discard();
                Err(e)
            }
            None => Ok(()),
        }
    }

    // =========================================================================
    // Handler Helpers
    // =========================================================================

    pub(super) fn cachefile(&self, filenum: FileNum) -> Result<CacheFileId> {
        self.files
            .find(filenum)
            .map(|e| e.cachefile)
            .ok_or(RecoveryError::UnknownFile(filenum))
    }

    /// Cache file of a tree whose header has been replayed
    pub(super) fn tree_cachefile(&self, filenum: FileNum) -> Result<CacheFileId> {
        let entry = self.files.find(filenum).ok_or(RecoveryError::UnknownFile(filenum))?;
        match entry.tree {
            Some(_) => Ok(entry.cachefile),
            None => Err(RecoveryError::NoTree(filenum)),
        }
    }

    pub(super) fn tree_mut(&mut self, filenum: FileNum) -> Result<&mut TreeHandle> {
        self.files
            .get_mut(filenum)?
            .tree
            .as_mut()
            .ok_or(RecoveryError::NoTree(filenum))
    }

    /// Pin a node, run `f` on it, and unpin it
    ///
    /// The node is unpinned dirty when `f` succeeds and clean when it fails;
    /// node mutations check everything before changing anything.
    pub(super) fn with_pinned<T>(
        &mut self,
        filenum: FileNum,
        block: BlockNum,
        f: impl FnOnce(&mut TreeNode) -> Result<T>,
    ) -> Result<T> {
        let cachefile = self.cachefile(filenum)?;
        let hash = cachetable::hash(cachefile, block);

        let node = self.cache.get_and_pin(cachefile, block, hash)?;
        let outcome = f(&mut *node);
        let size = node.serialized_size();

        match outcome {
            Ok(value) => {
                self.cache.unpin(cachefile, block, hash, true, size)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(unpin_err) = self.cache.unpin(cachefile, block, hash, false, size) {
                    tracing::warn!(block = %block, error = %unpin_err, "unpin after failed record also failed");
                }
                Err(e)
            }
        }
    }
}

impl Drop for RecoveryContext {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!(
                files = self.files.len(),
                pages = self.cache.n_pages(),
                "recovery context dropped before close; discarding replayed state"
            );
            self.files.drain();
            self.cache.discard();
        }
    }
}
