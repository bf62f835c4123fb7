//! Logical file table
//!
//! Maps the file numbers used inside log records to open cache files and,
//! once a header has been replayed, to the tree living in that file.

use crate::brt::{FileNum, TreeHandle};
use crate::cachetable::CacheFileId;
use crate::error::{RecoveryError, Result};

/// One logical file opened during replay
#[derive(Debug)]
pub struct FileEntry {
    pub filenum: FileNum,
    pub cachefile: CacheFileId,
    /// Present from the tree-header record until the tree is closed
    pub tree: Option<TreeHandle>,
}

/// Open logical files, in no particular order
#[derive(Debug, Default)]
pub struct FileTable {
    entries: Vec<FileEntry>,
}

impl FileTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly opened file; a file number may only be open once
    pub fn register(&mut self, filenum: FileNum, cachefile: CacheFileId) -> Result<()> {
        if self.find(filenum).is_some() {
            return Err(RecoveryError::invariant(format!(
                "file {} opened twice",
                filenum
            )));
        }
        self.entries.push(FileEntry {
            filenum,
            cachefile,
            tree: None,
        });
        Ok(())
    }

    pub fn find(&self, filenum: FileNum) -> Option<&FileEntry> {
        self.entries.iter().find(|e| e.filenum == filenum)
    }

    pub fn find_mut(&mut self, filenum: FileNum) -> Option<&mut FileEntry> {
        self.entries.iter_mut().find(|e| e.filenum == filenum)
    }

    /// Like `find_mut`, but an unknown file number is an error
    pub fn get_mut(&mut self, filenum: FileNum) -> Result<&mut FileEntry> {
        self.find_mut(filenum).ok_or(RecoveryError::UnknownFile(filenum))
    }

    /// Stop tracking a file; order of the remaining entries may change
    pub fn remove(&mut self, filenum: FileNum) -> Result<FileEntry> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.filenum == filenum)
            .ok_or(RecoveryError::UnknownFile(filenum))?;
        Ok(self.entries.swap_remove(idx))
    }

    /// Take every entry out of the table
    pub fn drain(&mut self) -> Vec<FileEntry> {
        std::mem::take(&mut self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
