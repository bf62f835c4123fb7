//! Record dispatch
//!
//! One handler per log record kind. Each handler reproduces the logged change
//! exactly; any mismatch between the log and the replayed state is fatal.

use std::fs::{self, File};

use crate::brt::{
    BlockNum, BufferedMessage, FileNum, LoggedHeader, Lsn, TreeHandle, TreeHeader, TreeNode, FLAG_DUPSORT,
};
use crate::cachetable;
use crate::error::{RecoveryError, Result};
use crate::wal::{LogEntry, LogRecord};

use super::RecoveryContext;

impl RecoveryContext {
    /// Apply one log entry
    pub fn apply(&mut self, entry: &LogEntry) -> Result<()> {
        let lsn = entry.lsn;
        tracing::trace!(lsn = %lsn, kind = entry.record.kind(), "replaying record");

        match &entry.record {
            LogRecord::Begin { .. }
            | LogRecord::Commit { .. }
            | LogRecord::Abort { .. }
            | LogRecord::Checkpoint => {}

            LogRecord::CreateFile { fname, mode, .. } => self.create_file(fname, *mode)?,
            LogRecord::OpenFile { fname, filenum, .. } => self.open_file(fname, *filenum)?,
            LogRecord::TreeHeader { filenum, header, .. } => self.tree_header(*filenum, header)?,
            LogRecord::CloseTree { filenum, .. } => self.close_tree(*filenum)?,
            LogRecord::CloseFile { filenum, .. } => self.close_file(*filenum)?,

            LogRecord::NewNode {
                filenum,
                block,
                height,
                node_size,
                is_dup_sort,
                rand4,
            } => self.new_node(*filenum, *block, *height, *node_size, *is_dup_sort, *rand4, lsn)?,

            LogRecord::LeafSplit {
                filenum,
                old_block,
                new_block,
                old_count,
                split_at,
                new_node_size,
                new_rand4,
                is_dup_sort,
            } => {
                let split = LeafSplit {
                    old_block: *old_block,
                    new_block: *new_block,
                    old_count: *old_count as usize,
                    split_at: *split_at as usize,
                    new_node_size: *new_node_size,
                    new_rand4: *new_rand4,
                    is_dup_sort: *is_dup_sort,
                };
                self.leaf_split(*filenum, split, lsn)?
            }

            LogRecord::InsertInLeaf {
                filenum,
                block,
                index,
                key,
                val,
                ..
            } => self.with_pinned(*filenum, *block, |node| {
                node.insert_leaf_entry(*index as usize, key, val, lsn)
            })?,

            LogRecord::DeleteInLeaf {
                filenum,
                block,
                index,
                key,
                val,
                ..
            } => self.with_pinned(*filenum, *block, |node| {
                node.delete_leaf_entry(*index as usize, key, val, lsn)
            })?,

            LogRecord::AddChild {
                filenum,
                block,
                childnum,
                child,
                child_fingerprint,
            } => self.with_pinned(*filenum, *block, |node| {
                node.add_child(*childnum as usize, *child, *child_fingerprint, lsn)
            })?,

            // The logged pivot only matters for undo
            LogRecord::DeleteChild {
                filenum,
                block,
                childnum,
                child,
                child_fingerprint,
                ..
            } => self.with_pinned(*filenum, *block, |node| {
                node.delete_child(*childnum as usize, *child, *child_fingerprint, lsn)
            })?,

            LogRecord::SetChild {
                filenum,
                block,
                childnum,
                old_child,
                new_child,
            } => self.with_pinned(*filenum, *block, |node| {
                node.set_child(*childnum as usize, *old_child, *new_child, lsn)
            })?,

            LogRecord::SetPivot {
                filenum,
                block,
                childnum,
                pivot,
            } => self.with_pinned(*filenum, *block, |node| {
                node.set_pivot(*childnum as usize, pivot, lsn)
            })?,

            LogRecord::ChangeChildFingerprint {
                filenum,
                block,
                childnum,
                old_fingerprint,
                new_fingerprint,
            } => self.with_pinned(*filenum, *block, |node| {
                node.change_child_fingerprint(*childnum as usize, *old_fingerprint, *new_fingerprint, lsn)
            })?,

            LogRecord::Enqueue {
                filenum,
                block,
                childnum,
                xid,
                msg_type,
                key,
                val,
            } => {
                let msg = BufferedMessage::new(*msg_type, *xid, key.clone(), val.clone());
                self.with_pinned(*filenum, *block, |node| node.enqueue(*childnum as usize, msg, lsn))?
            }

            LogRecord::Dequeue {
                filenum,
                block,
                childnum,
            } => {
                self.with_pinned(*filenum, *block, |node| node.dequeue(*childnum as usize, lsn))?;
            }

            LogRecord::EnqueueRoot {
                filenum,
                xid,
                msg_type,
                key,
                val,
            } => {
                let msg = BufferedMessage::new(*msg_type, *xid, key.clone(), val.clone());
                self.tree_mut(*filenum)?.header.enqueue(msg);
            }

            LogRecord::DequeueRoot { filenum } => {
                self.tree_mut(*filenum)?.header.dequeue()?;
            }

            LogRecord::ChangeUnnamedRoot { filenum, new_root, .. } => {
                self.tree_mut(*filenum)?.header.set_root(*new_root);
            }

            LogRecord::ChangeNamedRoot { .. } => {
                return Err(RecoveryError::Unsupported("named root change"));
            }

            LogRecord::ChangeUnusedBlocks { filenum, new, .. } => {
                self.tree_mut(*filenum)?.header.set_unused_blocks(*new);
            }

            LogRecord::ChangeFreeBlocks { filenum, new, .. } => {
                self.tree_mut(*filenum)?.header.set_free_blocks(*new);
            }
        }

        self.last_lsn = Some(lsn);
        Ok(())
    }

    // =========================================================================
    // Files and Trees
    // =========================================================================

    fn create_file(&mut self, fname: &str, mode: u32) -> Result<()> {
        let path = self.data_dir.join(fname);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        set_mode(&file, mode)?;

        tracing::debug!(path = %path.display(), mode, "created file");
        Ok(())
    }

    fn open_file(&mut self, fname: &str, filenum: FileNum) -> Result<()> {
        if self.files.find(filenum).is_some() {
            return Err(RecoveryError::invariant(format!("file {} opened twice", filenum)));
        }
        let path = self.data_dir.join(fname);
        let cachefile = self.cache.open_file(&path)?;
        self.files.register(filenum, cachefile)?;

        tracing::debug!(file = %filenum, path = %path.display(), "opened file");
        Ok(())
    }

    fn tree_header(&mut self, filenum: FileNum, logged: &LoggedHeader) -> Result<()> {
        let header = TreeHeader::from_logged(logged)?;
        let entry = self.files.get_mut(filenum)?;
        self.cache.set_node_size(entry.cachefile, header.node_size)?;

        if let Some(tree) = &mut entry.tree {
            tree.replace_header(header);
            return Ok(());
        }
        entry.tree = Some(TreeHandle::new(entry.cachefile, header));
        Ok(())
    }

    /// Close the tree but keep the file open for a later close-file record
    fn close_tree(&mut self, filenum: FileNum) -> Result<()> {
        let entry = self.files.get_mut(filenum)?;
        let tree = entry.tree.take().ok_or(RecoveryError::NoTree(filenum))?;
        self.cache.file_refup(entry.cachefile)?;
        tree.close(&mut self.cache)
    }

    fn close_file(&mut self, filenum: FileNum) -> Result<()> {
        let entry = self.files.remove(filenum)?;
        match entry.tree {
            Some(tree) => tree.close(&mut self.cache)?,
            None => self.cache.close_file(entry.cachefile)?,
        }
        tracing::debug!(file = %filenum, "closed file");
        Ok(())
    }

    // =========================================================================
    // Node Creation
    // =========================================================================

    #[allow(clippy::too_many_arguments)]
    fn new_node(
        &mut self,
        filenum: FileNum,
        block: BlockNum,
        height: u32,
        node_size: u32,
        is_dup_sort: bool,
        rand4: u32,
        lsn: Lsn,
    ) -> Result<()> {
        if block == BlockNum::HEADER {
            return Err(RecoveryError::invariant("new node logged at the header block"));
        }
        let cachefile = self.tree_cachefile(filenum)?;
        let hash = cachetable::hash(cachefile, block);

        let node = TreeNode::new(block, height, node_size, rand4, dup_sort_flags(is_dup_sort), lsn, hash);
        let size = node.serialized_size();
        self.cache.put(cachefile, block, hash, node, size)?;
        self.cache.unpin(cachefile, block, hash, true, size)
    }

    fn leaf_split(&mut self, filenum: FileNum, split: LeafSplit, lsn: Lsn) -> Result<()> {
        if split.new_block == BlockNum::HEADER || split.new_block == split.old_block {
            return Err(RecoveryError::invariant(format!(
                "leaf split of block {} into block {}",
                split.old_block, split.new_block
            )));
        }
        let cachefile = self.tree_cachefile(filenum)?;
        let new_hash = cachetable::hash(cachefile, split.new_block);

        let new_node = self.with_pinned(filenum, split.old_block, |old| {
            old.split_leaf(
                split.new_block,
                split.old_count,
                split.split_at,
                split.new_node_size,
                split.new_rand4,
                dup_sort_flags(split.is_dup_sort),
                lsn,
                new_hash,
            )
        })?;

        let size = new_node.serialized_size();
        self.cache.put(cachefile, split.new_block, new_hash, new_node, size)?;
        self.cache.unpin(cachefile, split.new_block, new_hash, true, size)
    }
}

/// Fields of a leaf-split record
struct LeafSplit {
    old_block: BlockNum,
    new_block: BlockNum,
    old_count: usize,
    split_at: usize,
    new_node_size: u32,
    new_rand4: u32,
    is_dup_sort: bool,
}

fn dup_sort_flags(is_dup_sort: bool) -> u32 {
    if is_dup_sort {
        FLAG_DUPSORT
    } else {
        0
    }
}

#[cfg(unix)]
fn set_mode(file: &File, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(mode & 0o7777))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_file: &File, _mode: u32) -> Result<()> {
    Ok(())
}

