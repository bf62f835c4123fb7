//! PageCache implementation
//!
//! HashMap of resident pages with least-recently-used eviction of unpinned pages.
//! Dirty pages and headers are staged rather than written in place; `close`
//! promotes them into the tree files.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::brt::{self, BlockNum, TreeHeader, TreeNode};
use crate::error::{RecoveryError, Result};

use super::staging::Staging;
use super::CacheFileId;

type PageKey = (CacheFileId, BlockNum);

/// A file opened through the cache
struct CacheFile {
    /// Canonical path; staged frames are keyed by it
    path: PathBuf,
    file: File,
    refcount: u32,
    /// Block size, known once the tree header has been replayed
    node_size: Option<u32>,
}

/// One resident page
struct CachePair {
    node: TreeNode,
    size: usize,
    pin_count: u32,
    dirty: bool,
    last_used: u64,
}

/// Page cache keyed by (file, block)
pub struct PageCache {
    files: HashMap<CacheFileId, CacheFile>,
    pages: HashMap<PageKey, CachePair>,
    next_file_id: u32,
    size_limit: usize,
    size_current: usize,
    clock: u64,
    staging: Staging,
}

impl PageCache {
    /// Create an empty cache that starts evicting past `size_limit` bytes
    ///
    /// Staged writes go to a scratch file in the system temp directory.
    pub fn new(size_limit: usize) -> Self {
        Self::build(size_limit, None)
    }

    /// Like `new`, with the scratch file for staged writes created in `dir`
    pub fn with_scratch_dir(size_limit: usize, dir: &Path) -> Self {
        Self::build(size_limit, Some(dir.to_path_buf()))
    }

    fn build(size_limit: usize, scratch_dir: Option<PathBuf>) -> Self {
        Self {
            files: HashMap::new(),
            pages: HashMap::new(),
            next_file_id: 1,
            size_limit,
            size_current: 0,
            clock: 0,
            staging: Staging::new(scratch_dir),
        }
    }

    /// Hash of a (file, block) pair
    pub fn hash(file: CacheFileId, block: BlockNum) -> u32 {
        super::hash(file, block)
    }

    // =========================================================================
    // Files
    // =========================================================================

    /// Open an existing file read-write with a reference count of one
    pub fn open_file(&mut self, path: &Path) -> Result<CacheFileId> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let path = path.canonicalize()?;
        let id = CacheFileId(self.next_file_id);
        self.next_file_id += 1;

        self.files.insert(
            id,
            CacheFile {
                path,
                file,
                refcount: 1,
                node_size: None,
            },
        );
        tracing::debug!(file = %id, "opened cache file");
        Ok(id)
    }

    pub fn file_refup(&mut self, id: CacheFileId) -> Result<()> {
        self.file_mut(id)?.refcount += 1;
        Ok(())
    }

    /// Attach the tree's block size to a file so its nodes can be read and written
    pub fn set_node_size(&mut self, id: CacheFileId, node_size: u32) -> Result<()> {
        if node_size == 0 {
            return Err(RecoveryError::invariant(format!("file {} given a zero node size", id)));
        }
        self.file_mut(id)?.node_size = Some(node_size);
        Ok(())
    }

    pub fn file_path(&self, id: CacheFileId) -> Option<&Path> {
        self.files.get(&id).map(|f| f.path.as_path())
    }

    pub fn refcount(&self, id: CacheFileId) -> Option<u32> {
        self.files.get(&id).map(|f| f.refcount)
    }

    /// Stage a tree header for block 0 of its file
    pub fn write_header(&mut self, id: CacheFileId, header: &TreeHeader) -> Result<()> {
        let file = self
            .files
            .get(&id)
            .ok_or_else(|| RecoveryError::invariant(format!("cache file {} is not open", id)))?;
        let node_size = file.node_size.unwrap_or(header.node_size);
        let frame = brt::encode_header(header)?;
        self.staging.stage(&file.path, BlockNum::HEADER, node_size, &frame)
    }

    /// Drop one reference; the last one stages dirty pages and closes the file
    pub fn close_file(&mut self, id: CacheFileId) -> Result<()> {
        let file = self.file_mut(id)?;
        file.refcount = file.refcount.saturating_sub(1);
        if file.refcount > 0 {
            return Ok(());
        }
        self.flush_and_remove(id)
    }

    fn file_mut(&mut self, id: CacheFileId) -> Result<&mut CacheFile> {
        self.files
            .get_mut(&id)
            .ok_or_else(|| RecoveryError::invariant(format!("cache file {} is not open", id)))
    }

    fn flush_and_remove(&mut self, id: CacheFileId) -> Result<()> {
        let mut keys: Vec<PageKey> = self.pages.keys().filter(|(f, _)| *f == id).copied().collect();
        keys.sort();

        if let Some((_, block)) = keys.iter().find(|k| self.pages[*k].pin_count > 0) {
            return Err(RecoveryError::invariant(format!(
                "closing file {} while block {} is pinned",
                id, block
            )));
        }

        let file = self
            .files
            .remove(&id)
            .ok_or_else(|| RecoveryError::invariant(format!("cache file {} is not open", id)))?;

        let mut staged = 0usize;
        for key in keys {
            if let Some(mut pair) = self.pages.remove(&key) {
                self.size_current -= pair.size;
                if pair.dirty {
                    stage_pair(&mut self.staging, &file, &mut pair)?;
                    staged += 1;
                }
            }
        }

        tracing::debug!(file = %id, path = %file.path.display(), staged, "closed cache file");
        Ok(())
    }

    // =========================================================================
    // Pages
    // =========================================================================

    /// Insert a new node, leaving it pinned
    pub fn put(&mut self, id: CacheFileId, block: BlockNum, hash: u32, node: TreeNode, size: usize) -> Result<()> {
        check_hash(id, block, hash)?;
        if !self.files.contains_key(&id) {
            return Err(RecoveryError::invariant(format!("cache file {} is not open", id)));
        }
        let key = (id, block);
        if self.pages.contains_key(&key) {
            return Err(RecoveryError::invariant(format!(
                "block {} of file {} is already cached",
                block, id
            )));
        }

        self.make_room(size)?;
        let last_used = self.tick();
        self.size_current += size;
        self.pages.insert(
            key,
            CachePair {
                dirty: node.dirty,
                node,
                size,
                pin_count: 1,
                last_used,
            },
        );
        Ok(())
    }

    /// Pin a node, fetching it if it is not resident
    ///
    /// A staged frame wins over the tree file, which still holds the contents
    /// from before this run.
    pub fn get_and_pin(&mut self, id: CacheFileId, block: BlockNum, hash: u32) -> Result<&mut TreeNode> {
        check_hash(id, block, hash)?;
        let key = (id, block);

        if !self.pages.contains_key(&key) {
            let file = self
                .files
                .get_mut(&id)
                .ok_or_else(|| RecoveryError::invariant(format!("cache file {} is not open", id)))?;
            let node_size = file.node_size.ok_or_else(|| {
                RecoveryError::invariant(format!(
                    "block {} of file {} requested before its tree header",
                    block, id
                ))
            })?;
            let frame = match self.staging.read(&file.path, block)? {
                Some(frame) => frame,
                None => brt::read_block(&mut file.file, node_size, block)?,
            };
            let node = brt::decode_node(&frame, block, hash)?;
            let size = node.serialized_size();

            self.make_room(size)?;
            self.size_current += size;
            self.pages.insert(
                key,
                CachePair {
                    node,
                    size,
                    pin_count: 0,
                    dirty: false,
                    last_used: 0,
                },
            );
        }

        let tick = self.tick();
        let pair = self
            .pages
            .get_mut(&key)
            .ok_or_else(|| RecoveryError::invariant(format!("block {} vanished while pinning", block)))?;
        if pair.node.full_hash != hash {
            return Err(RecoveryError::HashMismatch {
                block,
                expected: pair.node.full_hash,
                found: hash,
            });
        }
        pair.pin_count += 1;
        pair.last_used = tick;
        Ok(&mut pair.node)
    }

    /// Release a pin, recording whether the node changed and its new size
    pub fn unpin(&mut self, id: CacheFileId, block: BlockNum, hash: u32, dirty: bool, size: usize) -> Result<()> {
        let pair = self.pages.get_mut(&(id, block)).ok_or_else(|| {
            RecoveryError::invariant(format!("unpin of block {} which is not cached", block))
        })?;
        if pair.node.full_hash != hash {
            return Err(RecoveryError::HashMismatch {
                block,
                expected: pair.node.full_hash,
                found: hash,
            });
        }
        if pair.pin_count == 0 {
            return Err(RecoveryError::invariant(format!("unpin of unpinned block {}", block)));
        }

        pair.pin_count -= 1;
        if dirty {
            pair.dirty = true;
            pair.node.dirty = true;
        }
        self.size_current = self.size_current - pair.size + size;
        pair.size = size;

        self.make_room(0)
    }

    /// Look at a resident node without pinning it
    pub fn peek(&self, id: CacheFileId, block: BlockNum) -> Option<&TreeNode> {
        self.pages.get(&(id, block)).map(|p| &p.node)
    }

    pub fn is_pinned(&self, id: CacheFileId, block: BlockNum) -> bool {
        self.pages.get(&(id, block)).map_or(false, |p| p.pin_count > 0)
    }

    pub fn n_files(&self) -> usize {
        self.files.len()
    }

    pub fn n_pages(&self) -> usize {
        self.pages.len()
    }

    pub fn size_current(&self) -> usize {
        self.size_current
    }

    /// Blocks written this run that have not reached their tree files yet
    pub fn n_staged(&self) -> usize {
        self.staging.len()
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Stage every dirty page, close every file regardless of reference
    /// counts, then write everything staged into the tree files
    pub fn close(&mut self) -> Result<()> {
        let mut ids: Vec<CacheFileId> = self.files.keys().copied().collect();
        ids.sort();
        for id in ids {
            self.flush_and_remove(id)?;
        }
        self.pages.clear();
        self.size_current = 0;

        let promoted = self.staging.promote()?;
        tracing::info!(blocks = promoted, "wrote replayed blocks to tree files");
        Ok(())
    }

    /// Drop everything without writing
    pub fn discard(&mut self) {
        if !self.pages.is_empty() || !self.staging.is_empty() {
            tracing::warn!(
                pages = self.pages.len(),
                staged = self.staging.len(),
                "discarding replayed pages without writing them"
            );
        }
        self.pages.clear();
        self.files.clear();
        self.staging.clear();
        self.size_current = 0;
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Evict least-recently-used unpinned pages until `incoming` more bytes fit
    fn make_room(&mut self, incoming: usize) -> Result<()> {
        while self.size_current + incoming > self.size_limit {
            let victim = self
                .pages
                .iter()
                .filter(|(_, p)| p.pin_count == 0)
                .min_by_key(|(k, p)| (p.last_used, **k))
                .map(|(k, _)| *k);
            let Some(key) = victim else {
                // Everything resident is pinned; run over the limit
                break;
            };

            if let Some(mut pair) = self.pages.remove(&key) {
                self.size_current -= pair.size;
                if pair.dirty {
                    let file = self.files.get(&key.0).ok_or_else(|| {
                        RecoveryError::invariant(format!("evicting block {} of closed file {}", key.1, key.0))
                    })?;
                    stage_pair(&mut self.staging, file, &mut pair)?;
                }
                tracing::trace!(file = %key.0, block = %key.1, "evicted page");
            }
        }
        Ok(())
    }
}

impl Default for PageCache {
    fn default() -> Self {
        Self::new(64 * 1024 * 1024)
    }
}

fn check_hash(id: CacheFileId, block: BlockNum, hash: u32) -> Result<()> {
    let expected = super::hash(id, block);
    if expected != hash {
        return Err(RecoveryError::HashMismatch {
            block,
            expected,
            found: hash,
        });
    }
    Ok(())
}

fn stage_pair(staging: &mut Staging, file: &CacheFile, pair: &mut CachePair) -> Result<()> {
    let node_size = file.node_size.ok_or_else(|| {
        RecoveryError::invariant(format!(
            "cannot write block {} of {}: no tree header was replayed",
            pair.node.block,
            file.path.display()
        ))
    })?;
    let frame = brt::encode_node(&pair.node)?;
    staging.stage(&file.path, pair.node.block, node_size, &frame)?;
    pair.node.mark_clean();
    pair.dirty = false;
    Ok(())
}
