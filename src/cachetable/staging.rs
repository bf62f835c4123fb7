//! Write staging
//!
//! Frames written while a run is in progress land in an anonymous scratch
//! file. They reach the tree files only through `promote`, once the whole log
//! has replayed. Dropping the staging area leaves every tree file untouched.
//!
//! ```text
//!   evict / close_file / write_header ──▶ stage(path, block, frame) ──▶ scratch
//!   fetch on miss                     ──▶ read(path, block) ──▶ scratch, else tree file
//!   PageCache::close                  ──▶ promote() ──▶ tree files (sorted, synced)
//! ```

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::brt::{self, BlockNum};
use crate::error::{RecoveryError, Result};

type StageKey = (PathBuf, BlockNum);

/// Where one staged frame lives in the scratch file
#[derive(Debug, Clone, Copy)]
struct StagedFrame {
    offset: u64,
    len: usize,
    /// Room reserved at `offset`; a rewrite that fits reuses it
    capacity: usize,
    node_size: u32,
}

/// Frames waiting to be written into tree files
pub(super) struct Staging {
    /// Directory the scratch file is created in; the system temp dir if unset
    dir: Option<PathBuf>,
    scratch: Option<File>,
    end: u64,
    frames: BTreeMap<StageKey, StagedFrame>,
}

impl Staging {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            scratch: None,
            end: 0,
            frames: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Record the latest frame for `block` of the file at `path`
    pub fn stage(&mut self, path: &Path, block: BlockNum, node_size: u32, frame: &[u8]) -> Result<()> {
        let slot = brt::slot_size(node_size);
        if frame.len() as u64 > slot {
            return Err(RecoveryError::Serialization(format!(
                "block {} of {} needs {} bytes, slot size is {}",
                block,
                path.display(),
                frame.len(),
                slot
            )));
        }

        let key = (path.to_path_buf(), block);
        let (offset, capacity) = match self.frames.get(&key) {
            Some(old) if frame.len() <= old.capacity => (old.offset, old.capacity),
            _ => {
                let offset = self.end;
                self.end += frame.len() as u64;
                (offset, frame.len())
            }
        };

        let scratch = self.scratch()?;
        scratch.seek(SeekFrom::Start(offset))?;
        scratch.write_all(frame)?;

        self.frames.insert(
            key,
            StagedFrame {
                offset,
                len: frame.len(),
                capacity,
                node_size,
            },
        );
        Ok(())
    }

    /// Latest staged frame for `block` of the file at `path`
    pub fn read(&mut self, path: &Path, block: BlockNum) -> Result<Option<Vec<u8>>> {
        let Some(staged) = self.frames.get(&(path.to_path_buf(), block)).copied() else {
            return Ok(None);
        };
        let mut frame = Vec::new();
        self.read_into(&staged, &mut frame)?;
        Ok(Some(frame))
    }

    /// Write every staged frame into its tree file and empty the staging area
    ///
    /// Files are visited in path order and blocks in block order; each file is
    /// synced once all of its blocks are written.
    pub fn promote(&mut self) -> Result<usize> {
        let frames = std::mem::take(&mut self.frames);

        let mut by_file: BTreeMap<&Path, Vec<(BlockNum, StagedFrame)>> = BTreeMap::new();
        for ((path, block), staged) in &frames {
            by_file.entry(path.as_path()).or_default().push((*block, *staged));
        }

        let mut frame = Vec::new();
        for (path, blocks) in by_file {
            let mut file = OpenOptions::new().write(true).open(path)?;
            for (block, staged) in &blocks {
                self.read_into(staged, &mut frame)?;
                brt::write_block(&mut file, staged.node_size, *block, &frame)?;
            }
            file.sync_all()?;
            tracing::debug!(path = %path.display(), blocks = blocks.len(), "promoted staged blocks");
        }

        self.clear();
        Ok(frames.len())
    }

    /// Forget every staged frame and drop the scratch file
    pub fn clear(&mut self) {
        self.frames.clear();
        self.scratch = None;
        self.end = 0;
    }

    fn read_into(&mut self, staged: &StagedFrame, frame: &mut Vec<u8>) -> Result<()> {
        frame.resize(staged.len, 0);
        let scratch = self.scratch()?;
        scratch.seek(SeekFrom::Start(staged.offset))?;
        scratch.read_exact(frame)?;
        Ok(())
    }

    fn scratch(&mut self) -> Result<&mut File> {
        let file = match self.scratch.take() {
            Some(file) => file,
            None => match &self.dir {
                Some(dir) => tempfile::tempfile_in(dir)?,
                None => tempfile::tempfile()?,
            },
        };
        Ok(self.scratch.insert(file))
    }
}
