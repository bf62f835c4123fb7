//! Tree headers
//!
//! The header is block 0 of every tree file. During replay it is rebuilt from
//! the logged header record and then edited only by the root, free-block and
//! unused-block records plus the root FIFO records.

use serde::{Deserialize, Serialize};

use crate::error::{RecoveryError, Result};

use super::{BlockNum, BufferedMessage, Fifo};

/// Root encoding carried by a logged header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoggedRoots {
    /// One unnamed root
    Single(BlockNum),
    /// Several named roots (never produced by a live server; rejected on replay)
    Named(Vec<(Vec<u8>, BlockNum)>),
}

/// Header contents as written into the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedHeader {
    pub flags: u32,
    pub node_size: u32,
    pub free_blocks: BlockNum,
    pub unused_blocks: BlockNum,
    pub roots: LoggedRoots,
}

/// In-memory tree header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeHeader {
    /// Changed since it was last written
    #[serde(skip)]
    pub dirty: bool,
    pub panic: Option<String>,
    pub flags: Vec<u32>,
    pub node_size: u32,
    /// Head of the free-block list
    pub free_blocks: BlockNum,
    /// First never-used block
    pub unused_blocks: BlockNum,
    pub root: BlockNum,
    /// Cached page-cache hash of `root`, invalidated whenever the root moves
    #[serde(skip)]
    pub root_hash: Option<u32>,
    /// Messages logged before the tree had a root
    pub fifo: Fifo,
}

impl TreeHeader {
    /// Build a header from its logged form; only the single-root encoding is supported
    pub fn from_logged(logged: &LoggedHeader) -> Result<Self> {
        let root = match &logged.roots {
            LoggedRoots::Single(root) => *root,
            LoggedRoots::Named(_) => {
                return Err(RecoveryError::Unsupported("tree header with named roots"))
            }
        };

        Ok(Self {
            dirty: true,
            panic: None,
            flags: vec![logged.flags],
            node_size: logged.node_size,
            free_blocks: logged.free_blocks,
            unused_blocks: logged.unused_blocks,
            root,
            root_hash: None,
            fifo: Fifo::new(),
        })
    }

    pub fn set_root(&mut self, root: BlockNum) {
        self.root = root;
        self.root_hash = None;
        self.dirty = true;
    }

    pub fn set_free_blocks(&mut self, head: BlockNum) {
        self.free_blocks = head;
        self.dirty = true;
    }

    pub fn set_unused_blocks(&mut self, head: BlockNum) {
        self.unused_blocks = head;
        self.dirty = true;
    }

    pub fn enqueue(&mut self, msg: BufferedMessage) {
        self.fifo.enq(msg);
        self.dirty = true;
    }

    pub fn dequeue(&mut self) -> Result<BufferedMessage> {
        let msg = self
            .fifo
            .deq()
            .ok_or_else(|| RecoveryError::invariant("dequeue from empty root buffer"))?;
        self.dirty = true;
        Ok(msg)
    }
}
