//! BRT Module
//!
//! In-memory form of the B-tree ("BRT") structures that recovery rebuilds.
//!
//! ## Responsibilities
//! - Tree nodes (leaf and internal) and their incremental fingerprints
//! - Tree headers (free/unused block heads, root, root FIFO)
//! - Per-child message FIFOs and the leaf memory pool
//! - On-disk encoding of nodes and headers
//!
//! ## Node Layout
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ TreeNode                                                      │
//! │   block | height | rand4 | local_fingerprint | disk/log lsn   │
//! ├──────────────────────────────┬────────────────────────────────┤
//! │ Leaf (height == 0)           │ Internal (height > 0)          │
//! │   entries → Mempool bytes    │   children[N]: ChildSlot + Fifo│
//! │   n_bytes                    │   pivots[N-1]                  │
//! └──────────────────────────────┴────────────────────────────────┘
//! ```

mod fifo;
mod fingerprint;
mod header;
mod mempool;
mod node;
mod serialize;
mod tree;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use fifo::{BufferedMessage, Fifo};
pub use fingerprint::{kvpair_checksum, message_checksum};
pub use header::{LoggedHeader, LoggedRoots, TreeHeader};
pub use mempool::Mempool;
pub use node::{leaf_entry_size, ChildSlot, InternalNode, LeafEntry, LeafNode, NodePayload, TreeNode};
pub use serialize::{
    decode_header, decode_node, encode_header, encode_node, read_block, read_header, read_node, slot_size,
    write_block, write_header, write_node, SLOT_FACTOR,
};
pub use tree::{KeyCompare, TreeHandle};

// =============================================================================
// Layout Constants
// =============================================================================

/// Node layout version written by this crate
pub const LAYOUT_VERSION: u32 = 1;

/// Bytes of framing around a key/value pair (two u32 lengths)
pub const KEY_VALUE_OVERHEAD: usize = 8;

/// Bytes the ordered entry index spends per leaf entry
pub const OMT_ITEM_OVERHEAD: usize = 4;

/// Fixed per-entry cost charged to a leaf's byte count
pub const LEAF_ENTRY_OVERHEAD: usize = KEY_VALUE_OVERHEAD + OMT_ITEM_OVERHEAD;

/// Fixed per-message cost of a buffered command (type byte + xid)
pub const BRT_CMD_OVERHEAD: usize = 1 + 8;

/// Tree flag set when the tree allows duplicate keys sorted by value
pub const FLAG_DUPSORT: u32 = 0x1;

// =============================================================================
// Identifiers
// =============================================================================

/// Logical file id used inside log records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileNum(pub u32);

/// Block number inside a tree file (block 0 holds the header)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockNum(pub u64);

/// Log sequence number
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Lsn(pub u64);

/// Transaction id
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxnId(pub u64);

impl BlockNum {
    /// The header block
    pub const HEADER: BlockNum = BlockNum(0);
}

impl fmt::Display for FileNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for BlockNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Message Types
// =============================================================================

/// Kind of a buffered command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    None = 0,
    Insert = 1,
    DeleteAny = 2,
    DeleteBoth = 3,
    AbortAny = 4,
    AbortBoth = 5,
    CommitAny = 6,
    CommitBoth = 7,
}

impl MessageType {
    /// Convert to u8
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}
