//! WAL Entry definitions
//!
//! One variant per kind of logged change. Replay matches on every variant, so
//! adding a kind is a compile error until it is handled.

use serde::{Deserialize, Serialize};

use crate::brt::{BlockNum, FileNum, LoggedHeader, Lsn, MessageType, TxnId};
use crate::error::Result;

/// A single entry in the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Log sequence number, increasing across segments
    pub lsn: Lsn,

    /// The logged change
    pub record: LogRecord,
}

/// Changes that can be logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogRecord {
    // -------------------------------------------------------------------------
    // Transactions and checkpoints (no effect on replay)
    // -------------------------------------------------------------------------
    Begin { txnid: TxnId, parent: TxnId },
    Commit { txnid: TxnId },
    Abort { txnid: TxnId },
    Checkpoint,

    // -------------------------------------------------------------------------
    // Files and trees
    // -------------------------------------------------------------------------
    CreateFile { txnid: TxnId, fname: String, mode: u32 },
    OpenFile { txnid: TxnId, fname: String, filenum: FileNum },
    TreeHeader { txnid: TxnId, filenum: FileNum, header: LoggedHeader },
    CloseTree { fname: String, filenum: FileNum },
    CloseFile { fname: String, filenum: FileNum },

    // -------------------------------------------------------------------------
    // Node creation and leaf contents
    // -------------------------------------------------------------------------
    NewNode {
        filenum: FileNum,
        block: BlockNum,
        height: u32,
        node_size: u32,
        is_dup_sort: bool,
        rand4: u32,
    },
    LeafSplit {
        filenum: FileNum,
        old_block: BlockNum,
        new_block: BlockNum,
        old_count: u32,
        split_at: u32,
        new_node_size: u32,
        new_rand4: u32,
        is_dup_sort: bool,
    },
    InsertInLeaf {
        txnid: TxnId,
        filenum: FileNum,
        block: BlockNum,
        index: u32,
        key: Vec<u8>,
        val: Vec<u8>,
    },
    DeleteInLeaf {
        txnid: TxnId,
        filenum: FileNum,
        block: BlockNum,
        index: u32,
        key: Vec<u8>,
        val: Vec<u8>,
    },

    // -------------------------------------------------------------------------
    // Internal node structure
    // -------------------------------------------------------------------------
    AddChild {
        filenum: FileNum,
        block: BlockNum,
        childnum: u32,
        child: BlockNum,
        child_fingerprint: u32,
    },
    DeleteChild {
        filenum: FileNum,
        block: BlockNum,
        childnum: u32,
        child: BlockNum,
        child_fingerprint: u32,
        pivot: Vec<u8>,
    },
    SetChild {
        filenum: FileNum,
        block: BlockNum,
        childnum: u32,
        old_child: BlockNum,
        new_child: BlockNum,
    },
    SetPivot {
        filenum: FileNum,
        block: BlockNum,
        childnum: u32,
        pivot: Vec<u8>,
    },
    ChangeChildFingerprint {
        filenum: FileNum,
        block: BlockNum,
        childnum: u32,
        old_fingerprint: u32,
        new_fingerprint: u32,
    },

    // -------------------------------------------------------------------------
    // Message buffers
    // -------------------------------------------------------------------------
    Enqueue {
        filenum: FileNum,
        block: BlockNum,
        childnum: u32,
        xid: TxnId,
        msg_type: MessageType,
        key: Vec<u8>,
        val: Vec<u8>,
    },
    Dequeue { filenum: FileNum, block: BlockNum, childnum: u32 },
    EnqueueRoot {
        filenum: FileNum,
        xid: TxnId,
        msg_type: MessageType,
        key: Vec<u8>,
        val: Vec<u8>,
    },
    DequeueRoot { filenum: FileNum },

    // -------------------------------------------------------------------------
    // Header fields
    // -------------------------------------------------------------------------
    ChangeUnnamedRoot { filenum: FileNum, old_root: BlockNum, new_root: BlockNum },
    ChangeNamedRoot {
        filenum: FileNum,
        name: Vec<u8>,
        old_root: BlockNum,
        new_root: BlockNum,
    },
    ChangeUnusedBlocks { filenum: FileNum, old: BlockNum, new: BlockNum },
    ChangeFreeBlocks { filenum: FileNum, old: BlockNum, new: BlockNum },
}

impl LogEntry {
    pub fn new(lsn: Lsn, record: LogRecord) -> Self {
        Self { lsn, record }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

impl LogRecord {
    /// Short name used in log output
    pub fn kind(&self) -> &'static str {
        match self {
            LogRecord::Begin { .. } => "begin",
            LogRecord::Commit { .. } => "commit",
            LogRecord::Abort { .. } => "abort",
            LogRecord::Checkpoint => "checkpoint",
            LogRecord::CreateFile { .. } => "fcreate",
            LogRecord::OpenFile { .. } => "fopen",
            LogRecord::TreeHeader { .. } => "fheader",
            LogRecord::CloseTree { .. } => "brtclose",
            LogRecord::CloseFile { .. } => "cfclose",
            LogRecord::NewNode { .. } => "newbrtnode",
            LogRecord::LeafSplit { .. } => "leafsplit",
            LogRecord::InsertInLeaf { .. } => "insertinleaf",
            LogRecord::DeleteInLeaf { .. } => "deleteinleaf",
            LogRecord::AddChild { .. } => "addchild",
            LogRecord::DeleteChild { .. } => "delchild",
            LogRecord::SetChild { .. } => "setchild",
            LogRecord::SetPivot { .. } => "setpivot",
            LogRecord::ChangeChildFingerprint { .. } => "changechildfingerprint",
            LogRecord::Enqueue { .. } => "brtenq",
            LogRecord::Dequeue { .. } => "brtdeq",
            LogRecord::EnqueueRoot { .. } => "enqrootentry",
            LogRecord::DequeueRoot { .. } => "deqrootentry",
            LogRecord::ChangeUnnamedRoot { .. } => "changeunnamedroot",
            LogRecord::ChangeNamedRoot { .. } => "changenamedroot",
            LogRecord::ChangeUnusedBlocks { .. } => "changeunusedmemory",
            LogRecord::ChangeFreeBlocks { .. } => "changeunnamedfreelist",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(LogEntry::decode(&[0xff; 3]).is_err());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(LogRecord::Checkpoint.kind(), "checkpoint");
        assert_eq!(
            LogRecord::DequeueRoot { filenum: FileNum(1) }.kind(),
            "deqrootentry"
        );
    }
}
