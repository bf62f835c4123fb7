//! Shared helpers for building logs and data directories

#![allow(dead_code)]

use std::fs::File;
use std::path::{Path, PathBuf};

use brtrecover::brt::{
    self, BlockNum, FileNum, LoggedHeader, LoggedRoots, Lsn, MessageType, TreeHeader, TreeNode, TxnId,
};
use brtrecover::wal::{LogEntry, LogRecord, LogWriter};
use brtrecover::RecoveryConfig;
use tempfile::TempDir;

pub const NODE_SIZE: u32 = 4096;
pub const TREE_FILE: &str = "tree.brt";
pub const FILENUM: FileNum = FileNum(1);
pub const ROOT_RAND4: u32 = 0x5bd1_e995;
pub const LEAF_RAND4: u32 = 0x2545_f491;

// =============================================================================
// Log Building
// =============================================================================

/// Accumulates records, numbering them with consecutive LSNs from 1
#[derive(Default)]
pub struct LogBuilder {
    entries: Vec<LogEntry>,
}

impl LogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: LogRecord) -> &mut Self {
        let lsn = Lsn(self.entries.len() as u64 + 1);
        self.entries.push(LogEntry::new(lsn, record));
        self
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Write everything into a single segment
    pub fn write_segment(&self, dir: &Path) -> PathBuf {
        self.write_split(dir, &[]).remove(0)
    }

    /// Write the records into consecutive segments, starting a new segment
    /// before each record index in `splits`
    pub fn write_split(&self, dir: &Path, splits: &[usize]) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        let mut index = 0u64;
        let mut writer = LogWriter::create(dir, index).unwrap();

        for (i, entry) in self.entries.iter().enumerate() {
            if splits.contains(&i) {
                writer.sync().unwrap();
                paths.push(writer.path().to_path_buf());
                index += 1;
                writer = LogWriter::create(dir, index).unwrap();
            }
            writer.append(entry).unwrap();
        }
        writer.sync().unwrap();
        paths.push(writer.path().to_path_buf());
        paths
    }
}

pub fn logged_header(root: BlockNum, unused: BlockNum) -> LoggedHeader {
    LoggedHeader {
        flags: 0,
        node_size: NODE_SIZE,
        free_blocks: BlockNum(0),
        unused_blocks: unused,
        roots: LoggedRoots::Single(root),
    }
}

/// Create, open and describe the tree file
pub fn open_tree(log: &mut LogBuilder) {
    log.push(LogRecord::CreateFile {
        txnid: TxnId(1),
        fname: TREE_FILE.to_string(),
        mode: 0o644,
    })
    .push(LogRecord::OpenFile {
        txnid: TxnId(1),
        fname: TREE_FILE.to_string(),
        filenum: FILENUM,
    })
    .push(LogRecord::TreeHeader {
        txnid: TxnId(1),
        filenum: FILENUM,
        header: logged_header(BlockNum(1), BlockNum(4)),
    });
}

pub fn new_node(log: &mut LogBuilder, block: u64, height: u32, rand4: u32) {
    log.push(LogRecord::NewNode {
        filenum: FILENUM,
        block: BlockNum(block),
        height,
        node_size: NODE_SIZE,
        is_dup_sort: false,
        rand4,
    });
}

pub fn insert(log: &mut LogBuilder, block: u64, index: u32, key: &[u8], val: &[u8]) {
    log.push(LogRecord::InsertInLeaf {
        txnid: TxnId(2),
        filenum: FILENUM,
        block: BlockNum(block),
        index,
        key: key.to_vec(),
        val: val.to_vec(),
    });
}

/// A two-level tree exercising every structural record kind
///
/// Final shape: root block 1 over leaves [2, 4, 3] with pivots ["b", "m"];
/// leaf 2 = {a}, leaf 4 = {c}, leaf 3 = {x}; one message buffered for leaf 3.
pub fn full_tree_log() -> LogBuilder {
    let mut log = LogBuilder::new();
    open_tree(&mut log);
    log.push(LogRecord::Begin { txnid: TxnId(2), parent: TxnId(0) });

    new_node(&mut log, 1, 1, ROOT_RAND4);
    new_node(&mut log, 2, 0, LEAF_RAND4);
    new_node(&mut log, 3, 0, LEAF_RAND4);
    log.push(LogRecord::AddChild {
        filenum: FILENUM,
        block: BlockNum(1),
        childnum: 0,
        child: BlockNum(2),
        child_fingerprint: 0,
    })
    .push(LogRecord::AddChild {
        filenum: FILENUM,
        block: BlockNum(1),
        childnum: 1,
        child: BlockNum(3),
        child_fingerprint: 0,
    })
    .push(LogRecord::SetPivot {
        filenum: FILENUM,
        block: BlockNum(1),
        childnum: 0,
        pivot: b"m".to_vec(),
    });

    insert(&mut log, 2, 0, b"a", b"1");
    insert(&mut log, 2, 1, b"c", b"3");
    insert(&mut log, 3, 0, b"x", b"9");
    insert(&mut log, 3, 1, b"z", b"0");
    log.push(LogRecord::DeleteInLeaf {
        txnid: TxnId(2),
        filenum: FILENUM,
        block: BlockNum(3),
        index: 1,
        key: b"z".to_vec(),
        val: b"0".to_vec(),
    });

    log.push(LogRecord::Enqueue {
        filenum: FILENUM,
        block: BlockNum(1),
        childnum: 1,
        xid: TxnId(2),
        msg_type: MessageType::Insert,
        key: b"y".to_vec(),
        val: b"8".to_vec(),
    })
    .push(LogRecord::EnqueueRoot {
        filenum: FILENUM,
        xid: TxnId(2),
        msg_type: MessageType::DeleteAny,
        key: b"q".to_vec(),
        val: Vec::new(),
    })
    .push(LogRecord::DequeueRoot { filenum: FILENUM })
    .push(LogRecord::Checkpoint);

    log.push(LogRecord::LeafSplit {
        filenum: FILENUM,
        old_block: BlockNum(2),
        new_block: BlockNum(4),
        old_count: 2,
        split_at: 1,
        new_node_size: NODE_SIZE,
        new_rand4: LEAF_RAND4 ^ 1,
        is_dup_sort: false,
    })
    .push(LogRecord::ChangeUnusedBlocks {
        filenum: FILENUM,
        old: BlockNum(4),
        new: BlockNum(5),
    })
    .push(LogRecord::AddChild {
        filenum: FILENUM,
        block: BlockNum(1),
        childnum: 1,
        child: BlockNum(4),
        child_fingerprint: 0,
    })
    .push(LogRecord::SetPivot {
        filenum: FILENUM,
        block: BlockNum(1),
        childnum: 0,
        pivot: b"b".to_vec(),
    })
    .push(LogRecord::ChangeChildFingerprint {
        filenum: FILENUM,
        block: BlockNum(1),
        childnum: 1,
        old_fingerprint: 0,
        new_fingerprint: 0xdead_beef,
    })
    .push(LogRecord::Commit { txnid: TxnId(2) })
    .push(LogRecord::CloseFile {
        fname: TREE_FILE.to_string(),
        filenum: FILENUM,
    });
    log
}

// =============================================================================
// Directories and Results
// =============================================================================

/// Fresh data and log directories
pub fn setup_dirs() -> (TempDir, PathBuf, PathBuf) {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    let logs = temp.path().join("logs");
    std::fs::create_dir_all(&data).unwrap();
    std::fs::create_dir_all(&logs).unwrap();
    (temp, data, logs)
}

pub fn config(data: &Path, logs: &Path) -> RecoveryConfig {
    RecoveryConfig::builder().data_dir(data).log_dir(logs).build()
}

pub fn read_tree_header(path: &Path) -> TreeHeader {
    let mut file = File::open(path).unwrap();
    brt::read_header(&mut file, NODE_SIZE).unwrap()
}

pub fn read_tree_node(path: &Path, block: u64) -> TreeNode {
    let mut file = File::open(path).unwrap();
    brt::read_node(&mut file, NODE_SIZE, BlockNum(block), 0).unwrap()
}

pub fn leaf_pairs(node: &TreeNode) -> Vec<(Vec<u8>, Vec<u8>)> {
    node.leaf()
        .unwrap()
        .iter()
        .map(|(k, v)| (k.to_vec(), v.to_vec()))
        .collect()
}
