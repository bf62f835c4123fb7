//! Tree nodes
//!
//! Every mutation here reproduces one logged structural change. All checks run
//! before anything is modified, so a rejected record leaves the node untouched.

use serde::{Deserialize, Serialize};

use crate::error::{RecoveryError, Result};

use super::fingerprint::{kvpair_checksum, term};
use super::{BlockNum, BufferedMessage, Fifo, Lsn, Mempool, LAYOUT_VERSION, LEAF_ENTRY_OVERHEAD};

// =============================================================================
// Leaf Payload
// =============================================================================

/// Location of one leaf entry inside its node's mempool
///
/// Key and value are stored back to back starting at `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafEntry {
    offset: usize,
    key_len: usize,
    val_len: usize,
}

impl LeafEntry {
    /// Bytes this entry contributes to the leaf's byte count
    pub fn disk_size(&self) -> usize {
        leaf_entry_size(self.key_len, self.val_len)
    }

    fn payload_len(&self) -> usize {
        self.key_len + self.val_len
    }
}

/// Ordered leaf entries backed by a memory pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafNode {
    entries: Vec<LeafEntry>,
    mempool: Mempool,
    n_bytes: usize,
}

impl LeafNode {
    pub fn new(pool_capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            mempool: Mempool::with_capacity(pool_capacity),
            n_bytes: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Key and value of the entry at `idx`
    pub fn pair(&self, idx: usize) -> Option<(&[u8], &[u8])> {
        self.entries.get(idx).map(|e| self.split_entry(e))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.entries.iter().map(move |e| self.split_entry(e))
    }

    /// Occupied payload bytes, overhead included
    pub fn n_bytes(&self) -> usize {
        self.n_bytes
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    fn split_entry(&self, e: &LeafEntry) -> (&[u8], &[u8]) {
        let bytes = self.mempool.get(e.offset, e.payload_len());
        bytes.split_at(e.key_len)
    }

    /// Append in order; used when rebuilding a leaf from disk or a split
    pub(crate) fn push(&mut self, key: &[u8], val: &[u8]) {
        let entry = self.store(key, val);
        self.n_bytes += entry.disk_size();
        self.entries.push(entry);
    }

    fn insert_at(&mut self, idx: usize, key: &[u8], val: &[u8]) {
        let entry = self.store(key, val);
        self.n_bytes += entry.disk_size();
        self.entries.insert(idx, entry);
    }

    fn remove_at(&mut self, idx: usize) -> LeafEntry {
        let entry = self.entries.remove(idx);
        self.mempool.free(entry.payload_len());
        self.n_bytes -= entry.disk_size();
        entry
    }

    fn store(&mut self, key: &[u8], val: &[u8]) -> LeafEntry {
        let mut bytes = Vec::with_capacity(key.len() + val.len());
        bytes.extend_from_slice(key);
        bytes.extend_from_slice(val);

        let offset = match self.mempool.alloc(&bytes) {
            Some(offset) => offset,
            None => {
                self.compact(bytes.len());
                // compact() guarantees room for `bytes`
                self.mempool.alloc(&bytes).unwrap_or_default()
            }
        };

        LeafEntry {
            offset,
            key_len: key.len(),
            val_len: val.len(),
        }
    }

    /// Copy live entries into a fresh pool with room for `extra` more bytes
    fn compact(&mut self, extra: usize) {
        let live = self.mempool.used();
        let capacity = self.mempool.capacity().max(2 * (live + extra));
        let mut pool = Mempool::with_capacity(capacity);

        for entry in &mut self.entries {
            let bytes = self.mempool.get(entry.offset, entry.payload_len());
            entry.offset = pool.alloc(bytes).unwrap_or_default();
        }
        self.mempool = pool;
    }

    /// Recount byte usage from the entries themselves
    fn recount(&mut self) {
        self.n_bytes = self.entries.iter().map(LeafEntry::disk_size).sum();
    }
}

// =============================================================================
// Internal Payload
// =============================================================================

/// One child of an internal node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildSlot {
    /// Block the child lives in
    pub block: BlockNum,
    /// Fingerprint summary of the whole child subtree
    pub subtree_fingerprint: u32,
    /// Estimated number of leaf entries under this child
    pub leaf_estimate: u64,
    /// Messages waiting to be pushed into this child
    pub buffer: Fifo,
    /// Bytes held by `buffer`, overhead included
    pub n_bytes: usize,
}

impl ChildSlot {
    pub fn new(block: BlockNum, subtree_fingerprint: u32) -> Self {
        Self {
            block,
            subtree_fingerprint,
            leaf_estimate: 0,
            buffer: Fifo::new(),
            n_bytes: 0,
        }
    }
}

/// Children, pivots and buffer accounting of an internal node
///
/// A pivot slot is `None` between an add-child and the set-pivot that fills it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalNode {
    children: Vec<ChildSlot>,
    pivots: Vec<Option<Vec<u8>>>,
    total_pivot_len: usize,
    n_bytes_in_buffers: usize,
}

impl InternalNode {
    pub fn n_children(&self) -> usize {
        self.children.len()
    }

    pub fn children(&self) -> &[ChildSlot] {
        &self.children
    }

    pub fn child(&self, childnum: usize) -> Option<&ChildSlot> {
        self.children.get(childnum)
    }

    pub fn pivots(&self) -> &[Option<Vec<u8>>] {
        &self.pivots
    }

    pub fn pivot(&self, idx: usize) -> Option<&[u8]> {
        self.pivots.get(idx).and_then(|p| p.as_deref())
    }

    pub fn total_pivot_len(&self) -> usize {
        self.total_pivot_len
    }

    pub fn n_bytes_in_buffers(&self) -> usize {
        self.n_bytes_in_buffers
    }

    pub(crate) fn into_parts(self) -> (Vec<ChildSlot>, Vec<Option<Vec<u8>>>) {
        (self.children, self.pivots)
    }

    fn check_childnum(&self, childnum: usize) -> Result<()> {
        if childnum >= self.children.len() {
            return Err(RecoveryError::invariant(format!(
                "child {} out of range ({} children)",
                childnum,
                self.children.len()
            )));
        }
        Ok(())
    }
}

/// Height-dependent part of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodePayload {
    Leaf(LeafNode),
    Internal(InternalNode),
}

// =============================================================================
// Tree Node
// =============================================================================

/// Decoded form of one tree page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub block: BlockNum,
    pub node_size: u32,
    pub layout_version: u32,
    /// 0 for leaves
    pub height: u32,
    /// Per-node multiplier for fingerprint terms
    pub rand4: u32,
    pub flags: u32,
    pub local_fingerprint: u32,
    pub dirty: bool,
    /// LSN the node was last written at
    pub disk_lsn: Lsn,
    /// LSN of the last record applied in memory
    pub log_lsn: Lsn,
    pub full_hash: u32,
    pub payload: NodePayload,
}

impl TreeNode {
    /// Create an empty node
    pub fn new(
        block: BlockNum,
        height: u32,
        node_size: u32,
        rand4: u32,
        flags: u32,
        lsn: Lsn,
        full_hash: u32,
    ) -> Self {
        let payload = if height == 0 {
            let size = node_size as usize;
            NodePayload::Leaf(LeafNode::new(size + size / 4))
        } else {
            NodePayload::Internal(InternalNode::default())
        };

        Self {
            block,
            node_size,
            layout_version: LAYOUT_VERSION,
            height,
            rand4,
            flags,
            local_fingerprint: 0,
            dirty: true,
            disk_lsn: lsn,
            log_lsn: lsn,
            full_hash,
            payload,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.payload, NodePayload::Leaf(_))
    }

    pub fn leaf(&self) -> Result<&LeafNode> {
        match &self.payload {
            NodePayload::Leaf(leaf) => Ok(leaf),
            NodePayload::Internal(_) => Err(not_a(self.block, self.height, "leaf")),
        }
    }

    pub fn internal(&self) -> Result<&InternalNode> {
        match &self.payload {
            NodePayload::Internal(node) => Ok(node),
            NodePayload::Leaf(_) => Err(not_a(self.block, self.height, "internal node")),
        }
    }

    fn leaf_mut(&mut self) -> Result<&mut LeafNode> {
        let (block, height) = (self.block, self.height);
        match &mut self.payload {
            NodePayload::Leaf(leaf) => Ok(leaf),
            NodePayload::Internal(_) => Err(not_a(block, height, "leaf")),
        }
    }

    fn internal_mut(&mut self) -> Result<&mut InternalNode> {
        let (block, height) = (self.block, self.height);
        match &mut self.payload {
            NodePayload::Internal(node) => Ok(node),
            NodePayload::Leaf(_) => Err(not_a(block, height, "internal node")),
        }
    }

    fn touch(&mut self, lsn: Lsn) {
        self.log_lsn = lsn;
        self.dirty = true;
    }

    fn add_term(&mut self, checksum: u32) {
        self.local_fingerprint = self.local_fingerprint.wrapping_add(term(self.rand4, checksum));
    }

    fn sub_term(&mut self, checksum: u32) {
        self.local_fingerprint = self.local_fingerprint.wrapping_sub(term(self.rand4, checksum));
    }

    /// Fingerprint computed from scratch over the entries held right now
    pub fn computed_fingerprint(&self) -> u32 {
        match &self.payload {
            NodePayload::Leaf(leaf) => leaf.iter().fold(0u32, |acc, (k, v)| {
                acc.wrapping_add(term(self.rand4, kvpair_checksum(k, v)))
            }),
            NodePayload::Internal(node) => node
                .children
                .iter()
                .flat_map(|c| c.buffer.iter())
                .fold(0u32, |acc, m| acc.wrapping_add(term(self.rand4, m.checksum()))),
        }
    }

    /// Exact length of this node's on-disk frame, reported to the page cache
    pub fn serialized_size(&self) -> usize {
        super::serialize::frame_size(self)
    }

    /// Called after the node has been written back
    pub(crate) fn mark_clean(&mut self) {
        self.disk_lsn = self.log_lsn;
        self.dirty = false;
    }

    // =========================================================================
    // Leaf Mutations
    // =========================================================================

    /// Insert an entry at ordinal position `idx`
    pub fn insert_leaf_entry(&mut self, idx: usize, key: &[u8], val: &[u8], lsn: Lsn) -> Result<()> {
        let leaf = self.leaf_mut()?;
        if idx > leaf.len() {
            return Err(RecoveryError::invariant(format!(
                "leaf insert at {} past end ({} entries)",
                idx,
                leaf.len()
            )));
        }
        leaf.insert_at(idx, key, val);

        self.add_term(kvpair_checksum(key, val));
        self.touch(lsn);
        Ok(())
    }

    /// Remove the entry at ordinal position `idx`, which must hold `key`/`val`
    pub fn delete_leaf_entry(&mut self, idx: usize, key: &[u8], val: &[u8], lsn: Lsn) -> Result<()> {
        let block = self.block;
        let leaf = self.leaf_mut()?;
        match leaf.pair(idx) {
            None => {
                return Err(RecoveryError::invariant(format!(
                    "leaf delete at {} past end ({} entries)",
                    idx,
                    leaf.len()
                )))
            }
            Some((k, v)) if k != key || v != val => {
                return Err(RecoveryError::invariant(format!(
                    "leaf entry {} in block {} does not match the logged pair",
                    idx, block
                )))
            }
            Some(_) => {}
        }
        leaf.remove_at(idx);

        self.sub_term(kvpair_checksum(key, val));
        self.touch(lsn);
        Ok(())
    }

    /// Move every entry at or past `split_at` into a new leaf
    ///
    /// Both fingerprints and byte counts are recomputed from the entries each
    /// side ends up holding.
    #[allow(clippy::too_many_arguments)]
    pub fn split_leaf(
        &mut self,
        new_block: BlockNum,
        old_count: usize,
        split_at: usize,
        new_node_size: u32,
        new_rand4: u32,
        new_flags: u32,
        lsn: Lsn,
        new_hash: u32,
    ) -> Result<TreeNode> {
        let block = self.block;
        let leaf = self.leaf_mut()?;
        if leaf.len() != old_count {
            return Err(RecoveryError::invariant(format!(
                "leaf split of block {}: logged {} entries, node holds {}",
                block,
                old_count,
                leaf.len()
            )));
        }
        if split_at > old_count {
            return Err(RecoveryError::invariant(format!(
                "leaf split point {} past end ({} entries)",
                split_at, old_count
            )));
        }

        let mut new_node = TreeNode::new(new_block, 0, new_node_size, new_rand4, new_flags, lsn, new_hash);
        {
            let moved = leaf.entries.split_off(split_at);
            let new_leaf = new_node.leaf_mut()?;
            for entry in &moved {
                let (k, v) = leaf.split_entry(entry);
                new_leaf.push(k, v);
            }
            for entry in &moved {
                leaf.mempool.free(entry.payload_len());
            }
            leaf.recount();
        }

        self.local_fingerprint = self.computed_fingerprint();
        self.touch(lsn);
        new_node.local_fingerprint = new_node.computed_fingerprint();
        new_node.touch(lsn);

        Ok(new_node)
    }

    // =========================================================================
    // Internal Node Mutations
    // =========================================================================

    /// Insert a child slot at `childnum` with an empty buffer
    ///
    /// The pivot to the left of the new child is left unset until a set-pivot
    /// record fills it.
    pub fn add_child(&mut self, childnum: usize, child: BlockNum, child_fingerprint: u32, lsn: Lsn) -> Result<()> {
        let node = self.internal_mut()?;
        let n = node.children.len();
        if childnum > n {
            return Err(RecoveryError::invariant(format!(
                "add child at {} past end ({} children)",
                childnum, n
            )));
        }
        if n > 0 && childnum == 0 {
            return Err(RecoveryError::invariant(
                "add child at position 0 of a non-empty node",
            ));
        }

        node.children.insert(childnum, ChildSlot::new(child, child_fingerprint));
        if n > 0 {
            node.pivots.insert(childnum - 1, None);
        }

        self.touch(lsn);
        Ok(())
    }

    /// Remove child `childnum` together with the pivot on its left
    pub fn delete_child(&mut self, childnum: usize, child: BlockNum, child_fingerprint: u32, lsn: Lsn) -> Result<()> {
        let node = self.internal_mut()?;
        node.check_childnum(childnum)?;
        if node.children.len() < 3 {
            return Err(RecoveryError::invariant(format!(
                "delete child needs at least 3 children, node has {}",
                node.children.len()
            )));
        }
        if childnum == 0 {
            return Err(RecoveryError::invariant("delete child at position 0"));
        }

        let slot = &node.children[childnum];
        if slot.block != child {
            return Err(RecoveryError::invariant(format!(
                "delete child {}: logged block {}, node has {}",
                childnum, child, slot.block
            )));
        }
        if slot.subtree_fingerprint != child_fingerprint {
            return Err(RecoveryError::invariant(format!(
                "delete child {}: subtree fingerprint mismatch",
                childnum
            )));
        }
        if !slot.buffer.is_empty() || slot.n_bytes != 0 {
            return Err(RecoveryError::invariant(format!(
                "delete child {}: buffer still holds {} messages ({} bytes)",
                childnum,
                slot.buffer.len(),
                slot.n_bytes
            )));
        }

        node.children.remove(childnum);
        if let Some(pivot) = node.pivots.remove(childnum - 1) {
            node.total_pivot_len -= pivot.len();
        }

        self.touch(lsn);
        Ok(())
    }

    /// Point child `childnum` at a different block
    pub fn set_child(&mut self, childnum: usize, old_child: BlockNum, new_child: BlockNum, lsn: Lsn) -> Result<()> {
        let node = self.internal_mut()?;
        node.check_childnum(childnum)?;
        let slot = &mut node.children[childnum];
        if slot.block != old_child {
            return Err(RecoveryError::invariant(format!(
                "set child {}: logged old block {}, node has {}",
                childnum, old_child, slot.block
            )));
        }
        slot.block = new_child;

        self.touch(lsn);
        Ok(())
    }

    /// Replace the pivot at index `idx` (between child `idx` and `idx + 1`)
    pub fn set_pivot(&mut self, idx: usize, pivot: &[u8], lsn: Lsn) -> Result<()> {
        let node = self.internal_mut()?;
        let n_pivots = node.pivots.len();
        let Some(slot) = node.pivots.get_mut(idx) else {
            return Err(RecoveryError::invariant(format!(
                "set pivot {} out of range ({} pivots)",
                idx, n_pivots
            )));
        };
        if let Some(old) = slot.replace(pivot.to_vec()) {
            node.total_pivot_len -= old.len();
        }
        node.total_pivot_len += pivot.len();

        self.touch(lsn);
        Ok(())
    }

    /// Overwrite a child's subtree fingerprint summary
    pub fn change_child_fingerprint(&mut self, childnum: usize, old: u32, new: u32, lsn: Lsn) -> Result<()> {
        let node = self.internal_mut()?;
        node.check_childnum(childnum)?;
        let slot = &mut node.children[childnum];
        if slot.subtree_fingerprint != old {
            return Err(RecoveryError::invariant(format!(
                "child {} fingerprint is {:#010x}, log expected {:#010x}",
                childnum, slot.subtree_fingerprint, old
            )));
        }
        slot.subtree_fingerprint = new;

        self.touch(lsn);
        Ok(())
    }

    /// Append a message to child `childnum`'s buffer
    pub fn enqueue(&mut self, childnum: usize, msg: BufferedMessage, lsn: Lsn) -> Result<()> {
        let checksum = msg.checksum();
        let size = msg.buffered_size();

        let node = self.internal_mut()?;
        node.check_childnum(childnum)?;
        let slot = &mut node.children[childnum];
        slot.buffer.enq(msg);
        slot.n_bytes += size;
        node.n_bytes_in_buffers += size;

        self.add_term(checksum);
        self.touch(lsn);
        Ok(())
    }

    /// Remove the oldest message from child `childnum`'s buffer
    pub fn dequeue(&mut self, childnum: usize, lsn: Lsn) -> Result<BufferedMessage> {
        let node = self.internal_mut()?;
        node.check_childnum(childnum)?;
        let slot = &mut node.children[childnum];
        let (checksum, size) = match slot.buffer.peek() {
            Some(msg) => (msg.checksum(), msg.buffered_size()),
            None => {
                return Err(RecoveryError::invariant(format!(
                    "dequeue from empty buffer of child {}",
                    childnum
                )))
            }
        };
        let msg = slot
            .buffer
            .deq()
            .ok_or_else(|| RecoveryError::invariant("buffer emptied while dequeuing"))?;
        slot.n_bytes -= size;
        node.n_bytes_in_buffers -= size;

        self.sub_term(checksum);
        self.touch(lsn);
        Ok(msg)
    }

    // =========================================================================
    // Rebuilding From Disk
    // =========================================================================

    pub(crate) fn leaf_from_pairs<'a>(
        pool_capacity: usize,
        pairs: impl IntoIterator<Item = (&'a [u8], &'a [u8])>,
    ) -> LeafNode {
        let mut leaf = LeafNode::new(pool_capacity);
        for (k, v) in pairs {
            leaf.push(k, v);
        }
        leaf
    }

    pub(crate) fn internal_from_parts(
        children: Vec<ChildSlot>,
        pivots: Vec<Option<Vec<u8>>>,
    ) -> InternalNode {
        let total_pivot_len = pivots.iter().flatten().map(Vec::len).sum();
        let n_bytes_in_buffers = children.iter().map(|c| c.n_bytes).sum();
        InternalNode {
            children,
            pivots,
            total_pivot_len,
            n_bytes_in_buffers,
        }
    }
}

fn not_a(block: BlockNum, height: u32, what: &str) -> RecoveryError {
    RecoveryError::invariant(format!(
        "block {} (height {}) is not a {}",
        block, height, what
    ))
}

/// Bytes a key/value pair of the given sizes adds to a leaf
pub fn leaf_entry_size(key_len: usize, val_len: usize) -> usize {
    LEAF_ENTRY_OVERHEAD + key_len + val_len
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brt::{MessageType, TxnId};

    fn leaf() -> TreeNode {
        TreeNode::new(BlockNum(1), 0, 4096, 0x1234_5678, 0, Lsn(1), 0)
    }

    fn internal() -> TreeNode {
        TreeNode::new(BlockNum(2), 1, 4096, 0x9abc_def1, 0, Lsn(1), 0)
    }

    #[test]
    fn test_new_leaf_pool_capacity() {
        let node = leaf();
        assert_eq!(node.leaf().unwrap().mempool().capacity(), 4096 + 1024);
        assert!(node.dirty);
        assert_eq!(node.disk_lsn, Lsn(1));
        assert_eq!(node.log_lsn, Lsn(1));
    }

    #[test]
    fn test_leaf_insert_tracks_fingerprint_and_bytes() {
        let mut node = leaf();
        node.insert_leaf_entry(0, b"b", b"2", Lsn(2)).unwrap();
        node.insert_leaf_entry(0, b"a", b"1", Lsn(3)).unwrap();

        let l = node.leaf().unwrap();
        assert_eq!(l.pair(0), Some((&b"a"[..], &b"1"[..])));
        assert_eq!(l.pair(1), Some((&b"b"[..], &b"2"[..])));
        assert_eq!(l.n_bytes(), 2 * leaf_entry_size(1, 1));
        assert_eq!(node.local_fingerprint, node.computed_fingerprint());
        assert_eq!(node.log_lsn, Lsn(3));
    }

    #[test]
    fn test_leaf_insert_past_end_rejected() {
        let mut node = leaf();
        assert!(node.insert_leaf_entry(1, b"a", b"1", Lsn(2)).is_err());
        assert!(node.leaf().unwrap().is_empty());
    }

    #[test]
    fn test_leaf_delete_mismatch_rejected() {
        let mut node = leaf();
        node.insert_leaf_entry(0, b"a", b"1", Lsn(2)).unwrap();
        let before = node.clone();

        assert!(node.delete_leaf_entry(0, b"a", b"2", Lsn(3)).is_err());
        assert_eq!(node, before);
    }

    #[test]
    fn test_leaf_grows_pool_when_full() {
        let mut node = TreeNode::new(BlockNum(1), 0, 16, 7, 0, Lsn(1), 0);
        for i in 0..20u8 {
            node.insert_leaf_entry(i as usize, &[i], b"value", Lsn(2 + i as u64)).unwrap();
        }

        let l = node.leaf().unwrap();
        assert_eq!(l.len(), 20);
        for i in 0..20u8 {
            assert_eq!(l.pair(i as usize), Some((&[i][..], &b"value"[..])));
        }
        assert_eq!(node.local_fingerprint, node.computed_fingerprint());
    }

    #[test]
    fn test_leaf_ops_on_internal_rejected() {
        let mut node = internal();
        assert!(node.insert_leaf_entry(0, b"a", b"1", Lsn(2)).is_err());
    }

    #[test]
    fn test_add_child_inserts_unset_pivot() {
        let mut node = internal();
        node.add_child(0, BlockNum(10), 1, Lsn(2)).unwrap();
        node.add_child(1, BlockNum(11), 2, Lsn(3)).unwrap();
        node.add_child(1, BlockNum(12), 3, Lsn(4)).unwrap();

        let n = node.internal().unwrap();
        let blocks: Vec<_> = n.children().iter().map(|c| c.block).collect();
        assert_eq!(blocks, vec![BlockNum(10), BlockNum(12), BlockNum(11)]);
        assert_eq!(n.pivots().len(), 2);
        assert!(n.pivots().iter().all(Option::is_none));
    }

    #[test]
    fn test_add_child_zero_on_nonempty_rejected() {
        let mut node = internal();
        node.add_child(0, BlockNum(10), 1, Lsn(2)).unwrap();
        assert!(node.add_child(0, BlockNum(11), 1, Lsn(3)).is_err());
    }

    #[test]
    fn test_set_pivot_replaces_and_counts() {
        let mut node = internal();
        node.add_child(0, BlockNum(10), 0, Lsn(2)).unwrap();
        node.add_child(1, BlockNum(11), 0, Lsn(3)).unwrap();
        node.set_pivot(0, b"mmm", Lsn(4)).unwrap();
        node.set_pivot(0, b"zz", Lsn(5)).unwrap();

        let n = node.internal().unwrap();
        assert_eq!(n.pivot(0), Some(&b"zz"[..]));
        assert_eq!(n.total_pivot_len(), 2);
        assert!(node.clone().set_pivot(1, b"x", Lsn(6)).is_err());
    }

    #[test]
    fn test_enqueue_dequeue_accounting() {
        let mut node = internal();
        node.add_child(0, BlockNum(10), 0, Lsn(2)).unwrap();
        let msg = BufferedMessage::new(MessageType::Insert, TxnId(3), b"k".to_vec(), b"v".to_vec());

        node.enqueue(0, msg.clone(), Lsn(3)).unwrap();
        assert_eq!(node.internal().unwrap().n_bytes_in_buffers(), msg.buffered_size());
        assert_eq!(node.local_fingerprint, node.computed_fingerprint());

        let out = node.dequeue(0, Lsn(4)).unwrap();
        assert_eq!(out, msg);
        assert_eq!(node.local_fingerprint, 0);
        assert_eq!(node.internal().unwrap().n_bytes_in_buffers(), 0);
        assert!(node.dequeue(0, Lsn(5)).is_err());
    }

    #[test]
    fn test_set_child_checks_old_block() {
        let mut node = internal();
        node.add_child(0, BlockNum(10), 0, Lsn(2)).unwrap();
        assert!(node.set_child(0, BlockNum(99), BlockNum(20), Lsn(3)).is_err());
        node.set_child(0, BlockNum(10), BlockNum(20), Lsn(3)).unwrap();
        assert_eq!(node.internal().unwrap().child(0).unwrap().block, BlockNum(20));
    }
}
