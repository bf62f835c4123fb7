//! On-disk encoding of nodes and headers
//!
//! ## Block Format
//! ```text
//! ┌──────────┬──────────┬──────────────────────────────┐
//! │ Len (4)  │ CRC (4)  │ bincode(DiskNode | header)   │
//! └──────────┴──────────┴──────────────────────────────┘
//! ```
//! Block `b` starts at byte `b * slot_size(node_size)`. A frame must fit in
//! its slot and is zero-padded to fill it. Block 0 holds the tree header.
//!
//! Bodies use bincode with varint lengths, so a leaf pair or buffered message
//! never takes more room on disk than the byte count it is charged.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

use bincode::Options;
use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{RecoveryError, Result};

use super::{BlockNum, InternalNode, LeafNode, Lsn, NodePayload, TreeHeader, TreeNode};

/// Len (4) + CRC (4)
const FRAME_HEADER_SIZE: usize = 8;

/// A node may outgrow `node_size` between an insert and the split that
/// follows it, so every block reserves this multiple of `node_size` on disk
pub const SLOT_FACTOR: u64 = 2;

/// Bytes reserved on disk for each block of a tree with the given node size
pub fn slot_size(node_size: u32) -> u64 {
    u64::from(node_size) * SLOT_FACTOR
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new().with_varint_encoding()
}

#[derive(Deserialize)]
struct DiskNode {
    block: BlockNum,
    node_size: u32,
    layout_version: u32,
    height: u32,
    rand4: u32,
    flags: u32,
    local_fingerprint: u32,
    lsn: Lsn,
    payload: DiskPayload,
}

#[derive(Deserialize)]
enum DiskPayload {
    Leaf { pairs: Vec<(Vec<u8>, Vec<u8>)> },
    Internal(InternalNode),
}

/// Borrowed twin of `DiskNode`; encodes to the same bytes without copying
/// the leaf entries out of the mempool
#[derive(Serialize)]
struct DiskNodeRef<'a> {
    block: BlockNum,
    node_size: u32,
    layout_version: u32,
    height: u32,
    rand4: u32,
    flags: u32,
    local_fingerprint: u32,
    lsn: Lsn,
    payload: DiskPayloadRef<'a>,
}

#[derive(Serialize)]
enum DiskPayloadRef<'a> {
    Leaf { pairs: LeafPairs<'a> },
    Internal(&'a InternalNode),
}

struct LeafPairs<'a>(&'a LeafNode);

impl Serialize for LeafPairs<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

impl<'a> DiskNodeRef<'a> {
    fn new(node: &'a TreeNode) -> Self {
        let payload = match &node.payload {
            NodePayload::Leaf(leaf) => DiskPayloadRef::Leaf { pairs: LeafPairs(leaf) },
            NodePayload::Internal(internal) => DiskPayloadRef::Internal(internal),
        };
        Self {
            block: node.block,
            node_size: node.node_size,
            layout_version: node.layout_version,
            height: node.height,
            rand4: node.rand4,
            flags: node.flags,
            local_fingerprint: node.local_fingerprint,
            lsn: node.log_lsn,
            payload,
        }
    }
}

// =============================================================================
// Nodes
// =============================================================================

/// Exact length of the frame `encode_node` produces for `node`
pub(super) fn frame_size(node: &TreeNode) -> usize {
    // Sizing only fails on a byte limit, and `codec()` sets none
    let body = codec().serialized_size(&DiskNodeRef::new(node)).unwrap_or(u64::MAX);
    usize::try_from(body).unwrap_or(usize::MAX).saturating_add(FRAME_HEADER_SIZE)
}

/// Encode `node` as a checksummed frame
pub fn encode_node(node: &TreeNode) -> Result<Vec<u8>> {
    let body = codec().serialize(&DiskNodeRef::new(node))?;
    Ok(frame(&body))
}

/// Decode a frame read from `block`
pub fn decode_node(frame: &[u8], block: BlockNum, full_hash: u32) -> Result<TreeNode> {
    let body = unframe(frame, block)?;
    let disk: DiskNode = codec().deserialize(body)?;
    if disk.block != block {
        return Err(RecoveryError::invariant(format!(
            "block {} holds a node that claims to be block {}",
            block, disk.block
        )));
    }

    let payload = match disk.payload {
        DiskPayload::Leaf { pairs } => {
            let size = disk.node_size as usize;
            NodePayload::Leaf(TreeNode::leaf_from_pairs(
                size + size / 4,
                pairs.iter().map(|(k, v)| (k.as_slice(), v.as_slice())),
            ))
        }
        DiskPayload::Internal(internal) => {
            let (children, pivots) = internal.into_parts();
            NodePayload::Internal(TreeNode::internal_from_parts(children, pivots))
        }
    };

    Ok(TreeNode {
        block,
        node_size: disk.node_size,
        layout_version: disk.layout_version,
        height: disk.height,
        rand4: disk.rand4,
        flags: disk.flags,
        local_fingerprint: disk.local_fingerprint,
        dirty: false,
        disk_lsn: disk.lsn,
        log_lsn: disk.lsn,
        full_hash,
        payload,
    })
}

/// Write `node` into its block
pub fn write_node(file: &mut File, node_size: u32, node: &TreeNode) -> Result<()> {
    write_block(file, node_size, node.block, &encode_node(node)?)
}

/// Read the node stored in `block`
pub fn read_node(file: &mut File, node_size: u32, block: BlockNum, full_hash: u32) -> Result<TreeNode> {
    let frame = read_block(file, node_size, block)?;
    decode_node(&frame, block, full_hash)
}

// =============================================================================
// Headers
// =============================================================================

pub fn encode_header(header: &TreeHeader) -> Result<Vec<u8>> {
    let body = codec().serialize(header)?;
    Ok(frame(&body))
}

pub fn decode_header(frame: &[u8]) -> Result<TreeHeader> {
    let body = unframe(frame, BlockNum::HEADER)?;
    Ok(codec().deserialize(body)?)
}

pub fn write_header(file: &mut File, node_size: u32, header: &TreeHeader) -> Result<()> {
    write_block(file, node_size, BlockNum::HEADER, &encode_header(header)?)
}

pub fn read_header(file: &mut File, node_size: u32) -> Result<TreeHeader> {
    let frame = read_block(file, node_size, BlockNum::HEADER)?;
    decode_header(&frame)
}

// =============================================================================
// Framing
// =============================================================================

fn frame(body: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + body.len());
    buf.put_u32_le(body.len() as u32);
    buf.put_u32_le(crc32fast::hash(body));
    buf.put_slice(body);
    buf.to_vec()
}

fn unframe(frame: &[u8], block: BlockNum) -> Result<&[u8]> {
    if frame.len() < FRAME_HEADER_SIZE {
        return Err(RecoveryError::Serialization(format!(
            "block {} frame is {} bytes, shorter than its header",
            block,
            frame.len()
        )));
    }
    let mut header = &frame[..FRAME_HEADER_SIZE];
    let len = header.get_u32_le() as usize;
    let crc = header.get_u32_le();

    let body = &frame[FRAME_HEADER_SIZE..];
    if body.len() != len {
        return Err(RecoveryError::Serialization(format!(
            "block {} frame claims {} bytes, holds {}",
            block,
            len,
            body.len()
        )));
    }
    if crc32fast::hash(body) != crc {
        return Err(RecoveryError::Serialization(format!("block {} checksum mismatch", block)));
    }
    Ok(body)
}

fn block_offset(node_size: u32, block: BlockNum) -> Result<u64> {
    block.0.checked_mul(slot_size(node_size)).ok_or_else(|| {
        RecoveryError::Serialization(format!(
            "block {} is past the addressable end of a file with node size {}",
            block, node_size
        ))
    })
}

/// Write an encoded frame into `block`, zero-filled to the slot boundary
pub fn write_block(file: &mut File, node_size: u32, block: BlockNum, frame: &[u8]) -> Result<()> {
    let slot = slot_size(node_size) as usize;
    if frame.len() > slot {
        return Err(RecoveryError::Serialization(format!(
            "block {} needs {} bytes, slot size is {}",
            block,
            frame.len(),
            slot
        )));
    }
    let offset = block_offset(node_size, block)?;

    let mut buf = BytesMut::with_capacity(slot);
    buf.put_slice(frame);
    buf.resize(slot, 0);

    file.seek(SeekFrom::Start(offset))?;
    file.write_all(&buf)?;
    Ok(())
}

/// Read the frame stored in `block`, header included
pub fn read_block(file: &mut File, node_size: u32, block: BlockNum) -> Result<Vec<u8>> {
    let offset = block_offset(node_size, block)?;
    file.seek(SeekFrom::Start(offset))?;

    let mut frame = vec![0u8; FRAME_HEADER_SIZE];
    file.read_exact(&mut frame)?;
    let len = (&frame[..4]).get_u32_le() as u64;

    if FRAME_HEADER_SIZE as u64 + len > slot_size(node_size) {
        return Err(RecoveryError::Serialization(format!(
            "block {} frame length {} exceeds slot size {}",
            block,
            len,
            slot_size(node_size)
        )));
    }

    frame.resize(FRAME_HEADER_SIZE + len as usize, 0);
    file.read_exact(&mut frame[FRAME_HEADER_SIZE..])?;
    Ok(frame)
}
