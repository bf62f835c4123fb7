//! Buffered message FIFO
//!
//! Holds commands queued against one child of an internal node, or against
//! the tree header before a root exists.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::{MessageType, TxnId, BRT_CMD_OVERHEAD, KEY_VALUE_OVERHEAD};

/// A {key, value, type, xid} tuple waiting to be pushed down the tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferedMessage {
    pub msg_type: MessageType,
    pub xid: TxnId,
    pub key: Vec<u8>,
    pub val: Vec<u8>,
}

impl BufferedMessage {
    pub fn new(msg_type: MessageType, xid: TxnId, key: Vec<u8>, val: Vec<u8>) -> Self {
        Self { msg_type, xid, key, val }
    }

    /// Bytes this message adds to a buffer's byte count
    pub fn buffered_size(&self) -> usize {
        KEY_VALUE_OVERHEAD + BRT_CMD_OVERHEAD + self.key.len() + self.val.len()
    }

    pub fn checksum(&self) -> u32 {
        super::message_checksum(self.msg_type, self.xid, &self.key, &self.val)
    }
}

/// First-in first-out queue of buffered messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fifo {
    items: VecDeque<BufferedMessage>,
}

impl Fifo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enq(&mut self, msg: BufferedMessage) {
        self.items.push_back(msg);
    }

    /// Look at the oldest message without removing it
    pub fn peek(&self) -> Option<&BufferedMessage> {
        self.items.front()
    }

    pub fn deq(&mut self) -> Option<BufferedMessage> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BufferedMessage> {
        self.items.iter()
    }
}
