//! Entry checksums used by node fingerprints
//!
//! A node's fingerprint is the wrapping sum of `rand4 * checksum(entry)` over
//! every entry stored directly in the node. The sum is order-independent, so
//! inserts add a term and deletes subtract the same term.

use crc32fast::Hasher;

use super::{MessageType, TxnId};

/// Checksum of a leaf key/value pair
pub fn kvpair_checksum(key: &[u8], val: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&(key.len() as u32).to_be_bytes());
    hasher.update(key);
    hasher.update(&(val.len() as u32).to_be_bytes());
    hasher.update(val);
    hasher.finalize()
}

/// Checksum of a buffered command
pub fn message_checksum(msg_type: MessageType, xid: TxnId, key: &[u8], val: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&[msg_type.as_u8()]);
    hasher.update(&xid.0.to_be_bytes());
    hasher.update(&(key.len() as u32).to_be_bytes());
    hasher.update(key);
    hasher.update(&(val.len() as u32).to_be_bytes());
    hasher.update(val);
    hasher.finalize()
}

/// One fingerprint term
#[inline]
pub(crate) fn term(rand4: u32, checksum: u32) -> u32 {
    rand4.wrapping_mul(checksum)
}
