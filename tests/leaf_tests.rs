//! Tests for leaf replay
//!
//! These tests verify:
//! - Fingerprints equal the sum of terms over the entries still present
//! - Leaf splits conserve entries and recompute both fingerprints
//! - Byte counts follow inserts, deletes and splits

use brtrecover::brt::{kvpair_checksum, leaf_entry_size, BlockNum, Lsn, TreeNode};

// =============================================================================
// Helper Functions
// =============================================================================

const RAND4: u32 = 0xc2b2_ae35;

fn new_leaf(rand4: u32) -> TreeNode {
    TreeNode::new(BlockNum(7), 0, 4096, rand4, 0, Lsn(1), 0)
}

/// Sum of `rand4 * checksum` over the given pairs
fn expected_fingerprint(rand4: u32, pairs: &[(&[u8], &[u8])]) -> u32 {
    pairs
        .iter()
        .fold(0u32, |acc, (k, v)| acc.wrapping_add(rand4.wrapping_mul(kvpair_checksum(k, v))))
}

fn pairs_of(node: &TreeNode) -> Vec<(Vec<u8>, Vec<u8>)> {
    node.leaf()
        .unwrap()
        .iter()
        .map(|(k, v)| (k.to_vec(), v.to_vec()))
        .collect()
}

fn numbered(i: usize) -> (Vec<u8>, Vec<u8>) {
    (format!("key{:03}", i).into_bytes(), format!("value-{}", i).into_bytes())
}

// =============================================================================
// Fingerprint Tests
// =============================================================================

#[test]
fn test_insert_two_delete_first() {
    let mut node = new_leaf(RAND4);
    node.insert_leaf_entry(0, b"apple", b"red", Lsn(2)).unwrap();
    node.insert_leaf_entry(1, b"banana", b"yellow", Lsn(3)).unwrap();
    node.delete_leaf_entry(0, b"apple", b"red", Lsn(4)).unwrap();

    assert_eq!(pairs_of(&node), vec![(b"banana".to_vec(), b"yellow".to_vec())]);
    assert_eq!(
        node.local_fingerprint,
        RAND4.wrapping_mul(kvpair_checksum(b"banana", b"yellow"))
    );
    assert_eq!(node.leaf().unwrap().n_bytes(), leaf_entry_size(6, 6));
    assert_eq!(node.log_lsn, Lsn(4));
    assert!(node.dirty);
}

#[test]
fn test_fingerprint_independent_of_order() {
    let pairs: Vec<_> = (0..6).map(numbered).collect();

    // Ascending inserts
    let mut forward = new_leaf(RAND4);
    for (i, (k, v)) in pairs.iter().enumerate() {
        forward.insert_leaf_entry(i, k, v, Lsn(i as u64 + 2)).unwrap();
    }

    // Descending inserts, always at the front
    let mut backward = new_leaf(RAND4);
    for (k, v) in pairs.iter().rev() {
        backward.insert_leaf_entry(0, k, v, Lsn(2)).unwrap();
    }

    assert_eq!(pairs_of(&forward), pairs_of(&backward));
    assert_eq!(forward.local_fingerprint, backward.local_fingerprint);

    let refs: Vec<(&[u8], &[u8])> = pairs.iter().map(|(k, v)| (&k[..], &v[..])).collect();
    assert_eq!(forward.local_fingerprint, expected_fingerprint(RAND4, &refs));
}

#[test]
fn test_fingerprint_after_interleaved_deletes() {
    let mut node = new_leaf(RAND4);
    let pairs: Vec<_> = (0..8).map(numbered).collect();
    for (i, (k, v)) in pairs.iter().enumerate() {
        node.insert_leaf_entry(i, k, v, Lsn(2)).unwrap();
    }

    // Remove entries 1, 4 and 6 (positions shift after each delete)
    for (position, original) in [(1usize, 1usize), (3, 4), (4, 6)] {
        let (k, v) = &pairs[original];
        node.delete_leaf_entry(position, k, v, Lsn(3)).unwrap();
    }

    let remaining: Vec<(&[u8], &[u8])> = [0usize, 2, 3, 5, 7]
        .iter()
        .map(|&i| (&pairs[i].0[..], &pairs[i].1[..]))
        .collect();
    assert_eq!(node.local_fingerprint, expected_fingerprint(RAND4, &remaining));
    assert_eq!(node.local_fingerprint, node.computed_fingerprint());

    let expected_bytes: usize = remaining.iter().map(|(k, v)| leaf_entry_size(k.len(), v.len())).sum();
    assert_eq!(node.leaf().unwrap().n_bytes(), expected_bytes);
}

#[test]
fn test_delete_everything_returns_to_zero() {
    let mut node = new_leaf(RAND4);
    node.insert_leaf_entry(0, b"k", b"v", Lsn(2)).unwrap();
    node.insert_leaf_entry(1, b"l", b"w", Lsn(3)).unwrap();
    node.delete_leaf_entry(1, b"l", b"w", Lsn(4)).unwrap();
    node.delete_leaf_entry(0, b"k", b"v", Lsn(5)).unwrap();

    assert_eq!(node.local_fingerprint, 0);
    assert_eq!(node.leaf().unwrap().n_bytes(), 0);
    assert!(node.leaf().unwrap().is_empty());
}

#[test]
fn test_delete_past_end_rejected() {
    let mut node = new_leaf(RAND4);
    node.insert_leaf_entry(0, b"k", b"v", Lsn(2)).unwrap();
    let before = node.clone();

    assert!(node.delete_leaf_entry(1, b"k", b"v", Lsn(3)).is_err());
    assert_eq!(node, before);
}

// =============================================================================
// Leaf Split Tests
// =============================================================================

#[test]
fn test_split_conserves_entries() {
    let mut node = new_leaf(RAND4);
    let pairs: Vec<_> = (0..10).map(numbered).collect();
    for (i, (k, v)) in pairs.iter().enumerate() {
        node.insert_leaf_entry(i, k, v, Lsn(2)).unwrap();
    }
    let original = pairs_of(&node);

    let new_rand4 = 0x1b87_3593;
    let right = node
        .split_leaf(BlockNum(8), 10, 4, 4096, new_rand4, 0, Lsn(20), 99)
        .unwrap();

    let left_pairs = pairs_of(&node);
    let right_pairs = pairs_of(&right);
    assert_eq!(left_pairs.len(), 4);
    assert_eq!(right_pairs.len(), 6);

    let mut union = left_pairs.clone();
    union.extend(right_pairs.clone());
    assert_eq!(union, original);

    let left_refs: Vec<(&[u8], &[u8])> = left_pairs.iter().map(|(k, v)| (&k[..], &v[..])).collect();
    let right_refs: Vec<(&[u8], &[u8])> = right_pairs.iter().map(|(k, v)| (&k[..], &v[..])).collect();
    assert_eq!(node.local_fingerprint, expected_fingerprint(RAND4, &left_refs));
    assert_eq!(right.local_fingerprint, expected_fingerprint(new_rand4, &right_refs));

    let left_bytes: usize = left_refs.iter().map(|(k, v)| leaf_entry_size(k.len(), v.len())).sum();
    let right_bytes: usize = right_refs.iter().map(|(k, v)| leaf_entry_size(k.len(), v.len())).sum();
    assert_eq!(node.leaf().unwrap().n_bytes(), left_bytes);
    assert_eq!(right.leaf().unwrap().n_bytes(), right_bytes);

    assert_eq!(right.block, BlockNum(8));
    assert_eq!(right.full_hash, 99);
    assert_eq!(right.log_lsn, Lsn(20));
    assert_eq!(node.log_lsn, Lsn(20));
}

#[test]
fn test_split_at_ends() {
    let mut node = new_leaf(RAND4);
    node.insert_leaf_entry(0, b"a", b"1", Lsn(2)).unwrap();
    node.insert_leaf_entry(1, b"b", b"2", Lsn(3)).unwrap();

    let empty = node.split_leaf(BlockNum(8), 2, 2, 4096, 5, 0, Lsn(4), 0).unwrap();
    assert!(empty.leaf().unwrap().is_empty());
    assert_eq!(empty.local_fingerprint, 0);
    assert_eq!(node.leaf().unwrap().len(), 2);

    let all = node.split_leaf(BlockNum(9), 2, 0, 4096, 5, 0, Lsn(5), 0).unwrap();
    assert_eq!(all.leaf().unwrap().len(), 2);
    assert!(node.leaf().unwrap().is_empty());
    assert_eq!(node.local_fingerprint, 0);
}

#[test]
fn test_split_count_mismatch_rejected() {
    let mut node = new_leaf(RAND4);
    node.insert_leaf_entry(0, b"a", b"1", Lsn(2)).unwrap();
    let before = node.clone();

    assert!(node.split_leaf(BlockNum(8), 3, 1, 4096, 5, 0, Lsn(3), 0).is_err());
    assert!(node.split_leaf(BlockNum(8), 1, 2, 4096, 5, 0, Lsn(3), 0).is_err());
    assert_eq!(node, before);
}

#[test]
fn test_split_of_internal_rejected() {
    let mut node = TreeNode::new(BlockNum(7), 1, 4096, RAND4, 0, Lsn(1), 0);
    assert!(node.split_leaf(BlockNum(8), 0, 0, 4096, 5, 0, Lsn(2), 0).is_err());
}
