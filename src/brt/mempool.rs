//! Leaf memory pool
//!
//! Bump allocator backing a leaf's entries. Freed space is only counted as
//! fragmentation; it is reclaimed when the owning leaf compacts into a new pool.

/// Byte arena with bump allocation and fragmentation accounting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mempool {
    buf: Vec<u8>,
    free_offset: usize,
    frag_size: usize,
}

impl Mempool {
    /// Create a pool with a fixed capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity],
            free_offset: 0,
            frag_size: 0,
        }
    }

    /// Copy `bytes` into the pool, returning their offset, or `None` if full
    pub fn alloc(&mut self, bytes: &[u8]) -> Option<usize> {
        let end = self.free_offset.checked_add(bytes.len())?;
        if end > self.buf.len() {
            return None;
        }
        let offset = self.free_offset;
        self.buf[offset..end].copy_from_slice(bytes);
        self.free_offset = end;
        Some(offset)
    }

    /// Give back `len` bytes previously allocated
    pub fn free(&mut self, len: usize) {
        self.frag_size += len;
        debug_assert!(self.frag_size <= self.free_offset);
    }

    pub fn get(&self, offset: usize, len: usize) -> &[u8] {
        &self.buf[offset..offset + len]
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes handed out and not freed
    pub fn used(&self) -> usize {
        self.free_offset - self.frag_size
    }

    pub fn frag_size(&self) -> usize {
        self.frag_size
    }

    /// Bytes still available for bump allocation
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.free_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_and_get() {
        let mut pool = Mempool::with_capacity(16);
        let a = pool.alloc(b"hello").unwrap();
        let b = pool.alloc(b"world").unwrap();

        assert_eq!(pool.get(a, 5), b"hello");
        assert_eq!(pool.get(b, 5), b"world");
        assert_eq!(pool.used(), 10);
        assert_eq!(pool.remaining(), 6);
    }

    #[test]
    fn test_alloc_when_full() {
        let mut pool = Mempool::with_capacity(4);
        assert!(pool.alloc(b"abcd").is_some());
        assert!(pool.alloc(b"e").is_none());
    }

    #[test]
    fn test_free_counts_fragmentation() {
        let mut pool = Mempool::with_capacity(8);
        pool.alloc(b"abcd").unwrap();
        pool.free(4);

        assert_eq!(pool.used(), 0);
        assert_eq!(pool.frag_size(), 4);
        // Freed space is not reusable until compaction
        assert_eq!(pool.remaining(), 4);
    }
}
