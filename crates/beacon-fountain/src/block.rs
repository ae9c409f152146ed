//! # Block Buffers
//!
//! XOR primitives and the decoder's reconstruction buffer. A message of
//! `block_count` blocks is held as one contiguous allocation of
//! `block_count * block_size` bytes; block `i` lives at offset
//! `i * block_size`.

use bytes::{Bytes, BytesMut};

/// `dst ^= src`, byte-wise over the shorter of the two.
#[inline]
pub fn xor_in_place(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
}

/// `dst = a ^ b`. `a` and `b` must be at least `dst.len()` long.
#[inline]
pub fn xor_into(dst: &mut [u8], a: &[u8], b: &[u8]) {
    for ((d, x), y) in dst.iter_mut().zip(a).zip(b) {
        *d = x ^ y;
    }
}

/// Contiguous storage for `block_count` fixed-size blocks.
#[derive(Debug, Clone)]
pub struct BlockBuffer {
    data: BytesMut,
    block_size: usize,
}

impl BlockBuffer {
    /// Allocate a zeroed buffer.
    pub fn new(block_count: usize, block_size: usize) -> Self {
        BlockBuffer {
            data: BytesMut::zeroed(block_count * block_size),
            block_size,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Immutable view of block `index`.
    ///
    /// Panics if `index >= block_count`.
    pub fn block(&self, index: usize) -> &[u8] {
        let start = index * self.block_size;
        &self.data[start..start + self.block_size]
    }

    /// Mutable view of block `index`.
    ///
    /// Panics if `index >= block_count`.
    pub fn block_mut(&mut self, index: usize) -> &mut [u8] {
        let start = index * self.block_size;
        &mut self.data[start..start + self.block_size]
    }

    /// Disjoint views of two different blocks: `src` for reading, `dst` for
    /// writing.
    ///
    /// Panics if `src == dst` or either is out of range.
    pub fn pair_mut(&mut self, src: usize, dst: usize) -> (&[u8], &mut [u8]) {
        assert_ne!(src, dst, "source and target block must differ");
        let bs = self.block_size;
        if src < dst {
            let (lo, hi) = self.data.split_at_mut(dst * bs);
            (&lo[src * bs..src * bs + bs], &mut hi[..bs])
        } else {
            let (lo, hi) = self.data.split_at_mut(src * bs);
            (&hi[..bs], &mut lo[dst * bs..dst * bs + bs])
        }
    }

    /// Consume the buffer, returning the first `len` bytes (padding dropped).
    pub fn into_message(mut self, len: usize) -> Bytes {
        self.data.truncate(len);
        self.data.freeze()
    }
}
