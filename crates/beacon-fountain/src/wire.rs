//! # Beacon Wire Format
//!
//! One self-describing packet per frame. All integers are big-endian.
//!
//! ```text
//! +---------+------------+------------+------------+-----------------+
//! | ver (1) | hdr size 4 | total sz 4 | degree (4) | index (4) × deg |
//! +---------+------------+------------+------------+-----------------+
//! | payload digest: 0x12 | 0x20 | sha256 (32)    | block size (4)  |
//! +----------------------------------------------+-----------------+
//! | [message digest: 0x12 | 0x20 | sha256 (32)]  (optional)        |
//! +-----------------------------------------------------------------+
//! | payload (block size bytes) = XOR of the referenced blocks       |
//! +-----------------------------------------------------------------+
//! ```
//!
//! The base header is `1 + 4 + 4 + 4 + 4·degree + 34 + 4` bytes. The message
//! digest extension, when present, adds 34 bytes and is accounted for in the
//! header size field; the payload always starts at `header size`.

use bytes::{Buf, BufMut, BytesMut};

use crate::block::{xor_in_place, xor_into, BlockBuffer};
use crate::digest::{DigestAlgorithm, Multihash, MULTIHASH_LEN};
use crate::error::PacketError;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Packet format version.
pub const VERSION: u8 = 0x01;

/// Header bytes excluding the index list: version, header size, total size,
/// degree, payload digest, block size.
pub const BASE_HEADER_SIZE: usize = 1 + 4 + 4 + 4 + MULTIHASH_LEN + 4;

/// Smallest valid header: one block index.
pub const MIN_HEADER_SIZE: usize = BASE_HEADER_SIZE + 4;

/// Size of the optional message digest extension.
pub const MESSAGE_DIGEST_EXT_LEN: usize = MULTIHASH_LEN;

/// Header length for a packet of `degree` indices.
pub fn header_size(degree: usize, with_message_digest: bool) -> usize {
    let ext = if with_message_digest {
        MESSAGE_DIGEST_EXT_LEN
    } else {
        0
    };
    BASE_HEADER_SIZE + 4 * degree + ext
}

/// Number of `block_size` blocks needed for `total_size` bytes.
pub fn block_count(total_size: usize, block_size: usize) -> usize {
    if block_size == 0 {
        return 0;
    }
    total_size.div_ceil(block_size)
}

/// Largest frame an encoder can emit for a message of `total_size` bytes,
/// including the message digest extension.
pub fn max_packet_size(
    total_size: usize,
    block_size: usize,
    max_blocks_per_packet: usize,
) -> usize {
    let degree = block_count(total_size, block_size).min(max_blocks_per_packet);
    header_size(degree, true) + block_size
}

// ─── Packet Header ───────────────────────────────────────────────────────────

/// Decoded packet header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketHeader {
    /// Format version (must be 1).
    pub version: u8,
    /// Total header length in bytes, as carried on the wire.
    pub header_size: u32,
    /// Length of the whole message.
    pub total_size: u32,
    /// Ascending, distinct source block indices.
    pub indices: Vec<u32>,
    /// Multihash of the payload.
    pub digest: Multihash,
    /// Payload length; also the message block size.
    pub block_size: u32,
    /// Multihash of the whole message, if the sender included it.
    pub message_digest: Option<Multihash>,
}

impl PacketHeader {
    /// Number of blocks combined into this packet.
    pub fn degree(&self) -> usize {
        self.indices.len()
    }

    /// Number of blocks in the message this packet belongs to.
    pub fn message_block_count(&self) -> usize {
        block_count(self.total_size as usize, self.block_size as usize)
    }

    /// Encoded length of this header.
    pub fn encoded_len(&self) -> usize {
        header_size(self.indices.len(), self.message_digest.is_some())
    }

    /// Encode the header into a buffer.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.version);
        buf.put_u32(self.header_size);
        buf.put_u32(self.total_size);
        buf.put_u32(self.indices.len() as u32);
        for &index in &self.indices {
            buf.put_u32(index);
        }
        buf.put_slice(&self.digest.to_bytes());
        buf.put_u32(self.block_size);
        if let Some(mh) = &self.message_digest {
            buf.put_slice(&mh.to_bytes());
        }
    }

    /// Decode a header from the front of `buf`, leaving `buf` at the payload.
    ///
    /// Structural checks only; the payload digest is verified by
    /// [`Packet::parse`].
    pub fn decode(buf: &mut &[u8]) -> Result<Self, PacketError> {
        let start_len = buf.len();
        if start_len < MIN_HEADER_SIZE {
            return Err(PacketError::TooShort {
                len: start_len,
                min: MIN_HEADER_SIZE,
            });
        }

        let version = buf.get_u8();
        if version != VERSION {
            return Err(PacketError::BadVersion(version));
        }
        let header_size = buf.get_u32();
        let total_size = buf.get_u32();
        let degree = buf.get_u32() as usize;
        if degree == 0 {
            return Err(PacketError::EmptyIndices);
        }

        let parsed = BASE_HEADER_SIZE.saturating_add(degree.saturating_mul(4));
        if start_len < parsed {
            return Err(PacketError::TooShort {
                len: start_len,
                min: parsed,
            });
        }
        let mut indices = Vec::with_capacity(degree);
        for _ in 0..degree {
            indices.push(buf.get_u32());
        }

        let digest = Multihash::from_bytes(&buf[..])?;
        buf.advance(digest.encoded_len());
        let block_size = buf.get_u32();

        let message_digest = match (header_size as usize).checked_sub(parsed) {
            Some(0) => None,
            Some(MESSAGE_DIGEST_EXT_LEN) => {
                let mh = Multihash::from_bytes(&buf[..])?;
                buf.advance(mh.encoded_len());
                Some(mh)
            }
            _ => {
                return Err(PacketError::HeaderSizeMismatch {
                    declared: header_size,
                    parsed,
                })
            }
        };

        Ok(PacketHeader {
            version,
            header_size,
            total_size,
            indices,
            digest,
            block_size,
            message_digest,
        })
    }

    /// Semantic checks against the declared message geometry.
    fn validate(&self) -> Result<(), PacketError> {
        if self.block_size == 0 || self.total_size == 0 {
            return Err(PacketError::InvalidSizes {
                total_size: self.total_size,
                block_size: self.block_size,
            });
        }
        validate_indices(&self.indices, self.message_block_count())
    }
}

fn validate_indices(indices: &[u32], block_count: usize) -> Result<(), PacketError> {
    let Some(&last) = indices.last() else {
        return Err(PacketError::EmptyIndices);
    };
    if indices.windows(2).any(|w| w[0] >= w[1]) {
        return Err(PacketError::UnsortedIndices);
    }
    if last as usize >= block_count {
        return Err(PacketError::IndexOutOfRange {
            index: last,
            block_count: block_count as u32,
        });
    }
    Ok(())
}

// ─── Packet ──────────────────────────────────────────────────────────────────

/// A fountain packet: header plus the XOR of its referenced blocks.
///
/// The payload is owned and mutable so the decoder can peel known blocks out
/// of it in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: BytesMut,
}

impl Packet {
    /// Build a packet combining `blocks` (one per entry of `indices`).
    ///
    /// Blocks shorter than `block_size` are treated as zero-padded. The
    /// payload digest is computed with `algorithm`; `message_digest` is
    /// carried in the header extension when given.
    pub fn create<B: AsRef<[u8]>>(
        total_size: usize,
        blocks: &[B],
        indices: Vec<u32>,
        block_size: usize,
        algorithm: DigestAlgorithm,
        message_digest: Option<Multihash>,
    ) -> Result<Self, PacketError> {
        let total_size_u32 =
            u32::try_from(total_size).map_err(|_| PacketError::Overflow("total size"))?;
        let block_size_u32 =
            u32::try_from(block_size).map_err(|_| PacketError::Overflow("block size"))?;
        if total_size == 0 || block_size == 0 {
            return Err(PacketError::InvalidSizes {
                total_size: total_size_u32,
                block_size: block_size_u32,
            });
        }
        if blocks.len() != indices.len() {
            return Err(PacketError::BlockCountMismatch {
                blocks: blocks.len(),
                indices: indices.len(),
            });
        }
        validate_indices(&indices, block_count(total_size, block_size))?;

        let mut payload = BytesMut::zeroed(block_size);
        for block in blocks {
            let block = block.as_ref();
            if block.len() > block_size {
                return Err(PacketError::LengthMismatch {
                    expected: block_size,
                    got: block.len(),
                });
            }
            xor_in_place(&mut payload, block);
        }

        let header_len = header_size(indices.len(), message_digest.is_some());
        let header_size_u32 =
            u32::try_from(header_len).map_err(|_| PacketError::Overflow("header size"))?;
        let header = PacketHeader {
            version: VERSION,
            header_size: header_size_u32,
            total_size: total_size_u32,
            indices,
            digest: algorithm.digest(&payload),
            block_size: block_size_u32,
            message_digest,
        };
        Ok(Packet { header, payload })
    }

    /// Parse and verify a packet.
    pub fn parse(data: &[u8]) -> Result<Self, PacketError> {
        let mut buf = data;
        let header = PacketHeader::decode(&mut buf)?;

        if header.block_size as usize != buf.len() {
            return Err(PacketError::PayloadSizeMismatch {
                block_size: header.block_size,
                payload_len: buf.len(),
            });
        }
        header.validate()?;

        // Not constant-time: this guards against corruption, not tampering.
        if !header.digest.verify(buf) {
            return Err(PacketError::DigestMismatch);
        }

        Ok(Packet {
            header,
            payload: BytesMut::from(buf),
        })
    }

    /// Serialize header and payload into one frame.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.header.encode(&mut buf);
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Frame length.
    pub fn encoded_len(&self) -> usize {
        self.header.encoded_len() + self.payload.len()
    }

    pub fn indices(&self) -> &[u32] {
        &self.header.indices
    }

    pub fn degree(&self) -> usize {
        self.header.degree()
    }

    /// Remove the known block `index` from this packet.
    ///
    /// The block is read from `buffer`. If exactly one index remains
    /// afterwards, the resolved block is written straight into that index's
    /// slot in `buffer` and its index returned; the packet is spent. Otherwise
    /// the payload is reduced in place and `None` is returned.
    pub fn subtract_block(
        &mut self,
        index: u32,
        buffer: &mut BlockBuffer,
    ) -> Result<Option<u32>, PacketError> {
        let pos = self
            .header
            .indices
            .binary_search(&index)
            .map_err(|_| PacketError::IndexNotInPacket(index))?;
        if buffer.block_size() != self.payload.len() {
            return Err(PacketError::LengthMismatch {
                expected: self.payload.len(),
                got: buffer.block_size(),
            });
        }
        self.header.indices.remove(pos);

        if let [remaining] = self.header.indices[..] {
            let (block, target) = buffer.pair_mut(index as usize, remaining as usize);
            xor_into(target, &self.payload, block);
            return Ok(Some(remaining));
        }
        xor_in_place(&mut self.payload, buffer.block(index as usize));
        Ok(None)
    }

    /// Recover block `target_index` as `self ^ other` into `buffer`.
    ///
    /// Valid when the two index sets differ by exactly `target_index`.
    pub fn subtract_packet(
        &self,
        other: &Packet,
        target_index: u32,
        buffer: &mut BlockBuffer,
    ) -> Result<(), PacketError> {
        if self.header.indices.binary_search(&target_index).is_err() {
            return Err(PacketError::IndexNotInPacket(target_index));
        }
        if other.payload.len() != self.payload.len() {
            return Err(PacketError::LengthMismatch {
                expected: self.payload.len(),
                got: other.payload.len(),
            });
        }
        if buffer.block_size() != self.payload.len() {
            return Err(PacketError::LengthMismatch {
                expected: self.payload.len(),
                got: buffer.block_size(),
            });
        }
        xor_into(
            buffer.block_mut(target_index as usize),
            &self.payload,
            &other.payload,
        );
        Ok(())
    }
}
