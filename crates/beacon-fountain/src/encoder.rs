//! # Fountain Encoder
//!
//! Splits a message into fixed-size blocks and emits an endless stream of
//! packets, each the XOR of a random subset of blocks. The subset size is
//! drawn from the robust soliton distribution; the subset itself is uniform
//! without replacement.
//!
//! Any sufficiently large set of packets, received in any order, lets the
//! decoder rebuild the message. The stream never ends on its own; callers
//! stop pulling once the receiver is done.

use std::collections::BTreeSet;

use bytes::{Bytes, BytesMut};
use rand::rngs::StdRng;
use rand::{RngExt as _, SeedableRng};

use crate::config::EncoderConfig;
use crate::degree::DegreeSampler;
use crate::digest::{DigestAlgorithm, Multihash};
use crate::error::{ConfigError, PacketError};
use crate::stats::EncoderStats;
use crate::wire::{self, Packet};

/// Rateless packet source for one message.
pub struct Encoder {
    data: Bytes,
    block_size: usize,
    block_count: usize,
    /// Source blocks, materialized on first use.
    blocks: Vec<Option<Bytes>>,
    sampler: DegreeSampler,
    rng: StdRng,
    max_blocks_per_packet: usize,
    algorithm: DigestAlgorithm,
    message_digest: Option<Multihash>,
    stats: EncoderStats,
}

impl Encoder {
    /// Create an encoder for `data`.
    pub fn new(data: impl Into<Bytes>, config: &EncoderConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let data = data.into();
        if data.is_empty() {
            return Err(ConfigError::EmptyPayload);
        }
        if u32::try_from(data.len()).is_err() {
            return Err(ConfigError::TooLarge("total size"));
        }

        let block_count = wire::block_count(data.len(), config.block_size);
        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        let mut seeder = StdRng::seed_from_u64(seed);
        let sampler =
            DegreeSampler::with_seed(block_count, config.failure_probability, seeder.random())?;

        tracing::debug!(
            total_size = data.len(),
            block_size = config.block_size,
            block_count,
            max_blocks = config.max_blocks_per_packet,
            "encoder created"
        );

        Ok(Encoder {
            data,
            block_size: config.block_size,
            block_count,
            blocks: vec![None; block_count],
            sampler,
            rng: seeder,
            max_blocks_per_packet: config.max_blocks_per_packet,
            algorithm: config.digest,
            message_digest: None,
            stats: EncoderStats::new(),
        })
    }

    pub fn total_size(&self) -> usize {
        self.data.len()
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn block_count(&self) -> usize {
        self.block_count
    }

    pub fn stats(&self) -> &EncoderStats {
        &self.stats
    }

    /// Largest frame this encoder can emit.
    pub fn max_packet_size(&self) -> usize {
        wire::max_packet_size(self.data.len(), self.block_size, self.max_blocks_per_packet)
    }

    /// Digest of the whole message; computed once.
    pub fn message_digest(&mut self) -> Multihash {
        *self
            .message_digest
            .get_or_insert_with(|| self.algorithm.digest(&self.data))
    }

    /// Endless packet stream over this encoder.
    pub fn packets(&mut self) -> Packets<'_> {
        self.message_digest();
        Packets { encoder: self }
    }

    /// Produce one packet.
    pub fn next_packet(&mut self) -> Result<Packet, PacketError> {
        let degree = self
            .sampler
            .next()
            .min(self.max_blocks_per_packet)
            .min(self.block_count);
        let indices = self.sample_indices(degree);
        let blocks: Vec<Bytes> = indices.iter().map(|&i| self.block(i as usize)).collect();
        let message_digest = self.message_digest();

        let packet = Packet::create(
            self.data.len(),
            &blocks,
            indices,
            self.block_size,
            self.algorithm,
            Some(message_digest),
        )?;
        self.stats.record(degree, packet.encoded_len());
        tracing::trace!(degree, indices = ?packet.indices(), "packet encoded");
        Ok(packet)
    }

    /// `k` distinct indices in `0..block_count`, ascending (Floyd's algorithm).
    fn sample_indices(&mut self, k: usize) -> Vec<u32> {
        let n = self.block_count;
        let mut chosen = BTreeSet::new();
        for j in (n - k)..n {
            let t = self.rng.random_range(0..=j) as u32;
            if !chosen.insert(t) {
                chosen.insert(j as u32);
            }
        }
        chosen.into_iter().collect()
    }

    /// Source block `index`: a slice of the message, or a zero-padded copy for
    /// a short final block.
    fn block(&mut self, index: usize) -> Bytes {
        if let Some(block) = &self.blocks[index] {
            return block.clone();
        }
        let start = index * self.block_size;
        let end = (start + self.block_size).min(self.data.len());
        let block = if end - start == self.block_size {
            self.data.slice(start..end)
        } else {
            let mut padded = BytesMut::zeroed(self.block_size);
            padded[..end - start].copy_from_slice(&self.data[start..end]);
            padded.freeze()
        };
        self.blocks[index] = Some(block.clone());
        block
    }
}

/// Endless iterator of encoded packets. See [`Encoder::packets`].
pub struct Packets<'a> {
    encoder: &'a mut Encoder,
}

impl Iterator for Packets<'_> {
    type Item = Result<Packet, PacketError>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.encoder.next_packet())
    }
}
