//! # Decode Session
//!
//! Reconstruction state for one message: the block buffer, which blocks are
//! known, and the packets still waiting on two or more unknown blocks.
//!
//! ```text
//!   packet ──▶ absorb ──┬── degree 1 ──────────────▶ block ──┐
//!                       ├── one unknown after peel ─▶ block ──┤
//!                       └── ≥ 2 unknown ──▶ pending           ▼
//!                                              ▲         cascade ──▶ done?
//!                                              └── subtract ◀──┘
//! ```
//!
//! Pending packets live in a slab. `pending` maps each unknown block index to
//! the slab keys of the packets that still reference it. When the peeling
//! cascade stalls, an intersection pass looks for a degree-`i` packet and a
//! degree-`i-1` packet whose index sets differ in exactly one block.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use slab::Slab;

use crate::block::BlockBuffer;
use crate::config::DecoderConfig;
use crate::digest::Multihash;
use crate::error::{DecodeError, PacketError, SessionField};
use crate::stats::{Decoded, DecoderStats, Progress};
use crate::wire::{Packet, PacketHeader};

// ─── Session Parameters ─────────────────────────────────────────────────────

/// Message geometry adopted from the first packet of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionParams {
    pub total_size: u32,
    pub block_size: u32,
    pub block_count: u32,
    pub message_digest: Option<Multihash>,
}

impl SessionParams {
    pub fn from_header(header: &PacketHeader) -> Self {
        SessionParams {
            total_size: header.total_size,
            block_size: header.block_size,
            block_count: header.message_block_count() as u32,
            message_digest: header.message_digest,
        }
    }

    /// Whether `header` belongs to the message these parameters describe.
    pub fn check(&self, header: &PacketHeader) -> Result<(), DecodeError> {
        if header.total_size != self.total_size {
            return Err(DecodeError::SessionMismatch(SessionField::TotalSize));
        }
        if header.block_size != self.block_size {
            return Err(DecodeError::SessionMismatch(SessionField::BlockSize));
        }
        if header.message_digest != self.message_digest {
            return Err(DecodeError::SessionMismatch(SessionField::Digest));
        }
        Ok(())
    }
}

// ─── Intersection ───────────────────────────────────────────────────────────

/// The one index in `longer` that is missing from `shorter`, provided
/// `longer` is exactly `shorter` plus that index. Both lists must be sorted.
pub fn single_difference(longer: &[u32], shorter: &[u32]) -> Option<u32> {
    if longer.len() != shorter.len() + 1 {
        return None;
    }
    let mut diff = None;
    let mut j = 0;
    for &x in longer {
        if j < shorter.len() && shorter[j] == x {
            j += 1;
        } else if diff.is_none() {
            diff = Some(x);
        } else {
            return None;
        }
    }
    if j == shorter.len() { diff } else { None }
}

// ─── Session ────────────────────────────────────────────────────────────────

pub struct DecodeSession {
    params: SessionParams,
    buffer: BlockBuffer,
    recovered: Vec<bool>,
    received_blocks: u32,
    received_packets: u64,
    packets: Slab<Packet>,
    pending: HashMap<u32, BTreeSet<usize>>,
    fallback_period: u64,
    stats: DecoderStats,
}

impl DecodeSession {
    pub fn new(params: SessionParams, config: &DecoderConfig) -> Self {
        let block_count = params.block_count as usize;
        let fallback_period = config
            .fallback_period
            .map(u64::from)
            .unwrap_or(params.block_count as u64)
            .max(1);
        DecodeSession {
            params,
            buffer: BlockBuffer::new(block_count, params.block_size as usize),
            recovered: vec![false; block_count],
            received_blocks: 0,
            received_packets: 0,
            packets: Slab::new(),
            pending: HashMap::new(),
            fallback_period,
            stats: DecoderStats::default(),
        }
    }

    pub fn params(&self) -> &SessionParams {
        &self.params
    }

    pub fn stats(&self) -> &DecoderStats {
        &self.stats
    }

    pub fn is_complete(&self) -> bool {
        self.received_blocks == self.params.block_count
    }

    /// Packets waiting on two or more unknown blocks.
    pub fn pending_packets(&self) -> usize {
        self.packets.len()
    }

    pub fn is_recovered(&self, index: u32) -> bool {
        self.recovered.get(index as usize).copied().unwrap_or(false)
    }

    pub fn progress(&self) -> Progress {
        Progress {
            received_packets: self.received_packets,
            received_blocks: self.received_blocks,
            total_blocks: self.params.block_count,
            done: self.is_complete(),
        }
    }

    /// Fold one verified packet of this session into the decode state.
    pub fn receive(&mut self, packet: Packet) -> Result<(), PacketError> {
        self.received_packets += 1;
        let mut worklist = Vec::new();
        if let Some(index) = self.absorb(packet)? {
            worklist.push(index);
        }
        self.cascade(worklist)
    }

    /// Reduce a fresh packet by every known block. Returns the block it
    /// resolved, if any; otherwise the packet is parked as pending.
    fn absorb(&mut self, mut packet: Packet) -> Result<Option<u32>, PacketError> {
        if let [index] = packet.indices()[..] {
            if self.recovered[index as usize] {
                self.stats.redundant_packets += 1;
                return Ok(None);
            }
            self.buffer
                .block_mut(index as usize)
                .copy_from_slice(&packet.payload);
            self.mark(index);
            return Ok(Some(index));
        }

        let known: Vec<u32> = packet
            .indices()
            .iter()
            .copied()
            .filter(|&i| self.recovered[i as usize])
            .collect();
        if known.len() == packet.degree() {
            self.stats.redundant_packets += 1;
            return Ok(None);
        }

        for index in known {
            // The last remaining index is always an unknown one.
            if let Some(resolved) = packet.subtract_block(index, &mut self.buffer)? {
                self.mark(resolved);
                self.stats.peeled_blocks += 1;
                return Ok(Some(resolved));
            }
        }

        let key = self.packets.insert(packet);
        for &index in self.packets[key].indices() {
            self.pending.entry(index).or_default().insert(key);
        }
        Ok(None)
    }

    /// Peel newly recovered blocks out of pending packets until nothing more
    /// resolves, running the intersection pass on schedule when peeling
    /// stalls.
    fn cascade(&mut self, mut worklist: Vec<u32>) -> Result<(), PacketError> {
        loop {
            while let Some(index) = worklist.pop() {
                if self.is_complete() {
                    return Ok(());
                }
                let Some(keys) = self.pending.remove(&index) else {
                    continue;
                };
                for key in keys {
                    let Some(packet) = self.packets.get_mut(key) else {
                        continue;
                    };
                    // Never overwrite a recovered block.
                    let other = match *packet.indices() {
                        [a, b] => Some(if a == index { b } else { a }),
                        _ => None,
                    };
                    if other.is_some_and(|i| self.recovered[i as usize]) {
                        self.remove_packet(key);
                        continue;
                    }
                    if let Some(resolved) = packet.subtract_block(index, &mut self.buffer)? {
                        self.remove_packet(key);
                        self.mark(resolved);
                        self.stats.peeled_blocks += 1;
                        tracing::trace!(block = resolved, via = index, "block peeled");
                        worklist.push(resolved);
                    }
                }
            }

            if self.is_complete() || self.received_packets % self.fallback_period != 0 {
                return Ok(());
            }
            worklist = self.intersect()?;
            if worklist.is_empty() {
                return Ok(());
            }
            tracing::debug!(
                recovered = worklist.len(),
                pending = self.packets.len(),
                "intersection fallback recovered blocks"
            );
        }
    }

    /// Pairwise scan of pending packets of adjacent degrees.
    fn intersect(&mut self) -> Result<Vec<u32>, PacketError> {
        let mut by_degree: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (key, packet) in &self.packets {
            by_degree.entry(packet.degree()).or_default().push(key);
        }

        let mut found = Vec::new();
        let Some(&max_degree) = by_degree.keys().next_back() else {
            return Ok(found);
        };
        for degree in (2..=max_degree).rev() {
            let longer = by_degree.get(&degree);
            let shorter = by_degree.get(&(degree - 1));
            let (Some(longer), Some(shorter)) = (longer, shorter) else {
                continue;
            };
            for &a in longer {
                for &b in shorter {
                    let (pa, pb) = (&self.packets[a], &self.packets[b]);
                    let Some(index) = single_difference(pa.indices(), pb.indices()) else {
                        continue;
                    };
                    if self.recovered[index as usize] {
                        continue;
                    }
                    pa.subtract_packet(pb, index, &mut self.buffer)?;
                    self.mark(index);
                    self.stats.intersection_blocks += 1;
                    found.push(index);
                }
            }
        }
        Ok(found)
    }

    fn mark(&mut self, index: u32) {
        self.recovered[index as usize] = true;
        self.received_blocks += 1;
    }

    /// Drop a pending packet and unregister it everywhere.
    fn remove_packet(&mut self, key: usize) {
        let Some(packet) = self.packets.try_remove(key) else {
            return;
        };
        for index in packet.indices() {
            if let Some(keys) = self.pending.get_mut(index) {
                keys.remove(&key);
                if keys.is_empty() {
                    self.pending.remove(index);
                }
            }
        }
    }

    /// Consume a complete session, verifying the message digest if the
    /// sender provided one.
    pub fn finish(self) -> Result<Decoded, DecodeError> {
        let params = self.params;
        let data = self.buffer.into_message(params.total_size as usize);
        if let Some(expected) = &params.message_digest {
            if !expected.verify(&data) {
                return Err(DecodeError::ChecksumMismatch);
            }
        }
        Ok(Decoded {
            total_size: params.total_size,
            block_size: params.block_size,
            digest: params.message_digest,
            total_blocks: params.block_count,
            received_blocks: self.received_blocks,
            received_packets: self.received_packets,
            done: true,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::DigestAlgorithm;

    const BS: usize = 2;

    fn blocks() -> Vec<[u8; BS]> {
        (0..6u8).map(|i| [i * 2 + 1, i * 2 + 2]).collect()
    }

    fn packet(indices: &[u32]) -> Packet {
        let all = blocks();
        let refs: Vec<&[u8]> = indices.iter().map(|&i| &all[i as usize][..]).collect();
        let indices = indices.to_vec();
        Packet::create(12, &refs, indices, BS, DigestAlgorithm::Sha256, None).unwrap()
    }

    fn session(period: Option<u32>) -> DecodeSession {
        let params = SessionParams::from_header(&packet(&[0]).header);
        DecodeSession::new(
            params,
            &DecoderConfig {
                fallback_period: period,
                ..DecoderConfig::default()
            },
        )
    }

    #[test]
    fn single_difference_cases() {
        assert_eq!(single_difference(&[1, 2, 5], &[1, 2]), Some(5));
        assert_eq!(single_difference(&[0, 1, 2], &[1, 2]), Some(0));
        assert_eq!(single_difference(&[1, 3, 5], &[1, 2]), None);
        assert_eq!(single_difference(&[1, 2], &[1, 2]), None);
        assert_eq!(single_difference(&[1, 2, 3, 4], &[1, 2]), None);
        assert_eq!(single_difference(&[3, 4], &[5]), None);
        assert_eq!(single_difference(&[7], &[]), Some(7));
    }

    #[test]
    fn params_mismatch_is_reported_by_field() {
        let params = SessionParams::from_header(&packet(&[0]).header);
        let mut other = packet(&[1]).header;
        assert!(params.check(&other).is_ok());
        other.block_size = 4;
        assert_eq!(
            params.check(&other),
            Err(DecodeError::SessionMismatch(SessionField::BlockSize))
        );
        other.block_size = 2;
        other.total_size = 11;
        assert_eq!(
            params.check(&other),
            Err(DecodeError::SessionMismatch(SessionField::TotalSize))
        );
        other.total_size = 12;
        other.message_digest = Some(DigestAlgorithm::Sha256.digest(b"x"));
        assert_eq!(
            params.check(&other),
            Err(DecodeError::SessionMismatch(SessionField::Digest))
        );
    }

    #[test]
    fn degree_one_and_duplicates() {
        let mut s = session(None);
        s.receive(packet(&[3])).unwrap();
        s.receive(packet(&[3])).unwrap();
        let p = s.progress();
        assert_eq!(p.received_packets, 2);
        assert_eq!(p.received_blocks, 1);
        assert_eq!(s.stats().redundant_packets, 1);
        assert_eq!(s.buffer.block(3), &blocks()[3]);
    }

    #[test]
    fn peeling_cascade_resolves_chain() {
        let mut s = session(None);
        s.receive(packet(&[0, 1])).unwrap();
        s.receive(packet(&[1, 2, 3])).unwrap();
        s.receive(packet(&[2, 3])).unwrap();
        assert_eq!(s.progress().received_blocks, 0);
        assert_eq!(s.pending_packets(), 3);

        // 0 → 1 → (2,3 still pair) ; then 3 → 2
        s.receive(packet(&[0])).unwrap();
        assert!(s.is_recovered(1));
        assert!(!s.is_recovered(2));
        s.receive(packet(&[3])).unwrap();
        assert!(s.is_recovered(2));
        assert_eq!(s.pending_packets(), 0);
        for i in 0..4 {
            assert_eq!(s.buffer.block(i), &blocks()[i]);
        }
    }

    #[test]
    fn known_blocks_are_subtracted_on_arrival() {
        let mut s = session(None);
        s.receive(packet(&[4])).unwrap();
        s.receive(packet(&[2, 4])).unwrap();
        assert!(s.is_recovered(2));
        assert_eq!(s.buffer.block(2), &blocks()[2]);
        assert_eq!(s.stats().peeled_blocks, 1);

        // fully known packet is dropped
        s.receive(packet(&[2, 4])).unwrap();
        assert_eq!(s.pending_packets(), 0);
        assert_eq!(s.stats().redundant_packets, 1);
    }

    #[test]
    fn resolved_duplicate_is_not_written() {
        let mut s = session(None);
        s.receive(packet(&[1, 2])).unwrap();
        s.receive(packet(&[0, 1, 2])).unwrap();
        s.receive(packet(&[0, 2])).unwrap();
        s.receive(packet(&[2])).unwrap();
        for i in 0..3 {
            assert_eq!(s.buffer.block(i), &blocks()[i], "block {i}");
        }
        assert_eq!(s.progress().received_blocks, 3);
        assert_eq!(s.pending_packets(), 0);
    }

    #[test]
    fn intersection_fallback_recovers_difference() {
        let mut s = session(Some(2));
        s.receive(packet(&[1, 2, 5])).unwrap();
        assert!(!s.is_recovered(5));
        s.receive(packet(&[1, 2])).unwrap();
        assert!(s.is_recovered(5));
        assert_eq!(s.buffer.block(5), &blocks()[5]);
        assert_eq!(s.stats().intersection_blocks, 1);
        assert_eq!(s.progress().received_blocks, 1);
    }

    #[test]
    fn fallback_waits_for_its_period() {
        let mut s = session(Some(3));
        s.receive(packet(&[1, 2, 5])).unwrap();
        s.receive(packet(&[1, 2])).unwrap();
        assert!(!s.is_recovered(5));
        s.receive(packet(&[3, 4])).unwrap();
        assert!(s.is_recovered(5));
    }

    #[test]
    fn complete_session_finishes() {
        let mut s = session(None);
        for i in 0..6 {
            s.receive(packet(&[i])).unwrap();
        }
        assert!(s.is_complete());
        let decoded = s.finish().unwrap();
        let expected: Vec<u8> = blocks().concat();
        assert_eq!(&decoded.data[..], &expected[..]);
        assert_eq!(decoded.total_blocks, 6);
        assert_eq!(decoded.received_packets, 6);
        assert!(decoded.done);
    }

    #[test]
    fn finish_checks_message_digest() {
        let mut header = packet(&[0]).header;
        header.message_digest = Some(DigestAlgorithm::Sha256.digest(b"something else"));
        let params = SessionParams::from_header(&header);
        let mut s = DecodeSession::new(params, &DecoderConfig::default());
        for i in 0..6 {
            s.receive(packet(&[i])).unwrap();
        }
        assert_eq!(s.finish().unwrap_err(), DecodeError::ChecksumMismatch);
    }
}
