//! # Codec Statistics
//!
//! Progress snapshots and counters for the encoder and decoder. All types are
//! serializable so they can be logged or exported as JSON.

use bytes::Bytes;
use serde::Serialize;

use crate::digest::Multihash;

// ─── Encoder Stats ──────────────────────────────────────────────────────────

/// Encoder-side counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EncoderStats {
    /// Packets produced.
    pub packets_emitted: u64,
    /// Encoded bytes produced (headers included).
    pub bytes_emitted: u64,
    /// Sum of degrees over all emitted packets.
    pub degree_sum: u64,
    /// Packets that carried exactly one block.
    pub degree_one_packets: u64,
}

impl EncoderStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mean packet degree.
    pub fn mean_degree(&self) -> f64 {
        if self.packets_emitted == 0 {
            0.0
        } else {
            self.degree_sum as f64 / self.packets_emitted as f64
        }
    }

    pub(crate) fn record(&mut self, degree: usize, encoded_len: usize) {
        self.packets_emitted += 1;
        self.bytes_emitted += encoded_len as u64;
        self.degree_sum += degree as u64;
        if degree == 1 {
            self.degree_one_packets += 1;
        }
    }
}

// ─── Decoder Progress ───────────────────────────────────────────────────────

/// Snapshot of decoder progress after a packet is enqueued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Packets accepted into the current session (duplicates included).
    pub received_packets: u64,
    /// Source blocks recovered so far.
    pub received_blocks: u32,
    /// Blocks in the message; 0 before the first packet.
    pub total_blocks: u32,
    /// Whether the message is fully recovered.
    pub done: bool,
}

impl Progress {
    /// Recovered fraction in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.total_blocks == 0 {
            0.0
        } else {
            self.received_blocks as f64 / self.total_blocks as f64
        }
    }
}

/// Counters the decoder keeps beyond plain progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecoderStats {
    /// Packets rejected by the codec (bad digest, malformed header).
    pub invalid_packets: u64,
    /// Packets rejected for belonging to another session.
    pub mismatched_packets: u64,
    /// Packets that carried no new information on arrival.
    pub redundant_packets: u64,
    /// Blocks recovered by the peeling cascade.
    pub peeled_blocks: u64,
    /// Blocks recovered by the pairwise-intersection fallback.
    pub intersection_blocks: u64,
}

// ─── Decoded Message ────────────────────────────────────────────────────────

/// A fully recovered message, with the session parameters it was decoded
/// under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decoded {
    pub total_size: u32,
    pub block_size: u32,
    /// Whole-message digest, if the sender included one.
    pub digest: Option<Multihash>,
    pub total_blocks: u32,
    pub received_blocks: u32,
    pub received_packets: u64,
    pub done: bool,
    #[serde(skip)]
    pub data: Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoder_mean_degree() {
        let mut s = EncoderStats::new();
        assert_eq!(s.mean_degree(), 0.0);
        s.record(1, 100);
        s.record(3, 108);
        assert_eq!(s.packets_emitted, 2);
        assert_eq!(s.bytes_emitted, 208);
        assert_eq!(s.degree_one_packets, 1);
        assert!((s.mean_degree() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn progress_fraction() {
        let p = Progress {
            received_packets: 7,
            received_blocks: 3,
            total_blocks: 4,
            done: false,
        };
        assert!((p.fraction() - 0.75).abs() < f64::EPSILON);
        assert_eq!(Progress::default().fraction(), 0.0);
    }

    #[test]
    fn decoded_serializes_without_data() {
        let d = Decoded {
            total_size: 5,
            block_size: 4,
            digest: None,
            total_blocks: 2,
            received_blocks: 2,
            received_packets: 3,
            done: true,
            data: Bytes::from_static(b"hello"),
        };
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["total_size"], 5);
        assert_eq!(json["done"], true);
        assert!(json.get("data").is_none());
    }
}
