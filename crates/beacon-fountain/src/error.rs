//! Error types for the fountain codec.
//!
//! - [`PacketError`]: malformed, corrupt, or inconsistent packets. Recoverable:
//!   the packet is dropped and decoding continues.
//! - [`DecodeError`]: decoder state-machine errors, some fatal for the session.
//! - [`ConfigError`]: invalid encoder/decoder/distribution parameters.

use thiserror::Error;

// ── Packet Format ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("packet too short: {len} bytes, need at least {min}")]
    TooShort { len: usize, min: usize },
    #[error("unsupported packet version {0:#04x}")]
    BadVersion(u8),
    #[error("unsupported multihash codec {code:#04x} (length {len})")]
    UnsupportedDigest { code: u8, len: u8 },
    #[error("packet references no blocks")]
    EmptyIndices,
    #[error("block indices must be strictly ascending")]
    UnsortedIndices,
    #[error("block index {index} out of range for {block_count} blocks")]
    IndexOutOfRange { index: u32, block_count: u32 },
    #[error("invalid header size {declared}, parsed layout is {parsed} bytes")]
    HeaderSizeMismatch { declared: u32, parsed: usize },
    #[error("block size ({block_size}) does not match payload size ({payload_len})")]
    PayloadSizeMismatch { block_size: u32, payload_len: usize },
    #[error("invalid sizes: total size {total_size}, block size {block_size}")]
    InvalidSizes { total_size: u32, block_size: u32 },
    #[error("payload checksum does not match")]
    DigestMismatch,
    #[error("index {0} is not in this packet")]
    IndexNotInPacket(u32),
    #[error("block length ({got}) must match packet block size ({expected})")]
    LengthMismatch { expected: usize, got: usize },
    #[error("{blocks} blocks supplied for {indices} indices")]
    BlockCountMismatch { blocks: usize, indices: usize },
    #[error("{0} does not fit in a u32 header field")]
    Overflow(&'static str),
}

// ── Decoding ────────────────────────────────────────────────────────

/// Which session parameter a packet disagreed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionField {
    TotalSize,
    BlockSize,
    Digest,
}

impl std::fmt::Display for SessionField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionField::TotalSize => f.write_str("total size"),
            SessionField::BlockSize => f.write_str("block size"),
            SessionField::Digest => f.write_str("message digest"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("decoding not started or canceled")]
    NotDecoding,
    #[error("invalid packet: {0}")]
    Packet(#[from] PacketError),
    #[error("packet does not match the current decoding session ({0})")]
    SessionMismatch(SessionField),
    #[error("decoding canceled")]
    Canceled,
    #[error("decoded message checksum does not match")]
    ChecksumMismatch,
    #[error("message of {total_size} bytes exceeds the {limit} byte limit")]
    MessageTooLarge { total_size: u32, limit: u32 },
}

impl DecodeError {
    /// Whether the current session survives this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DecodeError::Packet(_)
                | DecodeError::SessionMismatch(_)
                | DecodeError::MessageTooLarge { .. }
        )
    }
}

// ── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("block size must be > 0")]
    ZeroBlockSize,
    #[error("cannot encode an empty payload")]
    EmptyPayload,
    #[error("max blocks per packet must be > 0")]
    ZeroMaxBlocks,
    #[error("block count N must be > 0")]
    ZeroBlockCount,
    #[error("spike location M ({m}) must satisfy 1 <= M <= N ({n})")]
    InvalidSpike { m: usize, n: usize },
    #[error("failure probability must be in (0, 1), got {0}")]
    InvalidFailureProbability(f64),
    #[error("unsupported digest algorithm \"{0}\"")]
    UnsupportedDigest(String),
    #[error("{0} does not fit in a u32 header field")]
    TooLarge(&'static str),
    #[error("fallback period must be > 0")]
    ZeroFallbackPeriod,
    #[error("max total size must be > 0")]
    ZeroMaxTotalSize,
    #[error("fps must be > 0")]
    ZeroFps,
    #[error("unsupported config version {0}")]
    UnsupportedVersion(u32),
    #[error("invalid config TOML: {0}")]
    Toml(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_classification() {
        let recoverable = [
            DecodeError::Packet(PacketError::DigestMismatch),
            DecodeError::SessionMismatch(SessionField::BlockSize),
            DecodeError::MessageTooLarge {
                total_size: 10,
                limit: 5,
            },
        ];
        assert!(recoverable.iter().all(DecodeError::is_recoverable));
        assert!(!DecodeError::NotDecoding.is_recoverable());
        assert!(!DecodeError::Canceled.is_recoverable());
        assert!(!DecodeError::ChecksumMismatch.is_recoverable());
    }

    #[test]
    fn display_mentions_field() {
        let err = DecodeError::SessionMismatch(SessionField::BlockSize);
        assert!(err.to_string().contains("block size"));
    }
}
