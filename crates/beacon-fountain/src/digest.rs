//! # Multihash Digests
//!
//! Payload and message digests are carried as multihashes: a 1-byte codec id,
//! a 1-byte digest length, then the digest. Only SHA-256 (`0x12`, 32 bytes)
//! is supported.

use std::fmt;
use std::str::FromStr;

use sha2::{Digest as _, Sha256};

use crate::error::{ConfigError, PacketError};

/// Multihash codec id for SHA2-256.
pub const MH_SHA2_256: u8 = 0x12;

/// SHA-256 digest length in bytes.
pub const SHA2_256_LEN: usize = 32;

/// Encoded multihash length: codec + length + digest.
pub const MULTIHASH_LEN: usize = 2 + SHA2_256_LEN;

/// Supported digest algorithms.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
}

impl DigestAlgorithm {
    /// Multihash codec id.
    pub fn code(self) -> u8 {
        match self {
            DigestAlgorithm::Sha256 => MH_SHA2_256,
        }
    }

    /// Digest length in bytes.
    pub fn digest_len(self) -> usize {
        match self {
            DigestAlgorithm::Sha256 => SHA2_256_LEN,
        }
    }

    /// Look up an algorithm by multihash codec id and length.
    pub fn from_code(code: u8, len: u8) -> Result<Self, PacketError> {
        match (code, len as usize) {
            (MH_SHA2_256, SHA2_256_LEN) => Ok(DigestAlgorithm::Sha256),
            _ => Err(PacketError::UnsupportedDigest { code, len }),
        }
    }

    /// Hash `data` into a multihash.
    pub fn digest(self, data: &[u8]) -> Multihash {
        match self {
            DigestAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(data);
                Multihash {
                    algorithm: self,
                    bytes: hasher.finalize().into(),
                }
            }
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha-256" | "sha256" | "sha2-256" => Ok(DigestAlgorithm::Sha256),
            other => Err(ConfigError::UnsupportedDigest(other.to_string())),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigestAlgorithm::Sha256 => f.write_str("sha2-256"),
        }
    }
}

/// A multihash-formatted digest value.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Multihash {
    algorithm: DigestAlgorithm,
    bytes: [u8; SHA2_256_LEN],
}

impl Multihash {
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// The raw digest, without the multihash prefix.
    pub fn digest(&self) -> &[u8] {
        &self.bytes
    }

    /// Encoded length including the 2-byte prefix.
    pub fn encoded_len(&self) -> usize {
        2 + self.algorithm.digest_len()
    }

    /// Encode as `codec || length || digest`.
    pub fn to_bytes(&self) -> [u8; MULTIHASH_LEN] {
        let mut out = [0u8; MULTIHASH_LEN];
        out[0] = self.algorithm.code();
        out[1] = self.algorithm.digest_len() as u8;
        out[2..].copy_from_slice(&self.bytes);
        out
    }

    /// Decode from the front of `buf`. `buf` must hold at least the prefix and
    /// the digest it announces.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < 2 {
            return Err(PacketError::TooShort {
                len: buf.len(),
                min: MULTIHASH_LEN,
            });
        }
        let algorithm = DigestAlgorithm::from_code(buf[0], buf[1])?;
        let end = 2 + algorithm.digest_len();
        if buf.len() < end {
            return Err(PacketError::TooShort {
                len: buf.len(),
                min: end,
            });
        }
        let mut bytes = [0u8; SHA2_256_LEN];
        bytes.copy_from_slice(&buf[2..end]);
        Ok(Multihash { algorithm, bytes })
    }

    /// Whether this digest matches `data`. Not constant-time.
    pub fn verify(&self, data: &[u8]) -> bool {
        self.algorithm.digest(data) == *self
    }
}

impl fmt::Debug for Multihash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Multihash({self})")
    }
}

impl fmt::Display for Multihash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.algorithm)?;
        for b in &self.bytes {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl serde::Serialize for Multihash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
