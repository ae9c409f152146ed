//! # beacon-fountain
//!
//! Rateless erasure code for one-way, lossy channels.
//!
//! A message is split into fixed-size blocks. The encoder emits an endless
//! stream of self-describing packets, each the XOR of a random subset of
//! blocks whose size follows the robust soliton distribution. A decoder that
//! collects slightly more packets than there are blocks, in any order and
//! with any duplicates, recovers the message by peeling, falling back to
//! pairwise intersection when peeling stalls. Every packet carries a SHA-256
//! multihash of its payload; the whole message is verified at the end.
//!
//! ## Crate structure
//!
//! - [`distribution`] — Ideal and robust soliton distributions
//! - [`degree`] — Seedable degree sampler over a cumulative table
//! - [`digest`] — Multihash SHA-256 digests
//! - [`block`] — XOR helpers and the reconstruction buffer
//! - [`wire`] — Packet format: create, parse, encode, subtract
//! - [`encoder`] — Packet stream for one message
//! - [`session`] — Peeling cascade and intersection fallback
//! - [`decoder`] — Decoder state machine
//! - [`completion`] — Single-shot decode handle
//! - [`pacing`] — Fixed-rate frame pacer
//! - [`config`] — TOML configuration
//! - [`stats`] — Progress and counters
//! - [`error`] — Error types

pub mod block;
pub mod completion;
pub mod config;
pub mod decoder;
pub mod degree;
pub mod digest;
pub mod distribution;
pub mod encoder;
pub mod error;
pub mod pacing;
pub mod session;
pub mod stats;
pub mod wire;

pub use completion::DecodeHandle;
pub use config::{DecoderConfig, EncoderConfig, FountainConfig};
pub use decoder::{Decoder, DecoderState};
pub use digest::{DigestAlgorithm, Multihash};
pub use encoder::Encoder;
pub use error::{ConfigError, DecodeError, PacketError};
pub use stats::{Decoded, Progress};
pub use wire::Packet;
