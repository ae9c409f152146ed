//! # Fountain Decoder
//!
//! Accepts encoded packets in any order, with loss and duplication, and
//! rebuilds the message once enough of them have arrived.
//!
//! ```text
//!   Idle ──decode()──▶ Decoding ──all blocks, digest ok──▶ Done
//!                         │  ▲
//!                  cancel()  decode()
//!                         ▼  │           all blocks, digest bad
//!                       Canceled         ─────────────────────▶ Failed
//! ```
//!
//! The first packet of a session fixes the message geometry; packets from any
//! other message are rejected without disturbing the session.

use crate::completion::{Completion, DecodeHandle};
use crate::config::DecoderConfig;
use crate::error::DecodeError;
use crate::session::{DecodeSession, SessionParams};
use crate::stats::{DecoderStats, Progress};
use crate::wire::Packet;

// ─── Decoder State ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// `decode()` not called yet.
    Idle,
    /// Accepting packets.
    Decoding,
    /// Message recovered and verified.
    Done,
    /// Session canceled by the caller.
    Canceled,
    /// Message recovered but failed its digest check.
    Failed,
}

// ─── Decoder ────────────────────────────────────────────────────────────────

pub struct Decoder {
    config: DecoderConfig,
    state: DecoderState,
    session: Option<DecodeSession>,
    completion: Option<Completion>,
    progress: Progress,
    /// Session counters kept after the session itself is released.
    last_stats: DecoderStats,
    invalid_packets: u64,
    mismatched_packets: u64,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    pub fn new() -> Self {
        Self::with_config(DecoderConfig::default())
    }

    pub fn with_config(config: DecoderConfig) -> Self {
        Decoder {
            config,
            state: DecoderState::Idle,
            session: None,
            completion: None,
            progress: Progress::default(),
            last_stats: DecoderStats::default(),
            invalid_packets: 0,
            mismatched_packets: 0,
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Progress as of the last accepted packet.
    pub fn progress(&self) -> Progress {
        self.progress
    }

    /// Counters for the current (or last) session.
    pub fn stats(&self) -> DecoderStats {
        let mut stats = match &self.session {
            Some(session) => session.stats().clone(),
            None => self.last_stats.clone(),
        };
        stats.invalid_packets = self.invalid_packets;
        stats.mismatched_packets = self.mismatched_packets;
        stats
    }

    /// Start a fresh session. An outstanding handle from a previous
    /// `decode()` is settled as canceled.
    pub fn decode(&mut self) -> DecodeHandle {
        if self.state == DecoderState::Decoding {
            tracing::debug!("decode restarted, canceling previous session");
            self.reject(DecodeError::Canceled);
        }
        self.session = None;
        self.progress = Progress::default();
        self.last_stats = DecoderStats::default();
        self.invalid_packets = 0;
        self.mismatched_packets = 0;

        let (tx, handle) = DecodeHandle::channel();
        self.completion = Some(tx);
        self.state = DecoderState::Decoding;
        handle
    }

    /// Feed one encoded packet.
    ///
    /// Format and session-mismatch errors leave the session untouched and are
    /// recoverable (see [`DecodeError::is_recoverable`]). Once the last block
    /// arrives the message is verified and the handle settled; a failed
    /// verification is returned here as well.
    pub fn enqueue(&mut self, data: &[u8]) -> Result<Progress, DecodeError> {
        if self.state != DecoderState::Decoding {
            return Err(DecodeError::NotDecoding);
        }

        let packet = match Packet::parse(data) {
            Ok(packet) => packet,
            Err(e) => {
                self.invalid_packets += 1;
                tracing::debug!(error = %e, len = data.len(), "dropping invalid packet");
                return Err(e.into());
            }
        };

        if let Some(session) = &self.session {
            if let Err(e) = session.params().check(&packet.header) {
                self.mismatched_packets += 1;
                tracing::debug!(error = %e, "dropping packet from another message");
                return Err(e);
            }
        } else {
            let total_size = packet.header.total_size;
            if total_size > self.config.max_total_size {
                self.invalid_packets += 1;
                tracing::warn!(
                    total_size,
                    limit = self.config.max_total_size,
                    "dropping packet for oversized message"
                );
                return Err(DecodeError::MessageTooLarge {
                    total_size,
                    limit: self.config.max_total_size,
                });
            }
            let params = SessionParams::from_header(&packet.header);
            tracing::info!(
                total_size = params.total_size,
                block_size = params.block_size,
                block_count = params.block_count,
                has_digest = params.message_digest.is_some(),
                "decode session started"
            );
            self.session = Some(DecodeSession::new(params, &self.config));
        }

        let Some(session) = self.session.as_mut() else {
            return Err(DecodeError::NotDecoding);
        };
        session.receive(packet)?;
        self.progress = session.progress();

        if self.progress.done {
            self.finish()?;
        }
        Ok(self.progress)
    }

    /// Stop decoding. Idempotent; the session is always cleared.
    pub fn cancel(&mut self) {
        if self.state == DecoderState::Decoding {
            self.state = DecoderState::Canceled;
            self.reject(DecodeError::Canceled);
            tracing::info!(
                received_blocks = self.progress.received_blocks,
                total_blocks = self.progress.total_blocks,
                "decode canceled"
            );
        }
        if let Some(session) = self.session.take() {
            self.last_stats = session.stats().clone();
        }
        self.completion = None;
    }

    fn finish(&mut self) -> Result<(), DecodeError> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        self.last_stats = session.stats().clone();
        match session.finish() {
            Ok(decoded) => {
                self.state = DecoderState::Done;
                tracing::info!(
                    total_size = decoded.total_size,
                    received_packets = decoded.received_packets,
                    total_blocks = decoded.total_blocks,
                    "message decoded"
                );
                if let Some(tx) = self.completion.take() {
                    let _ = tx.send(Ok(decoded));
                }
                Ok(())
            }
            Err(e) => {
                self.state = DecoderState::Failed;
                tracing::warn!(error = %e, "decoded message failed verification");
                self.reject(e.clone());
                Err(e)
            }
        }
    }

    fn reject(&mut self, error: DecodeError) {
        if let Some(tx) = self.completion.take() {
            let _ = tx.send(Err(error));
        }
    }
}

impl Drop for Decoder {
    fn drop(&mut self) {
        self.reject(DecodeError::Canceled);
    }
}
