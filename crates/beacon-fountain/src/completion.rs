//! Single-shot completion handle returned by [`Decoder::decode`].
//!
//! [`Decoder::decode`]: crate::decoder::Decoder::decode

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use crate::error::DecodeError;
use crate::stats::Decoded;

pub(crate) type Completion = oneshot::Sender<Result<Decoded, DecodeError>>;

/// Settles exactly once: with the decoded message, or with the error that
/// ended the session. A decoder dropped mid-session settles it as
/// [`DecodeError::Canceled`].
#[derive(Debug)]
pub struct DecodeHandle {
    rx: oneshot::Receiver<Result<Decoded, DecodeError>>,
}

impl DecodeHandle {
    pub(crate) fn channel() -> (Completion, DecodeHandle) {
        let (tx, rx) = oneshot::channel();
        (tx, DecodeHandle { rx })
    }

    /// Non-blocking check. `None` while the session is still running.
    ///
    /// Takes the result out; later calls report `Canceled`.
    pub fn try_result(&mut self) -> Option<Result<Decoded, DecodeError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(DecodeError::Canceled)),
        }
    }

    /// Block the current thread until the handle settles.
    ///
    /// Panics if called from within an async runtime; `.await` the handle
    /// there instead.
    pub fn wait(self) -> Result<Decoded, DecodeError> {
        self.rx
            .blocking_recv()
            .unwrap_or(Err(DecodeError::Canceled))
    }
}

impl Future for DecodeHandle {
    type Output = Result<Decoded, DecodeError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(DecodeError::Canceled)))
    }
}
