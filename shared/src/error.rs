use std::io;

use thiserror::Error;

use crate::payload::PayloadError;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("connection closed by peer after {received} of {expected} bytes")]
    ConnectionClosed { expected: usize, received: usize },

    #[error("socket connection broken after writing {written} of {total} bytes")]
    ConnectionBroken { written: usize, total: usize },

    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: u64, max: usize },

    #[error("invalid payload: {0}")]
    Payload(#[from] PayloadError),

    #[error("echoed payload differs from the one sent ({sent} bytes sent, {received} bytes received)")]
    EchoMismatch { sent: usize, received: usize },

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl TransferError {
    /// The peer went away: either end of stream or a dead socket.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            TransferError::ConnectionClosed { .. } | TransferError::ConnectionBroken { .. }
        )
    }
}
