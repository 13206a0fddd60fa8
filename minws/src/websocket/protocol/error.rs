use super::{connection::ConnectionState, consts::MAX_CONTROL_PAYLOAD, OpCode};
use std::fmt::Display;
use thiserror::Error;

/// Everything that can go wrong on an established websocket.
///
/// Both [`Error::Frame`] and [`Error::Transport`] are fatal: framing can't be
/// resynchronized, so the transport has to be closed.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed frame: {0}")]
    Frame(#[from] FrameError),

    #[error("IO Error while operating on websocket: {0}")]
    Transport(#[from] std::io::Error),

    #[error("The connection is closed")]
    Closed,

    #[error("Operation not allowed while the connection is {0}")]
    InvalidState(ConnectionState),

    #[error("Expected a {expected} frame, got {got}")]
    UnexpectedOpcode { expected: OpCode, got: OpCode },
}

impl Error {
    /// Whether the connection can't be used anymore after this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Frame(_) | Error::Transport(_) | Error::Closed)
    }
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Stream ended while reading the {0}")]
    Truncated(FrameSection),

    #[error("The payload was too large for this connection: {len} (max: {max})")]
    PayloadTooLarge { len: u64, max: u64 },

    #[error("Client message was not masked")]
    UnmaskedFrame,

    #[error(
        "Control frame had a too large payload (allowed: {max}, got: {0})",
        max = MAX_CONTROL_PAYLOAD
    )]
    ControlPayloadTooLarge(u64),

    #[error("Sent a control frame without fin bit set")]
    FragmentedControlFrame,
}

/// The part of a frame a short read happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSection {
    Header,
    ExtendedLength,
    MaskingKey,
    Payload,
}

impl Display for FrameSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameSection::Header => write!(f, "frame header"),
            FrameSection::ExtendedLength => write!(f, "extended payload length"),
            FrameSection::MaskingKey => write!(f, "masking key"),
            FrameSection::Payload => write!(f, "payload"),
        }
    }
}
