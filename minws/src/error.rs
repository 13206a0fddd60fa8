use crate::{consts::MAX_HEADER_SIZE, websocket};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Io Error: {0}")]
    Io(#[from] io::Error),

    #[error("The request was empty")]
    Empty,

    #[error("The stream ended before the request header was complete")]
    Incomplete,

    #[error("Invalid request line '{line}'")]
    InvalidRequestLine { line: String },

    #[error("Invalid protocol version '{recieved}'")]
    InvalidVersion { recieved: String },

    #[error("Invalid header line '{line}'")]
    InvalidHeader { line: String },

    #[error("The request header exceeded {} bytes", MAX_HEADER_SIZE)]
    HeaderTooLarge,

    #[error("Websocket upgrade rejected: {0}")]
    Handshake(#[from] websocket::HandshakeError),

    #[error(transparent)]
    WebSocket(#[from] websocket::Error),
}
