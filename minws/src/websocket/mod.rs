mod handshake;
mod protocol;
mod status;

pub use handshake::{accept_key, negotiate, websocket_handshake, HandshakeError, HandshakeResult};
pub use protocol::{
    apply_mask, consts, Connection, ConnectionState, DataFrame, Error, FrameError, FrameSection,
    OpCode, Transport, WsConfig,
};
pub use status::{status_text, CloseReason, CodeRange, StatusRegistry};
