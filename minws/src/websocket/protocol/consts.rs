#![allow(missing_docs)]

pub const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Default for the largest payload a single received frame may declare
pub const MAX_RECV_FRAME_SIZE: u64 = 1073741824; // 1 GiB

/// Control frames can't carry more than this
pub const MAX_CONTROL_PAYLOAD: u64 = 125;

pub mod headers {
    pub const UPGRADE: &str = "Upgrade";
    pub const CONNECTION: &str = "Connection";
    pub const SEC_WEBSOCKET_KEY: &str = "Sec-WebSocket-Key";
    pub const SEC_WEBSOCKET_PROTOCOL: &str = "Sec-WebSocket-Protocol";
    pub const SEC_WEBSOCKET_VERSION: &str = "Sec-WebSocket-Version";
    pub const SEC_WEBSOCKET_EXTENSIONS: &str = "Sec-WebSocket-Extensions";
    pub const SEC_WEBSOCKET_ACCEPT: &str = "Sec-WebSocket-Accept";
}
