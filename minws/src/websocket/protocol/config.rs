use super::consts::MAX_RECV_FRAME_SIZE;

/// Per connection limits and policies applied to received frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WsConfig {
    /// Frames declaring a larger payload are rejected before it is read
    pub max_payload_len: u64,
    /// Reject frames from the client that don't carry a masking key
    pub require_masked_frames: bool,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            max_payload_len: MAX_RECV_FRAME_SIZE,
            require_masked_frames: true,
        }
    }
}

impl WsConfig {
    pub fn max_payload_len(mut self, max: u64) -> Self {
        self.max_payload_len = max;
        self
    }

    pub fn require_masked_frames(mut self, required: bool) -> Self {
        self.require_masked_frames = required;
        self
    }
}
