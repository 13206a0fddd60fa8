use super::{
    config::WsConfig, consts::MAX_CONTROL_PAYLOAD, error::FrameError, DataFrame, Error, OpCode,
};
use crate::websocket::status::{CloseReason, CodeRange, StatusRegistry};
use std::{
    fmt::Display,
    io::{self, Read, Write},
    net::{Shutdown, TcpStream},
};
use tracing::{debug, trace, warn};

/// A duplex byte stream a websocket can run over
pub trait Transport: Read + Write {
    /// Shuts the stream down for good. Called once, when the connection reaches `Closed`.
    fn release(&mut self) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn release(&mut self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handshake done, both directions open
    Established,
    /// A close frame was sent, the transport is still open
    Closing,
    /// Transport released. Terminal.
    Closed,
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Established => write!(f, "established"),
            ConnectionState::Closing => write!(f, "closing"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseEvent {
    /// `close()` was called
    Local,
    /// A close frame arrived from the peer
    Peer,
}

impl ConnectionState {
    /// Close handshake transitions. `None` marks an event that has to be ignored.
    fn on(self, event: CloseEvent) -> Option<ConnectionState> {
        use CloseEvent::*;
        use ConnectionState::*;

        match (self, event) {
            (Established, Local) | (Established, Peer) => Some(Closing),
            (Closing, Local) | (Closing, Peer) => Some(Closed),
            (Closed, Local) => Some(Closed),
            (Closed, Peer) => None,
        }
    }
}

/// Represents a websocket connection to a client.
///
/// Every operation takes `&mut self`, so frame writes can never interleave. The
/// connection is meant to be driven by exactly one worker.
pub struct Connection<S: Transport> {
    stream: Option<S>,
    state: ConnectionState,
    config: WsConfig,
    registry: &'static StatusRegistry,
}

impl<S: Transport> std::fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.state)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S: Transport> Connection<S> {
    pub(crate) fn new(stream: S, config: WsConfig) -> Self {
        Self {
            stream: Some(stream),
            state: ConnectionState::Established,
            config,
            registry: StatusRegistry::global(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Blocks until one complete frame has been read.
    ///
    /// Pings are answered with a pong carrying the same payload and close frames
    /// advance the close handshake before the frame is handed back. Malformed
    /// frames and transport failures release the transport.
    pub fn read_message(&mut self) -> Result<DataFrame, Error> {
        let frame = match self.read_frame() {
            Ok(frame) => frame,
            Err(err) => {
                if err.is_fatal() {
                    debug!(error = %err, "read failed, dropping connection");
                    self.release();
                }
                return Err(err);
            }
        };

        match frame.opcode {
            OpCode::Ping => self.send_pong(frame.payload())?,
            OpCode::Close => self.on_peer_close(&frame)?,
            _ => {}
        }

        Ok(frame)
    }

    /// Reads a message and requires it to be a text frame
    pub fn read_text(&mut self) -> Result<String, Error> {
        let frame = self.read_message()?;
        expect_opcode(&frame, OpCode::Text)?;

        Ok(String::from_utf8_lossy(frame.payload()).into_owned())
    }

    /// Reads a message and requires it to be a binary frame
    pub fn read_binary(&mut self) -> Result<Vec<u8>, Error> {
        let frame = self.read_message()?;
        expect_opcode(&frame, OpCode::Binary)?;

        Ok(frame.into_payload())
    }

    pub fn send_text(&mut self, text: &str) -> Result<(), Error> {
        self.send_data(DataFrame::text(text))
    }

    pub fn send_binary(&mut self, payload: &[u8]) -> Result<(), Error> {
        self.send_data(DataFrame::binary(payload.to_vec()))
    }

    pub fn send_ping(&mut self, payload: &[u8]) -> Result<(), Error> {
        self.write_frame(&DataFrame::ping(payload.to_vec()))
    }

    pub fn send_pong(&mut self, payload: &[u8]) -> Result<(), Error> {
        self.write_frame(&DataFrame::pong(payload.to_vec()))
    }

    /// Sends a close frame with `code`. Does not change the state, see [`Connection::close`].
    pub fn send_close(&mut self, code: u16) -> Result<(), Error> {
        self.write_frame(&DataFrame::close(code))
    }

    /// Starts or finishes the close handshake.
    ///
    /// From `Established` this sends a Normal Closure frame and moves to `Closing`,
    /// leaving the transport open for the peer's answer. From `Closing` or `Closed`
    /// it releases the transport.
    pub fn close(&mut self) -> Result<(), Error> {
        if self.state == ConnectionState::Established {
            self.send_close(CloseReason::Normal.code())?;
        }

        self.transition(CloseEvent::Local);
        Ok(())
    }

    fn on_peer_close(&mut self, frame: &DataFrame) -> Result<(), Error> {
        let code = frame.close_code();
        debug!(
            code,
            reason = code.and_then(|code| self.registry.text_for(code)),
            range = ?code.map(CodeRange::classify),
            state = %self.state,
            "peer sent close frame"
        );

        if self.state == ConnectionState::Established {
            self.send_close(code.unwrap_or(CloseReason::Normal.code()))?;
            self.transition(CloseEvent::Peer);
            // both close frames are out, nothing left to wait for
            self.transition(CloseEvent::Local);
        } else {
            self.transition(CloseEvent::Peer);
        }

        Ok(())
    }

    fn transition(&mut self, event: CloseEvent) {
        let Some(next) = self.state.on(event) else {
            warn!(state = %self.state, ?event, "ignoring close event on a closed connection");
            return;
        };

        if next != self.state {
            debug!(from = %self.state, to = %next, ?event, "connection state changed");
        }

        if next == ConnectionState::Closed {
            self.release();
        } else {
            self.state = next;
        }
    }

    fn read_frame(&mut self) -> Result<DataFrame, Error> {
        let max_payload_len = self.config.max_payload_len;
        let stream = self.stream.as_mut().ok_or(Error::Closed)?;

        let frame = DataFrame::parse(stream, max_payload_len)?;
        trace!(
            opcode = %frame.opcode,
            fin = frame.fin,
            masked = frame.is_masked(),
            len = frame.payload_len(),
            "received frame"
        );

        if self.config.require_masked_frames && !frame.is_masked() {
            return Err(FrameError::UnmaskedFrame.into());
        }

        if frame.opcode.is_control() {
            if frame.payload_len() > MAX_CONTROL_PAYLOAD {
                return Err(FrameError::ControlPayloadTooLarge(frame.payload_len()).into());
            }

            if !frame.fin {
                return Err(FrameError::FragmentedControlFrame.into());
            }
        }

        Ok(frame)
    }

    fn send_data(&mut self, frame: DataFrame) -> Result<(), Error> {
        match self.state {
            ConnectionState::Established => self.write_frame(&frame),
            ConnectionState::Closing => Err(Error::InvalidState(self.state)),
            ConnectionState::Closed => Err(Error::Closed),
        }
    }

    fn write_frame(&mut self, frame: &DataFrame) -> Result<(), Error> {
        let stream = self.stream.as_mut().ok_or(Error::Closed)?;

        trace!(opcode = %frame.opcode, len = frame.payload_len(), "sending frame");
        if let Err(err) = frame.write(stream) {
            debug!(error = %err, "write failed, dropping connection");
            self.release();
            return Err(err.into());
        }

        Ok(())
    }

    fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(err) = stream.release() {
                // the peer may well have hung up first
                trace!(error = %err, "failed to shut down transport");
            }
        }

        self.state = ConnectionState::Closed;
    }
}

fn expect_opcode(frame: &DataFrame, expected: OpCode) -> Result<(), Error> {
    if frame.opcode != expected {
        return Err(Error::UnexpectedOpcode {
            expected,
            got: frame.opcode,
        });
    }

    Ok(())
}
