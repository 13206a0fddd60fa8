//! Encoding and decoding of single websocket frames (RFC 6455 section 5.2).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! +-+-+-+-+-------+-+-------------+ - - - - - - - - - - - - - - - +
//! |     Extended payload length continued, if payload len == 127  |
//! + - - - - - - - - - - - - - - - +-------------------------------+
//! |                               |Masking-key, if MASK set to 1  |
//! +-------------------------------+-------------------------------+
//! | Masking-key (continued)       |          Payload Data         |
//! +-------------------------------- - - - - - - - - - - - - - - - +
//! ```

use super::{
    error::{FrameError, FrameSection},
    Error, OpCode,
};
use std::{
    cell::OnceCell,
    io::{self, Read, Write},
};

const FIN_BIT: u8 = 0b10000000;
const MASK_BIT: u8 = 0b10000000;
const LEN_BITS: u8 = 0b01111111;

/// Never reserve more than this up front, the declared length may be a lie
const PAYLOAD_PREALLOC_LIMIT: u64 = 64 * 1024;

#[derive(Debug, Clone)]
enum Payload {
    /// As read off the wire, still masked if the frame came with a key
    Received {
        raw: Vec<u8>,
        decoded: OnceCell<Vec<u8>>,
    },
    /// Plaintext, masking is applied while encoding
    Outgoing(Vec<u8>),
}

/// A single websocket frame.
///
/// Frames are either receive-shaped (built by [`DataFrame::parse`], the raw
/// payload is unmasked on first access and the result cached) or send-shaped
/// (built from a plaintext payload by one of the constructors).
#[derive(Debug, Clone)]
pub struct DataFrame {
    pub fin: bool,
    pub opcode: OpCode,
    masking_key: Option<[u8; 4]>,
    payload_len: u64,
    payload: Payload,
}

enum Len {
    Single(u8),
    U16(u16),
    U64(u64),
}

impl Len {
    fn payload_len_byte(&self) -> u8 {
        match self {
            Len::Single(len) => *len,
            Len::U16(_) => 126,
            Len::U64(_) => 127,
        }
    }
}

/// XORs `payload` with `key` repeated over its whole length. Applying it twice is a no-op.
pub fn apply_mask(payload: &mut [u8], key: [u8; 4]) {
    payload
        .iter_mut()
        .enumerate()
        .for_each(|(i, d)| *d ^= key[i % key.len()])
}

impl PartialEq for DataFrame {
    fn eq(&self, other: &Self) -> bool {
        self.fin == other.fin
            && self.opcode == other.opcode
            && self.is_masked() == other.is_masked()
            && self.payload() == other.payload()
    }
}

impl DataFrame {
    /// Unmasked frame with the fin bit set
    pub fn new(opcode: OpCode, payload: Vec<u8>) -> Self {
        Self {
            fin: true,
            opcode,
            masking_key: None,
            payload_len: payload.len() as u64,
            payload: Payload::Outgoing(payload),
        }
    }

    pub fn text(text: &str) -> Self {
        Self::new(OpCode::Text, text.as_bytes().to_vec())
    }

    pub fn binary(payload: Vec<u8>) -> Self {
        Self::new(OpCode::Binary, payload)
    }

    pub fn ping(payload: Vec<u8>) -> Self {
        Self::new(OpCode::Ping, payload)
    }

    pub fn pong(payload: Vec<u8>) -> Self {
        Self::new(OpCode::Pong, payload)
    }

    /// Close frame carrying only the status code, in network byte order
    pub fn close(code: u16) -> Self {
        Self::new(OpCode::Close, code.to_be_bytes().to_vec())
    }

    /// Masks the payload with `key` when the frame gets encoded (client side framing)
    pub fn masked(mut self, key: [u8; 4]) -> Self {
        self.masking_key = Some(key);
        self
    }

    pub fn masked_random(self) -> Self {
        self.masked(rand::random())
    }

    pub fn is_masked(&self) -> bool {
        self.masking_key.is_some()
    }

    pub fn masking_key(&self) -> Option<[u8; 4]> {
        self.masking_key
    }

    /// Length as declared in the header (or of the plaintext, for send-shaped frames)
    pub fn payload_len(&self) -> u64 {
        self.payload_len
    }

    /// The payload as it was on the wire. `None` for frames that weren't received.
    pub fn raw_payload(&self) -> Option<&[u8]> {
        match &self.payload {
            Payload::Received { raw, .. } => Some(raw),
            Payload::Outgoing(_) => None,
        }
    }

    /// The unmasked payload
    pub fn payload(&self) -> &[u8] {
        match (&self.payload, self.masking_key) {
            (Payload::Received { raw, decoded }, Some(key)) => decoded.get_or_init(|| {
                let mut decoded = raw.clone();
                apply_mask(&mut decoded, key);
                decoded
            }),
            (Payload::Received { raw, .. }, None) => raw,
            (Payload::Outgoing(payload), _) => payload,
        }
    }

    pub fn into_payload(self) -> Vec<u8> {
        match (self.payload, self.masking_key) {
            (Payload::Received { raw, decoded }, Some(key)) => {
                decoded.into_inner().unwrap_or_else(|| {
                    let mut raw = raw;
                    apply_mask(&mut raw, key);
                    raw
                })
            }
            (Payload::Received { raw, .. }, None) => raw,
            (Payload::Outgoing(payload), _) => payload,
        }
    }

    /// Status code of a close frame, `None` if this isn't one or it came without a code
    pub fn close_code(&self) -> Option<u16> {
        if self.opcode != OpCode::Close {
            return None;
        }

        let code: [u8; 2] = self.payload().get(0..2)?.try_into().ok()?;
        Some(u16::from_be_bytes(code))
    }

    /// Reads exactly one frame off the stream.
    ///
    /// Short reads anywhere inside the frame are [`FrameError::Truncated`]. A stream
    /// that ends cleanly before the first byte of a frame is reported as a transport error.
    pub fn parse(mut stream: impl Read, max_payload_len: u64) -> Result<Self, Error> {
        let mut header = [0; 2];
        read_header(&mut stream, &mut header)?;

        let fin = (header[0] & FIN_BIT) > 0;
        let opcode = OpCode::from_bits(header[0]);

        let mask = (header[1] & MASK_BIT) > 0;

        // The payload len can be 7 bits, 2 bytes or 8 bytes
        let payload_len = match header[1] & LEN_BITS {
            len @ ..=125 => len as u64,
            126 => {
                let mut longer_len = [0; 2];
                read_section(&mut stream, &mut longer_len, FrameSection::ExtendedLength)?;
                u16::from_be_bytes(longer_len) as u64
            }
            _ => {
                let mut much_longer_len = [0; 8];
                read_section(
                    &mut stream,
                    &mut much_longer_len,
                    FrameSection::ExtendedLength,
                )?;
                u64::from_be_bytes(much_longer_len)
            }
        };

        let masking_key = if mask {
            let mut key = [0; 4];
            read_section(&mut stream, &mut key, FrameSection::MaskingKey)?;
            Some(key)
        } else {
            None
        };

        if payload_len > max_payload_len {
            return Err(FrameError::PayloadTooLarge {
                len: payload_len,
                max: max_payload_len,
            }
            .into());
        }

        let raw = read_payload(&mut stream, payload_len)?;

        Ok(DataFrame {
            fin,
            opcode,
            masking_key,
            payload_len,
            payload: Payload::Received {
                raw,
                decoded: OnceCell::new(),
            },
        })
    }

    /// Wire representation of the frame. Reserved bits are always cleared.
    pub fn encode(&self) -> Vec<u8> {
        let payload = self.payload();

        let payload_len = match payload.len() {
            len @ ..=125 => Len::Single(len as u8),
            len @ ..=0xFFFF => Len::U16(len as u16),
            len => Len::U64(len as u64),
        };

        let mut header = [0u8; 2];
        header[0] = self.opcode.bits();
        if self.fin {
            header[0] |= FIN_BIT;
        }

        header[1] = payload_len.payload_len_byte();
        if self.masking_key.is_some() {
            header[1] |= MASK_BIT;
        }

        let mut out = Vec::with_capacity(payload.len() + 14);
        out.extend(header);

        match payload_len {
            Len::U16(len) => out.extend(len.to_be_bytes()),
            Len::U64(len) => out.extend(len.to_be_bytes()),
            Len::Single(_) => {}
        }

        match self.masking_key {
            Some(key) => {
                out.extend(key);
                let start = out.len();
                out.extend_from_slice(payload);
                apply_mask(&mut out[start..], key);
            }
            None => out.extend_from_slice(payload),
        }

        out
    }

    /// Writes the whole frame with a single `write_all`
    pub fn write(&self, mut stream: impl Write) -> Result<(), io::Error> {
        stream.write_all(&self.encode())?;
        stream.flush()
    }
}

fn read_header(stream: &mut impl Read, header: &mut [u8; 2]) -> Result<(), Error> {
    let mut filled = 0;

    while filled < header.len() {
        match stream.read(&mut header[filled..]) {
            Ok(0) if filled == 0 => {
                return Err(Error::Transport(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed by peer",
                )))
            }
            Ok(0) => return Err(FrameError::Truncated(FrameSection::Header).into()),
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err.into()),
        }
    }

    Ok(())
}

fn read_section(stream: &mut impl Read, buf: &mut [u8], section: FrameSection) -> Result<(), Error> {
    stream.read_exact(buf).map_err(|err| match err.kind() {
        io::ErrorKind::UnexpectedEof => Error::Frame(FrameError::Truncated(section)),
        _ => Error::Transport(err),
    })
}

fn read_payload(stream: &mut impl Read, len: u64) -> Result<Vec<u8>, Error> {
    let mut payload = Vec::with_capacity(len.min(PAYLOAD_PREALLOC_LIMIT) as usize);
    stream.by_ref().take(len).read_to_end(&mut payload)?;

    if (payload.len() as u64) < len {
        return Err(FrameError::Truncated(FrameSection::Payload).into());
    }

    Ok(payload)
}
