use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
    /// A code RFC 6455 leaves reserved. Kept as-is, what to do with it is up to the caller
    Other(u8),
}

impl OpCode {
    /// Takes the low 4 bits of the first header byte
    pub fn from_bits(code: u8) -> Self {
        match code & 0x0F {
            0x0 => OpCode::Continuation,
            0x1 => OpCode::Text,
            0x2 => OpCode::Binary,
            0x8 => OpCode::Close,
            0x9 => OpCode::Ping,
            0xA => OpCode::Pong,
            other => OpCode::Other(other),
        }
    }

    pub fn bits(&self) -> u8 {
        match self {
            OpCode::Continuation => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
            OpCode::Other(code) => code & 0x0F,
        }
    }

    /// Control frames are the ones with the high opcode bit set (0x8..=0xF)
    pub fn is_control(&self) -> bool {
        self.bits() & 0x8 != 0
    }
}

impl Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpCode::Continuation => write!(f, "continuation"),
            OpCode::Text => write!(f, "text"),
            OpCode::Binary => write!(f, "binary"),
            OpCode::Close => write!(f, "close"),
            OpCode::Ping => write!(f, "ping"),
            OpCode::Pong => write!(f, "pong"),
            OpCode::Other(code) => write!(f, "unknown ({:#03X})", code),
        }
    }
}
