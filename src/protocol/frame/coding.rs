//! WebSocket opcodes, RFC 6455 §5.2.

use std::fmt;

use crate::error::{Error, ProtocolError};

/// The symbolic opcode of a WebSocket frame.
///
/// Continuation, Text, and Binary are "data" opcodes; Close, Ping, and
/// Pong are "control" opcodes that must fit in a single, unfragmented
/// frame of at most 125 payload bytes.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum OpCode {
    /// Denotes a continuation frame of a fragmented data message.
    Continuation,
    /// Denotes a text data frame.
    Text,
    /// Denotes a binary data frame.
    Binary,
    /// Denotes a close control frame.
    Close,
    /// Denotes a ping control frame.
    Ping,
    /// Denotes a pong control frame.
    Pong,
}

impl OpCode {
    /// True for Close, Ping, and Pong.
    pub fn is_control(self) -> bool {
        matches!(self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }

    /// True for Continuation, Text, and Binary.
    pub fn is_data(self) -> bool {
        !self.is_control()
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> u8 {
        match op {
            OpCode::Continuation => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
        }
    }
}

impl TryFrom<u8> for OpCode {
    type Error = Error;

    /// Opcodes 0x3-0x7 and 0xB-0xF are reserved and rejected.
    fn try_from(byte: u8) -> Result<Self, Error> {
        match byte & 0x0F {
            0x0 => Ok(OpCode::Continuation),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            0x9 => Ok(OpCode::Ping),
            0xA => Ok(OpCode::Pong),
            other => Err(Error::Protocol(ProtocolError::InvalidOpcode(other))),
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OpCode::Continuation => "CONTINUATION",
            OpCode::Text => "TEXT",
            OpCode::Binary => "BINARY",
            OpCode::Close => "CLOSE",
            OpCode::Ping => "PING",
            OpCode::Pong => "PONG",
        };
        write!(f, "{name}")
    }
}
