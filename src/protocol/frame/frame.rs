//! A single WebSocket frame, RFC 6455 §5.

use std::io::{Read, Write};

use bytes::Bytes;
use log::trace;

use super::coding::OpCode;
use super::mask::{apply_mask, generate_mask};
use crate::error::{Error, ProtocolError, Result};

/// The maximum payload length control frames (Close/Ping/Pong) may carry.
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// A single WebSocket frame: FIN, opcode, mask flag, and payload.
///
/// Transient and stack-local — frames are assembled from a
/// [`crate::protocol::Message`] for sending and consumed into one by
/// the connection's reassembly loop on receipt; nothing holds on to a
/// `Frame` across reads.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Frame {
    is_final: bool,
    opcode: OpCode,
    masked: bool,
    payload: Bytes,
}

impl Frame {
    /// Build a frame directly from its parts.
    pub fn new(is_final: bool, opcode: OpCode, masked: bool, payload: impl Into<Bytes>) -> Self {
        Frame { is_final, opcode, masked, payload: payload.into() }
    }

    /// Whether this is the final frame of a (possibly fragmented) message.
    pub fn is_final(&self) -> bool {
        self.is_final
    }

    /// The frame's opcode.
    pub fn opcode(&self) -> OpCode {
        self.opcode
    }

    /// Whether the frame is masked.
    pub fn is_masked(&self) -> bool {
        self.masked
    }

    /// The frame's payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consume the frame into its payload.
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Validate the control-frame constraints from RFC 6455 §5.5: must
    /// be final, and the payload must be at most 125 bytes.
    fn validate_control(&self) -> Result<()> {
        if self.opcode.is_control() {
            if !self.is_final {
                return Err(Error::Protocol(ProtocolError::FragmentedControlFrame));
            }
            if self.payload.len() > MAX_CONTROL_FRAME_PAYLOAD {
                return Err(Error::Protocol(ProtocolError::ControlFrameTooBig));
            }
        }
        Ok(())
    }

    /// Read one frame from `reader`, which blocks until the requested
    /// byte counts are delivered or the underlying transport fails.
    pub fn read(reader: &mut impl Read) -> Result<Frame> {
        let mut head = [0u8; 2];
        reader.read_exact(&mut head)?;

        let is_final = head[0] & 0x80 != 0;
        let opcode = OpCode::try_from(head[0] & 0x0F)?;

        let masked = head[1] & 0x80 != 0;
        let length_indicator = head[1] & 0x7F;

        let length: u64 = match length_indicator {
            0..=125 => u64::from(length_indicator),
            126 => {
                let mut buf = [0u8; 2];
                reader.read_exact(&mut buf)?;
                u64::from(u16::from_be_bytes(buf))
            }
            127 => {
                let mut buf = [0u8; 8];
                reader.read_exact(&mut buf)?;
                u64::from_be_bytes(buf)
            }
            _ => unreachable!("7-bit field"),
        };

        let mask = if masked {
            let mut key = [0u8; 4];
            reader.read_exact(&mut key)?;
            Some(key)
        } else {
            None
        };

        let mut payload = vec![0u8; length as usize];
        reader.read_exact(&mut payload)?;
        if let Some(key) = mask {
            apply_mask(&mut payload, key);
        }

        let frame = Frame { is_final, opcode, masked, payload: payload.into() };
        frame.validate_control()?;
        trace!("read frame: {frame}");
        Ok(frame)
    }

    /// Write one frame to `writer` in a single logical operation.
    pub fn write(&self, writer: &mut impl Write) -> Result<()> {
        self.validate_control()?;

        let len = self.payload.len() as u64;
        let mut header = Vec::with_capacity(FrameHeader::MAX_SIZE);

        let first_byte = u8::from(self.opcode) | if self.is_final { 0x80 } else { 0 };
        header.push(first_byte);

        let (length_indicator, extra) = if len > 65_535 {
            (127u8, LenBytes::U64(len))
        } else if len > 125 {
            (126u8, LenBytes::U16(len as u16))
        } else {
            (len as u8, LenBytes::None)
        };

        header.push(length_indicator | if self.masked { 0x80 } else { 0 });
        match extra {
            LenBytes::None => {}
            LenBytes::U16(v) => header.extend_from_slice(&v.to_be_bytes()),
            LenBytes::U64(v) => header.extend_from_slice(&v.to_be_bytes()),
        }

        writer.write_all(&header)?;

        if self.masked {
            let key = generate_mask();
            writer.write_all(&key)?;
            let mut masked_payload = self.payload.to_vec();
            apply_mask(&mut masked_payload, key);
            writer.write_all(&masked_payload)?;
        } else {
            writer.write_all(&self.payload)?;
        }

        trace!("wrote frame: {self}");
        Ok(())
    }
}

enum LenBytes {
    None,
    U16(u16),
    U64(u64),
}

/// Length-field arithmetic, exposed for tests and callers that want to
/// reason about length-field selection without building a full frame.
pub struct FrameHeader;

impl FrameHeader {
    /// The longest possible header: 2 base bytes + 8-byte length + 4-byte mask.
    pub const MAX_SIZE: usize = 14;

    /// Which length-field encoding RFC 6455 prescribes for a given payload length.
    pub fn length_indicator(len: u64) -> u8 {
        if len > 65_535 {
            127
        } else if len > 125 {
            126
        } else {
            len as u8
        }
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<FRAME fin={} opcode={} masked={} len={}>",
            self.is_final,
            self.opcode,
            self.masked,
            self.payload.len()
        )
    }
}
