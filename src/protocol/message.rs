//! The logical unit delivered to and from the application.

use std::fmt;
use std::time::SystemTime;

use bytes::Bytes;

use super::frame::coding::OpCode;
use super::frame::Frame;

/// A WebSocket message: an opcode, a payload, and the time it was
/// constructed.
///
/// A `Message` may span multiple wire frames (via [`Message::to_frames`]
/// on the way out, and the connection's continuation-reassembly loop on
/// the way in) but is always a single logical unit to the application.
#[derive(Debug, Clone)]
pub struct Message {
    opcode: OpCode,
    payload: Bytes,
    timestamp: SystemTime,
}

impl PartialEq for Message {
    /// Two messages are equal if their opcode and payload match;
    /// construction time is metadata, not content.
    fn eq(&self, other: &Self) -> bool {
        self.opcode == other.opcode && self.payload == other.payload
    }
}

impl Eq for Message {}

impl Message {
    fn new(opcode: OpCode, payload: impl Into<Bytes>) -> Self {
        Message { opcode, payload: payload.into(), timestamp: SystemTime::now() }
    }

    /// Construct a text message.
    pub fn text(payload: impl Into<Bytes>) -> Self {
        Message::new(OpCode::Text, payload)
    }

    /// Construct a binary message.
    pub fn binary(payload: impl Into<Bytes>) -> Self {
        Message::new(OpCode::Binary, payload)
    }

    /// Construct a close message. `payload` is the already-encoded
    /// status code + reason bytes, if any.
    pub fn close(payload: impl Into<Bytes>) -> Self {
        Message::new(OpCode::Close, payload)
    }

    /// Construct a ping message.
    pub fn ping(payload: impl Into<Bytes>) -> Self {
        Message::new(OpCode::Ping, payload)
    }

    /// Construct a pong message.
    pub fn pong(payload: impl Into<Bytes>) -> Self {
        Message::new(OpCode::Pong, payload)
    }

    /// Build a message of the given opcode; control opcodes are
    /// accepted here too, for constructing replies from data already
    /// read off the wire (e.g. echoing a ping's payload back as a pong).
    pub fn with_opcode(opcode: OpCode, payload: impl Into<Bytes>) -> Self {
        Message::new(opcode, payload)
    }

    /// The message's opcode.
    pub fn opcode(&self) -> OpCode {
        self.opcode
    }

    /// The message's payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the message carries any payload.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Whether the message carries a non-empty payload; the mirror of
    /// [`Message::is_empty`], matching the specification's naming.
    pub fn has_content(&self) -> bool {
        !self.is_empty()
    }

    /// When the message was constructed.
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Replace the message's payload in place.
    pub fn set_payload(&mut self, payload: impl Into<Bytes>) {
        self.payload = payload.into();
    }

    /// Attempt to view the payload as UTF-8 text.
    pub fn to_text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.payload)
    }

    /// Split this message into the wire frames that carry it,
    /// RFC 6455 §5.4.
    ///
    /// An empty payload always yields exactly one final frame. A
    /// non-empty payload is split into chunks of at most
    /// `fragment_size` bytes: every chunk becomes a continuation frame,
    /// then the first frame's opcode is overridden to the message's own
    /// opcode and the last frame's FIN bit is set. `fragment_size` of 0
    /// is treated as 1 to guarantee termination.
    pub fn to_frames(&self, masked: bool, fragment_size: usize) -> Vec<Frame> {
        if self.payload.is_empty() {
            return vec![Frame::new(true, self.opcode, masked, Bytes::new())];
        }

        let fragment_size = fragment_size.max(1);
        let mut frames: Vec<Frame> = self
            .payload
            .chunks(fragment_size)
            .map(|chunk| {
                Frame::new(false, OpCode::Continuation, masked, Bytes::copy_from_slice(chunk))
            })
            .collect();

        let last = frames.len() - 1;
        frames[0] = Frame::new(false, self.opcode, masked, frames[0].payload().to_vec());
        frames[last] =
            Frame::new(true, frames[last].opcode(), masked, frames[last].payload().to_vec());

        frames
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Ok(text) if self.opcode == OpCode::Text => write!(f, "{text}"),
            _ => write!(f, "{} Data<length={}>", self.opcode, self.len()),
        }
    }
}
