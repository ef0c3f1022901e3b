//! Owns a transport and layers message semantics over the frame codec:
//! push/pull, continuation reassembly, control-frame auto-response,
//! and the close handshake.

use log::Level;

use crate::error::{Error, ProtocolError, Result};
use crate::options::ClientOptions;
use crate::protocol::{Frame, Message, OpCode};
use crate::stream::Transport;

/// State held only while a fragmented message is being reassembled.
struct ReadBuffer {
    initial_opcode: OpCode,
    accumulated_payload: Vec<u8>,
    frame_count: usize,
}

/// A live WebSocket connection: a transport plus the bookkeeping
/// needed to speak the protocol over it.
///
/// The transport is held as `Option<T>` so that [`Connection::disconnect`]
/// and close-handshake completion can release it exactly once, per the
/// scoped-acquisition contract — every further operation on a
/// disconnected `Connection` fails with [`Error::Connection`] rather
/// than panicking.
pub struct Connection<T: Transport> {
    transport: Option<T>,
    options: ClientOptions,
    read_buffer: Option<ReadBuffer>,
    is_closing: bool,
    close_status: Option<u16>,
}

impl<T: Transport> Connection<T> {
    /// Wrap an already-handshaken transport.
    pub fn new(transport: T, options: ClientOptions) -> Self {
        Connection { transport: Some(transport), options, read_buffer: None, is_closing: false, close_status: None }
    }

    /// Wrap any caller-supplied `Transport` directly, bypassing
    /// [`crate::client::Client`]'s own dialing and handshake logic. The
    /// escape hatch for callers on a custom stream (`mio`, a test
    /// double, anything that isn't TCP/TLS) who have already completed
    /// or don't need the HTTP upgrade.
    pub fn from_transport(transport: T, options: ClientOptions) -> Self {
        Self::new(transport, options)
    }

    /// Whether the transport is still held (the connection has not
    /// disconnected or completed a close handshake).
    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// The peer's close status code, if a close frame has been received.
    pub fn close_status(&self) -> Option<u16> {
        self.close_status
    }

    /// Apply a new per-operation timeout to the live transport.
    pub fn set_timeout(&mut self, timeout: std::time::Duration) -> Result<()> {
        self.options.timeout = timeout;
        if let Some(transport) = self.transport.as_mut() {
            transport.set_timeout(timeout).map_err(|e| Error::connection_with_source("setting timeout", e))?;
        }
        Ok(())
    }

    /// Release the transport without attempting a close handshake.
    pub fn disconnect(&mut self) {
        self.transport = None;
        self.is_closing = false;
    }

    fn transport_mut(&mut self) -> Result<&mut T> {
        self.transport.as_mut().ok_or_else(|| Error::connection("not connected"))
    }

    /// Split `msg` into frames and write each one, logging a single
    /// structured line describing the message as a whole.
    pub fn push_message(&mut self, msg: &Message, masked: bool) -> Result<()> {
        let frames = msg.to_frames(masked, self.options.fragment_size);
        let frame_count = frames.len();
        {
            let transport = self.transport_mut()?;
            for frame in &frames {
                frame.write(transport)?;
            }
        }
        self.options.logger.log(
            Level::Debug,
            "pushed message",
            &[
                ("opcode", msg.opcode().to_string()),
                ("length", msg.len().to_string()),
                ("frames", frame_count.to_string()),
            ],
        );
        Ok(())
    }

    /// Block until a complete message is available: read frames,
    /// transparently auto-respond to control frames, and reassemble
    /// continuation sequences. A control frame interleaved between
    /// continuation frames is returned from its own call without
    /// disturbing the in-progress reassembly, which resumes on the
    /// next call.
    pub fn pull_message(&mut self) -> Result<Message> {
        loop {
            let frame = {
                let transport = self.transport_mut()?;
                Frame::read(transport)?
            };

            self.auto_respond(&frame)?;

            if frame.opcode() == OpCode::Close {
                self.is_closing = false;
                self.disconnect();
                return Ok(Message::with_opcode(OpCode::Close, frame.into_payload()));
            }

            if frame.opcode() == OpCode::Continuation {
                let buffer = self
                    .read_buffer
                    .as_mut()
                    .ok_or(Error::Protocol(ProtocolError::UnexpectedContinuationFrame))?;
                buffer.accumulated_payload.extend_from_slice(frame.payload());
                buffer.frame_count += 1;
                if frame.is_final() {
                    let buffer = self.read_buffer.take().expect("checked above");
                    self.options.logger.log(
                        Level::Debug,
                        "pulled reassembled message",
                        &[
                            ("opcode", buffer.initial_opcode.to_string()),
                            ("frames", buffer.frame_count.to_string()),
                        ],
                    );
                    return Ok(Message::with_opcode(buffer.initial_opcode, buffer.accumulated_payload));
                }
                continue;
            }

            if !frame.is_final() {
                if self.read_buffer.is_some() {
                    return Err(Error::Protocol(ProtocolError::ExpectedFragment));
                }
                self.read_buffer = Some(ReadBuffer {
                    initial_opcode: frame.opcode(),
                    accumulated_payload: frame.payload().to_vec(),
                    frame_count: 1,
                });
                continue;
            }

            return Ok(Message::with_opcode(frame.opcode(), frame.into_payload()));
        }
    }

    /// Handle protocol-mandated auto-responses. Never swallows the
    /// frame; the caller still receives it via the loop in
    /// [`Connection::pull_message`].
    fn auto_respond(&mut self, frame: &Frame) -> Result<()> {
        match frame.opcode() {
            OpCode::Ping => {
                let pong = Frame::new(true, OpCode::Pong, frame.is_masked(), frame.payload().to_vec());
                pong.write(self.transport_mut()?)?;
                self.options.logger.log(Level::Trace, "auto-replied to ping with pong", &[]);
                Ok(())
            }
            OpCode::Close => {
                let payload = frame.payload();
                if payload.len() == 1 {
                    return Err(Error::Protocol(ProtocolError::InvalidCloseSequence));
                }
                let status_bytes: Vec<u8> = payload.get(0..2).map(<[u8]>::to_vec).unwrap_or_default();
                let status = (status_bytes.len() == 2).then(|| u16::from_be_bytes([status_bytes[0], status_bytes[1]]));
                self.close_status = status;

                if !self.is_closing {
                    let status_text = status.map(|s| s.to_string()).unwrap_or_else(|| "none".to_owned());
                    let mut reply = status_bytes;
                    reply.extend_from_slice(format!("Close acknowledged: {status_text}").as_bytes());
                    let echo = Frame::new(true, OpCode::Close, frame.is_masked(), reply);
                    echo.write(self.transport_mut()?)?;
                } else {
                    self.is_closing = false;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Send a close frame carrying `status` and `message`, then block
    /// pulling messages (discarding anything that isn't the close
    /// reply) until the peer's close frame disconnects the transport.
    pub fn close(&mut self, status: u16, message: impl AsRef<[u8]>) -> Result<()> {
        let mut payload = Vec::with_capacity(2 + message.as_ref().len());
        payload.extend_from_slice(&status.to_be_bytes());
        payload.extend_from_slice(message.as_ref());
        let frame = Frame::new(true, OpCode::Close, true, payload);
        frame.write(self.transport_mut()?)?;
        self.is_closing = true;

        while self.is_connected() {
            self.pull_message()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::io::{self, Cursor, Read, Write};

    struct MockTransport {
        incoming: Cursor<Vec<u8>>,
        outgoing: Vec<u8>,
    }

    impl MockTransport {
        fn with_frames(frames: &[Frame]) -> Self {
            let mut incoming = Vec::new();
            for frame in frames {
                frame.write(&mut incoming).unwrap();
            }
            MockTransport { incoming: Cursor::new(incoming), outgoing: Vec::new() }
        }

        fn written_frames(&self) -> Vec<Frame> {
            let mut cursor = Cursor::new(self.outgoing.clone());
            let mut frames = Vec::new();
            while (cursor.position() as usize) < self.outgoing.len() {
                frames.push(Frame::read(&mut cursor).unwrap());
            }
            frames
        }
    }

    impl Read for MockTransport {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.incoming.read(buf)
        }
    }
    impl Write for MockTransport {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.outgoing.write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
    impl Transport for MockTransport {
        fn set_timeout(&mut self, _timeout: std::time::Duration) -> io::Result<()> {
            Ok(())
        }
        fn position(&self) -> u64 {
            self.incoming.position()
        }
    }

    fn connection_with(frames: &[Frame]) -> Connection<MockTransport> {
        Connection::new(MockTransport::with_frames(frames), ClientOptions::default())
    }

    #[test]
    fn push_message_writes_expected_frames() {
        let mut conn = connection_with(&[]);
        conn.push_message(&Message::text(Bytes::from_static(b"Hello")), true).unwrap();
        let written = conn.transport.as_ref().unwrap().written_frames();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].opcode(), OpCode::Text);
        assert!(written[0].is_masked());
    }

    #[test]
    fn pull_message_reassembles_fragmented_text() {
        // S4: three frames in one call produce one reassembled message.
        let frames = vec![
            Frame::new(false, OpCode::Text, false, Bytes::from_static(b"Hel")),
            Frame::new(false, OpCode::Continuation, false, Bytes::from_static(b"lo ")),
            Frame::new(true, OpCode::Continuation, false, Bytes::from_static(b"World")),
        ];
        let mut conn = connection_with(&frames);
        let msg = conn.pull_message().unwrap();
        assert_eq!(msg.opcode(), OpCode::Text);
        assert_eq!(msg.payload(), b"Hello World");
    }

    #[test]
    fn ping_triggers_auto_pong_and_is_still_returned() {
        // S5
        let frames = vec![Frame::new(true, OpCode::Ping, false, Bytes::from_static(b"xyz"))];
        let mut conn = connection_with(&frames);
        let msg = conn.pull_message().unwrap();
        assert_eq!(msg.opcode(), OpCode::Ping);
        assert_eq!(msg.payload(), b"xyz");

        let written = conn.transport.as_ref().unwrap().written_frames();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].opcode(), OpCode::Pong);
        assert!(!written[0].is_masked());
        assert_eq!(written[0].payload(), b"xyz");
    }

    #[test]
    fn control_frame_interleaved_in_continuation_does_not_corrupt_reassembly() {
        // Testable property 7.
        let frames = vec![
            Frame::new(false, OpCode::Text, false, Bytes::from_static(b"Hel")),
            Frame::new(true, OpCode::Ping, false, Bytes::from_static(b"PING")),
            Frame::new(false, OpCode::Continuation, false, Bytes::from_static(b"lo ")),
            Frame::new(true, OpCode::Continuation, false, Bytes::from_static(b"World")),
        ];
        let mut conn = connection_with(&frames);

        let first = conn.pull_message().unwrap();
        assert_eq!(first.opcode(), OpCode::Ping);

        let second = conn.pull_message().unwrap();
        assert_eq!(second.opcode(), OpCode::Text);
        assert_eq!(second.payload(), b"Hello World");
    }

    #[test]
    fn close_handshake_records_peer_status_and_disconnects() {
        // S6, using a peer status distinct from ours to prove close_status
        // reflects the peer's code, not the locally requested one.
        let frames = vec![Frame::new(true, OpCode::Close, false, Bytes::from_static(&[0x03, 0xEA]))]; // 1002
        let mut conn = connection_with(&frames);

        conn.close(1001, "bye").unwrap();

        assert_eq!(conn.close_status(), Some(1002));
        assert!(!conn.is_connected());
    }

    #[test]
    fn close_writes_status_and_message_before_waiting_for_peer() {
        let frames = vec![Frame::new(true, OpCode::Close, false, Bytes::from_static(&[0x03, 0xE9]))];
        let mut conn = connection_with(&frames);
        conn.close(1001, "bye").unwrap();

        let written = conn.transport.as_ref();
        assert!(written.is_none(), "transport released once close handshake completes");
    }

    #[test]
    fn unsolicited_peer_close_is_echoed() {
        let frames = vec![Frame::new(true, OpCode::Close, false, Bytes::from_static(&[0x03, 0xE8]))]; // 1000
        let mut conn = connection_with(&frames);
        let msg = conn.pull_message().unwrap();
        assert_eq!(msg.opcode(), OpCode::Close);
        assert_eq!(conn.close_status(), Some(1000));
        assert!(!conn.is_connected());
    }

    #[test]
    fn one_byte_close_payload_is_rejected() {
        let frames = vec![Frame::new(true, OpCode::Close, false, Bytes::from_static(&[0x03]))];
        let mut conn = connection_with(&frames);
        assert!(matches!(
            conn.pull_message(),
            Err(Error::Protocol(ProtocolError::InvalidCloseSequence))
        ));
    }
}
