//! Error handling.

use std::io;

/// Result type of all `wharf` calls.
pub type Result<T> = std::result::Result<T, Error>;

/// Possible WebSocket errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The target URI could not be parsed, or its scheme is not `ws`/`wss`.
    #[error("bad uri: {0}")]
    BadUri(String),

    /// The caller (on send) or the peer (on receive) used an opcode the
    /// protocol does not recognize.
    #[error("bad opcode: {0}")]
    BadOpcode(String),

    /// A generic transport or handshake failure.
    #[error("connection error: {message}")]
    Connection {
        /// Human-readable description of what failed.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<io::Error>,
    },

    /// A transport operation exceeded its configured deadline.
    ///
    /// A specialization of [`Error::Connection`], carrying the code `TIMED_OUT`.
    #[error("connection timed out")]
    Timeout,

    /// The peer closed the underlying stream unexpectedly, outside of a
    /// close handshake.
    ///
    /// A specialization of [`Error::Connection`], carrying the code `EOF`.
    #[error("connection reset without a closing handshake")]
    EofConnection,

    /// A WebSocket protocol violation, per RFC 6455.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// An I/O error bubbled up from the transport.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A TLS handshake or I/O error.
    #[cfg(feature = "native-tls")]
    #[error("tls error: {0}")]
    Tls(#[from] native_tls::Error),
}

impl Error {
    /// The machine-readable code associated with this error, if any,
    /// matching the taxonomy in the specification (`TIMED_OUT`, `EOF`).
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Error::Timeout => Some("TIMED_OUT"),
            Error::EofConnection => Some("EOF"),
            _ => None,
        }
    }

    pub(crate) fn connection(message: impl Into<String>) -> Self {
        Error::Connection { message: message.into(), source: None }
    }

    pub(crate) fn connection_with_source(message: impl Into<String>, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::TimedOut {
            return Error::Timeout;
        }
        if source.kind() == io::ErrorKind::UnexpectedEof {
            return Error::EofConnection;
        }
        Error::Connection { message: message.into(), source: Some(source) }
    }
}

/// Indicates the specific type/cause of a protocol error.
#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    /// Encountered an invalid or reserved opcode on the wire.
    #[error("invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// Control frames must not be fragmented.
    #[error("fragmented control frame")]
    FragmentedControlFrame,

    /// Control frames must have a payload of 125 bytes or less.
    #[error("control frame too big (payload must be 125 bytes or less)")]
    ControlFrameTooBig,

    /// A continuation frame arrived with nothing to continue.
    #[error("continuation frame but nothing to continue")]
    UnexpectedContinuationFrame,

    /// A data frame arrived while a fragmented message was in progress.
    #[error("received a new data frame while waiting for more fragments")]
    ExpectedFragment,

    /// The payload of a close frame is one byte (a status code needs two).
    #[error("invalid close sequence")]
    InvalidCloseSequence,

    /// The upstream peer's HTTP response did not carry a valid upgrade.
    #[error("missing or invalid \"Upgrade: websocket\" header")]
    MissingUpgradeHeader,

    /// The upstream peer's HTTP response lacked `Connection: Upgrade`.
    #[error("missing or invalid \"Connection: Upgrade\" header")]
    MissingConnectionHeader,

    /// The `Sec-WebSocket-Accept` header is absent or does not match.
    #[error("\"Sec-WebSocket-Accept\" key mismatch")]
    SecWebSocketAcceptKeyMismatch,

    /// The handshake response did not use HTTP status 101.
    #[error("server did not switch protocols (status {0})")]
    NotSwitchingProtocols(u16),
}
