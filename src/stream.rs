//! The transport contract the core consumes, plus a concrete
//! TCP/TLS implementation so [`crate::client::Client`] is actually
//! usable out of the box.
//!
//! The framing and connection logic in this crate never talks to
//! [`std::net::TcpStream`] directly — everything goes through
//! [`Transport`], so a caller can hand `Connection::from_transport` any
//! `mio` socket, test double, or other `Read + Write` type that also
//! knows how to set a deadline.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

/// The byte-stream contract the connection and handshake logic consume.
///
/// `read`/`write` (via the `Read`/`Write` supertraits, used through
/// `read_exact`/`write_all`) are expected to block until satisfied or
/// to fail; `position` is consulted only to decide whether a
/// `persistent` transport has already exchanged bytes and can skip
/// re-handshaking.
pub trait Transport: Read + Write {
    /// Set the deadline for subsequent read and write operations.
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;

    /// Total bytes read through this transport so far. Used only to
    /// detect whether a `persistent` transport has already been used.
    fn position(&self) -> u64;

    /// Read until a `\n` byte (inclusive) or `max` bytes, whichever
    /// comes first. Mirrors a line-oriented `gets` primitive, used by
    /// the handshake to read HTTP response lines without depending on
    /// a buffered reader type.
    fn read_line(&mut self, max: usize) -> io::Result<Vec<u8>> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        while line.len() < max {
            let n = self.read(&mut byte)?;
            if n == 0 {
                break;
            }
            line.push(byte[0]);
            if byte[0] == b'\n' {
                break;
            }
        }
        Ok(line)
    }
}

/// Endpoints able to report and install a blocking read/write deadline.
trait SetDeadline {
    fn set_deadline(&mut self, timeout: Duration) -> io::Result<()>;
}

impl SetDeadline for TcpStream {
    fn set_deadline(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_read_timeout(Some(timeout))?;
        self.set_write_timeout(Some(timeout))
    }
}

#[cfg(feature = "native-tls")]
impl SetDeadline for native_tls::TlsStream<TcpStream> {
    fn set_deadline(&mut self, timeout: Duration) -> io::Result<()> {
        self.get_ref().set_read_timeout(Some(timeout))?;
        self.get_ref().set_write_timeout(Some(timeout))
    }
}

/// A socket, either plain TCP or (behind the `native-tls` feature) TLS.
pub enum MaybeTlsStream {
    /// A `ws://` connection.
    Plain(TcpStream),
    /// A `wss://` connection.
    #[cfg(feature = "native-tls")]
    Tls(native_tls::TlsStream<TcpStream>),
}

impl Read for MaybeTlsStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            MaybeTlsStream::Plain(s) => s.read(buf),
            #[cfg(feature = "native-tls")]
            MaybeTlsStream::Tls(s) => s.read(buf),
        }
    }
}

impl Write for MaybeTlsStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            MaybeTlsStream::Plain(s) => s.write(buf),
            #[cfg(feature = "native-tls")]
            MaybeTlsStream::Tls(s) => s.write(buf),
        }
    }
    fn flush(&mut self) -> io::Result<()> {
        match self {
            MaybeTlsStream::Plain(s) => s.flush(),
            #[cfg(feature = "native-tls")]
            MaybeTlsStream::Tls(s) => s.flush(),
        }
    }
}

impl SetDeadline for MaybeTlsStream {
    fn set_deadline(&mut self, timeout: Duration) -> io::Result<()> {
        match self {
            MaybeTlsStream::Plain(s) => s.set_deadline(timeout),
            #[cfg(feature = "native-tls")]
            MaybeTlsStream::Tls(s) => s.set_deadline(timeout),
        }
    }
}

/// Wraps any socket able to set a deadline and turns it into a
/// [`Transport`] by counting the bytes read through it, which is the
/// signal `spec.md` §4.4 and §9 use to tell whether a `persistent`
/// stream has already been used and can skip the handshake.
pub struct CountingStream<S> {
    inner: S,
    bytes_read: u64,
}

impl<S> CountingStream<S> {
    /// Wrap a socket, starting the byte counter at zero.
    pub fn new(inner: S) -> Self {
        CountingStream { inner, bytes_read: 0 }
    }

    /// Borrow the underlying socket.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<S: Read> Read for CountingStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.bytes_read += n as u64;
        Ok(n)
    }
}

impl<S: Write> Write for CountingStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<S: Read + Write + SetDeadline> Transport for CountingStream<S> {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.inner.set_deadline(timeout)
    }

    fn position(&self) -> u64 {
        self.bytes_read
    }
}
