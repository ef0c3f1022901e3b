//! The user-facing façade: a URI, a set of options, and a lazily
//! established [`Connection`].

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use bytes::Bytes;
use log::debug;
use url::Url;

use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::options::ClientOptions;
use crate::protocol::{Message, OpCode};
use crate::stream::{CountingStream, MaybeTlsStream, Transport};

/// Which transport a URI scheme asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Plain,
    Tls,
}

fn transport_mode(url: &Url) -> Result<Mode> {
    match url.scheme() {
        "ws" => Ok(Mode::Plain),
        "wss" => Ok(Mode::Tls),
        other => Err(Error::BadUri(format!("unsupported scheme: {other}"))),
    }
}

fn validate_scheme(url: &Url) -> Result<()> {
    transport_mode(url).map(|_| ())
}

#[cfg(feature = "native-tls")]
fn wrap_stream(stream: TcpStream, domain: &str, mode: Mode, options: &ClientOptions) -> Result<MaybeTlsStream> {
    match mode {
        Mode::Plain => Ok(MaybeTlsStream::Plain(stream)),
        Mode::Tls => {
            let connector = match &options.context {
                Some(connector) => connector.clone(),
                None => native_tls::TlsConnector::new()?,
            };
            connector.connect(domain, stream).map(MaybeTlsStream::Tls).map_err(|e| match e {
                native_tls::HandshakeError::Failure(err) => Error::from(err),
                native_tls::HandshakeError::WouldBlock(_) => {
                    unreachable!("blocking TcpStream handshake cannot return WouldBlock")
                }
            })
        }
    }
}

#[cfg(not(feature = "native-tls"))]
fn wrap_stream(stream: TcpStream, _domain: &str, mode: Mode, _options: &ClientOptions) -> Result<MaybeTlsStream> {
    match mode {
        Mode::Plain => Ok(MaybeTlsStream::Plain(stream)),
        Mode::Tls => Err(Error::connection("TLS support not compiled in (enable the \"native-tls\" feature)")),
    }
}

fn dial(url: &Url, mode: Mode) -> Result<TcpStream> {
    let host = url.host_str().ok_or_else(|| Error::BadUri("missing host".to_owned()))?;
    let port = url.port_or_known_default().unwrap_or(match mode {
        Mode::Plain => 80,
        Mode::Tls => 443,
    });

    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|e| Error::connection_with_source(format!("resolving {host}:{port}"), e))?;

    let mut last_err = None;
    for addr in addrs {
        debug!("connecting to {addr} for {url}");
        match TcpStream::connect(addr) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(match last_err {
        Some(e) => Error::connection_with_source(format!("connecting to {host}:{port}"), e),
        None => Error::connection(format!("no addresses resolved for {host}:{port}")),
    })
}

/// What a successful [`Client::receive`] call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// `options.return_obj == true`: the full message.
    Message(Message),
    /// `options.return_obj == false` (the default): just the payload.
    Payload(Bytes),
    /// The peer sent a close frame; the connection is now disconnected.
    Closed,
}

/// A client-side WebSocket: a target URI plus options, connecting
/// lazily on the first send or receive.
pub struct Client {
    url: Url,
    options: ClientOptions,
    connection: Option<Connection<CountingStream<MaybeTlsStream>>>,
    last_opcode: Option<OpCode>,
}

impl Client {
    /// Parse and validate `uri` eagerly; the transport connection and
    /// handshake are still performed lazily on first use.
    pub fn new(uri: &str) -> Result<Self> {
        Self::with_options(uri, ClientOptions::default())
    }

    /// As [`Client::new`], with a non-default option set from the start.
    pub fn with_options(uri: &str, options: ClientOptions) -> Result<Self> {
        let url = Url::parse(uri).map_err(|e| Error::BadUri(e.to_string()))?;
        validate_scheme(&url)?;
        Ok(Client { url, options, connection: None, last_opcode: None })
    }

    /// Replace the whole option set. Per the concurrency model, this
    /// must not be called while a frame is mid-read/write — safe as
    /// long as it isn't invoked concurrently with `send`/`receive` on
    /// another thread, since `Client` holds its `Connection` outright.
    pub fn set_options(&mut self, options: ClientOptions) {
        self.options = options;
        if let Some(connection) = &mut self.connection {
            let _ = connection.set_timeout(self.options.timeout);
        }
    }

    fn ensure_connected(&mut self) -> Result<()> {
        if self.connection.is_some() {
            return Ok(());
        }
        self.connect()
    }

    /// Perform the handshake described in `spec.md` §4.4 and install
    /// the resulting connection.
    fn connect(&mut self) -> Result<()> {
        let mode = transport_mode(&self.url)?;
        let host = self.url.host_str().ok_or_else(|| Error::BadUri("missing host".to_owned()))?.to_owned();

        let tcp = dial(&self.url, mode)?;
        tcp.set_nodelay(true).map_err(|e| Error::connection_with_source("setting TCP_NODELAY", e))?;
        let socket = wrap_stream(tcp, &host, mode, &self.options)?;
        let mut transport = CountingStream::new(socket);
        transport
            .set_timeout(self.options.timeout)
            .map_err(|e| Error::connection_with_source("setting transport timeout", e))?;

        let reusable = self.options.persistent && transport.position() != 0;
        if !reusable {
            crate::handshake::client_handshake(&mut transport, &self.url, &self.options)?;
        }

        self.connection = Some(Connection::new(transport, self.options.clone()));
        Ok(())
    }

    fn connection_mut(&mut self) -> &mut Connection<CountingStream<MaybeTlsStream>> {
        self.connection.as_mut().expect("ensure_connected was called first")
    }

    /// Send a single Text message.
    pub fn text(&mut self, payload: impl Into<Bytes>) -> Result<()> {
        self.ensure_connected()?;
        let msg = Message::text(payload);
        self.connection_mut().push_message(&msg, true)
    }

    /// Send a single Binary message.
    pub fn binary(&mut self, payload: impl Into<Bytes>) -> Result<()> {
        self.ensure_connected()?;
        let msg = Message::binary(payload);
        self.connection_mut().push_message(&msg, true)
    }

    /// Send a Ping control message.
    pub fn ping(&mut self, payload: impl Into<Bytes>) -> Result<()> {
        self.ensure_connected()?;
        let msg = Message::ping(payload);
        self.connection_mut().push_message(&msg, true)
    }

    /// Send a Pong control message.
    pub fn pong(&mut self, payload: impl Into<Bytes>) -> Result<()> {
        self.ensure_connected()?;
        let msg = Message::pong(payload);
        self.connection_mut().push_message(&msg, true)
    }

    /// Send a message of the given named opcode (`"text"`, `"binary"`,
    /// `"ping"`, `"pong"`, or `"close"`), rejecting anything else as a
    /// `BadOpcode` error before any bytes are written.
    pub fn send(&mut self, payload: impl Into<Bytes>, opcode: &str, masked: bool) -> Result<()> {
        let opcode = match opcode {
            "text" => OpCode::Text,
            "binary" => OpCode::Binary,
            "ping" => OpCode::Ping,
            "pong" => OpCode::Pong,
            "close" => OpCode::Close,
            other => return Err(Error::BadOpcode(other.to_owned())),
        };
        self.ensure_connected()?;
        let msg = Message::with_opcode(opcode, payload);
        self.connection_mut().push_message(&msg, masked)
    }

    /// Block until a message arrives whose opcode passes
    /// `options.filter` (default `{Text, Binary}`), or a Close frame
    /// arrives. Anything else (e.g. a Ping, absent a `filter` override)
    /// is pulled and discarded transparently.
    pub fn receive(&mut self) -> Result<Received> {
        self.ensure_connected()?;
        loop {
            let msg = self.connection_mut().pull_message()?;

            if msg.opcode() == OpCode::Close {
                self.last_opcode = None;
                return Ok(if self.options.return_obj { Received::Message(msg) } else { Received::Closed });
            }

            if self.options.filter.contains(&msg.opcode()) {
                self.last_opcode = Some(msg.opcode());
                return Ok(if self.options.return_obj {
                    Received::Message(msg)
                } else {
                    Received::Payload(Bytes::copy_from_slice(msg.payload()))
                });
            }
        }
    }

    /// Send a Close frame and wait for the peer's Close reply.
    pub fn close(&mut self, status: u16, message: impl AsRef<[u8]>) -> Result<()> {
        self.ensure_connected()?;
        self.connection_mut().close(status, message)
    }

    /// Disconnect without a close handshake.
    pub fn disconnect(&mut self) {
        if let Some(connection) = &mut self.connection {
            connection.disconnect();
        }
        self.connection = None;
    }

    /// Whether a live connection is currently held.
    pub fn is_connected(&self) -> bool {
        self.connection.as_ref().is_some_and(Connection::is_connected)
    }

    /// The URI this client was constructed with, as a human-readable name.
    pub fn get_name(&self) -> &str {
        self.url.as_str()
    }

    /// The remote host:port this client connects to.
    pub fn get_remote_name(&self) -> String {
        match self.url.port_or_known_default() {
            Some(port) => format!("{}:{port}", self.url.host_str().unwrap_or_default()),
            None => self.url.host_str().unwrap_or_default().to_owned(),
        }
    }

    /// The peer's close status code, once a close frame has been received.
    pub fn get_close_status(&self) -> Option<u16> {
        self.connection.as_ref().and_then(Connection::close_status)
    }

    /// The opcode of the last message `receive()` surfaced to the caller.
    pub fn get_last_opcode(&self) -> Option<OpCode> {
        self.last_opcode
    }

    /// The maximum payload bytes per outgoing frame.
    pub fn get_fragment_size(&self) -> usize {
        self.options.fragment_size
    }

    /// Set the maximum payload bytes per outgoing frame.
    pub fn set_fragment_size(&mut self, fragment_size: usize) {
        self.options.fragment_size = fragment_size;
    }

    /// Set the per-read/write transport timeout, propagating it to the
    /// live connection if one exists.
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.options.timeout = timeout;
        if let Some(connection) = &mut self.connection {
            connection.set_timeout(timeout)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.url)
            .field("connected", &self.is_connected())
            .field("last_opcode", &self.last_opcode)
            .finish()
    }
}
