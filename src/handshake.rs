//! The client-side HTTP/1.1 Upgrade handshake, RFC 6455 §4.

use std::collections::HashMap;
use std::io::Write;

use data_encoding::BASE64;
use log::{debug, trace};
use rand::Rng;
use sha1::{Digest, Sha1};
use url::Url;

use crate::error::{Error, ProtocolError, Result};
use crate::options::ClientOptions;
use crate::stream::Transport;

const GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";
const MAX_RESPONSE_BYTES: usize = 64 * 1024;

/// Everything the handshake needed to know about the server's response,
/// beyond a bare accept/reject.
#[derive(Debug)]
pub struct HandshakeResponse {
    /// The raw status line, e.g. `HTTP/1.1 101 Switching Protocols`.
    pub status_line: String,
}

/// Generate a `Sec-WebSocket-Key`: 16 bytes drawn uniformly from the
/// printable ASCII range, base64-encoded.
pub fn generate_key() -> String {
    let mut rng = rand::rng();
    let key: [u8; 16] = std::array::from_fn(|_| rng.random_range(33u8..=126));
    BASE64.encode(&key)
}

/// Derive the expected `Sec-WebSocket-Accept` value for a given key.
pub fn derive_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(GUID.as_bytes());
    BASE64.encode(&hasher.finalize())
}

/// The request-target path for a handshake request: the URI's path
/// (defaulting to `/` if empty) plus its query string, if any.
fn request_target(url: &Url) -> String {
    let mut target = if url.path().is_empty() { "/" } else { url.path() }.to_owned();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }
    target
}

/// Build the default header set for the handshake request, in the
/// order the RFC example lays them out.
fn default_headers(url: &Url, key: &str) -> Vec<(String, String)> {
    let authority = match url.port() {
        Some(port) => format!("{}:{port}", url.host_str().unwrap_or_default()),
        None => url.host_str().unwrap_or_default().to_owned(),
    };

    let mut headers = vec![
        ("Host".to_owned(), authority),
        ("User-Agent".to_owned(), "websocket-client-php".to_owned()),
        ("Connection".to_owned(), "Upgrade".to_owned()),
        ("Upgrade".to_owned(), "websocket".to_owned()),
        ("Sec-WebSocket-Key".to_owned(), key.to_owned()),
        ("Sec-WebSocket-Version".to_owned(), "13".to_owned()),
    ];

    if !url.username().is_empty() || url.password().is_some() {
        let userinfo = format!("{}:{}", url.username(), url.password().unwrap_or_default());
        headers.push(("authorization".to_owned(), format!("Basic {}", BASE64.encode(userinfo.as_bytes()))));
    }

    headers
}

/// Assemble the full HTTP/1.1 request line and headers, with
/// `options.headers` and `options.origin` merged in on top of the
/// defaults — user-supplied headers override defaults case-sensitively.
fn build_request(url: &Url, key: &str, options: &ClientOptions) -> Vec<u8> {
    let mut headers = default_headers(url, key);

    if let Some(origin) = &options.origin {
        headers.push(("origin".to_owned(), origin.clone()));
    }

    for (name, value) in &options.headers {
        if let Some(existing) = headers.iter_mut().find(|(n, _)| n == name) {
            existing.1 = value.clone();
        } else {
            headers.push((name.clone(), value.clone()));
        }
    }

    let mut request = Vec::new();
    write!(request, "GET {} HTTP/1.1\r\n", request_target(url)).unwrap();
    for (name, value) in &headers {
        write!(request, "{name}: {value}\r\n").unwrap();
    }
    request.extend_from_slice(b"\r\n");
    request
}

/// Read the server's HTTP response in bounded chunks until the header
/// terminator `\r\n\r\n` has been seen.
fn read_response_head(transport: &mut dyn Transport) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        if buf.len() > MAX_RESPONSE_BYTES {
            return Err(Error::connection("handshake response too large"));
        }
        let n = transport
            .read(&mut chunk)
            .map_err(|e| Error::connection_with_source("reading handshake response", e))?;
        if n == 0 {
            return Err(Error::EofConnection);
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            return Ok(buf);
        }
    }
}

/// Parse the response head and return its headers, lower-cased by name
/// for the case-insensitive lookups the handshake needs.
fn parse_headers(head: &[u8]) -> Result<(u16, HashMap<String, String>)> {
    let mut header_storage = [httparse::EMPTY_HEADER; 64];
    let mut response = httparse::Response::new(&mut header_storage);
    let status = response
        .parse(head)
        .map_err(|_| Error::connection("malformed handshake response"))?;
    if status.is_partial() {
        return Err(Error::connection("incomplete handshake response"));
    }

    let code = response.code.ok_or_else(|| Error::connection("handshake response missing status code"))?;
    let mut headers = HashMap::new();
    for header in response.headers.iter() {
        let name = header.name.to_ascii_lowercase();
        let value = String::from_utf8_lossy(header.value).trim().to_owned();
        headers.insert(name, value);
    }
    Ok((code, headers))
}

/// Run the client handshake over an already-connected transport,
/// writing the Upgrade request and validating the response.
///
/// `spec.md` §4.4 step 4: skipped entirely by the caller when the
/// transport is `persistent` and already has bytes in flight
/// (`transport.position() != 0`) — that check lives in
/// [`crate::client::Client`], which alone knows whether a transport is
/// freshly dialed or reused.
pub fn client_handshake(
    transport: &mut dyn Transport,
    url: &Url,
    options: &ClientOptions,
) -> Result<HandshakeResponse> {
    let key = generate_key();
    let request = build_request(url, &key, options);
    trace!("writing handshake request to {}", url);
    transport
        .write_all(&request)
        .map_err(|e| Error::connection_with_source("writing handshake request", e))?;

    let head = read_response_head(transport)?;
    let (code, headers) = parse_headers(&head)?;

    if code != 101 {
        return Err(Error::Protocol(ProtocolError::NotSwitchingProtocols(code)));
    }

    let upgrade_ok =
        headers.get("upgrade").is_some_and(|v| v.eq_ignore_ascii_case("websocket"));
    if !upgrade_ok {
        return Err(Error::Protocol(ProtocolError::MissingUpgradeHeader));
    }
    let connection_ok = headers
        .get("connection")
        .is_some_and(|v| v.split(',').any(|token| token.trim().eq_ignore_ascii_case("upgrade")));
    if !connection_ok {
        return Err(Error::Protocol(ProtocolError::MissingConnectionHeader));
    }

    let accept = headers
        .get("sec-websocket-accept")
        .ok_or(Error::Protocol(ProtocolError::SecWebSocketAcceptKeyMismatch))?;
    let expected = derive_accept_key(&key);
    if accept.as_bytes() != expected.as_bytes() {
        return Err(Error::Protocol(ProtocolError::SecWebSocketAcceptKeyMismatch));
    }

    debug!("handshake with {} complete", url);
    Ok(HandshakeResponse { status_line: format!("HTTP/1.1 {code}") })
}
