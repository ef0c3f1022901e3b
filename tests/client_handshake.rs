//! End-to-end tests driving a loopback `TcpListener` through the full
//! stack: handshake, framing, and the connection state machine.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

use bytes::Bytes;
use wharf::connection::Connection;
use wharf::stream::CountingStream;
use wharf::{Client, ClientOptions, Frame, OpCode, Received};

/// Read bytes from `stream` until the HTTP header terminator appears,
/// mirroring the bound the client handshake itself uses.
fn read_request_head(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).unwrap();
        assert!(n > 0, "peer closed before sending a full request");
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    String::from_utf8(buf).unwrap()
}

fn extract_key(request: &str) -> String {
    request
        .lines()
        .find_map(|line| line.strip_prefix("Sec-WebSocket-Key: "))
        .expect("request must carry a Sec-WebSocket-Key header")
        .trim()
        .to_owned()
}

#[test]
fn handshake_and_text_round_trip() {
    env_logger::try_init().ok();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let request = read_request_head(&mut stream);
        assert!(request.starts_with("GET /chat HTTP/1.1\r\n"));
        assert!(request.contains("Upgrade: websocket"));

        let key = extract_key(&request);
        let accept = wharf::handshake::derive_accept_key(&key);
        write!(
            stream,
            "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {accept}\r\n\r\n"
        )
        .unwrap();

        let frame = Frame::read(&mut stream).unwrap();
        assert_eq!(frame.opcode(), OpCode::Text);
        assert_eq!(frame.payload(), b"Hello");

        let reply = Frame::new(true, OpCode::Text, false, Bytes::from_static(b"Hello back"));
        reply.write(&mut stream).unwrap();
    });

    let mut client = Client::new(&format!("ws://{addr}/chat")).unwrap();
    client.text(Bytes::from_static(b"Hello")).unwrap();
    let received = client.receive().unwrap();
    match received {
        Received::Payload(payload) => assert_eq!(payload, Bytes::from_static(b"Hello back")),
        other => panic!("expected a raw payload, got {other:?}"),
    }
    assert!(client.is_connected());

    server.join().unwrap();
}

#[test]
fn handshake_rejects_bad_accept_key() {
    env_logger::try_init().ok();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let _ = read_request_head(&mut stream);
        write!(
            stream,
            "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: not-the-right-value\r\n\r\n"
        )
        .unwrap();
    });

    let mut client = Client::new(&format!("ws://{addr}/")).unwrap();
    let result = client.text(Bytes::from_static(b"Hello"));
    assert!(result.is_err());
    assert!(!client.is_connected());

    server.join().unwrap();
}

#[test]
fn ping_auto_pong_round_trip_over_loopback() {
    // S5, driven over a real socket instead of an in-memory mock.
    env_logger::try_init().ok();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let ping = Frame::new(true, OpCode::Ping, false, Bytes::from_static(b"xyz"));
        ping.write(&mut stream).unwrap();

        let pong = Frame::read(&mut stream).unwrap();
        assert_eq!(pong.opcode(), OpCode::Pong);
        assert!(!pong.is_masked());
        assert_eq!(pong.payload(), b"xyz");
    });

    let tcp = TcpStream::connect(addr).unwrap();
    let mut conn = Connection::from_transport(CountingStream::new(tcp), ClientOptions::default());
    let msg = conn.pull_message().unwrap();
    assert_eq!(msg.opcode(), OpCode::Ping);
    assert_eq!(msg.payload(), b"xyz");

    server.join().unwrap();
}

#[test]
fn close_handshake_over_loopback() {
    // S6, with the peer echoing a different status code (1002) than the
    // one requested locally (1001), proving close_status reflects the
    // peer's code specifically.
    env_logger::try_init().ok();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let close = Frame::read(&mut stream).unwrap();
        assert_eq!(close.opcode(), OpCode::Close);
        assert_eq!(&close.payload()[..2], &[0x03, 0xE9]);
        assert_eq!(&close.payload()[2..], b"bye");

        let reply = Frame::new(true, OpCode::Close, false, Bytes::from_static(&[0x03, 0xEA]));
        reply.write(&mut stream).unwrap();
    });

    let tcp = TcpStream::connect(addr).unwrap();
    let mut conn = Connection::from_transport(CountingStream::new(tcp), ClientOptions::default());
    conn.close(1001, "bye").unwrap();

    assert_eq!(conn.close_status(), Some(1002));
    assert!(!conn.is_connected());

    server.join().unwrap();
}

#[test]
fn receive_with_return_obj_yields_messages_for_both_data_and_close() {
    env_logger::try_init().ok();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let request = read_request_head(&mut stream);
        let key = extract_key(&request);
        let accept = wharf::handshake::derive_accept_key(&key);
        write!(
            stream,
            "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {accept}\r\n\r\n"
        )
        .unwrap();

        let reply = Frame::new(true, OpCode::Text, false, Bytes::from_static(b"Hello back"));
        reply.write(&mut stream).unwrap();

        let close = Frame::new(true, OpCode::Close, false, Bytes::from_static(&[0x03, 0xE9, b'b', b'y', b'e']));
        close.write(&mut stream).unwrap();
    });

    let mut options = ClientOptions::default();
    options.return_obj = true;
    let mut client = Client::with_options(&format!("ws://{addr}/"), options).unwrap();

    match client.receive().unwrap() {
        Received::Message(msg) => {
            assert_eq!(msg.opcode(), OpCode::Text);
            assert_eq!(msg.payload(), b"Hello back");
        }
        other => panic!("expected a Message, got {other:?}"),
    }

    match client.receive().unwrap() {
        Received::Message(msg) => {
            assert_eq!(msg.opcode(), OpCode::Close);
            assert_eq!(&msg.payload()[..2], &[0x03, 0xE9]);
            assert_eq!(&msg.payload()[2..], b"bye");
        }
        other => panic!("expected the close Message, got {other:?}"),
    }
    assert!(!client.is_connected());

    server.join().unwrap();
}
