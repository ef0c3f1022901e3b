//! A client-side, blocking implementation of RFC 6455 WebSockets.
//!
//! Framing, message assembly/fragmentation, the client Upgrade
//! handshake, and the connection state machine that mediates
//! ping/pong/close live here. There is no server role, no
//! permessage-deflate, and no async runtime integration — see
//! [`client::Client`] for the façade most callers want.

#![deny(unused_must_use, unused_import_braces)]

pub mod client;
pub mod connection;
pub mod error;
pub mod handshake;
pub mod logger;
pub mod options;
pub mod protocol;
pub mod stream;

pub use client::{Client, Received};
pub use error::{Error, ProtocolError, Result};
pub use options::ClientOptions;
pub use protocol::{Frame, Message, OpCode};
