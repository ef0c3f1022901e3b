//! Client configuration surface.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::logger::{Logger, NullLogger};
use crate::protocol::frame::coding::OpCode;

/// Options recognized by [`crate::client::Client`], mirroring the
/// specification's option table verbatim.
#[derive(Clone)]
pub struct ClientOptions {
    /// Per-read/write timeout. Default 5 seconds.
    pub timeout: Duration,
    /// Maximum payload bytes per outgoing frame. Default 4096.
    pub fragment_size: usize,
    /// Extra/override request headers, merged into the handshake
    /// request and overriding any default of the same name.
    pub headers: Vec<(String, String)>,
    /// A preconfigured TLS connector, used instead of building a
    /// default one when connecting to a `wss://` target.
    #[cfg(feature = "native-tls")]
    pub context: Option<native_tls::TlsConnector>,
    /// Reuse an already-open transport without re-handshaking.
    pub persistent: bool,
    /// Opcodes that `receive()` surfaces to the caller. Default
    /// `{Text, Binary}`.
    pub filter: HashSet<OpCode>,
    /// If true, `receive()` returns a [`crate::protocol::Message`];
    /// otherwise it returns the raw payload bytes.
    pub return_obj: bool,
    /// Deprecated: sets the `Origin` header.
    pub origin: Option<String>,
    /// Structured log sink. Default discards everything.
    pub logger: Arc<dyn Logger>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            timeout: Duration::from_secs(5),
            fragment_size: 4096,
            headers: Vec::new(),
            #[cfg(feature = "native-tls")]
            context: None,
            persistent: false,
            filter: [OpCode::Text, OpCode::Binary].into_iter().collect(),
            return_obj: false,
            origin: None,
            logger: Arc::new(NullLogger),
        }
    }
}

impl std::fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientOptions")
            .field("timeout", &self.timeout)
            .field("fragment_size", &self.fragment_size)
            .field("headers", &self.headers)
            .field("persistent", &self.persistent)
            .field("filter", &self.filter)
            .field("return_obj", &self.return_obj)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}
