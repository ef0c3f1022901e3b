//! A pluggable structured log sink.
//!
//! The `log` crate's global facade (`log::trace!` etc.) covers this
//! crate's own internal diagnostics, exactly as in the teacher. This
//! module is the separate, explicit knob the specification asks for:
//! a settable sink on [`crate::client::Client`] and
//! [`crate::connection::Connection`] that receives a severity, a
//! message, and structured key/value context, so an embedding
//! application can route WebSocket activity into its own logging
//! pipeline without installing a global logger.

use log::Level;

/// A structured log sink accepting a severity, a message, and
/// key/value context pairs.
pub trait Logger: Send + Sync {
    /// Record one structured log line.
    fn log(&self, level: Level, message: &str, context: &[(&str, String)]);
}

/// The default logger: discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _level: Level, _message: &str, _context: &[(&str, String)]) {}
}

/// A logger that forwards to the `log` crate's global facade, tagging
/// each line with its structured context.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobalLogger;

impl Logger for GlobalLogger {
    fn log(&self, level: Level, message: &str, context: &[(&str, String)]) {
        if context.is_empty() {
            log::log!(level, "{message}");
            return;
        }
        let mut rendered = String::new();
        for (key, value) in context {
            use std::fmt::Write;
            let _ = write!(rendered, " {key}={value}");
        }
        log::log!(level, "{message}{rendered}");
    }
}
