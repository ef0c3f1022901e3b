//! Wire-level WebSocket building blocks: opcodes, frames, and messages.

pub mod frame;
mod message;

pub use frame::coding::OpCode;
pub use frame::Frame;
pub use message::Message;
