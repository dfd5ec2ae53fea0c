//! Protocol error types

use thiserror::Error;

/// Errors that can occur during protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Message did not have the `[type, ...]` array shape msgpack-rpc requires
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Unknown message type tag
    #[error("Unknown message type: {0}")]
    UnknownMessageType(u64),

    /// Buffered bytes exceed the maximum message size without decoding
    #[error("Message too large: {size} bytes exceeds maximum of {max} bytes")]
    MessageTooLarge { size: usize, max: usize },

    /// msgpack decoding failed
    #[error("Decode error: {0}")]
    Decode(String),

    /// msgpack encoding failed
    #[error("Encode error: {0}")]
    Encode(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
