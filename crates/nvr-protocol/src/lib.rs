//! nvr-protocol: msgpack-rpc wire protocol for talking to Neovim
//!
//! This crate defines the message shapes Neovim exchanges over its RPC
//! channel and a tokio codec that frames them on a byte stream. It knows
//! nothing about sessions or editor semantics.

pub mod codec;
pub mod error;
pub mod handle;
pub mod message;

pub use codec::{MessageCodec, MAX_MESSAGE_SIZE};
pub use error::ProtocolError;
pub use handle::BufferId;
pub use message::{Message, MessageType};

/// Dynamic msgpack value, re-exported so downstream crates share one type.
pub use rmpv::Value;
