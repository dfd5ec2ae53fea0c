//! msgpack-rpc client for Neovim
//!
//! Connects over TCP (`host:port`) or a Unix domain socket (a filesystem
//! path), performs the channel handshake and exposes the result as a
//! [`nvr_core::RemoteSession`].

mod client;

pub use client::{
    parse_address, BoxedReader, BoxedWriter, Endpoint, NvimClient, NvimDialer,
    DEFAULT_CONNECT_TIMEOUT,
};
