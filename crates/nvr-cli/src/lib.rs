//! nvr: Command-line remote control for Neovim
//!
//! Provides the msgpack-rpc client the session controller drives, the
//! captured process environment and the terminal output helpers used by
//! the `nvr` binary.

pub mod env;
pub mod output;
pub mod rpc;
