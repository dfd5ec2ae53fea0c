//! nvr-core: Session controller for a remotely driven Neovim
//!
//! This crate decides whether to attach to a running editor or launch a new
//! one, issues the ordered batch of remote commands an invocation asks for,
//! and optionally blocks until the opened buffers are deleted on the remote
//! side. The transport is consumed through the traits in [`traits`]; the CLI
//! crate provides the real msgpack-rpc implementation.

pub mod config;
pub mod controller;
pub mod error;
pub mod launcher;
pub mod sequencer;
pub mod traits;
pub mod wait;

pub use config::{AfterExpr, LaunchEnv, OpenMode, SessionConfig};
pub use controller::{SessionController, SessionOutcome};
pub use error::NvrError;
pub use launcher::{LaunchOutcome, Launcher, ProcessExec, ProcessImage, SystemExec};
pub use traits::{Dialer, NotificationHandler, RemoteSession};
pub use wait::{DrainOutcome, WaitCoordinator, WaitNotifier, WaitSignal};
