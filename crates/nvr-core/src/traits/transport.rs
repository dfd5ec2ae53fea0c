//! Transport traits
//!
//! The session controller only needs a handful of remote capabilities. They
//! are expressed here so the controller can be driven by the real
//! msgpack-rpc client or by an in-memory fake.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{DialError, RemoteError};
use nvr_protocol::{BufferId, Value};

/// Callback invoked with the arguments of a remote notification.
///
/// Runs on the transport's background reader task, so it must not block.
pub type NotificationHandler = Arc<dyn Fn(Vec<Value>) + Send + Sync>;

/// An attached editor session
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Execute an Ex command
    async fn command(&self, command: &str) -> Result<(), RemoteError>;

    /// Queue raw key input; returns the number of bytes consumed
    async fn input(&self, keys: &str) -> Result<i64, RemoteError>;

    /// Evaluate a Vimscript expression
    async fn eval(&self, expr: &str) -> Result<Value, RemoteError>;

    /// Route notifications named `event` to `handler`.
    ///
    /// Registering the same event again replaces the previous handler; every
    /// notification invokes the current handler exactly once.
    async fn register_handler(
        &self,
        event: &str,
        handler: NotificationHandler,
    ) -> Result<(), RemoteError>;

    /// RPC channel id the editor knows this connection by
    fn channel_id(&self) -> i64;

    /// Buffer that is current in the editor
    async fn current_buffer(&self) -> Result<BufferId, RemoteError>;

    /// Close the connection; no handler fires afterwards
    async fn close(&self) -> Result<(), RemoteError>;
}

/// Establishes sessions
#[async_trait]
pub trait Dialer: Send + Sync {
    /// The session type produced
    type Session: RemoteSession;

    /// Connect to the session listening at `address`
    async fn dial(&self, address: &str) -> Result<Self::Session, DialError>;
}
