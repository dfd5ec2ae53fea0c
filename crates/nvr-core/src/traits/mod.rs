//! Core trait definitions

mod transport;

pub use transport::{Dialer, NotificationHandler, RemoteSession};
