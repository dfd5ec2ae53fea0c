//! Core error types for nvr

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use nvr_protocol::{ProtocolError, Value};
use thiserror::Error;

/// Top-level error returned by a session run
#[derive(Error, Debug)]
pub enum NvrError {
    /// No address was configured and launching was suppressed
    #[error("No nvim address configured and --nostart was given")]
    NoAddress,

    /// The configured session is unreachable and launching was suppressed
    #[error("No nvim session available at {address}: {source}")]
    NoSession {
        address: String,
        #[source]
        source: DialError,
    },

    /// Attaching failed for a reason other than reachability
    #[error("Failed to dial {address}: {source}")]
    Dial {
        address: String,
        #[source]
        source: DialError,
    },

    /// Launch error
    #[error("Failed to start nvim: {0}")]
    Launch(#[from] LaunchError),

    /// A remote call failed
    #[error("Remote {op} failed: {source}")]
    Remote {
        op: String,
        #[source]
        source: RemoteError,
    },

    /// `--remote-expr` produced something other than a string
    #[error("Unexpected eval result: {0}")]
    UnexpectedEvalResult(Value),

    /// Wait error
    #[error("Wait aborted: {0}")]
    Wait(#[from] WaitError),

    /// Writing the evaluated result failed
    #[error("Failed to write output: {0}")]
    Output(#[source] io::Error),
}

impl NvrError {
    /// Wrap a remote failure with the operation that caused it
    pub fn remote(op: impl Into<String>, source: RemoteError) -> Self {
        NvrError::Remote {
            op: op.into(),
            source,
        }
    }
}

/// Errors establishing a connection to a session
#[derive(Error, Debug)]
pub enum DialError {
    /// Nothing is listening at the address
    #[error("Connection refused: {0}")]
    Unreachable(#[source] io::Error),

    /// Connect did not complete in time
    #[error("Connect timed out after {0:?}")]
    TimedOut(Duration),

    /// Address could not be parsed
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Connected but the initial RPC exchange failed
    #[error("Handshake failed: {0}")]
    Handshake(#[source] RemoteError),

    /// Any other I/O failure while connecting
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

impl DialError {
    /// Classify a connect-time I/O error
    pub fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::NotFound
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::TimedOut => DialError::Unreachable(err),
            _ => DialError::Io(err),
        }
    }

    /// Whether this failure means "no session is listening there"
    pub fn is_reachability(&self) -> bool {
        matches!(self, DialError::Unreachable(_) | DialError::TimedOut(_))
    }
}

/// Errors from calls against an attached session
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Neovim answered with an error payload
    #[error("nvim: {message}")]
    Nvim { message: String },

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Connection closed before a response arrived
    #[error("Connection closed")]
    Disconnected,

    /// Response had an unexpected shape
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Errors preparing or performing the process replacement
#[derive(Error, Debug)]
pub enum LaunchError {
    /// Editor binary is not on the search path
    #[error("Could not find executable `{name}`: {source}")]
    BinaryNotFound {
        name: String,
        #[source]
        source: which::Error,
    },

    /// exec(2) failed
    #[error("Failed to exec {binary}: {source}")]
    Exec {
        binary: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Platform cannot replace the running process image
    #[error("Replacing the current process is not supported on this platform")]
    Unsupported,
}

/// Errors ending a drain before every wait resolved
#[derive(Error, Debug, PartialEq, Eq)]
pub enum WaitError {
    /// Caller cancelled (ctrl-c)
    #[error("Interrupted with {pending} buffer(s) still open")]
    Interrupted { pending: usize },

    /// Caller-level timeout expired
    #[error("Timed out after {timeout:?} with {pending} buffer(s) still open")]
    TimedOut { timeout: Duration, pending: usize },
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}
