//! Neovim msgpack-rpc client
//!
//! Requests are correlated by id through a pending map of oneshot senders.
//! A background reader task owns the read half of the connection and
//! dispatches responses and notifications as they arrive.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};

use nvr_core::error::{DialError, RemoteError};
use nvr_core::{Dialer, NotificationHandler, RemoteSession};
use nvr_protocol::{BufferId, Message, MessageCodec, Value};

/// Default time allowed for the connect and the handshake
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Read half of a connection
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
/// Write half of a connection
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
type Writer = Arc<tokio::sync::Mutex<FramedWrite<BoxedWriter, MessageCodec>>>;
type ResponseSender = oneshot::Sender<Result<Value, Value>>;

/// Where a session listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `host:port`
    Tcp(String),
    /// Filesystem path of a Unix domain socket
    Unix(PathBuf),
}

/// Classify an address string.
///
/// Anything containing a path separator is a socket path. Otherwise a
/// trailing `:port` selects TCP and the port must be a valid number.
pub fn parse_address(address: &str) -> Result<Endpoint, DialError> {
    if address.is_empty() {
        return Err(DialError::InvalidAddress("empty address".to_string()));
    }
    if address.contains(std::path::MAIN_SEPARATOR) || address.contains('/') {
        return Ok(Endpoint::Unix(PathBuf::from(address)));
    }

    match address.rsplit_once(':') {
        Some((host, port)) => {
            if host.is_empty() || port.parse::<u16>().is_err() {
                return Err(DialError::InvalidAddress(address.to_string()));
            }
            Ok(Endpoint::Tcp(address.to_string()))
        }
        None => Ok(Endpoint::Unix(PathBuf::from(address))),
    }
}

/// State shared between the client and its reader task
#[derive(Default)]
struct Shared {
    pending: Mutex<HashMap<u32, ResponseSender>>,
    handlers: Mutex<HashMap<String, NotificationHandler>>,
    closed: AtomicBool,
}

impl Shared {
    /// Fail every in-flight request and forget every handler
    fn shutdown(&self) {
        let dropped = {
            let mut pending = self.pending.lock();
            self.closed.store(true, Ordering::SeqCst);
            pending.drain().count()
        };
        self.handlers.lock().clear();
        if dropped > 0 {
            tracing::debug!(dropped, "Connection closed with requests in flight");
        }
    }
}

/// Connected msgpack-rpc session with a Neovim instance
pub struct NvimClient {
    shared: Arc<Shared>,
    writer: Writer,
    next_id: AtomicU32,
    channel_id: AtomicI64,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl NvimClient {
    /// Connect to `address` and perform the channel handshake
    pub async fn connect(address: &str, connect_timeout: Duration) -> Result<Self, DialError> {
        let endpoint = parse_address(address)?;
        tracing::debug!(?endpoint, "Connecting to nvim");

        let (reader, writer) = tokio::time::timeout(connect_timeout, open(&endpoint))
            .await
            .map_err(|_| DialError::TimedOut(connect_timeout))??;

        let client = Self::from_halves(reader, writer);
        tokio::time::timeout(connect_timeout, client.handshake())
            .await
            .map_err(|_| {
                DialError::Handshake(RemoteError::UnexpectedResponse(format!(
                    "no answer to nvim_get_api_info within {:?}",
                    connect_timeout
                )))
            })??;

        tracing::debug!(channel = client.channel_id(), "Connected to nvim");
        Ok(client)
    }

    /// Wrap an already established stream pair and start the reader task
    pub fn from_halves(reader: BoxedReader, writer: BoxedWriter) -> Self {
        let shared = Arc::new(Shared::default());
        let writer: Writer = Arc::new(tokio::sync::Mutex::new(FramedWrite::new(
            writer,
            MessageCodec::new(),
        )));

        let task = tokio::spawn(read_loop(
            FramedRead::new(reader, MessageCodec::new()),
            Arc::clone(&shared),
            Arc::clone(&writer),
        ));

        Self {
            shared,
            writer,
            next_id: AtomicU32::new(1),
            channel_id: AtomicI64::new(0),
            reader: Mutex::new(Some(task)),
        }
    }

    /// Learn our channel id and announce ourselves
    async fn handshake(&self) -> Result<(), DialError> {
        let info = self
            .call("nvim_get_api_info", Vec::new())
            .await
            .map_err(DialError::Handshake)?;

        let channel = info
            .as_array()
            .and_then(|parts| parts.first())
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                DialError::Handshake(RemoteError::UnexpectedResponse(format!(
                    "nvim_get_api_info returned {}",
                    info
                )))
            })?;
        self.channel_id.store(channel, Ordering::SeqCst);

        self.call("nvim_set_client_info", client_info())
            .await
            .map_err(DialError::Handshake)?;
        Ok(())
    }

    /// Issue a request and wait for its response
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RemoteError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.shared.pending.lock();
            if self.shared.closed.load(Ordering::SeqCst) {
                return Err(RemoteError::Disconnected);
            }
            pending.insert(id, tx);
        }

        tracing::trace!(id, method, "Sending request");
        let sent = self
            .writer
            .lock()
            .await
            .send(Message::request(id, method, params))
            .await;
        if let Err(e) = sent {
            self.shared.pending.lock().remove(&id);
            return Err(e.into());
        }

        match rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(nvim_error(error)),
            Err(_) => Err(RemoteError::Disconnected),
        }
    }

    fn stop_reader(&self) {
        if let Some(task) = self.reader.lock().take() {
            task.abort();
        }
    }
}

impl Drop for NvimClient {
    fn drop(&mut self) {
        self.stop_reader();
    }
}

#[async_trait]
impl RemoteSession for NvimClient {
    async fn command(&self, command: &str) -> Result<(), RemoteError> {
        tracing::debug!(command, "nvim_command");
        self.call("nvim_command", vec![Value::from(command)])
            .await
            .map(|_| ())
    }

    async fn input(&self, keys: &str) -> Result<i64, RemoteError> {
        let written = self.call("nvim_input", vec![Value::from(keys)]).await?;
        written.as_i64().ok_or_else(|| {
            RemoteError::UnexpectedResponse(format!("nvim_input returned {}", written))
        })
    }

    async fn eval(&self, expr: &str) -> Result<Value, RemoteError> {
        tracing::debug!(expr, "nvim_eval");
        self.call("nvim_eval", vec![Value::from(expr)]).await
    }

    async fn register_handler(
        &self,
        event: &str,
        handler: NotificationHandler,
    ) -> Result<(), RemoteError> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(RemoteError::Disconnected);
        }
        self.shared
            .handlers
            .lock()
            .insert(event.to_string(), handler);
        Ok(())
    }

    fn channel_id(&self) -> i64 {
        self.channel_id.load(Ordering::SeqCst)
    }

    async fn current_buffer(&self) -> Result<BufferId, RemoteError> {
        let buffer = self.call("nvim_get_current_buf", Vec::new()).await?;
        BufferId::from_value(&buffer).ok_or_else(|| {
            RemoteError::UnexpectedResponse(format!("nvim_get_current_buf returned {}", buffer))
        })
    }

    async fn close(&self) -> Result<(), RemoteError> {
        self.stop_reader();
        self.shared.shutdown();
        self.writer.lock().await.close().await?;
        Ok(())
    }
}

/// Dials Neovim over TCP or a Unix socket
#[derive(Debug, Clone)]
pub struct NvimDialer {
    connect_timeout: Duration,
}

impl Default for NvimDialer {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl NvimDialer {
    /// Dialer giving up on unresponsive addresses after `connect_timeout`
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl Dialer for NvimDialer {
    type Session = NvimClient;

    async fn dial(&self, address: &str) -> Result<NvimClient, DialError> {
        NvimClient::connect(address, self.connect_timeout).await
    }
}

async fn open(endpoint: &Endpoint) -> Result<(BoxedReader, BoxedWriter), DialError> {
    match endpoint {
        Endpoint::Tcp(address) => {
            let stream = TcpStream::connect(address)
                .await
                .map_err(DialError::from_io)?;
            // Small request/response exchanges; don't batch them
            stream.set_nodelay(true).map_err(DialError::Io)?;
            let (reader, writer) = stream.into_split();
            let reader: BoxedReader = Box::new(reader);
            let writer: BoxedWriter = Box::new(writer);
            Ok((reader, writer))
        }
        #[cfg(unix)]
        Endpoint::Unix(path) => {
            let stream = tokio::net::UnixStream::connect(path)
                .await
                .map_err(DialError::from_io)?;
            let (reader, writer) = stream.into_split();
            let reader: BoxedReader = Box::new(reader);
            let writer: BoxedWriter = Box::new(writer);
            Ok((reader, writer))
        }
        #[cfg(not(unix))]
        Endpoint::Unix(path) => Err(DialError::InvalidAddress(format!(
            "unix sockets are not supported on this platform: {}",
            path.display()
        ))),
    }
}

async fn read_loop(
    mut reader: FramedRead<BoxedReader, MessageCodec>,
    shared: Arc<Shared>,
    writer: Writer,
) {
    while let Some(frame) = reader.next().await {
        match frame {
            Ok(Message::Response { id, result }) => {
                let waiter = shared.pending.lock().remove(&id);
                match waiter {
                    Some(waiter) => {
                        let _ = waiter.send(result);
                    }
                    None => tracing::warn!(id, "Response for unknown request"),
                }
            }
            Ok(Message::Notification { method, params }) => {
                let handler = shared.handlers.lock().get(&method).cloned();
                match handler {
                    Some(handler) => handler(params),
                    None => tracing::trace!(%method, "Unhandled notification"),
                }
            }
            Ok(Message::Request { id, method, .. }) => {
                tracing::debug!(id, %method, "Rejecting request from nvim");
                let reply = Message::Response {
                    id,
                    result: Err(Value::from(format!("nvr does not handle {}", method))),
                };
                if let Err(e) = writer.lock().await.send(reply).await {
                    tracing::warn!(error = %e, "Failed to reject request");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dropping connection after protocol error");
                break;
            }
        }
    }

    tracing::debug!("nvim connection closed");
    shared.shutdown();
}

/// Neovim reports failures as `[error_type, message]`
fn nvim_error(error: Value) -> RemoteError {
    let message = match &error {
        Value::Array(parts) => parts
            .get(1)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
        Value::String(s) => s.as_str().map(str::to_string).unwrap_or_else(|| error.to_string()),
        _ => error.to_string(),
    };
    RemoteError::Nvim { message }
}

fn client_info() -> Vec<Value> {
    let version = |part: &str| Value::from(part.parse::<u64>().unwrap_or(0));
    vec![
        Value::from("nvr"),
        Value::Map(vec![
            (Value::from("major"), version(env!("CARGO_PKG_VERSION_MAJOR"))),
            (Value::from("minor"), version(env!("CARGO_PKG_VERSION_MINOR"))),
            (Value::from("patch"), version(env!("CARGO_PKG_VERSION_PATCH"))),
        ]),
        Value::from("remote"),
        Value::Map(Vec::new()),
        Value::Map(Vec::new()),
    ]
}
