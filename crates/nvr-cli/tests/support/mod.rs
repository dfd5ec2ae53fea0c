//! Fake Neovim speaking msgpack-rpc over TCP
//!
//! Understands the handful of API calls nvr makes, records what it was asked
//! to do and lets tests push notifications to connected clients.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

use nvr_protocol::{Message, MessageCodec, Value};

/// Channel id the fake hands out in `nvim_get_api_info`
pub const CHANNEL_ID: i64 = 7;

#[derive(Default)]
struct State {
    methods: Vec<String>,
    commands: Vec<String>,
    line: String,
    eval: HashMap<String, Value>,
    failing: Vec<String>,
    current_buffer: i64,
    replies: Vec<Message>,
    clients: Vec<mpsc::UnboundedSender<Message>>,
}

/// Running fake server; stops when dropped
pub struct FakeNvim {
    address: String,
    state: Arc<Mutex<State>>,
    task: JoinHandle<()>,
}

impl FakeNvim {
    /// Listen on an ephemeral localhost port
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake nvim");
        let address = listener.local_addr().unwrap().to_string();
        let state = Arc::new(Mutex::new(State {
            current_buffer: 1,
            ..Default::default()
        }));

        let accept_state = Arc::clone(&state);
        let task = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(serve(socket, Arc::clone(&accept_state)));
            }
        });

        Self {
            address,
            state,
            task,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Answer `expr` with `value`
    pub fn set_eval(&self, expr: &str, value: Value) {
        self.state.lock().eval.insert(expr.to_string(), value);
    }

    /// Reject commands starting with `prefix`
    pub fn fail_on(&self, prefix: &str) {
        self.state.lock().failing.push(prefix.to_string());
    }

    /// API methods called so far, in order
    pub fn methods(&self) -> Vec<String> {
        self.state.lock().methods.clone()
    }

    /// Ex commands received so far, in order
    pub fn commands(&self) -> Vec<String> {
        self.state.lock().commands.clone()
    }

    /// Responses clients sent to our requests
    pub fn replies(&self) -> Vec<Message> {
        self.state.lock().replies.clone()
    }

    /// Push a message to every connected client
    pub fn push(&self, message: Message) {
        let state = self.state.lock();
        for client in &state.clients {
            let _ = client.send(message.clone());
        }
    }

    pub fn notify(&self, method: &str, params: Vec<Value>) {
        self.push(Message::notification(method, params));
    }

    /// Drop every client connection
    pub fn disconnect_all(&self) {
        self.state.lock().clients.clear();
    }

    /// Poll until a command starting with `prefix` arrived
    pub async fn wait_for_command(&self, prefix: &str) -> String {
        loop {
            if let Some(command) = self
                .commands()
                .into_iter()
                .find(|c| c.starts_with(prefix))
            {
                return command;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl Drop for FakeNvim {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(socket: TcpStream, state: Arc<Mutex<State>>) {
    let (mut sink, mut stream) = Framed::new(socket, MessageCodec::new()).split();
    let (tx, mut outbound) = mpsc::unbounded_channel();
    state.lock().clients.push(tx);

    loop {
        tokio::select! {
            frame = stream.next() => {
                let message = match frame {
                    Some(Ok(message)) => message,
                    _ => break,
                };
                match message {
                    Message::Request { id, method, params } => {
                        let result = handle(&state, &method, &params);
                        if sink.send(Message::Response { id, result }).await.is_err() {
                            break;
                        }
                    }
                    reply @ Message::Response { .. } => state.lock().replies.push(reply),
                    Message::Notification { .. } => {}
                }
            }
            pushed = outbound.recv() => match pushed {
                Some(message) => {
                    if sink.send(message).await.is_err() {
                        break;
                    }
                }
                // Sender dropped by disconnect_all
                None => break,
            },
        }
    }
}

fn handle(state: &Mutex<State>, method: &str, params: &[Value]) -> Result<Value, Value> {
    let mut state = state.lock();
    state.methods.push(method.to_string());
    let arg = params
        .first()
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    match method {
        "nvim_get_api_info" => Ok(Value::Array(vec![
            Value::from(CHANNEL_ID),
            Value::Map(Vec::new()),
        ])),
        "nvim_set_client_info" => Ok(Value::Nil),
        "nvim_command" => {
            state.commands.push(arg.clone());
            if state.failing.iter().any(|p| arg.starts_with(p.as_str())) {
                return Err(nvim_error(&format!(
                    "Vim:E492: Not an editor command: {}",
                    arg
                )));
            }
            let verb = arg.split_whitespace().next().unwrap_or_default();
            if matches!(verb, "edit" | "split" | "vsplit" | "tabedit") {
                state.current_buffer += 1;
            }
            Ok(Value::Nil)
        }
        "nvim_input" => {
            if let Some(text) = arg
                .strip_prefix('i')
                .and_then(|rest| rest.strip_suffix("<Esc>"))
            {
                state.line.push_str(text);
            }
            Ok(Value::from(arg.len() as i64))
        }
        "nvim_eval" => match state.eval.get(&arg) {
            Some(value) => Ok(value.clone()),
            None if arg == "getline(1)" => Ok(Value::from(state.line.as_str())),
            None => Err(nvim_error(&format!("Vim:E121: Undefined variable: {}", arg))),
        },
        "nvim_get_current_buf" => Ok(buffer_handle(state.current_buffer)),
        other => Err(nvim_error(&format!("Invalid method: {}", other))),
    }
}

fn nvim_error(message: &str) -> Value {
    Value::Array(vec![Value::from(0), Value::from(message)])
}

/// Buffers travel as EXT type 0 wrapping a msgpack integer
pub fn buffer_handle(id: i64) -> Value {
    let mut payload = Vec::new();
    rmpv::encode::write_value(&mut payload, &Value::from(id)).unwrap();
    Value::Ext(0, payload)
}

/// An address nothing listens on
pub fn dead_address() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);
    address
}
