//! Shared test doubles: an in-memory editor session, a dialer serving it
//! and an executor that records process images instead of exec'ing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use nvr_core::error::{DialError, RemoteError};
use nvr_core::{
    Dialer, LaunchEnv, LaunchOutcome, Launcher, NotificationHandler, ProcessExec, ProcessImage,
    RemoteSession, SessionController,
};
use nvr_protocol::{BufferId, Value};

/// One call observed by the fake editor
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Command(String),
    Input(String),
    Eval(String),
    RegisterHandler(String),
    CurrentBuffer,
    Close,
}

struct EditorState {
    calls: Vec<Call>,
    lines: Vec<String>,
    handlers: HashMap<String, NotificationHandler>,
    current_buffer: i64,
    next_buffer: i64,
    watched: Vec<i64>,
    eval_results: HashMap<String, Value>,
    failing: Vec<String>,
    closed: bool,
}

/// In-memory stand-in for a running editor; clones share state
#[derive(Clone)]
pub struct FakeEditor {
    state: Arc<Mutex<EditorState>>,
    channel: i64,
}

impl Default for FakeEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeEditor {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(EditorState {
                calls: Vec::new(),
                lines: vec![String::new()],
                handlers: HashMap::new(),
                current_buffer: 1,
                next_buffer: 2,
                watched: Vec::new(),
                eval_results: HashMap::new(),
                failing: Vec::new(),
                closed: false,
            })),
            channel: 3,
        }
    }

    /// Answer `expr` with `value`
    pub fn with_eval(self, expr: &str, value: Value) -> Self {
        self.state
            .lock()
            .eval_results
            .insert(expr.to_string(), value);
        self
    }

    /// Fail every command starting with `prefix`
    pub fn fail_on(self, prefix: &str) -> Self {
        self.state.lock().failing.push(prefix.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Command(command) => Some(command),
                _ => None,
            })
            .collect()
    }

    /// Buffers that have a BufDelete hook installed, in registration order
    pub fn watched(&self) -> Vec<i64> {
        self.state.lock().watched.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn has_handler(&self, event: &str) -> bool {
        self.state.lock().handlers.contains_key(event)
    }

    /// Deliver a notification; returns false when nothing is registered
    pub fn fire(&self, event: &str, args: Vec<Value>) -> bool {
        let handler = self.state.lock().handlers.get(event).cloned();
        match handler {
            Some(handler) => {
                handler(args);
                true
            }
            None => false,
        }
    }

    /// Delete buffer `id` as the editor would: fire its BufDelete hook
    pub fn delete_buffer(&self, id: i64) -> bool {
        self.fire("BufDelete", vec![Value::from(id)])
    }

    /// Simulate the editor going away: every handler is dropped
    pub fn disconnect(&self) {
        self.state.lock().handlers.clear();
    }

    /// Poll until `n` buffers are watched
    pub async fn wait_for_watched(&self, n: usize) -> Vec<i64> {
        loop {
            let watched = self.watched();
            if watched.len() >= n {
                return watched;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Poll until the last command issued equals `command`
    pub async fn wait_for_command(&self, command: &str) {
        while self.commands().last().map(String::as_str) != Some(command) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn record(&self, call: Call) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(RemoteError::Disconnected);
        }
        state.calls.push(call);
        Ok(())
    }
}

#[async_trait]
impl RemoteSession for FakeEditor {
    async fn command(&self, command: &str) -> Result<(), RemoteError> {
        self.record(Call::Command(command.to_string()))?;

        let mut state = self.state.lock();
        if state.failing.iter().any(|prefix| command.starts_with(prefix)) {
            return Err(RemoteError::Nvim {
                message: format!("Vim:E492: Not an editor command: {}", command),
            });
        }

        let verb = command.split_whitespace().next().unwrap_or_default();
        if matches!(verb, "edit" | "split" | "vsplit" | "tabedit") {
            state.current_buffer = state.next_buffer;
            state.next_buffer += 1;
        }
        if command.starts_with("autocmd BufDelete <buffer>") {
            let current = state.current_buffer;
            state.watched.push(current);
        }
        Ok(())
    }

    async fn input(&self, keys: &str) -> Result<i64, RemoteError> {
        self.record(Call::Input(keys.to_string()))?;

        // Enough of insert mode for `i<text><Esc>`
        if let Some(text) = keys
            .strip_prefix('i')
            .and_then(|rest| rest.strip_suffix("<Esc>"))
        {
            let mut state = self.state.lock();
            state.lines[0].push_str(text);
        }
        Ok(keys.len() as i64)
    }

    async fn eval(&self, expr: &str) -> Result<Value, RemoteError> {
        self.record(Call::Eval(expr.to_string()))?;

        let state = self.state.lock();
        if let Some(value) = state.eval_results.get(expr) {
            return Ok(value.clone());
        }
        match expr {
            "getline(1)" => Ok(Value::from(state.lines[0].as_str())),
            _ => Err(RemoteError::Nvim {
                message: format!("Vim:E121: Undefined variable: {}", expr),
            }),
        }
    }

    async fn register_handler(
        &self,
        event: &str,
        handler: NotificationHandler,
    ) -> Result<(), RemoteError> {
        self.record(Call::RegisterHandler(event.to_string()))?;
        self.state.lock().handlers.insert(event.to_string(), handler);
        Ok(())
    }

    fn channel_id(&self) -> i64 {
        self.channel
    }

    async fn current_buffer(&self) -> Result<BufferId, RemoteError> {
        self.record(Call::CurrentBuffer)?;
        Ok(BufferId::new(self.state.lock().current_buffer))
    }

    async fn close(&self) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Close);
        state.closed = true;
        state.handlers.clear();
        Ok(())
    }
}

/// Dialer serving [`FakeEditor`]s by address; anything else is refused
#[derive(Clone, Default)]
pub struct FakeDialer {
    sessions: Arc<Mutex<HashMap<String, FakeEditor>>>,
    errors: Arc<Mutex<HashMap<String, fn() -> DialError>>>,
    dials: Arc<Mutex<Vec<String>>>,
}

impl FakeDialer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `editor` reachable at `address`
    pub fn serve(&self, address: &str, editor: FakeEditor) {
        self.sessions.lock().insert(address.to_string(), editor);
    }

    /// Fail dials to `address` with a custom error
    pub fn fail_with(&self, address: &str, error: fn() -> DialError) {
        self.errors.lock().insert(address.to_string(), error);
    }

    /// Addresses dialed so far
    pub fn dials(&self) -> Vec<String> {
        self.dials.lock().clone()
    }
}

#[async_trait]
impl Dialer for FakeDialer {
    type Session = FakeEditor;

    async fn dial(&self, address: &str) -> Result<FakeEditor, DialError> {
        self.dials.lock().push(address.to_string());

        if let Some(error) = self.errors.lock().get(address) {
            return Err(error());
        }
        match self.sessions.lock().get(address) {
            Some(editor) => Ok(editor.clone()),
            None => Err(DialError::from_io(io::Error::from(
                io::ErrorKind::ConnectionRefused,
            ))),
        }
    }
}

/// Executor that remembers what it would have exec'd
#[derive(Clone, Default)]
pub struct RecordingExec {
    images: Arc<Mutex<Vec<ProcessImage>>>,
}

impl RecordingExec {
    pub fn images(&self) -> Vec<ProcessImage> {
        self.images.lock().clone()
    }
}

impl ProcessExec for RecordingExec {
    fn exec(&self, image: &ProcessImage) -> LaunchOutcome {
        self.images.lock().push(image.clone());
        LaunchOutcome::Replaced
    }
}

/// Launch inputs that never touch the real search path
pub fn test_launch_env() -> LaunchEnv {
    LaunchEnv {
        editor_override: Some(PathBuf::from("/usr/bin/nvim")),
        base_env: vec![("HOME".into(), "/home/tester".into())],
        ..Default::default()
    }
}

/// Controller wired to fakes, plus handles to inspect them
pub fn controller(dialer: FakeDialer) -> (SessionController<FakeDialer, RecordingExec>, RecordingExec) {
    let exec = RecordingExec::default();
    let controller = SessionController::new(dialer, Launcher::with_exec(exec.clone()));
    (controller, exec)
}
