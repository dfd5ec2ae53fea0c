//! Per-invocation session configuration

use serde::Deserialize;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

/// Ex command used to open each resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenMode {
    /// `:edit` in the current window
    #[default]
    Edit,
    /// `:split`
    Split,
    /// `:vsplit`
    VSplit,
    /// `:tabedit`
    Tab,
}

impl OpenMode {
    /// The Ex command verb for this mode
    pub fn command(&self) -> &'static str {
        match self {
            OpenMode::Edit => "edit",
            OpenMode::Split => "split",
            OpenMode::VSplit => "vsplit",
            OpenMode::Tab => "tabedit",
        }
    }
}

/// What happens after `--remote-expr` printed its result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AfterExpr {
    /// Stop: skip the post-hook and any wait
    #[default]
    Return,
    /// Carry on with the post-hook and the wait phase
    Continue,
}

/// Environment the launcher needs, captured once by the caller
#[derive(Debug, Clone, Default)]
pub struct LaunchEnv {
    /// Explicit editor binary (`NVIM_CMD` or the config file)
    pub editor_override: Option<PathBuf>,
    /// Executable search path (`PATH`)
    pub search_path: Option<OsString>,
    /// Directory relative lookups resolve against
    pub cwd: Option<PathBuf>,
    /// Environment inherited by the launched editor
    pub base_env: Vec<(OsString, OsString)>,
}

/// Immutable input to one session run
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// RPC address; empty means no running session is expected
    pub address: String,
    /// Never launch a new editor
    pub no_start: bool,
    /// Files to open, in order
    pub resources: Vec<String>,
    /// Keys to send after opening
    pub send: Option<String>,
    /// Expression to evaluate and print
    pub expr: Option<String>,
    /// Command run before everything else
    pub before: Option<String>,
    /// Command run after everything else
    pub after: Option<String>,
    /// Block until every opened buffer is deleted
    pub wait: bool,
    /// How resources are opened
    pub open_mode: OpenMode,
    /// Behavior after a successful `expr`
    pub after_expr: AfterExpr,
    /// Give up waiting after this long
    pub wait_timeout: Option<Duration>,
    /// Launcher inputs
    pub launch: LaunchEnv,
}

impl SessionConfig {
    /// Start building a configuration for `address`
    pub fn builder(address: impl Into<String>) -> SessionConfigBuilder {
        SessionConfigBuilder {
            config: SessionConfig {
                address: address.into(),
                no_start: false,
                resources: Vec::new(),
                send: None,
                expr: None,
                before: None,
                after: None,
                wait: false,
                open_mode: OpenMode::default(),
                after_expr: AfterExpr::default(),
                wait_timeout: None,
                launch: LaunchEnv::default(),
            },
        }
    }
}

/// Builder for [`SessionConfig`]; empty strings are treated as "not set"
#[derive(Debug, Clone)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    pub fn no_start(mut self, no_start: bool) -> Self {
        self.config.no_start = no_start;
        self
    }

    pub fn resources<I, S>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.resources = resources.into_iter().map(Into::into).collect();
        self
    }

    pub fn send(mut self, keys: impl Into<String>) -> Self {
        self.config.send = non_empty(keys.into());
        self
    }

    pub fn expr(mut self, expr: impl Into<String>) -> Self {
        self.config.expr = non_empty(expr.into());
        self
    }

    pub fn before(mut self, command: impl Into<String>) -> Self {
        self.config.before = non_empty(command.into());
        self
    }

    pub fn after(mut self, command: impl Into<String>) -> Self {
        self.config.after = non_empty(command.into());
        self
    }

    pub fn wait(mut self, wait: bool) -> Self {
        self.config.wait = wait;
        self
    }

    pub fn open_mode(mut self, mode: OpenMode) -> Self {
        self.config.open_mode = mode;
        self
    }

    pub fn after_expr(mut self, policy: AfterExpr) -> Self {
        self.config.after_expr = policy;
        self
    }

    pub fn wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.wait_timeout = timeout;
        self
    }

    pub fn launch(mut self, launch: LaunchEnv) -> Self {
        self.config.launch = launch;
        self
    }

    pub fn build(self) -> SessionConfig {
        self.config
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Pick the session address: explicit flag, then environment, then config file
pub fn resolve_address(flag: Option<&str>, env: Option<&str>, file: Option<&str>) -> String {
    [flag, env, file]
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Pick the editor override: environment first, then config file
pub fn resolve_editor(env: Option<&str>, file: Option<&PathBuf>) -> Option<PathBuf> {
    match env {
        Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
        _ => file.cloned(),
    }
}
