//! Process environment captured once at startup
//!
//! The core never reads ambient state; everything it needs from the
//! environment is read here and passed down explicitly.

use std::ffi::OsString;
use std::path::PathBuf;

use nvr_core::config::resolve_editor;
use nvr_core::launcher::LISTEN_ADDRESS_VAR;
use nvr_core::LaunchEnv;

/// Environment variable naming an explicit editor binary
pub const EDITOR_VAR: &str = "NVIM_CMD";

/// Snapshot of the environment relevant to a run
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    /// `NVIM_LISTEN_ADDRESS`
    pub listen_address: Option<String>,
    /// `NVIM_CMD`
    pub editor: Option<String>,
    /// `PATH`
    pub path: Option<OsString>,
    /// Working directory
    pub cwd: Option<PathBuf>,
    /// Every variable, inherited by a launched editor
    pub vars: Vec<(OsString, OsString)>,
}

impl EnvSnapshot {
    /// Read the current process environment
    pub fn capture() -> Self {
        Self {
            listen_address: std::env::var(LISTEN_ADDRESS_VAR).ok(),
            editor: std::env::var(EDITOR_VAR).ok(),
            path: std::env::var_os("PATH"),
            cwd: std::env::current_dir().ok(),
            vars: std::env::vars_os().collect(),
        }
    }

    /// Launch inputs; `NVIM_CMD` beats the config file's `editor`
    pub fn launch_env(&self, file_editor: Option<&PathBuf>) -> LaunchEnv {
        LaunchEnv {
            editor_override: resolve_editor(self.editor.as_deref(), file_editor),
            search_path: self.path.clone(),
            cwd: self.cwd.clone(),
            base_env: self.vars.clone(),
        }
    }
}
