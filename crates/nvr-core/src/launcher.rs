//! Process launcher
//!
//! When no session can be attached, nvr turns into the editor: it resolves
//! the `nvim` binary, exports the requested listen address so later
//! invocations can find the new instance, and replaces the current process
//! image. On success nothing after [`Launcher::launch`] runs in production;
//! the [`ProcessExec`] seam lets tests observe the would-be image instead.

use std::ffi::OsString;
use std::path::PathBuf;

use crate::config::{LaunchEnv, SessionConfig};
use crate::error::LaunchError;

/// Binary looked up on the search path when no override is configured
pub const EDITOR_BINARY: &str = "nvim";

/// Environment variable carrying the listen address into the editor
pub const LISTEN_ADDRESS_VAR: &str = "NVIM_LISTEN_ADDRESS";

/// Everything needed to replace the current process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessImage {
    /// Resolved editor binary
    pub binary: PathBuf,
    /// Full argument vector; `argv[0]` is the binary path
    pub argv: Vec<OsString>,
    /// Complete environment for the new image
    pub env: Vec<(OsString, OsString)>,
}

/// Result of a launch attempt
#[derive(Debug)]
pub enum LaunchOutcome {
    /// The process image was replaced. Only observable through a test executor.
    Replaced,
    /// Resolution or exec failed; the caller still exists
    Failed(LaunchError),
}

/// Performs the actual process replacement
pub trait ProcessExec: Send + Sync {
    /// Replace the current process with `image`
    fn exec(&self, image: &ProcessImage) -> LaunchOutcome;
}

/// Replaces the process image with `execve(2)`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExec;

impl ProcessExec for SystemExec {
    #[cfg(unix)]
    fn exec(&self, image: &ProcessImage) -> LaunchOutcome {
        use std::os::unix::process::CommandExt;

        let mut cmd = std::process::Command::new(&image.binary);
        if let Some((arg0, rest)) = image.argv.split_first() {
            cmd.arg0(arg0).args(rest);
        }
        cmd.env_clear()
            .envs(image.env.iter().map(|(key, value)| (key, value)));

        // Only returns on failure
        let source = cmd.exec();
        LaunchOutcome::Failed(LaunchError::Exec {
            binary: image.binary.clone(),
            source,
        })
    }

    #[cfg(not(unix))]
    fn exec(&self, _image: &ProcessImage) -> LaunchOutcome {
        LaunchOutcome::Failed(LaunchError::Unsupported)
    }
}

/// Builds the editor process image and hands it to a [`ProcessExec`]
#[derive(Debug, Default, Clone)]
pub struct Launcher<E = SystemExec> {
    exec: E,
}

impl Launcher<SystemExec> {
    /// Launcher that really replaces the process
    pub fn system() -> Self {
        Self { exec: SystemExec }
    }
}

impl<E: ProcessExec> Launcher<E> {
    /// Launcher with a custom executor
    pub fn with_exec(exec: E) -> Self {
        Self { exec }
    }

    /// Access the executor
    pub fn exec(&self) -> &E {
        &self.exec
    }

    /// Resolve the binary and environment for `config`
    pub fn prepare(&self, config: &SessionConfig) -> Result<ProcessImage, LaunchError> {
        let binary = resolve_binary(&config.launch)?;

        let mut argv = Vec::with_capacity(config.resources.len() + 1);
        argv.push(binary.clone().into_os_string());
        argv.extend(config.resources.iter().map(OsString::from));

        Ok(ProcessImage {
            binary,
            argv,
            env: child_env(&config.launch, &config.address),
        })
    }

    /// Replace the current process with a new editor.
    ///
    /// Returns only on failure, or with [`LaunchOutcome::Replaced`] when the
    /// executor is a test double.
    pub fn launch(&self, config: &SessionConfig) -> LaunchOutcome {
        let image = match self.prepare(config) {
            Ok(image) => image,
            Err(e) => return LaunchOutcome::Failed(e),
        };

        tracing::info!(
            binary = %image.binary.display(),
            files = config.resources.len(),
            "Starting new nvim process"
        );
        self.exec.exec(&image)
    }
}

/// Explicit override first, then a search of the executable path
fn resolve_binary(launch: &LaunchEnv) -> Result<PathBuf, LaunchError> {
    if let Some(path) = &launch.editor_override {
        return Ok(path.clone());
    }

    let cwd = launch.cwd.clone().unwrap_or_else(|| PathBuf::from("."));
    which::which_in(EDITOR_BINARY, launch.search_path.as_ref(), cwd).map_err(|source| {
        LaunchError::BinaryNotFound {
            name: EDITOR_BINARY.to_string(),
            source,
        }
    })
}

/// Inherited environment plus the listen address binding
fn child_env(launch: &LaunchEnv, address: &str) -> Vec<(OsString, OsString)> {
    if address.is_empty() {
        return launch.base_env.clone();
    }

    let mut env: Vec<(OsString, OsString)> = launch
        .base_env
        .iter()
        .filter(|(key, _)| key != LISTEN_ADDRESS_VAR)
        .cloned()
        .collect();
    env.push((LISTEN_ADDRESS_VAR.into(), address.into()));
    env
}
