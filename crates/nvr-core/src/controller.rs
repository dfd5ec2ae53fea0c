//! Session controller
//!
//! Runs one invocation end to end: attach or launch, pre-hook, open the
//! resources, send keys, evaluate, post-hook and finally wait for the
//! watched buffers. The transport is closed on every path that attached.

use std::io::Write;

use nvr_protocol::Value;
use tokio_util::sync::CancellationToken;

use crate::config::{AfterExpr, SessionConfig};
use crate::error::NvrError;
use crate::launcher::{LaunchOutcome, Launcher, ProcessExec, SystemExec};
use crate::sequencer;
use crate::traits::{Dialer, RemoteSession};
use crate::wait::{DrainOutcome, WaitCoordinator};

/// Result of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The process was handed over to a new editor
    Replaced,
    /// Attached, did the work, detached
    Finished {
        /// Text written for `--remote-expr`, if any (lossy when not UTF-8)
        output: Option<String>,
        /// Exit status of an editor that quit while we were waiting
        editor_exit: Option<i64>,
    },
}

/// Drives a session through a [`Dialer`] and a [`Launcher`]
pub struct SessionController<D, E = SystemExec> {
    dialer: D,
    launcher: Launcher<E>,
}

impl<D, E> SessionController<D, E>
where
    D: Dialer,
    E: ProcessExec,
{
    /// Create a controller
    pub fn new(dialer: D, launcher: Launcher<E>) -> Self {
        Self { dialer, launcher }
    }

    /// Run one invocation.
    ///
    /// `--remote-expr` output is written to `out` verbatim and flushed.
    /// `cancel` only affects the wait phase.
    pub async fn run<W: Write>(
        &self,
        config: &SessionConfig,
        out: &mut W,
        cancel: &CancellationToken,
    ) -> Result<SessionOutcome, NvrError> {
        if config.address.is_empty() {
            if config.no_start {
                return Err(NvrError::NoAddress);
            }
            tracing::debug!("No address configured");
            return self.launch(config);
        }

        let session = match self.dialer.dial(&config.address).await {
            Ok(session) => session,
            Err(e) if e.is_reachability() => {
                if config.no_start {
                    return Err(NvrError::NoSession {
                        address: config.address.clone(),
                        source: e,
                    });
                }
                tracing::info!(address = %config.address, error = %e, "No session listening");
                return self.launch(config);
            }
            Err(e) => {
                return Err(NvrError::Dial {
                    address: config.address.clone(),
                    source: e,
                })
            }
        };

        tracing::debug!(
            address = %config.address,
            channel = session.channel_id(),
            "Attached"
        );
        let result = drive(&session, config, out, cancel).await;

        if let Err(e) = session.close().await {
            tracing::debug!(error = %e, "Ignoring error while closing session");
        }
        result
    }

    fn launch(&self, config: &SessionConfig) -> Result<SessionOutcome, NvrError> {
        match self.launcher.launch(config) {
            LaunchOutcome::Replaced => Ok(SessionOutcome::Replaced),
            LaunchOutcome::Failed(e) => Err(e.into()),
        }
    }
}

async fn drive<S, W>(
    session: &S,
    config: &SessionConfig,
    out: &mut W,
    cancel: &CancellationToken,
) -> Result<SessionOutcome, NvrError>
where
    S: RemoteSession + ?Sized,
    W: Write,
{
    let waits = config.wait.then(WaitCoordinator::new);

    if let Some(command) = &config.before {
        session
            .command(command)
            .await
            .map_err(|e| NvrError::remote("pre-hook", e))?;
    }

    sequencer::open_resources(session, &config.resources, config.open_mode, waits.as_ref())
        .await?;

    if let Some(keys) = &config.send {
        let written = session
            .input(keys)
            .await
            .map_err(|e| NvrError::remote("nvim_input", e))?;
        tracing::debug!(written, "Sent keys");
    }

    let mut output = None;
    if let Some(expr) = &config.expr {
        let bytes = evaluate(session, expr).await?;
        out.write_all(&bytes)
            .and_then(|()| out.flush())
            .map_err(NvrError::Output)?;
        output = Some(String::from_utf8_lossy(&bytes).into_owned());

        if config.after_expr == AfterExpr::Return {
            return Ok(SessionOutcome::Finished {
                output,
                editor_exit: None,
            });
        }
    }

    if let Some(command) = &config.after {
        session
            .command(command)
            .await
            .map_err(|e| NvrError::remote("post-hook", e))?;
    }

    let mut editor_exit = None;
    if let Some(waits) = waits {
        let pending = waits.pending();
        if pending > 0 {
            tracing::info!(pending, "Waiting for buffers to be deleted");
            match waits.drain(cancel, config.wait_timeout).await? {
                DrainOutcome::Released => tracing::debug!("All watched buffers deleted"),
                DrainOutcome::EditorExited(code) => editor_exit = Some(code),
                DrainOutcome::Disconnected => {
                    tracing::debug!("Editor went away before every buffer was deleted")
                }
            }
        }
    }

    Ok(SessionOutcome::Finished {
        output,
        editor_exit,
    })
}

/// Raw bytes of a string result; Neovim strings need not be UTF-8
async fn evaluate<S>(session: &S, expr: &str) -> Result<Vec<u8>, NvrError>
where
    S: RemoteSession + ?Sized,
{
    let value = session
        .eval(expr)
        .await
        .map_err(|e| NvrError::remote("nvim_eval", e))?;

    match value {
        Value::String(text) => Ok(text.into_bytes()),
        other => Err(NvrError::UnexpectedEvalResult(other)),
    }
}
