//! Command sequencer
//!
//! Opens each resource in order and, in wait mode, registers the buffer
//! deletion hook for it right after the open.

use std::sync::Arc;

use crate::config::OpenMode;
use crate::error::NvrError;
use crate::traits::{NotificationHandler, RemoteSession};
use crate::wait::{WaitCoordinator, WaitNotifier, WaitSignal};
use nvr_protocol::{BufferId, Value};

/// Notification sent when a watched buffer is deleted
pub const BUF_DELETE_EVENT: &str = "BufDelete";

/// Notification sent when the editor quits with a nonzero status
pub const EXIT_EVENT: &str = "Exit";

/// Autocommand group holding every hook nvr installs
pub const AUGROUP: &str = "nvr";

/// Open `resources` in order with the `mode` verb.
///
/// When `waits` is given, each resource gets a wait registration issued
/// immediately after its open. The first failing remote call aborts the
/// sequence; commands already issued are not rolled back.
pub async fn open_resources<S>(
    session: &S,
    resources: &[String],
    mode: OpenMode,
    waits: Option<&WaitCoordinator>,
) -> Result<(), NvrError>
where
    S: RemoteSession + ?Sized,
{
    for (index, resource) in resources.iter().enumerate() {
        let command = format!("{} {}", mode.command(), fnameescape(resource));
        tracing::debug!(%resource, "Opening");
        session
            .command(&command)
            .await
            .map_err(|e| NvrError::remote(format!("open {}", resource), e))?;

        if let Some(waits) = waits {
            register_wait(session, waits, index == 0).await?;
        }
    }
    Ok(())
}

/// Hook the current buffer's deletion up to `waits`
async fn register_wait<S>(
    session: &S,
    waits: &WaitCoordinator,
    first: bool,
) -> Result<(), NvrError>
where
    S: RemoteSession + ?Sized,
{
    let buffer = session
        .current_buffer()
        .await
        .map_err(|e| NvrError::remote("nvim_get_current_buf", e))?;
    let pending = waits.increment();
    tracing::debug!(%buffer, pending, "Registered wait");

    let notifier = waits.notifier();
    session
        .register_handler(BUF_DELETE_EVENT, release_handler(notifier.clone()))
        .await
        .map_err(|e| NvrError::remote("register BufDelete handler", e))?;

    let channel = session.channel_id();
    run(session, &format!("augroup {}", AUGROUP)).await?;
    run(
        session,
        &format!(
            "autocmd BufDelete <buffer> silent! call rpcnotify({}, \"{}\", {})",
            channel,
            BUF_DELETE_EVENT,
            buffer.as_i64()
        ),
    )
    .await?;

    if first {
        session
            .register_handler(EXIT_EVENT, exit_handler(notifier))
            .await
            .map_err(|e| NvrError::remote("register Exit handler", e))?;
        run(
            session,
            &format!(
                "autocmd VimLeave * if exists(\"v:exiting\") && v:exiting > 0 | silent! call rpcnotify({}, \"{}\", v:exiting) | endif",
                channel, EXIT_EVENT
            ),
        )
        .await?;
    }

    run(session, "augroup END").await
}

async fn run<S>(session: &S, command: &str) -> Result<(), NvrError>
where
    S: RemoteSession + ?Sized,
{
    session
        .command(command)
        .await
        .map_err(|e| NvrError::remote(command, e))
}

fn release_handler(notifier: WaitNotifier) -> NotificationHandler {
    Arc::new(move |args: Vec<Value>| {
        let buffer = args.first().and_then(BufferId::from_value);
        notifier.notify(WaitSignal::Released { buffer });
    })
}

fn exit_handler(notifier: WaitNotifier) -> NotificationHandler {
    Arc::new(move |args: Vec<Value>| {
        let code = args.first().and_then(Value::as_i64).unwrap_or(1);
        notifier.notify(WaitSignal::Exited { code });
    })
}

/// Escape a path for use as an Ex command argument, like Vim's `fnameescape()`
pub fn fnameescape(path: &str) -> String {
    const SPECIAL: &[char] = &[
        ' ', '\t', '\\', '%', '#', '|', '"', '\'', '*', '?', '[', '{', '$', '`', '<', '!',
    ];

    let mut escaped = String::with_capacity(path.len() + 4);
    for (i, c) in path.chars().enumerate() {
        if SPECIAL.contains(&c) || (i == 0 && (c == '-' || c == '+')) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
