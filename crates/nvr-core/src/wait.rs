//! Wait coordinator for `--remote-wait`
//!
//! Every wait registration bumps a mutex-guarded pending count. The remote
//! side reports each deleted buffer through a [`WaitNotifier`], which only
//! pushes onto an unbounded channel so the transport's reader task never
//! blocks. [`WaitCoordinator::drain`] suspends on that channel and
//! decrements the count under the lock for each arrival until it reaches
//! zero.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::WaitError;
use nvr_protocol::BufferId;

/// Payload delivered from the remote side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitSignal {
    /// A watched buffer was deleted
    Released {
        /// Buffer the autocommand fired for, if the notification carried it
        buffer: Option<BufferId>,
    },
    /// The editor is quitting with a nonzero `v:exiting`
    Exited {
        /// Exit status the editor is leaving with
        code: i64,
    },
}

/// How a drain ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every registered wait resolved
    Released,
    /// The editor quit with this status before all buffers were deleted
    EditorExited(i64),
    /// The transport dropped every notifier; the editor is gone
    Disconnected,
}

/// Sending half handed to notification handlers
#[derive(Debug, Clone)]
pub struct WaitNotifier {
    tx: mpsc::UnboundedSender<WaitSignal>,
}

impl WaitNotifier {
    /// Deliver a signal. Never blocks; signals after the drain finished are dropped.
    pub fn notify(&self, signal: WaitSignal) {
        if self.tx.send(signal).is_err() {
            tracing::trace!("Wait notification arrived after drain completed");
        }
    }
}

/// Tracks outstanding waits for one session run
#[derive(Debug)]
pub struct WaitCoordinator {
    pending: Mutex<usize>,
    tx: mpsc::UnboundedSender<WaitSignal>,
    rx: mpsc::UnboundedReceiver<WaitSignal>,
}

impl Default for WaitCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitCoordinator {
    /// Create a coordinator with nothing pending
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            pending: Mutex::new(0),
            tx,
            rx,
        }
    }

    /// A notifier feeding this coordinator
    pub fn notifier(&self) -> WaitNotifier {
        WaitNotifier {
            tx: self.tx.clone(),
        }
    }

    /// Record one more outstanding wait; returns the new count
    pub fn increment(&self) -> usize {
        let mut pending = self.pending.lock();
        *pending += 1;
        *pending
    }

    /// Number of registered waits not yet resolved
    pub fn pending(&self) -> usize {
        *self.pending.lock()
    }

    /// Block until the pending count reaches zero.
    ///
    /// Returns at once when nothing is pending. Otherwise suspends on the
    /// notification channel; each `Released` decrements and rechecks under
    /// the lock. `cancel` aborts with [`WaitError::Interrupted`] and
    /// `timeout` with [`WaitError::TimedOut`].
    pub async fn drain(
        self,
        cancel: &CancellationToken,
        timeout: Option<Duration>,
    ) -> Result<DrainOutcome, WaitError> {
        let Self {
            pending,
            tx,
            mut rx,
        } = self;
        // Only the transport's handlers keep the channel open from here on
        drop(tx);

        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            let remaining = *pending.lock();
            if remaining == 0 {
                return Ok(DrainOutcome::Released);
            }

            tokio::select! {
                signal = rx.recv() => match signal {
                    Some(WaitSignal::Released { buffer }) => {
                        let mut count = pending.lock();
                        if *count == 0 {
                            tracing::warn!(?buffer, "Ignoring buffer release with nothing pending");
                            continue;
                        }
                        *count -= 1;
                        tracing::debug!(?buffer, pending = *count, "Watched buffer deleted");
                    }
                    Some(WaitSignal::Exited { code }) => {
                        tracing::info!(code, pending = remaining, "Editor exited while waiting");
                        return Ok(DrainOutcome::EditorExited(code));
                    }
                    None => {
                        tracing::info!(pending = remaining, "Session closed while waiting");
                        return Ok(DrainOutcome::Disconnected);
                    }
                },
                _ = cancel.cancelled() => {
                    return Err(WaitError::Interrupted { pending: remaining });
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    return Err(WaitError::TimedOut {
                        timeout: timeout.unwrap_or_default(),
                        pending: remaining,
                    });
                }
            }
        }
    }
}
