//! Bookkeeping for the single repeating poll timer.
//!
//! [`Poller`] owns at most one [`PollHandle`]. Every start cancels the current
//! handle before installing a new one, and every start or cancel bumps the
//! epoch. A tick captures the epoch it was armed with and applies its result
//! only while [`Poller::is_current`] still holds, so a fetch that resolves
//! after its timer was cancelled is discarded.
//!
//! The timer loop itself lives in the controller; this module only tracks
//! which loop is the live one.

use std::fmt;

use tokio::task::JoinHandle;
use tracing::debug;

/// What a poll timer fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollMode {
    /// Re-fetch the user's lobby; hand over to [`PollMode::Game`] once the
    /// lobby reports that its game started.
    Lobby,
    /// Re-fetch the user's game status.
    Game,
}

impl fmt::Display for PollMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lobby => f.write_str("lobby"),
            Self::Game => f.write_str("game"),
        }
    }
}

/// The live, cancellable reference to the running poll timer.
///
/// A handle may exist before its task does: game polling installs the handle,
/// performs its first fetch, and only then spawns the timer.
#[derive(Debug)]
pub struct PollHandle {
    mode: PollMode,
    epoch: u64,
    task: Option<JoinHandle<()>>,
    failures: u32,
    degraded: bool,
}

impl PollHandle {
    pub fn mode(&self) -> PollMode {
        self.mode
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Result of recording a tick failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FailureCount {
    pub consecutive: u32,
    /// `true` exactly once, on the failure that reaches the threshold.
    pub degraded_now: bool,
}

/// Owner of the single poll handle.
#[derive(Debug, Default)]
pub struct Poller {
    epoch: u64,
    handle: Option<PollHandle>,
}

impl Poller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mode of the live handle, if any.
    pub fn mode(&self) -> Option<PollMode> {
        self.handle.as_ref().map(PollHandle::mode)
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    /// Returns `true` if a tick armed with `epoch` may still apply its result.
    pub fn is_current(&self, epoch: u64) -> bool {
        self.handle.as_ref().is_some_and(|h| h.epoch == epoch)
    }

    /// Cancel the live handle, aborting its timer task. No-op without one.
    ///
    /// Returns the mode that was cancelled.
    pub fn cancel(&mut self) -> Option<PollMode> {
        self.epoch = self.epoch.wrapping_add(1);
        let handle = self.handle.take()?;
        if let Some(task) = handle.task {
            task.abort();
        }
        debug!(mode = %handle.mode, epoch = handle.epoch, "poll handle cancelled");
        Some(handle.mode)
    }

    /// Cancel any live handle and install a new one for `mode`.
    ///
    /// Returns the new handle's epoch. The timer task is attached afterwards
    /// with [`attach`](Self::attach).
    pub fn begin(&mut self, mode: PollMode) -> u64 {
        self.cancel();
        self.install(mode)
    }

    /// Replace the handle armed with `epoch` by a new one for `mode`, without
    /// aborting the old task.
    ///
    /// Used by a tick that switches modes from inside its own timer task:
    /// the task is detached rather than aborted and simply returns after the
    /// hand-over. Returns `None` if `epoch` is no longer current.
    pub fn hand_over(&mut self, epoch: u64, mode: PollMode) -> Option<u64> {
        if !self.is_current(epoch) {
            return None;
        }
        // Dropping the JoinHandle detaches the calling task.
        let previous = self.handle.take().map(|h| h.mode);
        self.epoch = self.epoch.wrapping_add(1);
        debug!(from = ?previous, to = %mode, "poll handle handed over");
        Some(self.install(mode))
    }

    /// Attach the timer task of the handle armed with `epoch`.
    ///
    /// If that handle was cancelled in the meantime the task is aborted
    /// immediately. Returns `true` if the task was attached.
    pub fn attach(&mut self, epoch: u64, task: JoinHandle<()>) -> bool {
        match self.handle.as_mut() {
            Some(handle) if handle.epoch == epoch => {
                if let Some(old) = handle.task.replace(task) {
                    old.abort();
                }
                true
            }
            _ => {
                task.abort();
                false
            }
        }
    }

    /// Record a failed tick for the handle armed with `epoch`.
    pub(crate) fn record_failure(&mut self, epoch: u64, threshold: u32) -> Option<FailureCount> {
        let handle = self.handle.as_mut().filter(|h| h.epoch == epoch)?;
        handle.failures = handle.failures.saturating_add(1);
        let degraded_now = !handle.degraded && handle.failures >= threshold;
        if degraded_now {
            handle.degraded = true;
        }
        Some(FailureCount {
            consecutive: handle.failures,
            degraded_now,
        })
    }

    /// Record a successful tick. Returns `true` if the handle was degraded.
    pub(crate) fn record_success(&mut self, epoch: u64) -> bool {
        match self.handle.as_mut().filter(|h| h.epoch == epoch) {
            Some(handle) => {
                handle.failures = 0;
                std::mem::replace(&mut handle.degraded, false)
            }
            None => false,
        }
    }

    fn install(&mut self, mode: PollMode) -> u64 {
        self.epoch = self.epoch.wrapping_add(1);
        self.handle = Some(PollHandle {
            mode,
            epoch: self.epoch,
            task: None,
            failures: 0,
            degraded: false,
        });
        debug!(mode = %mode, epoch = self.epoch, "poll handle installed");
        self.epoch
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.cancel();
    }
}
