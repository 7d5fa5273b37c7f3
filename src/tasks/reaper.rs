//! Reaper
//!
//! Background thread that periodically removes expired entries from one
//! cache. Each time-aware cache owns exactly one reaper; it is stopped and
//! joined when the cache is dropped.
//!
//! # States
//! `Idle -> Scheduled -> Running -> Idle`, and `Stopped` once shut down.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};

use crate::error::{CacheError, Result};

// == Reaper State ==
/// Lifecycle of a reaper thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReaperState {
    /// Started but not yet waiting
    Idle = 0,
    /// Waiting for the next sweep
    Scheduled = 1,
    /// Sweeping under the cache lock
    Running = 2,
    /// Shut down; terminal
    Stopped = 3,
}

impl ReaperState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ReaperState::Idle,
            1 => ReaperState::Scheduled,
            2 => ReaperState::Running,
            _ => ReaperState::Stopped,
        }
    }
}

#[derive(Debug)]
struct SharedState(AtomicU8);

impl SharedState {
    fn load(&self) -> ReaperState {
        ReaperState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn store(&self, state: ReaperState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

// == Reaper ==
/// Handle to a running reaper thread.
///
/// Dropping the handle stops the thread and waits for it.
pub struct Reaper {
    period: Duration,
    state: Arc<SharedState>,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl fmt::Debug for Reaper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reaper")
            .field("period", &self.period)
            .field("state", &self.state.load())
            .finish()
    }
}

impl Reaper {
    /// Starts a thread that calls `sweep` every `period`.
    ///
    /// `sweep` returns how many entries it removed. A panic inside it is
    /// logged and the reaper keeps going.
    pub fn spawn<F>(period: Duration, sweep: F) -> Result<Self>
    where
        F: Fn() -> usize + Send + 'static,
    {
        if period.is_zero() {
            return Err(CacheError::InvalidConfiguration(
                "sweep period must be greater than zero".to_string(),
            ));
        }

        let state = Arc::new(SharedState(AtomicU8::new(ReaperState::Idle as u8)));
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let thread_state = Arc::clone(&state);
        let handle = thread::Builder::new()
            .name("cache-reaper".to_string())
            .spawn(move || {
                debug!(period_ms = period.as_millis() as u64, "reaper started");

                loop {
                    thread_state.store(ReaperState::Scheduled);

                    match stop_rx.recv_timeout(period) {
                        Err(RecvTimeoutError::Timeout) => {
                            thread_state.store(ReaperState::Running);
                            match panic::catch_unwind(AssertUnwindSafe(&sweep)) {
                                Ok(0) => {}
                                Ok(removed) => debug!(removed, "reaper removed expired entries"),
                                Err(_) => warn!("reaper sweep panicked; continuing"),
                            }
                            thread_state.store(ReaperState::Idle);
                        }
                        // Stop requested, or the owner went away
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }

                thread_state.store(ReaperState::Stopped);
                debug!("reaper stopped");
            })
            .map_err(|e| CacheError::Internal(format!("failed to spawn reaper thread: {e}")))?;

        info!(period_ms = period.as_millis() as u64, "Started cache reaper");

        Ok(Self {
            period,
            state,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn state(&self) -> ReaperState {
        self.state.load()
    }

    /// Signals the thread and waits for it to exit. A sweep in progress
    /// finishes first. Calling this again is a no-op.
    pub fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            // A send error means the thread already exited
            let _ = stop_tx.send(());
        }

        let Some(handle) = self.handle.take() else {
            return;
        };

        // Joining from the reaper thread itself would deadlock
        if handle.thread().id() == thread::current().id() {
            return;
        }

        if handle.join().is_err() {
            warn!("reaper thread panicked during shutdown");
            self.state.store(ReaperState::Stopped);
        }
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.stop();
    }
}
