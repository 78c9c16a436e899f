/// Completion signals exchanged between the application and the layer

use std::sync::{Condvar, Mutex};
use std::time::Duration;
use crate::error::{Error, Result};
use crate::sync::{deadline_after, lock, wait_until};

/// A completion signal
///
/// Stands for whatever GPU-side primitive the driver exposes (semaphore,
/// fence, sync file). The layer waits on the signals an application passes
/// to `queue_present` and signals the ones it passes to `acquire_next_image`
/// or as present fences.
pub trait Signal: Send + Sync {
    /// Block until signaled or until `timeout` elapses
    ///
    /// `Duration::MAX` waits forever. Returns `Error::Timeout` when the wait
    /// expires and `Error::DeviceLost` when the signal can never fire.
    fn wait(&self, timeout: Duration) -> Result<()>;

    /// Signal, waking every waiter
    fn signal(&self) -> Result<()>;

    /// Whether the signal has fired
    fn is_signaled(&self) -> bool;
}

#[derive(Debug, Default)]
struct SignalState {
    signaled: bool,
    lost: bool,
}

/// Host-side signal built on a mutex and condition variable
///
/// Behaves like a fence: once signaled it stays signaled until `reset`.
#[derive(Debug, Default)]
pub struct HostSignal {
    state: Mutex<SignalState>,
    cond: Condvar,
}

impl HostSignal {
    /// Create an unsignaled signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an already signaled signal
    pub fn signaled() -> Self {
        Self {
            state: Mutex::new(SignalState { signaled: true, lost: false }),
            cond: Condvar::new(),
        }
    }

    /// Return to the unsignaled state
    pub fn reset(&self) {
        lock(&self.state).signaled = false;
    }

    /// Mark the signal as unreachable (device lost); waiters fail immediately
    pub fn mark_lost(&self) {
        lock(&self.state).lost = true;
        self.cond.notify_all();
    }
}

impl Signal for HostSignal {
    fn wait(&self, timeout: Duration) -> Result<()> {
        let deadline = deadline_after(timeout);
        let guard = lock(&self.state);
        let (guard, timed_out) = wait_until(&self.cond, guard, deadline, |s| s.signaled || s.lost);

        if guard.lost {
            return Err(Error::DeviceLost);
        }
        if timed_out {
            return Err(Error::Timeout);
        }
        Ok(())
    }

    fn signal(&self) -> Result<()> {
        let mut state = lock(&self.state);
        if state.lost {
            return Err(Error::DeviceLost);
        }
        state.signaled = true;
        self.cond.notify_all();
        Ok(())
    }

    fn is_signaled(&self) -> bool {
        lock(&self.state).signaled
    }
}
