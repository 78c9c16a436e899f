/// Synchronization bridge - signals, timing samples and wait helpers

pub mod signal;
pub mod timing;
pub(crate) mod bridge;

pub use signal::*;
pub use timing::*;

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Lock a mutex, recovering the guard if a previous holder panicked
///
/// All layer state guarded this way is consistent at every unlock point.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Deadline for a wait of `timeout`; `None` means wait forever
pub(crate) fn deadline_after(timeout: std::time::Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

/// Wait on `cond` until `ready` holds or `deadline` passes
///
/// Returns the guard and whether the deadline expired before `ready` held.
pub(crate) fn wait_until<'a, T, F>(
    cond: &Condvar,
    mut guard: MutexGuard<'a, T>,
    deadline: Option<Instant>,
    mut ready: F,
) -> (MutexGuard<'a, T>, bool)
where
    F: FnMut(&mut T) -> bool,
{
    loop {
        if ready(&mut guard) {
            return (guard, false);
        }
        match deadline {
            None => {
                guard = cond.wait(guard).unwrap_or_else(PoisonError::into_inner);
            }
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return (guard, true);
                }
                guard = cond
                    .wait_timeout(guard, deadline - now)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0;
            }
        }
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
