/// Gate admitting at most one update attempt at a time
use core::sync::atomic::{AtomicBool, Ordering};

/// Non-blocking binary gate. Acquisition either succeeds immediately or
/// reports that an attempt is already running; it never waits.
#[derive(Debug, Default)]
pub struct UpdateLock {
    held: AtomicBool,
}

impl UpdateLock {
    pub const fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
        }
    }

    pub fn try_acquire(&self) -> Option<UpdateGuard<'_>> {
        self.held
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| UpdateGuard { lock: self })
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    fn release(&self) {
        self.held.store(false, Ordering::Release);
    }
}

/// Releases the lock when dropped.
#[must_use = "the update lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct UpdateGuard<'a> {
    lock: &'a UpdateLock,
}

impl UpdateGuard<'_> {
    /// Keep the lock held for the rest of the process. Only for the path
    /// that ends in a restart.
    pub fn hold_until_restart(self) {
        core::mem::forget(self);
    }
}

impl Drop for UpdateGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}
