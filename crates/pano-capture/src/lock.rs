//! Single in-flight capture lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag allowing at most one capture acquisition at a time.
///
/// Clones share the same flag, so one lock can gate several sessions.
#[derive(Debug, Clone, Default)]
pub struct CaptureLock {
    busy: Arc<AtomicBool>,
}

impl CaptureLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock, or `None` if a capture is already in flight.
    pub fn try_acquire(&self) -> Option<CaptureGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CaptureGuard {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_held(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the lock when dropped, on every exit path.
#[derive(Debug)]
pub struct CaptureGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
