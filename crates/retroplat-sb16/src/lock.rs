//! Keeps the IRQ handler away from the mixer while mainline code changes stream state.
//!
//! The counter only changes with interrupts disabled. While it is nonzero the IRQ handler does
//! not mix; it records that it wanted to, and the final unlock runs that iteration instead.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use retroplat_dos::{without_interrupts, InterruptFlag};
use tracing::trace;

#[derive(Debug, Default)]
pub struct AudioLock {
    depth: AtomicU32,
    deferred: AtomicBool,
}

impl AudioLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self, cpu: &dyn InterruptFlag) {
        without_interrupts(cpu, || {
            self.depth.fetch_add(1, Ordering::SeqCst);
        });
    }

    /// Drop one level. Unlocking an unlocked stream does nothing. When the last level goes away
    /// and the IRQ handler skipped an iteration meanwhile, `catch_up` runs once, still with
    /// interrupts disabled.
    pub fn unlock(&self, cpu: &dyn InterruptFlag, catch_up: impl FnOnce()) {
        without_interrupts(cpu, || {
            let depth = self.depth.load(Ordering::SeqCst);
            if depth == 0 {
                trace!("unlock of an unlocked audio stream");
                return;
            }
            self.depth.store(depth - 1, Ordering::SeqCst);
            if depth == 1 && self.deferred.swap(false, Ordering::SeqCst) {
                catch_up();
            }
        });
    }

    pub fn depth(&self) -> u32 {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn is_locked(&self) -> bool {
        self.depth() != 0
    }

    /// Called from the IRQ handler. Returns `true`, and remembers the missed iteration, when the
    /// stream is locked.
    pub fn defer_if_locked(&self) -> bool {
        if self.is_locked() {
            self.deferred.store(true, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred.load(Ordering::SeqCst)
    }

    pub fn clear_deferred(&self) {
        self.deferred.store(false, Ordering::SeqCst);
    }
}
