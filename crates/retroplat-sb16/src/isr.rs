//! Interrupt trampoline.
//!
//! The DPMI host calls a plain `extern "C" fn()` with no arguments, so the device that should
//! service the interrupt is registered here while it is open.

use std::cell::Cell;
use std::ptr;

use crate::SoundBlaster;

thread_local! {
    static ACTIVE: Cell<*mut SoundBlaster> = const { Cell::new(ptr::null_mut()) };
}

pub(crate) fn set_active(sb: &mut SoundBlaster) {
    ACTIVE.with(|active| active.set(sb));
}

/// Forget `sb` if it is the registered device.
pub(crate) fn clear_active(sb: &mut SoundBlaster) {
    let sb: *mut SoundBlaster = sb;
    ACTIVE.with(|active| {
        if active.get() == sb {
            active.set(ptr::null_mut());
        }
    });
}

/// Handler installed on the card's IRQ by default.
pub extern "C" fn sound_blaster_irq() {
    let sb = ACTIVE.with(Cell::get);
    if sb.is_null() {
        return;
    }
    // SAFETY: the pointer is registered while the device is open and cleared before the
    // `SoundBlaster` is moved or dropped (it must not be moved while open). Mainline code only
    // touches the stream state the handler uses between `lock` and `unlock`.
    unsafe { (*sb).handle_irq() }
}
