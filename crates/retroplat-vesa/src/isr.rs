//! Keyboard interrupt trampoline.

use std::cell::Cell;
use std::ptr;

use crate::VesaVideo;

thread_local! {
    static ACTIVE: Cell<*mut VesaVideo> = const { Cell::new(ptr::null_mut()) };
}

pub(crate) fn set_active(video: &mut VesaVideo) {
    ACTIVE.with(|active| active.set(video));
}

pub(crate) fn clear_active(video: &mut VesaVideo) {
    let video: *mut VesaVideo = video;
    ACTIVE.with(|active| {
        if active.get() == video {
            active.set(ptr::null_mut());
        }
    });
}

/// Handler installed on IRQ1 by default.
pub extern "C" fn keyboard_irq() {
    let video = ACTIVE.with(Cell::get);
    if video.is_null() {
        return;
    }
    // SAFETY: registered between `video_init` and `video_quit`, during which the driver must
    // stay put. The handler only appends to the buffer the pump is not reading.
    unsafe { (*video).handle_keyboard_irq() }
}
