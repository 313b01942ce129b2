//! DOS VESA video driver with INT 33h mouse and IRQ1 keyboard input.
//!
//! Needs a VBE 2.0 BIOS with linear framebuffer modes of 15 bits per pixel or more. The
//! application draws into a system-RAM surface that is centered on the screen at present time;
//! the mouse cursor is composited in software.

mod driver;
mod error;
pub mod events;
pub mod framebuffer;
pub mod info;
mod isr;
pub mod modes;
pub mod mouse;
pub mod testing;
pub mod video;

pub use driver::init;
pub use error::{Result, VesaError};
pub use events::{KeyEventBuffers, KeyboardDecoder};
pub use info::VesaInfo;
pub use isr::keyboard_irq;
pub use modes::{DisplayModeData, ModeAttributes, VesaMode};
pub use mouse::{Cursor, Mouse};
pub use video::VesaVideo;

pub const DRIVER_NAME: &str = "vesa";
pub const DRIVER_DESC: &str = "DOS VESA Video Driver";
