//! Host callback contract shared by every retroplat backend.
//!
//! The multimedia host owns windows, audio streams and the event queue; a backend only fills in
//! the driver callbacks defined here. Pixel formats and software surfaces live here too because
//! both video backends convert between them.

pub mod audio;
pub mod error;
pub mod events;
pub mod pixels;
pub mod surface;
pub mod video;

pub use audio::{
    default_sample_frames, AudioBootstrap, AudioDriver, AudioFormat, AudioSpec, DeviceFormat,
    Mixer,
};
pub use error::{HostError, Result};
pub use events::{Event, EventSink, KeyMod, Keycode, MouseButton, MouseButtons, Scancode};
pub use pixels::PixelFormat;
pub use surface::{PixelsMut, Surface};
pub use video::{
    closest_display_mode, display_mode_order, sort_display_modes, DisplayMode, FramebufferInfo,
    Rect, VideoBootstrap, VideoDriver, Window, WindowFlags,
};
