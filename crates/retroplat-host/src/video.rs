//! Video driver callbacks and the display/window records they operate on.

use std::cmp::Ordering;

use bitflags::bitflags;

use crate::events::EventSink;
use crate::pixels::PixelFormat;
use crate::surface::Surface;
use crate::{HostError, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayMode {
    pub format: PixelFormat,
    pub w: i32,
    pub h: i32,
    pub pixel_density: f32,
    /// Hz; zero when unknown.
    pub refresh_rate: f32,
}

impl DisplayMode {
    pub fn new(format: PixelFormat, w: i32, h: i32) -> Self {
        Self {
            format,
            w,
            h,
            pixel_density: 1.0,
            refresh_rate: 0.0,
        }
    }
}

/// The order hosts present modes in: largest first, then deeper formats first.
pub fn display_mode_order(a: &DisplayMode, b: &DisplayMode) -> Ordering {
    b.w.cmp(&a.w)
        .then(b.h.cmp(&a.h))
        .then(b.format.bits_per_pixel().cmp(&a.format.bits_per_pixel()))
}

pub fn sort_display_modes(modes: &mut [DisplayMode]) {
    modes.sort_by(display_mode_order);
}

/// Smallest mode that can hold a `w` x `h` window, preferring deeper formats among equal sizes.
///
/// `modes` must be sorted with [`sort_display_modes`].
pub fn closest_display_mode(modes: &[DisplayMode], w: i32, h: i32) -> Option<&DisplayMode> {
    let mut best: Option<&DisplayMode> = None;
    for mode in modes.iter().filter(|m| m.w >= w && m.h >= h) {
        match best {
            Some(b) if b.w * b.h <= mode.w * mode.h => {}
            _ => best = Some(mode),
        }
    }
    best
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct WindowFlags: u32 {
        const FULLSCREEN = 1 << 0;
        const HIDDEN = 1 << 3;
        const BORDERLESS = 1 << 4;
        const RESIZABLE = 1 << 5;
        const MOUSE_RELATIVE = 1 << 15;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Window {
    pub id: u32,
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    pub flags: WindowFlags,
}

impl Window {
    pub fn new(id: u32, w: i32, h: i32) -> Self {
        Self {
            id,
            x: 0,
            y: 0,
            w,
            h,
            flags: WindowFlags::empty(),
        }
    }
}

/// Layout of a window framebuffer handed to the application.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FramebufferInfo {
    pub format: PixelFormat,
    pub pitch: usize,
}

pub trait VideoDriver {
    fn name(&self) -> &'static str;

    fn video_init(&mut self) -> Result<()>;

    fn video_quit(&mut self);

    /// Desktop mode of the single display.
    fn desktop_mode(&self) -> Option<DisplayMode>;

    fn display_modes(&mut self) -> Result<Vec<DisplayMode>>;

    fn set_display_mode(&mut self, mode: &DisplayMode) -> Result<()>;

    fn create_window(&mut self, window: &mut Window) -> Result<()>;

    fn destroy_window(&mut self, window: &mut Window);

    fn create_window_framebuffer(&mut self, window: &Window) -> Result<FramebufferInfo>;

    /// The surface the application draws into.
    fn window_framebuffer(&mut self, window: &Window) -> Result<&mut Surface>;

    fn update_window_framebuffer(&mut self, window: &Window, rects: &[Rect]) -> Result<()>;

    fn destroy_window_framebuffer(&mut self, window: &Window);

    fn set_window_framebuffer_vsync(&mut self, _window: &Window, _vsync: i32) -> Result<()> {
        Err(HostError::Unsupported("framebuffer vsync"))
    }

    fn window_framebuffer_vsync(&self, _window: &Window) -> Result<i32> {
        Ok(0)
    }

    fn pump_events(&mut self, events: &mut dyn EventSink);
}

/// Registration record for a video driver. See [`crate::AudioBootstrap`] for `C`.
pub struct VideoBootstrap<C> {
    pub name: &'static str,
    pub desc: &'static str,
    pub create: fn(&mut C) -> Result<Box<dyn VideoDriver>>,
}

impl<C> Clone for VideoBootstrap<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for VideoBootstrap<C> {}

impl<C> std::fmt::Debug for VideoBootstrap<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoBootstrap")
            .field("name", &self.name)
            .field("desc", &self.desc)
            .finish()
    }
}
