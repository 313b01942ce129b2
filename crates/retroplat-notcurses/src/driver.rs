use retroplat_host::{
    DisplayMode, EventSink, FramebufferInfo, Rect, Surface, VideoDriver, Window,
};
use tracing::debug;

use crate::{NotcursesVideo, DRIVER_NAME};

impl VideoDriver for NotcursesVideo {
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn video_init(&mut self) -> retroplat_host::Result<()> {
        Ok(self.init()?)
    }

    fn video_quit(&mut self) {
        self.quit();
    }

    fn desktop_mode(&self) -> Option<DisplayMode> {
        Some(NotcursesVideo::desktop_mode(self))
    }

    fn display_modes(&mut self) -> retroplat_host::Result<Vec<DisplayMode>> {
        Ok(NotcursesVideo::display_modes(self))
    }

    fn set_display_mode(&mut self, mode: &DisplayMode) -> retroplat_host::Result<()> {
        NotcursesVideo::set_display_mode(self, mode);
        Ok(())
    }

    fn create_window(&mut self, window: &mut Window) -> retroplat_host::Result<()> {
        NotcursesVideo::create_window(self, window);
        Ok(())
    }

    fn destroy_window(&mut self, window: &mut Window) {
        NotcursesVideo::destroy_window(self, window);
    }

    fn create_window_framebuffer(
        &mut self,
        window: &Window,
    ) -> retroplat_host::Result<FramebufferInfo> {
        Ok(self.create_framebuffer(window)?)
    }

    fn window_framebuffer(&mut self, window: &Window) -> retroplat_host::Result<&mut Surface> {
        Ok(self.framebuffer_surface(window)?)
    }

    /// The whole surface is scaled onto the terminal whatever `rects` says.
    fn update_window_framebuffer(
        &mut self,
        window: &Window,
        _rects: &[Rect],
    ) -> retroplat_host::Result<()> {
        Ok(self.update(window)?)
    }

    fn destroy_window_framebuffer(&mut self, window: &Window) {
        self.destroy_framebuffer(window);
    }

    fn pump_events(&mut self, events: &mut dyn EventSink) {
        self.pump(events);
    }
}

/// Load the system notcurses library, start it on stdout and box the driver for the host.
#[cfg(feature = "dynamic")]
pub fn init() -> retroplat_host::Result<Box<dyn VideoDriver>> {
    let video = NotcursesVideo::open_shared().inspect_err(|err| {
        debug!(%err, "notcurses unavailable");
    })?;
    Ok(Box::new(video))
}

/// Built without runtime loading: the backend is never available.
#[cfg(not(feature = "dynamic"))]
pub fn init() -> retroplat_host::Result<Box<dyn VideoDriver>> {
    debug!("notcurses support not built");
    Err(crate::NotcursesError::NotBuilt.into())
}
