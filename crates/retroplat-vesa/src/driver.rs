use retroplat_host::{
    DisplayMode, EventSink, FramebufferInfo, Rect, Surface, VideoDriver, Window,
};
use tracing::debug;

use crate::video::DESKTOP_MODE;
use crate::{VesaError, VesaVideo, DRIVER_NAME};

impl VideoDriver for VesaVideo {
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
        let (format, w, h) = DESKTOP_MODE;
        Some(DisplayMode::new(format, w, h))
    }

    fn display_modes(&mut self) -> retroplat_host::Result<Vec<DisplayMode>> {
        Ok(self.modes().iter().map(|m| m.display).collect())
    }

    fn set_display_mode(&mut self, mode: &DisplayMode) -> retroplat_host::Result<()> {
        Ok(VesaVideo::set_display_mode(self, mode)?)
    }

    fn create_window(&mut self, window: &mut Window) -> retroplat_host::Result<()> {
        Ok(VesaVideo::create_window(self, window)?)
    }

    fn destroy_window(&mut self, window: &mut Window) {
        VesaVideo::destroy_window(self, window);
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

    /// The whole window is copied whatever `rects` says.
    fn update_window_framebuffer(
        &mut self,
        window: &Window,
        _rects: &[Rect],
    ) -> retroplat_host::Result<()> {
        Ok(self.present(window)?)
    }

    fn destroy_window_framebuffer(&mut self, window: &Window) {
        self.destroy_framebuffer(window);
    }

    fn set_window_framebuffer_vsync(
        &mut self,
        window: &Window,
        vsync: i32,
    ) -> retroplat_host::Result<()> {
        Ok(self.set_vsync(window, vsync)?)
    }

    fn window_framebuffer_vsync(&self, window: &Window) -> retroplat_host::Result<i32> {
        Ok(self.vsync(window)?)
    }

    fn pump_events(&mut self, events: &mut dyn EventSink) {
        self.pump(events);
    }
}

/// Check for a VBE 2.0 BIOS and box the driver for the host.
pub fn init(
    platform: retroplat_dos::DosPlatform,
) -> retroplat_host::Result<Box<dyn VideoDriver>> {
    let video = VesaVideo::new(platform).map_err(|err: VesaError| {
        debug!(%err, "VESA unavailable");
        err
    })?;
    Ok(Box::new(video))
}
