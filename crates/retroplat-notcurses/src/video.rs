//! The terminal as a single display of one mode, the cell grid, with a software framebuffer
//! blitted through notcurses' pixel-to-cell scaler on every update.

use std::sync::Arc;

use retroplat_host::{DisplayMode, EventSink, FramebufferInfo, PixelFormat, Surface, Window};
use tracing::{debug, info, warn};

use crate::events::translate;
use crate::sym::SymbolLoader;
use crate::terminal::{InitFlags, MiceEvents, NcTerminal, Terminal};
use crate::{NotcursesError, Result};

/// `ncblit_rgba` reads R, G, B, A bytes, which is ABGR8888 in packed notation.
pub const FRAMEBUFFER_FORMAT: PixelFormat = PixelFormat::Abgr8888;

pub struct NotcursesVideo {
    terminal: Box<dyn Terminal>,
    window: Option<u32>,
    framebuffer: Option<(u32, Surface)>,
}

impl NotcursesVideo {
    /// Take over a running terminal and ask it for mouse reports.
    pub fn new(mut terminal: Box<dyn Terminal>) -> Self {
        if let Some(version) = terminal.version() {
            info!(%version, "notcurses ready");
        }
        if let Err(err) = terminal.enable_mice(MiceEvents::ALL) {
            warn!(%err, "no mouse support");
        }
        Self {
            terminal,
            window: None,
            framebuffer: None,
        }
    }

    /// Load the library through `loader` and start notcurses on stdout.
    pub fn open_with(loader: &Arc<SymbolLoader>) -> Result<Self> {
        let symbols = loader.load()?;
        let terminal = NcTerminal::open(symbols, InitFlags::SUPPRESS_BANNERS)?;
        Ok(Self::new(Box::new(terminal)))
    }

    /// [`NotcursesVideo::open_with`] the process-wide system library.
    #[cfg(feature = "dynamic")]
    pub fn open_shared() -> Result<Self> {
        Self::open_with(&crate::sym::shared_loader())
    }

    pub fn terminal(&self) -> &dyn Terminal {
        &*self.terminal
    }

    pub fn window(&self) -> Option<u32> {
        self.window
    }

    pub fn init(&mut self) -> Result<()> {
        if self.terminal.is_stopped() {
            return Err(NotcursesError::Stopped);
        }
        let size = self.terminal.size();
        debug!(cols = size.cols, rows = size.rows, "notcurses display");
        Ok(())
    }

    /// Restore the terminal. The driver is unusable afterwards.
    pub fn quit(&mut self) {
        self.framebuffer = None;
        self.window = None;
        self.terminal.stop();
    }

    /// The terminal size in cells.
    pub fn desktop_mode(&self) -> DisplayMode {
        let size = self.terminal.size();
        DisplayMode::new(FRAMEBUFFER_FORMAT, size.cols as i32, size.rows as i32)
    }

    pub fn display_modes(&self) -> Vec<DisplayMode> {
        vec![self.desktop_mode()]
    }

    /// Any request is accepted; the terminal keeps its size.
    pub fn set_display_mode(&mut self, mode: &DisplayMode) {
        debug!(w = mode.w, h = mode.h, "ignoring display mode change");
    }

    pub fn create_window(&mut self, window: &Window) {
        self.window = Some(window.id);
    }

    pub fn destroy_window(&mut self, window: &Window) {
        if self.window == Some(window.id) {
            self.window = None;
        }
        self.destroy_framebuffer(window);
    }

    pub fn create_framebuffer(&mut self, window: &Window) -> Result<FramebufferInfo> {
        if window.w <= 0 || window.h <= 0 {
            return Err(NotcursesError::InvalidWindowSize {
                w: window.w,
                h: window.h,
            });
        }
        let surface = Surface::new(window.w as u32, window.h as u32, FRAMEBUFFER_FORMAT);
        let info = FramebufferInfo {
            format: surface.format(),
            pitch: surface.pitch(),
        };
        self.framebuffer = Some((window.id, surface));
        Ok(info)
    }

    pub fn framebuffer_surface(&mut self, window: &Window) -> Result<&mut Surface> {
        self.framebuffer
            .as_mut()
            .filter(|(id, _)| *id == window.id)
            .map(|(_, surface)| surface)
            .ok_or(NotcursesError::NoFramebuffer(window.id))
    }

    /// Scale the whole framebuffer onto the standard plane and draw it.
    pub fn update(&mut self, window: &Window) -> Result<()> {
        let surface = self
            .framebuffer
            .as_ref()
            .filter(|(id, _)| *id == window.id)
            .map(|(_, surface)| surface)
            .ok_or(NotcursesError::NoFramebuffer(window.id))?;
        self.terminal.blit_rgba(
            surface.pixels(),
            surface.pitch(),
            surface.width(),
            surface.height(),
        )?;
        self.terminal.render()?;
        self.terminal.rasterize()
    }

    pub fn destroy_framebuffer(&mut self, window: &Window) {
        if self
            .framebuffer
            .as_ref()
            .is_some_and(|(id, _)| *id == window.id)
        {
            self.framebuffer = None;
        }
    }

    /// Translate everything queued on the terminal. Stops at the first empty read or read error.
    pub fn pump(&mut self, sink: &mut dyn EventSink) {
        while let Some(input) = self.terminal.poll_input() {
            let terminal = &*self.terminal;
            if let Some(event) = translate(&input, || terminal.size()) {
                sink.push(event);
            }
        }
    }
}

impl std::fmt::Debug for NotcursesVideo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotcursesVideo")
            .field("window", &self.window)
            .field("framebuffer", &self.framebuffer.as_ref().map(|(id, _)| id))
            .finish_non_exhaustive()
    }
}

impl Drop for NotcursesVideo {
    fn drop(&mut self) {
        self.terminal.stop();
    }
}

#[cfg(test)]
mod tests {
    use retroplat_host::{Event, KeyMod, Keycode, Scancode};

    use super::*;
    use crate::ffi::NCKEY_RESIZE;
    use crate::terminal::Input;
    use crate::testing::SoftTerminal;

    fn video(term: &SoftTerminal) -> NotcursesVideo {
        NotcursesVideo::new(Box::new(term.clone()))
    }

    #[test]
    fn construction_enables_every_mouse_report() {
        let term = SoftTerminal::new(80, 24);
        let _video = video(&term);
        assert_eq!(term.mice(), Some(MiceEvents::ALL));
    }

    #[test]
    fn mouse_failure_is_not_fatal() {
        let term = SoftTerminal::new(80, 24);
        term.fail_mice(true);
        let mut video = video(&term);
        assert_eq!(term.mice(), None);
        video.init().unwrap();
    }

    #[test]
    fn single_mode_is_the_cell_grid() {
        let term = SoftTerminal::new(132, 43);
        let mut video = video(&term);
        video.init().unwrap();
        let mode = video.desktop_mode();
        assert_eq!((mode.w, mode.h, mode.format), (132, 43, FRAMEBUFFER_FORMAT));
        assert_eq!(video.display_modes(), vec![mode]);
        term.resize(100, 30);
        assert_eq!(video.desktop_mode().w, 100);
    }

    #[test]
    fn framebuffer_needs_a_real_size() {
        let term = SoftTerminal::new(80, 24);
        let mut video = video(&term);
        assert!(matches!(
            video.create_framebuffer(&Window::new(1, 0, 10)),
            Err(NotcursesError::InvalidWindowSize { w: 0, h: 10 })
        ));
    }

    #[test]
    fn framebuffer_is_scoped_to_its_window() {
        let term = SoftTerminal::new(80, 24);
        let mut video = video(&term);
        let window = Window::new(1, 8, 4);
        video.create_window(&window);
        let info = video.create_framebuffer(&window).unwrap();
        assert_eq!((info.format, info.pitch), (FRAMEBUFFER_FORMAT, 32));
        assert!(matches!(
            video.framebuffer_surface(&Window::new(2, 8, 4)),
            Err(NotcursesError::NoFramebuffer(2))
        ));
        video.destroy_window(&window);
        assert_eq!(video.window(), None);
        assert!(video.framebuffer_surface(&window).is_err());
    }

    #[test]
    fn stopped_terminal_fails_init() {
        let term = SoftTerminal::new(80, 24);
        let mut video = video(&term);
        video.quit();
        assert_eq!(term.stops(), 1);
        assert!(matches!(video.init(), Err(NotcursesError::Stopped)));
        drop(video);
        assert_eq!(term.stops(), 1);
    }

    #[test]
    fn pump_drains_the_queue() {
        let term = SoftTerminal::new(80, 24);
        let mut video = video(&term);
        term.queue(&[Input::key('b' as u32), Input::key(0x263A)]);
        term.resize(90, 25);
        term.queue(&[Input::key(NCKEY_RESIZE)]);
        let mut events = Vec::new();
        video.pump(&mut events);
        assert_eq!(
            events,
            vec![
                Event::KeyDown {
                    scancode: Scancode::B,
                    key: Keycode('b' as u32),
                    modifiers: KeyMod::empty(),
                },
                Event::WindowResized {
                    width: 90,
                    height: 25,
                },
            ]
        );
        assert_eq!(term.pending(), 0);
    }
}
