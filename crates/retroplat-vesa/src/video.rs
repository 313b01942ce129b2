//! The VESA display: mode enumeration, mode set with a mapped linear framebuffer, the single
//! window and its framebuffer, and the keyboard/mouse pump.

use retroplat_dos::{
    pic, DosPlatform, InterruptHandler, InterruptHook, MappedRegion, RealModeRegs,
};
use retroplat_host::{
    closest_display_mode, display_mode_order, DisplayMode, EventSink, FramebufferInfo,
    PixelFormat, Surface, Window, WindowFlags,
};
use tracing::{debug, info, trace, warn};

use crate::events::{KeyEventBuffers, KeyboardDecoder, KEYBOARD_DATA_PORT, KEYBOARD_IRQ};
use crate::framebuffer::{screen_view, wait_for_retrace, WindowFramebuffer};
use crate::info::{
    query_controller_info, query_mode_info, read_mode_list, VesaInfo, FN_SET_MODE,
    TEXT_MODE_80X25, VBE_OK, VIDEO_INT,
};
use crate::isr;
use crate::modes::{DisplayModeData, VesaMode, LINEAR_FRAMEBUFFER_FLAG};
use crate::mouse::{Cursor, Mouse};
use crate::{Result, VesaError};

/// Reported before any mode is set; the machine is most likely still in text mode.
pub const DESKTOP_MODE: (PixelFormat, i32, i32) = (PixelFormat::Rgb565, 320, 200);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct WindowState {
    id: u32,
    w: i32,
    h: i32,
    vsync: i32,
}

/// A VBE 2.0 display adapter with its mouse and keyboard.
pub struct VesaVideo {
    platform: DosPlatform,
    info: VesaInfo,
    modes: Vec<VesaMode>,
    current: Option<VesaMode>,
    mapping: Option<MappedRegion>,
    window: Option<WindowState>,
    framebuffer: Option<WindowFramebuffer>,
    mouse: Mouse,
    keys: KeyEventBuffers,
    decoder: KeyboardDecoder,
    keyboard_handler: InterruptHandler,
    keyboard_hook: Option<InterruptHook>,
}

impl VesaVideo {
    /// Read the controller information and require VBE 2.0 or later.
    pub fn new(mut platform: DosPlatform) -> Result<Self> {
        let info = query_controller_info(&mut *platform.bios, &mut *platform.memory)?;
        if !info.is_vbe2() {
            return Err(VesaError::NotVbe2 {
                version: info.version,
            });
        }
        info!(
            version = format_args!("{}.{}", info.version >> 8, info.version & 0xFF),
            memory_kb = info.total_memory / 1024,
            oem = info.oem_string.as_deref().unwrap_or(""),
            "VESA BIOS found"
        );
        Ok(Self {
            platform,
            info,
            modes: Vec::new(),
            current: None,
            mapping: None,
            window: None,
            framebuffer: None,
            mouse: Mouse::default(),
            keys: KeyEventBuffers::new(),
            decoder: KeyboardDecoder::new(),
            keyboard_handler: isr::keyboard_irq,
            keyboard_hook: None,
        })
    }

    /// Install `handler` on IRQ1 instead of the built-in trampoline.
    pub fn with_keyboard_handler(mut self, handler: InterruptHandler) -> Self {
        self.keyboard_handler = handler;
        self
    }

    pub fn info(&self) -> &VesaInfo {
        &self.info
    }

    /// Usable modes, largest first.
    pub fn modes(&self) -> &[VesaMode] {
        &self.modes
    }

    pub fn current_mode(&self) -> Option<&VesaMode> {
        self.current.as_ref()
    }

    pub fn mapping(&self) -> Option<&MappedRegion> {
        self.mapping.as_ref()
    }

    pub fn keyboard_hook(&self) -> Option<&InterruptHook> {
        self.keyboard_hook.as_ref()
    }

    pub fn mouse(&self) -> &Mouse {
        &self.mouse
    }

    pub fn platform_mut(&mut self) -> &mut DosPlatform {
        &mut self.platform
    }

    /// Mapped video memory of the current mode.
    pub fn screen_mut(&mut self) -> Option<&mut [u8]> {
        let mapping = self.mapping.as_ref()?;
        self.platform.mapper.view_mut(mapping)
    }

    /// Walk the BIOS mode list and keep the modes we can drive and whose screen fits in video
    /// memory.
    pub fn enumerate_modes(&mut self) -> Result<()> {
        let ids = read_mode_list(&*self.platform.memory, self.info.mode_list);
        let mut modes: Vec<VesaMode> = Vec::new();
        for id in ids {
            let Some(block) =
                query_mode_info(&mut *self.platform.bios, &mut *self.platform.memory, id)?
            else {
                continue;
            };
            let data = DisplayModeData::from_mode_info(id, &block);
            let Some(mode) = VesaMode::from_data(data) else {
                trace!(
                    mode = format_args!("{id:#x}"),
                    w = data.w,
                    h = data.h,
                    bpp = data.bpp,
                    "skipping VBE mode"
                );
                continue;
            };
            if data.screen_bytes() > self.info.total_memory as usize {
                trace!(
                    mode = format_args!("{id:#x}"),
                    bytes = data.screen_bytes(),
                    "VBE mode does not fit in video memory"
                );
                continue;
            }
            if modes.iter().any(|m| m.display == mode.display) {
                continue;
            }
            modes.push(mode);
        }
        modes.sort_by(|a, b| display_mode_order(&a.display, &b.display));
        debug!(count = modes.len(), "VESA modes");
        self.modes = modes;
        Ok(())
    }

    /// Switch to `mode` and map its framebuffer. Setting the current mode again does nothing.
    pub fn set_mode(&mut self, mode: VesaMode) -> Result<()> {
        if self
            .current
            .is_some_and(|cur| cur.data.mode_id == mode.data.mode_id)
        {
            return Ok(());
        }
        if let Some(mapping) = self.mapping.take() {
            self.platform.mapper.unmap(&mapping);
        }

        let id = mode.data.mode_id;
        let mut regs = RealModeRegs::with_ax(FN_SET_MODE);
        regs.set_bx(id | LINEAR_FRAMEBUFFER_FLAG);
        self.platform
            .bios
            .int(VIDEO_INT, &mut regs, &mut *self.platform.memory);
        if regs.ax() != VBE_OK {
            self.current = None;
            return Err(VesaError::SetModeFailed { mode: id });
        }

        let mapping = match self
            .platform
            .mapper
            .map(mode.data.physical_base_addr, self.info.total_memory)
        {
            Ok(mapping) => mapping,
            Err(err) => {
                warn!(%err, "falling back to text mode");
                self.text_mode();
                self.current = None;
                return Err(VesaError::MapFailed(err));
            }
        };
        self.mapping = Some(mapping);
        self.current = Some(mode);

        let len = mode.data.screen_bytes();
        if let Some(screen) = self.screen_mut() {
            let end = len.min(screen.len());
            screen[..end].fill(0);
        }

        self.mouse.set_range(
            &mut *self.platform.bios,
            &mut *self.platform.memory,
            mode.data.w,
            mode.data.h,
        );
        info!(
            mode = format_args!("{id:#x}"),
            w = mode.data.w,
            h = mode.data.h,
            format = ?mode.display.format,
            "VESA mode set"
        );
        Ok(())
    }

    fn text_mode(&mut self) {
        let mut regs = RealModeRegs::with_ax(TEXT_MODE_80X25);
        self.platform
            .bios
            .int(VIDEO_INT, &mut regs, &mut *self.platform.memory);
    }

    /// Set the listed mode matching `mode`'s size and format.
    pub fn set_display_mode(&mut self, mode: &DisplayMode) -> Result<()> {
        let found = self
            .modes
            .iter()
            .find(|m| {
                m.display.w == mode.w && m.display.h == mode.h && m.display.format == mode.format
            })
            .copied()
            .ok_or_else(|| VesaError::NoSuchMode {
                w: mode.w,
                h: mode.h,
                format: format!("{:?}", mode.format),
            })?;
        self.set_mode(found)
    }

    /// Enumerate modes, find the mouse and take over the keyboard.
    pub fn init(&mut self) -> Result<()> {
        self.current = None;
        self.enumerate_modes()?;
        self.mouse = Mouse::detect(&mut *self.platform.bios, &mut *self.platform.memory);
        isr::set_active(self);
        match InterruptHook::hook(
            &mut *self.platform.vectors,
            &mut *self.platform.io,
            KEYBOARD_IRQ,
            self.keyboard_handler,
        ) {
            Ok(hook) => self.keyboard_hook = Some(hook),
            Err(err) => {
                isr::clear_active(self);
                return Err(err.into());
            }
        }
        Ok(())
    }

    /// Back to text mode; releases the mapping, the mouse and the keyboard.
    pub fn quit(&mut self) {
        self.framebuffer = None;
        if let Some(mapping) = self.mapping.take() {
            self.platform.mapper.unmap(&mapping);
        }
        self.text_mode();
        self.current = None;
        self.mouse.quit();
        if let Some(hook) = self.keyboard_hook.take() {
            // The BIOS handler takes IRQ1 back, so the line stays open.
            if let Err(err) =
                hook.unhook(&mut *self.platform.vectors, &mut *self.platform.io, false)
            {
                warn!(%err, "failed to restore keyboard vector");
            }
        }
        isr::clear_active(self);
    }

    /// Pick the mode for `window`: the smallest that fits, else the largest with the window
    /// shrunk to it. The mode is set right away unless the window is about to go fullscreen.
    pub fn create_window(&mut self, window: &mut Window) -> Result<()> {
        let displays: Vec<DisplayMode> = self.modes.iter().map(|m| m.display).collect();
        let closest = closest_display_mode(&displays, window.w, window.h)
            .and_then(|d| self.modes.iter().find(|m| m.display == *d))
            .copied();
        let mode = match closest {
            Some(mode) => mode,
            None => {
                let largest = *self.modes.first().ok_or(VesaError::NoModes)?;
                window.w = largest.display.w;
                window.h = largest.display.h;
                largest
            }
        };
        if !window.flags.contains(WindowFlags::FULLSCREEN) {
            self.set_mode(mode)?;
        }
        self.window = Some(WindowState {
            id: window.id,
            w: window.w,
            h: window.h,
            vsync: 0,
        });
        Ok(())
    }

    pub fn destroy_window(&mut self, window: &Window) {
        if self.window.is_some_and(|w| w.id == window.id) {
            self.window = None;
            self.framebuffer = None;
        }
    }

    fn window_state(&mut self, id: u32) -> Result<&mut WindowState> {
        self.window
            .as_mut()
            .filter(|w| w.id == id)
            .ok_or(VesaError::UnknownWindow(id))
    }

    fn clear_screen(&mut self) {
        let Some(mode) = self.current else {
            return;
        };
        if let Some(screen) = self.screen_mut() {
            screen_view(screen, &mode).fill(0);
        }
    }

    /// Give `window` a system-RAM surface in the mode's format and blank the screen.
    pub fn create_framebuffer(&mut self, window: &Window) -> Result<FramebufferInfo> {
        let mode = self.current.ok_or(VesaError::NoModeSet)?;
        if self.mapping.is_none() {
            return Err(VesaError::NoModeSet);
        }
        let fb = WindowFramebuffer::new(window.id, window.w as u32, window.h as u32, &mode);
        let info = FramebufferInfo {
            format: fb.surface().format(),
            pitch: fb.surface().pitch(),
        };
        // A larger window may have used this mode before.
        self.clear_screen();
        self.framebuffer = Some(fb);
        Ok(info)
    }

    pub fn framebuffer_surface(&mut self, window: &Window) -> Result<&mut Surface> {
        self.framebuffer
            .as_mut()
            .filter(|fb| fb.window() == window.id)
            .map(WindowFramebuffer::surface_mut)
            .ok_or(VesaError::NoFramebuffer(window.id))
    }

    /// Wait for the configured number of retraces, then copy the window to the screen with
    /// the cursor on top.
    pub fn present(&mut self, window: &Window) -> Result<()> {
        let fb = self
            .framebuffer
            .as_ref()
            .filter(|fb| fb.window() == window.id)
            .ok_or(VesaError::NoFramebuffer(window.id))?;
        let mode = self.current.as_ref().ok_or(VesaError::NoModeSet)?;
        let mapping = self.mapping.as_ref().ok_or(VesaError::NoModeSet)?;
        let vsync = self
            .window
            .filter(|w| w.id == window.id)
            .map_or(0, |w| w.vsync);

        let cursor = self
            .mouse
            .draws_cursor()
            .then(|| (self.mouse.cursor(), self.mouse.position()));

        wait_for_retrace(&mut *self.platform.io, vsync);
        let screen = self
            .platform
            .mapper
            .view_mut(mapping)
            .ok_or(VesaError::NoModeSet)?;
        fb.present(&mut screen_view(screen, mode), mode, cursor);
        Ok(())
    }

    pub fn destroy_framebuffer(&mut self, window: &Window) {
        if self
            .framebuffer
            .as_ref()
            .is_some_and(|fb| fb.window() == window.id)
        {
            self.clear_screen();
            self.framebuffer = None;
        }
    }

    /// Retraces to wait for before each present. Negative values (adaptive vsync) are not
    /// supported.
    pub fn set_vsync(&mut self, window: &Window, vsync: i32) -> Result<()> {
        if vsync < 0 {
            return Err(VesaError::UnsupportedVsync(vsync));
        }
        self.window_state(window.id)?.vsync = vsync;
        Ok(())
    }

    pub fn vsync(&self, window: &Window) -> Result<i32> {
        self.window
            .filter(|w| w.id == window.id)
            .map(|w| w.vsync)
            .ok_or(VesaError::UnknownWindow(window.id))
    }

    /// Decode buffered keystrokes and poll the mouse.
    pub fn pump(&mut self, sink: &mut dyn EventSink) {
        let decoder = &mut self.decoder;
        self.keys
            .drain(&*self.platform.cpu, |byte| decoder.feed(byte, &mut *sink));
        self.mouse
            .pump(&mut *self.platform.bios, &mut *self.platform.memory, sink);
    }

    pub fn set_relative_mouse_mode(&mut self, relative: bool) {
        self.mouse.set_relative(
            &mut *self.platform.bios,
            &mut *self.platform.memory,
            relative,
        );
    }

    pub fn warp_mouse(&mut self, x: f32, y: f32, sink: &mut dyn EventSink) {
        self.mouse.warp(
            &mut *self.platform.bios,
            &mut *self.platform.memory,
            x as u16,
            y as u16,
            sink,
        );
    }

    /// `None` restores the default arrow.
    pub fn set_cursor(&mut self, cursor: Option<Cursor>) {
        self.mouse.set_cursor(cursor);
    }

    pub fn show_cursor(&mut self, visible: bool) {
        self.mouse.show_cursor(visible);
    }

    /// Body of the IRQ1 handler: stash the scan byte for the next pump.
    pub fn handle_keyboard_irq(&mut self) {
        let byte = self.platform.io.inb(KEYBOARD_DATA_PORT);
        if !self.keys.record(byte) {
            trace!(byte, "keyboard buffer full");
        }
        pic::end_of_interrupt(&mut *self.platform.io, KEYBOARD_IRQ);
    }
}

impl Drop for VesaVideo {
    fn drop(&mut self) {
        if self.keyboard_hook.is_some() || self.mapping.is_some() {
            self.quit();
        }
        isr::clear_active(self);
    }
}

impl std::fmt::Debug for VesaVideo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VesaVideo")
            .field("info", &self.info)
            .field("modes", &self.modes.len())
            .field("current", &self.current.map(|m| m.data.mode_id))
            .field("mapping", &self.mapping)
            .field("mouse", &self.mouse.is_present())
            .finish_non_exhaustive()
    }
}
