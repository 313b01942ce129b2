//! The terminal as the video driver sees it, and its implementation over the notcurses library.

use std::ffi::{c_int, c_uint, c_void, CStr};

use bitflags::bitflags;
use tracing::debug;

use crate::ffi;
use crate::sym::LoadedSymbols;
use crate::{NotcursesError, Result};

/// Size of the standard plane in character cells.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CellSize {
    pub cols: u32,
    pub rows: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InputType {
    #[default]
    Unknown,
    Press,
    Repeat,
    Release,
}

impl InputType {
    pub fn from_raw(raw: c_int) -> Self {
        match raw {
            ffi::NCTYPE_PRESS => Self::Press,
            ffi::NCTYPE_REPEAT => Self::Repeat,
            ffi::NCTYPE_RELEASE => Self::Release,
            _ => Self::Unknown,
        }
    }

    pub fn to_raw(self) -> c_int {
        match self {
            Self::Unknown => ffi::NCTYPE_UNKNOWN,
            Self::Press => ffi::NCTYPE_PRESS,
            Self::Repeat => ffi::NCTYPE_REPEAT,
            Self::Release => ffi::NCTYPE_RELEASE,
        }
    }
}

bitflags! {
    /// `NCKEY_MOD_*`.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Modifiers: u32 {
        const SHIFT = 1 << 0;
        const ALT = 1 << 1;
        const CTRL = 1 << 2;
        const SUPER = 1 << 3;
        const HYPER = 1 << 4;
        const META = 1 << 5;
        const CAPSLOCK = 1 << 6;
        const NUMLOCK = 1 << 7;
    }
}

bitflags! {
    /// `NCMICE_*`.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct MiceEvents: u32 {
        const MOVE = 0x1;
        const BUTTON = 0x2;
        const DRAG = 0x4;
        const ALL = Self::MOVE.bits() | Self::BUTTON.bits() | Self::DRAG.bits();
    }
}

bitflags! {
    /// `NCOPTION_*` passed to `notcurses_core_init`.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct InitFlags: u64 {
        const INHIBIT_SETLOCALE = 0x0001;
        const NO_CLEAR_BITMAPS = 0x0002;
        const NO_WINCH_SIGHANDLER = 0x0004;
        const NO_QUIT_SIGHANDLERS = 0x0008;
        const PRESERVE_CURSOR = 0x0010;
        const SUPPRESS_BANNERS = 0x0020;
        const NO_ALTERNATE_SCREEN = 0x0040;
        const NO_FONT_CHANGES = 0x0080;
        const DRAIN_INPUT = 0x0100;
    }
}

/// One `ncinput`, minus the text fields the backend has no use for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Input {
    /// Unicode code point, or one of the synthesized `NCKEY_*` ids.
    pub id: u32,
    pub y: i32,
    pub x: i32,
    pub evtype: InputType,
    pub modifiers: Modifiers,
}

impl Input {
    pub fn key(id: u32) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn at(mut self, x: i32, y: i32) -> Self {
        (self.x, self.y) = (x, y);
        self
    }

    pub fn with_type(mut self, evtype: InputType) -> Self {
        self.evtype = evtype;
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// A running notcurses context and its standard plane.
pub trait Terminal {
    fn version(&self) -> Option<String>;

    fn size(&self) -> CellSize;

    /// Next queued input without blocking.
    fn poll_input(&mut self) -> Option<Input>;

    fn enable_mice(&mut self, events: MiceEvents) -> Result<()>;

    /// Draw tightly described RGBA rows onto the standard plane, scaled to fit.
    fn blit_rgba(&mut self, pixels: &[u8], stride: usize, width: u32, height: u32)
        -> Result<()>;

    fn render(&mut self) -> Result<()>;

    fn rasterize(&mut self) -> Result<()>;

    /// Restore the terminal. Everything but `stop` fails afterwards.
    fn stop(&mut self);

    fn is_stopped(&self) -> bool;
}

/// [`Terminal`] backed by the notcurses core library.
pub struct NcTerminal {
    nc: *mut ffi::Notcurses,
    plane: *mut ffi::NcPlane,
    symbols: LoadedSymbols,
}

impl NcTerminal {
    pub fn open(symbols: LoadedSymbols, flags: InitFlags) -> Result<Self> {
        let options = ffi::NotcursesOptions::new(flags.bits());
        // SAFETY: `options` outlives the call; a null FILE* selects stdout.
        let nc = unsafe { (symbols.notcurses_core_init)(&options, std::ptr::null_mut()) };
        if nc.is_null() {
            return Err(NotcursesError::InitFailed);
        }
        // SAFETY: `nc` is a live context from `notcurses_core_init`.
        let plane = unsafe { (symbols.notcurses_stdplane)(nc) };
        if plane.is_null() {
            // SAFETY: as above; not used again.
            unsafe { (symbols.notcurses_stop)(nc) };
            return Err(NotcursesError::NoStdPlane);
        }
        Ok(Self { nc, plane, symbols })
    }

    fn live(&self) -> Result<*mut ffi::Notcurses> {
        if self.nc.is_null() {
            Err(NotcursesError::Stopped)
        } else {
            Ok(self.nc)
        }
    }
}

impl Terminal for NcTerminal {
    fn version(&self) -> Option<String> {
        // SAFETY: returns a static NUL-terminated string or null.
        let v = unsafe { (self.symbols.notcurses_version)() };
        if v.is_null() {
            return None;
        }
        // SAFETY: non-null, NUL-terminated and static.
        Some(unsafe { CStr::from_ptr(v) }.to_string_lossy().into_owned())
    }

    fn size(&self) -> CellSize {
        if self.nc.is_null() {
            return CellSize::default();
        }
        let (mut rows, mut cols): (c_uint, c_uint) = (0, 0);
        // SAFETY: `plane` belongs to the live context; both out-pointers are valid.
        unsafe { (self.symbols.ncplane_dim_yx)(self.plane, &mut rows, &mut cols) };
        CellSize { cols, rows }
    }

    fn poll_input(&mut self) -> Option<Input> {
        let nc = self.live().ok()?;
        let ts = ffi::Timespec::default();
        let mut ni = ffi::NcInput::default();
        // SAFETY: zero timeout makes this non-blocking; `ni` is at least as large as the
        // library's `ncinput`.
        let id = unsafe { (self.symbols.notcurses_get)(nc, &ts, &mut ni) };
        match id {
            0 => None,
            ffi::NCGET_ERROR => {
                debug!("notcurses_get failed");
                None
            }
            id => Some(Input {
                id,
                y: ni.y,
                x: ni.x,
                evtype: InputType::from_raw(ni.evtype),
                modifiers: Modifiers::from_bits_retain(ni.modifiers),
            }),
        }
    }

    fn enable_mice(&mut self, events: MiceEvents) -> Result<()> {
        let nc = self.live()?;
        // SAFETY: live context.
        match unsafe { (self.symbols.notcurses_mice_enable)(nc, events.bits()) } {
            -1 => Err(NotcursesError::Call("notcurses_mice_enable")),
            _ => Ok(()),
        }
    }

    fn blit_rgba(
        &mut self,
        pixels: &[u8],
        stride: usize,
        width: u32,
        height: u32,
    ) -> Result<()> {
        self.live()?;
        let row = width as usize * 4;
        let needed = match height as usize {
            0 => 0,
            h => stride * (h - 1) + row,
        };
        if stride < row || pixels.len() < needed {
            return Err(NotcursesError::ShortImage {
                len: pixels.len(),
                width,
                height,
                stride,
            });
        }
        let linesize =
            c_int::try_from(stride).map_err(|_| NotcursesError::Call("ncblit_rgba"))?;
        let mut vopts = ffi::NcVisualOptions::for_plane(self.plane);
        vopts.scaling = ffi::NCSCALE_SCALE_HIRES;
        vopts.lenx = width;
        vopts.leny = height;
        // SAFETY: `pixels` covers `height` rows of `stride` bytes, checked above.
        let rc = unsafe {
            (self.symbols.ncblit_rgba)(pixels.as_ptr().cast::<c_void>(), linesize, &vopts)
        };
        if rc == -1 {
            return Err(NotcursesError::Call("ncblit_rgba"));
        }
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        self.live()?;
        // SAFETY: `plane` belongs to the live context.
        match unsafe { (self.symbols.ncpile_render)(self.plane) } {
            0 => Ok(()),
            _ => Err(NotcursesError::Call("ncpile_render")),
        }
    }

    fn rasterize(&mut self) -> Result<()> {
        self.live()?;
        // SAFETY: `plane` belongs to the live context.
        match unsafe { (self.symbols.ncpile_rasterize)(self.plane) } {
            0 => Ok(()),
            _ => Err(NotcursesError::Call("ncpile_rasterize")),
        }
    }

    fn stop(&mut self) {
        if self.nc.is_null() {
            return;
        }
        // SAFETY: live context, never used after this.
        if unsafe { (self.symbols.notcurses_stop)(self.nc) } != 0 {
            debug!("notcurses_stop reported an error");
        }
        self.nc = std::ptr::null_mut();
        self.plane = std::ptr::null_mut();
    }

    fn is_stopped(&self) -> bool {
        self.nc.is_null()
    }
}

impl Drop for NcTerminal {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for NcTerminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NcTerminal")
            .field("stopped", &self.nc.is_null())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::sym::{SymbolLoader, SymbolSource};
    use crate::testing::{SoftLibrary, SoftTerminal};

    fn open(term: &SoftTerminal) -> NcTerminal {
        let lib = SoftLibrary::new(term);
        let loader = Arc::new(SymbolLoader::new(move || {
            Ok(Box::new(lib.clone()) as Box<dyn SymbolSource>)
        }));
        NcTerminal::open(loader.load().unwrap(), InitFlags::SUPPRESS_BANNERS).unwrap()
    }

    #[test]
    fn open_passes_flags_and_reports_size() {
        let term = SoftTerminal::new(100, 30);
        let nc = open(&term);
        assert_eq!(term.init_flags(), Some(InitFlags::SUPPRESS_BANNERS.bits()));
        assert_eq!(nc.size(), CellSize { cols: 100, rows: 30 });
        assert_eq!(nc.version().as_deref(), Some(SoftTerminal::VERSION));
    }

    #[test]
    fn failed_init_is_reported() {
        let term = SoftTerminal::new(80, 24);
        term.fail_init(true);
        let lib = SoftLibrary::new(&term);
        let loader = Arc::new(SymbolLoader::new(move || {
            Ok(Box::new(lib.clone()) as Box<dyn SymbolSource>)
        }));
        let symbols = loader.load().unwrap();
        assert!(matches!(
            NcTerminal::open(symbols, InitFlags::empty()),
            Err(NotcursesError::InitFailed)
        ));
        assert!(!loader.is_loaded());
    }

    #[test]
    fn input_comes_through_ncinput() {
        let term = SoftTerminal::new(80, 24);
        let mut nc = open(&term);
        let press = Input::key(ffi::NCKEY_BUTTON1)
            .at(3, 4)
            .with_type(InputType::Release)
            .with_modifiers(Modifiers::CTRL);
        term.queue(&[press, Input::key('x' as u32)]);
        assert_eq!(nc.poll_input(), Some(press));
        assert_eq!(nc.poll_input().map(|i| i.id), Some('x' as u32));
        assert_eq!(nc.poll_input(), None);
    }

    #[test]
    fn read_error_ends_the_poll() {
        let term = SoftTerminal::new(80, 24);
        let mut nc = open(&term);
        term.fail_input(true);
        term.queue(&[Input::key('x' as u32)]);
        assert_eq!(nc.poll_input(), None);
    }

    #[test]
    fn blit_checks_the_image_and_forwards_it() {
        let term = SoftTerminal::new(80, 24);
        let mut nc = open(&term);
        assert!(matches!(
            nc.blit_rgba(&[0; 15], 8, 2, 2),
            Err(NotcursesError::ShortImage { len: 15, .. })
        ));
        let pixels: Vec<u8> = (0..16).collect();
        nc.blit_rgba(&pixels, 8, 2, 2).unwrap();
        nc.render().unwrap();
        nc.rasterize().unwrap();

        let blits = term.blits();
        assert_eq!(blits.len(), 1);
        assert_eq!((blits[0].width, blits[0].height, blits[0].stride), (2, 2, 8));
        assert_eq!(blits[0].scaling, ffi::NCSCALE_SCALE_HIRES);
        assert_eq!(blits[0].pixels, pixels);
        assert_eq!((term.renders(), term.rasterizes()), (1, 1));
    }

    #[test]
    fn library_failures_become_errors() {
        let term = SoftTerminal::new(80, 24);
        let mut nc = open(&term);
        term.fail_render(true);
        assert!(matches!(nc.render(), Err(NotcursesError::Call("ncpile_render"))));
        term.fail_mice(true);
        assert!(matches!(
            nc.enable_mice(MiceEvents::ALL),
            Err(NotcursesError::Call("notcurses_mice_enable"))
        ));
    }

    #[test]
    fn stop_is_idempotent_and_final() {
        let term = SoftTerminal::new(80, 24);
        let mut nc = open(&term);
        nc.stop();
        nc.stop();
        assert_eq!(term.stops(), 1);
        assert!(nc.is_stopped());
        assert!(matches!(nc.render(), Err(NotcursesError::Stopped)));
        assert_eq!(nc.size(), CellSize::default());
        drop(nc);
        assert_eq!(term.stops(), 1);
    }
}
