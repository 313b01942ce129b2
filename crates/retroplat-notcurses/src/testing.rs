//! An in-memory terminal, usable directly as a [`Terminal`] or behind C-ABI stand-ins for the
//! notcurses entry points so the FFI path runs without the real library.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::ffi::{c_char, c_int, c_uint, c_void, CStr};
use std::ptr::NonNull;
use std::rc::Rc;

use crate::ffi;
use crate::sym::SymbolSource;
use crate::terminal::{CellSize, Input, MiceEvents, Terminal};
use crate::{NotcursesError, Result};

/// One `ncblit_rgba` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blit {
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub scaling: c_int,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Default)]
struct TermState {
    size: CellSize,
    inputs: VecDeque<Input>,
    init_flags: Option<u64>,
    mice: Option<MiceEvents>,
    blits: Vec<Blit>,
    renders: u32,
    rasterizes: u32,
    stops: u32,
    stopped: bool,
    fail_init: bool,
    fail_input: bool,
    fail_mice: bool,
    fail_blit: bool,
    fail_render: bool,
    fail_rasterize: bool,
}

/// Terminal model. Clones share state.
#[derive(Clone, Debug, Default)]
pub struct SoftTerminal {
    state: Rc<RefCell<TermState>>,
}

impl SoftTerminal {
    pub const VERSION: &'static str = "3.0.9";
    const VERSION_C: &'static CStr = c"3.0.9";

    pub fn new(cols: u32, rows: u32) -> Self {
        let term = Self::default();
        term.resize(cols, rows);
        term
    }

    pub fn resize(&self, cols: u32, rows: u32) {
        self.state.borrow_mut().size = CellSize { cols, rows };
    }

    pub fn queue(&self, inputs: &[Input]) {
        self.state.borrow_mut().inputs.extend(inputs.iter().copied());
    }

    pub fn pending(&self) -> usize {
        self.state.borrow().inputs.len()
    }

    pub fn fail_init(&self, fail: bool) {
        self.state.borrow_mut().fail_init = fail;
    }

    pub fn fail_input(&self, fail: bool) {
        self.state.borrow_mut().fail_input = fail;
    }

    pub fn fail_mice(&self, fail: bool) {
        self.state.borrow_mut().fail_mice = fail;
    }

    pub fn fail_blit(&self, fail: bool) {
        self.state.borrow_mut().fail_blit = fail;
    }

    pub fn fail_render(&self, fail: bool) {
        self.state.borrow_mut().fail_render = fail;
    }

    pub fn fail_rasterize(&self, fail: bool) {
        self.state.borrow_mut().fail_rasterize = fail;
    }

    /// Flags of the last `notcurses_core_init`.
    pub fn init_flags(&self) -> Option<u64> {
        self.state.borrow().init_flags
    }

    pub fn mice(&self) -> Option<MiceEvents> {
        self.state.borrow().mice
    }

    pub fn blits(&self) -> Vec<Blit> {
        self.state.borrow().blits.clone()
    }

    pub fn renders(&self) -> u32 {
        self.state.borrow().renders
    }

    pub fn rasterizes(&self) -> u32 {
        self.state.borrow().rasterizes
    }

    pub fn stops(&self) -> u32 {
        self.state.borrow().stops
    }

    fn check_live(&self) -> Result<()> {
        if self.state.borrow().stopped {
            Err(NotcursesError::Stopped)
        } else {
            Ok(())
        }
    }

    fn record_blit(&self, blit: Blit) -> bool {
        let mut s = self.state.borrow_mut();
        if s.fail_blit {
            return false;
        }
        s.blits.push(blit);
        true
    }

    fn record_render(&self) -> bool {
        let mut s = self.state.borrow_mut();
        s.renders += 1;
        !s.fail_render
    }

    fn record_rasterize(&self) -> bool {
        let mut s = self.state.borrow_mut();
        s.rasterizes += 1;
        !s.fail_rasterize
    }

    fn record_mice(&self, events: MiceEvents) -> bool {
        let mut s = self.state.borrow_mut();
        if s.fail_mice {
            return false;
        }
        s.mice = Some(events);
        true
    }

    fn record_stop(&self) {
        let mut s = self.state.borrow_mut();
        if !s.stopped {
            s.stopped = true;
            s.stops += 1;
        }
    }
}

impl Terminal for SoftTerminal {
    fn version(&self) -> Option<String> {
        Some(Self::VERSION.to_string())
    }

    fn size(&self) -> CellSize {
        self.state.borrow().size
    }

    fn poll_input(&mut self) -> Option<Input> {
        let mut s = self.state.borrow_mut();
        if s.stopped || s.fail_input {
            return None;
        }
        s.inputs.pop_front()
    }

    fn enable_mice(&mut self, events: MiceEvents) -> Result<()> {
        self.check_live()?;
        if self.record_mice(events) {
            Ok(())
        } else {
            Err(NotcursesError::Call("notcurses_mice_enable"))
        }
    }

    fn blit_rgba(
        &mut self,
        pixels: &[u8],
        stride: usize,
        width: u32,
        height: u32,
    ) -> Result<()> {
        self.check_live()?;
        let len = (stride * height as usize).min(pixels.len());
        let blit = Blit {
            width,
            height,
            stride,
            scaling: ffi::NCSCALE_SCALE_HIRES,
            pixels: pixels[..len].to_vec(),
        };
        if self.record_blit(blit) {
            Ok(())
        } else {
            Err(NotcursesError::Call("ncblit_rgba"))
        }
    }

    fn render(&mut self) -> Result<()> {
        self.check_live()?;
        if self.record_render() {
            Ok(())
        } else {
            Err(NotcursesError::Call("ncpile_render"))
        }
    }

    fn rasterize(&mut self) -> Result<()> {
        self.check_live()?;
        if self.record_rasterize() {
            Ok(())
        } else {
            Err(NotcursesError::Call("ncpile_rasterize"))
        }
    }

    fn stop(&mut self) {
        self.record_stop();
    }

    fn is_stopped(&self) -> bool {
        self.state.borrow().stopped
    }
}

thread_local! {
    static BACKING: RefCell<Option<SoftTerminal>> = const { RefCell::new(None) };
}

fn with_backing<R>(default: R, f: impl FnOnce(&SoftTerminal) -> R) -> R {
    BACKING.with(|b| b.borrow().as_ref().map_or(default, f))
}

extern "C" fn soft_version() -> *const c_char {
    SoftTerminal::VERSION_C.as_ptr()
}

extern "C" fn soft_core_init(
    opts: *const ffi::NotcursesOptions,
    _fp: *mut c_void,
) -> *mut ffi::Notcurses {
    // SAFETY: callers pass a valid options struct or null.
    let flags = unsafe { opts.as_ref() }.map_or(0, |o| o.flags);
    with_backing(std::ptr::null_mut(), |t| {
        let mut s = t.state.borrow_mut();
        s.init_flags = Some(flags);
        if s.fail_init {
            return std::ptr::null_mut();
        }
        s.stopped = false;
        NonNull::dangling().as_ptr()
    })
}

extern "C" fn soft_stop(_nc: *mut ffi::Notcurses) -> c_int {
    with_backing(-1, |t| {
        t.record_stop();
        0
    })
}

extern "C" fn soft_stdplane(_nc: *mut ffi::Notcurses) -> *mut ffi::NcPlane {
    NonNull::dangling().as_ptr()
}

extern "C" fn soft_dim_yx(_n: *const ffi::NcPlane, y: *mut c_uint, x: *mut c_uint) {
    let size = with_backing(CellSize::default(), |t| t.state.borrow().size);
    // SAFETY: callers pass valid out-pointers or null.
    unsafe {
        if let Some(y) = y.as_mut() {
            *y = size.rows;
        }
        if let Some(x) = x.as_mut() {
            *x = size.cols;
        }
    }
}

extern "C" fn soft_set_resizecb(_n: *mut ffi::NcPlane, _cb: Option<ffi::ResizeCb>) {}

extern "C" fn soft_get(
    _nc: *mut ffi::Notcurses,
    _ts: *const ffi::Timespec,
    ni: *mut ffi::NcInput,
) -> u32 {
    let next = with_backing(Err(()), |t| {
        let mut s = t.state.borrow_mut();
        if s.fail_input {
            return Err(());
        }
        Ok(s.inputs.pop_front())
    });
    match next {
        Err(()) => ffi::NCGET_ERROR,
        Ok(None) => 0,
        Ok(Some(input)) => {
            // SAFETY: callers pass a valid ncinput or null.
            if let Some(ni) = unsafe { ni.as_mut() } {
                *ni = ffi::NcInput {
                    id: input.id,
                    y: input.y,
                    x: input.x,
                    evtype: input.evtype.to_raw(),
                    modifiers: input.modifiers.bits(),
                    ..ffi::NcInput::default()
                };
            }
            input.id
        }
    }
}

extern "C" fn soft_mice_enable(_nc: *mut ffi::Notcurses, eventmask: c_uint) -> c_int {
    with_backing(-1, |t| {
        if t.record_mice(MiceEvents::from_bits_retain(eventmask)) {
            0
        } else {
            -1
        }
    })
}

extern "C" fn soft_blit_rgba(
    data: *const c_void,
    linesize: c_int,
    vopts: *const ffi::NcVisualOptions,
) -> c_int {
    // SAFETY: callers pass valid options or null.
    let Some(v) = (unsafe { vopts.as_ref() }) else {
        return -1;
    };
    let stride = linesize.max(0) as usize;
    let len = match v.leny as usize {
        0 => 0,
        h => stride * (h - 1) + v.lenx as usize * 4,
    };
    let pixels = if data.is_null() || len == 0 {
        Vec::new()
    } else {
        // SAFETY: the caller promises `leny` rows of `linesize` bytes at `data`.
        unsafe { std::slice::from_raw_parts(data.cast::<u8>(), len) }.to_vec()
    };
    let blit = Blit {
        width: v.lenx,
        height: v.leny,
        stride,
        scaling: v.scaling,
        pixels,
    };
    with_backing(-1, |t| if t.record_blit(blit) { 0 } else { -1 })
}

extern "C" fn soft_render(_n: *mut ffi::NcPlane) -> c_int {
    with_backing(-1, |t| if t.record_render() { 0 } else { -1 })
}

extern "C" fn soft_rasterize(_n: *mut ffi::NcPlane) -> c_int {
    with_backing(-1, |t| if t.record_rasterize() { 0 } else { -1 })
}

/// Stand-in notcurses library whose entry points act on a [`SoftTerminal`] of the calling
/// thread.
#[derive(Clone, Debug)]
pub struct SoftLibrary {
    symbols: HashMap<&'static str, usize>,
}

impl SoftLibrary {
    /// Exports every core symbol, backed by `terminal` for calls made on this thread.
    pub fn new(terminal: &SoftTerminal) -> Self {
        BACKING.with(|b| *b.borrow_mut() = Some(terminal.clone()));
        let symbols = HashMap::from([
            ("notcurses_version", soft_version as usize),
            ("notcurses_core_init", soft_core_init as usize),
            ("notcurses_stop", soft_stop as usize),
            ("notcurses_stdplane", soft_stdplane as usize),
            ("ncplane_dim_yx", soft_dim_yx as usize),
            ("ncplane_set_resizecb", soft_set_resizecb as usize),
            ("notcurses_get", soft_get as usize),
            ("notcurses_mice_enable", soft_mice_enable as usize),
            ("ncblit_rgba", soft_blit_rgba as usize),
            ("ncpile_render", soft_render as usize),
            ("ncpile_rasterize", soft_rasterize as usize),
        ]);
        Self { symbols }
    }

    /// Drop `name` from the exports.
    pub fn without(mut self, name: &str) -> Self {
        self.symbols.remove(name);
        self
    }
}

impl SymbolSource for SoftLibrary {
    fn symbol(&self, name: &str) -> Option<NonNull<c_void>> {
        self.symbols
            .get(name)
            .and_then(|&addr| NonNull::new(addr as *mut c_void))
    }
}
