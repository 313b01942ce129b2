//! C ABI of the notcurses core library, limited to what the backend calls.

use std::ffi::{c_char, c_int, c_long, c_uint, c_void};
use std::ptr;

/// `struct notcurses`.
#[repr(C)]
pub struct Notcurses {
    _private: [u8; 0],
}

/// `struct ncplane`.
#[repr(C)]
pub struct NcPlane {
    _private: [u8; 0],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct Timespec {
    pub tv_sec: c_long,
    pub tv_nsec: c_long,
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct NotcursesOptions {
    pub termtype: *const c_char,
    pub loglevel: c_int,
    pub margin_t: c_uint,
    pub margin_r: c_uint,
    pub margin_b: c_uint,
    pub margin_l: c_uint,
    pub flags: u64,
}

impl NotcursesOptions {
    pub fn new(flags: u64) -> Self {
        Self {
            termtype: ptr::null(),
            loglevel: NCLOGLEVEL_SILENT,
            margin_t: 0,
            margin_r: 0,
            margin_b: 0,
            margin_l: 0,
            flags,
        }
    }
}

/// Room for the effective-text code points later releases append to `ncinput`. The library
/// writes at most its own struct size, so a larger buffer is harmless.
pub const NCINPUT_EFF_TEXT_CAPACITY: usize = 16;

/// `ncinput`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct NcInput {
    pub id: u32,
    pub y: c_int,
    pub x: c_int,
    pub utf8: [c_char; 5],
    pub alt: bool,
    pub shift: bool,
    pub ctrl: bool,
    pub evtype: c_int,
    pub modifiers: c_uint,
    pub ypx: c_int,
    pub xpx: c_int,
    pub eff_text: [u32; NCINPUT_EFF_TEXT_CAPACITY],
}

/// `struct ncvisual_options`.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct NcVisualOptions {
    pub n: *mut NcPlane,
    pub scaling: c_int,
    pub y: c_int,
    pub x: c_int,
    pub begy: c_uint,
    pub begx: c_uint,
    pub leny: c_uint,
    pub lenx: c_uint,
    pub blitter: c_int,
    pub flags: u64,
    pub transcolor: u32,
    pub pxoffy: c_uint,
    pub pxoffx: c_uint,
}

impl NcVisualOptions {
    pub fn for_plane(n: *mut NcPlane) -> Self {
        Self {
            n,
            scaling: NCSCALE_NONE,
            y: 0,
            x: 0,
            begy: 0,
            begx: 0,
            leny: 0,
            lenx: 0,
            blitter: NCBLIT_DEFAULT,
            flags: 0,
            transcolor: 0,
            pxoffy: 0,
            pxoffx: 0,
        }
    }
}

pub const NCLOGLEVEL_SILENT: c_int = -1;

pub const NCSCALE_NONE: c_int = 0;
pub const NCSCALE_SCALE: c_int = 1;
pub const NCSCALE_STRETCH: c_int = 2;
pub const NCSCALE_NONE_HIRES: c_int = 3;
pub const NCSCALE_SCALE_HIRES: c_int = 4;

pub const NCBLIT_DEFAULT: c_int = 0;

pub const NCTYPE_UNKNOWN: c_int = 0;
pub const NCTYPE_PRESS: c_int = 1;
pub const NCTYPE_REPEAT: c_int = 2;
pub const NCTYPE_RELEASE: c_int = 3;

/// Synthesized key ids start just past the last Unicode plane.
pub const PRETERUNICODEBASE: u32 = 1_115_000;

pub const fn preterunicode(w: u32) -> u32 {
    w + PRETERUNICODEBASE
}

pub const NCKEY_INVALID: u32 = preterunicode(0);
pub const NCKEY_RESIZE: u32 = preterunicode(1);
pub const NCKEY_UP: u32 = preterunicode(2);
pub const NCKEY_RIGHT: u32 = preterunicode(3);
pub const NCKEY_DOWN: u32 = preterunicode(4);
pub const NCKEY_LEFT: u32 = preterunicode(5);
pub const NCKEY_INS: u32 = preterunicode(6);
pub const NCKEY_DEL: u32 = preterunicode(7);
pub const NCKEY_BACKSPACE: u32 = preterunicode(8);
pub const NCKEY_PGDOWN: u32 = preterunicode(9);
pub const NCKEY_PGUP: u32 = preterunicode(10);
pub const NCKEY_HOME: u32 = preterunicode(11);
pub const NCKEY_END: u32 = preterunicode(12);
pub const NCKEY_F00: u32 = preterunicode(20);
pub const NCKEY_F60: u32 = preterunicode(80);
pub const NCKEY_ENTER: u32 = preterunicode(121);
pub const NCKEY_CLS: u32 = preterunicode(122);
pub const NCKEY_SEPARATOR: u32 = preterunicode(136);
pub const NCKEY_CAPS_LOCK: u32 = preterunicode(150);
pub const NCKEY_SCROLL_LOCK: u32 = preterunicode(151);
pub const NCKEY_NUM_LOCK: u32 = preterunicode(152);
pub const NCKEY_PRINT_SCREEN: u32 = preterunicode(153);
pub const NCKEY_PAUSE: u32 = preterunicode(154);
pub const NCKEY_MENU: u32 = preterunicode(155);
pub const NCKEY_MEDIA_PLAY: u32 = preterunicode(158);
pub const NCKEY_MEDIA_PAUSE: u32 = preterunicode(159);
pub const NCKEY_MEDIA_PPAUSE: u32 = preterunicode(160);
pub const NCKEY_MEDIA_REV: u32 = preterunicode(161);
pub const NCKEY_MEDIA_STOP: u32 = preterunicode(162);
pub const NCKEY_MEDIA_FF: u32 = preterunicode(163);
pub const NCKEY_MEDIA_REWIND: u32 = preterunicode(164);
pub const NCKEY_MEDIA_NEXT: u32 = preterunicode(165);
pub const NCKEY_MEDIA_PREV: u32 = preterunicode(166);
pub const NCKEY_MEDIA_RECORD: u32 = preterunicode(167);
pub const NCKEY_MEDIA_LVOL: u32 = preterunicode(168);
pub const NCKEY_MEDIA_RVOL: u32 = preterunicode(169);
pub const NCKEY_MEDIA_MUTE: u32 = preterunicode(170);
pub const NCKEY_LSHIFT: u32 = preterunicode(171);
pub const NCKEY_LCTRL: u32 = preterunicode(172);
pub const NCKEY_LALT: u32 = preterunicode(173);
pub const NCKEY_LSUPER: u32 = preterunicode(174);
pub const NCKEY_RSHIFT: u32 = preterunicode(177);
pub const NCKEY_RCTRL: u32 = preterunicode(178);
pub const NCKEY_RALT: u32 = preterunicode(179);
pub const NCKEY_RSUPER: u32 = preterunicode(180);
pub const NCKEY_L5SHIFT: u32 = preterunicode(184);
pub const NCKEY_MOTION: u32 = preterunicode(200);
pub const NCKEY_BUTTON1: u32 = preterunicode(201);
pub const NCKEY_BUTTON11: u32 = preterunicode(211);
pub const NCKEY_SIGNAL: u32 = preterunicode(400);
pub const NCKEY_EOF: u32 = preterunicode(500);

/// `notcurses_get` result when reading input failed.
pub const NCGET_ERROR: u32 = u32::MAX;

pub type VersionFn = unsafe extern "C" fn() -> *const c_char;
pub type CoreInitFn =
    unsafe extern "C" fn(opts: *const NotcursesOptions, fp: *mut c_void) -> *mut Notcurses;
pub type StopFn = unsafe extern "C" fn(nc: *mut Notcurses) -> c_int;
pub type StdPlaneFn = unsafe extern "C" fn(nc: *mut Notcurses) -> *mut NcPlane;
pub type DimYxFn = unsafe extern "C" fn(n: *const NcPlane, y: *mut c_uint, x: *mut c_uint);
pub type ResizeCb = unsafe extern "C" fn(n: *mut NcPlane) -> c_int;
pub type SetResizeCbFn = unsafe extern "C" fn(n: *mut NcPlane, cb: Option<ResizeCb>);
pub type GetFn =
    unsafe extern "C" fn(nc: *mut Notcurses, ts: *const Timespec, ni: *mut NcInput) -> u32;
pub type MiceEnableFn = unsafe extern "C" fn(nc: *mut Notcurses, eventmask: c_uint) -> c_int;
pub type BlitRgbaFn = unsafe extern "C" fn(
    data: *const c_void,
    linesize: c_int,
    vopts: *const NcVisualOptions,
) -> c_int;
pub type PileFn = unsafe extern "C" fn(n: *mut NcPlane) -> c_int;
