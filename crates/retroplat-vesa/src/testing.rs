//! In-memory models of the video BIOS, the INT 33h mouse driver, the VGA status register and the
//! keyboard controller, for driver tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use retroplat_dos::{
    real_addr, ConventionalMemory, FarPtr, IoPortBus, PortIoDevice, RealModeInterrupts,
    RealModeRegs,
};

use crate::events::KEYBOARD_DATA_PORT;
use crate::framebuffer::{INPUT_STATUS_PORT, VERTICAL_RETRACE};
use crate::info::{
    VbeControllerInfo, VbeModeInfo, END_OF_MODE_LIST, FN_CONTROLLER_INFO, FN_MODE_INFO,
    FN_SET_MODE, TEXT_MODE_80X25, VBE_OK, VIDEO_INT,
};
use crate::modes::{ModeAttributes, LINEAR_FRAMEBUFFER_FLAG, MEMORY_MODEL_DIRECT, MEMORY_MODEL_PACKED};
use crate::mouse::MOUSE_INT;

/// Segment of the BIOS ROM area the model keeps its strings and mode list in.
pub const ROM_SEGMENT: u16 = 0xC000;
const OEM_STRING_OFF: u16 = 0x0000;
const OEM_VENDOR_OFF: u16 = 0x0040;
const MODE_LIST_OFF: u16 = 0x0100;

/// Where [`VbeModeSpec`] modes put their framebuffer.
pub const LFB_BASE: u32 = 0xE000_0000;

/// AX returned by a VBE function that the BIOS supports but failed.
const VBE_FAILED: u16 = 0x014F;

/// A mode the model BIOS reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VbeModeSpec(pub VbeModeInfo);

impl VbeModeSpec {
    fn base(w: u16, h: u16, bpp: u8, memory_model: u8) -> VbeModeInfo {
        let bytes = u16::from(bpp).div_ceil(8);
        VbeModeInfo {
            attributes: (ModeAttributes::REQUIRED | ModeAttributes::TTY_OUTPUT).bits(),
            bytes_per_scan_line: w * bytes,
            x_resolution: w,
            y_resolution: h,
            number_of_planes: 1,
            bits_per_pixel: bpp,
            memory_model,
            number_of_image_pages: 1,
            phys_base_ptr: LFB_BASE,
            ..Default::default()
        }
    }

    /// Direct-colour mode with the usual channel layout for `bpp`.
    pub fn direct(w: u16, h: u16, bpp: u8) -> Self {
        let mut info = Self::base(w, h, bpp, MEMORY_MODEL_DIRECT);
        let (r, g, b) = match bpp {
            15 => ((5, 10), (5, 5), (5, 0)),
            16 => ((5, 11), (6, 5), (5, 0)),
            _ => ((8, 16), (8, 8), (8, 0)),
        };
        (info.red_mask_size, info.red_field_position) = r;
        (info.green_mask_size, info.green_field_position) = g;
        (info.blue_mask_size, info.blue_field_position) = b;
        Self(info)
    }

    /// Packed-pixel mode; the format follows from `bpp` alone.
    pub fn packed(w: u16, h: u16, bpp: u8) -> Self {
        Self(Self::base(w, h, bpp, MEMORY_MODEL_PACKED))
    }

    pub fn attributes(mut self, attributes: u16) -> Self {
        self.0.attributes = attributes;
        self
    }

    pub fn planes(mut self, planes: u8) -> Self {
        self.0.number_of_planes = planes;
        self
    }

    pub fn memory_model(mut self, model: u8) -> Self {
        self.0.memory_model = model;
        self
    }

    pub fn pitch(mut self, pitch: u16) -> Self {
        self.0.bytes_per_scan_line = pitch;
        self
    }
}

#[derive(Debug, Default)]
struct MouseState {
    buttons: u16,
    x: i16,
    y: i16,
    mickeys: (i16, i16),
    x_range: Option<(u16, u16)>,
    y_range: Option<(u16, u16)>,
    resets: u32,
    warps: Vec<(u16, u16)>,
}

#[derive(Debug, Default)]
struct BiosState {
    present: bool,
    version: u16,
    total_memory: u16,
    modes: Vec<(u16, VbeModeSpec)>,
    request_signature: Option<[u8; 4]>,
    fail_set_mode: bool,
    set_mode_calls: Vec<u16>,
    current_mode: Option<u16>,
    text_mode_sets: u32,
    mouse: Option<MouseState>,
}

/// INT 10h VBE services plus an optional INT 33h mouse driver. Clones share state.
#[derive(Clone, Debug, Default)]
pub struct VbeBiosModel {
    state: Rc<RefCell<BiosState>>,
}

impl VbeBiosModel {
    /// A VBE BIOS of `version` (BCD) with `total_memory` 64KB units of video memory.
    pub fn new(version: u16, total_memory: u16) -> Self {
        Self {
            state: Rc::new(RefCell::new(BiosState {
                present: true,
                version,
                total_memory,
                ..Default::default()
            })),
        }
    }

    /// No VBE at all: function 4F00h comes back unsupported.
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn add_mode(&self, id: u16, spec: VbeModeSpec) {
        self.state.borrow_mut().modes.push((id, spec));
    }

    /// Install an INT 33h driver.
    pub fn with_mouse(self) -> Self {
        self.state.borrow_mut().mouse = Some(MouseState::default());
        self
    }

    /// Make function 4F02h fail.
    pub fn fail_set_mode(&self, fail: bool) {
        self.state.borrow_mut().fail_set_mode = fail;
    }

    /// Signature found in the caller's block on the last 4F00h call.
    pub fn request_signature(&self) -> Option<[u8; 4]> {
        self.state.borrow().request_signature
    }

    /// BX of every 4F02h call, in order.
    pub fn set_mode_calls(&self) -> Vec<u16> {
        self.state.borrow().set_mode_calls.clone()
    }

    pub fn current_mode(&self) -> Option<u16> {
        self.state.borrow().current_mode
    }

    pub fn text_mode_sets(&self) -> u32 {
        self.state.borrow().text_mode_sets
    }

    /// Move the pointer and set the button bits (bit 0 left, 1 right, 2 middle).
    pub fn set_mouse(&self, x: i16, y: i16, buttons: u16) {
        if let Some(m) = self.state.borrow_mut().mouse.as_mut() {
            (m.x, m.y, m.buttons) = (x, y, buttons);
        }
    }

    /// Add to the motion counters read by function 0Bh.
    pub fn add_mickeys(&self, dx: i16, dy: i16) {
        if let Some(m) = self.state.borrow_mut().mouse.as_mut() {
            m.mickeys.0 = m.mickeys.0.saturating_add(dx);
            m.mickeys.1 = m.mickeys.1.saturating_add(dy);
        }
    }

    pub fn mouse_ranges(&self) -> (Option<(u16, u16)>, Option<(u16, u16)>) {
        let s = self.state.borrow();
        s.mouse
            .as_ref()
            .map_or((None, None), |m| (m.x_range, m.y_range))
    }

    pub fn mouse_warps(&self) -> Vec<(u16, u16)> {
        let s = self.state.borrow();
        s.mouse.as_ref().map_or_else(Vec::new, |m| m.warps.clone())
    }

    pub fn mouse_resets(&self) -> u32 {
        let s = self.state.borrow();
        s.mouse.as_ref().map_or(0, |m| m.resets)
    }

    fn controller_info(&self, regs: &mut RealModeRegs, mem: &mut dyn ConventionalMemory) {
        let mut s = self.state.borrow_mut();
        if !s.present {
            return;
        }
        let addr = real_addr(regs.es, regs.di());
        let mut block = [0u8; VbeControllerInfo::SIZE];
        if mem.read(addr, &mut block).is_err() {
            regs.set_ax(VBE_FAILED);
            return;
        }
        s.request_signature = Some([block[0], block[1], block[2], block[3]]);

        let mut list: Vec<u8> = s
            .modes
            .iter()
            .flat_map(|(id, _)| id.to_le_bytes())
            .collect();
        list.extend_from_slice(&END_OF_MODE_LIST.to_le_bytes());
        let rom = |off| real_addr(ROM_SEGMENT, off);
        let wrote = mem.write(rom(OEM_STRING_OFF), b"Retro VGA BIOS\0").is_ok()
            && mem.write(rom(OEM_VENDOR_OFF), b"Retro Vendor\0").is_ok()
            && mem.write(rom(MODE_LIST_OFF), &list).is_ok();

        VbeControllerInfo {
            signature: VbeControllerInfo::SIGNATURE,
            version: s.version,
            oem_string: FarPtr::new(ROM_SEGMENT, OEM_STRING_OFF),
            capabilities: 0,
            video_modes: FarPtr::new(ROM_SEGMENT, MODE_LIST_OFF),
            total_memory: s.total_memory,
            oem_software_rev: 0x0100,
            oem_vendor_name: FarPtr::new(ROM_SEGMENT, OEM_VENDOR_OFF),
            oem_product_name: FarPtr::NULL,
            oem_product_rev: FarPtr::NULL,
        }
        .encode(&mut block);
        let ok = wrote && mem.write(addr, &block).is_ok();
        regs.set_ax(if ok { VBE_OK } else { VBE_FAILED });
    }

    fn mode_info(&self, regs: &mut RealModeRegs, mem: &mut dyn ConventionalMemory) {
        let s = self.state.borrow();
        if !s.present {
            return;
        }
        let Some((_, spec)) = s.modes.iter().find(|(id, _)| *id == regs.cx()) else {
            regs.set_ax(VBE_FAILED);
            return;
        };
        let mut block = [0u8; VbeModeInfo::SIZE];
        spec.0.encode(&mut block);
        let ok = mem.write(real_addr(regs.es, regs.di()), &block).is_ok();
        regs.set_ax(if ok { VBE_OK } else { VBE_FAILED });
    }

    fn set_mode(&self, regs: &mut RealModeRegs) {
        let mut s = self.state.borrow_mut();
        if !s.present {
            return;
        }
        let bx = regs.bx();
        s.set_mode_calls.push(bx);
        let id = bx & !LINEAR_FRAMEBUFFER_FLAG;
        if s.fail_set_mode || !s.modes.iter().any(|(m, _)| *m == id) {
            regs.set_ax(VBE_FAILED);
            return;
        }
        s.current_mode = Some(id);
        regs.set_ax(VBE_OK);
    }

    fn mouse(&self, regs: &mut RealModeRegs) {
        let mut s = self.state.borrow_mut();
        // No driver loaded: the vector points at an IRET and AX comes back unchanged.
        let Some(m) = s.mouse.as_mut() else {
            return;
        };
        match regs.ax() {
            0x00 => {
                m.resets += 1;
                regs.set_ax(0xFFFF);
                regs.set_bx(2);
            }
            0x03 => {
                regs.set_bx(m.buttons);
                regs.set_cx(m.x as u16);
                regs.set_dx(m.y as u16);
            }
            0x04 => {
                m.warps.push((regs.cx(), regs.dx()));
                m.x = regs.cx() as i16;
                m.y = regs.dx() as i16;
            }
            0x07 => m.x_range = Some((regs.cx(), regs.dx())),
            0x08 => m.y_range = Some((regs.cx(), regs.dx())),
            0x0B => {
                let (dx, dy) = std::mem::take(&mut m.mickeys);
                regs.set_cx(dx as u16);
                regs.set_dx(dy as u16);
            }
            _ => {}
        }
    }
}

impl RealModeInterrupts for VbeBiosModel {
    fn int(&mut self, vector: u8, regs: &mut RealModeRegs, mem: &mut dyn ConventionalMemory) {
        match (vector, regs.ax()) {
            (VIDEO_INT, FN_CONTROLLER_INFO) => self.controller_info(regs, mem),
            (VIDEO_INT, FN_MODE_INFO) => self.mode_info(regs, mem),
            (VIDEO_INT, FN_SET_MODE) => self.set_mode(regs),
            (VIDEO_INT, TEXT_MODE_80X25) => {
                let mut s = self.state.borrow_mut();
                s.text_mode_sets += 1;
                s.current_mode = None;
            }
            (MOUSE_INT, _) => self.mouse(regs),
            _ => regs.set_carry(true),
        }
    }
}

#[derive(Debug)]
struct RetraceState {
    period: u32,
    reads: u32,
    retraces: u32,
}

/// VGA input status register 1: the retrace bit comes up on every `period`th read.
#[derive(Clone, Debug)]
pub struct RetraceModel {
    state: Rc<RefCell<RetraceState>>,
}

impl RetraceModel {
    pub fn new(period: u32) -> Self {
        Self {
            state: Rc::new(RefCell::new(RetraceState {
                period: period.max(1),
                reads: 0,
                retraces: 0,
            })),
        }
    }

    pub fn attach(&self, bus: &mut IoPortBus) {
        bus.register(INPUT_STATUS_PORT, Box::new(self.clone()));
    }

    /// Retraces reported so far.
    pub fn retraces(&self) -> u32 {
        self.state.borrow().retraces
    }
}

impl PortIoDevice for RetraceModel {
    fn read(&mut self, _port: u16) -> u8 {
        let mut s = self.state.borrow_mut();
        s.reads += 1;
        if s.reads % s.period == 0 {
            s.retraces += 1;
            VERTICAL_RETRACE
        } else {
            0
        }
    }

    fn write(&mut self, _port: u16, _value: u8) {}
}

/// Keyboard controller data port, fed from a queue of scan bytes.
#[derive(Clone, Debug, Default)]
pub struct KeyboardPortModel {
    queue: Rc<RefCell<VecDeque<u8>>>,
}

impl KeyboardPortModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, bus: &mut IoPortBus) {
        bus.register(KEYBOARD_DATA_PORT, Box::new(self.clone()));
    }

    pub fn queue(&self, bytes: &[u8]) {
        self.queue.borrow_mut().extend(bytes.iter().copied());
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }
}

impl PortIoDevice for KeyboardPortModel {
    fn read(&mut self, _port: u16) -> u8 {
        self.queue.borrow_mut().pop_front().unwrap_or(0)
    }

    fn write(&mut self, _port: u16, _value: u8) {}
}
