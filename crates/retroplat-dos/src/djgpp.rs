//! DJGPP runtime bindings: the platform services backed by the real DPMI host.

use std::ffi::{c_int, c_uint, c_ulong, c_ushort};

use crate::cpu::Delay;
use crate::dpmi::{MappedRegion, PhysicalMapper};
use crate::memory::{ConventionalMemory, DosBlock, CONVENTIONAL_LIMIT};
use crate::realmode::{RealModeInterrupts, RealModeRegs};
use crate::vectors::{HandlerAddress, InterruptHandler, VectorTable};
use crate::{DosError, Result};

/// `__dpmi_regs.x`.
#[repr(C)]
#[derive(Clone, Copy, Default)]
struct DpmiRegs {
    edi: u32,
    esi: u32,
    ebp: u32,
    res: u32,
    ebx: u32,
    edx: u32,
    ecx: u32,
    eax: u32,
    flags: u16,
    es: u16,
    ds: u16,
    fs: u16,
    gs: u16,
    ip: u16,
    cs: u16,
    sp: u16,
    ss: u16,
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
struct DpmiMemInfo {
    handle: c_ulong,
    size: c_ulong,
    address: c_ulong,
}

#[repr(C, packed)]
#[derive(Clone, Copy, Default)]
struct DpmiPAddr {
    offset32: c_ulong,
    selector: c_ushort,
}

#[repr(C)]
#[derive(Clone, Copy, Default)]
struct Go32SegInfo {
    size: c_ulong,
    pm_offset: c_ulong,
    pm_selector: c_ushort,
    rm_offset: c_ushort,
    rm_segment: c_ushort,
}

extern "C" {
    static __djgpp_conventional_base: c_int;

    fn __djgpp_nearptr_enable() -> c_int;
    fn __dpmi_allocate_dos_memory(paragraphs: c_int, selector: *mut c_int) -> c_int;
    fn __dpmi_free_dos_memory(selector: c_int) -> c_int;
    fn __dpmi_int(vector: c_int, regs: *mut DpmiRegs) -> c_int;
    fn __dpmi_physical_address_mapping(info: *mut DpmiMemInfo) -> c_int;
    fn __dpmi_free_physical_address_mapping(info: *mut DpmiMemInfo) -> c_int;
    fn __dpmi_get_protected_mode_interrupt_vector(vector: c_int, addr: *mut DpmiPAddr) -> c_int;
    fn __dpmi_set_protected_mode_interrupt_vector(vector: c_int, addr: *mut DpmiPAddr) -> c_int;
    fn _go32_dpmi_chain_protected_mode_interrupt_vector(
        vector: c_int,
        info: *mut Go32SegInfo,
    ) -> c_int;
    fn _go32_my_cs() -> c_ushort;
    fn usleep(us: c_uint) -> c_int;
}

/// Enable "fat DS" near pointers.
///
/// # Safety
///
/// Must run before anything else touches conventional memory through this module.
pub unsafe fn nearptr_enable() -> bool {
    __djgpp_nearptr_enable() != 0
}

fn physical_to_linear(physical: u32) -> *mut u8 {
    // SAFETY: read-only access to a DJGPP runtime global.
    let base = unsafe { __djgpp_conventional_base };
    physical.wrapping_add(base as u32) as usize as *mut u8
}

#[derive(Debug, Default)]
pub struct DjgppMemory;

impl ConventionalMemory for DjgppMemory {
    fn allocate(&mut self, paragraphs: u16) -> Option<DosBlock> {
        let mut selector: c_int = 0;
        // SAFETY: plain DPMI call with an out-pointer to a local.
        let segment = unsafe { __dpmi_allocate_dos_memory(c_int::from(paragraphs), &mut selector) };
        (segment != -1).then_some(DosBlock {
            segment: segment as u16,
            selector: selector as u16,
            paragraphs,
        })
    }

    fn free(&mut self, block: &DosBlock) {
        // SAFETY: the selector came from `allocate`.
        unsafe {
            __dpmi_free_dos_memory(c_int::from(block.selector));
        }
    }

    fn bytes(&self, addr: u32, len: usize) -> Option<&[u8]> {
        if u64::from(addr) + len as u64 > u64::from(CONVENTIONAL_LIMIT) {
            return None;
        }
        // SAFETY: near pointers cover the whole first megabyte once enabled by `run_app`.
        Some(unsafe { std::slice::from_raw_parts(physical_to_linear(addr), len) })
    }

    fn bytes_mut(&mut self, addr: u32, len: usize) -> Option<&mut [u8]> {
        if u64::from(addr) + len as u64 > u64::from(CONVENTIONAL_LIMIT) {
            return None;
        }
        // SAFETY: as in `bytes`; `&mut self` keeps Rust-side aliasing exclusive.
        Some(unsafe { std::slice::from_raw_parts_mut(physical_to_linear(addr), len) })
    }
}

#[derive(Debug, Default)]
pub struct DjgppVectors;

impl VectorTable for DjgppVectors {
    fn get(&self, vector: u8) -> HandlerAddress {
        let mut addr = DpmiPAddr::default();
        // SAFETY: out-pointer to a local.
        unsafe {
            __dpmi_get_protected_mode_interrupt_vector(c_int::from(vector), &mut addr);
        }
        HandlerAddress {
            selector: addr.selector,
            offset: addr.offset32 as u32,
        }
    }

    fn set(&mut self, vector: u8, handler: HandlerAddress) -> Result<()> {
        let mut addr = DpmiPAddr {
            offset32: handler.offset as c_ulong,
            selector: handler.selector,
        };
        // SAFETY: pointer to a local.
        let rc = unsafe { __dpmi_set_protected_mode_interrupt_vector(c_int::from(vector), &mut addr) };
        if rc != 0 {
            return Err(DosError::VectorUpdate { vector });
        }
        Ok(())
    }

    fn chain(&mut self, vector: u8, handler: InterruptHandler) -> Result<HandlerAddress> {
        let mut info = Go32SegInfo {
            // SAFETY: no preconditions.
            pm_selector: unsafe { _go32_my_cs() },
            pm_offset: handler as usize as c_ulong,
            ..Go32SegInfo::default()
        };
        // SAFETY: pointer to a local; DJGPP keeps its own copy of the wrapper.
        let rc = unsafe { _go32_dpmi_chain_protected_mode_interrupt_vector(c_int::from(vector), &mut info) };
        if rc != 0 {
            return Err(DosError::VectorUpdate { vector });
        }
        Ok(self.get(vector))
    }
}

#[derive(Debug, Default)]
pub struct DjgppBios;

impl RealModeInterrupts for DjgppBios {
    fn int(&mut self, vector: u8, regs: &mut RealModeRegs, _mem: &mut dyn ConventionalMemory) {
        let mut r = DpmiRegs {
            edi: regs.edi,
            esi: regs.esi,
            ebp: regs.ebp,
            ebx: regs.ebx,
            edx: regs.edx,
            ecx: regs.ecx,
            eax: regs.eax,
            es: regs.es,
            ds: regs.ds,
            ..DpmiRegs::default()
        };
        // SAFETY: pointer to a local register image.
        unsafe {
            __dpmi_int(c_int::from(vector), &mut r);
        }
        *regs = RealModeRegs {
            eax: r.eax,
            ebx: r.ebx,
            ecx: r.ecx,
            edx: r.edx,
            esi: r.esi,
            edi: r.edi,
            ebp: r.ebp,
            ds: r.ds,
            es: r.es,
            flags: r.flags,
        };
    }
}

#[derive(Debug, Default)]
pub struct DjgppMapper;

impl PhysicalMapper for DjgppMapper {
    fn map(&mut self, physical: u32, len: u32) -> Result<MappedRegion> {
        let mut info = DpmiMemInfo {
            address: physical as c_ulong,
            size: len as c_ulong,
            ..DpmiMemInfo::default()
        };
        // SAFETY: pointer to a local.
        if unsafe { __dpmi_physical_address_mapping(&mut info) } != 0 {
            return Err(DosError::MapFailed { physical, len });
        }
        Ok(MappedRegion {
            physical,
            linear: info.address as u32,
            len,
        })
    }

    fn unmap(&mut self, region: &MappedRegion) {
        let mut info = DpmiMemInfo {
            address: region.linear as c_ulong,
            ..DpmiMemInfo::default()
        };
        // SAFETY: pointer to a local.
        unsafe {
            __dpmi_free_physical_address_mapping(&mut info);
        }
    }

    fn view_mut(&mut self, region: &MappedRegion) -> Option<&mut [u8]> {
        // SAFETY: DPMI returned `linear` for `len` bytes; near pointers reach it through the
        // conventional base like any other linear address.
        let base = unsafe { __djgpp_conventional_base } as u32;
        let ptr = region.linear.wrapping_add(base) as usize as *mut u8;
        // SAFETY: see above.
        Some(unsafe { std::slice::from_raw_parts_mut(ptr, region.len as usize) })
    }
}

#[derive(Debug, Default)]
pub struct DjgppClock;

impl Delay for DjgppClock {
    fn delay_us(&mut self, us: u32) {
        // SAFETY: libc sleep.
        unsafe {
            usleep(us);
        }
    }
}
