//! In-memory models of the DOS machine services, for driver tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::cpu::{SoftClock, SoftInterruptFlag};
use crate::dpmi::{MappedRegion, PhysicalMapper};
use crate::io::{IoPortBus, PortIoDevice};
use crate::memory::{ConventionalMemory, DosBlock, CONVENTIONAL_LIMIT, PARAGRAPH};
use crate::realmode::{RealModeInterrupts, RealModeRegs};
use crate::pic::{OCW2_EOI, PIC1_COMMAND, PIC1_DATA, PIC2_COMMAND, PIC2_DATA};
use crate::vectors::{HandlerAddress, InterruptHandler, VectorTable};
use crate::{DosError, DosPlatform, Result};

#[derive(Debug)]
struct PicState {
    master_imr: u8,
    slave_imr: u8,
    master_eoi: u32,
    slave_eoi: u32,
}

/// Interrupt mask and EOI registers of both 8259s. All lines start masked.
#[derive(Clone, Debug)]
pub struct PicModel {
    state: Rc<RefCell<PicState>>,
}

impl Default for PicModel {
    fn default() -> Self {
        Self::new()
    }
}

impl PicModel {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(PicState {
                master_imr: 0xFF,
                slave_imr: 0xFF,
                master_eoi: 0,
                slave_eoi: 0,
            })),
        }
    }

    pub fn attach(&self, bus: &mut IoPortBus) {
        for port in [PIC1_COMMAND, PIC1_DATA, PIC2_COMMAND, PIC2_DATA] {
            bus.register(port, Box::new(self.clone()));
        }
    }

    /// A fresh bus with only the PIC on it.
    pub fn bus(&self) -> IoPortBus {
        let mut bus = IoPortBus::new();
        self.attach(&mut bus);
        bus
    }

    pub fn master_imr(&self) -> u8 {
        self.state.borrow().master_imr
    }

    pub fn slave_imr(&self) -> u8 {
        self.state.borrow().slave_imr
    }

    pub fn master_eoi_count(&self) -> u32 {
        self.state.borrow().master_eoi
    }

    pub fn slave_eoi_count(&self) -> u32 {
        self.state.borrow().slave_eoi
    }
}

impl PortIoDevice for PicModel {
    fn read(&mut self, port: u16) -> u8 {
        let s = self.state.borrow();
        match port {
            PIC1_DATA => s.master_imr,
            PIC2_DATA => s.slave_imr,
            _ => 0,
        }
    }

    fn write(&mut self, port: u16, value: u8) {
        let mut s = self.state.borrow_mut();
        match (port, value) {
            (PIC1_DATA, v) => s.master_imr = v,
            (PIC2_DATA, v) => s.slave_imr = v,
            (PIC1_COMMAND, OCW2_EOI) => s.master_eoi += 1,
            (PIC2_COMMAND, OCW2_EOI) => s.slave_eoi += 1,
            _ => {}
        }
    }

    fn reset(&mut self) {
        let mut s = self.state.borrow_mut();
        s.master_imr = 0xFF;
        s.slave_imr = 0xFF;
    }
}

/// Allocation bookkeeping shared between a [`ConventionalArena`] and the test inspecting it.
#[derive(Clone, Debug, Default)]
pub struct ArenaLedger {
    inner: Rc<RefCell<LedgerState>>,
}

#[derive(Debug, Default)]
struct LedgerState {
    live: HashMap<u16, DosBlock>,
    freed: Vec<DosBlock>,
}

impl ArenaLedger {
    pub fn live_blocks(&self) -> usize {
        self.inner.borrow().live.len()
    }

    pub fn freed_blocks(&self) -> Vec<DosBlock> {
        self.inner.borrow().freed.clone()
    }
}

/// The first megabyte as a byte array, with a bump allocator for DOS blocks.
pub struct ConventionalArena {
    mem: Vec<u8>,
    next_segment: u32,
    end_segment: u32,
    ledger: ArenaLedger,
}

impl Default for ConventionalArena {
    fn default() -> Self {
        Self::new()
    }
}

impl ConventionalArena {
    /// Allocations start at segment 0x1000 and stop at the 640K line.
    pub fn new() -> Self {
        Self::with_range(0x1000, 0xA000)
    }

    /// Allocations come from segments `start..end`.
    pub fn with_range(start_segment: u16, end_segment: u16) -> Self {
        Self {
            mem: vec![0; CONVENTIONAL_LIMIT as usize],
            next_segment: u32::from(start_segment),
            end_segment: u32::from(end_segment),
            ledger: ArenaLedger::default(),
        }
    }

    pub fn ledger(&self) -> ArenaLedger {
        self.ledger.clone()
    }

    pub fn live_blocks(&self) -> usize {
        self.ledger.live_blocks()
    }
}

impl ConventionalMemory for ConventionalArena {
    fn allocate(&mut self, paragraphs: u16) -> Option<DosBlock> {
        let end = self.next_segment + u32::from(paragraphs);
        if end > self.end_segment {
            return None;
        }
        let mut ledger = self.ledger.inner.borrow_mut();
        let block = DosBlock {
            segment: self.next_segment as u16,
            selector: 0x100 + ledger.live.len() as u16 * 8,
            paragraphs,
        };
        self.next_segment = end;
        ledger.live.insert(block.segment, block);
        Some(block)
    }

    fn free(&mut self, block: &DosBlock) {
        let mut ledger = self.ledger.inner.borrow_mut();
        if let Some(b) = ledger.live.remove(&block.segment) {
            ledger.freed.push(b);
        }
    }

    fn bytes(&self, addr: u32, len: usize) -> Option<&[u8]> {
        let start = addr as usize;
        self.mem.get(start..start.checked_add(len)?)
    }

    fn bytes_mut(&mut self, addr: u32, len: usize) -> Option<&mut [u8]> {
        let start = addr as usize;
        self.mem.get_mut(start..start.checked_add(len)?)
    }
}

/// Selector the models use for "our" code segment.
pub const PROGRAM_CS: u16 = 0x00A7;

struct VectorState {
    entries: Vec<HandlerAddress>,
    chained: HashMap<u8, (InterruptHandler, HandlerAddress)>,
    fail_updates: bool,
}

/// Protected-mode vector table with recognizable defaults. Clones share state.
#[derive(Clone)]
pub struct SoftVectorTable {
    state: Rc<RefCell<VectorState>>,
}

impl Default for SoftVectorTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftVectorTable {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(VectorState {
                entries: (0..=255u8).map(Self::bios_default).collect(),
                chained: HashMap::new(),
                fail_updates: false,
            })),
        }
    }

    /// What every vector holds before anything is hooked.
    pub fn bios_default(vector: u8) -> HandlerAddress {
        HandlerAddress {
            selector: 0x00C7,
            offset: 0x1000 + u32::from(vector) * 8,
        }
    }

    /// Make every later `set`/`chain` fail.
    pub fn fail_updates(&self, fail: bool) {
        self.state.borrow_mut().fail_updates = fail;
    }

    /// Deliver an interrupt: runs the chained handler, if `vector` currently points at one.
    pub fn fire(&self, vector: u8) -> bool {
        let handler = {
            let s = self.state.borrow();
            match s.chained.get(&vector) {
                Some(&(handler, addr)) if s.entries[usize::from(vector)] == addr => Some(handler),
                _ => None,
            }
        };
        match handler {
            Some(h) => {
                h();
                true
            }
            None => false,
        }
    }
}

impl VectorTable for SoftVectorTable {
    fn get(&self, vector: u8) -> HandlerAddress {
        self.state.borrow().entries[usize::from(vector)]
    }

    fn set(&mut self, vector: u8, handler: HandlerAddress) -> Result<()> {
        let mut s = self.state.borrow_mut();
        if s.fail_updates {
            return Err(DosError::VectorUpdate { vector });
        }
        s.entries[usize::from(vector)] = handler;
        Ok(())
    }

    fn chain(&mut self, vector: u8, handler: InterruptHandler) -> Result<HandlerAddress> {
        let mut s = self.state.borrow_mut();
        if s.fail_updates {
            return Err(DosError::VectorUpdate { vector });
        }
        // A stand-in for the wrapper DPMI builds around the handler.
        let addr = HandlerAddress {
            selector: PROGRAM_CS,
            offset: 0x0010_0000 + u32::from(vector) * 0x40,
        };
        s.entries[usize::from(vector)] = addr;
        s.chained.insert(vector, (handler, addr));
        Ok(addr)
    }
}

/// Physical mappings backed by heap buffers.
pub struct SoftPhysicalMemory {
    regions: HashMap<u32, (MappedRegion, Vec<u8>)>,
    next_linear: u32,
    fail: bool,
    unmapped: Rc<RefCell<Vec<MappedRegion>>>,
}

impl Default for SoftPhysicalMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftPhysicalMemory {
    pub fn new() -> Self {
        Self {
            regions: HashMap::new(),
            next_linear: 0x8000_0000,
            fail: false,
            unmapped: Rc::default(),
        }
    }

    /// A mapper whose every `map` call fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn live_mappings(&self) -> usize {
        self.regions.len()
    }

    /// Shared log of released mappings.
    pub fn unmapped_log(&self) -> Rc<RefCell<Vec<MappedRegion>>> {
        Rc::clone(&self.unmapped)
    }
}

impl PhysicalMapper for SoftPhysicalMemory {
    fn map(&mut self, physical: u32, len: u32) -> Result<MappedRegion> {
        if self.fail || len == 0 {
            return Err(DosError::MapFailed { physical, len });
        }
        let region = MappedRegion {
            physical,
            linear: self.next_linear,
            len,
        };
        self.next_linear = self
            .next_linear
            .wrapping_add(len.next_multiple_of(PARAGRAPH as u32 * 256));
        self.regions
            .insert(region.linear, (region, vec![0; len as usize]));
        Ok(region)
    }

    fn unmap(&mut self, region: &MappedRegion) {
        if let Some((r, _)) = self.regions.remove(&region.linear) {
            self.unmapped.borrow_mut().push(r);
        }
    }

    fn view_mut(&mut self, region: &MappedRegion) -> Option<&mut [u8]> {
        self.regions
            .get_mut(&region.linear)
            .map(|(_, bytes)| bytes.as_mut_slice())
    }
}

/// A BIOS with no services: every call returns with carry set and registers untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct AbsentBios;

impl RealModeInterrupts for AbsentBios {
    fn int(&mut self, _vector: u8, regs: &mut RealModeRegs, _mem: &mut dyn ConventionalMemory) {
        regs.set_carry(true);
    }
}

/// Handles onto the models inside a platform built by [`SoftMachine::platform`].
#[derive(Clone)]
pub struct SoftMachine {
    pub pic: PicModel,
    pub cpu: SoftInterruptFlag,
    pub clock: SoftClock,
    pub vectors: SoftVectorTable,
    pub memory: ArenaLedger,
    pub unmapped: Rc<RefCell<Vec<MappedRegion>>>,
}

impl SoftMachine {
    /// Wrap `bus` (with a PIC added) and fresh models of every other service into a platform.
    pub fn platform(mut bus: IoPortBus) -> (DosPlatform, SoftMachine) {
        let pic = PicModel::new();
        pic.attach(&mut bus);
        let cpu = SoftInterruptFlag::new();
        let clock = SoftClock::new();
        let vectors = SoftVectorTable::new();
        let arena = ConventionalArena::new();
        let mapper = SoftPhysicalMemory::new();
        let machine = SoftMachine {
            pic,
            cpu: cpu.clone(),
            clock: clock.clone(),
            vectors: vectors.clone(),
            memory: arena.ledger(),
            unmapped: mapper.unmapped_log(),
        };
        let platform = DosPlatform {
            io: Box::new(bus),
            cpu: Box::new(cpu),
            clock: Box::new(clock),
            memory: Box::new(arena),
            vectors: Box::new(vectors),
            bios: Box::new(AbsentBios),
            mapper: Box::new(mapper),
        };
        (platform, machine)
    }
}
