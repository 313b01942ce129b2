//! DOS platform shim for retroplat drivers.
//!
//! This crate is the only place that touches hardware ports, the CPU interrupt flag, protected
//! mode interrupt vectors and DPMI services. Each of those is a trait, bundled into a
//! [`DosPlatform`]; drivers take the bundle and never reach the machine any other way. With the
//! `djgpp` feature [`DosPlatform::native`] wires the traits to the real machine, and
//! [`testing`] provides in-memory models of every service.

pub mod app;
pub mod cpu;
pub mod dpmi;
mod error;
pub mod fs;
pub mod io;
pub mod memory;
pub mod pic;
pub mod realmode;
pub mod testing;
pub mod vectors;

#[cfg(feature = "djgpp")]
pub mod djgpp;

pub use cpu::{without_interrupts, Delay, InterruptFlag};
pub use dpmi::{MappedRegion, PhysicalMapper};
pub use error::{DosError, Result};
pub use io::{IoPortBus, PortIo, PortIoDevice};
pub use memory::{
    allocate_conventional, allocate_dma, free_dma, read_far_cstring, real_addr,
    ConventionalMemory, DmaBuffer, DosBlock, FarPtr,
};
pub use realmode::{RealModeInterrupts, RealModeRegs};
pub use vectors::{HandlerAddress, InterruptHandler, InterruptHook, VectorTable};

/// Every machine service a driver may use.
pub struct DosPlatform {
    pub io: Box<dyn PortIo>,
    pub cpu: Box<dyn InterruptFlag>,
    pub clock: Box<dyn Delay>,
    pub memory: Box<dyn ConventionalMemory>,
    pub vectors: Box<dyn VectorTable>,
    pub bios: Box<dyn RealModeInterrupts>,
    pub mapper: Box<dyn PhysicalMapper>,
}

impl DosPlatform {
    #[cfg(all(feature = "djgpp", any(target_arch = "x86", target_arch = "x86_64")))]
    pub fn native() -> Self {
        Self {
            io: Box::new(io::HardwarePorts),
            cpu: Box::new(cpu::HardwareInterruptFlag),
            clock: Box::new(djgpp::DjgppClock),
            memory: Box::new(djgpp::DjgppMemory),
            vectors: Box::new(djgpp::DjgppVectors),
            bios: Box::new(djgpp::DjgppBios),
            mapper: Box::new(djgpp::DjgppMapper),
        }
    }
}
