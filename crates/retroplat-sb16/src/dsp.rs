//! DSP command protocol.
//!
//! All traffic goes through four ports relative to the card's base address. The DSP accepts a
//! byte on the write port once bit 7 of that port reads clear, and has a byte for us on the read
//! port once bit 7 of the read-status port reads set.

use retroplat_dos::{Delay, PortIo};

use crate::{Result, SbError};

pub const RESET: u16 = 0x6;
pub const READ_DATA: u16 = 0xA;
pub const WRITE: u16 = 0xC;
pub const READ_STATUS: u16 = 0xE;
/// Reading this acknowledges a 16-bit DMA interrupt.
pub const ACK_16BIT: u16 = 0xF;

/// First byte the DSP produces after a reset.
pub const RESET_ACK: u8 = 0xAA;

/// Hold time for the reset line.
pub const RESET_HOLD_US: u32 = 3;

pub mod cmd {
    pub const SET_OUTPUT_RATE: u8 = 0x41;
    /// 16-bit output, auto-initialized DMA, FIFO off.
    pub const START_16BIT_AUTOINIT: u8 = 0xB6;
    pub const SPEAKER_ON: u8 = 0xD1;
    pub const SPEAKER_OFF: u8 = 0xD3;
    pub const EXIT_16BIT_AUTOINIT: u8 = 0xDA;
    pub const GET_VERSION: u8 = 0xE1;

    /// Mode byte for [`START_16BIT_AUTOINIT`]: stereo, signed.
    pub const MODE_STEREO_SIGNED: u8 = 0x30;
}

const BUSY: u8 = 1 << 7;
const DATA_READY: u8 = 1 << 7;

/// How long to spin on a DSP status bit before giving up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SpinLimit {
    /// Spin until the DSP answers.
    #[default]
    Unbounded,
    /// Give up with [`SbError::DspTimeout`] after this many status reads.
    Polls(u32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dsp {
    base: u16,
    spin: SpinLimit,
}

impl Dsp {
    pub fn new(base: u16) -> Self {
        Self {
            base,
            spin: SpinLimit::Unbounded,
        }
    }

    pub fn with_spin_limit(mut self, spin: SpinLimit) -> Self {
        self.spin = spin;
        self
    }

    pub fn base(&self) -> u16 {
        self.base
    }

    pub fn reset(&self, io: &mut dyn PortIo, clock: &mut dyn Delay) {
        let port = self.base + RESET;
        io.outb(port, 1);
        clock.delay_us(RESET_HOLD_US);
        io.outb(port, 0);
    }

    pub fn is_ready(&self, io: &mut dyn PortIo) -> bool {
        io.inb(self.base + READ_STATUS) & DATA_READY != 0
    }

    pub fn write(&self, io: &mut dyn PortIo, value: u8) -> Result<()> {
        let port = self.base + WRITE;
        self.spin(|| io.inb(port) & BUSY == 0)?;
        io.outb(port, value);
        Ok(())
    }

    pub fn write_all(&self, io: &mut dyn PortIo, bytes: &[u8]) -> Result<()> {
        bytes.iter().try_for_each(|&b| self.write(io, b))
    }

    pub fn read(&self, io: &mut dyn PortIo) -> Result<u8> {
        self.spin(|| self.is_ready(io))?;
        Ok(io.inb(self.base + READ_DATA))
    }

    pub fn acknowledge_16bit_irq(&self, io: &mut dyn PortIo) {
        let _ = io.inb(self.base + ACK_16BIT);
    }

    fn spin(&self, mut done: impl FnMut() -> bool) -> Result<()> {
        match self.spin {
            SpinLimit::Unbounded => {
                while !done() {
                    std::hint::spin_loop();
                }
                Ok(())
            }
            SpinLimit::Polls(limit) => {
                if (0..limit).any(|_| done()) {
                    Ok(())
                } else {
                    Err(SbError::DspTimeout { port: self.base })
                }
            }
        }
    }
}
