//! ISA DMA controller (8237) programming for auto-init playback.
//!
//! Channels 0-3 live on the 8-bit controller at 0x00-0x0F and count bytes; channels 5-7 live on
//! the 16-bit controller at 0xC0-0xDF and count 16-bit words. Channel 4 cascades the two.

use retroplat_dos::{DmaBuffer, PortIo};
use tracing::debug;

/// Single-mode, auto-initialize, memory-to-device ("read") transfer.
const MODE_AUTOINIT_PLAYBACK: u8 = 0x58;
const MASK_SET: u8 = 0x04;

/// Page register for each channel.
const PAGE_PORTS: [u16; 8] = [0x87, 0x83, 0x81, 0x82, 0x8F, 0x8B, 0x89, 0x8A];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ControllerPorts {
    single_mask: u16,
    mode: u16,
    clear_flip_flop: u16,
    clear_mask: u16,
}

const LOW_CONTROLLER: ControllerPorts = ControllerPorts {
    single_mask: 0x0A,
    mode: 0x0B,
    clear_flip_flop: 0x0C,
    clear_mask: 0x0E,
};

const HIGH_CONTROLLER: ControllerPorts = ControllerPorts {
    single_mask: 0xD4,
    mode: 0xD6,
    clear_flip_flop: 0xD8,
    clear_mask: 0xDC,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DmaChannel {
    channel: u8,
}

impl DmaChannel {
    /// `None` for the cascade channel and anything above 7.
    pub fn new(channel: u8) -> Option<Self> {
        match channel {
            0..=3 | 5..=7 => Some(Self { channel }),
            _ => None,
        }
    }

    pub fn number(&self) -> u8 {
        self.channel
    }

    pub fn is_16bit(&self) -> bool {
        self.channel >= 4
    }

    /// Bytes moved per transfer cycle.
    pub fn transfer_width(&self) -> usize {
        if self.is_16bit() {
            2
        } else {
            1
        }
    }

    fn local(&self) -> u8 {
        self.channel & 3
    }

    fn controller(&self) -> ControllerPorts {
        if self.is_16bit() {
            HIGH_CONTROLLER
        } else {
            LOW_CONTROLLER
        }
    }

    pub fn address_port(&self) -> u16 {
        let local = u16::from(self.local());
        if self.is_16bit() {
            0xC0 + local * 4
        } else {
            local * 2
        }
    }

    pub fn count_port(&self) -> u16 {
        if self.is_16bit() {
            self.address_port() + 2
        } else {
            self.address_port() + 1
        }
    }

    pub fn page_port(&self) -> u16 {
        PAGE_PORTS[usize::from(self.channel)]
    }

    pub fn mask(&self, io: &mut dyn PortIo) {
        io.outb(self.controller().single_mask, MASK_SET | self.local());
    }

    pub fn unmask(&self, io: &mut dyn PortIo) {
        io.outb(self.controller().single_mask, self.local());
    }

    /// Point the channel at `buf` and start an endless memory-to-device transfer over it.
    pub fn program_autoinit_playback(&self, io: &mut dyn PortIo, buf: &DmaBuffer) {
        let ports = self.controller();
        let physical = buf.physical();
        let (addr_lo, addr_hi) = if self.is_16bit() {
            ((physical >> 1) as u8, (physical >> 9) as u8)
        } else {
            (physical as u8, (physical >> 8) as u8)
        };
        let count = (buf.len() / self.transfer_width()).saturating_sub(1) as u16;
        let [count_lo, count_hi] = count.to_le_bytes();

        self.mask(io);
        io.outb(ports.mode, MODE_AUTOINIT_PLAYBACK | self.local());
        io.outb(self.page_port(), (physical >> 16) as u8);
        io.outb(ports.clear_flip_flop, 0);
        io.outb(self.address_port(), addr_lo);
        io.outb(self.address_port(), addr_hi);
        io.outb(ports.clear_flip_flop, 0);
        io.outb(self.count_port(), count_lo);
        io.outb(self.count_port(), count_hi);
        io.outb(ports.clear_mask, 0);
        self.unmask(io);

        debug!(
            channel = self.channel,
            physical,
            count,
            "programmed auto-init DMA"
        );
    }

    /// Transfer units left before the controller wraps back to the start of the buffer.
    pub fn current_count(&self, io: &mut dyn PortIo) -> u16 {
        let lo = io.inb(self.count_port());
        let hi = io.inb(self.count_port());
        u16::from_le_bytes([lo, hi])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::DmaControllerModel;
    use retroplat_dos::io::{PortAccess, TracingPorts};
    use retroplat_dos::testing::ConventionalArena;
    use retroplat_dos::{allocate_dma, IoPortBus};

    #[test]
    fn cascade_and_out_of_range_channels_are_rejected() {
        assert!(DmaChannel::new(4).is_none());
        assert!(DmaChannel::new(8).is_none());
        assert!(DmaChannel::new(1).is_some());
        assert!(DmaChannel::new(7).is_some());
    }

    #[test]
    fn port_layout_per_channel() {
        let ch5 = DmaChannel::new(5).unwrap();
        assert_eq!(
            (ch5.address_port(), ch5.count_port(), ch5.page_port()),
            (0xC4, 0xC6, 0x8B)
        );
        let ch7 = DmaChannel::new(7).unwrap();
        assert_eq!(
            (ch7.address_port(), ch7.count_port(), ch7.page_port()),
            (0xCC, 0xCE, 0x8A)
        );
        let ch1 = DmaChannel::new(1).unwrap();
        assert_eq!(
            (ch1.address_port(), ch1.count_port(), ch1.page_port()),
            (0x02, 0x03, 0x83)
        );
    }

    #[test]
    fn channel_five_program_sequence() {
        let mut mem = ConventionalArena::new();
        let buf = allocate_dma(&mut mem, 8192).unwrap();
        let phys = buf.physical();

        let mut io = TracingPorts::new(IoPortBus::new());
        let log = io.log();
        DmaChannel::new(5)
            .unwrap()
            .program_autoinit_playback(&mut io, &buf);

        let expected = vec![
            PortAccess::Out(0xD4, 0x05),
            PortAccess::Out(0xD6, 0x59),
            PortAccess::Out(0x8B, (phys >> 16) as u8),
            PortAccess::Out(0xD8, 0),
            PortAccess::Out(0xC4, (phys >> 1) as u8),
            PortAccess::Out(0xC4, (phys >> 9) as u8),
            PortAccess::Out(0xD8, 0),
            PortAccess::Out(0xC6, 0xFF),
            PortAccess::Out(0xC6, 0x0F),
            PortAccess::Out(0xDC, 0),
            PortAccess::Out(0xD4, 0x01),
        ];
        assert_eq!(*log.borrow(), expected);
    }

    #[test]
    fn controller_model_sees_an_unmasked_autoinit_channel() {
        let mut mem = ConventionalArena::new();
        let buf = allocate_dma(&mut mem, 4096).unwrap();
        let dma = DmaControllerModel::new();
        let mut bus = IoPortBus::new();
        dma.attach(&mut bus);

        let ch = DmaChannel::new(6).unwrap();
        ch.program_autoinit_playback(&mut bus, &buf);

        let regs = dma.channel(6);
        assert!(!regs.masked);
        assert_eq!(regs.mode, 0x5A);
        assert_eq!(regs.page, (buf.physical() >> 16) as u8);
        assert_eq!(regs.address, (buf.physical() >> 1) as u16);
        assert_eq!(regs.count, 2047);

        dma.set_current_count(6, 100);
        assert_eq!(ch.current_count(&mut bus), 100);

        ch.mask(&mut bus);
        assert!(dma.channel(6).masked);
    }

    #[test]
    fn eight_bit_channel_counts_bytes() {
        let mut mem = ConventionalArena::new();
        let buf = allocate_dma(&mut mem, 4096).unwrap();
        let dma = DmaControllerModel::new();
        let mut bus = IoPortBus::new();
        dma.attach(&mut bus);

        DmaChannel::new(1)
            .unwrap()
            .program_autoinit_playback(&mut bus, &buf);
        let regs = dma.channel(1);
        assert_eq!(regs.count, 4095);
        assert_eq!(regs.address, buf.physical() as u16);
        assert_eq!(regs.mode, 0x59);
    }
}
