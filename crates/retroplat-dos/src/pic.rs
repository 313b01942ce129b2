//! 8259A programmable interrupt controller helpers (master + cascaded slave).

use crate::io::PortIo;

pub const PIC1_COMMAND: u16 = 0x20;
pub const PIC1_DATA: u16 = 0x21;
pub const PIC2_COMMAND: u16 = 0xA0;
pub const PIC2_DATA: u16 = 0xA1;

/// Non-specific end-of-interrupt command.
pub const OCW2_EOI: u8 = 0x20;

/// IRQ line of the slave controller on the master.
const CASCADE_IRQ: u8 = 2;

/// Interrupt vector the BIOS routes an IRQ line to (master at 0x08, slave at 0x70).
pub const fn irq_to_vector(irq: u8) -> u8 {
    if irq > 7 {
        irq + 104
    } else {
        irq + 8
    }
}

/// Acknowledge `irq`. Slave lines need an EOI on both controllers.
pub fn end_of_interrupt(io: &mut dyn PortIo, irq: u8) {
    if irq > 7 {
        io.outb(PIC2_COMMAND, OCW2_EOI);
    }
    io.outb(PIC1_COMMAND, OCW2_EOI);
}

fn data_port_and_bit(irq: u8) -> (u16, u8) {
    if irq > 7 {
        (PIC2_DATA, 1 << (irq - 8))
    } else {
        (PIC1_DATA, 1 << irq)
    }
}

pub fn mask_irq(io: &mut dyn PortIo, irq: u8) {
    let (port, bit) = data_port_and_bit(irq);
    let imr = io.inb(port);
    io.outb(port, imr | bit);
}

/// Let `irq` through. For a slave line the cascade input on the master is opened too.
pub fn unmask_irq(io: &mut dyn PortIo, irq: u8) {
    let (port, bit) = data_port_and_bit(irq);
    let imr = io.inb(port);
    io.outb(port, imr & !bit);
    if irq > 7 {
        let master = io.inb(PIC1_DATA);
        io.outb(PIC1_DATA, master & !(1 << CASCADE_IRQ));
    }
}

pub fn is_masked(io: &mut dyn PortIo, irq: u8) -> bool {
    let (port, bit) = data_port_and_bit(irq);
    io.inb(port) & bit != 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{PortAccess, TracingPorts};
    use crate::testing::PicModel;

    #[test]
    fn vectors_follow_bios_layout() {
        assert_eq!(irq_to_vector(0), 0x08);
        assert_eq!(irq_to_vector(1), 0x09);
        assert_eq!(irq_to_vector(5), 0x0D);
        assert_eq!(irq_to_vector(7), 0x0F);
        assert_eq!(irq_to_vector(8), 0x70);
        assert_eq!(irq_to_vector(10), 0x72);
        assert_eq!(irq_to_vector(15), 0x77);
    }

    #[test]
    fn master_eoi_is_a_single_write() {
        let mut ports = TracingPorts::new(crate::io::IoPortBus::new());
        let log = ports.log();
        end_of_interrupt(&mut ports, 5);
        assert_eq!(*log.borrow(), vec![PortAccess::Out(0x20, 0x20)]);
    }

    #[test]
    fn slave_eoi_acknowledges_both_controllers() {
        let mut ports = TracingPorts::new(crate::io::IoPortBus::new());
        let log = ports.log();
        end_of_interrupt(&mut ports, 10);
        assert_eq!(
            *log.borrow(),
            vec![PortAccess::Out(0xA0, 0x20), PortAccess::Out(0x20, 0x20)]
        );
    }

    #[test]
    fn mask_and_unmask_touch_only_their_bit() {
        let pic = PicModel::new();
        let mut bus = pic.bus();
        unmask_irq(&mut bus, 5);
        assert_eq!(pic.master_imr(), 0xFF & !(1 << 5));
        assert!(!is_masked(&mut bus, 5));
        assert!(is_masked(&mut bus, 7));
        mask_irq(&mut bus, 5);
        assert_eq!(pic.master_imr(), 0xFF);
    }

    #[test]
    fn unmasking_a_slave_line_opens_the_cascade() {
        let pic = PicModel::new();
        let mut bus = pic.bus();
        unmask_irq(&mut bus, 10);
        assert_eq!(pic.slave_imr(), 0xFF & !(1 << 2));
        assert_eq!(pic.master_imr(), 0xFF & !(1 << 2));
        mask_irq(&mut bus, 10);
        assert_eq!(pic.slave_imr(), 0xFF);
    }
}
