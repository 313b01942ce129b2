//! x86 port I/O.
//!
//! Drivers talk to [`PortIo`]. On real DOS that is [`HardwarePorts`] (`in`/`out` instructions);
//! everywhere else it is an [`IoPortBus`] with device models registered on it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Byte-wide port access as seen by a driver.
pub trait PortIo {
    fn inb(&mut self, port: u16) -> u8;
    fn outb(&mut self, port: u16, value: u8);
}

impl<T: PortIo + ?Sized> PortIo for Box<T> {
    fn inb(&mut self, port: u16) -> u8 {
        (**self).inb(port)
    }

    fn outb(&mut self, port: u16, value: u8) {
        (**self).outb(port, value)
    }
}

impl<T: PortIo + ?Sized> PortIo for &mut T {
    fn inb(&mut self, port: u16) -> u8 {
        (**self).inb(port)
    }

    fn outb(&mut self, port: u16, value: u8) {
        (**self).outb(port, value)
    }
}

/// A device model attached to an [`IoPortBus`].
pub trait PortIoDevice {
    fn read(&mut self, port: u16) -> u8;
    fn write(&mut self, port: u16, value: u8);

    /// Reset the device back to its power-on state.
    fn reset(&mut self) {}
}

impl<T: PortIoDevice + ?Sized> PortIoDevice for Rc<RefCell<T>> {
    fn read(&mut self, port: u16) -> u8 {
        self.borrow_mut().read(port)
    }

    fn write(&mut self, port: u16, value: u8) {
        self.borrow_mut().write(port, value)
    }

    fn reset(&mut self) {
        self.borrow_mut().reset()
    }
}

struct RangeDevice {
    start: u16,
    len: u16,
    dev: Box<dyn PortIoDevice>,
}

impl RangeDevice {
    fn end_exclusive(&self) -> u32 {
        u32::from(self.start) + u32::from(self.len)
    }

    fn contains(&self, port: u16) -> bool {
        let p = u32::from(port);
        p >= u32::from(self.start) && p < self.end_exclusive()
    }
}

/// Port dispatcher for device models. Unclaimed ports float high (`0xFF`) and swallow writes.
#[derive(Default)]
pub struct IoPortBus {
    devices: HashMap<u16, Box<dyn PortIoDevice>>,
    ranges: Vec<RangeDevice>,
}

impl IoPortBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, port: u16, device: Box<dyn PortIoDevice>) {
        self.devices.insert(port, device);
    }

    pub fn unregister(&mut self, port: u16) -> Option<Box<dyn PortIoDevice>> {
        self.devices.remove(&port)
    }

    /// Registers a single device over a contiguous port range.
    ///
    /// Range devices are searched only if there is no exact port match.
    pub fn register_range(&mut self, start: u16, len: u16, dev: Box<dyn PortIoDevice>) {
        assert!(len != 0, "I/O port range length must be non-zero");

        let end_exclusive = u32::from(start) + u32::from(len);
        assert!(
            end_exclusive <= 0x1_0000,
            "I/O port range wraps past 0xFFFF: start={start:#x} len={len:#x}"
        );

        let idx = self.ranges.partition_point(|r| r.start < start);

        if let Some(prev) = self.ranges.get(idx.wrapping_sub(1)) {
            assert!(
                u32::from(start) >= prev.end_exclusive(),
                "overlapping I/O port ranges: new=[{start:#x}..{end_exclusive:#x}) prev=[{:#x}..{:#x})",
                prev.start,
                prev.end_exclusive()
            );
        }
        if let Some(next) = self.ranges.get(idx) {
            assert!(
                end_exclusive <= u32::from(next.start),
                "overlapping I/O port ranges: new=[{start:#x}..{end_exclusive:#x}) next=[{:#x}..{:#x})",
                next.start,
                next.end_exclusive()
            );
        }

        self.ranges.insert(idx, RangeDevice { start, len, dev });
    }

    fn find_range(&mut self, port: u16) -> Option<&mut RangeDevice> {
        let idx = self.ranges.partition_point(|r| r.start <= port);
        let cand = self.ranges.get_mut(idx.checked_sub(1)?)?;
        cand.contains(port).then_some(cand)
    }

    pub fn read_u8(&mut self, port: u16) -> u8 {
        if let Some(dev) = self.devices.get_mut(&port) {
            return dev.read(port);
        }
        match self.find_range(port) {
            Some(r) => r.dev.read(port),
            None => 0xFF,
        }
    }

    pub fn write_u8(&mut self, port: u16, value: u8) {
        if let Some(dev) = self.devices.get_mut(&port) {
            dev.write(port, value);
            return;
        }
        if let Some(r) = self.find_range(port) {
            r.dev.write(port, value);
        }
    }

    pub fn reset(&mut self) {
        for dev in self.devices.values_mut() {
            dev.reset();
        }
        for r in &mut self.ranges {
            r.dev.reset();
        }
    }
}

impl PortIo for IoPortBus {
    fn inb(&mut self, port: u16) -> u8 {
        self.read_u8(port)
    }

    fn outb(&mut self, port: u16, value: u8) {
        self.write_u8(port, value)
    }
}

/// Records every access that passes through it. Handy for asserting exact programming
/// sequences (DMA controller, PIC).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortAccess {
    In(u16, u8),
    Out(u16, u8),
}

pub struct TracingPorts<P> {
    inner: P,
    log: Rc<RefCell<Vec<PortAccess>>>,
}

impl<P: PortIo> TracingPorts<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            log: Rc::default(),
        }
    }

    /// Shared handle to the access log; stays valid after `self` is moved into a driver.
    pub fn log(&self) -> Rc<RefCell<Vec<PortAccess>>> {
        Rc::clone(&self.log)
    }

    pub fn into_inner(self) -> P {
        self.inner
    }
}

impl<P: PortIo> PortIo for TracingPorts<P> {
    fn inb(&mut self, port: u16) -> u8 {
        let v = self.inner.inb(port);
        self.log.borrow_mut().push(PortAccess::In(port, v));
        v
    }

    fn outb(&mut self, port: u16, value: u8) {
        self.log.borrow_mut().push(PortAccess::Out(port, value));
        self.inner.outb(port, value)
    }
}

/// The machine's real I/O space.
#[cfg(all(feature = "djgpp", any(target_arch = "x86", target_arch = "x86_64")))]
#[derive(Clone, Copy, Debug, Default)]
pub struct HardwarePorts;

#[cfg(all(feature = "djgpp", any(target_arch = "x86", target_arch = "x86_64")))]
impl PortIo for HardwarePorts {
    fn inb(&mut self, port: u16) -> u8 {
        let value: u8;
        // SAFETY: DPMI clients run at an IOPL that permits port access; the caller owns the
        // device being addressed.
        unsafe {
            core::arch::asm!("in al, dx", out("al") value, in("dx") port, options(nomem, nostack, preserves_flags));
        }
        value
    }

    fn outb(&mut self, port: u16, value: u8) {
        // SAFETY: see `inb`.
        unsafe {
            core::arch::asm!("out dx, al", in("dx") port, in("al") value, options(nomem, nostack, preserves_flags));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Latch(u8);

    impl PortIoDevice for Latch {
        fn read(&mut self, _port: u16) -> u8 {
            self.0
        }

        fn write(&mut self, _port: u16, value: u8) {
            self.0 = value;
        }

        fn reset(&mut self) {
            self.0 = 0;
        }
    }

    #[test]
    fn unmapped_ports_float_high() {
        let mut bus = IoPortBus::new();
        assert_eq!(bus.inb(0x220), 0xFF);
        bus.outb(0x220, 1);
    }

    #[test]
    fn exact_ports_win_over_ranges() {
        let mut bus = IoPortBus::new();
        bus.register_range(0x220, 0x10, Box::new(Latch(0x11)));
        bus.register(0x22A, Box::new(Latch(0x22)));
        assert_eq!(bus.inb(0x220), 0x11);
        assert_eq!(bus.inb(0x22A), 0x22);
        assert_eq!(bus.inb(0x22F), 0x11);
        assert_eq!(bus.inb(0x230), 0xFF);
    }

    #[test]
    fn reset_reaches_every_device() {
        let mut bus = IoPortBus::new();
        bus.register(0x60, Box::new(Latch(5)));
        bus.register_range(0x80, 4, Box::new(Latch(6)));
        bus.reset();
        assert_eq!(bus.inb(0x60), 0);
        assert_eq!(bus.inb(0x81), 0);
    }

    #[test]
    #[should_panic(expected = "overlapping I/O port ranges")]
    fn overlapping_ranges_are_rejected() {
        let mut bus = IoPortBus::new();
        bus.register_range(0x220, 0x10, Box::new(Latch(0)));
        bus.register_range(0x228, 0x10, Box::new(Latch(0)));
    }

    #[test]
    fn tracing_ports_record_in_order() {
        let mut ports = TracingPorts::new(IoPortBus::new());
        let log = ports.log();
        ports.outb(0x20, 0x20);
        let _ = ports.inb(0x21);
        assert_eq!(
            *log.borrow(),
            vec![PortAccess::Out(0x20, 0x20), PortAccess::In(0x21, 0xFF)]
        );
    }
}
