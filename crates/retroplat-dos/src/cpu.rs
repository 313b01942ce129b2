//! CPU interrupt flag and delays.

use std::cell::Cell;
use std::rc::Rc;

/// Control over the CPU interrupt flag (`cli` / `sti`).
pub trait InterruptFlag {
    fn disable(&self);
    fn enable(&self);
}

/// Run `f` with interrupts disabled, re-enabling them afterwards unconditionally.
pub fn without_interrupts<R>(cpu: &dyn InterruptFlag, f: impl FnOnce() -> R) -> R {
    cpu.disable();
    let r = f();
    cpu.enable();
    r
}

/// Busy-wait delays.
pub trait Delay {
    fn delay_us(&mut self, us: u32);

    fn delay_ms(&mut self, ms: u32) {
        self.delay_us(ms.saturating_mul(1000));
    }
}

/// Interrupt flag model for tests. Clones share state.
#[derive(Clone, Debug, Default)]
pub struct SoftInterruptFlag {
    state: Rc<SoftFlagState>,
}

#[derive(Debug, Default)]
struct SoftFlagState {
    disabled: Cell<bool>,
    cli_count: Cell<u32>,
    sti_count: Cell<u32>,
}

impl SoftInterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupts_enabled(&self) -> bool {
        !self.state.disabled.get()
    }

    pub fn cli_count(&self) -> u32 {
        self.state.cli_count.get()
    }

    pub fn sti_count(&self) -> u32 {
        self.state.sti_count.get()
    }
}

impl InterruptFlag for SoftInterruptFlag {
    fn disable(&self) {
        self.state.disabled.set(true);
        self.state.cli_count.set(self.state.cli_count.get() + 1);
    }

    fn enable(&self) {
        self.state.disabled.set(false);
        self.state.sti_count.set(self.state.sti_count.get() + 1);
    }
}

/// Delay model that only accumulates the requested time. Clones share state.
#[derive(Clone, Debug, Default)]
pub struct SoftClock {
    elapsed_us: Rc<Cell<u64>>,
}

impl SoftClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_us.get()
    }
}

impl Delay for SoftClock {
    fn delay_us(&mut self, us: u32) {
        self.elapsed_us.set(self.elapsed_us.get() + u64::from(us));
    }
}

/// `std::thread::sleep` based delays, for hosted builds.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleep;

impl Delay for ThreadSleep {
    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(std::time::Duration::from_micros(u64::from(us)));
    }
}

#[cfg(all(feature = "djgpp", any(target_arch = "x86", target_arch = "x86_64")))]
#[derive(Clone, Copy, Debug, Default)]
pub struct HardwareInterruptFlag;

#[cfg(all(feature = "djgpp", any(target_arch = "x86", target_arch = "x86_64")))]
impl InterruptFlag for HardwareInterruptFlag {
    fn disable(&self) {
        // SAFETY: DPMI virtualizes IF for ring-3 clients; this only defers hardware interrupts.
        unsafe { core::arch::asm!("cli", options(nomem, nostack)) }
    }

    fn enable(&self) {
        // SAFETY: see `disable`.
        unsafe { core::arch::asm!("sti", options(nomem, nostack)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn without_interrupts_brackets_the_closure() {
        let cpu = SoftInterruptFlag::new();
        let seen = without_interrupts(&cpu, || cpu.interrupts_enabled());
        assert!(!seen);
        assert!(cpu.interrupts_enabled());
        assert_eq!((cpu.cli_count(), cpu.sti_count()), (1, 1));
    }

    #[test]
    fn soft_clock_accumulates() {
        let mut clock = SoftClock::new();
        let view = clock.clone();
        clock.delay_us(3);
        clock.delay_ms(112);
        assert_eq!(view.elapsed_us(), 112_003);
    }
}
