//! Real-mode software interrupts issued from protected mode (DPMI 0300h).

use crate::memory::ConventionalMemory;

/// Register image passed to and returned from a real-mode interrupt.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RealModeRegs {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
    pub esi: u32,
    pub edi: u32,
    pub ebp: u32,

    pub ds: u16,
    pub es: u16,

    /// FLAGS after the call. Only the carry bit is interpreted.
    pub flags: u16,
}

impl RealModeRegs {
    pub const FLAG_CF: u16 = 1 << 0;

    pub fn with_ax(ax: u16) -> Self {
        let mut regs = Self::default();
        regs.set_ax(ax);
        regs
    }

    pub fn carry(&self) -> bool {
        (self.flags & Self::FLAG_CF) != 0
    }

    pub fn set_carry(&mut self, carry: bool) {
        if carry {
            self.flags |= Self::FLAG_CF;
        } else {
            self.flags &= !Self::FLAG_CF;
        }
    }

    pub fn ax(&self) -> u16 {
        self.eax as u16
    }

    pub fn set_ax(&mut self, val: u16) {
        self.eax = (self.eax & 0xFFFF_0000) | (val as u32);
    }

    pub fn ah(&self) -> u8 {
        (self.eax >> 8) as u8
    }

    pub fn al(&self) -> u8 {
        self.eax as u8
    }

    pub fn bx(&self) -> u16 {
        self.ebx as u16
    }

    pub fn set_bx(&mut self, val: u16) {
        self.ebx = (self.ebx & 0xFFFF_0000) | (val as u32);
    }

    pub fn cx(&self) -> u16 {
        self.ecx as u16
    }

    pub fn set_cx(&mut self, val: u16) {
        self.ecx = (self.ecx & 0xFFFF_0000) | (val as u32);
    }

    pub fn dx(&self) -> u16 {
        self.edx as u16
    }

    pub fn set_dx(&mut self, val: u16) {
        self.edx = (self.edx & 0xFFFF_0000) | (val as u32);
    }

    pub fn di(&self) -> u16 {
        self.edi as u16
    }

    pub fn set_di(&mut self, val: u16) {
        self.edi = (self.edi & 0xFFFF_0000) | (val as u32);
    }
}

/// Simulate a real-mode `int n`. `mem` is the conventional memory any ES:DI buffers live in.
pub trait RealModeInterrupts {
    fn int(&mut self, vector: u8, regs: &mut RealModeRegs, mem: &mut dyn ConventionalMemory);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_setters_preserve_high_halves() {
        let mut regs = RealModeRegs {
            eax: 0xDEAD_0000,
            ..Default::default()
        };
        regs.set_ax(0x4F00);
        assert_eq!(regs.eax, 0xDEAD_4F00);
        assert_eq!(regs.ah(), 0x4F);
        assert_eq!(regs.al(), 0x00);
        regs.set_carry(true);
        assert!(regs.carry());
        regs.set_carry(false);
        assert_eq!(regs.flags, 0);
    }
}
