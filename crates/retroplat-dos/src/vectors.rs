//! Protected-mode interrupt vectors and IRQ hooks.

use tracing::debug;

use crate::io::PortIo;
use crate::pic;
use crate::Result;

/// Entry point of an interrupt handler. The DPMI host wraps it so it can return with `iret`.
pub type InterruptHandler = extern "C" fn();

/// `selector:offset` of a protected-mode handler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct HandlerAddress {
    pub selector: u16,
    pub offset: u32,
}

/// DPMI protected-mode vector services (0204h / 0205h and the DJGPP chaining wrapper).
pub trait VectorTable {
    fn get(&self, vector: u8) -> HandlerAddress;

    fn set(&mut self, vector: u8, handler: HandlerAddress) -> Result<()>;

    /// Install `handler` on `vector` so that it runs first and then chains to whatever was there
    /// before. Returns the address that now occupies the vector.
    fn chain(&mut self, vector: u8, handler: InterruptHandler) -> Result<HandlerAddress>;
}

/// An installed IRQ handler. Dropping it without [`InterruptHook::unhook`] leaves the handler
/// installed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use = "an interrupt hook must be unhooked to restore the original vector"]
pub struct InterruptHook {
    irq: u8,
    vector: u8,
    original: HandlerAddress,
    installed: HandlerAddress,
}

impl InterruptHook {
    /// Save the current vector for `irq`, chain `handler` onto it and unmask the line.
    pub fn hook(
        vectors: &mut dyn VectorTable,
        io: &mut dyn PortIo,
        irq: u8,
        handler: InterruptHandler,
    ) -> Result<Self> {
        let vector = pic::irq_to_vector(irq);
        let original = vectors.get(vector);
        let installed = vectors.chain(vector, handler)?;
        pic::unmask_irq(io, irq);
        debug!(irq, vector, ?original, ?installed, "hooked interrupt");
        Ok(Self {
            irq,
            vector,
            original,
            installed,
        })
    }

    /// Put the original vector back, masking the line first when `disable_irq` is set.
    pub fn unhook(
        self,
        vectors: &mut dyn VectorTable,
        io: &mut dyn PortIo,
        disable_irq: bool,
    ) -> Result<()> {
        if disable_irq {
            pic::mask_irq(io, self.irq);
        }
        vectors.set(self.vector, self.original)?;
        debug!(irq = self.irq, vector = self.vector, "unhooked interrupt");
        Ok(())
    }

    pub fn irq(&self) -> u8 {
        self.irq
    }

    pub fn vector(&self) -> u8 {
        self.vector
    }

    pub fn original(&self) -> HandlerAddress {
        self.original
    }

    pub fn installed(&self) -> HandlerAddress {
        self.installed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{PicModel, SoftVectorTable};

    extern "C" fn noop_handler() {}

    #[test]
    fn hook_then_unhook_restores_vector_and_mask() {
        let pic = PicModel::new();
        let mut bus = pic.bus();
        let mut vectors = SoftVectorTable::new();
        let before = vectors.get(0x0D);

        let hook = InterruptHook::hook(&mut vectors, &mut bus, 5, noop_handler).unwrap();
        assert_eq!(hook.vector(), 0x0D);
        assert_eq!(hook.original(), before);
        assert_eq!(vectors.get(0x0D), hook.installed());
        assert_ne!(hook.installed(), before);
        assert_eq!(pic.master_imr() & (1 << 5), 0);

        hook.unhook(&mut vectors, &mut bus, true).unwrap();
        assert_eq!(vectors.get(0x0D), before);
        assert_ne!(pic.master_imr() & (1 << 5), 0);
    }

    #[test]
    fn unhook_without_disable_leaves_line_open() {
        let pic = PicModel::new();
        let mut bus = pic.bus();
        let mut vectors = SoftVectorTable::new();
        let hook = InterruptHook::hook(&mut vectors, &mut bus, 1, noop_handler).unwrap();
        hook.unhook(&mut vectors, &mut bus, false).unwrap();
        assert_eq!(pic.master_imr() & (1 << 1), 0);
        assert_eq!(vectors.get(0x09), SoftVectorTable::bios_default(0x09));
    }
}
