//! Conventional memory (below 1MB): DOS block allocation, DMA-safe buffers and far pointers.
//!
//! Real-mode services and ISA DMA can only see the first megabyte, while a 32-bit DPMI program's
//! own heap lives far above it. Blocks are allocated through the DPMI DOS-memory service and
//! accessed through [`ConventionalMemory::bytes`] / [`ConventionalMemory::bytes_mut`], which on
//! DJGPP are plain near-pointer views of physical memory.

use tracing::debug;

use crate::{DosError, Result};

/// Bytes per real-mode paragraph.
pub const PARAGRAPH: usize = 16;

/// Top of real-mode addressable memory.
pub const CONVENTIONAL_LIMIT: u32 = 0x10_0000;

/// Linear address of a real-mode `segment:offset`.
pub const fn real_addr(seg: u16, off: u16) -> u32 {
    (seg as u32) * 16 + (off as u32)
}

/// A real-mode far pointer as stored in BIOS structures: segment in the high word, offset in the
/// low word.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FarPtr {
    pub seg: u16,
    pub off: u16,
}

impl FarPtr {
    pub const NULL: FarPtr = FarPtr { seg: 0, off: 0 };

    pub const fn new(seg: u16, off: u16) -> Self {
        Self { seg, off }
    }

    pub const fn from_u32(segoff: u32) -> Self {
        Self {
            seg: (segoff >> 16) as u16,
            off: segoff as u16,
        }
    }

    pub const fn to_u32(self) -> u32 {
        ((self.seg as u32) << 16) | self.off as u32
    }

    pub const fn is_null(self) -> bool {
        self.seg == 0 && self.off == 0
    }

    pub const fn linear(self) -> u32 {
        real_addr(self.seg, self.off)
    }
}

/// A DOS memory block handed out by DPMI function 0100h.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DosBlock {
    pub segment: u16,
    /// Protected-mode selector covering the block.
    pub selector: u16,
    pub paragraphs: u16,
}

impl DosBlock {
    pub const fn physical(&self) -> u32 {
        real_addr(self.segment, 0)
    }

    pub const fn len(&self) -> usize {
        self.paragraphs as usize * PARAGRAPH
    }

    pub const fn is_empty(&self) -> bool {
        self.paragraphs == 0
    }
}

/// DOS memory services plus direct access to the first megabyte.
pub trait ConventionalMemory {
    /// DPMI 0100h. `None` when DOS cannot satisfy the request.
    fn allocate(&mut self, paragraphs: u16) -> Option<DosBlock>;

    /// DPMI 0101h.
    fn free(&mut self, block: &DosBlock);

    fn bytes(&self, addr: u32, len: usize) -> Option<&[u8]>;

    fn bytes_mut(&mut self, addr: u32, len: usize) -> Option<&mut [u8]>;

    fn peek_u8(&self, addr: u32) -> u8 {
        self.bytes(addr, 1).map_or(0, |b| b[0])
    }

    fn peek_u16(&self, addr: u32) -> u16 {
        self.bytes(addr, 2)
            .map_or(0, |b| u16::from_le_bytes([b[0], b[1]]))
    }

    fn peek_u32(&self, addr: u32) -> u32 {
        self.bytes(addr, 4)
            .map_or(0, |b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        let dst = self
            .bytes_mut(addr, data.len())
            .ok_or(DosError::OutOfRange {
                addr,
                len: data.len(),
            })?;
        dst.copy_from_slice(data);
        Ok(())
    }

    fn read(&self, addr: u32, out: &mut [u8]) -> Result<()> {
        let src = self.bytes(addr, out.len()).ok_or(DosError::OutOfRange {
            addr,
            len: out.len(),
        })?;
        out.copy_from_slice(src);
        Ok(())
    }
}

/// Allocate `len` bytes of conventional memory, rounded up to whole paragraphs.
pub fn allocate_conventional(mem: &mut dyn ConventionalMemory, len: usize) -> Result<DosBlock> {
    let paragraphs = len.div_ceil(PARAGRAPH);
    let paragraphs =
        u16::try_from(paragraphs).map_err(|_| DosError::TooLarge { len })?;
    mem.allocate(paragraphs)
        .ok_or(DosError::OutOfConventionalMemory { paragraphs })
}

/// A conventional-memory region that never straddles a 64KB physical page, as required by the
/// ISA DMA controller. Owns the (twice as large) block it was carved from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DmaBuffer {
    block: DosBlock,
    physical: u32,
    len: usize,
}

impl DmaBuffer {
    pub const fn physical(&self) -> u32 {
        self.physical
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub const fn block(&self) -> &DosBlock {
        &self.block
    }

    pub fn bytes_mut<'m>(&self, mem: &'m mut dyn ConventionalMemory) -> Option<&'m mut [u8]> {
        mem.bytes_mut(self.physical, self.len)
    }
}

pub const fn crosses_64k(start: u32, len: usize) -> bool {
    len != 0 && (start >> 16) != ((start + len as u32 - 1) >> 16)
}

/// Allocate `2 * len` bytes and keep whichever half does not cross a 64KB boundary, the first
/// when both are clear.
///
/// Past 32KB both halves can cross; the region then starts on the 64KB boundary inside the
/// block, which always leaves `len` bytes before the block ends.
pub fn allocate_dma(mem: &mut dyn ConventionalMemory, len: usize) -> Result<DmaBuffer> {
    if len == 0 || len > 0x1_0000 {
        return Err(DosError::TooLarge { len });
    }
    let block = allocate_conventional(mem, len * 2)?;
    let start = block.physical();
    let physical = if !crosses_64k(start, len) {
        start
    } else if !crosses_64k(start + len as u32, len) {
        start + len as u32
    } else {
        (start | 0xFFFF) + 1
    };
    debug!(
        segment = block.segment,
        physical,
        len,
        "allocated DMA buffer"
    );
    Ok(DmaBuffer {
        block,
        physical,
        len,
    })
}

/// Release a DMA buffer; the whole backing block goes back to DOS.
pub fn free_dma(mem: &mut dyn ConventionalMemory, buf: DmaBuffer) {
    mem.free(&buf.block);
}

/// Copy of the NUL-terminated string at a far pointer. A null pointer reads as `None`; bytes are
/// taken as Latin-1 since DOS makes no promise about encoding.
pub fn read_far_cstring(mem: &dyn ConventionalMemory, ptr: FarPtr) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let mut out = String::new();
    let mut addr = ptr.linear();
    while addr < CONVENTIONAL_LIMIT {
        match mem.peek_u8(addr) {
            0 => break,
            b => out.push(char::from(b)),
        }
        addr += 1;
    }
    Some(out)
}

pub fn peek_u8(mem: &dyn ConventionalMemory, ptr: FarPtr) -> u8 {
    mem.peek_u8(ptr.linear())
}

pub fn peek_u16(mem: &dyn ConventionalMemory, ptr: FarPtr) -> u16 {
    mem.peek_u16(ptr.linear())
}

pub fn peek_u32(mem: &dyn ConventionalMemory, ptr: FarPtr) -> u32 {
    mem.peek_u32(ptr.linear())
}
