//! DPMI physical address mapping (0800h / 0801h), used for linear framebuffers.

use crate::Result;

/// A physical range mapped into the program's address space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MappedRegion {
    pub physical: u32,
    pub linear: u32,
    pub len: u32,
}

pub trait PhysicalMapper {
    fn map(&mut self, physical: u32, len: u32) -> Result<MappedRegion>;

    fn unmap(&mut self, region: &MappedRegion);

    /// Near-pointer view of a mapped region.
    fn view_mut(&mut self, region: &MappedRegion) -> Option<&mut [u8]>;
}
