//! VBE controller and mode information blocks, and the BIOS calls that fill them.
//!
//! Both blocks are decoded field by field from their documented byte offsets; nothing relies on
//! struct layout.

use retroplat_dos::{
    allocate_conventional, read_far_cstring, ConventionalMemory, FarPtr, RealModeInterrupts,
    RealModeRegs,
};
use tracing::{debug, warn};

use crate::{Result, VesaError};

pub const VIDEO_INT: u8 = 0x10;

/// AX value of a successful VBE call: AL = 0x4F (function supported), AH = 0 (success).
pub const VBE_OK: u16 = 0x004F;

pub const FN_CONTROLLER_INFO: u16 = 0x4F00;
pub const FN_MODE_INFO: u16 = 0x4F01;
pub const FN_SET_MODE: u16 = 0x4F02;

/// Legacy 80x25 colour text mode (AH = 0, AL = 3).
pub const TEXT_MODE_80X25: u16 = 0x0003;

/// Mode list terminator.
pub const END_OF_MODE_LIST: u16 = 0xFFFF;

/// Upper bound on mode list entries read, for lists a broken BIOS never terminates.
pub const MAX_MODE_LIST: usize = 1024;

fn u16_at(b: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([b[off], b[off + 1]])
}

fn u32_at(b: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([b[off], b[off + 1], b[off + 2], b[off + 3]])
}

fn put_u16(b: &mut [u8], off: usize, v: u16) {
    b[off..off + 2].copy_from_slice(&v.to_le_bytes());
}

fn put_u32(b: &mut [u8], off: usize, v: u32) {
    b[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

/// Function 4F00h result block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VbeControllerInfo {
    pub signature: [u8; 4],
    /// BCD, 0x0200 for 2.0.
    pub version: u16,
    pub oem_string: FarPtr,
    pub capabilities: u32,
    pub video_modes: FarPtr,
    /// In 64KB units.
    pub total_memory: u16,
    pub oem_software_rev: u16,
    pub oem_vendor_name: FarPtr,
    pub oem_product_name: FarPtr,
    pub oem_product_rev: FarPtr,
}

impl VbeControllerInfo {
    pub const SIZE: usize = 512;

    /// Written into the block before the call to ask for the VBE 2.0 layout.
    pub const REQUEST_SIGNATURE: [u8; 4] = *b"VBE2";
    pub const SIGNATURE: [u8; 4] = *b"VESA";

    pub fn decode(b: &[u8]) -> Option<Self> {
        if b.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            signature: [b[0], b[1], b[2], b[3]],
            version: u16_at(b, 4),
            oem_string: FarPtr::from_u32(u32_at(b, 6)),
            capabilities: u32_at(b, 10),
            video_modes: FarPtr::from_u32(u32_at(b, 14)),
            total_memory: u16_at(b, 18),
            oem_software_rev: u16_at(b, 20),
            oem_vendor_name: FarPtr::from_u32(u32_at(b, 22)),
            oem_product_name: FarPtr::from_u32(u32_at(b, 26)),
            oem_product_rev: FarPtr::from_u32(u32_at(b, 30)),
        })
    }

    /// Write the named fields; reserved and OEM scratch areas are left alone.
    pub fn encode(&self, b: &mut [u8]) {
        b[0..4].copy_from_slice(&self.signature);
        put_u16(b, 4, self.version);
        put_u32(b, 6, self.oem_string.to_u32());
        put_u32(b, 10, self.capabilities);
        put_u32(b, 14, self.video_modes.to_u32());
        put_u16(b, 18, self.total_memory);
        put_u16(b, 20, self.oem_software_rev);
        put_u32(b, 22, self.oem_vendor_name.to_u32());
        put_u32(b, 26, self.oem_product_name.to_u32());
        put_u32(b, 30, self.oem_product_rev.to_u32());
    }
}

/// Function 4F01h result block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VbeModeInfo {
    pub attributes: u16,
    pub win_a_attributes: u8,
    pub win_b_attributes: u8,
    pub win_granularity: u16,
    pub win_size: u16,
    pub win_a_segment: u16,
    pub win_b_segment: u16,
    pub win_func: FarPtr,
    pub bytes_per_scan_line: u16,
    pub x_resolution: u16,
    pub y_resolution: u16,
    pub x_char_size: u8,
    pub y_char_size: u8,
    pub number_of_planes: u8,
    pub bits_per_pixel: u8,
    pub number_of_banks: u8,
    pub memory_model: u8,
    pub bank_size: u8,
    pub number_of_image_pages: u8,
    pub red_mask_size: u8,
    pub red_field_position: u8,
    pub green_mask_size: u8,
    pub green_field_position: u8,
    pub blue_mask_size: u8,
    pub blue_field_position: u8,
    pub rsvd_mask_size: u8,
    pub rsvd_field_position: u8,
    pub direct_color_mode_info: u8,
    pub phys_base_ptr: u32,
    pub off_screen_mem_offset: u32,
    pub off_screen_mem_size: u16,
}

impl VbeModeInfo {
    pub const SIZE: usize = 256;

    pub fn decode(b: &[u8]) -> Option<Self> {
        if b.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            attributes: u16_at(b, 0),
            win_a_attributes: b[2],
            win_b_attributes: b[3],
            win_granularity: u16_at(b, 4),
            win_size: u16_at(b, 6),
            win_a_segment: u16_at(b, 8),
            win_b_segment: u16_at(b, 10),
            win_func: FarPtr::from_u32(u32_at(b, 12)),
            bytes_per_scan_line: u16_at(b, 16),
            x_resolution: u16_at(b, 18),
            y_resolution: u16_at(b, 20),
            x_char_size: b[22],
            y_char_size: b[23],
            number_of_planes: b[24],
            bits_per_pixel: b[25],
            number_of_banks: b[26],
            memory_model: b[27],
            bank_size: b[28],
            number_of_image_pages: b[29],
            red_mask_size: b[31],
            red_field_position: b[32],
            green_mask_size: b[33],
            green_field_position: b[34],
            blue_mask_size: b[35],
            blue_field_position: b[36],
            rsvd_mask_size: b[37],
            rsvd_field_position: b[38],
            direct_color_mode_info: b[39],
            phys_base_ptr: u32_at(b, 40),
            off_screen_mem_offset: u32_at(b, 44),
            off_screen_mem_size: u16_at(b, 48),
        })
    }

    pub fn encode(&self, b: &mut [u8]) {
        put_u16(b, 0, self.attributes);
        b[2] = self.win_a_attributes;
        b[3] = self.win_b_attributes;
        put_u16(b, 4, self.win_granularity);
        put_u16(b, 6, self.win_size);
        put_u16(b, 8, self.win_a_segment);
        put_u16(b, 10, self.win_b_segment);
        put_u32(b, 12, self.win_func.to_u32());
        put_u16(b, 16, self.bytes_per_scan_line);
        put_u16(b, 18, self.x_resolution);
        put_u16(b, 20, self.y_resolution);
        b[22] = self.x_char_size;
        b[23] = self.y_char_size;
        b[24] = self.number_of_planes;
        b[25] = self.bits_per_pixel;
        b[26] = self.number_of_banks;
        b[27] = self.memory_model;
        b[28] = self.bank_size;
        b[29] = self.number_of_image_pages;
        b[31] = self.red_mask_size;
        b[32] = self.red_field_position;
        b[33] = self.green_mask_size;
        b[34] = self.green_field_position;
        b[35] = self.blue_mask_size;
        b[36] = self.blue_field_position;
        b[37] = self.rsvd_mask_size;
        b[38] = self.rsvd_field_position;
        b[39] = self.direct_color_mode_info;
        put_u32(b, 40, self.phys_base_ptr);
        put_u32(b, 44, self.off_screen_mem_offset);
        put_u16(b, 48, self.off_screen_mem_size);
    }
}

/// What we keep of the controller block once the scratch buffer is gone.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VesaInfo {
    pub version: u16,
    /// Bytes of video memory.
    pub total_memory: u32,
    pub mode_list: FarPtr,
    pub oem_software_revision: u16,
    pub oem_string: Option<String>,
    pub oem_vendor: Option<String>,
    pub oem_product: Option<String>,
    pub oem_revision: Option<String>,
}

impl VesaInfo {
    pub fn is_vbe2(&self) -> bool {
        self.version >= 0x0200
    }
}

/// Run a VBE function that fills a `len`-byte block at ES:DI, returning the block on success.
fn call_with_block(
    bios: &mut dyn RealModeInterrupts,
    mem: &mut dyn ConventionalMemory,
    len: usize,
    mut regs: RealModeRegs,
    prefill: impl FnOnce(&mut [u8]),
) -> Result<Option<Vec<u8>>> {
    let block = allocate_conventional(mem, len)?;
    let result = (|| -> Result<Option<Vec<u8>>> {
        let addr = block.physical();
        let mut scratch = vec![0u8; len];
        prefill(&mut scratch);
        mem.write(addr, &scratch)?;

        regs.es = block.segment;
        regs.set_di(0);
        bios.int(VIDEO_INT, &mut regs, mem);
        if regs.ax() != VBE_OK {
            debug!(function = format_args!("{:#06x}", regs.ax()), "VBE call failed");
            return Ok(None);
        }
        mem.read(addr, &mut scratch)?;
        Ok(Some(scratch))
    })();
    mem.free(&block);
    result
}

/// VBE function 4F00h.
pub fn query_controller_info(
    bios: &mut dyn RealModeInterrupts,
    mem: &mut dyn ConventionalMemory,
) -> Result<VesaInfo> {
    let block = call_with_block(
        bios,
        mem,
        VbeControllerInfo::SIZE,
        RealModeRegs::with_ax(FN_CONTROLLER_INFO),
        |b| b[..4].copy_from_slice(&VbeControllerInfo::REQUEST_SIGNATURE),
    )?;
    let hw = block
        .as_deref()
        .and_then(VbeControllerInfo::decode)
        .filter(|hw| hw.signature == VbeControllerInfo::SIGNATURE)
        .ok_or(VesaError::NotSupported)?;

    let info = VesaInfo {
        version: hw.version,
        total_memory: u32::from(hw.total_memory) * 64 * 1024,
        mode_list: hw.video_modes,
        oem_software_revision: hw.oem_software_rev,
        oem_string: read_far_cstring(mem, hw.oem_string),
        oem_vendor: read_far_cstring(mem, hw.oem_vendor_name),
        oem_product: read_far_cstring(mem, hw.oem_product_name),
        oem_revision: read_far_cstring(mem, hw.oem_product_rev),
    };
    debug!(
        version = format_args!("{:#06x}", info.version),
        total_memory = info.total_memory,
        oem = ?info.oem_string,
        "VBE controller info"
    );
    Ok(info)
}

/// VBE function 4F01h. `None` when the BIOS rejects the mode.
pub fn query_mode_info(
    bios: &mut dyn RealModeInterrupts,
    mem: &mut dyn ConventionalMemory,
    mode: u16,
) -> Result<Option<VbeModeInfo>> {
    let mut regs = RealModeRegs::with_ax(FN_MODE_INFO);
    regs.set_cx(mode);
    let block = call_with_block(bios, mem, VbeModeInfo::SIZE, regs, |_| {})?;
    Ok(block.as_deref().and_then(VbeModeInfo::decode))
}

/// Mode numbers from the list at `list`, up to the 0xFFFF terminator.
pub fn read_mode_list(mem: &dyn ConventionalMemory, list: FarPtr) -> Vec<u16> {
    let mut modes = Vec::new();
    if list.is_null() {
        return modes;
    }
    let mut addr = list.linear();
    loop {
        let mode = mem.peek_u16(addr);
        if mode == END_OF_MODE_LIST {
            break;
        }
        if modes.len() == MAX_MODE_LIST {
            warn!(list = ?list, "VBE mode list is not terminated");
            break;
        }
        modes.push(mode);
        addr += 2;
    }
    modes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{VbeBiosModel, VbeModeSpec};
    use retroplat_dos::testing::ConventionalArena;

    #[test]
    fn controller_block_offsets() {
        let info = VbeControllerInfo {
            signature: VbeControllerInfo::SIGNATURE,
            version: 0x0300,
            oem_string: FarPtr::new(0xC000, 0x0010),
            capabilities: 1,
            video_modes: FarPtr::new(0xC000, 0x0100),
            total_memory: 64,
            oem_software_rev: 0x0102,
            oem_vendor_name: FarPtr::new(0xC000, 0x20),
            oem_product_name: FarPtr::new(0xC000, 0x30),
            oem_product_rev: FarPtr::new(0xC000, 0x40),
        };
        let mut b = [0u8; VbeControllerInfo::SIZE];
        info.encode(&mut b);
        assert_eq!(&b[0..4], b"VESA");
        assert_eq!(&b[4..6], &[0x00, 0x03]);
        assert_eq!(&b[6..10], &[0x10, 0x00, 0x00, 0xC0]);
        assert_eq!(&b[14..18], &[0x00, 0x01, 0x00, 0xC0]);
        assert_eq!(&b[18..20], &[64, 0]);
        assert_eq!(VbeControllerInfo::decode(&b), Some(info));
        assert!(VbeControllerInfo::decode(&b[..100]).is_none());
    }

    #[test]
    fn mode_block_offsets() {
        let mut b = [0u8; VbeModeInfo::SIZE];
        b[0] = 0x9B;
        b[16..18].copy_from_slice(&1280u16.to_le_bytes());
        b[18..20].copy_from_slice(&640u16.to_le_bytes());
        b[20..22].copy_from_slice(&480u16.to_le_bytes());
        b[24] = 1;
        b[25] = 16;
        b[27] = 6;
        b[31..37].copy_from_slice(&[5, 11, 6, 5, 5, 0]);
        b[40..44].copy_from_slice(&0xE000_0000u32.to_le_bytes());

        let m = VbeModeInfo::decode(&b).unwrap();
        assert_eq!(m.attributes, 0x9B);
        assert_eq!(m.bytes_per_scan_line, 1280);
        assert_eq!((m.x_resolution, m.y_resolution), (640, 480));
        assert_eq!((m.number_of_planes, m.bits_per_pixel, m.memory_model), (1, 16, 6));
        assert_eq!((m.red_mask_size, m.red_field_position), (5, 11));
        assert_eq!((m.green_mask_size, m.green_field_position), (6, 5));
        assert_eq!((m.blue_mask_size, m.blue_field_position), (5, 0));
        assert_eq!(m.phys_base_ptr, 0xE000_0000);

        let mut again = [0u8; VbeModeInfo::SIZE];
        m.encode(&mut again);
        assert_eq!(again, b);
    }

    #[test]
    fn controller_info_reads_oem_strings_and_frees_scratch() {
        let bios = VbeBiosModel::new(0x0300, 16);
        let mut mem = ConventionalArena::new();
        let ledger = mem.ledger();
        let mut b = bios.clone();
        let info = query_controller_info(&mut b, &mut mem).unwrap();

        assert_eq!(info.version, 0x0300);
        assert!(info.is_vbe2());
        assert_eq!(info.total_memory, 16 * 64 * 1024);
        assert_eq!(info.oem_string.as_deref(), Some("Retro VGA BIOS"));
        assert_eq!(info.oem_vendor.as_deref(), Some("Retro Vendor"));
        assert_eq!(info.oem_product, None);
        assert_eq!(ledger.live_blocks(), 0);
        assert_eq!(bios.request_signature(), Some(*b"VBE2"));
    }

    #[test]
    fn missing_vbe_is_not_supported() {
        let bios = VbeBiosModel::absent();
        let mut mem = ConventionalArena::new();
        let mut b = bios.clone();
        assert!(matches!(
            query_controller_info(&mut b, &mut mem),
            Err(VesaError::NotSupported)
        ));
        assert_eq!(mem.live_blocks(), 0);
    }

    #[test]
    fn mode_list_and_mode_info() {
        let bios = VbeBiosModel::new(0x0200, 16);
        bios.add_mode(0x111, VbeModeSpec::direct(640, 480, 16));
        bios.add_mode(0x112, VbeModeSpec::direct(640, 480, 32));
        let mut mem = ConventionalArena::new();
        let mut b = bios.clone();
        let info = query_controller_info(&mut b, &mut mem).unwrap();

        assert_eq!(read_mode_list(&mem, info.mode_list), vec![0x111, 0x112]);
        let m = query_mode_info(&mut b, &mut mem, 0x112).unwrap().unwrap();
        assert_eq!(m.bits_per_pixel, 32);
        assert!(query_mode_info(&mut b, &mut mem, 0x200).unwrap().is_none());
        assert_eq!(mem.live_blocks(), 0);
    }

    #[test]
    fn null_mode_list_is_empty() {
        let mem = ConventionalArena::new();
        assert!(read_mode_list(&mem, FarPtr::NULL).is_empty());
    }
}
