//! Which VBE modes we can use, and what pixel format they have.

use bitflags::bitflags;
use retroplat_host::{DisplayMode, PixelFormat};

use crate::info::VbeModeInfo;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ModeAttributes: u16 {
        const SUPPORTED = 1 << 0;
        const TTY_OUTPUT = 1 << 2;
        const COLOR = 1 << 3;
        const GRAPHICS = 1 << 4;
        const NOT_VGA_COMPATIBLE = 1 << 5;
        const NO_WINDOWED_MEMORY = 1 << 6;
        const LINEAR_FRAMEBUFFER = 1 << 7;

        /// Everything a mode needs before we consider it.
        const REQUIRED = Self::SUPPORTED.bits()
            | Self::COLOR.bits()
            | Self::GRAPHICS.bits()
            | Self::LINEAR_FRAMEBUFFER.bits();
    }
}

pub const MEMORY_MODEL_PACKED: u8 = 4;
pub const MEMORY_MODEL_DIRECT: u8 = 6;

/// Set in the mode number passed to function 4F02h to ask for the linear framebuffer.
pub const LINEAR_FRAMEBUFFER_FLAG: u16 = 0x4000;

/// The parts of a mode block kept for each listed mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DisplayModeData {
    pub mode_id: u16,
    pub attributes: ModeAttributes,
    pub pitch: u16,
    pub w: u16,
    pub h: u16,
    pub num_planes: u8,
    pub bpp: u8,
    pub memory_model: u8,
    pub num_image_pages: u8,
    pub red_mask_size: u8,
    pub red_mask_pos: u8,
    pub green_mask_size: u8,
    pub green_mask_pos: u8,
    pub blue_mask_size: u8,
    pub blue_mask_pos: u8,
    pub physical_base_addr: u32,
}

fn mask(size: u8, pos: u8) -> u32 {
    let bits = (1u64 << size.min(32)) - 1;
    (bits << pos.min(63)) as u32
}

impl DisplayModeData {
    pub fn from_mode_info(mode_id: u16, info: &VbeModeInfo) -> Self {
        Self {
            mode_id,
            attributes: ModeAttributes::from_bits_retain(info.attributes),
            pitch: info.bytes_per_scan_line,
            w: info.x_resolution,
            h: info.y_resolution,
            num_planes: info.number_of_planes,
            bpp: info.bits_per_pixel,
            memory_model: info.memory_model,
            num_image_pages: info.number_of_image_pages,
            red_mask_size: info.red_mask_size,
            red_mask_pos: info.red_field_position,
            green_mask_size: info.green_mask_size,
            green_mask_pos: info.green_field_position,
            blue_mask_size: info.blue_mask_size,
            blue_mask_pos: info.blue_field_position,
            physical_base_addr: info.phys_base_ptr,
        }
    }

    /// Hardware-supported, colour, graphics, linear framebuffer, single plane, at least 15bpp,
    /// nonzero size and packed or direct-colour memory.
    pub fn is_usable(&self) -> bool {
        self.attributes.contains(ModeAttributes::REQUIRED)
            && self.num_planes == 1
            && self.bpp >= 15
            && self.w != 0
            && self.h != 0
            && matches!(
                self.memory_model,
                MEMORY_MODEL_PACKED | MEMORY_MODEL_DIRECT
            )
    }

    pub fn pixel_format(&self) -> PixelFormat {
        match self.memory_model {
            MEMORY_MODEL_PACKED => match self.bpp {
                15 => PixelFormat::Xrgb1555,
                16 => PixelFormat::Rgb565,
                24 => PixelFormat::Rgb24,
                32 => PixelFormat::Xrgb8888,
                _ => PixelFormat::Unknown,
            },
            MEMORY_MODEL_DIRECT => PixelFormat::from_masks(
                self.bpp,
                mask(self.red_mask_size, self.red_mask_pos),
                mask(self.green_mask_size, self.green_mask_pos),
                mask(self.blue_mask_size, self.blue_mask_pos),
                0,
            ),
            _ => PixelFormat::Unknown,
        }
    }

    /// Bytes of video memory one screen covers.
    pub fn screen_bytes(&self) -> usize {
        usize::from(self.h) * usize::from(self.pitch)
    }
}

/// A listed display mode and the VBE details behind it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VesaMode {
    pub display: DisplayMode,
    pub data: DisplayModeData,
}

impl VesaMode {
    /// `None` for modes we cannot drive.
    pub fn from_data(data: DisplayModeData) -> Option<Self> {
        if !data.is_usable() {
            return None;
        }
        let format = data.pixel_format();
        if format == PixelFormat::Unknown {
            return None;
        }
        Some(Self {
            display: DisplayMode::new(format, i32::from(data.w), i32::from(data.h)),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usable(bpp: u8, model: u8) -> DisplayModeData {
        DisplayModeData {
            mode_id: 0x111,
            attributes: ModeAttributes::REQUIRED,
            pitch: 640 * 2,
            w: 640,
            h: 480,
            num_planes: 1,
            bpp,
            memory_model: model,
            ..Default::default()
        }
    }

    #[test]
    fn required_attributes_are_0x99() {
        assert_eq!(ModeAttributes::REQUIRED.bits(), 0x99);
    }

    #[test]
    fn filter_rejects_each_missing_requirement() {
        assert!(usable(16, MEMORY_MODEL_PACKED).is_usable());

        let mut m = usable(16, MEMORY_MODEL_PACKED);
        m.attributes.remove(ModeAttributes::LINEAR_FRAMEBUFFER);
        assert!(!m.is_usable());

        let mut m = usable(16, MEMORY_MODEL_PACKED);
        m.num_planes = 4;
        assert!(!m.is_usable());

        assert!(!usable(8, MEMORY_MODEL_PACKED).is_usable());

        let mut m = usable(16, MEMORY_MODEL_PACKED);
        m.h = 0;
        assert!(!m.is_usable());

        assert!(!usable(16, 3).is_usable());
    }

    #[test]
    fn packed_formats_follow_depth() {
        assert_eq!(usable(15, 4).pixel_format(), PixelFormat::Xrgb1555);
        assert_eq!(usable(16, 4).pixel_format(), PixelFormat::Rgb565);
        assert_eq!(usable(24, 4).pixel_format(), PixelFormat::Rgb24);
        assert_eq!(usable(32, 4).pixel_format(), PixelFormat::Xrgb8888);
    }

    #[test]
    fn direct_color_formats_come_from_masks() {
        let mut m = usable(16, MEMORY_MODEL_DIRECT);
        (m.red_mask_size, m.red_mask_pos) = (5, 11);
        (m.green_mask_size, m.green_mask_pos) = (6, 5);
        (m.blue_mask_size, m.blue_mask_pos) = (5, 0);
        assert_eq!(m.pixel_format(), PixelFormat::Rgb565);

        // 5:5:5 reported as 16bpp.
        (m.red_mask_size, m.red_mask_pos) = (5, 10);
        (m.green_mask_size, m.green_mask_pos) = (5, 5);
        assert_eq!(m.pixel_format(), PixelFormat::Xrgb1555);

        let mut m = usable(32, MEMORY_MODEL_DIRECT);
        (m.red_mask_size, m.red_mask_pos) = (8, 16);
        (m.green_mask_size, m.green_mask_pos) = (8, 8);
        (m.blue_mask_size, m.blue_mask_pos) = (8, 0);
        assert_eq!(m.pixel_format(), PixelFormat::Xrgb8888);

        (m.red_mask_size, m.red_mask_pos) = (8, 0);
        (m.blue_mask_size, m.blue_mask_pos) = (8, 16);
        assert_eq!(m.pixel_format(), PixelFormat::Xbgr8888);
    }

    #[test]
    fn unknown_direct_layout_is_not_listed() {
        let mut m = usable(32, MEMORY_MODEL_DIRECT);
        (m.red_mask_size, m.red_mask_pos) = (10, 20);
        (m.green_mask_size, m.green_mask_pos) = (10, 10);
        (m.blue_mask_size, m.blue_mask_pos) = (10, 0);
        assert_eq!(m.pixel_format(), PixelFormat::Unknown);
        assert!(VesaMode::from_data(m).is_none());

        let mode = VesaMode::from_data(usable(16, MEMORY_MODEL_PACKED)).unwrap();
        assert_eq!(mode.display.w, 640);
        assert_eq!(mode.display.format, PixelFormat::Rgb565);
    }
}
