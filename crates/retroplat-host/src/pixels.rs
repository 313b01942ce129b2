//! Packed pixel formats.
//!
//! Every format here is described by a little-endian integer of `bytes_per_pixel` bytes and four
//! channel masks, which is also how VBE direct-color modes describe themselves.

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    #[default]
    Unknown,
    Xrgb1555,
    Xbgr1555,
    Rgb565,
    Bgr565,
    /// Bytes R, G, B in memory.
    Rgb24,
    /// Bytes B, G, R in memory.
    Bgr24,
    Xrgb8888,
    Xbgr8888,
    Argb8888,
    Abgr8888,
    Rgba8888,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Masks {
    pub bits_per_pixel: u8,
    pub r: u32,
    pub g: u32,
    pub b: u32,
    pub a: u32,
}

const KNOWN: [PixelFormat; 11] = [
    PixelFormat::Xrgb1555,
    PixelFormat::Xbgr1555,
    PixelFormat::Rgb565,
    PixelFormat::Bgr565,
    PixelFormat::Rgb24,
    PixelFormat::Bgr24,
    PixelFormat::Xrgb8888,
    PixelFormat::Xbgr8888,
    PixelFormat::Argb8888,
    PixelFormat::Abgr8888,
    PixelFormat::Rgba8888,
];

impl PixelFormat {
    pub const fn masks(self) -> Option<Masks> {
        let (bits_per_pixel, r, g, b, a) = match self {
            Self::Unknown => return None,
            Self::Xrgb1555 => (15, 0x7C00, 0x03E0, 0x001F, 0),
            Self::Xbgr1555 => (15, 0x001F, 0x03E0, 0x7C00, 0),
            Self::Rgb565 => (16, 0xF800, 0x07E0, 0x001F, 0),
            Self::Bgr565 => (16, 0x001F, 0x07E0, 0xF800, 0),
            Self::Rgb24 => (24, 0x0000_00FF, 0x0000_FF00, 0x00FF_0000, 0),
            Self::Bgr24 => (24, 0x00FF_0000, 0x0000_FF00, 0x0000_00FF, 0),
            Self::Xrgb8888 => (32, 0x00FF_0000, 0x0000_FF00, 0x0000_00FF, 0),
            Self::Xbgr8888 => (32, 0x0000_00FF, 0x0000_FF00, 0x00FF_0000, 0),
            Self::Argb8888 => (32, 0x00FF_0000, 0x0000_FF00, 0x0000_00FF, 0xFF00_0000),
            Self::Abgr8888 => (32, 0x0000_00FF, 0x0000_FF00, 0x00FF_0000, 0xFF00_0000),
            Self::Rgba8888 => (32, 0xFF00_0000, 0x00FF_0000, 0x0000_FF00, 0x0000_00FF),
        };
        Some(Masks {
            bits_per_pixel,
            r,
            g,
            b,
            a,
        })
    }

    /// Format matching a depth and channel masks. A 16bpp request with 15 significant bits is
    /// treated as 15bpp.
    pub fn from_masks(bits_per_pixel: u8, r: u32, g: u32, b: u32, a: u32) -> Self {
        let bpp = if bits_per_pixel == 16 && (r | g | b | a).count_ones() == 15 {
            15
        } else {
            bits_per_pixel
        };
        KNOWN
            .into_iter()
            .find(|f| {
                f.masks() == Some(Masks {
                    bits_per_pixel: bpp,
                    r,
                    g,
                    b,
                    a,
                })
            })
            .unwrap_or(Self::Unknown)
    }

    pub const fn bits_per_pixel(self) -> u8 {
        match self.masks() {
            Some(m) => m.bits_per_pixel,
            None => 0,
        }
    }

    pub const fn bytes_per_pixel(self) -> usize {
        match self.bits_per_pixel() {
            15 | 16 => 2,
            24 => 3,
            32 => 4,
            _ => 0,
        }
    }

    pub const fn has_alpha(self) -> bool {
        match self.masks() {
            Some(m) => m.a != 0,
            None => false,
        }
    }

    /// Unpack one pixel to `[r, g, b, a]`. Formats without alpha read as opaque.
    pub fn decode(self, src: &[u8]) -> [u8; 4] {
        let Some(m) = self.masks() else {
            return [0, 0, 0, 0];
        };
        let raw = load_le(&src[..self.bytes_per_pixel()]);
        [
            extract(raw, m.r),
            extract(raw, m.g),
            extract(raw, m.b),
            if m.a == 0 { 0xFF } else { extract(raw, m.a) },
        ]
    }

    pub fn encode(self, rgba: [u8; 4], dst: &mut [u8]) {
        let Some(m) = self.masks() else {
            return;
        };
        let raw =
            insert(rgba[0], m.r) | insert(rgba[1], m.g) | insert(rgba[2], m.b) | insert(rgba[3], m.a);
        store_le(raw, &mut dst[..self.bytes_per_pixel()]);
    }
}

fn load_le(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .rev()
        .fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
}

fn store_le(value: u32, out: &mut [u8]) {
    for (i, b) in out.iter_mut().enumerate() {
        *b = (value >> (8 * i)) as u8;
    }
}

fn extract(raw: u32, mask: u32) -> u8 {
    if mask == 0 {
        return 0;
    }
    let shift = mask.trailing_zeros();
    let max = mask >> shift;
    let v = (raw & mask) >> shift;
    ((v * 255 + max / 2) / max) as u8
}

fn insert(c: u8, mask: u32) -> u32 {
    if mask == 0 {
        return 0;
    }
    let shift = mask.trailing_zeros();
    let max = mask >> shift;
    ((u32::from(c) * max + 127) / 255) << shift
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_identify_formats() {
        assert_eq!(
            PixelFormat::from_masks(16, 0xF800, 0x07E0, 0x001F, 0),
            PixelFormat::Rgb565
        );
        assert_eq!(
            PixelFormat::from_masks(16, 0x7C00, 0x03E0, 0x001F, 0),
            PixelFormat::Xrgb1555
        );
        assert_eq!(
            PixelFormat::from_masks(15, 0x7C00, 0x03E0, 0x001F, 0),
            PixelFormat::Xrgb1555
        );
        assert_eq!(
            PixelFormat::from_masks(32, 0xFF_0000, 0xFF00, 0xFF, 0),
            PixelFormat::Xrgb8888
        );
        assert_eq!(
            PixelFormat::from_masks(24, 0xFF_0000, 0xFF00, 0xFF, 0),
            PixelFormat::Bgr24
        );
        assert_eq!(
            PixelFormat::from_masks(32, 0x1, 0x2, 0x4, 0),
            PixelFormat::Unknown
        );
    }

    #[test]
    fn decode_expands_narrow_channels() {
        // Pure red in RGB565.
        assert_eq!(PixelFormat::Rgb565.decode(&[0x00, 0xF8]), [255, 0, 0, 255]);
        // Argb8888 stored little-endian: B, G, R, A.
        assert_eq!(
            PixelFormat::Argb8888.decode(&[0x10, 0x20, 0x30, 0x80]),
            [0x30, 0x20, 0x10, 0x80]
        );
        assert_eq!(PixelFormat::Rgb24.decode(&[1, 2, 3]), [1, 2, 3, 255]);
        assert_eq!(PixelFormat::Bgr24.decode(&[1, 2, 3]), [3, 2, 1, 255]);
    }

    #[test]
    fn encode_packs_into_memory_order() {
        let mut px = [0u8; 4];
        PixelFormat::Abgr8888.encode([1, 2, 3, 4], &mut px);
        assert_eq!(px, [1, 2, 3, 4]);

        let mut px = [0u8; 2];
        PixelFormat::Rgb565.encode([0, 0, 255, 255], &mut px);
        assert_eq!(px, [0x1F, 0x00]);
    }

    #[test]
    fn bytes_per_pixel() {
        assert_eq!(PixelFormat::Xrgb1555.bytes_per_pixel(), 2);
        assert_eq!(PixelFormat::Rgb24.bytes_per_pixel(), 3);
        assert_eq!(PixelFormat::Rgba8888.bytes_per_pixel(), 4);
        assert_eq!(PixelFormat::Unknown.bytes_per_pixel(), 0);
    }
}
