//! Software surfaces and the blitters the video backends need.

use crate::pixels::PixelFormat;
use crate::video::Rect;

/// An owned, row-padded pixel buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Surface {
    width: u32,
    height: u32,
    pitch: usize,
    format: PixelFormat,
    pixels: Vec<u8>,
}

impl Surface {
    /// A zero-filled surface. Rows are padded to 4 bytes.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let row = width as usize * format.bytes_per_pixel();
        let pitch = (row + 3) & !3;
        Self {
            width,
            height,
            pitch,
            format,
            pixels: vec![0; pitch * height as usize],
        }
    }

    /// Wrap existing pixel data, e.g. a cursor image supplied by the application.
    pub fn from_pixels(
        width: u32,
        height: u32,
        pitch: usize,
        format: PixelFormat,
        pixels: Vec<u8>,
    ) -> Option<Self> {
        let row = width as usize * format.bytes_per_pixel();
        if pitch < row || pixels.len() < pitch * height as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            pitch,
            format,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pitch(&self) -> usize {
        self.pitch
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.pitch;
        &self.pixels[start..start + self.width as usize * self.format.bytes_per_pixel()]
    }

    pub fn view_mut(&mut self) -> PixelsMut<'_> {
        PixelsMut {
            pixels: &mut self.pixels,
            width: self.width,
            height: self.height,
            pitch: self.pitch,
            format: self.format,
        }
    }

    /// Copy `src` with its top-left corner at (`x`, `y`) on `dst`, clipped to both surfaces and
    /// converting formats when they differ.
    pub fn blit_to(&self, dst: &mut PixelsMut<'_>, x: i32, y: i32) {
        self.blit_impl(dst, x, y, false);
    }

    /// Like [`Self::blit_to`], but alpha-blends source pixels over the destination.
    pub fn blend_to(&self, dst: &mut PixelsMut<'_>, x: i32, y: i32) {
        self.blit_impl(dst, x, y, true);
    }

    fn blit_impl(&self, dst: &mut PixelsMut<'_>, x: i32, y: i32, blend: bool) {
        let Some(clip) = clip_rect(self.width, self.height, dst.width, dst.height, x, y) else {
            return;
        };
        let sbpp = self.format.bytes_per_pixel();
        let dbpp = dst.format.bytes_per_pixel();
        if sbpp == 0 || dbpp == 0 {
            return;
        }
        let fast = !blend && self.format == dst.format;
        for row in 0..clip.h as usize {
            let sy = clip.y as usize + row;
            let dy = (clip.y + y) as usize + row;
            let s_off = sy * self.pitch + clip.x as usize * sbpp;
            let d_off = dy * dst.pitch + (clip.x + x) as usize * dbpp;
            if fast {
                let n = clip.w as usize * sbpp;
                dst.pixels[d_off..d_off + n].copy_from_slice(&self.pixels[s_off..s_off + n]);
                continue;
            }
            for col in 0..clip.w as usize {
                let sp = &self.pixels[s_off + col * sbpp..];
                let dp = &mut dst.pixels[d_off + col * dbpp..];
                let src = self.format.decode(sp);
                let out = if blend {
                    blend_over(src, dst.format.decode(dp))
                } else {
                    src
                };
                dst.format.encode(out, dp);
            }
        }
    }
}

/// A mutable view of pixel memory owned elsewhere (a surface, or a mapped linear framebuffer).
pub struct PixelsMut<'a> {
    pub pixels: &'a mut [u8],
    pub width: u32,
    pub height: u32,
    pub pitch: usize,
    pub format: PixelFormat,
}

impl PixelsMut<'_> {
    pub fn fill(&mut self, value: u8) {
        let rows = self.height as usize * self.pitch;
        let end = rows.min(self.pixels.len());
        self.pixels[..end].fill(value);
    }
}

/// Source-space rectangle of `src` that lands inside `dst` when drawn at (`x`, `y`).
fn clip_rect(sw: u32, sh: u32, dw: u32, dh: u32, x: i32, y: i32) -> Option<Rect> {
    let x0 = (-x).max(0);
    let y0 = (-y).max(0);
    let x1 = (sw as i32).min(dw as i32 - x);
    let y1 = (sh as i32).min(dh as i32 - y);
    (x1 > x0 && y1 > y0).then_some(Rect {
        x: x0,
        y: y0,
        w: x1 - x0,
        h: y1 - y0,
    })
}

fn blend_over(src: [u8; 4], dst: [u8; 4]) -> [u8; 4] {
    let a = u32::from(src[3]);
    let inv = 255 - a;
    let mix = |s: u8, d: u8| ((u32::from(s) * a + u32::from(d) * inv + 127) / 255) as u8;
    [
        mix(src[0], dst[0]),
        mix(src[1], dst[1]),
        mix(src[2], dst[2]),
        (a + (u32::from(dst[3]) * inv + 127) / 255) as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_is_padded_to_four_bytes() {
        let s = Surface::new(3, 2, PixelFormat::Rgb24);
        assert_eq!(s.pitch(), 12);
        assert_eq!(s.pixels().len(), 24);
        let s = Surface::new(3, 2, PixelFormat::Rgb565);
        assert_eq!(s.pitch(), 8);
    }

    #[test]
    fn same_format_blit_is_clipped_copy() {
        let mut src = Surface::new(2, 2, PixelFormat::Xrgb8888);
        src.pixels_mut().fill(0xAB);
        let mut dst = Surface::new(3, 3, PixelFormat::Xrgb8888);
        src.blit_to(&mut dst.view_mut(), 2, 2);
        assert_eq!(dst.row(2)[8..12], [0xAB; 4]);
        assert_eq!(dst.row(1), &[0u8; 12][..]);
        assert_eq!(dst.row(2)[..8], [0u8; 8]);
    }

    #[test]
    fn blit_entirely_outside_is_noop() {
        let src = Surface::new(2, 2, PixelFormat::Xrgb8888);
        let mut dst = Surface::new(2, 2, PixelFormat::Xrgb8888);
        dst.pixels_mut().fill(1);
        src.blit_to(&mut dst.view_mut(), 5, -7);
        assert!(dst.pixels().iter().all(|&b| b == 1));
    }

    #[test]
    fn blend_respects_alpha() {
        let mut cursor = Surface::new(2, 1, PixelFormat::Argb8888);
        // Opaque white, then fully transparent.
        cursor
            .pixels_mut()
            .copy_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00]);
        let mut dst = Surface::new(2, 1, PixelFormat::Rgb565);
        cursor.blend_to(&mut dst.view_mut(), 0, 0);
        assert_eq!(dst.row(0), &[0xFF, 0xFF, 0x00, 0x00][..]);
    }

    #[test]
    fn converting_blit() {
        let mut src = Surface::new(1, 1, PixelFormat::Abgr8888);
        src.pixels_mut().copy_from_slice(&[0xFF, 0x00, 0x00, 0xFF]);
        let mut dst = Surface::new(1, 1, PixelFormat::Rgb565);
        src.blit_to(&mut dst.view_mut(), 0, 0);
        assert_eq!(dst.row(0), &[0x00, 0xF8][..]);
    }
}
