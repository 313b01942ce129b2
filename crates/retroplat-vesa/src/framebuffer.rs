//! Window framebuffer: a system-RAM surface the application draws into, copied to the linear
//! framebuffer on present.
//!
//! Video memory shows every write as soon as it happens and may have an odd pitch, so the
//! application never draws to it directly.

use std::hint;

use retroplat_dos::PortIo;
use retroplat_host::{PixelsMut, Surface};

use crate::modes::VesaMode;
use crate::mouse::Cursor;

/// VGA input status register 1 (colour).
pub const INPUT_STATUS_PORT: u16 = 0x3DA;
pub const VERTICAL_RETRACE: u8 = 0x08;

/// Spin until the retrace bit has been seen `intervals` times.
pub fn wait_for_retrace(io: &mut dyn PortIo, intervals: i32) {
    for _ in 0..intervals {
        while io.inb(INPUT_STATUS_PORT) & VERTICAL_RETRACE == 0 {
            hint::spin_loop();
        }
    }
}

/// The mapped screen memory of `mode` as a pixel view, cut short if the mapping is.
pub fn screen_view<'a>(screen: &'a mut [u8], mode: &VesaMode) -> PixelsMut<'a> {
    let pitch = usize::from(mode.data.pitch);
    let rows = if pitch == 0 { 0 } else { screen.len() / pitch };
    PixelsMut {
        pixels: screen,
        width: u32::from(mode.data.w),
        height: u32::from(mode.data.h).min(rows as u32),
        pitch,
        format: mode.display.format,
    }
}

/// Where a `w` x `h` window lands when centered on a `mode` screen.
///
/// Uses the mode's size, not the view's: a mapping too short for the mode only loses rows.
pub fn centered_origin(mode: &VesaMode, w: u32, h: u32) -> (i32, i32) {
    (
        (i32::from(mode.data.w) - w as i32) / 2,
        (i32::from(mode.data.h) - h as i32) / 2,
    )
}

/// A window framebuffer.
#[derive(Debug)]
pub struct WindowFramebuffer {
    window: u32,
    surface: Surface,
}

impl WindowFramebuffer {
    /// A window-sized surface in the screen's format.
    pub fn new(window: u32, w: u32, h: u32, mode: &VesaMode) -> Self {
        Self {
            window,
            surface: Surface::new(w, h, mode.display.format),
        }
    }

    pub fn window(&self) -> u32 {
        self.window
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut Surface {
        &mut self.surface
    }

    /// Copy the surface to the middle of the `mode` screen and draw `cursor` over it.
    ///
    /// `cursor` carries the pointer position in window coordinates; it is clamped to the window
    /// and the cursor's hot spot is put on it. Rows past the end of `screen` are dropped.
    pub fn present(
        &self,
        screen: &mut PixelsMut<'_>,
        mode: &VesaMode,
        cursor: Option<(&Cursor, (i32, i32))>,
    ) {
        let (w, h) = (self.surface.width(), self.surface.height());
        let (x, y) = centered_origin(mode, w, h);
        self.surface.blit_to(screen, x, y);

        if let Some((cursor, (mx, my))) = cursor {
            let (hot_x, hot_y) = cursor.hot_spot();
            let cx = x + mx.clamp(0, w as i32) - hot_x;
            let cy = y + my.clamp(0, h as i32) - hot_y;
            cursor.surface().blend_to(screen, cx, cy);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::DisplayModeData;
    use crate::testing::{RetraceModel, VbeModeSpec};
    use retroplat_dos::IoPortBus;
    use retroplat_host::PixelFormat;

    fn mode(w: u16, h: u16) -> VesaMode {
        let spec = VbeModeSpec::direct(w, h, 32);
        VesaMode::from_data(DisplayModeData::from_mode_info(0x100, &spec.0)).unwrap()
    }

    #[test]
    fn retrace_wait_counts_intervals() {
        let retrace = RetraceModel::new(3);
        let mut bus = IoPortBus::new();
        retrace.attach(&mut bus);

        wait_for_retrace(&mut bus, 0);
        assert_eq!(retrace.retraces(), 0);
        wait_for_retrace(&mut bus, 2);
        assert_eq!(retrace.retraces(), 2);
    }

    #[test]
    fn present_centers_the_window() {
        let m = mode(8, 6);
        let mut fb = WindowFramebuffer::new(1, 4, 2, &m);
        fb.surface_mut().pixels_mut().fill(0xAA);
        let mut screen = vec![0u8; 8 * 4 * 6];
        let mut view = screen_view(&mut screen, &m);
        fb.present(&mut view, &m, None);

        let row = |y: usize| &screen[y * 32..(y + 1) * 32];
        assert!(row(1).iter().all(|&b| b == 0));
        assert_eq!(&row(2)[..8], &[0; 8]);
        assert!(row(2)[8..24].iter().all(|&b| b == 0xAA));
        assert_eq!(&row(2)[24..], &[0; 8]);
        assert!(row(3)[8..24].iter().all(|&b| b == 0xAA));
        assert!(row(4).iter().all(|&b| b == 0));
    }

    #[test]
    fn cursor_hot_spot_sits_on_the_clamped_pointer() {
        let m = mode(8, 8);
        let fb = WindowFramebuffer::new(1, 4, 4, &m);
        let cursor =
            Cursor::from_argb8888(1, 1, 0xFFFF_FFFFu32.to_le_bytes().to_vec(), 0, 0).unwrap();
        let mut screen = vec![0u8; 8 * 4 * 8];

        // Window origin is (2, 2); a pointer outside the window clamps to (4, 0).
        fb.present(&mut screen_view(&mut screen, &m), &m, Some((&cursor, (100, -5))));
        assert_eq!(at_in(&screen, 6, 2), [0xFF, 0xFF, 0xFF, 0x00]);

        let hot = Cursor::from_argb8888(2, 2, [0xFFu8; 16].to_vec(), 1, 1).unwrap();
        let mut screen = vec![0u8; 8 * 4 * 8];
        fb.present(&mut screen_view(&mut screen, &m), &m, Some((&hot, (1, 1))));
        assert_eq!(at_in(&screen, 2, 2), [0xFF, 0xFF, 0xFF, 0x00]);
        assert_eq!(at_in(&screen, 4, 4), [0; 4]);
    }

    fn at_in(screen: &[u8], x: usize, y: usize) -> [u8; 4] {
        let off = y * 32 + x * 4;
        [screen[off], screen[off + 1], screen[off + 2], screen[off + 3]]
    }

    #[test]
    fn short_mapping_limits_rows() {
        let m = mode(8, 6);
        let mut screen = vec![0u8; 32 * 3];
        let view = screen_view(&mut screen, &m);
        assert_eq!(view.height, 3);
        assert_eq!(view.format, PixelFormat::Xrgb8888);
    }

    #[test]
    fn short_mapping_keeps_the_window_centered_on_the_mode() {
        let m = mode(8, 6);
        assert_eq!(centered_origin(&m, 4, 2), (2, 2));

        let mut fb = WindowFramebuffer::new(1, 4, 2, &m);
        fb.surface_mut().pixels_mut().fill(0xAA);
        let cursor =
            Cursor::from_argb8888(1, 1, 0xFFFF_FFFFu32.to_le_bytes().to_vec(), 0, 0).unwrap();
        // Room for three of the six rows: the window's second row and the cursor are cut off.
        let mut screen = vec![0u8; 32 * 3];
        fb.present(&mut screen_view(&mut screen, &m), &m, Some((&cursor, (0, 1))));

        assert!(screen[..64].iter().all(|&b| b == 0));
        assert_eq!(&screen[64..72], &[0; 8]);
        assert!(screen[72..88].iter().all(|&b| b == 0xAA));
        assert_eq!(&screen[88..], &[0; 8]);
    }
}
