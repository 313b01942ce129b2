//! INT 33h mouse driver access and the software cursor.

use retroplat_dos::{ConventionalMemory, RealModeInterrupts, RealModeRegs};
use retroplat_host::{Event, EventSink, MouseButton, MouseButtons, PixelFormat, Surface};
use tracing::debug;

use crate::{Result, VesaError};

pub const MOUSE_INT: u8 = 0x33;

const FN_RESET: u16 = 0x00;
const FN_STATUS: u16 = 0x03;
const FN_WARP: u16 = 0x04;
const FN_X_RANGE: u16 = 0x07;
const FN_Y_RANGE: u16 = 0x08;
const FN_MOTION: u16 = 0x0B;

/// Motion counter units per screen pixel in relative mode.
pub const MICKEYS_PER_PIXEL: f32 = 4.0;

/// Function 03h button bits, in the order their events are sent.
const BUTTON_BITS: [(u16, MouseButton); 3] = [
    (1 << 0, MouseButton::Left),
    (1 << 1, MouseButton::Right),
    (1 << 2, MouseButton::Middle),
];

fn call(
    bios: &mut dyn RealModeInterrupts,
    mem: &mut dyn ConventionalMemory,
    mut regs: RealModeRegs,
) -> RealModeRegs {
    bios.int(MOUSE_INT, &mut regs, mem);
    regs
}

/// An ARGB8888 cursor image and its hot spot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cursor {
    surface: Surface,
    hot_x: i32,
    hot_y: i32,
}

#[rustfmt::skip]
const ARROW: [&str; 19] = [
    "X           ",
    "XX          ",
    "X.X         ",
    "X..X        ",
    "X...X       ",
    "X....X      ",
    "X.....X     ",
    "X......X    ",
    "X.......X   ",
    "X........X  ",
    "X.........X ",
    "X......XXXXX",
    "X...X..X    ",
    "X..XX..X    ",
    "X.X  X..X   ",
    "XX   X..X   ",
    "X     X..X  ",
    "      X..X  ",
    "       XX   ",
];

impl Cursor {
    /// Black-outlined white arrow, hot spot at the tip.
    pub fn arrow() -> Self {
        let (w, h) = (ARROW[0].len() as u32, ARROW.len() as u32);
        let mut surface = Surface::new(w, h, PixelFormat::Argb8888);
        let pitch = surface.pitch();
        let pixels = surface.pixels_mut();
        for (y, row) in ARROW.iter().enumerate() {
            for (x, c) in row.bytes().enumerate() {
                let argb: u32 = match c {
                    b'X' => 0xFF00_0000,
                    b'.' => 0xFFFF_FFFF,
                    _ => 0,
                };
                let off = y * pitch + x * 4;
                pixels[off..off + 4].copy_from_slice(&argb.to_le_bytes());
            }
        }
        Self {
            surface,
            hot_x: 0,
            hot_y: 0,
        }
    }

    /// Tightly packed ARGB8888 pixels, `w * h * 4` bytes.
    pub fn from_argb8888(
        w: u32,
        h: u32,
        pixels: Vec<u8>,
        hot_x: i32,
        hot_y: i32,
    ) -> Result<Self> {
        let pitch = w as usize * 4;
        if pixels.len() != pitch * h as usize {
            return Err(VesaError::InvalidCursor { w, h });
        }
        let surface = Surface::from_pixels(w, h, pitch, PixelFormat::Argb8888, pixels)
            .ok_or(VesaError::InvalidCursor { w, h })?;
        Ok(Self {
            surface,
            hot_x,
            hot_y,
        })
    }

    /// Convert any surface to a cursor.
    pub fn from_surface(src: &Surface, hot_x: i32, hot_y: i32) -> Self {
        let mut surface = Surface::new(src.width(), src.height(), PixelFormat::Argb8888);
        src.blit_to(&mut surface.view_mut(), 0, 0);
        Self {
            surface,
            hot_x,
            hot_y,
        }
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn hot_spot(&self) -> (i32, i32) {
        (self.hot_x, self.hot_y)
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::arrow()
    }
}

/// State of the INT 33h driver as seen by the event pump.
#[derive(Debug)]
pub struct Mouse {
    present: bool,
    relative: bool,
    visible: bool,
    cursor: Cursor,
    buttons: MouseButtons,
    x: i32,
    y: i32,
}

impl Default for Mouse {
    fn default() -> Self {
        Self {
            present: false,
            relative: false,
            visible: true,
            cursor: Cursor::arrow(),
            buttons: MouseButtons::empty(),
            x: 0,
            y: 0,
        }
    }
}

impl Mouse {
    /// Reset the driver (function 00h). AX comes back nonzero when one is installed.
    pub fn detect(bios: &mut dyn RealModeInterrupts, mem: &mut dyn ConventionalMemory) -> Self {
        let regs = call(bios, mem, RealModeRegs::with_ax(FN_RESET));
        let present = regs.ax() != 0;
        debug!(present, buttons = regs.bx(), "mouse driver");
        Self {
            present,
            ..Self::default()
        }
    }

    pub fn is_present(&self) -> bool {
        self.present
    }

    /// Forget the driver; later calls do nothing.
    pub fn quit(&mut self) {
        self.present = false;
        self.buttons = MouseButtons::empty();
    }

    /// Clamp the pointer to `0..=w` x `0..=h` (functions 07h and 08h).
    pub fn set_range(
        &self,
        bios: &mut dyn RealModeInterrupts,
        mem: &mut dyn ConventionalMemory,
        w: u16,
        h: u16,
    ) {
        if !self.present {
            return;
        }
        for (function, max) in [(FN_X_RANGE, w), (FN_Y_RANGE, h)] {
            let mut regs = RealModeRegs::with_ax(function);
            regs.set_cx(0);
            regs.set_dx(max);
            call(bios, mem, regs);
        }
    }

    pub fn is_relative(&self) -> bool {
        self.relative
    }

    /// Switch between absolute positions and motion counters. Entering relative mode discards
    /// motion counted so far.
    pub fn set_relative(
        &mut self,
        bios: &mut dyn RealModeInterrupts,
        mem: &mut dyn ConventionalMemory,
        relative: bool,
    ) {
        if relative && !self.relative && self.present {
            call(bios, mem, RealModeRegs::with_ax(FN_MOTION));
        }
        self.relative = relative;
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    pub fn buttons(&self) -> MouseButtons {
        self.buttons
    }

    /// Move the driver's pointer (function 04h) and report the new position.
    pub fn warp(
        &mut self,
        bios: &mut dyn RealModeInterrupts,
        mem: &mut dyn ConventionalMemory,
        x: u16,
        y: u16,
        sink: &mut dyn EventSink,
    ) {
        if !self.present {
            return;
        }
        let mut regs = RealModeRegs::with_ax(FN_WARP);
        regs.set_cx(x);
        regs.set_dx(y);
        call(bios, mem, regs);
        self.x = i32::from(x);
        self.y = i32::from(y);
        sink.push(Event::MouseMotion {
            x: self.x as f32,
            y: self.y as f32,
            relative: false,
        });
    }

    /// Poll the driver and report changed buttons, then motion.
    pub fn pump(
        &mut self,
        bios: &mut dyn RealModeInterrupts,
        mem: &mut dyn ConventionalMemory,
        sink: &mut dyn EventSink,
    ) {
        if !self.present {
            return;
        }
        let status = call(bios, mem, RealModeRegs::with_ax(FN_STATUS));
        let bits = status.bx();
        for (bit, button) in BUTTON_BITS {
            let down = bits & bit != 0;
            if self.buttons.contains(button.mask()) == down {
                continue;
            }
            self.buttons.set(button.mask(), down);
            sink.push(Event::MouseButton {
                button: button as u8,
                down,
                x: self.x as f32,
                y: self.y as f32,
            });
        }

        if !self.relative {
            let x = i32::from(status.cx() as i16);
            let y = i32::from(status.dx() as i16);
            if (x, y) != (self.x, self.y) {
                (self.x, self.y) = (x, y);
                sink.push(Event::MouseMotion {
                    x: x as f32,
                    y: y as f32,
                    relative: false,
                });
            }
        } else {
            let motion = call(bios, mem, RealModeRegs::with_ax(FN_MOTION));
            let dx = motion.cx() as i16;
            let dy = motion.dx() as i16;
            if dx != 0 || dy != 0 {
                sink.push(Event::MouseMotion {
                    x: f32::from(dx) / MICKEYS_PER_PIXEL,
                    y: f32::from(dy) / MICKEYS_PER_PIXEL,
                    relative: true,
                });
            }
        }
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// Replace the cursor image; `None` goes back to the arrow.
    pub fn set_cursor(&mut self, cursor: Option<Cursor>) {
        self.cursor = cursor.unwrap_or_default();
    }

    pub fn show_cursor(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn cursor_visible(&self) -> bool {
        self.visible
    }

    /// Whether present should draw the cursor: a driver is loaded, positions are absolute and
    /// the cursor is shown.
    pub fn draws_cursor(&self) -> bool {
        self.present && !self.relative && self.visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::VbeBiosModel;
    use retroplat_dos::testing::ConventionalArena;

    fn mouse() -> (Mouse, VbeBiosModel, ConventionalArena) {
        let bios = VbeBiosModel::new(0x0300, 16).with_mouse();
        let mut mem = ConventionalArena::new();
        let m = Mouse::detect(&mut bios.clone(), &mut mem);
        (m, bios, mem)
    }

    #[test]
    fn arrow_cursor_shape() {
        let c = Cursor::arrow();
        assert_eq!((c.surface().width(), c.surface().height()), (12, 19));
        assert_eq!(c.hot_spot(), (0, 0));
        let row = c.surface().row(2);
        assert_eq!(&row[0..4], &[0x00, 0x00, 0x00, 0xFF]);
        assert_eq!(&row[4..8], &[0xFF; 4]);
        assert_eq!(&row[12..16], &[0; 4]);
    }

    #[test]
    fn custom_cursor_needs_exact_pixels() {
        assert!(matches!(
            Cursor::from_argb8888(2, 2, vec![0; 15], 0, 0),
            Err(VesaError::InvalidCursor { w: 2, h: 2 })
        ));
        let c = Cursor::from_argb8888(2, 2, vec![0; 16], 1, 1).unwrap();
        assert_eq!(c.hot_spot(), (1, 1));
    }

    #[test]
    fn cursor_from_other_format_is_converted() {
        // Rows are padded to four bytes, so only the first two hold the pixel.
        let mut src = Surface::new(1, 1, PixelFormat::Rgb565);
        assert_eq!(src.pitch(), 4);
        src.pixels_mut()[..2].copy_from_slice(&[0x00, 0xF8]);
        let c = Cursor::from_surface(&src, 0, 0);
        assert_eq!(c.surface().format(), PixelFormat::Argb8888);
        assert_eq!(&c.surface().row(0)[..4], &[0x00, 0x00, 0xFF, 0xFF]);
    }

    #[test]
    fn no_driver_means_no_events() {
        let bios = VbeBiosModel::new(0x0300, 16);
        let mut mem = ConventionalArena::new();
        let mut m = Mouse::detect(&mut bios.clone(), &mut mem);
        assert!(!m.is_present());
        let mut events = Vec::new();
        m.pump(&mut bios.clone(), &mut mem, &mut events);
        m.warp(&mut bios.clone(), &mut mem, 5, 5, &mut events);
        assert!(events.is_empty());
    }

    #[test]
    fn pump_reports_only_changes() {
        let (mut m, bios, mut mem) = mouse();
        assert!(m.is_present());
        assert_eq!(bios.mouse_resets(), 1);

        bios.set_mouse(10, 20, 0b001);
        let mut events = Vec::new();
        m.pump(&mut bios.clone(), &mut mem, &mut events);
        assert_eq!(
            events,
            vec![
                Event::MouseButton {
                    button: MouseButton::Left as u8,
                    down: true,
                    x: 0.0,
                    y: 0.0
                },
                Event::MouseMotion {
                    x: 10.0,
                    y: 20.0,
                    relative: false
                },
            ]
        );

        events.clear();
        m.pump(&mut bios.clone(), &mut mem, &mut events);
        assert!(events.is_empty());

        bios.set_mouse(10, 20, 0b110);
        m.pump(&mut bios.clone(), &mut mem, &mut events);
        let buttons: Vec<_> = events
            .iter()
            .map(|e| match e {
                Event::MouseButton { button, down, .. } => (*button, *down),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            buttons,
            vec![
                (MouseButton::Left as u8, false),
                (MouseButton::Right as u8, true),
                (MouseButton::Middle as u8, true),
            ]
        );
    }

    #[test]
    fn relative_mode_reports_scaled_mickeys() {
        let (mut m, bios, mut mem) = mouse();
        bios.add_mickeys(100, 100);
        m.set_relative(&mut bios.clone(), &mut mem, true);

        let mut events = Vec::new();
        m.pump(&mut bios.clone(), &mut mem, &mut events);
        assert!(events.is_empty());

        bios.add_mickeys(8, -6);
        m.pump(&mut bios.clone(), &mut mem, &mut events);
        assert_eq!(
            events,
            vec![Event::MouseMotion {
                x: 2.0,
                y: -1.5,
                relative: true
            }]
        );
        assert!(!m.draws_cursor());
    }

    #[test]
    fn warp_and_range() {
        let (mut m, bios, mut mem) = mouse();
        m.set_range(&mut bios.clone(), &mut mem, 640, 480);
        assert_eq!(bios.mouse_ranges(), (Some((0, 640)), Some((0, 480))));

        let mut events = Vec::new();
        m.warp(&mut bios.clone(), &mut mem, 30, 40, &mut events);
        assert_eq!(bios.mouse_warps(), vec![(30, 40)]);
        assert_eq!(m.position(), (30, 40));
        assert_eq!(events.len(), 1);

        // The driver now reports the warped position, which is not news.
        events.clear();
        m.pump(&mut bios.clone(), &mut mem, &mut events);
        assert!(events.is_empty());
    }
}
