//! IRQ1 keyboard capture and set-1 scancode decoding.
//!
//! The interrupt handler only copies bytes from the controller into the buffer it currently owns.
//! Each pump flips the buffers with interrupts off, then decodes the one the handler just left.

use std::sync::atomic::{AtomicUsize, Ordering};

use retroplat_dos::{without_interrupts, InterruptFlag};
use retroplat_host::{EventSink, KeyMod, Scancode};
use tracing::trace;

pub const KEYBOARD_IRQ: u8 = 1;
pub const KEYBOARD_DATA_PORT: u16 = 0x60;

/// Bytes one buffer holds between pumps; later bytes are dropped.
pub const KEY_BUFFER_LEN: usize = 256;

const RELEASE: u8 = 0x80;
const EXTENDED_PREFIX: u8 = 0xE0;
const PAUSE_PREFIX: u8 = 0xE1;

/// Set-1 make codes 0x00..=0x58.
#[rustfmt::skip]
const SCANCODES: [Scancode; 0x59] = {
    use Scancode::*;
    [
        /* 0x00 */ Unknown, Escape, Num1, Num2, Num3, Num4, Num5, Num6,
        /* 0x08 */ Num7, Num8, Num9, Num0, Minus, Equals, Backspace, Tab,
        /* 0x10 */ Q, W, E, R, T, Y, U, I,
        /* 0x18 */ O, P, LeftBracket, RightBracket, Return, LCtrl, A, S,
        /* 0x20 */ D, F, G, H, J, K, L, Semicolon,
        /* 0x28 */ Apostrophe, Grave, LShift, Backslash, Z, X, C, V,
        /* 0x30 */ B, N, M, Comma, Period, Slash, RShift, PrintScreen,
        /* 0x38 */ LAlt, Space, CapsLock, F1, F2, F3, F4, F5,
        /* 0x40 */ F6, F7, F8, F9, F10, NumLockClear, ScrollLock, Kp7,
        /* 0x48 */ Kp8, Kp9, KpMinus, Kp4, Kp5, Kp6, KpPlus, Kp1,
        /* 0x50 */ Kp2, Kp3, Kp0, KpPeriod, Unknown, Unknown, Unknown, F11,
        /* 0x58 */ F12,
    ]
};

/// Keys sent with an 0xE0 prefix. Codes not listed here (including the fake shifts some
/// keyboards wrap around navigation keys) are ignored.
fn extended_scancode(code: u8) -> Option<Scancode> {
    Some(match code {
        0x1C => Scancode::KpEnter,
        0x1D => Scancode::RCtrl,
        0x35 => Scancode::KpDivide,
        0x37 => Scancode::PrintScreen,
        0x38 => Scancode::RAlt,
        0x47 => Scancode::Home,
        0x48 => Scancode::Up,
        0x49 => Scancode::PageUp,
        0x4B => Scancode::Left,
        0x4D => Scancode::Right,
        0x4F => Scancode::End,
        0x50 => Scancode::Down,
        0x51 => Scancode::PageDown,
        0x52 => Scancode::Insert,
        0x53 => Scancode::Delete,
        0x5B => Scancode::LGui,
        0x5C => Scancode::RGui,
        0x5D => Scancode::Application,
        _ => return None,
    })
}

#[derive(Clone, Copy, Debug)]
struct KeyEventBuffer {
    bytes: [u8; KEY_BUFFER_LEN],
    len: usize,
}

impl Default for KeyEventBuffer {
    fn default() -> Self {
        Self {
            bytes: [0; KEY_BUFFER_LEN],
            len: 0,
        }
    }
}

/// Two raw scan byte buffers: one filled by the interrupt handler, one drained by the pump.
#[derive(Debug, Default)]
pub struct KeyEventBuffers {
    buffers: [KeyEventBuffer; 2],
    current: AtomicUsize,
}

impl KeyEventBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interrupt side. Returns false when the byte was dropped because the buffer is full.
    pub fn record(&mut self, byte: u8) -> bool {
        let buf = &mut self.buffers[self.current.load(Ordering::Relaxed)];
        if buf.len == KEY_BUFFER_LEN {
            return false;
        }
        buf.bytes[buf.len] = byte;
        buf.len += 1;
        true
    }

    /// Hand the filling buffer's bytes to `f`, in arrival order. Interrupts stay enabled while `f`
    /// runs; new bytes go to the other buffer meanwhile.
    pub fn drain(&mut self, cpu: &dyn InterruptFlag, mut f: impl FnMut(u8)) {
        let drained = without_interrupts(cpu, || self.current.fetch_xor(1, Ordering::Relaxed));
        let buf = &mut self.buffers[drained];
        let len = std::mem::take(&mut buf.len);
        buf.bytes[..len].iter().copied().for_each(&mut f);
    }

    /// Bytes waiting in the buffer the handler currently fills.
    pub fn pending(&self) -> usize {
        self.buffers[self.current.load(Ordering::Relaxed)].len
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Prefix {
    #[default]
    None,
    Extended,
    /// Bytes of the Pause sequence still to come.
    Pause(u8),
}

/// Turns scan bytes into key transitions and tracks the modifier state.
#[derive(Clone, Debug, Default)]
pub struct KeyboardDecoder {
    prefix: Prefix,
    modifiers: KeyMod,
}

impl KeyboardDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn modifiers(&self) -> KeyMod {
        self.modifiers
    }

    /// Consume one byte; `Some((key, pressed))` once a whole key code has arrived.
    pub fn decode(&mut self, byte: u8) -> Option<(Scancode, bool)> {
        let pressed = byte & RELEASE == 0;
        match self.prefix {
            Prefix::Pause(remaining) => {
                if remaining > 1 {
                    self.prefix = Prefix::Pause(remaining - 1);
                    return None;
                }
                self.prefix = Prefix::None;
                return Some((Scancode::Pause, pressed));
            }
            Prefix::Extended => {
                self.prefix = Prefix::None;
                return extended_scancode(byte & !RELEASE).map(|sc| (sc, pressed));
            }
            Prefix::None => {}
        }
        match byte {
            EXTENDED_PREFIX => {
                self.prefix = Prefix::Extended;
                None
            }
            PAUSE_PREFIX => {
                self.prefix = Prefix::Pause(2);
                None
            }
            _ => {
                let code = usize::from(byte & !RELEASE);
                SCANCODES
                    .get(code)
                    .copied()
                    .filter(|sc| *sc != Scancode::Unknown)
                    .map(|sc| (sc, pressed))
            }
        }
    }

    /// Decode `byte` and send any completed key to `sink`.
    pub fn feed(&mut self, byte: u8, sink: &mut dyn EventSink) {
        let Some((scancode, pressed)) = self.decode(byte) else {
            return;
        };
        self.update_modifiers(scancode, pressed);
        trace!(?scancode, pressed, "key");
        sink.key(scancode, pressed, self.modifiers);
    }

    fn update_modifiers(&mut self, scancode: Scancode, pressed: bool) {
        match scancode {
            Scancode::CapsLock if pressed => self.modifiers.toggle(KeyMod::CAPS),
            Scancode::NumLockClear if pressed => self.modifiers.toggle(KeyMod::NUM),
            _ => self
                .modifiers
                .set(KeyMod::for_scancode(scancode), pressed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retroplat_dos::cpu::SoftInterruptFlag;
    use retroplat_host::{Event, Keycode};

    fn decode_all(bytes: &[u8]) -> Vec<(Scancode, bool)> {
        let mut d = KeyboardDecoder::new();
        bytes.iter().filter_map(|&b| d.decode(b)).collect()
    }

    #[test]
    fn base_table_covers_letters_digits_and_function_keys() {
        assert_eq!(
            decode_all(&[0x1E, 0x9E, 0x02, 0x0B, 0x3B, 0x44, 0x57, 0x58]),
            vec![
                (Scancode::A, true),
                (Scancode::A, false),
                (Scancode::Num1, true),
                (Scancode::Num0, true),
                (Scancode::F1, true),
                (Scancode::F10, true),
                (Scancode::F11, true),
                (Scancode::F12, true),
            ]
        );
    }

    #[test]
    fn unmapped_codes_are_ignored() {
        assert!(decode_all(&[0x00, 0x54, 0x56, 0x59, 0x7F]).is_empty());
    }

    #[test]
    fn extended_prefix_selects_navigation_keys() {
        assert_eq!(
            decode_all(&[0xE0, 0x48, 0xE0, 0xC8, 0xE0, 0x1D, 0x1D, 0xE0, 0x1C, 0x1C]),
            vec![
                (Scancode::Up, true),
                (Scancode::Up, false),
                (Scancode::RCtrl, true),
                (Scancode::LCtrl, true),
                (Scancode::KpEnter, true),
                (Scancode::Return, true),
            ]
        );
    }

    #[test]
    fn fake_shifts_around_extended_keys_are_dropped() {
        // Print Screen as sent by most keyboards: E0 2A E0 37 / E0 B7 E0 AA.
        assert_eq!(
            decode_all(&[0xE0, 0x2A, 0xE0, 0x37, 0xE0, 0xB7, 0xE0, 0xAA]),
            vec![(Scancode::PrintScreen, true), (Scancode::PrintScreen, false)]
        );
    }

    #[test]
    fn pause_sequence_is_one_key() {
        assert_eq!(
            decode_all(&[0xE1, 0x1D, 0x45, 0xE1, 0x9D, 0xC5, 0x1E]),
            vec![
                (Scancode::Pause, true),
                (Scancode::Pause, false),
                (Scancode::A, true),
            ]
        );
    }

    #[test]
    fn modifiers_follow_key_state() {
        let mut d = KeyboardDecoder::new();
        let mut events = Vec::new();
        for b in [0x2A, 0x1E, 0xAA, 0x3A, 0xBA] {
            d.feed(b, &mut events);
        }
        assert_eq!(
            events[1],
            Event::KeyDown {
                scancode: Scancode::A,
                key: Keycode::from_scancode(Scancode::A),
                modifiers: KeyMod::LSHIFT,
            }
        );
        assert_eq!(d.modifiers(), KeyMod::CAPS);
        assert_eq!(events.len(), 5);
    }

    #[test]
    fn buffers_swap_and_drop_overflow() {
        let cpu = SoftInterruptFlag::new();
        let mut bufs = KeyEventBuffers::new();
        for i in 0..300u32 {
            bufs.record(i as u8);
        }
        assert_eq!(bufs.pending(), KEY_BUFFER_LEN);

        let mut seen = Vec::new();
        bufs.drain(&cpu, |b| seen.push(b));
        assert_eq!(seen.len(), KEY_BUFFER_LEN);
        assert_eq!(seen[255], 255);
        assert_eq!(cpu.cli_count(), 1);
        assert!(cpu.interrupts_enabled());

        // The handler now fills the other buffer.
        assert!(bufs.record(0x1E));
        let mut seen = Vec::new();
        bufs.drain(&cpu, |b| seen.push(b));
        assert_eq!(seen, vec![0x1E]);

        let mut seen = Vec::new();
        bufs.drain(&cpu, |b| seen.push(b));
        assert!(seen.is_empty());
    }
}
