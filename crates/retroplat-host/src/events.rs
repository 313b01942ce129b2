//! Input events delivered from driver pumps to the host queue.

use bitflags::bitflags;

/// Physical key positions (USB HID usage IDs).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum Scancode {
    Unknown = 0,
    A = 4,
    B = 5,
    C = 6,
    D = 7,
    E = 8,
    F = 9,
    G = 10,
    H = 11,
    I = 12,
    J = 13,
    K = 14,
    L = 15,
    M = 16,
    N = 17,
    O = 18,
    P = 19,
    Q = 20,
    R = 21,
    S = 22,
    T = 23,
    U = 24,
    V = 25,
    W = 26,
    X = 27,
    Y = 28,
    Z = 29,
    Num1 = 30,
    Num2 = 31,
    Num3 = 32,
    Num4 = 33,
    Num5 = 34,
    Num6 = 35,
    Num7 = 36,
    Num8 = 37,
    Num9 = 38,
    Num0 = 39,
    Return = 40,
    Escape = 41,
    Backspace = 42,
    Tab = 43,
    Space = 44,
    Minus = 45,
    Equals = 46,
    LeftBracket = 47,
    RightBracket = 48,
    Backslash = 49,
    Semicolon = 51,
    Apostrophe = 52,
    Grave = 53,
    Comma = 54,
    Period = 55,
    Slash = 56,
    CapsLock = 57,
    F1 = 58,
    F2 = 59,
    F3 = 60,
    F4 = 61,
    F5 = 62,
    F6 = 63,
    F7 = 64,
    F8 = 65,
    F9 = 66,
    F10 = 67,
    F11 = 68,
    F12 = 69,
    PrintScreen = 70,
    ScrollLock = 71,
    Pause = 72,
    Insert = 73,
    Home = 74,
    PageUp = 75,
    Delete = 76,
    End = 77,
    PageDown = 78,
    Right = 79,
    Left = 80,
    Down = 81,
    Up = 82,
    NumLockClear = 83,
    KpDivide = 84,
    KpMultiply = 85,
    KpMinus = 86,
    KpPlus = 87,
    KpEnter = 88,
    Kp1 = 89,
    Kp2 = 90,
    Kp3 = 91,
    Kp4 = 92,
    Kp5 = 93,
    Kp6 = 94,
    Kp7 = 95,
    Kp8 = 96,
    Kp9 = 97,
    Kp0 = 98,
    KpPeriod = 99,
    NonUsBackslash = 100,
    Application = 101,
    KpEquals = 103,
    F13 = 104,
    F14 = 105,
    F15 = 106,
    F16 = 107,
    F17 = 108,
    F18 = 109,
    F19 = 110,
    F20 = 111,
    F21 = 112,
    F22 = 113,
    F23 = 114,
    F24 = 115,
    Menu = 118,
    Mute = 127,
    VolumeUp = 128,
    VolumeDown = 129,
    Separator = 159,
    Clear = 156,
    LCtrl = 224,
    LShift = 225,
    LAlt = 226,
    LGui = 227,
    RCtrl = 228,
    RShift = 229,
    RAlt = 230,
    RGui = 231,
    Mode = 257,
    MediaPlay = 262,
    MediaPause = 263,
    MediaRecord = 264,
    MediaFastForward = 265,
    MediaRewind = 266,
    MediaNextTrack = 267,
    MediaPreviousTrack = 268,
    MediaStop = 269,
    MediaEject = 270,
    MediaPlayPause = 271,
}

impl Scancode {
    const LETTERS: [Scancode; 26] = [
        Self::A,
        Self::B,
        Self::C,
        Self::D,
        Self::E,
        Self::F,
        Self::G,
        Self::H,
        Self::I,
        Self::J,
        Self::K,
        Self::L,
        Self::M,
        Self::N,
        Self::O,
        Self::P,
        Self::Q,
        Self::R,
        Self::S,
        Self::T,
        Self::U,
        Self::V,
        Self::W,
        Self::X,
        Self::Y,
        Self::Z,
    ];

    const DIGITS: [Scancode; 10] = [
        Self::Num0,
        Self::Num1,
        Self::Num2,
        Self::Num3,
        Self::Num4,
        Self::Num5,
        Self::Num6,
        Self::Num7,
        Self::Num8,
        Self::Num9,
    ];

    const FUNCTION: [Scancode; 24] = [
        Self::F1,
        Self::F2,
        Self::F3,
        Self::F4,
        Self::F5,
        Self::F6,
        Self::F7,
        Self::F8,
        Self::F9,
        Self::F10,
        Self::F11,
        Self::F12,
        Self::F13,
        Self::F14,
        Self::F15,
        Self::F16,
        Self::F17,
        Self::F18,
        Self::F19,
        Self::F20,
        Self::F21,
        Self::F22,
        Self::F23,
        Self::F24,
    ];

    /// Key for an ASCII letter of either case.
    pub fn letter(c: char) -> Option<Self> {
        let c = c.to_ascii_lowercase();
        c.is_ascii_lowercase()
            .then(|| Self::LETTERS[(c as u8 - b'a') as usize])
    }

    pub fn digit(c: char) -> Option<Self> {
        c.to_digit(10).map(|d| Self::DIGITS[d as usize])
    }

    /// `F<n>` for `n` in `1..=24`.
    pub fn function(n: u32) -> Option<Self> {
        let idx = n.checked_sub(1)? as usize;
        Self::FUNCTION.get(idx).copied()
    }

    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            Self::LCtrl
                | Self::LShift
                | Self::LAlt
                | Self::LGui
                | Self::RCtrl
                | Self::RShift
                | Self::RAlt
                | Self::RGui
        )
    }
}

/// Virtual key: a Unicode code point for printable keys, otherwise the scancode tagged with
/// [`Keycode::SCANCODE_MASK`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Keycode(pub u32);

impl Keycode {
    pub const SCANCODE_MASK: u32 = 1 << 30;
    pub const UNKNOWN: Keycode = Keycode(0);

    pub fn from_scancode(scancode: Scancode) -> Self {
        match scancode {
            Scancode::Unknown => Self::UNKNOWN,
            Scancode::Return => Self('\r' as u32),
            Scancode::Escape => Self(0x1B),
            Scancode::Backspace => Self(0x08),
            Scancode::Tab => Self('\t' as u32),
            Scancode::Space => Self(' ' as u32),
            Scancode::Delete => Self(0x7F),
            sc => {
                if let Some(c) = scancode_char(sc) {
                    Self(c as u32)
                } else {
                    Self(sc as u32 | Self::SCANCODE_MASK)
                }
            }
        }
    }
}

fn scancode_char(sc: Scancode) -> Option<char> {
    let code = sc as u16;
    if (Scancode::A as u16..=Scancode::Z as u16).contains(&code) {
        return Some((b'a' + (code - Scancode::A as u16) as u8) as char);
    }
    if (Scancode::Num1 as u16..=Scancode::Num9 as u16).contains(&code) {
        return Some((b'1' + (code - Scancode::Num1 as u16) as u8) as char);
    }
    let c = match sc {
        Scancode::Num0 => '0',
        Scancode::Minus => '-',
        Scancode::Equals => '=',
        Scancode::LeftBracket => '[',
        Scancode::RightBracket => ']',
        Scancode::Backslash => '\\',
        Scancode::Semicolon => ';',
        Scancode::Apostrophe => '\'',
        Scancode::Grave => '`',
        Scancode::Comma => ',',
        Scancode::Period => '.',
        Scancode::Slash => '/',
        _ => return None,
    };
    Some(c)
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct KeyMod: u16 {
        const LSHIFT = 0x0001;
        const RSHIFT = 0x0002;
        const LCTRL = 0x0040;
        const RCTRL = 0x0080;
        const LALT = 0x0100;
        const RALT = 0x0200;
        const LGUI = 0x0400;
        const RGUI = 0x0800;
        const NUM = 0x1000;
        const CAPS = 0x2000;

        const SHIFT = Self::LSHIFT.bits() | Self::RSHIFT.bits();
        const CTRL = Self::LCTRL.bits() | Self::RCTRL.bits();
        const ALT = Self::LALT.bits() | Self::RALT.bits();
        const GUI = Self::LGUI.bits() | Self::RGUI.bits();
    }
}

impl KeyMod {
    /// Modifier bit held by a modifier key, or empty for anything else.
    pub fn for_scancode(sc: Scancode) -> Self {
        match sc {
            Scancode::LShift => Self::LSHIFT,
            Scancode::RShift => Self::RSHIFT,
            Scancode::LCtrl => Self::LCTRL,
            Scancode::RCtrl => Self::RCTRL,
            Scancode::LAlt => Self::LALT,
            Scancode::RAlt => Self::RALT,
            Scancode::LGui => Self::LGUI,
            Scancode::RGui => Self::RGUI,
            _ => Self::empty(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MouseButton {
    Left = 1,
    Middle = 2,
    Right = 3,
    X1 = 4,
    X2 = 5,
}

impl MouseButton {
    pub const ALL: [MouseButton; 5] = [
        Self::Left,
        Self::Middle,
        Self::Right,
        Self::X1,
        Self::X2,
    ];

    /// 1-based host button number.
    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL.get(usize::from(n.checked_sub(1)?)).copied()
    }

    pub fn mask(self) -> MouseButtons {
        MouseButtons::from_bits_truncate(1 << (self as u8 - 1))
    }
}

bitflags! {
    /// Pressed-button state, bit `n - 1` for button number `n`.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct MouseButtons: u8 {
        const LEFT = 1 << 0;
        const MIDDLE = 1 << 1;
        const RIGHT = 1 << 2;
        const X1 = 1 << 3;
        const X2 = 1 << 4;
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Event {
    KeyDown {
        scancode: Scancode,
        key: Keycode,
        modifiers: KeyMod,
    },
    KeyUp {
        scancode: Scancode,
        key: Keycode,
        modifiers: KeyMod,
    },
    /// Absolute position, or a delta when `relative` is set.
    MouseMotion { x: f32, y: f32, relative: bool },
    MouseButton {
        button: u8,
        down: bool,
        x: f32,
        y: f32,
    },
    WindowResized { width: i32, height: i32 },
    Quit,
}

/// The host event queue as seen from a driver pump.
pub trait EventSink {
    fn push(&mut self, event: Event);

    /// Key transition with the keycode derived from the default layout.
    fn key(&mut self, scancode: Scancode, down: bool, modifiers: KeyMod) {
        let key = Keycode::from_scancode(scancode);
        self.push(if down {
            Event::KeyDown {
                scancode,
                key,
                modifiers,
            }
        } else {
            Event::KeyUp {
                scancode,
                key,
                modifiers,
            }
        });
    }
}

impl EventSink for Vec<Event> {
    fn push(&mut self, event: Event) {
        Vec::push(self, event);
    }
}
