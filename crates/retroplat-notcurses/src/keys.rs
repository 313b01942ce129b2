//! notcurses key ids to host scancodes.

use retroplat_host::{Keycode, Scancode};

use crate::ffi::*;

/// Scancode for a synthesized `NCKEY_*` key, `None` for keys without a host equivalent.
pub fn special_key(id: u32) -> Option<Scancode> {
    let sc = match id {
        NCKEY_UP => Scancode::Up,
        NCKEY_RIGHT => Scancode::Right,
        NCKEY_DOWN => Scancode::Down,
        NCKEY_LEFT => Scancode::Left,
        NCKEY_INS => Scancode::Insert,
        NCKEY_DEL => Scancode::Delete,
        NCKEY_BACKSPACE => Scancode::Backspace,
        NCKEY_PGDOWN => Scancode::PageDown,
        NCKEY_PGUP => Scancode::PageUp,
        NCKEY_HOME => Scancode::Home,
        NCKEY_END => Scancode::End,
        // F0 and F25..F60 have no host key.
        NCKEY_F00..=NCKEY_F60 => return Scancode::function(id - NCKEY_F00),
        NCKEY_ENTER => Scancode::Return,
        NCKEY_CAPS_LOCK => Scancode::CapsLock,
        NCKEY_SCROLL_LOCK => Scancode::ScrollLock,
        NCKEY_NUM_LOCK => Scancode::NumLockClear,
        NCKEY_PRINT_SCREEN => Scancode::PrintScreen,
        NCKEY_PAUSE => Scancode::Pause,
        NCKEY_MENU => Scancode::Menu,
        NCKEY_MEDIA_PLAY => Scancode::MediaPlay,
        NCKEY_MEDIA_PAUSE => Scancode::MediaPause,
        NCKEY_MEDIA_PPAUSE => Scancode::MediaPlayPause,
        NCKEY_MEDIA_STOP => Scancode::MediaStop,
        NCKEY_MEDIA_FF => Scancode::MediaFastForward,
        NCKEY_MEDIA_REWIND => Scancode::MediaRewind,
        NCKEY_MEDIA_NEXT => Scancode::MediaNextTrack,
        NCKEY_MEDIA_PREV => Scancode::MediaPreviousTrack,
        NCKEY_MEDIA_RECORD => Scancode::MediaRecord,
        NCKEY_MEDIA_LVOL => Scancode::VolumeDown,
        NCKEY_MEDIA_RVOL => Scancode::VolumeUp,
        NCKEY_MEDIA_MUTE => Scancode::Mute,
        NCKEY_LSHIFT => Scancode::LShift,
        NCKEY_LCTRL => Scancode::LCtrl,
        NCKEY_LALT => Scancode::LAlt,
        NCKEY_LSUPER => Scancode::LGui,
        NCKEY_RSHIFT => Scancode::RShift,
        NCKEY_RCTRL => Scancode::RCtrl,
        NCKEY_RALT => Scancode::RAlt,
        NCKEY_RSUPER => Scancode::RGui,
        _ => return None,
    };
    Some(sc)
}

/// Whether `id` is one of the synthesized keys [`special_key`] knows about, mapped or not.
pub fn is_special_key(id: u32) -> bool {
    (NCKEY_UP..=NCKEY_L5SHIFT).contains(&id)
}

/// A typed character on a US QWERTY layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CharKey {
    pub scancode: Scancode,
    pub key: Keycode,
    /// The character needs shift on that layout.
    pub shifted: bool,
}

/// Scancode and keycode for a character read from the terminal. Letters of either case map to
/// the letter's key with its lowercase keycode; other characters keep their own keycode.
pub fn char_key(c: u32) -> Option<CharKey> {
    let ch = char::from_u32(c).filter(char::is_ascii)?;
    if let Some(scancode) = Scancode::letter(ch) {
        return Some(CharKey {
            scancode,
            key: Keycode::from_scancode(scancode),
            shifted: ch.is_ascii_uppercase(),
        });
    }
    if let Some(scancode) = Scancode::digit(ch) {
        return Some(CharKey {
            scancode,
            key: Keycode::from_scancode(scancode),
            shifted: false,
        });
    }
    let (scancode, shifted) = match ch {
        '\x1b' => (Scancode::Escape, false),
        '\t' => (Scancode::Tab, false),
        ' ' => (Scancode::Space, false),
        ',' => (Scancode::Comma, false),
        '<' => (Scancode::Comma, true),
        '.' => (Scancode::Period, false),
        '>' => (Scancode::Period, true),
        '/' => (Scancode::Slash, false),
        '?' => (Scancode::Slash, true),
        ';' => (Scancode::Semicolon, false),
        ':' => (Scancode::Semicolon, true),
        '\'' => (Scancode::Apostrophe, false),
        '"' => (Scancode::Apostrophe, true),
        '`' => (Scancode::Grave, false),
        '~' => (Scancode::Grave, true),
        '!' => (Scancode::Num1, true),
        '@' => (Scancode::Num2, true),
        '#' => (Scancode::Num3, true),
        '$' => (Scancode::Num4, true),
        '%' => (Scancode::Num5, true),
        '^' => (Scancode::Num6, true),
        '&' => (Scancode::Num7, true),
        '*' => (Scancode::Num8, true),
        '(' => (Scancode::Num9, true),
        ')' => (Scancode::Num0, true),
        '-' => (Scancode::Minus, false),
        '_' => (Scancode::Minus, true),
        '=' => (Scancode::Equals, false),
        '+' => (Scancode::Equals, true),
        '[' => (Scancode::LeftBracket, false),
        '{' => (Scancode::LeftBracket, true),
        ']' => (Scancode::RightBracket, false),
        '}' => (Scancode::RightBracket, true),
        '\\' => (Scancode::Backslash, false),
        '|' => (Scancode::Backslash, true),
        _ => return None,
    };
    Some(CharKey {
        scancode,
        key: Keycode(c),
        shifted,
    })
}
