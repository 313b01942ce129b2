//! Terminal input to host events.

use retroplat_host::{Event, KeyMod, Keycode, MouseButton, Scancode};
use tracing::debug;

use crate::ffi::{
    NCKEY_BUTTON1, NCKEY_BUTTON11, NCKEY_MOTION, NCKEY_RESIZE, PRETERUNICODEBASE,
};
use crate::keys::{char_key, is_special_key, special_key};
use crate::terminal::{CellSize, Input, InputType, Modifiers};

pub fn key_modifiers(m: Modifiers) -> KeyMod {
    let mut out = KeyMod::empty();
    for (from, to) in [
        (Modifiers::SHIFT, KeyMod::SHIFT),
        (Modifiers::ALT, KeyMod::ALT),
        (Modifiers::CTRL, KeyMod::CTRL),
        (Modifiers::SUPER, KeyMod::GUI),
        (Modifiers::CAPSLOCK, KeyMod::CAPS),
        (Modifiers::NUMLOCK, KeyMod::NUM),
    ] {
        if m.contains(from) {
            out |= to;
        }
    }
    out
}

/// Host button for `NCKEY_BUTTON<n>`. Wheel buttons (4 to 7) and 10, 11 have none.
pub fn mouse_button(n: u32) -> Option<MouseButton> {
    match n {
        1 => Some(MouseButton::Left),
        2 => Some(MouseButton::Middle),
        3 => Some(MouseButton::Right),
        8 => Some(MouseButton::X1),
        9 => Some(MouseButton::X2),
        _ => None,
    }
}

fn key_event(scancode: Scancode, key: Keycode, modifiers: KeyMod, evtype: InputType) -> Event {
    if evtype == InputType::Release {
        Event::KeyUp {
            scancode,
            key,
            modifiers,
        }
    } else {
        Event::KeyDown {
            scancode,
            key,
            modifiers,
        }
    }
}

/// Translate one input. `size` is asked for the new terminal size on resize.
pub fn translate(input: &Input, size: impl FnOnce() -> CellSize) -> Option<Event> {
    let modifiers = key_modifiers(input.modifiers);
    if input.id < PRETERUNICODEBASE {
        let Some(k) = char_key(input.id) else {
            debug!(
                unicode = format_args!("{:#x}", input.id),
                evtype = ?input.evtype,
                modifiers = input.modifiers.bits(),
                "unhandled notcurses unicode event"
            );
            return None;
        };
        let modifiers = if k.shifted && !modifiers.intersects(KeyMod::SHIFT) {
            modifiers | KeyMod::SHIFT
        } else {
            modifiers
        };
        return Some(key_event(k.scancode, k.key, modifiers, input.evtype));
    }

    match input.id {
        NCKEY_RESIZE => {
            let size = size();
            Some(Event::WindowResized {
                width: size.cols as i32,
                height: size.rows as i32,
            })
        }
        NCKEY_MOTION => Some(Event::MouseMotion {
            x: input.x as f32,
            y: input.y as f32,
            relative: false,
        }),
        NCKEY_BUTTON1..=NCKEY_BUTTON11 => {
            let n = input.id - NCKEY_BUTTON1 + 1;
            if input.evtype == InputType::Unknown {
                return None;
            }
            let Some(button) = mouse_button(n) else {
                debug!(button = n, "unhandled notcurses mouse button");
                return None;
            };
            Some(Event::MouseButton {
                button: button as u8,
                down: matches!(input.evtype, InputType::Press | InputType::Repeat),
                x: input.x as f32,
                y: input.y as f32,
            })
        }
        id if is_special_key(id) => match special_key(id) {
            Some(sc) => Some(key_event(sc, Keycode::from_scancode(sc), modifiers, input.evtype)),
            None => {
                debug!(
                    id = id - PRETERUNICODEBASE,
                    evtype = ?input.evtype,
                    "unhandled notcurses key"
                );
                None
            }
        },
        id => {
            debug!(
                id = id - PRETERUNICODEBASE,
                evtype = ?input.evtype,
                "unhandled notcurses event"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::{NCKEY_EOF, NCKEY_F00, NCKEY_LEFT, NCKEY_SIGNAL};

    fn tr(input: Input) -> Option<Event> {
        translate(&input, || CellSize { cols: 120, rows: 40 })
    }

    #[test]
    fn lowercase_letter_is_a_plain_key_down() {
        assert_eq!(
            tr(Input::key('a' as u32)),
            Some(Event::KeyDown {
                scancode: Scancode::A,
                key: Keycode('a' as u32),
                modifiers: KeyMod::empty(),
            })
        );
    }

    #[test]
    fn uppercase_letter_carries_shift() {
        assert_eq!(
            tr(Input::key('Z' as u32)),
            Some(Event::KeyDown {
                scancode: Scancode::Z,
                key: Keycode('z' as u32),
                modifiers: KeyMod::SHIFT,
            })
        );
    }

    #[test]
    fn terminal_modifiers_map_to_both_sides() {
        let input = Input::key('7' as u32).with_modifiers(Modifiers::ALT | Modifiers::SUPER);
        assert_eq!(
            tr(input),
            Some(Event::KeyDown {
                scancode: Scancode::Num7,
                key: Keycode('7' as u32),
                modifiers: KeyMod::ALT | KeyMod::GUI,
            })
        );
        assert_eq!(
            key_modifiers(Modifiers::CTRL | Modifiers::CAPSLOCK | Modifiers::HYPER),
            KeyMod::CTRL | KeyMod::CAPS
        );
    }

    #[test]
    fn release_becomes_key_up() {
        let input = Input::key(NCKEY_LEFT).with_type(InputType::Release);
        assert_eq!(
            tr(input),
            Some(Event::KeyUp {
                scancode: Scancode::Left,
                key: Keycode::from_scancode(Scancode::Left),
                modifiers: KeyMod::empty(),
            })
        );
    }

    #[test]
    fn resize_reports_the_new_cell_size() {
        assert_eq!(
            tr(Input::key(NCKEY_RESIZE)),
            Some(Event::WindowResized {
                width: 120,
                height: 40,
            })
        );
    }

    #[test]
    fn mouse_motion_and_buttons() {
        assert_eq!(
            tr(Input::key(NCKEY_MOTION).at(10, 5)),
            Some(Event::MouseMotion {
                x: 10.0,
                y: 5.0,
                relative: false,
            })
        );
        let right = NCKEY_BUTTON1 + 2;
        assert_eq!(
            tr(Input::key(right).at(1, 2).with_type(InputType::Press)),
            Some(Event::MouseButton {
                button: MouseButton::Right as u8,
                down: true,
                x: 1.0,
                y: 2.0,
            })
        );
        assert_eq!(
            tr(Input::key(NCKEY_BUTTON1).with_type(InputType::Release)),
            Some(Event::MouseButton {
                button: MouseButton::Left as u8,
                down: false,
                x: 0.0,
                y: 0.0,
            })
        );
    }

    #[test]
    fn untyped_and_wheel_buttons_are_dropped() {
        assert_eq!(tr(Input::key(NCKEY_BUTTON1)), None);
        let wheel_up = NCKEY_BUTTON1 + 3;
        assert_eq!(tr(Input::key(wheel_up).with_type(InputType::Press)), None);
    }

    #[test]
    fn unmapped_inputs_produce_nothing() {
        assert_eq!(tr(Input::key(NCKEY_F00)), None);
        assert_eq!(tr(Input::key(NCKEY_SIGNAL)), None);
        assert_eq!(tr(Input::key(NCKEY_EOF)), None);
        assert_eq!(tr(Input::key(0x263A)), None);
    }
}
