//! Static partition of the keyboard into left-hand and right-hand keys
//!
//! Codes are Linux input event codes (`linux/input-event-codes.h`), which is
//! what evdev reports regardless of keyboard layout.

use evdev::KeyCode;

use super::{Action, InputKind, RawInput};

/// Keys typed with the left hand on a standard touch-typing layout
const LEFT_HAND: &[KeyCode] = &[
    KeyCode::KEY_GRAVE,
    KeyCode::KEY_1,
    KeyCode::KEY_2,
    KeyCode::KEY_3,
    KeyCode::KEY_4,
    KeyCode::KEY_5,
    KeyCode::KEY_Q,
    KeyCode::KEY_W,
    KeyCode::KEY_E,
    KeyCode::KEY_R,
    KeyCode::KEY_T,
    KeyCode::KEY_A,
    KeyCode::KEY_S,
    KeyCode::KEY_D,
    KeyCode::KEY_F,
    KeyCode::KEY_G,
    KeyCode::KEY_Z,
    KeyCode::KEY_X,
    KeyCode::KEY_C,
    KeyCode::KEY_V,
    KeyCode::KEY_B,
];

/// Keys typed with the right hand, including the navigation block and keypad
const RIGHT_HAND: &[KeyCode] = &[
    KeyCode::KEY_6,
    KeyCode::KEY_7,
    KeyCode::KEY_8,
    KeyCode::KEY_9,
    KeyCode::KEY_0,
    KeyCode::KEY_MINUS,
    KeyCode::KEY_EQUAL,
    KeyCode::KEY_Y,
    KeyCode::KEY_U,
    KeyCode::KEY_I,
    KeyCode::KEY_O,
    KeyCode::KEY_P,
    KeyCode::KEY_LEFTBRACE,
    KeyCode::KEY_RIGHTBRACE,
    KeyCode::KEY_H,
    KeyCode::KEY_J,
    KeyCode::KEY_K,
    KeyCode::KEY_L,
    KeyCode::KEY_SEMICOLON,
    KeyCode::KEY_APOSTROPHE,
    KeyCode::KEY_BACKSLASH,
    KeyCode::KEY_N,
    KeyCode::KEY_M,
    KeyCode::KEY_COMMA,
    KeyCode::KEY_DOT,
    KeyCode::KEY_SLASH,
    KeyCode::KEY_KPASTERISK,
    KeyCode::KEY_KPSLASH,
    KeyCode::KEY_KPENTER,
];

/// Shift, Ctrl, Alt and Meta on both sides
const MODIFIERS: &[KeyCode] = &[
    KeyCode::KEY_LEFTSHIFT,
    KeyCode::KEY_RIGHTSHIFT,
    KeyCode::KEY_LEFTCTRL,
    KeyCode::KEY_RIGHTCTRL,
    KeyCode::KEY_LEFTALT,
    KeyCode::KEY_RIGHTALT,
    KeyCode::KEY_LEFTMETA,
    KeyCode::KEY_RIGHTMETA,
];

fn in_range(code: u16, first: KeyCode, last: KeyCode) -> bool {
    (first.code()..=last.code()).contains(&code)
}

/// Home, arrows, page up/down, insert and delete
fn is_navigation(code: u16) -> bool {
    in_range(code, KeyCode::KEY_HOME, KeyCode::KEY_DELETE)
}

/// Keypad digits and operators between KP7 and KPDOT
fn is_keypad(code: u16) -> bool {
    in_range(code, KeyCode::KEY_KP7, KeyCode::KEY_KPDOT)
}

/// Map a key code to the hand that typed it.
///
/// Large keys (space, enter, backspace), modifiers, function keys and
/// anything unknown count as `Both`.
pub fn classify_key(code: u16) -> Action {
    let key = KeyCode::new(code);
    if LEFT_HAND.contains(&key) {
        Action::Left
    } else if RIGHT_HAND.contains(&key) || is_navigation(code) || is_keypad(code) {
        Action::Right
    } else {
        Action::Both
    }
}

pub fn is_modifier(code: u16) -> bool {
    MODIFIERS.contains(&KeyCode::new(code))
}

pub fn is_mouse_button(code: u16) -> bool {
    in_range(code, KeyCode::BTN_LEFT, KeyCode::BTN_TASK)
}

/// Classify a raw press; mouse buttons are always `Both` clicks
pub fn classify(raw: RawInput) -> (InputKind, Action) {
    match raw {
        RawInput::KeyDown { code } => (InputKind::Keypress, classify_key(code)),
        RawInput::MouseDown { .. } => (InputKind::Click, Action::Both),
    }
}
