//! Global input capture and classification
//!
//! Raw evdev events come in through `hook`, `classify` maps them to the hand
//! that produced them, and `bus` turns qualifying events into counted
//! `InputEvent`s for the display.

pub mod bus;
pub mod classify;
pub mod hook;

use serde::{Deserialize, Serialize};

pub use bus::EventBus;
pub use hook::{EvdevHook, HookEvent, InputHook, Shortcut};

/// Raw press as read from an input device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawInput {
    KeyDown { code: u16 },
    MouseDown { button: u16 },
}

/// Kind of input that produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Keypress,
    Click,
}

/// Animation action an input maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Left,
    Right,
    Both,
}

impl Action {
    /// State name of the matching one-shot animation
    pub fn state_name(self) -> &'static str {
        use crate::constants::animation;
        match self {
            Self::Left => animation::LEFT,
            Self::Right => animation::RIGHT,
            Self::Both => animation::BOTH,
        }
    }
}

/// Payload of the `input-event` channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEvent {
    #[serde(rename = "type")]
    pub kind: InputKind,
    pub action: Action,
    pub count: u64,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
}
