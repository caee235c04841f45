//! Counting and stamping of classified input events

use std::time::{SystemTime, UNIX_EPOCH};
use tracing::trace;

use super::classify::{classify, is_modifier};
use super::{InputEvent, RawInput};
use crate::config::settings::InputHookSettings;

/// Turns raw presses into counted `InputEvent`s
#[derive(Debug, Default)]
pub struct EventBus {
    count: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Classify `raw` and bump the counter.
    ///
    /// Returns `None` when the event is filtered out (modifier keys with
    /// `ignoreModifierKeys` set); filtered events are not counted.
    pub fn handle(&mut self, raw: RawInput, hooks: &InputHookSettings, now: SystemTime) -> Option<InputEvent> {
        if let RawInput::KeyDown { code } = raw
            && hooks.ignore_modifier_keys
            && is_modifier(code)
        {
            trace!(code, "Ignoring modifier key");
            return None;
        }

        let (kind, action) = classify(raw);
        self.count += 1;
        let timestamp = now
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        Some(InputEvent {
            kind,
            action,
            count: self.count,
            timestamp,
        })
    }

    /// Zero the counter; animation behavior is unaffected
    pub fn reset_count(&mut self) {
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evdev::KeyCode;
    use crate::input::{Action, InputKind};
    use std::time::Duration;

    const KEY_A: u16 = KeyCode::KEY_A.code();
    const KEY_P: u16 = KeyCode::KEY_P.code();
    const KEY_LEFTSHIFT: u16 = KeyCode::KEY_LEFTSHIFT.code();
    const KEY_RIGHTMETA: u16 = KeyCode::KEY_RIGHTMETA.code();
    const BTN_LEFT: u16 = KeyCode::BTN_LEFT.code();

    fn hooks(ignore_modifier_keys: bool) -> InputHookSettings {
        InputHookSettings {
            enabled: true,
            ignore_modifier_keys,
        }
    }

    #[test]
    fn test_counts_and_classifies() {
        let mut bus = EventBus::new();
        let now = UNIX_EPOCH + Duration::from_millis(1234);

        let first = bus.handle(RawInput::KeyDown { code: KEY_A }, &hooks(false), now).unwrap();
        assert_eq!(first.action, Action::Left);
        assert_eq!(first.kind, InputKind::Keypress);
        assert_eq!(first.count, 1);
        assert_eq!(first.timestamp, 1234);

        let second = bus.handle(RawInput::KeyDown { code: KEY_P }, &hooks(false), now).unwrap();
        assert_eq!(second.action, Action::Right);
        assert_eq!(second.count, 2);

        let click = bus.handle(RawInput::MouseDown { button: BTN_LEFT }, &hooks(false), now).unwrap();
        assert_eq!(click.kind, InputKind::Click);
        assert_eq!(click.action, Action::Both);
        assert_eq!(click.count, 3);
    }

    #[test]
    fn test_modifiers_dropped_when_ignored() {
        let mut bus = EventBus::new();
        let now = SystemTime::now();

        assert!(bus.handle(RawInput::KeyDown { code: KEY_LEFTSHIFT }, &hooks(true), now).is_none());
        assert!(bus.handle(RawInput::KeyDown { code: KEY_RIGHTMETA }, &hooks(true), now).is_none());
        assert_eq!(bus.count(), 0);
    }

    #[test]
    fn test_modifiers_counted_as_both_when_not_ignored() {
        let mut bus = EventBus::new();
        let event = bus
            .handle(RawInput::KeyDown { code: KEY_LEFTSHIFT }, &hooks(false), SystemTime::now())
            .unwrap();
        assert_eq!(event.action, Action::Both);
        assert_eq!(event.count, 1);
    }

    #[test]
    fn test_reset_count() {
        let mut bus = EventBus::new();
        let now = SystemTime::now();
        bus.handle(RawInput::KeyDown { code: KEY_A }, &hooks(false), now);
        bus.handle(RawInput::KeyDown { code: KEY_A }, &hooks(false), now);
        bus.reset_count();
        assert_eq!(bus.count(), 0);

        let event = bus.handle(RawInput::KeyDown { code: KEY_A }, &hooks(false), now).unwrap();
        assert_eq!(event.count, 1);
        assert_eq!(event.action, Action::Left);
    }
}
