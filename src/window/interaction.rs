//! Pointer gestures on the overlay: left-drag to move, right-click for settings

use crate::constants::mouse;
use crate::types::Point;

/// What the controller should do in response to a pointer event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerOutcome {
    None,
    /// Move the window origin here (live drag)
    MoveTo(Point),
    /// A drag finished; persist the live position
    DragEnd,
    OpenSettings,
}

#[derive(Debug, Clone, Copy)]
struct Press {
    button: u8,
    pointer_start: Point,
    window_start: Point,
    moved: bool,
}

#[derive(Debug, Default)]
pub struct PointerInteraction {
    press: Option<Press>,
}

impl PointerInteraction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.press
            .is_some_and(|press| press.button == mouse::BUTTON_LEFT && press.moved)
    }

    /// Button pressed at `root`; `window_origin` is the window's live position
    pub fn on_press(&mut self, button: u8, root: Point, window_origin: Point, can_drag: bool) {
        let tracked = match button {
            mouse::BUTTON_LEFT => can_drag,
            mouse::BUTTON_RIGHT => true,
            _ => false,
        };
        self.press = tracked.then_some(Press {
            button,
            pointer_start: root,
            window_start: window_origin,
            moved: false,
        });
    }

    pub fn on_motion(&mut self, root: Point) -> PointerOutcome {
        let Some(press) = self.press.as_mut() else {
            return PointerOutcome::None;
        };
        let dx = root.x - press.pointer_start.x;
        let dy = root.y - press.pointer_start.y;
        if dx == 0 && dy == 0 {
            return PointerOutcome::None;
        }
        press.moved = true;

        if press.button == mouse::BUTTON_LEFT {
            PointerOutcome::MoveTo(Point::new(press.window_start.x + dx, press.window_start.y + dy))
        } else {
            PointerOutcome::None
        }
    }

    pub fn on_release(&mut self, button: u8, root: Point) -> PointerOutcome {
        let Some(press) = self.press else {
            return PointerOutcome::None;
        };
        if press.button != button {
            return PointerOutcome::None;
        }
        self.press = None;
        let moved = press.moved || root != press.pointer_start;

        match (button, moved) {
            (mouse::BUTTON_LEFT, true) => PointerOutcome::DragEnd,
            (mouse::BUTTON_RIGHT, false) => PointerOutcome::OpenSettings,
            _ => PointerOutcome::None,
        }
    }

    /// Forget any press in progress (window destroyed or mode changed)
    pub fn cancel(&mut self) {
        self.press = None;
    }
}
