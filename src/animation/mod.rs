//! Sprite animation state machine
//!
//! One named animation plays at a time. Looping animations (idle) restart at
//! the end; one-shots hold their last frame or hand over to `on_complete`.

pub mod builtin;
pub mod clock;
pub mod pack;
pub mod sprite;

use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::settings::AnimationSettings;
use crate::constants::{animation, limits};
use crate::input::Action;
pub use clock::{Clock, MonotonicClock};
pub use sprite::{Canvas, SpriteSheet};

#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    pub sheet: SpriteSheet,
    pub fps: f64,
    pub looping: bool,
    /// Pack-specified rate that settings changes leave alone
    pub fixed_fps: bool,
}

impl Animation {
    /// Settings-paced animation: idle loops at `idleFps`, everything else is a
    /// one-shot at `hitFps`
    pub fn for_state(state: &str, sheet: SpriteSheet, rates: &AnimationSettings) -> Self {
        let idle = state == animation::IDLE;
        Self {
            sheet,
            fps: if idle { rates.idle_fps } else { rates.hit_fps },
            looping: idle,
            fixed_fps: false,
        }
    }

    fn frame_interval(&self) -> Option<Duration> {
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(1.0 / self.fps.clamp(limits::FPS_MIN, limits::FPS_MAX)).ok()
    }
}

/// Animations of the active character, keyed by state name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimationSet {
    animations: BTreeMap<String, Animation>,
    /// States whose assets failed to load
    unavailable: Vec<String>,
}

impl AnimationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, state: &str, animation: Animation) {
        self.animations.insert(state.to_string(), animation);
    }

    pub fn get(&self, state: &str) -> Option<&Animation> {
        self.animations.get(state)
    }

    pub fn contains(&self, state: &str) -> bool {
        self.animations.contains_key(state)
    }

    pub fn mark_unavailable(&mut self, state: &str) {
        self.unavailable.push(state.to_string());
    }

    pub fn unavailable(&self) -> &[String] {
        &self.unavailable
    }

    /// Re-pace animations after an fps change
    pub fn apply_rates(&mut self, rates: &AnimationSettings) {
        for (state, animation) in self.animations.iter_mut().filter(|(_, a)| !a.fixed_fps) {
            animation.fps = if state == animation::IDLE {
                rates.idle_fps
            } else {
                rates.hit_fps
            };
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SetStateOptions {
    /// State to switch to when a non-looping animation finishes
    pub on_complete: Option<String>,
    /// Restart even if already in the requested state
    pub force: bool,
}

impl SetStateOptions {
    pub fn then(state: &str) -> Self {
        Self {
            on_complete: Some(state.to_string()),
            force: false,
        }
    }
}

pub struct StateMachine<C: Clock> {
    animations: AnimationSet,
    clock: C,
    current: Option<String>,
    frame: usize,
    frame_started: Duration,
    on_complete: Option<String>,
}

impl<C: Clock> StateMachine<C> {
    /// Starts in `idle` when the set has one
    pub fn new(animations: AnimationSet, clock: C) -> Self {
        let mut machine = Self {
            animations,
            clock,
            current: None,
            frame: 0,
            frame_started: Duration::ZERO,
            on_complete: None,
        };
        machine.set_state(animation::IDLE, SetStateOptions::default());
        machine
    }

    #[cfg(test)]
    pub fn current_state(&self) -> Option<&str> {
        self.current.as_deref()
    }

    #[cfg(test)]
    pub fn current_frame(&self) -> usize {
        self.frame
    }

    pub fn animations_mut(&mut self) -> &mut AnimationSet {
        &mut self.animations
    }

    /// Sprite and frame index to draw
    pub fn current_sprite(&self) -> Option<(&SpriteSheet, usize)> {
        let animation = self.animations.get(self.current.as_deref()?)?;
        Some((&animation.sheet, self.frame))
    }

    /// Switch to `name`. Returns whether the state changed.
    pub fn set_state(&mut self, name: &str, options: SetStateOptions) -> bool {
        if !self.animations.contains(name) {
            warn!(state = name, "Unknown animation state");
            return false;
        }
        if self.current.as_deref() == Some(name) && !options.force {
            return false;
        }

        debug!(state = name, on_complete = ?options.on_complete, "Animation state change");
        self.current = Some(name.to_string());
        self.frame = 0;
        self.frame_started = self.clock.now();
        self.on_complete = options.on_complete;
        true
    }

    /// Play the one-shot for `action`, returning to idle afterwards
    pub fn trigger_one_shot(&mut self, action: Action) -> bool {
        let name = if self.animations.contains(action.state_name()) {
            action.state_name()
        } else {
            animation::HIT
        };
        self.set_state(name, SetStateOptions::then(animation::IDLE))
    }

    /// Advance by at most one frame. Returns whether anything visible changed.
    pub fn update(&mut self) -> bool {
        let Some(animation) = self.current.as_deref().and_then(|name| self.animations.get(name)) else {
            return false;
        };
        let Some(interval) = animation.frame_interval() else {
            return false;
        };
        let now = self.clock.now();
        if now.saturating_sub(self.frame_started) < interval {
            return false;
        }

        let frame_count = animation.sheet.frame_count();
        let looping = animation.looping;
        self.frame_started = now;

        if self.frame + 1 < frame_count {
            self.frame += 1;
            true
        } else if looping {
            let changed = self.frame != 0;
            self.frame = 0;
            changed
        } else if let Some(next) = self.on_complete.take() {
            self.set_state(&next, SetStateOptions::default())
        } else {
            false
        }
    }

    /// Swap in a new character, keeping the current state if it still exists
    pub fn replace_animations(&mut self, animations: AnimationSet) {
        self.animations = animations;
        let keep = self
            .current
            .as_deref()
            .is_some_and(|name| self.animations.contains(name));
        if keep {
            let frames = self
                .current_sprite()
                .map_or(0, |(sheet, _)| sheet.frame_count());
            if self.frame >= frames {
                self.frame = 0;
            }
        } else {
            self.current = None;
            self.on_complete = None;
            self.set_state(animation::IDLE, SetStateOptions::default());
        }
    }
}
