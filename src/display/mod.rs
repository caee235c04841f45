//! Display context: animation playback and drawing
//!
//! Runs on its own thread. The controller feeds it settings snapshots, input
//! events and the window's drawing target; it ticks at a fixed interval,
//! updating the state machine and then drawing when something changed.

pub mod font;

use anyhow::{Context, Result};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::animation::pack::{load_pack, PackPaths, PackSelection};
use crate::animation::{Canvas, Clock, MonotonicClock, StateMachine};
use crate::config::{InteractionMode, Settings};
use crate::constants::animation;
use crate::geometry::scaled_size;
use crate::ipc::{Broadcast, Request};
use crate::types::Point;
use font::FontRenderer;

/// Sprite pixels at or above this alpha catch the pointer in hover mode
const HOVER_ALPHA_THRESHOLD: u8 = 16;

const PLACEHOLDER_BACKGROUND: u32 = 0xC020_0000;
const PLACEHOLDER_TEXT: u32 = 0xFFFF_FFFF;

/// Where frames end up; implemented by the window backend
pub trait FrameSink: Send {
    fn present(&mut self, canvas: &Canvas) -> Result<()>;

    /// Pointer position relative to the window, if on the same screen
    fn pointer(&self) -> Result<Option<Point>>;

    fn is_alive(&self) -> bool;
}

pub enum DisplayMessage {
    Broadcast(Broadcast),
    Attach(Box<dyn FrameSink>),
    Detach,
    Shutdown,
}

/// Outgoing requests from the display (click-through toggles)
pub type RequestSink = Box<dyn Fn(Request) + Send>;

/// Tracks whether the pointer is over the sprite in hover-toggle mode
#[derive(Debug)]
pub struct HoverTracker {
    over_sprite: bool,
}

impl Default for HoverTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl HoverTracker {
    /// Hover-toggle windows start out click-through, i.e. not hovered
    pub fn new() -> Self {
        Self { over_sprite: false }
    }

    pub fn reset(&mut self) {
        self.over_sprite = false;
    }

    /// Feed the latest hit test; returns the click-through state to request on change
    pub fn update(&mut self, over_sprite: bool) -> Option<Request> {
        if over_sprite == self.over_sprite {
            return None;
        }
        self.over_sprite = over_sprite;
        Some(if over_sprite {
            Request::DisableClickThrough
        } else {
            Request::EnableClickThrough
        })
    }
}

pub struct Display<C: Clock> {
    machine: StateMachine<C>,
    settings: Settings,
    selection: PackSelection,
    paths: PackPaths,
    canvas: Canvas,
    sink: Option<Box<dyn FrameSink>>,
    hover: HoverTracker,
    /// Set when the active pack could not be loaded
    placeholder: Option<String>,
    font: Option<FontRenderer>,
    dirty: bool,
    requests: RequestSink,
}

impl<C: Clock> Display<C> {
    pub fn new(settings: Settings, paths: PackPaths, clock: C, requests: RequestSink) -> Self {
        let (width, height) = scaled_size(&settings);
        let (animations, placeholder) = match load_pack(&settings, &paths) {
            Ok(set) => (set, None),
            Err(e) => {
                error!(error = ?e, "Failed to load character pack");
                (Default::default(), Some(placeholder_message(&settings)))
            }
        };

        Self {
            machine: StateMachine::new(animations, clock),
            selection: PackSelection::from_settings(&settings),
            settings,
            paths,
            canvas: Canvas::new(width, height),
            sink: None,
            hover: HoverTracker::new(),
            placeholder,
            font: None,
            dirty: true,
            requests,
        }
    }

    /// Apply one message; returns `false` on shutdown
    pub fn handle(&mut self, message: DisplayMessage) -> bool {
        match message {
            DisplayMessage::Broadcast(Broadcast::SettingsChanged(settings)) => self.apply_settings(settings),
            DisplayMessage::Broadcast(Broadcast::InputEvent(event)) => {
                if self.placeholder.is_none() && self.machine.trigger_one_shot(event.action) {
                    self.dirty = true;
                }
            }
            DisplayMessage::Attach(sink) => {
                debug!("Display attached to window");
                self.sink = Some(sink);
                self.hover.reset();
                self.dirty = true;
            }
            DisplayMessage::Detach => {
                debug!("Display detached from window");
                self.sink = None;
            }
            DisplayMessage::Shutdown => return false,
        }
        true
    }

    fn apply_settings(&mut self, settings: Settings) {
        let size = scaled_size(&settings);
        if size != (self.canvas.width(), self.canvas.height()) {
            self.canvas = Canvas::new(size.0, size.1);
        }

        let selection = PackSelection::from_settings(&settings);
        if selection != self.selection {
            info!(pack = %selection.id, "Character pack changed, reloading sprites");
            match load_pack(&settings, &self.paths) {
                Ok(set) => {
                    self.machine.replace_animations(set);
                    self.placeholder = None;
                }
                Err(e) => {
                    error!(error = ?e, "Failed to load character pack");
                    self.machine.replace_animations(Default::default());
                    self.placeholder = Some(placeholder_message(&settings));
                }
            }
            self.selection = selection;
        } else {
            self.machine.animations_mut().apply_rates(&settings.animation);
        }

        // The window drops back to its initial click-through state on every apply
        self.hover.reset();
        self.settings = settings;
        self.dirty = true;
    }

    /// Update, draw if needed, then run the hover hit test
    pub fn tick(&mut self) {
        if self.machine.update() {
            self.dirty = true;
        }

        if self.sink.as_ref().is_some_and(|sink| !sink.is_alive()) {
            debug!("Window gone, dropping frame sink");
            self.sink = None;
        }

        if self.dirty && self.sink.is_some() {
            self.render();
            if let Some(sink) = self.sink.as_mut() {
                if let Err(e) = sink.present(&self.canvas) {
                    warn!(error = ?e, "Failed to present frame");
                }
            }
            self.dirty = false;
        }

        self.track_hover();
    }

    fn track_hover(&mut self) {
        if self.settings.interaction_mode() != InteractionMode::HoverToggle {
            return;
        }
        let Some(sink) = self.sink.as_ref() else {
            return;
        };
        let over_sprite = match sink.pointer() {
            Ok(Some(point)) => self.canvas.alpha_at(point.x, point.y) >= HOVER_ALPHA_THRESHOLD,
            Ok(None) => false,
            Err(e) => {
                debug!(error = ?e, "Pointer query failed");
                return;
            }
        };
        if let Some(request) = self.hover.update(over_sprite) {
            (self.requests)(request);
        }
    }

    fn render(&mut self) {
        if let Some(message) = self.placeholder.clone() {
            self.render_placeholder(&message);
            return;
        }
        match self.machine.current_sprite() {
            Some((sheet, frame)) => self.canvas.draw_stretched(sheet, frame),
            None => self.canvas.clear(),
        }
    }

    /// Translucent red tile with the error text centred on it
    fn render_placeholder(&mut self, message: &str) {
        let (width, height) = (self.canvas.width(), self.canvas.height());
        self.canvas.clear();
        self.canvas.fill_rect(0, 0, width, height, PLACEHOLDER_BACKGROUND);

        let size = (height as f32 / 8.0).max(8.0);
        if self.font.is_none() {
            self.font = FontRenderer::from_system_font(size)
                .inspect_err(|e| warn!(error = ?e, "Placeholder text unavailable"))
                .ok();
        }
        let Some(font) = self.font.as_mut() else {
            return;
        };
        font.set_size(size);

        let lines: Vec<_> = message
            .lines()
            .map(|line| font.render_text(line, PLACEHOLDER_TEXT))
            .collect();
        let total_height: usize = lines.iter().map(|line| line.height).sum();
        let mut top = (height as i32 - total_height as i32) / 2;
        for line in lines {
            let left = (width as i32 - line.width as i32) / 2;
            self.canvas.blend(left, top, line.width, line.height, &line.data);
            top += line.height as i32;
        }
    }
}

fn placeholder_message(settings: &Settings) -> String {
    format!("pack '{}'\nnot found", settings.active_character_pack_id)
}

/// Handle to the running display thread
pub struct DisplayHandle {
    sender: Sender<DisplayMessage>,
    thread: Option<thread::JoinHandle<()>>,
}

impl DisplayHandle {
    pub fn send(&self, message: DisplayMessage) {
        if self.sender.send(message).is_err() {
            warn!("Display thread is gone, message dropped");
        }
    }

    /// Stop the display loop and wait for it to exit
    pub fn shutdown(&mut self) {
        let _ = self.sender.send(DisplayMessage::Shutdown);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            error!("Display thread panicked");
        }
    }
}

#[cfg(test)]
impl DisplayHandle {
    /// Handle with no thread behind it; messages land in the returned receiver
    pub fn detached() -> (Self, Receiver<DisplayMessage>) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender, thread: None }, receiver)
    }
}

impl Drop for DisplayHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Start the display thread
pub fn spawn(settings: Settings, paths: PackPaths, requests: RequestSink) -> Result<DisplayHandle> {
    let (sender, receiver) = mpsc::channel();
    let thread = thread::Builder::new()
        .name("display".to_string())
        .spawn(move || {
            let display = Display::new(settings, paths, MonotonicClock::new(), requests);
            run(display, &receiver);
        })
        .context("Failed to spawn display thread")?;

    Ok(DisplayHandle {
        sender,
        thread: Some(thread),
    })
}

fn run<C: Clock>(mut display: Display<C>, receiver: &Receiver<DisplayMessage>) {
    let interval = Duration::from_millis(animation::FRAME_INTERVAL_MS);
    info!(interval_ms = animation::FRAME_INTERVAL_MS, "Display loop started");

    let mut next_tick = Instant::now() + interval;
    loop {
        let timeout = next_tick.saturating_duration_since(Instant::now());
        match receiver.recv_timeout(timeout) {
            Ok(message) => {
                if !display.handle(message) {
                    break;
                }
                continue;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        display.tick();
        next_tick += interval;
        // Fell behind (suspend, slow frame); don't try to catch up
        let now = Instant::now();
        if next_tick < now {
            next_tick = now + interval;
        }
    }
    info!("Display loop stopped");
}
