//! Global input hook reading evdev devices
//!
//! One listener thread per keyboard/mouse device. Events are delivered to a
//! caller-provided sink, which must not block.

use anyhow::{Context, Result};
use evdev::{Device, EventType, KeyCode};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, warn};

use super::classify::is_mouse_button;
use super::RawInput;
use crate::constants::{input, paths, permissions};

/// Global shortcuts recognised by the hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    /// Ctrl+Alt+F12
    OpenSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    Input(RawInput),
    Shortcut(Shortcut),
}

/// Receives hook events on the listener threads
pub type HookSink = Arc<dyn Fn(HookEvent) + Send + Sync>;

/// OS-level global input capture
pub trait InputHook {
    /// Begin delivering events to `sink`; a no-op when already running
    fn start(&mut self, sink: HookSink) -> Result<()>;

    /// Stop delivering events (best-effort, never blocks)
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

/// Tracks held modifiers to detect the settings shortcut
#[derive(Debug, Default)]
struct ShortcutTracker {
    held: BTreeSet<u16>,
}

const CTRL: [KeyCode; 2] = [KeyCode::KEY_LEFTCTRL, KeyCode::KEY_RIGHTCTRL];
const ALT: [KeyCode; 2] = [KeyCode::KEY_LEFTALT, KeyCode::KEY_RIGHTALT];

impl ShortcutTracker {
    fn any_held(&self, keys: &[KeyCode]) -> bool {
        keys.iter().any(|key| self.held.contains(&key.code()))
    }

    /// Feed a key event; returns the shortcut it completes, if any
    fn on_key(&mut self, code: u16, value: i32) -> Option<Shortcut> {
        match value {
            input::KEY_PRESS => {
                let ctrl = self.any_held(&CTRL);
                let alt = self.any_held(&ALT);
                self.held.insert(code);
                (code == KeyCode::KEY_F12.code() && ctrl && alt).then_some(Shortcut::OpenSettings)
            }
            input::KEY_RELEASE => {
                self.held.remove(&code);
                None
            }
            _ => None,
        }
    }
}

/// evdev-backed hook
#[derive(Default)]
pub struct EvdevHook {
    running: Option<Arc<AtomicBool>>,
}

impl EvdevHook {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InputHook for EvdevHook {
    fn start(&mut self, sink: HookSink) -> Result<()> {
        if self.is_running() {
            debug!("Input hook already running");
            return Ok(());
        }

        let devices = find_input_devices()?;
        let running = spawn_all(devices, |device, running| {
            let sink = sink.clone();
            thread::Builder::new()
                .name("input-hook".to_string())
                .spawn(move || {
                    info!(device = ?device.name(), "Input listener started");
                    if let Err(e) = listen(device, &running, &sink) {
                        error!(error = %e, "Input listener error");
                    }
                })
                .map(|_| ())
        })?;

        self.running = Some(running);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            // Listener threads notice on their next event and exit; nothing
            // is delivered after this point.
            running.store(false, Ordering::SeqCst);
            info!("Input hook stopped, global shortcuts released");
        }
    }

    fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| running.load(Ordering::SeqCst))
    }
}

impl Drop for EvdevHook {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start one listener per device under a shared run flag.
///
/// If any listener fails to start, the flag is cleared so the ones already
/// running exit.
fn spawn_all<D>(
    devices: Vec<D>,
    mut spawn: impl FnMut(D, Arc<AtomicBool>) -> std::io::Result<()>,
) -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    for device in devices {
        if let Err(e) = spawn(device, running.clone()) {
            running.store(false, Ordering::SeqCst);
            return Err(e).context("Failed to spawn input listener thread");
        }
    }
    Ok(running)
}

/// Find all devices that report key events (keyboards and mice)
fn find_input_devices() -> Result<Vec<Device>> {
    info!(path = %paths::DEV_INPUT, "Scanning for input devices...");

    let mut devices = Vec::new();

    for entry in std::fs::read_dir(paths::DEV_INPUT).context(format!(
        "Failed to read {} - are you in the '{}' group?",
        paths::DEV_INPUT,
        permissions::INPUT_GROUP
    ))? {
        let entry = entry?;
        let path = entry.path();

        let is_event_node = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with("event"));
        if !is_event_node {
            continue;
        }

        if let Ok(device) = Device::open(&path) {
            if device.supported_events().contains(EventType::KEY) {
                debug!(device_path = %path.display(), name = ?device.name(), "Found input device");
                devices.push(device);
            }
        }
    }

    if devices.is_empty() {
        anyhow::bail!(
            "No readable input device found. Ensure you're in '{}' group:\n\
             {}\n\
             Then log out and back in.",
            permissions::INPUT_GROUP,
            permissions::ADD_TO_INPUT_GROUP
        )
    }

    info!(count = devices.len(), "Listening on input device(s)");

    Ok(devices)
}

/// Read presses from one device until the hook is stopped
fn listen(mut device: Device, running: &AtomicBool, sink: &HookSink) -> Result<()> {
    let mut shortcuts = ShortcutTracker::default();

    while running.load(Ordering::SeqCst) {
        // Blocks until the device has events
        let events = device.fetch_events().context("Failed to fetch events")?;

        let mut delivered = Vec::new();
        for event in events {
            if event.event_type() != EventType::KEY {
                continue;
            }
            let (code, value) = (event.code(), event.value());

            if let Some(shortcut) = shortcuts.on_key(code, value) {
                delivered.push(HookEvent::Shortcut(shortcut));
                continue;
            }

            // Auto-repeat and releases do not count
            if value != input::KEY_PRESS {
                continue;
            }

            let raw = if is_mouse_button(code) {
                RawInput::MouseDown { button: code }
            } else {
                RawInput::KeyDown { code }
            };
            delivered.push(HookEvent::Input(raw));
        }

        if !running.load(Ordering::SeqCst) {
            break;
        }
        for event in delivered {
            sink(event);
        }
    }

    debug!(device = ?device.name(), "Input listener exiting");
    Ok(())
}

/// Check if input devices are readable (user has input group permissions)
pub fn check_permissions() -> bool {
    std::fs::read_dir(paths::DEV_INPUT).is_ok()
}

/// Print helpful error message if permissions are missing
pub fn print_permission_error() {
    error!(path = %paths::DEV_INPUT, "Cannot access input devices");
    error!(group = %permissions::INPUT_GROUP, "Global input requires group membership");
    error!(command = %permissions::ADD_TO_INPUT_GROUP, "Add user to input group");
    error!("  Then log out and back in");
    warn!(continuing = true, "Continuing without live input...");
}
