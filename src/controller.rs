//! Overlay process main loop
//!
//! Everything that touches settings, the window, the input hook or the
//! settings window child runs here on one thread. Other contexts (hook
//! listeners, X11 event thread, IPC connections, display, signals) talk to it
//! through `ControllerEvent`s.

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Child, Command};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::SystemTime;
use tracing::{debug, error, info, warn};

use crate::config::{InteractionMode, Settings, SettingsStore};
use crate::display::{DisplayHandle, DisplayMessage};
use crate::input::{hook, EventBus, HookEvent, InputHook, Shortcut};
use crate::ipc::server::Subscriber;
use crate::ipc::{Broadcast, Reply, Request};
use crate::types::Point;
use crate::window::{PointerInteraction, PointerOutcome, SurfaceFactory, WindowController, WindowEvent};

pub enum ControllerEvent {
    Hook(HookEvent),
    Window(WindowEvent),
    /// `reply` is `None` for fire-and-forget channels
    Request {
        request: Request,
        reply: Option<Sender<Reply>>,
    },
    Subscribe(Subscriber),
    Shutdown,
}

/// The settings window child process
pub struct SettingsWindow {
    program: PathBuf,
    args: Vec<OsString>,
    child: Option<Child>,
}

impl SettingsWindow {
    pub fn new(program: PathBuf, args: Vec<OsString>) -> Self {
        Self {
            program,
            args,
            child: None,
        }
    }

    /// `keypet --settings --socket <path>` using the running executable
    pub fn for_socket(socket: &std::path::Path) -> Result<Self> {
        let exe_path = std::env::current_exe().context("Failed to resolve executable path")?;
        Ok(Self::new(
            exe_path,
            vec!["--settings".into(), "--socket".into(), socket.as_os_str().to_owned()],
        ))
    }

    pub fn is_open(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!(pid = child.id(), exit = ?status.code(), "Settings window exited");
                self.child = None;
                false
            }
            Err(e) => {
                error!(error = ?e, "Failed to query settings window status");
                self.child = None;
                false
            }
        }
    }

    /// Spawn the window unless one is already running
    pub fn open(&mut self) -> Result<()> {
        if self.is_open() {
            debug!("Settings window already open");
            return Ok(());
        }
        let child = Command::new(&self.program)
            .args(&self.args)
            .spawn()
            .context("Failed to spawn settings window")?;
        info!(pid = child.id(), "Opened settings window");
        self.child = Some(child);
        Ok(())
    }

    /// Ask the window to exit (SIGTERM) and reap it
    pub fn close(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        info!(pid = child.id(), "Closing settings window");

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;
            if let Err(e) = kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM) {
                warn!(error = %e, "Failed to signal settings window, killing it");
                let _ = child.kill();
            }
        }
        #[cfg(not(unix))]
        let _ = child.kill();

        if let Err(e) = child.wait() {
            warn!(error = ?e, "Failed to wait for settings window exit");
        }
    }
}

pub struct Controller<F: SurfaceFactory, H: InputHook> {
    store: SettingsStore,
    settings: Settings,
    windows: WindowController<F>,
    hook: H,
    bus: EventBus,
    pointer: PointerInteraction,
    subscribers: Vec<Subscriber>,
    display: DisplayHandle,
    settings_window: SettingsWindow,
    events: Sender<ControllerEvent>,
    running: bool,
}

impl<F: SurfaceFactory, H: InputHook> Controller<F, H> {
    pub fn new(
        mut store: SettingsStore,
        windows: WindowController<F>,
        hook: H,
        display: DisplayHandle,
        settings_window: SettingsWindow,
        events: Sender<ControllerEvent>,
    ) -> Self {
        let settings = store.get_all();
        Self {
            store,
            settings,
            windows,
            hook,
            bus: EventBus::new(),
            pointer: PointerInteraction::new(),
            subscribers: Vec::new(),
            display,
            settings_window,
            events,
            running: false,
        }
    }

    /// Create the overlay and start the hook
    pub fn start(&mut self) -> Result<()> {
        if self.windows.create(&self.settings)? {
            self.attach_display();
        }
        self.sync_hook();
        self.running = true;
        Ok(())
    }

    /// Process events until shutdown, then tear everything down
    pub fn run(mut self, events: Receiver<ControllerEvent>) -> Result<()> {
        if let Err(e) = self.start() {
            self.teardown();
            return Err(e);
        }
        info!("Overlay running");

        while self.running {
            let Ok(event) = events.recv() else {
                warn!("Controller event channel closed");
                break;
            };
            self.handle(event);
        }

        self.teardown();
        Ok(())
    }

    pub fn handle(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::Hook(HookEvent::Input(raw)) => {
                let Some(event) = self.bus.handle(raw, &self.settings.input_hooks, SystemTime::now()) else {
                    return;
                };
                if self.windows.is_alive() {
                    self.broadcast(Broadcast::InputEvent(event));
                }
            }
            ControllerEvent::Hook(HookEvent::Shortcut(Shortcut::OpenSettings)) => {
                info!("Settings shortcut pressed");
                self.open_settings_window();
            }
            ControllerEvent::Window(event) => self.handle_window_event(event),
            ControllerEvent::Request { request, reply } => {
                let response = self.handle_request(request);
                if let Some(reply) = reply {
                    // Connection may have timed out and gone away
                    let _ = reply.send(response);
                }
            }
            ControllerEvent::Subscribe(subscriber) => {
                debug!(client = subscriber.id(), "Subscriber registered");
                self.subscribers.push(subscriber);
            }
            ControllerEvent::Shutdown => {
                info!("Shutdown requested");
                self.running = false;
            }
        }
    }

    pub fn handle_request(&mut self, request: Request) -> Reply {
        match request {
            Request::GetAllSettings => Reply::Settings(self.settings.clone()),
            Request::UpdateSettings(partial) => {
                let result = self.store.update(&partial);
                self.settings_reply(result)
            }
            Request::ResetSettings => {
                let result = self.store.reset();
                self.settings_reply(result)
            }
            Request::ResetPosition => {
                let result = self.store.reset_position();
                self.settings_reply(result)
            }
            Request::EnableClickThrough => {
                if self.hover_toggle_active() && !self.pointer.is_dragging() {
                    self.set_click_through(true);
                }
                Reply::Ack
            }
            Request::DisableClickThrough => {
                if self.hover_toggle_active() {
                    self.set_click_through(false);
                }
                Reply::Ack
            }
            Request::DragEnd => {
                self.persist_drag_position();
                Reply::Ack
            }
            Request::ResetCount => {
                self.bus.reset_count();
                info!("Input counter reset");
                Reply::Ack
            }
            Request::OpenSettings => {
                self.open_settings_window();
                Reply::Ack
            }
            Request::CloseSettingsWindow => {
                self.settings_window.close();
                Reply::Ack
            }
            Request::Ping => Reply::Pong,
        }
    }

    fn settings_reply(&mut self, result: Result<Settings>) -> Reply {
        match result {
            Ok(settings) => {
                self.settings_changed(settings);
                Reply::Settings(self.settings.clone())
            }
            Err(e) => {
                error!(error = ?e, "Settings change failed, keeping previous settings");
                Reply::Error(format!("{e:#}"))
            }
        }
    }

    /// Push a new settings snapshot to the window, hook, display and subscribers
    fn settings_changed(&mut self, settings: Settings) {
        let mode_changed = settings.interaction_mode() != self.settings.interaction_mode();
        self.settings = settings;

        if mode_changed {
            self.pointer.cancel();
        }
        if let Err(e) = self.windows.apply_settings(&self.settings) {
            error!(error = ?e, "Failed to apply settings to overlay");
        }
        self.sync_hook();
        self.broadcast(Broadcast::SettingsChanged(self.settings.clone()));
    }

    fn broadcast(&mut self, message: Broadcast) {
        self.display.send(DisplayMessage::Broadcast(message.clone()));
        self.subscribers.retain(|subscriber| match subscriber.push(&message) {
            Ok(()) => true,
            Err(e) => {
                debug!(client = subscriber.id(), error = %e, "Dropping subscriber");
                false
            }
        });
    }

    fn hover_toggle_active(&self) -> bool {
        self.settings.interaction_mode() == InteractionMode::HoverToggle
    }

    fn set_click_through(&mut self, enabled: bool) {
        if self.windows.is_alive() && self.windows.is_click_through() == enabled {
            return;
        }
        if let Err(e) = self.windows.set_click_through(enabled) {
            warn!(enabled, error = ?e, "Failed to toggle click-through");
        }
    }

    /// Start or stop the hook to match `inputHooks.enabled`
    fn sync_hook(&mut self) {
        let enabled = self.settings.input_hooks.enabled;
        if enabled == self.hook.is_running() {
            return;
        }
        if !enabled {
            info!("Input hooks disabled");
            self.hook.stop();
            return;
        }

        let events = self.events.clone();
        let sink: hook::HookSink = Arc::new(move |event| {
            let _ = events.send(ControllerEvent::Hook(event));
        });
        match self.hook.start(sink) {
            Ok(()) => info!("Input hooks enabled"),
            Err(e) => {
                error!(error = ?e, "Failed to start input hook, continuing without live input");
                hook::print_permission_error();
            }
        }
    }

    fn attach_display(&mut self) {
        match self.windows.frame_sink() {
            Ok(Some(sink)) => self.display.send(DisplayMessage::Attach(sink)),
            Ok(None) => {}
            Err(e) => error!(error = ?e, "Failed to create drawing target for overlay"),
        }
    }

    fn handle_window_event(&mut self, event: WindowEvent) {
        match event {
            WindowEvent::ButtonPress { button, root } => {
                let origin = match self.windows.bounds() {
                    Ok(Some(bounds)) => Point::new(bounds.x, bounds.y),
                    Ok(None) => return,
                    Err(e) => {
                        warn!(error = ?e, "Failed to read overlay bounds");
                        return;
                    }
                };
                self.pointer.on_press(button, root, origin, self.settings.can_drag());
            }
            WindowEvent::Motion { root } => {
                if let PointerOutcome::MoveTo(origin) = self.pointer.on_motion(root)
                    && let Err(e) = self.windows.move_to(origin.x, origin.y)
                {
                    warn!(error = ?e, "Failed to move overlay");
                }
            }
            WindowEvent::ButtonRelease { button, root } => match self.pointer.on_release(button, root) {
                PointerOutcome::DragEnd => self.persist_drag_position(),
                PointerOutcome::OpenSettings => self.open_settings_window(),
                PointerOutcome::MoveTo(_) | PointerOutcome::None => {}
            },
            WindowEvent::Destroyed => {
                warn!("Overlay window destroyed externally, shutting down");
                self.windows.forget();
                self.pointer.cancel();
                self.display.send(DisplayMessage::Detach);
                self.running = false;
            }
        }
    }

    /// Store the live window position as free-mode coordinates
    fn persist_drag_position(&mut self) {
        let bounds = match self.windows.bounds() {
            Ok(Some(bounds)) => bounds,
            Ok(None) => return,
            Err(e) => {
                warn!(error = ?e, "Failed to read overlay bounds after drag");
                return;
            }
        };
        info!(x = bounds.x, y = bounds.y, "Overlay dragged, saving position");
        match self.store.set_free_position(bounds.x, bounds.y) {
            Ok(settings) => self.settings_changed(settings),
            Err(e) => error!(error = ?e, "Failed to save dragged position"),
        }
    }

    fn open_settings_window(&mut self) {
        if let Err(e) = self.settings_window.open() {
            error!(error = ?e, "Failed to open settings window");
        }
    }

    /// Release the hook, close the child, destroy the window, stop the display
    pub fn teardown(&mut self) {
        info!("Tearing down overlay");
        self.hook.stop();
        self.settings_window.close();
        if let Err(e) = self.windows.destroy() {
            warn!(error = ?e, "Failed to destroy overlay during teardown");
        }
        self.display.shutdown();
        self.running = false;
    }
}

/// Turn SIGINT/SIGTERM into `ControllerEvent::Shutdown`
#[cfg(unix)]
pub fn spawn_signal_listener(events: Sender<ControllerEvent>) -> Result<thread::JoinHandle<()>> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("Failed to register signal handlers")?;
    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                info!(signal, "Received termination signal");
                let _ = events.send(ControllerEvent::Shutdown);
            }
        })
        .context("Failed to spawn signal thread")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::RawInput;
    use crate::platform::Platform;
    use crate::types::{Bounds, WorkArea};
    use crate::window::mock::{Call, CallLog, MockFactory};
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::mpsc;

    /// Hook that records start/stop and can inject events
    #[derive(Default, Clone)]
    struct FakeHook {
        sink: Rc<RefCell<Option<hook::HookSink>>>,
        fail: bool,
    }

    impl InputHook for FakeHook {
        fn start(&mut self, sink: hook::HookSink) -> Result<()> {
            if self.fail {
                anyhow::bail!("permission denied");
            }
            *self.sink.borrow_mut() = Some(sink);
            Ok(())
        }

        fn stop(&mut self) {
            *self.sink.borrow_mut() = None;
        }

        fn is_running(&self) -> bool {
            self.sink.borrow().is_some()
        }
    }

    struct Harness {
        controller: Controller<MockFactory, FakeHook>,
        hook: FakeHook,
        calls: CallLog,
        display: Receiver<DisplayMessage>,
        events: Receiver<ControllerEvent>,
        settings_path: PathBuf,
    }

    impl Drop for Harness {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.settings_path);
        }
    }

    fn harness(name: &str, initial: serde_json::Value) -> Harness {
        let settings_path = std::env::temp_dir().join(format!("keypet-controller-{}-{}.json", name, std::process::id()));
        std::fs::write(&settings_path, initial.to_string()).unwrap();

        let factory = MockFactory::new(WorkArea::new(1920, 1080));
        let calls = factory.calls.clone();
        let hook = FakeHook::default();
        let (display, display_rx) = DisplayHandle::detached();
        let (events_tx, events_rx) = mpsc::channel();

        let mut controller = Controller::new(
            SettingsStore::new(settings_path.clone()),
            WindowController::new(factory, Platform::Other),
            hook.clone(),
            display,
            SettingsWindow::new(PathBuf::from("sleep"), vec!["5".into()]),
            events_tx,
        );
        controller.start().unwrap();
        MockFactory::take_calls(&calls);

        Harness {
            controller,
            hook,
            calls,
            display: display_rx,
            events: events_rx,
            settings_path,
        }
    }

    impl Harness {
        fn broadcasts(&self) -> Vec<Broadcast> {
            self.display
                .try_iter()
                .filter_map(|message| match message {
                    DisplayMessage::Broadcast(broadcast) => Some(broadcast),
                    _ => None,
                })
                .collect()
        }
    }

    fn key(code: u16) -> ControllerEvent {
        ControllerEvent::Hook(HookEvent::Input(RawInput::KeyDown { code }))
    }

    #[test]
    fn test_start_attaches_display_and_starts_hook() {
        let h = harness("start", json!({}));
        assert!(h.hook.is_running());
        assert!(matches!(h.display.try_recv(), Ok(DisplayMessage::Attach(_))));
    }

    #[test]
    fn test_input_is_counted_and_broadcast() {
        let mut h = harness("input", json!({}));
        h.controller.handle(key(30));
        h.controller.handle(key(36));

        let counts: Vec<u64> = h
            .broadcasts()
            .into_iter()
            .filter_map(|broadcast| match broadcast {
                Broadcast::InputEvent(event) => Some(event.count),
                _ => None,
            })
            .collect();
        assert_eq!(counts, vec![1, 2]);

        h.controller.handle_request(Request::ResetCount);
        h.controller.handle(key(30));
        assert!(matches!(
            h.broadcasts().as_slice(),
            [Broadcast::InputEvent(event)] if event.count == 1
        ));
    }

    #[test]
    fn test_hook_events_reach_controller_channel() {
        let h = harness("hook-sink", json!({}));
        let sink = h.hook.sink.borrow().clone().unwrap();
        sink(HookEvent::Input(RawInput::MouseDown { button: 0x110 }));
        assert!(matches!(
            h.events.try_recv(),
            Ok(ControllerEvent::Hook(HookEvent::Input(RawInput::MouseDown { .. })))
        ));
    }

    #[test]
    fn test_update_applies_and_broadcasts() {
        let mut h = harness("update", json!({}));
        let reply = h.controller.handle_request(Request::UpdateSettings(json!({"opacity": 0.5})));

        let Reply::Settings(settings) = reply else {
            panic!("expected settings reply");
        };
        assert_eq!(settings.opacity, 0.5);
        assert!(MockFactory::take_calls(&h.calls).contains(&Call::SetOpacity(0.5)));
        assert!(matches!(
            h.broadcasts().as_slice(),
            [Broadcast::SettingsChanged(s)] if s.opacity == 0.5
        ));
    }

    #[test]
    fn test_disabling_hooks_stops_hook() {
        let mut h = harness("hooks", json!({}));
        h.controller
            .handle_request(Request::UpdateSettings(json!({"inputHooks": {"enabled": false}})));
        assert!(!h.hook.is_running());

        h.controller
            .handle_request(Request::UpdateSettings(json!({"inputHooks": {"enabled": true}})));
        assert!(h.hook.is_running());
    }

    #[test]
    fn test_hook_start_failure_is_not_fatal() {
        let settings_path = std::env::temp_dir().join(format!("keypet-controller-fail-{}.json", std::process::id()));
        let (display, _display_rx) = DisplayHandle::detached();
        let (events_tx, _events_rx) = mpsc::channel();
        let mut controller = Controller::new(
            SettingsStore::new(settings_path),
            WindowController::new(MockFactory::new(WorkArea::new(800, 600)), Platform::Other),
            FakeHook {
                fail: true,
                ..FakeHook::default()
            },
            display,
            SettingsWindow::new(PathBuf::from("sleep"), vec!["5".into()]),
            events_tx,
        );
        controller.start().unwrap();
        assert_eq!(controller.handle_request(Request::Ping), Reply::Pong);
    }

    #[test]
    fn test_click_through_requests_only_in_hover_mode() {
        let mut h = harness("hover", json!({"clickThroughEnabled": true}));
        h.controller.handle_request(Request::DisableClickThrough);
        assert!(MockFactory::take_calls(&h.calls).is_empty());

        h.controller
            .handle_request(Request::UpdateSettings(json!({"clickThroughEnabled": false})));
        MockFactory::take_calls(&h.calls);

        h.controller.handle_request(Request::DisableClickThrough);
        h.controller.handle_request(Request::EnableClickThrough);
        assert_eq!(
            MockFactory::take_calls(&h.calls),
            vec![
                Call::SetIgnoreMouseEvents(false, false),
                Call::SetIgnoreMouseEvents(true, false)
            ]
        );

        // Repeats of the current state do not touch the window
        h.controller.handle_request(Request::EnableClickThrough);
        assert!(MockFactory::take_calls(&h.calls).is_empty());
    }

    #[test]
    fn test_drag_moves_window_and_persists_free_position() {
        let mut h = harness("drag", json!({"clickThroughEnabled": false}));
        h.controller.handle_request(Request::DisableClickThrough);

        h.controller.handle(ControllerEvent::Window(WindowEvent::ButtonPress {
            button: 1,
            root: Point::new(900, 950),
        }));
        h.controller.handle(ControllerEvent::Window(WindowEvent::Motion {
            root: Point::new(800, 900),
        }));
        // Hover leaving mid-drag must not make the window click-through
        MockFactory::take_calls(&h.calls);
        h.controller.handle_request(Request::EnableClickThrough);
        assert!(MockFactory::take_calls(&h.calls).is_empty());

        h.controller.handle(ControllerEvent::Window(WindowEvent::ButtonRelease {
            button: 1,
            root: Point::new(800, 900),
        }));

        let settings = &h.controller.settings;
        assert_eq!(settings.position.mode, crate::config::PositionMode::Free);
        assert_eq!((settings.position.x, settings.position.y), (796, 882));

        let reply = h.controller.handle_request(Request::ResetPosition);
        let Reply::Settings(settings) = reply else {
            panic!("expected settings reply");
        };
        assert_eq!(settings.position, Settings::default().position);
        assert!(MockFactory::take_calls(&h.calls).contains(&Call::SetBounds(Bounds::new(896, 932, 128, 128))));
    }

    #[test]
    fn test_locked_overlay_does_not_drag() {
        let mut h = harness("locked", json!({"clickThroughEnabled": false, "locked": true}));
        h.controller.handle(ControllerEvent::Window(WindowEvent::ButtonPress {
            button: 1,
            root: Point::new(900, 950),
        }));
        h.controller.handle(ControllerEvent::Window(WindowEvent::Motion {
            root: Point::new(800, 900),
        }));
        assert!(MockFactory::take_calls(&h.calls).is_empty());
    }

    #[test]
    fn test_settings_window_single_instance() {
        let mut h = harness("settings-window", json!({}));
        h.controller.handle_request(Request::OpenSettings);
        assert!(h.controller.settings_window.is_open());
        let pid = h.controller.settings_window.child.as_ref().map(Child::id);

        h.controller
            .handle(ControllerEvent::Hook(HookEvent::Shortcut(Shortcut::OpenSettings)));
        assert_eq!(h.controller.settings_window.child.as_ref().map(Child::id), pid);

        h.controller.handle_request(Request::CloseSettingsWindow);
        assert!(!h.controller.settings_window.is_open());
    }

    #[test]
    fn test_external_destroy_stops_loop() {
        let mut h = harness("destroyed", json!({}));
        h.controller.running = true;
        h.controller.handle(ControllerEvent::Window(WindowEvent::Destroyed));
        assert!(!h.controller.running);
        assert!(!h.controller.windows.is_alive());
    }

    #[test]
    fn test_teardown_releases_everything() {
        let mut h = harness("teardown", json!({}));
        h.controller.handle_request(Request::OpenSettings);
        h.controller.teardown();

        assert!(!h.hook.is_running());
        assert!(!h.controller.settings_window.is_open());
        assert_eq!(MockFactory::take_calls(&h.calls), vec![Call::Destroy]);
        assert!(h.display.try_iter().any(|m| matches!(m, DisplayMessage::Shutdown)));
    }
}
