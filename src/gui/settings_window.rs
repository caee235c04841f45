//! Settings window implemented with egui/eframe
//!
//! Runs as its own process and talks to the overlay over the control socket.
//! Edits go out as partial updates; the overlay's reply (and any
//! `settings:changed` push) is what the window shows afterwards.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use eframe::{egui, CreationContext, NativeOptions};
use serde_json::Value;
use tracing::{error, info, warn};

use super::components::{behavior, character, placement};
use super::constants::*;
use crate::animation::pack::PackPaths;
use crate::config::{changed_fields, Settings};
use crate::ipc::{Broadcast, ControlClient, Reply, Request};

const RECONNECT_INTERVAL_MS: u64 = 1000;

struct StatusMessage {
    text: String,
    color: egui::Color32,
}

/// Settings as confirmed by the overlay plus the user's unsent edits
#[derive(Debug, Default)]
struct SettingsModel {
    confirmed: Settings,
    draft: Settings,
    input_count: Option<u64>,
}

impl SettingsModel {
    fn confirm(&mut self, settings: Settings) {
        self.draft = settings.clone();
        self.confirmed = settings;
    }

    fn revert(&mut self) {
        self.draft = self.confirmed.clone();
    }

    /// Top-level sections the draft changed, or `None` if nothing did
    fn pending_patch(&self) -> Option<Value> {
        let patch = changed_fields(&self.confirmed, &self.draft);
        patch.as_object().is_some_and(|fields| !fields.is_empty()).then_some(patch)
    }

    fn apply_push(&mut self, push: Broadcast) {
        match push {
            Broadcast::SettingsChanged(settings) => self.confirm(settings),
            Broadcast::InputEvent(event) => self.input_count = Some(event.count),
        }
    }
}

struct SettingsApp {
    socket: PathBuf,
    client: Option<ControlClient>,
    model: SettingsModel,
    character: character::CharacterState,
    status: Option<StatusMessage>,
    last_connect_attempt: Instant,
}

impl SettingsApp {
    fn new(_cc: &CreationContext<'_>, socket: PathBuf, paths: PackPaths) -> Self {
        info!(socket = %socket.display(), "Initializing settings window");
        let mut app = Self {
            socket,
            client: None,
            model: SettingsModel::default(),
            character: character::CharacterState::new(paths),
            status: None,
            last_connect_attempt: Instant::now(),
        };
        app.connect();
        app
    }

    fn connect(&mut self) {
        self.last_connect_attempt = Instant::now();
        let result = ControlClient::connect_to(&self.socket).and_then(|mut client| {
            match client.request(Request::GetAllSettings)? {
                Reply::Settings(settings) => Ok((client, settings)),
                other => Err(anyhow!("Unexpected reply to settings:getAll: {:?}", other)),
            }
        });

        match result {
            Ok((client, settings)) => {
                info!("Connected to overlay");
                self.client = Some(client);
                self.model.confirm(settings);
                self.set_status("Connected", STATUS_OK);
            }
            Err(e) => {
                warn!(error = ?e, "Overlay not reachable");
                self.client = None;
                self.set_status(format!("Overlay not reachable: {e:#}"), STATUS_ERROR);
            }
        }
    }

    fn set_status(&mut self, text: impl Into<String>, color: egui::Color32) {
        self.status = Some(StatusMessage {
            text: text.into(),
            color,
        });
    }

    fn request(&mut self, request: Request) -> Result<Reply> {
        let client = self.client.as_mut().context("Not connected to overlay")?;
        client.request(request)
    }

    /// Send a request that answers with the resulting settings
    fn request_settings(&mut self, request: Request, done: &str) {
        match self.request(request) {
            Ok(Reply::Settings(settings)) => {
                self.model.confirm(settings);
                self.set_status(done, STATUS_OK);
            }
            Ok(other) => {
                warn!(reply = ?other, "Unexpected reply");
                self.model.revert();
            }
            Err(e) => {
                error!(error = ?e, "Settings request failed");
                self.model.revert();
                self.set_status(format!("Not saved: {e:#}"), STATUS_ERROR);
            }
        }
    }

    fn fire(&mut self, request: Request) {
        let result = match self.client.as_mut() {
            Some(client) => client.fire(request),
            None => Err(anyhow!("Not connected to overlay")),
        };
        if let Err(e) = result {
            error!(error = ?e, "Failed to send request");
            self.set_status(format!("{e:#}"), STATUS_ERROR);
        }
    }

    fn poll_pushes(&mut self) {
        let Some(client) = self.client.as_ref() else {
            if self.last_connect_attempt.elapsed() >= Duration::from_millis(RECONNECT_INTERVAL_MS) {
                self.connect();
            }
            return;
        };

        loop {
            match client.try_recv_push() {
                Ok(Some(push)) => self.model.apply_push(push),
                Ok(None) => break,
                Err(e) => {
                    warn!(error = ?e, "Lost connection to overlay");
                    self.client = None;
                    self.last_connect_attempt = Instant::now();
                    self.set_status("Connection to overlay lost", STATUS_ERROR);
                    break;
                }
            }
        }
    }

    fn take_dropped_file(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.iter().find_map(|file| file.path.clone()));
        if let Some(path) = dropped {
            info!(path = %path.display(), "File dropped for import");
            self.character.set_import_path(path);
        }
    }

    fn status_ui(&mut self, ui: &mut egui::Ui) {
        ui.group(|ui| {
            ui.label(egui::RichText::new("Overlay").strong());
            if let Some(message) = &self.status {
                ui.colored_label(message.color, &message.text);
            } else {
                ui.colored_label(STATUS_PENDING, "Connecting...");
            }

            ui.horizontal(|ui| {
                let count = self
                    .model
                    .input_count
                    .map_or_else(|| "-".to_string(), |count| count.to_string());
                ui.label(format!("Inputs counted: {count}"));
                if ui.button("Reset counter").clicked() {
                    self.fire(Request::ResetCount);
                    self.model.input_count = Some(0);
                }
            });
        });
    }
}

impl eframe::App for SettingsApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_pushes();
        self.take_dropped_file(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.add_space(PADDING);
                ui.heading("keypet Settings");
                ui.add_space(SECTION_SPACING);

                self.status_ui(ui);
                ui.add_space(SECTION_SPACING);

                let connected = self.client.is_some();
                let mut changed = false;
                ui.add_enabled_ui(connected, |ui| {
                    changed |= placement::ui(ui, &mut self.model.draft);
                    ui.add_space(SECTION_SPACING);
                    changed |= behavior::ui(ui, &mut self.model.draft);
                    ui.add_space(SECTION_SPACING);
                    changed |= character::ui(ui, &mut self.model.draft, &mut self.character);
                });
                if changed && let Some(patch) = self.model.pending_patch() {
                    self.request_settings(Request::UpdateSettings(patch), "Saved");
                }

                ui.add_space(SECTION_SPACING);
                ui.separator();
                ui.add_space(ITEM_SPACING);

                ui.horizontal(|ui| {
                    ui.add_enabled_ui(connected, |ui| {
                        if ui.button("Reset position").clicked() {
                            self.request_settings(Request::ResetPosition, "Position reset");
                        }
                        if ui.button("Reset all").clicked() {
                            self.request_settings(Request::ResetSettings, "Settings reset to defaults");
                        }
                    });
                    if ui.button("Close").clicked() {
                        if self.client.is_some() {
                            self.fire(Request::CloseSettingsWindow);
                        }
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
            });
        });

        ctx.request_repaint_after(Duration::from_millis(PUSH_POLL_INTERVAL_MS));
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        info!("Settings window exiting");
    }
}

pub fn run_settings_window(socket: PathBuf, paths: PackPaths) -> Result<()> {
    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([WINDOW_WIDTH, WINDOW_HEIGHT])
            .with_min_inner_size([WINDOW_MIN_WIDTH, WINDOW_MIN_HEIGHT])
            .with_drag_and_drop(true)
            .with_title("keypet Settings"),
        ..Default::default()
    };

    eframe::run_native(
        "keypet Settings",
        options,
        Box::new(move |cc| Ok(Box::new(SettingsApp::new(cc, socket, paths)))),
    )
    .map_err(|err| anyhow!("Failed to launch settings window: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Action, InputEvent, InputKind};
    use serde_json::json;

    #[test]
    fn test_no_patch_without_edits() {
        let model = SettingsModel::default();
        assert_eq!(model.pending_patch(), None);
    }

    #[test]
    fn test_patch_carries_changed_sections_only() {
        let mut model = SettingsModel::default();
        model.draft.opacity = 0.4;
        model.draft.animation.idle_fps = 12.0;

        let patch = model.pending_patch().unwrap();
        assert_eq!(patch["opacity"], json!(0.4));
        assert_eq!(patch["animation"]["idleFps"], json!(12.0));
        assert_eq!(patch.as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_revert_discards_draft() {
        let mut model = SettingsModel::default();
        model.draft.locked = true;
        model.revert();
        assert!(!model.draft.locked);
        assert_eq!(model.pending_patch(), None);
    }

    #[test]
    fn test_pushes_update_model() {
        let mut model = SettingsModel::default();
        model.draft.opacity = 0.1;

        let mut pushed = Settings::default();
        pushed.size.scale = 1.5;
        model.apply_push(Broadcast::SettingsChanged(pushed.clone()));
        assert_eq!(model.confirmed, pushed);
        assert_eq!(model.draft, pushed);

        model.apply_push(Broadcast::InputEvent(InputEvent {
            kind: InputKind::Keypress,
            action: Action::Left,
            count: 9,
            timestamp: 0,
        }));
        assert_eq!(model.input_count, Some(9));
    }
}
