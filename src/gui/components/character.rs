//! Character pack picker and custom sprite import

use eframe::egui;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::animation::pack::{import_custom_sprite, list_packs, PackPaths, CUSTOM_PACK, CUSTOM_SLOTS};
use crate::config::settings::CustomPackSlots;
use crate::config::Settings;
use crate::gui::constants::*;

/// Slot labels shown in the UI, keyed like `CUSTOM_SLOTS`
const SLOT_LABELS: [(&str, &str); 4] = [
    ("idle", "Idle"),
    ("hitLeft", "Left hand"),
    ("hitRight", "Right hand"),
    ("hitBoth", "Both / mouse"),
];

/// File name field of a custom slot
pub fn slot_mut<'a>(slots: &'a mut CustomPackSlots, slot: &str) -> Option<&'a mut Option<String>> {
    match slot {
        "idle" => Some(&mut slots.idle),
        "hitLeft" => Some(&mut slots.hit_left),
        "hitRight" => Some(&mut slots.hit_right),
        "hitBoth" => Some(&mut slots.hit_both),
        _ => None,
    }
}

pub struct CharacterState {
    paths: PackPaths,
    packs: Vec<String>,
    /// Source file for the next import, typed or dropped onto the window
    import_path: String,
    import_error: Option<String>,
}

impl CharacterState {
    pub fn new(paths: PackPaths) -> Self {
        let packs = list_packs(&paths);
        Self {
            paths,
            packs,
            import_path: String::new(),
            import_error: None,
        }
    }

    pub fn refresh_packs(&mut self) {
        self.packs = list_packs(&self.paths);
    }

    pub fn set_import_path(&mut self, path: PathBuf) {
        self.import_path = path.display().to_string();
        self.import_error = None;
    }

    /// Copy the pending file into `slot` and point the settings at it
    pub fn import(&mut self, slot: &str, settings: &mut Settings) -> bool {
        let source = PathBuf::from(self.import_path.trim());
        match import_custom_sprite(slot, &source, &self.paths) {
            Ok(file_name) => {
                let Some(field) = slot_mut(&mut settings.character_packs.custom, slot) else {
                    return false;
                };
                *field = Some(file_name);
                self.import_path.clear();
                self.import_error = None;
                true
            }
            Err(e) => {
                warn!(slot, error = ?e, "Sprite import failed");
                self.import_error = Some(format!("{e:#}"));
                false
            }
        }
    }
}

pub fn ui(ui: &mut egui::Ui, settings: &mut Settings, state: &mut CharacterState) -> bool {
    let mut changed = false;

    ui.group(|ui| {
        ui.label(egui::RichText::new("Character").strong());
        ui.add_space(ITEM_SPACING);

        ui.horizontal(|ui| {
            ui.label("Pack:");
            egui::ComboBox::from_id_salt("character_pack")
                .selected_text(settings.active_character_pack_id.as_str())
                .show_ui(ui, |ui| {
                    for pack in &state.packs {
                        changed |= ui
                            .selectable_value(&mut settings.active_character_pack_id, pack.clone(), pack.as_str())
                            .changed();
                    }
                });
            if ui.button("\u{1F504}").on_hover_text("Rescan installed packs").clicked() {
                state.refresh_packs();
            }
        });

        if settings.active_character_pack_id != CUSTOM_PACK {
            return;
        }

        ui.add_space(ITEM_SPACING);
        ui.horizontal(|ui| {
            ui.label("PNG file:");
            ui.add(
                egui::TextEdit::singleline(&mut state.import_path)
                    .hint_text("path, or drop a file here")
                    .desired_width(f32::INFINITY),
            );
        });

        let has_source = !state.import_path.trim().is_empty();
        egui::Grid::new("custom_slots").num_columns(3).show(ui, |ui| {
            for ((slot, _state), (_, label)) in CUSTOM_SLOTS.iter().zip(SLOT_LABELS) {
                ui.label(label);
                let current = slot_mut(&mut settings.character_packs.custom, slot).and_then(|field| field.clone());
                ui.label(current.as_deref().unwrap_or("(bundled)"));
                ui.horizontal(|ui| {
                    if ui.add_enabled(has_source, egui::Button::new("Import")).clicked() && state.import(slot, settings) {
                        info!(slot, "Custom sprite assigned");
                        changed = true;
                    }
                    if ui.add_enabled(current.is_some(), egui::Button::new("Clear")).clicked()
                        && let Some(field) = slot_mut(&mut settings.character_packs.custom, slot)
                    {
                        *field = None;
                        changed = true;
                    }
                });
                ui.end_row();
            }
        });

        if let Some(error) = &state.import_error {
            ui.colored_label(STATUS_ERROR, error);
        }
    });

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::sprite::encode_png;
    use std::fs;

    fn temp_root(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("keypet-gui-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_slot_names_cover_custom_slots() {
        let mut slots = CustomPackSlots::default();
        for (slot, _) in CUSTOM_SLOTS {
            assert!(slot_mut(&mut slots, slot).is_some(), "{slot}");
        }
        assert!(slot_mut(&mut slots, "hitNone").is_none());
    }

    #[test]
    fn test_import_assigns_slot() {
        let root = temp_root("import");
        let source = root.join("left.png");
        fs::write(&source, encode_png(2, 2, &[255u8; 16])).unwrap();

        let mut state = CharacterState::new(PackPaths::under(&root));
        let mut settings = Settings::default();
        state.set_import_path(source);
        assert!(state.import("hitLeft", &mut settings));

        let stored = settings.character_packs.custom.hit_left.clone().unwrap();
        assert!(stored.starts_with("hitLeft-") && stored.ends_with(".png"));
        assert!(root.join("custom").join(&stored).is_file());
        assert!(state.import_path.is_empty());
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_failed_import_keeps_settings() {
        let root = temp_root("import-fail");
        let source = root.join("not-a.png");
        fs::write(&source, b"hello").unwrap();

        let mut state = CharacterState::new(PackPaths::under(&root));
        let mut settings = Settings::default();
        state.set_import_path(source);
        assert!(!state.import("idle", &mut settings));
        assert_eq!(settings, Settings::default());
        assert!(state.import_error.is_some());
        let _ = fs::remove_dir_all(&root);
    }
}
