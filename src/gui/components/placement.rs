//! Position and size section

use eframe::egui;

use crate::config::{PositionMode, Preset, Settings};
use crate::constants::limits;
use crate::gui::constants::*;

/// Renders the placement controls and returns true if any changes were made
pub fn ui(ui: &mut egui::Ui, settings: &mut Settings) -> bool {
    let mut changed = false;

    ui.group(|ui| {
        ui.label(egui::RichText::new("Position & Size").strong());
        ui.add_space(ITEM_SPACING);

        ui.horizontal(|ui| {
            ui.label("Placement:");
            changed |= ui
                .radio_value(&mut settings.position.mode, PositionMode::Preset, "Screen corner")
                .changed();
            changed |= ui
                .radio_value(&mut settings.position.mode, PositionMode::Free, "Free")
                .changed();
        });

        match settings.position.mode {
            PositionMode::Preset => {
                ui.horizontal(|ui| {
                    ui.label("Anchor:");
                    egui::ComboBox::from_id_salt("position_preset")
                        .selected_text(settings.position.preset.label())
                        .show_ui(ui, |ui| {
                            for preset in Preset::ALL {
                                changed |= ui
                                    .selectable_value(&mut settings.position.preset, preset, preset.label())
                                    .changed();
                            }
                        });
                });
                ui.horizontal(|ui| {
                    ui.label("Edge padding:");
                    changed |= ui
                        .add(egui::DragValue::new(&mut settings.window.padding_from_edge).range(0..=PADDING_MAX))
                        .changed();
                });
            }
            PositionMode::Free => {
                ui.horizontal(|ui| {
                    ui.label("X:");
                    changed |= ui.add(egui::DragValue::new(&mut settings.position.x)).changed();
                    ui.label("Y:");
                    changed |= ui.add(egui::DragValue::new(&mut settings.position.y)).changed();
                });
                ui.label(egui::RichText::new("Drag the overlay to move it.").weak());
            }
        }

        ui.add_space(ITEM_SPACING);

        ui.horizontal(|ui| {
            ui.label("Scale:");
            changed |= ui
                .add(
                    egui::Slider::new(&mut settings.size.scale, limits::SCALE_MIN..=limits::SCALE_MAX)
                        .step_by(0.05)
                        .suffix("x"),
                )
                .changed();
        });

        ui.horizontal(|ui| {
            ui.label("Base size:");
            changed |= ui
                .add(egui::DragValue::new(&mut settings.window.width).range(BASE_SIZE_MIN..=BASE_SIZE_MAX))
                .changed();
            ui.label("x");
            changed |= ui
                .add(egui::DragValue::new(&mut settings.window.height).range(BASE_SIZE_MIN..=BASE_SIZE_MAX))
                .changed();
        });
    });

    changed
}
