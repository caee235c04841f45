use eframe::egui;

use crate::config::{InteractionMode, Settings};
use crate::gui::constants::*;

fn mode_hint(mode: InteractionMode) -> &'static str {
    match mode {
        InteractionMode::ClickThrough => "Clicks pass through the overlay.",
        InteractionMode::HoverToggle => "Clicks pass through except on the character, which can be dragged.",
        InteractionMode::Solid => "The overlay catches every click.",
    }
}

pub fn ui(ui: &mut egui::Ui, settings: &mut Settings) -> bool {
    let mut changed = false;

    ui.group(|ui| {
        ui.label(egui::RichText::new("Behavior").strong());
        ui.add_space(ITEM_SPACING);

        changed |= ui
            .checkbox(&mut settings.click_through_enabled, "Click-through")
            .changed();
        ui.add_enabled_ui(!settings.click_through_enabled, |ui| {
            changed |= ui
                .checkbox(&mut settings.draggable_when_not_click_through, "Draggable")
                .changed();
            changed |= ui.checkbox(&mut settings.locked, "Lock position").changed();
        });
        ui.label(egui::RichText::new(mode_hint(settings.interaction_mode())).weak());

        ui.add_space(ITEM_SPACING);

        ui.horizontal(|ui| {
            ui.label("Opacity:");
            changed |= ui.add(egui::Slider::new(&mut settings.opacity, 0.0..=1.0)).changed();
        });

        changed |= ui
            .checkbox(&mut settings.visible_on_all_workspaces, "Show on all workspaces")
            .changed();
        changed |= ui
            .checkbox(&mut settings.overlay_above_fullscreen, "Stay above fullscreen apps")
            .on_hover_text("Best effort; depends on the window manager")
            .changed();

        ui.add_space(ITEM_SPACING);

        changed |= ui
            .checkbox(&mut settings.input_hooks.enabled, "React to keyboard and mouse")
            .changed();
        ui.add_enabled_ui(settings.input_hooks.enabled, |ui| {
            changed |= ui
                .checkbox(&mut settings.input_hooks.ignore_modifier_keys, "Ignore modifier keys")
                .changed();
        });

        ui.add_space(ITEM_SPACING);

        ui.horizontal(|ui| {
            ui.label("Idle FPS:");
            changed |= ui
                .add(egui::Slider::new(&mut settings.animation.idle_fps, FPS_MIN..=FPS_MAX))
                .changed();
        });
        ui.horizontal(|ui| {
            ui.label("Hit FPS:");
            changed |= ui
                .add(egui::Slider::new(&mut settings.animation.hit_fps, FPS_MIN..=FPS_MAX))
                .changed();
        });
    });

    changed
}
