//! GUI-specific constants for layout, status colors and intervals

use egui;

/// Settings window dimensions
pub const WINDOW_WIDTH: f32 = 460.0;
pub const WINDOW_HEIGHT: f32 = 720.0;
pub const WINDOW_MIN_WIDTH: f32 = 380.0;
pub const WINDOW_MIN_HEIGHT: f32 = 480.0;

/// Layout spacing
pub const SECTION_SPACING: f32 = 15.0;
pub const ITEM_SPACING: f32 = 8.0;
pub const PADDING: f32 = 10.0;

/// Status colors
pub const STATUS_OK: egui::Color32 = egui::Color32::from_rgb(0, 200, 0);
pub const STATUS_ERROR: egui::Color32 = egui::Color32::from_rgb(200, 0, 0);
pub const STATUS_PENDING: egui::Color32 = egui::Color32::from_rgb(200, 200, 0);

/// How often pushes from the overlay are drained while idle
pub const PUSH_POLL_INTERVAL_MS: u64 = 100;

/// Slider bounds
pub const FPS_MIN: f64 = 1.0;
pub const FPS_MAX: f64 = 60.0;
pub const BASE_SIZE_MIN: u32 = 32;
pub const BASE_SIZE_MAX: u32 = 512;
pub const PADDING_MAX: u32 = 200;
