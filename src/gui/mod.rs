//! Settings window (separate process, egui)

pub mod components;
mod constants;
mod settings_window;

pub use settings_window::run_settings_window;
