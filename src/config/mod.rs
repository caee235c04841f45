//! Configuration management for keypet
//!
//! - **settings**: the schema and its defaults
//! - **merge**: deep-merge and validation of JSON settings documents
//! - **store**: cached settings backed by the JSON settings file

pub mod merge;
pub mod settings;
pub mod store;

pub use merge::changed_fields;
pub use settings::{InteractionMode, PositionMode, Preset, Settings};
pub use store::{default_settings_path, SettingsStore};
