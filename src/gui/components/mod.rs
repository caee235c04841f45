//! Sections of the settings window

pub mod behavior;
pub mod character;
pub mod placement;
