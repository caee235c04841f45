//! Settings schema and hardcoded defaults
//!
//! The JSON shape (camelCase keys) is the persisted format and the payload of
//! the `settings:*` channels. Every key is always present after validation.

use serde::{Deserialize, Serialize};

/// How the overlay position is determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionMode {
    /// Anchored to a named screen location, recomputed on screen/size change
    Preset,
    /// Pinned to stored coordinates (set by dragging)
    Free,
}

impl PositionMode {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "preset" => Some(Self::Preset),
            "free" => Some(Self::Free),
            _ => None,
        }
    }
}

/// Named screen anchor used in preset mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Preset {
    BottomCenter,
    BottomLeft,
    BottomRight,
    TopLeft,
    TopRight,
}

impl Preset {
    pub const ALL: [Preset; 5] = [
        Self::BottomCenter,
        Self::BottomLeft,
        Self::BottomRight,
        Self::TopLeft,
        Self::TopRight,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::BottomCenter => "bottomCenter",
            Self::BottomLeft => "bottomLeft",
            Self::BottomRight => "bottomRight",
            Self::TopLeft => "topLeft",
            Self::TopRight => "topRight",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::BottomCenter => "Bottom center",
            Self::BottomLeft => "Bottom left",
            Self::BottomRight => "Bottom right",
            Self::TopLeft => "Top left",
            Self::TopRight => "Top right",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|preset| preset.name() == name)
    }

    /// Lenient lookup: unknown names anchor at the bottom center
    pub fn from_name(name: &str) -> Self {
        Self::parse(name).unwrap_or(Self::BottomCenter)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSettings {
    pub mode: PositionMode,
    pub preset: Preset,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeSettings {
    /// Multiplier applied to the base window dimensions
    pub scale: f64,
}

/// Base window dimensions before scaling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSettings {
    pub width: u32,
    pub height: u32,
    /// Distance from the screen edge in preset mode
    pub padding_from_edge: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationSettings {
    pub idle_fps: f64,
    pub hit_fps: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputHookSettings {
    pub enabled: bool,
    pub ignore_modifier_keys: bool,
}

/// File names (inside the custom sprite directory) for the custom pack
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomPackSlots {
    pub idle: Option<String>,
    pub hit_left: Option<String>,
    pub hit_right: Option<String>,
    pub hit_both: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterPacks {
    pub custom: CustomPackSlots,
}

/// Process-wide overlay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub position: PositionSettings,
    pub size: SizeSettings,
    pub window: WindowSettings,
    pub click_through_enabled: bool,
    pub draggable_when_not_click_through: bool,
    pub locked: bool,
    pub opacity: f64,
    pub visible_on_all_workspaces: bool,
    pub overlay_above_fullscreen: bool,
    pub animation: AnimationSettings,
    pub input_hooks: InputHookSettings,
    pub active_character_pack_id: String,
    pub character_packs: CharacterPacks,
}

/// How the overlay reacts to the mouse, derived from the interaction flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionMode {
    /// Clicks always pass through
    ClickThrough,
    /// Clicks pass through except over opaque sprite pixels (so it can be dragged)
    HoverToggle,
    /// Window receives all clicks
    Solid,
}

impl Settings {
    pub fn interaction_mode(&self) -> InteractionMode {
        if self.click_through_enabled {
            InteractionMode::ClickThrough
        } else if self.can_drag() {
            InteractionMode::HoverToggle
        } else {
            InteractionMode::Solid
        }
    }

    pub fn can_drag(&self) -> bool {
        !self.click_through_enabled && self.draggable_when_not_click_through && !self.locked
    }
}

impl Default for PositionSettings {
    fn default() -> Self {
        Self {
            mode: PositionMode::Preset,
            preset: Preset::BottomCenter,
            x: 0,
            y: 0,
        }
    }
}

impl Default for SizeSettings {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            width: 128,
            height: 128,
            padding_from_edge: 20,
        }
    }
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            idle_fps: 8.0,
            hit_fps: 24.0,
        }
    }
}

impl Default for InputHookSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ignore_modifier_keys: false,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            position: PositionSettings::default(),
            size: SizeSettings::default(),
            window: WindowSettings::default(),
            click_through_enabled: true,
            draggable_when_not_click_through: true,
            locked: false,
            opacity: 1.0,
            visible_on_all_workspaces: true,
            overlay_above_fullscreen: false,
            animation: AnimationSettings::default(),
            input_hooks: InputHookSettings::default(),
            active_character_pack_id: "default".to_string(),
            character_packs: CharacterPacks::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_serializes_camel_case() {
        let value = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(value["position"]["mode"], json!("preset"));
        assert_eq!(value["position"]["preset"], json!("bottomCenter"));
        assert_eq!(value["window"]["paddingFromEdge"], json!(20));
        assert_eq!(value["clickThroughEnabled"], json!(true));
        assert_eq!(value["inputHooks"]["ignoreModifierKeys"], json!(false));
        assert_eq!(value["characterPacks"]["custom"]["hitLeft"], json!(null));
    }

    #[test]
    fn test_preset_from_name_falls_back_to_bottom_center() {
        assert_eq!(Preset::from_name("topRight"), Preset::TopRight);
        assert_eq!(Preset::from_name("middle"), Preset::BottomCenter);
        assert_eq!(Preset::parse("middle"), None);
    }

    #[test]
    fn test_interaction_mode() {
        let mut settings = Settings::default();
        assert_eq!(settings.interaction_mode(), InteractionMode::ClickThrough);

        settings.click_through_enabled = false;
        assert_eq!(settings.interaction_mode(), InteractionMode::HoverToggle);

        settings.locked = true;
        assert_eq!(settings.interaction_mode(), InteractionMode::Solid);
        assert!(!settings.can_drag());
    }
}
