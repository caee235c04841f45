//! Deep-merge and validation of settings documents
//!
//! Settings travel as `serde_json::Value` until validated: partial updates are
//! merged into the current document, then the result is conformed to the shape
//! of the defaults and checked field by field before becoming a `Settings`.

use serde_json::{Map, Value};
use std::ops::RangeInclusive;
use tracing::{debug, warn};

use crate::config::settings::{PositionMode, Preset, Settings};
use crate::constants::limits;

/// Integer fields and their allowed ranges (JSON pointers)
const INTEGER_FIELDS: [(&str, RangeInclusive<i64>); 5] = [
    ("/position/x", i32::MIN as i64..=i32::MAX as i64),
    ("/position/y", i32::MIN as i64..=i32::MAX as i64),
    ("/window/width", limits::WINDOW_SIZE_MIN as i64..=limits::WINDOW_SIZE_MAX as i64),
    ("/window/height", limits::WINDOW_SIZE_MIN as i64..=limits::WINDOW_SIZE_MAX as i64),
    ("/window/paddingFromEdge", 0..=limits::PADDING_MAX as i64),
];

/// Recursively merge `source` into `target`.
///
/// When both sides hold an object at a key the objects merge key-wise;
/// any other value (scalars, arrays, null) replaces the target value.
pub fn deep_merge(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, source_value) in source_map {
                match target_map.get_mut(key) {
                    Some(target_value) if target_value.is_object() && source_value.is_object() => {
                        deep_merge(target_value, source_value);
                    }
                    _ => {
                        target_map.insert(key.clone(), source_value.clone());
                    }
                }
            }
        }
        (target, source) => *target = source.clone(),
    }
}

/// Merge `value` over the defaults and coerce every invalid field back to its default
pub fn validate(value: &Value) -> Settings {
    let defaults = Settings::default();
    let Ok(default_value) = serde_json::to_value(&defaults) else {
        return defaults;
    };

    let mut merged = default_value.clone();
    if value.is_object() {
        deep_merge(&mut merged, value);
    } else {
        warn!(value = %value, "Settings document is not an object, using defaults");
    }

    conform(&mut merged, &default_value, "");
    check_enum(&mut merged, "/position/mode", &default_value, |name| {
        PositionMode::parse(name).is_some()
    });
    if let Some(preset) = merged.pointer_mut("/position/preset")
        && let Some(name) = preset.as_str().map(str::to_string)
        && Preset::parse(&name).is_none()
    {
        warn!(preset = %name, "Unknown position preset, anchoring at bottom center");
        *preset = Value::from(Preset::from_name(&name).name());
    }
    for (pointer, range) in &INTEGER_FIELDS {
        check_integer(&mut merged, pointer, range, &default_value);
    }

    let mut settings = match serde_json::from_value::<Settings>(merged) {
        Ok(settings) => settings,
        Err(e) => {
            warn!(error = %e, "Validated settings failed to deserialize, using defaults");
            return defaults;
        }
    };

    check_ranges(&mut settings, &defaults);
    settings
}

/// Top-level keys whose values differ between two settings documents
pub fn changed_fields(before: &Settings, after: &Settings) -> Value {
    let (Ok(Value::Object(before)), Ok(Value::Object(after))) =
        (serde_json::to_value(before), serde_json::to_value(after))
    else {
        return Value::Object(Map::new());
    };

    let changed = after
        .into_iter()
        .filter(|(key, value)| before.get(key) != Some(value))
        .collect();
    Value::Object(changed)
}

/// Make `value` match the JSON type of `default`, filling in missing keys and
/// dropping unknown ones
fn conform(value: &mut Value, default: &Value, path: &str) {
    let matches = match default {
        Value::Object(default_map) => {
            let Value::Object(map) = value else {
                warn!(field = %path, "Expected an object, using default");
                *value = default.clone();
                return;
            };

            map.retain(|key, _| {
                let known = default_map.contains_key(key);
                if !known {
                    debug!(field = %path, key = %key, "Dropping unknown settings key");
                }
                known
            });

            for (key, default_child) in default_map {
                let child_path = format!("{path}/{key}");
                match map.get_mut(key) {
                    Some(child) => conform(child, default_child, &child_path),
                    None => {
                        map.insert(key.clone(), default_child.clone());
                    }
                }
            }
            return;
        }
        // Nullable slots hold a file name or nothing
        Value::Null => value.is_null() || value.is_string(),
        Value::Bool(_) => value.is_boolean(),
        Value::String(_) => value.is_string(),
        Value::Array(_) => value.is_array(),
        Value::Number(number) if number.is_f64() => value.as_f64().is_some_and(f64::is_finite),
        // Integer ranges are checked per field afterwards
        Value::Number(_) => value.is_i64() || value.is_u64(),
    };

    if !matches {
        warn!(field = %path, value = %value, default = %default, "Invalid settings value, using default");
        *value = default.clone();
    }
}

fn check_enum(value: &mut Value, pointer: &str, defaults: &Value, allowed: impl Fn(&str) -> bool) {
    let valid = value
        .pointer(pointer)
        .and_then(Value::as_str)
        .is_some_and(&allowed);
    if !valid {
        reset_field(value, pointer, defaults);
    }
}

fn check_integer(value: &mut Value, pointer: &str, range: &RangeInclusive<i64>, defaults: &Value) {
    let valid = value
        .pointer(pointer)
        .and_then(Value::as_i64)
        .is_some_and(|n| range.contains(&n));
    if !valid {
        reset_field(value, pointer, defaults);
    }
}

fn reset_field(value: &mut Value, pointer: &str, defaults: &Value) {
    if let (Some(slot), Some(default)) = (value.pointer_mut(pointer), defaults.pointer(pointer)) {
        warn!(field = %pointer, value = %slot, default = %default, "Invalid settings value, using default");
        *slot = default.clone();
    }
}

fn check_ranges(settings: &mut Settings, defaults: &Settings) {
    let scale = settings.size.scale;
    if !(limits::SCALE_MIN..=limits::SCALE_MAX).contains(&scale) {
        warn!(scale, "Scale out of range, using default");
        settings.size.scale = defaults.size.scale;
    }
    if !(0.0..=1.0).contains(&settings.opacity) {
        warn!(opacity = settings.opacity, "Opacity out of range, using default");
        settings.opacity = defaults.opacity;
    }
    let fps_range = limits::FPS_MIN..=limits::FPS_MAX;
    if !fps_range.contains(&settings.animation.idle_fps) {
        warn!(fps = settings.animation.idle_fps, "Idle fps out of range, using default");
        settings.animation.idle_fps = defaults.animation.idle_fps;
    }
    if !fps_range.contains(&settings.animation.hit_fps) {
        warn!(fps = settings.animation.hit_fps, "Hit fps out of range, using default");
        settings.animation.hit_fps = defaults.animation.hit_fps;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deep_merge_recurses_into_objects() {
        let mut target = json!({"a": {"b": 1, "c": 2}, "d": 3});
        deep_merge(&mut target, &json!({"a": {"b": 10}}));
        assert_eq!(target, json!({"a": {"b": 10, "c": 2}, "d": 3}));
    }

    #[test]
    fn test_deep_merge_replaces_arrays_and_scalars() {
        let mut target = json!({"list": [1, 2, 3], "obj": {"x": 1}});
        deep_merge(&mut target, &json!({"list": [9], "obj": 5}));
        assert_eq!(target, json!({"list": [9], "obj": 5}));
    }

    #[test]
    fn test_validate_empty_document_yields_defaults() {
        assert_eq!(validate(&json!({})), Settings::default());
        assert_eq!(validate(&json!(null)), Settings::default());
    }

    #[test]
    fn test_validate_keeps_valid_values() {
        let settings = validate(&json!({
            "position": {"mode": "free", "x": -40, "y": 300},
            "opacity": 0.25,
            "characterPacks": {"custom": {"idle": "cat.png"}}
        }));
        assert_eq!(settings.position.mode, PositionMode::Free);
        assert_eq!(settings.position.x, -40);
        assert_eq!(settings.position.y, 300);
        assert_eq!(settings.position.preset, Preset::BottomCenter);
        assert_eq!(settings.opacity, 0.25);
        assert_eq!(settings.character_packs.custom.idle.as_deref(), Some("cat.png"));
        assert_eq!(settings.character_packs.custom.hit_left, None);
    }

    #[test]
    fn test_validate_coerces_invalid_enums() {
        let settings = validate(&json!({"position": {"mode": "floating", "preset": "middle"}}));
        assert_eq!(settings.position.mode, PositionMode::Preset);
        assert_eq!(settings.position.preset, Preset::BottomCenter);
    }

    #[test]
    fn test_validate_coerces_wrong_types() {
        let settings = validate(&json!({
            "size": {"scale": "big"},
            "locked": "yes",
            "window": {"width": -5, "height": 64.5, "paddingFromEdge": 4},
            "inputHooks": {"enabled": 0},
            "animation": 12
        }));
        let defaults = Settings::default();
        assert_eq!(settings.size.scale, defaults.size.scale);
        assert_eq!(settings.locked, defaults.locked);
        assert_eq!(settings.window.width, defaults.window.width);
        assert_eq!(settings.window.height, defaults.window.height);
        assert_eq!(settings.window.padding_from_edge, 4);
        assert_eq!(settings.input_hooks.enabled, defaults.input_hooks.enabled);
        assert_eq!(settings.animation, defaults.animation);
    }

    #[test]
    fn test_validate_scale_range() {
        assert_eq!(validate(&json!({"size": {"scale": 1.5}})).size.scale, 1.5);
        assert_eq!(validate(&json!({"size": {"scale": 2}})).size.scale, 2.0);
        assert_eq!(validate(&json!({"size": {"scale": 4.0}})).size.scale, 1.0);
        assert_eq!(validate(&json!({"size": {"scale": 0.1}})).size.scale, 1.0);
    }

    #[test]
    fn test_validate_opacity_and_fps_ranges() {
        let settings = validate(&json!({"opacity": 1.5, "animation": {"idleFps": 0, "hitFps": 30}}));
        assert_eq!(settings.opacity, 1.0);
        assert_eq!(settings.animation.idle_fps, 8.0);
        assert_eq!(settings.animation.hit_fps, 30.0);
    }

    #[test]
    fn test_validate_tiny_fps_uses_default() {
        let settings = validate(&json!({"opacity": 0.3, "animation": {"idleFps": 1e-20, "hitFps": 500}}));
        assert_eq!(settings.animation, Settings::default().animation);
        assert_eq!(settings.opacity, 0.3);
    }

    #[test]
    fn test_validate_coordinate_overflow_resets_only_that_field() {
        let settings = validate(&json!({
            "opacity": 0.3,
            "locked": true,
            "position": {"mode": "free", "x": 3_000_000_000_i64, "y": 5}
        }));
        assert_eq!(settings.position.x, 0);
        assert_eq!(settings.position.y, 5);
        assert_eq!(settings.position.mode, PositionMode::Free);
        assert_eq!(settings.opacity, 0.3);
        assert!(settings.locked);

        let settings = validate(&json!({"position": {"x": i32::MIN, "y": -3_000_000_000_i64}}));
        assert_eq!(settings.position.x, i32::MIN);
        assert_eq!(settings.position.y, 0);
    }

    #[test]
    fn test_validate_window_size_limits() {
        let settings = validate(&json!({
            "window": {"width": 4294967295_u64, "height": 0, "paddingFromEdge": 10_000},
            "size": {"scale": 1.5}
        }));
        let defaults = Settings::default();
        assert_eq!(settings.window.width, defaults.window.width);
        assert_eq!(settings.window.height, defaults.window.height);
        assert_eq!(settings.window.padding_from_edge, defaults.window.padding_from_edge);
        assert_eq!(settings.size.scale, 1.5);

        let settings = validate(&json!({"window": {"width": 4096, "height": 1}}));
        assert_eq!((settings.window.width, settings.window.height), (4096, 1));
    }

    #[test]
    fn test_validate_drops_unknown_keys() {
        let settings = validate(&json!({"legacyField": true, "window": {"depth": 3}}));
        let value = serde_json::to_value(settings).unwrap();
        assert!(value.get("legacyField").is_none());
        assert!(value["window"].get("depth").is_none());
    }

    #[test]
    fn test_changed_fields_reports_top_level_sections() {
        let before = Settings::default();
        let mut after = before.clone();
        after.opacity = 0.5;
        after.position.x = 12;

        let diff = changed_fields(&before, &after);
        let keys: Vec<_> = diff.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 2);
        assert_eq!(diff["opacity"], json!(0.5));
        assert_eq!(diff["position"]["x"], json!(12));
    }

    #[test]
    fn test_changed_fields_empty_when_equal() {
        let settings = Settings::default();
        assert_eq!(changed_fields(&settings, &settings), json!({}));
    }
}
