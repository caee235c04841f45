//! Overlay window bounds from settings and the screen work area
//!
//! Pure functions only; nothing here touches a live window.

use crate::config::settings::{PositionMode, Preset, Settings};
use crate::constants::limits;
use crate::types::{Bounds, WorkArea};

/// Clamp a scale factor into the supported range
pub fn clamp_scale(scale: f64) -> f64 {
    if scale.is_nan() {
        return 1.0;
    }
    scale.clamp(limits::SCALE_MIN, limits::SCALE_MAX)
}

/// Scaled window size `(width, height)`
pub fn scaled_size(settings: &Settings) -> (u32, u32) {
    let scale = clamp_scale(settings.size.scale);
    let width = (settings.window.width as f64 * scale).round() as u32;
    let height = (settings.window.height as f64 * scale).round() as u32;
    (width, height)
}

/// Position of a `width`x`height` window anchored at `preset`
pub fn preset_origin(preset: Preset, work_area: WorkArea, width: u32, height: u32, padding: u32) -> (i32, i32) {
    let screen_w = work_area.width as i64;
    let screen_h = work_area.height as i64;
    let (w, h, p) = (width as i64, height as i64, padding as i64);

    let (x, y) = match preset {
        Preset::BottomCenter => (centered(screen_w, w), screen_h - h - p),
        Preset::BottomLeft => (p, screen_h - h - p),
        Preset::BottomRight => (screen_w - w - p, screen_h - h - p),
        Preset::TopLeft => (p, p),
        Preset::TopRight => (screen_w - w - p, p),
    };
    (saturate(x), saturate(y))
}

fn saturate(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}

fn centered(outer: i64, inner: i64) -> i64 {
    ((outer - inner) as f64 / 2.0).round() as i64
}

/// Window bounds for the given settings on the primary work area.
///
/// Free mode uses the stored coordinates verbatim, even when they are off-screen.
pub fn compute_bounds(settings: &Settings, work_area: WorkArea) -> Bounds {
    let (width, height) = scaled_size(settings);

    let (x, y) = match settings.position.mode {
        PositionMode::Free => (settings.position.x, settings.position.y),
        PositionMode::Preset => preset_origin(
            settings.position.preset,
            work_area,
            width,
            height,
            settings.window.padding_from_edge,
        ),
    };

    Bounds::new(x, y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCREEN: WorkArea = WorkArea { width: 1920, height: 1080 };

    fn preset_settings(preset: Preset) -> Settings {
        let mut settings = Settings::default();
        settings.position.preset = preset;
        settings.window.width = 128;
        settings.window.height = 128;
        settings.window.padding_from_edge = 20;
        settings
    }

    #[test]
    fn test_bottom_center() {
        let bounds = compute_bounds(&preset_settings(Preset::BottomCenter), SCREEN);
        assert_eq!(bounds, Bounds::new(896, 932, 128, 128));
    }

    #[test]
    fn test_top_right() {
        let bounds = compute_bounds(&preset_settings(Preset::TopRight), SCREEN);
        assert_eq!(bounds, Bounds::new(1772, 20, 128, 128));
    }

    #[test]
    fn test_remaining_presets() {
        assert_eq!(
            compute_bounds(&preset_settings(Preset::BottomLeft), SCREEN),
            Bounds::new(20, 932, 128, 128)
        );
        assert_eq!(
            compute_bounds(&preset_settings(Preset::BottomRight), SCREEN),
            Bounds::new(1772, 932, 128, 128)
        );
        assert_eq!(
            compute_bounds(&preset_settings(Preset::TopLeft), SCREEN),
            Bounds::new(20, 20, 128, 128)
        );
    }

    #[test]
    fn test_unknown_preset_name_matches_bottom_center() {
        let unknown = preset_settings(Preset::from_name("centerish"));
        let bottom_center = preset_settings(Preset::BottomCenter);
        assert_eq!(compute_bounds(&unknown, SCREEN), compute_bounds(&bottom_center, SCREEN));
    }

    #[test]
    fn test_preset_origin_saturates() {
        let tiny = WorkArea::new(10, 10);
        assert_eq!(
            preset_origin(Preset::BottomRight, tiny, u32::MAX, u32::MAX, u32::MAX),
            (i32::MIN, i32::MIN)
        );
        assert_eq!(preset_origin(Preset::TopLeft, tiny, 1, 1, u32::MAX), (i32::MAX, i32::MAX));
    }

    #[test]
    fn test_scaled_dimensions_round() {
        let mut settings = Settings::default();
        settings.window.width = 101;
        settings.window.height = 77;

        let mut scale = 0.5;
        while scale <= 2.0 {
            settings.size.scale = scale;
            let bounds = compute_bounds(&settings, SCREEN);
            assert_eq!(bounds.width, (101.0 * scale).round() as u32, "scale {scale}");
            assert_eq!(bounds.height, (77.0 * scale).round() as u32, "scale {scale}");
            scale += 0.05;
        }
    }

    #[test]
    fn test_scale_is_clamped() {
        let mut settings = preset_settings(Preset::TopLeft);
        settings.size.scale = 5.0;
        assert_eq!(compute_bounds(&settings, SCREEN).width, 256);

        settings.size.scale = 0.1;
        assert_eq!(compute_bounds(&settings, SCREEN).width, 64);
    }

    #[test]
    fn test_free_mode_uses_stored_coordinates_unclamped() {
        let mut settings = Settings::default();
        settings.position.mode = PositionMode::Free;
        settings.position.x = -500;
        settings.position.y = 5000;

        let bounds = compute_bounds(&settings, SCREEN);
        assert_eq!((bounds.x, bounds.y), (-500, 5000));
    }

    #[test]
    fn test_window_larger_than_screen_goes_negative() {
        let mut settings = preset_settings(Preset::BottomRight);
        settings.window.width = 400;
        settings.window.height = 400;
        let bounds = compute_bounds(&settings, WorkArea::new(300, 300));
        assert_eq!((bounds.x, bounds.y), (-120, -120));
    }
}
