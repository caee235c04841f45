//! TrueType text for the error placeholder, via fontdue
//!
//! Font files are resolved through fontconfig with a few well-known paths as
//! a last resort.

use anyhow::{Context, Result};
use fontconfig::{Fontconfig, Pattern};
use fontdue::{Font, FontSettings};
use std::ffi::CString;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Families tried through fontconfig, in order
const FAMILIES: &[&str] = &["Sans", "DejaVu Sans", "Monospace"];

const FALLBACK_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Bold.ttf",
];

/// Rendered text as ARGB bitmap
pub struct RenderedText {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u32>, // ARGB pixels (premultiplied alpha)
}

impl RenderedText {
    fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            data: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct FontRenderer {
    font: Font,
    size: f32,
}

/// Resolve a family name to a font file through fontconfig
pub fn find_font_path(family: &str) -> Result<PathBuf> {
    let fc = Fontconfig::new().context("Failed to initialize fontconfig")?;

    let mut pattern = Pattern::new(&fc);
    let family_cstr = CString::new(family).with_context(|| format!("Invalid family name: {}", family))?;
    pattern.add_string(fontconfig::FC_FAMILY, &family_cstr);

    let matched = pattern.font_match();
    let path = PathBuf::from(
        matched
            .filename()
            .with_context(|| format!("No font file found for '{}'", family))?,
    );

    if !path.exists() {
        anyhow::bail!("Font file path '{}' does not exist", path.display());
    }

    debug!(family, path = %path.display(), "Resolved font path via fontconfig");
    Ok(path)
}

impl FontRenderer {
    pub fn from_path(path: PathBuf, size: f32) -> Result<Self> {
        let font_data = fs::read(&path).with_context(|| format!("Failed to read font file: {}", path.display()))?;
        let font = Font::from_bytes(font_data, FontSettings::default())
            .map_err(|e| anyhow::anyhow!("Failed to parse font: {}", e))?;
        Ok(Self { font, size })
    }

    /// First usable system font
    pub fn from_system_font(size: f32) -> Result<Self> {
        for family in FAMILIES {
            match find_font_path(family).and_then(|path| Self::from_path(path, size)) {
                Ok(renderer) => {
                    info!(family, "Loaded placeholder font via fontconfig");
                    return Ok(renderer);
                }
                Err(e) => debug!(family, error = %e, "Font family unavailable"),
            }
        }

        for path in FALLBACK_PATHS {
            if let Ok(renderer) = Self::from_path(PathBuf::from(path), size) {
                info!(path = %path, "Loaded placeholder font from hardcoded path");
                return Ok(renderer);
            }
        }

        warn!("No system font found for placeholder text");
        Err(anyhow::anyhow!(
            "Could not find any system fonts. Tried fontconfig families {:?} and paths {:?}",
            FAMILIES,
            FALLBACK_PATHS
        ))
    }

    pub fn set_size(&mut self, size: f32) {
        self.size = size;
    }

    /// Render text to an ARGB bitmap with the given foreground color (transparent background)
    pub fn render_text(&self, text: &str, fg_color: u32) -> RenderedText {
        if text.is_empty() {
            return RenderedText::empty();
        }

        let mut glyphs = Vec::new();
        let mut x = 0.0f32;
        let mut max_ascent = 0i32;
        let mut max_descent = 0i32;

        for ch in text.chars() {
            let (metrics, bitmap) = self.font.rasterize(ch, self.size);
            max_ascent = max_ascent.max(metrics.height as i32 + metrics.ymin);
            max_descent = max_descent.max(-metrics.ymin);
            glyphs.push((x as i32, metrics, bitmap));
            x += metrics.advance_width;
        }

        let width = x.ceil() as usize;
        let height = (max_ascent + max_descent).max(0) as usize;
        if width == 0 || height == 0 {
            return RenderedText::empty();
        }

        let mut data = vec![0u32; width * height];

        // Foreground is straight ARGB; output is premultiplied
        let fg_a = ((fg_color >> 24) & 0xFF) as f32 / 255.0;
        let fg_r = ((fg_color >> 16) & 0xFF) as f32 / 255.0;
        let fg_g = ((fg_color >> 8) & 0xFF) as f32 / 255.0;
        let fg_b = (fg_color & 0xFF) as f32 / 255.0;

        for (x_offset, metrics, bitmap) in glyphs {
            // Baseline sits max_ascent below the top
            let baseline_y = max_ascent - (metrics.height as i32 + metrics.ymin);

            for gy in 0..metrics.height {
                for gx in 0..metrics.width {
                    let px = x_offset + gx as i32;
                    let py = baseline_y + gy as i32;
                    if px < 0 || py < 0 || px >= width as i32 || py >= height as i32 {
                        continue;
                    }

                    let coverage = bitmap[gy * metrics.width + gx] as f32 / 255.0 * fg_a;
                    if coverage > 0.0 {
                        let alpha = (coverage * 255.0) as u32;
                        let r = (fg_r * coverage * 255.0) as u32;
                        let g = (fg_g * coverage * 255.0) as u32;
                        let b = (fg_b * coverage * 255.0) as u32;
                        data[(py as usize) * width + (px as usize)] = (alpha << 24) | (r << 16) | (g << 8) | b;
                    }
                }
            }
        }

        RenderedText { width, height, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_text_when_fonts_available() {
        // Headless CI may have no fonts at all
        let Ok(renderer) = FontRenderer::from_system_font(14.0) else {
            return;
        };
        assert_eq!(renderer.render_text("", 0xFFFF_FFFF).width, 0);

        let text = renderer.render_text("oops", 0xFFFF_FFFF);
        assert!(text.width > 0 && text.height > 0);
        assert_eq!(text.data.len(), text.width * text.height);
        assert!(text.data.iter().any(|pixel| pixel >> 24 > 0));
    }
}
