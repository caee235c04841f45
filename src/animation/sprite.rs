//! Sprite sheets and the drawing canvas
//!
//! Pixels are `u32` ARGB with premultiplied alpha throughout, which is what
//! the X11 32-bit visual expects.

use anyhow::{Context, Result};
use png::{BitDepth, ColorType, Transformations};
use std::io::Cursor;
use std::path::Path;

/// Premultiply a straight-alpha RGBA color into ARGB
pub fn premultiply(r: u8, g: u8, b: u8, a: u8) -> u32 {
    let scale = |c: u8| (c as u32 * a as u32 + 127) / 255;
    ((a as u32) << 24) | (scale(r) << 16) | (scale(g) << 8) | scale(b)
}

pub fn alpha_of(pixel: u32) -> u8 {
    (pixel >> 24) as u8
}

/// Equal-sized animation frames cut from a horizontal strip
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteSheet {
    frame_width: u32,
    frame_height: u32,
    frames: Vec<Vec<u32>>,
}

impl SpriteSheet {
    pub fn from_frames(frame_width: u32, frame_height: u32, frames: Vec<Vec<u32>>) -> Result<Self> {
        if frame_width == 0 || frame_height == 0 {
            anyhow::bail!("Sprite frames must be non-empty ({}x{})", frame_width, frame_height);
        }
        if frames.is_empty() {
            anyhow::bail!("Sprite sheet has no frames");
        }
        let expected = (frame_width * frame_height) as usize;
        if let Some(bad) = frames.iter().position(|frame| frame.len() != expected) {
            anyhow::bail!("Frame {} has {} pixels, expected {}", bad, frames[bad].len(), expected);
        }
        Ok(Self {
            frame_width,
            frame_height,
            frames,
        })
    }

    /// Decode a PNG strip.
    ///
    /// Without an explicit `frame_count`, frames are assumed square and the
    /// count is `width / height`.
    pub fn from_png(bytes: &[u8], frame_count: Option<u32>) -> Result<Self> {
        let mut decoder = png::Decoder::new(Cursor::new(bytes));
        decoder.set_transformations(Transformations::EXPAND | Transformations::STRIP_16);
        let mut reader = decoder.read_info().context("Failed to read PNG header")?;

        let (color_type, bit_depth) = reader.output_color_type();
        if bit_depth != BitDepth::Eight {
            anyhow::bail!("Unsupported PNG bit depth after expansion: {:?}", bit_depth);
        }
        let channels = match color_type {
            ColorType::Grayscale => 1,
            ColorType::GrayscaleAlpha => 2,
            ColorType::Rgb => 3,
            ColorType::Rgba => 4,
            ColorType::Indexed => anyhow::bail!("Indexed PNG was not expanded"),
        };

        let (width, height) = (reader.info().width, reader.info().height);
        let mut buf = vec![0u8; width as usize * height as usize * channels];
        let output = reader.next_frame(&mut buf).context("Failed to decode PNG image data")?;
        let stride = output.line_size;

        let frame_count = match frame_count {
            Some(count) if count > 0 => count,
            Some(_) => anyhow::bail!("Frame count must be positive"),
            None if height > 0 => (width / height).max(1),
            None => anyhow::bail!("PNG has zero height"),
        };
        let frame_width = width / frame_count;
        if frame_width == 0 || width % frame_count != 0 {
            anyhow::bail!("PNG width {} does not split into {} frames", width, frame_count);
        }

        let pixel_at = |x: u32, y: u32| -> u32 {
            let offset = y as usize * stride + x as usize * channels;
            let px = &buf[offset..offset + channels];
            match channels {
                1 => premultiply(px[0], px[0], px[0], 255),
                2 => premultiply(px[0], px[0], px[0], px[1]),
                3 => premultiply(px[0], px[1], px[2], 255),
                _ => premultiply(px[0], px[1], px[2], px[3]),
            }
        };

        let frames = (0..frame_count)
            .map(|index| {
                let left = index * frame_width;
                (0..height)
                    .flat_map(|y| (0..frame_width).map(move |x| (left + x, y)))
                    .map(|(x, y)| pixel_at(x, y))
                    .collect()
            })
            .collect();

        Self::from_frames(frame_width, height, frames)
    }

    pub fn load(path: &Path, frame_count: Option<u32>) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read sprite: {}", path.display()))?;
        Self::from_png(&bytes, frame_count).with_context(|| format!("Failed to decode sprite: {}", path.display()))
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frame_width(&self) -> u32 {
        self.frame_width
    }

    pub fn frame_height(&self) -> u32 {
        self.frame_height
    }

    pub fn frame(&self, index: usize) -> Option<&[u32]> {
        self.frames.get(index).map(Vec::as_slice)
    }
}

/// Offscreen ARGB buffer the size of the overlay window
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Replace the canvas contents with `frame` scaled to fit (nearest neighbour)
    pub fn draw_stretched(&mut self, sheet: &SpriteSheet, index: usize) {
        let Some(frame) = sheet.frame(index) else {
            self.clear();
            return;
        };
        let (src_w, src_h) = (sheet.frame_width() as u64, sheet.frame_height() as u64);
        let (dst_w, dst_h) = (self.width as u64, self.height as u64);

        for y in 0..dst_h {
            let sy = (y * src_h / dst_h) as usize;
            for x in 0..dst_w {
                let sx = (x * src_w / dst_w) as usize;
                self.pixels[(y * dst_w + x) as usize] = frame[sy * src_w as usize + sx];
            }
        }
    }

    /// Alpha-composite a premultiplied image with its top-left at `(left, top)`
    pub fn blend(&mut self, left: i32, top: i32, width: usize, height: usize, data: &[u32]) {
        for row in 0..height {
            let y = top + row as i32;
            if y < 0 || y >= self.height as i32 {
                continue;
            }
            for col in 0..width {
                let x = left + col as i32;
                if x < 0 || x >= self.width as i32 {
                    continue;
                }
                let src = data[row * width + col];
                let dst = &mut self.pixels[y as usize * self.width as usize + x as usize];
                *dst = over(src, *dst);
            }
        }
    }

    /// Fill a rectangle with a premultiplied color, clipped to the canvas
    pub fn fill_rect(&mut self, left: i32, top: i32, width: u32, height: u32, color: u32) {
        let x0 = left.clamp(0, self.width as i32) as u32;
        let y0 = top.clamp(0, self.height as i32) as u32;
        let x1 = (left + width as i32).clamp(0, self.width as i32) as u32;
        let y1 = (top + height as i32).clamp(0, self.height as i32) as u32;
        for y in y0..y1 {
            let row = (y * self.width) as usize;
            self.pixels[row + x0 as usize..row + x1 as usize].fill(color);
        }
    }

    /// Alpha at window-relative `(x, y)`; 0 outside the canvas
    pub fn alpha_at(&self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return 0;
        }
        alpha_of(self.pixels[y as usize * self.width as usize + x as usize])
    }
}

/// Porter-Duff OVER for premultiplied ARGB
fn over(src: u32, dst: u32) -> u32 {
    let inv = 255 - alpha_of(src) as u32;
    let channel = |shift: u32| {
        let s = (src >> shift) & 0xFF;
        let d = (dst >> shift) & 0xFF;
        (s + (d * inv + 127) / 255).min(255) << shift
    };
    channel(24) | channel(16) | channel(8) | channel(0)
}

/// Encode an RGBA strip for decoder tests
#[cfg(test)]
pub(crate) fn encode_png(width: u32, height: u32, rgba: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(ColorType::Rgba);
        encoder.set_depth(BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(rgba).unwrap();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_premultiply() {
        assert_eq!(premultiply(255, 0, 0, 255), 0xFFFF_0000);
        assert_eq!(premultiply(255, 255, 255, 0), 0);
        assert_eq!(premultiply(200, 100, 50, 128), 0x8064_3219);
    }

    #[test]
    fn test_from_png_splits_square_frames() {
        // 2 frames of 2x2: left opaque red, right transparent
        let mut rgba = Vec::new();
        for _ in 0..2 {
            rgba.extend_from_slice(&[255, 0, 0, 255, 255, 0, 0, 255, 0, 0, 0, 0, 0, 0, 0, 0]);
        }
        let sheet = SpriteSheet::from_png(&encode_png(4, 2, &rgba), None).unwrap();
        assert_eq!(sheet.frame_count(), 2);
        assert_eq!(sheet.frame_width(), 2);
        assert_eq!(sheet.frame(0).unwrap(), &[0xFFFF_0000; 4]);
        assert_eq!(sheet.frame(1).unwrap(), &[0; 4]);
    }

    #[test]
    fn test_from_png_explicit_frame_count() {
        let rgba = vec![255u8; 6 * 2 * 4];
        let sheet = SpriteSheet::from_png(&encode_png(6, 2, &rgba), Some(3)).unwrap();
        assert_eq!(sheet.frame_count(), 3);
        assert_eq!(sheet.frame_width(), 2);

        assert!(SpriteSheet::from_png(&encode_png(6, 2, &rgba), Some(4)).is_err());
    }

    #[test]
    fn test_from_png_rejects_garbage() {
        assert!(SpriteSheet::from_png(b"not a png", None).is_err());
    }

    #[test]
    fn test_draw_stretched_nearest_neighbour() {
        let sheet = SpriteSheet::from_frames(2, 1, vec![vec![0xFF00_0001, 0xFF00_0002]]).unwrap();
        let mut canvas = Canvas::new(4, 2);
        canvas.draw_stretched(&sheet, 0);
        assert_eq!(
            canvas.pixels(),
            &[
                0xFF00_0001, 0xFF00_0001, 0xFF00_0002, 0xFF00_0002,
                0xFF00_0001, 0xFF00_0001, 0xFF00_0002, 0xFF00_0002
            ]
        );
    }

    #[test]
    fn test_alpha_at_bounds() {
        let mut canvas = Canvas::new(2, 2);
        canvas.fill_rect(1, 1, 5, 5, 0x8000_0000);
        assert_eq!(canvas.alpha_at(1, 1), 0x80);
        assert_eq!(canvas.alpha_at(0, 0), 0);
        assert_eq!(canvas.alpha_at(-1, 0), 0);
        assert_eq!(canvas.alpha_at(2, 1), 0);
    }

    #[test]
    fn test_blend_over() {
        let mut canvas = Canvas::new(1, 1);
        canvas.fill_rect(0, 0, 1, 1, 0xFF00_00FF);
        canvas.blend(0, 0, 1, 1, &[0x8080_0000]);
        // 50% red over opaque blue
        assert_eq!(canvas.pixels()[0], 0xFF80_007F);
    }
}
