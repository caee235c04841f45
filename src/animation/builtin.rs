//! Bundled "default" character, drawn procedurally
//!
//! A round cat sitting behind a keyboard. Frames are tiny and get stretched
//! to the window size like any other sprite.

use anyhow::Result;

use super::sprite::{premultiply, Canvas, SpriteSheet};
use crate::constants::animation;

const SIZE: u32 = 32;

const BODY: u32 = 0xFFF0_A050;
const EYE: u32 = 0xFF20_2020;
const PAW: u32 = 0xFFFF_F0E0;
const KEYBOARD: u32 = 0xFF60_6870;

const PAW_RAISED: i32 = 18;
const PAW_REST: i32 = 22;
const PAW_STRIKE: i32 = 24;

#[derive(Clone, Copy)]
struct Pose {
    bob: i32,
    blink: bool,
    left_paw: i32,
    right_paw: i32,
    squash: i32,
}

impl Pose {
    const REST: Pose = Pose {
        bob: 0,
        blink: false,
        left_paw: PAW_REST,
        right_paw: PAW_REST,
        squash: 0,
    };
}

fn fill_ellipse(canvas: &mut Canvas, cx: i32, cy: i32, rx: i32, ry: i32, color: u32) {
    for y in (cy - ry)..=(cy + ry) {
        for x in (cx - rx)..=(cx + rx) {
            let dx = (x - cx) as f32 / rx as f32;
            let dy = (y - cy) as f32 / ry as f32;
            if dx * dx + dy * dy <= 1.0 {
                canvas.fill_rect(x, y, 1, 1, color);
            }
        }
    }
}

fn draw(pose: Pose) -> Vec<u32> {
    let mut canvas = Canvas::new(SIZE, SIZE);
    let top = pose.bob + pose.squash;

    canvas.fill_rect(7, 6 + top, 4, 4, BODY);
    canvas.fill_rect(21, 6 + top, 4, 4, BODY);
    fill_ellipse(&mut canvas, 16, 16 + top, 11 + pose.squash, 9 - pose.squash, BODY);

    let eye_height = if pose.blink { 1 } else { 3 };
    canvas.fill_rect(11, 14 + top, 2, eye_height, EYE);
    canvas.fill_rect(19, 14 + top, 2, eye_height, EYE);

    canvas.fill_rect(2, 26, 28, 4, KEYBOARD);
    // Translucent key caps
    for key in 0..6 {
        canvas.fill_rect(4 + key * 4, 27, 3, 1, premultiply(255, 255, 255, 96));
    }

    canvas.fill_rect(6, pose.left_paw, 5, 4, PAW);
    canvas.fill_rect(21, pose.right_paw, 5, 4, PAW);

    canvas.pixels().to_vec()
}

fn poses(state: &str) -> Option<Vec<Pose>> {
    let rest = Pose::REST;
    let strike = [PAW_RAISED, PAW_STRIKE, PAW_STRIKE, PAW_REST];

    let poses = match state {
        animation::IDLE => vec![
            rest,
            Pose { bob: 1, ..rest },
            Pose { bob: 1, ..rest },
            Pose { blink: true, ..rest },
        ],
        animation::LEFT => strike.iter().map(|&y| Pose { left_paw: y, ..rest }).collect(),
        animation::RIGHT => strike.iter().map(|&y| Pose { right_paw: y, ..rest }).collect(),
        animation::BOTH => strike
            .iter()
            .map(|&y| Pose {
                left_paw: y,
                right_paw: y,
                ..rest
            })
            .collect(),
        animation::HIT => vec![
            Pose { squash: 1, ..rest },
            Pose { squash: 2, blink: true, ..rest },
            Pose { squash: 1, ..rest },
            rest,
        ],
        _ => return None,
    };
    Some(poses)
}

/// Bundled sprite for `state`, if the default character has one
pub fn sprite(state: &str) -> Option<Result<SpriteSheet>> {
    let frames = poses(state)?.into_iter().map(draw).collect();
    Some(SpriteSheet::from_frames(SIZE, SIZE, frames))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::sprite::alpha_of;

    #[test]
    fn test_all_states_have_sprites() {
        for state in [animation::IDLE, animation::LEFT, animation::RIGHT, animation::BOTH, animation::HIT] {
            let sheet = sprite(state).unwrap().unwrap();
            assert_eq!(sheet.frame_count(), 4, "state {state}");
            assert_eq!(sheet.frame_width(), SIZE);
        }
        assert!(sprite("dance").is_none());
    }

    #[test]
    fn test_corners_transparent_center_opaque() {
        let sheet = sprite(animation::IDLE).unwrap().unwrap();
        let frame = sheet.frame(0).unwrap();
        assert_eq!(alpha_of(frame[0]), 0);
        assert_eq!(alpha_of(frame[(16 * SIZE + 16) as usize]), 255);
    }

    #[test]
    fn test_left_and_right_differ() {
        let left = sprite(animation::LEFT).unwrap().unwrap();
        let right = sprite(animation::RIGHT).unwrap().unwrap();
        assert_ne!(left.frame(0), right.frame(0));
    }
}
