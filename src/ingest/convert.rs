//! RGB to HSV conversion.
//!
//! 8-bit convention: H is degrees / 2 (0..=179), S and V are 0..=255.
//! Color models calibrated from camera samples expect this scale.

use anyhow::{anyhow, Result};

use crate::frame::HsvFrame;
use crate::Hsv;

pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> Hsv {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = (max - min) as f32;

    let s = if max == 0 {
        0
    } else {
        (255.0 * diff / max as f32).round() as u8
    };

    if diff == 0.0 {
        return Hsv::new(0, s, max);
    }

    let (r, g, b) = (r as f32, g as f32, b as f32);
    let mut degrees = if max as f32 == r {
        60.0 * (g - b) / diff
    } else if max as f32 == g {
        120.0 + 60.0 * (b - r) / diff
    } else {
        240.0 + 60.0 * (r - g) / diff
    };
    if degrees < 0.0 {
        degrees += 360.0;
    }
    let mut h = (degrees / 2.0).round() as u16;
    if h >= 180 {
        h -= 180;
    }
    Hsv::new(h as u8, s, max)
}

/// Convert a packed RGB buffer into an `HsvFrame`.
pub fn rgb_frame_to_hsv(rgb: &[u8], width: u32, height: u32) -> Result<HsvFrame> {
    let expected = width as usize * height as usize * 3;
    if rgb.len() != expected {
        return Err(anyhow!(
            "rgb buffer holds {} bytes, expected {} for {}x{}",
            rgb.len(),
            expected,
            width,
            height
        ));
    }
    let mut data = Vec::with_capacity(expected);
    for px in rgb.chunks_exact(3) {
        let hsv = rgb_to_hsv(px[0], px[1], px[2]);
        data.extend_from_slice(&[hsv.h, hsv.s, hsv.v]);
    }
    HsvFrame::new(data, width, height)
}
