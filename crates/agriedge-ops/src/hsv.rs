//! RGB-to-HSV hue visualization.
//!
//! Converts each pixel to HSV, forces saturation and value to 1, and
//! converts back. The result shows hue alone as fully saturated colour.

use image::{DynamicImage, Rgb, RgbImage};

use crate::grayscale::{require_color, unit_to_u8};
use crate::types::{OperationError, OperationId};

/// Hue of an RGB triple in `[0, 1)`.
///
/// Grays (zero chroma) have hue 0. When several channels tie for the
/// maximum, blue wins over green, and green over red.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn hue([r, g, b]: [f32; 3]) -> f32 {
    let max = r.max(g).max(b);
    let delta = max - r.min(g).min(b);
    if delta <= 0.0 {
        return 0.0;
    }

    let sector = if b == max {
        4.0 + (r - g) / delta
    } else if g == max {
        2.0 + (b - r) / delta
    } else {
        (g - b) / delta
    };
    (sector / 6.0).rem_euclid(1.0)
}

/// RGB for a hue at full saturation and value.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn saturated_rgb(hue: f32) -> [f32; 3] {
    let scaled = hue * 6.0;
    let sector = scaled.floor();
    let f = scaled - sector;
    let q = 1.0 - f;
    match (sector as u32) % 6 {
        0 => [1.0, f, 0.0],
        1 => [q, 1.0, 0.0],
        2 => [0.0, 1.0, f],
        3 => [0.0, q, 1.0],
        4 => [f, 0.0, 1.0],
        _ => [1.0, 0.0, q],
    }
}

/// The `hsv` operation.
///
/// # Errors
///
/// Returns [`OperationError::UnsupportedColor`] for single-channel
/// input, which has no hue.
pub fn hue_map(image: &DynamicImage) -> Result<DynamicImage, OperationError> {
    require_color(image, OperationId::Hsv)?;

    let rgb = image.to_rgb32f();
    let out = RgbImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = saturated_rgb(hue(rgb.get_pixel(x, y).0));
        Rgb([unit_to_u8(r), unit_to_u8(g), unit_to_u8(b)])
    });
    Ok(DynamicImage::ImageRgb8(out))
}
