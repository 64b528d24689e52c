//! Three-class Multi-Otsu thresholding.
//!
//! Searches every pair of 8-bit thresholds for the split of the
//! luminance histogram that maximizes between-class variance, then
//! paints each pixel with its class index scaled to the 0–255 range.

use image::{DynamicImage, GrayImage, Luma};

use crate::grayscale::{luminance, to_gray8};

/// Number of classes the histogram is split into.
pub const CLASSES: u8 = 3;

/// Optimal `(t1, t2)` thresholds for a 256-bin histogram.
///
/// Class 0 is `[0, t1]`, class 1 is `(t1, t2]`, class 2 is `(t2, 255]`.
/// Ties keep the first pair found, so the result is deterministic.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn thresholds(histogram: &[u32; 256]) -> (u8, u8) {
    // Prefix sums of pixel count and intensity mass.
    let mut count = [0.0_f64; 257];
    let mut mass = [0.0_f64; 257];
    for (i, &n) in histogram.iter().enumerate() {
        count[i + 1] = count[i] + f64::from(n);
        mass[i + 1] = (i as f64).mul_add(f64::from(n), mass[i]);
    }

    // Sum of w * mu^2 over one class spanning bins [lo, hi).
    let class_score = |lo: usize, hi: usize| {
        let w = count[hi] - count[lo];
        if w > 0.0 {
            let m = mass[hi] - mass[lo];
            m * m / w
        } else {
            0.0
        }
    };

    let mut best = (0_u8, 1_u8);
    let mut best_score = f64::NEG_INFINITY;
    for t1 in 0_u8..=253 {
        for t2 in (t1 + 1)..=254 {
            let (a, b) = (usize::from(t1) + 1, usize::from(t2) + 1);
            let score = class_score(0, a) + class_score(a, b) + class_score(b, 256);
            if score > best_score {
                best_score = score;
                best = (t1, t2);
            }
        }
    }
    best
}

/// Class index of an 8-bit level.
const fn classify(level: u8, (t1, t2): (u8, u8)) -> u8 {
    if level <= t1 {
        0
    } else if level <= t2 {
        1
    } else {
        2
    }
}

/// The `multiotsu` operation.
#[must_use = "returns the segmented image"]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn segment(image: &DynamicImage) -> DynamicImage {
    let gray = to_gray8(&luminance(image));
    let hist = imageproc::stats::histogram(&gray);
    let cuts = thresholds(&hist.channels[0]);

    let top = gray
        .pixels()
        .map(|p| classify(p.0[0], cuts))
        .max()
        .unwrap_or(0);

    let out = if top == 0 {
        GrayImage::new(gray.width(), gray.height())
    } else {
        let step = 255.0 / f32::from(top);
        imageproc::map::map_pixels(&gray, |Luma([v])| {
            Luma([(f32::from(classify(v, cuts)) * step) as u8])
        })
    };
    DynamicImage::ImageLuma8(out)
}
