//! Chan-Vese level-set segmentation.
//!
//! Evolves a level set `phi` on the min-max normalized luminance plane
//! so that the regions `phi > 0` and `phi <= 0` are each as close as
//! possible to constant intensity, with a curvature penalty on the
//! boundary length. The initial level set is a checkerboard of
//! `sin(pi x / 5) * sin(pi y / 5)`.

use std::f64::consts::PI;

use image::{DynamicImage, GrayImage, Luma};

use crate::grayscale::luminance;
use crate::types::LumaF32Image;

/// Boundary length weight.
pub const MU: f64 = 0.25;
/// Weight of the inside-region fit term.
pub const LAMBDA1: f64 = 1.0;
/// Weight of the outside-region fit term.
pub const LAMBDA2: f64 = 1.0;
/// Stop once the RMS change of `phi` per iteration falls to this value.
pub const TOLERANCE: f64 = 1e-3;
/// Hard iteration cap.
pub const MAX_ITERATIONS: usize = 200;
/// Time step.
pub const DT: f64 = 0.5;

/// Guards the curvature denominators against division by zero.
const ETA: f64 = 1e-16;

/// A row-major `f64` grid.
struct Field {
    width: usize,
    height: usize,
    data: Vec<f64>,
}

impl Field {
    fn from_plane(plane: &LumaF32Image) -> Self {
        Self {
            width: plane.width() as usize,
            height: plane.height() as usize,
            data: plane.pixels().map(|p| f64::from(p.0[0])).collect(),
        }
    }

    /// Value at `(x, y)` with edge replication outside the grid.
    fn clamped(&self, x: usize, y: usize, dx: isize, dy: isize) -> f64 {
        let cx = x.saturating_add_signed(dx).min(self.width - 1);
        let cy = y.saturating_add_signed(dy).min(self.height - 1);
        self.data[cy * self.width + cx]
    }
}

/// Rescale to `[0, 1]`; a constant image becomes all zero.
fn normalize(values: &mut [f64]) {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    for v in values.iter_mut() {
        *v -= min;
        if span > 0.0 {
            *v /= span;
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn checkerboard(width: usize, height: usize) -> Vec<f64> {
    let sf = PI / 5.0;
    (0..height)
        .flat_map(|y| (0..width).map(move |x| (sf * y as f64).sin() * (sf * x as f64).sin()))
        .collect()
}

/// Mean intensity inside (`phi > 0`) and outside the contour.
#[allow(clippy::cast_precision_loss)]
fn region_means(image: &[f64], phi: &[f64]) -> (f64, f64) {
    let (mut sum_in, mut n_in, mut sum_out, mut n_out) = (0.0, 0_usize, 0.0, 0_usize);
    for (&v, &p) in image.iter().zip(phi) {
        if p > 0.0 {
            sum_in += v;
            n_in += 1;
        } else {
            sum_out += v;
            n_out += 1;
        }
    }
    let mean = |sum: f64, n: usize| if n == 0 { sum } else { sum / n as f64 };
    (mean(sum_in, n_in), mean(sum_out, n_out))
}

/// Smoothed Dirac delta with unit width.
fn delta(x: f64) -> f64 {
    1.0 / x.mul_add(x, 1.0)
}

/// One semi-implicit gradient-descent step of the level set.
fn step(image: &[f64], phi: &Field) -> Vec<f64> {
    let (c1, c2) = region_means(image, &phi.data);
    let mut next = Vec::with_capacity(phi.data.len());

    for y in 0..phi.height {
        for x in 0..phi.width {
            let c = phi.clamped(x, y, 0, 0);
            let xp = phi.clamped(x, y, 1, 0);
            let xn = phi.clamped(x, y, -1, 0);
            let yp = phi.clamped(x, y, 0, 1);
            let yn = phi.clamped(x, y, 0, -1);

            let (phixp, phixn, phix0) = (xp - c, c - xn, (xp - xn) / 2.0);
            let (phiyp, phiyn, phiy0) = (yp - c, c - yn, (yp - yn) / 2.0);

            let c1_ = 1.0 / (ETA + phixp * phixp + phiy0 * phiy0).sqrt();
            let c2_ = 1.0 / (ETA + phixn * phixn + phiy0 * phiy0).sqrt();
            let c3_ = 1.0 / (ETA + phix0 * phix0 + phiyp * phiyp).sqrt();
            let c4_ = 1.0 / (ETA + phix0 * phix0 + phiyn * phiyn).sqrt();
            let curvature = xp * c1_ + xn * c2_ + yp * c3_ + yn * c4_;

            let v = image[y * phi.width + x];
            let fit = -LAMBDA1 * (v - c1).powi(2) + LAMBDA2 * (v - c2).powi(2);
            let d = DT * delta(c);

            let updated = d.mul_add(MU.mul_add(curvature, fit), c);
            next.push(updated / (MU * d).mul_add(c1_ + c2_ + c3_ + c4_, 1.0));
        }
    }
    next
}

/// Run Chan-Vese on a luminance plane and return the `phi > 0` mask.
#[must_use = "returns the segmentation mask"]
#[allow(clippy::cast_precision_loss)]
pub fn segment_plane(plane: &LumaF32Image) -> GrayImage {
    let (w, h) = plane.dimensions();
    if w == 0 || h == 0 {
        return GrayImage::new(w, h);
    }

    let mut image = Field::from_plane(plane);
    normalize(&mut image.data);

    let mut phi = Field {
        width: image.width,
        height: image.height,
        data: checkerboard(image.width, image.height),
    };

    for _ in 0..MAX_ITERATIONS {
        let next = step(&image.data, &phi);
        let sq: f64 = next
            .iter()
            .zip(&phi.data)
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        phi.data = next;
        if (sq / phi.data.len() as f64).sqrt() <= TOLERANCE {
            break;
        }
    }

    let mut mask = phi.data.iter();
    GrayImage::from_fn(w, h, |_, _| {
        Luma([if mask.next().is_some_and(|&p| p > 0.0) { 255 } else { 0 }])
    })
}

/// The `chanvese` operation.
#[must_use = "returns the segmented image"]
pub fn segment(image: &DynamicImage) -> DynamicImage {
    DynamicImage::ImageLuma8(segment_plane(&luminance(image)))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Dark background with a bright square in the middle.
    fn square_plane() -> LumaF32Image {
        LumaF32Image::from_fn(24, 24, |x, y| {
            Luma([if (8..16).contains(&x) && (8..16).contains(&y) { 0.9 } else { 0.1 }])
        })
    }

    #[test]
    fn output_is_binary_and_same_size() {
        let mask = segment_plane(&square_plane());
        assert_eq!(mask.dimensions(), (24, 24));
        assert!(mask.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn square_and_background_land_in_different_regions() {
        let mask = segment_plane(&square_plane());
        let inside = mask.get_pixel(12, 12).0[0];
        let outside = mask.get_pixel(2, 2).0[0];
        assert_ne!(inside, outside);
    }

    #[test]
    fn region_is_uniform_within_square() {
        let mask = segment_plane(&square_plane());
        let inside = mask.get_pixel(12, 12).0[0];
        for y in 10..14 {
            for x in 10..14 {
                assert_eq!(mask.get_pixel(x, y).0[0], inside);
            }
        }
    }

    #[test]
    fn segmentation_is_deterministic() {
        let plane = square_plane();
        assert_eq!(segment_plane(&plane), segment_plane(&plane));
    }

    #[test]
    fn constant_image_does_not_produce_nan() {
        let plane = LumaF32Image::from_pixel(6, 6, Luma([0.4]));
        let mask = segment_plane(&plane);
        assert_eq!(mask.dimensions(), (6, 6));
    }

    #[test]
    fn single_pixel_image_is_handled() {
        let plane = LumaF32Image::from_pixel(1, 1, Luma([1.0]));
        assert_eq!(segment_plane(&plane).dimensions(), (1, 1));
    }

    #[test]
    fn checkerboard_starts_at_zero_on_axes() {
        let cb = checkerboard(6, 6);
        assert!(cb[0].abs() < f64::EPSILON);
        assert!(cb[6 * 3 + 3] > 0.0);
    }
}
