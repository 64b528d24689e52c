//! Gradient-magnitude edge detectors: Sobel, Scharr, Prewitt, Roberts.
//!
//! Each operator computes a normalized gradient magnitude on the `[0, 1]`
//! luminance plane, so a full-scale step edge has magnitude 1. The
//! one-pixel image border is always zero.
//!
//! With a [`Threshold`] the magnitude map is binarized; without one it is
//! rendered directly as 8-bit grayscale.

use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use imageproc::filter::filter;
use imageproc::kernel::{self, Kernel};

use crate::grayscale::{luminance, to_gray8};
use crate::types::{LumaF32Image, Threshold};

/// Fixed-point scale of the plane fed to the integer kernels.
const PLANE_SCALE: f32 = 65535.0;

type LumaU16Image = ImageBuffer<Luma<u16>, Vec<u16>>;

/// Which gradient kernel pair to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOperator {
    /// 3x3 Sobel, smoothing weights `[1, 2, 1] / 4`.
    Sobel,
    /// 3x3 Scharr, smoothing weights `[3, 10, 3] / 16`.
    Scharr,
    /// 3x3 Prewitt, smoothing weights `[1, 1, 1] / 3`.
    Prewitt,
    /// 2x2 Roberts cross.
    Roberts,
}

impl EdgeOperator {
    /// Horizontal and vertical derivative kernels.
    const fn kernels(self) -> (Kernel<'static, i32>, Kernel<'static, i32>) {
        match self {
            Self::Sobel => (kernel::SOBEL_HORIZONTAL_3X3, kernel::SOBEL_VERTICAL_3X3),
            Self::Scharr => (kernel::SCHARR_HORIZONTAL_3X3, kernel::SCHARR_VERTICAL_3X3),
            Self::Prewitt => (kernel::PREWITT_HORIZONTAL_3X3, kernel::PREWITT_VERTICAL_3X3),
            Self::Roberts => (kernel::ROBERTS_HORIZONTAL_2X2, kernel::ROBERTS_VERTICAL_2X2),
        }
    }

    /// Kernel response to a unit step: the sum of its positive weights.
    const fn unit_response(self) -> f32 {
        match self {
            Self::Sobel => 4.0,
            Self::Scharr => 16.0,
            Self::Prewitt => 3.0,
            Self::Roberts => 1.0,
        }
    }

    /// Gradient magnitude of a luminance plane.
    ///
    /// Each derivative is divided by the kernel's unit response, so a
    /// full-scale step has derivative 1; the magnitude is
    /// `sqrt((gx^2 + gy^2) / 2)`.
    #[must_use = "returns the magnitude map"]
    // |acc| <= 16 * 65535 < 2^24, so the i32 -> f32 cast is exact.
    #[allow(clippy::cast_precision_loss)]
    pub fn magnitude(self, plane: &LumaF32Image) -> LumaF32Image {
        let (w, h) = plane.dimensions();
        let fixed: LumaU16Image =
            imageproc::map::map_pixels(plane, |Luma([v])| Luma([unit_to_u16(v)]));

        let scale = self.unit_response() * PLANE_SCALE;
        let derivative = |k: Kernel<'static, i32>| -> LumaF32Image {
            filter(&fixed, k, |acc: i32| acc as f32 / scale)
        };
        let (horizontal, vertical) = self.kernels();
        let gx = derivative(horizontal);
        let gy = derivative(vertical);

        LumaF32Image::from_fn(w, h, |x, y| {
            if x == 0 || y == 0 || x + 1 >= w || y + 1 >= h {
                return Luma([0.0]);
            }
            let dx = gx.get_pixel(x, y).0[0];
            let dy = gy.get_pixel(x, y).0[0];
            Luma([(dx.mul_add(dx, dy * dy) / 2.0).sqrt()])
        })
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn unit_to_u16(value: f32) -> u16 {
    (value.clamp(0.0, 1.0) * PLANE_SCALE).round() as u16
}

/// Render a magnitude map, binarizing it when a threshold is given.
///
/// Pixels with magnitude strictly above `threshold / 255` become 255,
/// all others 0.
#[must_use = "returns the rendered edge map"]
pub fn render(magnitude: &LumaF32Image, threshold: Option<Threshold>) -> GrayImage {
    match threshold {
        Some(t) => {
            let cutoff = t.fraction();
            imageproc::map::map_pixels(magnitude, |Luma([v])| {
                Luma([if v > cutoff { 255 } else { 0 }])
            })
        }
        None => to_gray8(magnitude),
    }
}

/// Run an edge operator on a decoded image.
#[must_use = "returns the edge map"]
pub fn detect(
    image: &DynamicImage,
    operator: EdgeOperator,
    threshold: Option<Threshold>,
) -> DynamicImage {
    let magnitude = operator.magnitude(&luminance(image));
    DynamicImage::ImageLuma8(render(&magnitude, threshold))
}
