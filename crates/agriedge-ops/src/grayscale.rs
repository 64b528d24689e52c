//! Image decoding, luminance extraction, and RGB-to-grayscale conversion.
//!
//! Every operation starts here: raw bytes are decoded into a
//! [`DynamicImage`], and most operations then reduce it to a `[0, 1]`
//! luminance plane with [`luminance`].

use image::{DynamicImage, GrayImage, Luma};

use crate::types::{LumaF32Image, OperationError, OperationId};

/// Red luminance weight (ITU-R BT.709, as used by `rgb2gray`).
pub const LUMA_R: f32 = 0.2125;
/// Green luminance weight.
pub const LUMA_G: f32 = 0.7154;
/// Blue luminance weight.
pub const LUMA_B: f32 = 0.0721;

/// Decode raw image bytes.
///
/// Supports whatever formats the `image` crate was built with
/// (PNG, JPEG, BMP, WebP).
///
/// # Errors
///
/// Returns [`OperationError::EmptyInput`] if `bytes` is empty.
/// Returns [`OperationError::ImageDecode`] if the format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, OperationError> {
    if bytes.is_empty() {
        return Err(OperationError::EmptyInput);
    }

    Ok(image::load_from_memory(bytes)?)
}

/// Reduce an image to a `[0, 1]` luminance plane.
///
/// Colour images use the `LUMA_*` weights on the RGB channels (alpha is
/// ignored); single-channel images are rescaled as-is.
#[must_use = "returns the luminance plane"]
pub fn luminance(image: &DynamicImage) -> LumaF32Image {
    if image.color().has_color() {
        let rgb = image.to_rgb32f();
        LumaF32Image::from_fn(rgb.width(), rgb.height(), |x, y| {
            let [r, g, b] = rgb.get_pixel(x, y).0;
            Luma([LUMA_R.mul_add(r, LUMA_G.mul_add(g, LUMA_B * b))])
        })
    } else {
        image.to_luma32f()
    }
}

/// Convert a `[0, 1]` value to 8-bit by scaling and truncating.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn unit_to_u8(value: f32) -> u8 {
    (value * 255.0).clamp(0.0, 255.0) as u8
}

/// Render a `[0, 1]` luminance plane as an 8-bit grayscale image.
#[must_use = "returns the 8-bit image"]
pub fn to_gray8(plane: &LumaF32Image) -> GrayImage {
    imageproc::map::map_pixels(plane, |Luma([v])| Luma([unit_to_u8(v)]))
}

/// Fail with [`OperationError::UnsupportedColor`] unless the image has
/// colour channels.
pub(crate) fn require_color(
    image: &DynamicImage,
    operation: OperationId,
) -> Result<(), OperationError> {
    if image.color().has_color() {
        Ok(())
    } else {
        Err(OperationError::UnsupportedColor {
            operation,
            color: format!("{:?}", image.color()),
        })
    }
}

/// The `grayscale` operation: RGB(A) to 8-bit luminance.
///
/// # Errors
///
/// Returns [`OperationError::UnsupportedColor`] for single-channel
/// input; there is nothing to convert.
pub fn grayscale(image: &DynamicImage) -> Result<DynamicImage, OperationError> {
    require_color(image, OperationId::Grayscale)?;
    Ok(DynamicImage::ImageLuma8(to_gray8(&luminance(image))))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Helper: encode a single 1x1 RGBA pixel as a PNG byte buffer.
    fn encode_rgba_pixel(r: u8, g: u8, b: u8) -> Vec<u8> {
        let img = image::RgbaImage::from_fn(1, 1, |_, _| image::Rgba([r, g, b, 255]));
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn empty_input_returns_error() {
        let result = decode(&[]);
        assert!(matches!(result, Err(OperationError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = decode(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(OperationError::ImageDecode(_))));
    }

    #[test]
    fn white_pixel_has_full_luminance() {
        let img = decode(&encode_rgba_pixel(255, 255, 255)).unwrap();
        let lum = luminance(&img);
        assert!((lum.get_pixel(0, 0).0[0] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn luminance_weights_green_over_red_over_blue() {
        let lum = |r, g, b| luminance(&decode(&encode_rgba_pixel(r, g, b)).unwrap()).get_pixel(0, 0).0[0];
        let (red, green, blue) = (lum(255, 0, 0), lum(0, 255, 0), lum(0, 0, 255));
        assert!(
            green > red && red > blue,
            "expected green > red > blue, got R={red} G={green} B={blue}",
        );
    }

    #[test]
    fn grayscale_truncates_scaled_luminance() {
        let img = decode(&encode_rgba_pixel(255, 0, 0)).unwrap();
        let gray = grayscale(&img).unwrap().to_luma8();
        // 0.2125 * 255 = 54.19 -> 54
        assert_eq!(gray.get_pixel(0, 0).0[0], 54);
    }

    #[test]
    fn grayscale_preserves_dimensions() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::new(17, 31));
        let gray = grayscale(&img).unwrap();
        assert_eq!((gray.width(), gray.height()), (17, 31));
    }

    #[test]
    fn grayscale_rejects_single_channel_input() {
        let img = DynamicImage::ImageLuma8(GrayImage::new(4, 4));
        let err = grayscale(&img).unwrap_err();
        assert!(matches!(
            err,
            OperationError::UnsupportedColor {
                operation: OperationId::Grayscale,
                ..
            }
        ));
    }

    #[test]
    fn gray_input_luminance_is_rescaled_directly() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 2, Luma([51])));
        let lum = luminance(&img);
        assert!((lum.get_pixel(1, 1).0[0] - 0.2).abs() < 1e-6);
    }
}
