//! Shared types for agriedge image operations.

use std::fmt;
use std::str::FromStr;

use image::{ImageBuffer, Luma};
use serde::{Deserialize, Serialize};

/// Re-export `DynamicImage` so downstream crates can hold operation
/// inputs and results without depending on `image` directly.
pub use image::DynamicImage;

/// Re-export `GrayImage` for single-channel operation outputs.
pub use image::GrayImage;

/// Single-channel floating point image with values in `[0, 1]`.
///
/// Edge operators and the level-set segmentations work on luminance in
/// this form before rendering back to 8-bit.
pub type LumaF32Image = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Identifier of one of the nine built-in operations.
///
/// Serialized as the lowercase identifier (`"sobel"`, `"chanvese"`, ...),
/// which is also what [`FromStr`] accepts and [`fmt::Display`] prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationId {
    /// RGB to grayscale conversion.
    Grayscale,
    /// RGB to hue map (HSV with saturation and value forced to 1).
    Hsv,
    /// Three-class Multi-Otsu thresholding.
    MultiOtsu,
    /// Chan-Vese level-set segmentation.
    ChanVese,
    /// Morphological Chan-Vese (morphological snakes) segmentation.
    MorphSnake,
    /// Sobel edge magnitude.
    Sobel,
    /// Scharr edge magnitude.
    Scharr,
    /// Prewitt edge magnitude.
    Prewitt,
    /// Roberts cross edge magnitude.
    Roberts,
}

impl OperationId {
    /// Every operation, in menu order.
    pub const ALL: [Self; 9] = [
        Self::Grayscale,
        Self::Hsv,
        Self::MultiOtsu,
        Self::ChanVese,
        Self::MorphSnake,
        Self::Sobel,
        Self::Scharr,
        Self::Prewitt,
        Self::Roberts,
    ];

    /// The identifier string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Grayscale => "grayscale",
            Self::Hsv => "hsv",
            Self::MultiOtsu => "multiotsu",
            Self::ChanVese => "chanvese",
            Self::MorphSnake => "morphsnake",
            Self::Sobel => "sobel",
            Self::Scharr => "scharr",
            Self::Prewitt => "prewitt",
            Self::Roberts => "roberts",
        }
    }

    /// Whether the operation is one of the threshold-driven edge
    /// detectors.
    ///
    /// Parametric operations may be re-applied any number of times;
    /// non-parametric ones are applied at most once per loaded image.
    #[must_use]
    pub const fn is_parametric(self) -> bool {
        matches!(
            self,
            Self::Sobel | Self::Scharr | Self::Prewitt | Self::Roberts
        )
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationId {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| UnknownOperation(s.to_owned()))
    }
}

/// The identifier is not one of the nine built-in operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operation: {0:?}")]
pub struct UnknownOperation(pub String);

/// Binarization threshold for the edge detectors, on the 0–255 scale.
///
/// Edge magnitudes strictly greater than `value / 255` become white.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Threshold(u8);

impl Threshold {
    /// Initial position of the threshold control.
    pub const DEFAULT: Self = Self(100);

    /// Create a threshold from its 0–255 value.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// The 0–255 value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// The threshold as a fraction of full scale, in `[0, 1]`.
    #[must_use]
    pub fn fraction(self) -> f32 {
        f32::from(self.0) / 255.0
    }
}

impl From<u8> for Threshold {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors that can occur while decoding or transforming an image.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// The decoded image has no pixels.
    #[error("image has no pixels")]
    EmptyImage,

    /// The operation needs a colour image but got something else.
    #[error("{operation} needs a colour image, got {color}")]
    UnsupportedColor {
        /// The operation that rejected the image.
        operation: OperationId,
        /// Debug name of the offending colour type.
        color: String,
    },

    /// The transform never produced a result (worker failed to start,
    /// exited early, or panicked).
    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_round_trip_through_from_str() {
        for id in OperationId::ALL {
            assert_eq!(id.as_str().parse::<OperationId>().unwrap(), id);
        }
    }

    #[test]
    fn unknown_identifier_is_rejected() {
        let err = "blur".parse::<OperationId>().unwrap_err();
        assert_eq!(err, UnknownOperation("blur".to_owned()));
    }

    #[test]
    fn identifiers_are_case_sensitive() {
        assert!("Sobel".parse::<OperationId>().is_err());
    }

    #[test]
    fn only_edge_detectors_are_parametric() {
        let parametric: Vec<_> = OperationId::ALL
            .into_iter()
            .filter(|id| id.is_parametric())
            .collect();
        assert_eq!(
            parametric,
            vec![
                OperationId::Sobel,
                OperationId::Scharr,
                OperationId::Prewitt,
                OperationId::Roberts
            ]
        );
    }

    #[test]
    fn serde_uses_identifier_strings() {
        let json = serde_json::to_string(&OperationId::MorphSnake).unwrap();
        assert_eq!(json, "\"morphsnake\"");
        let back: OperationId = serde_json::from_str("\"multiotsu\"").unwrap();
        assert_eq!(back, OperationId::MultiOtsu);
    }

    #[test]
    fn threshold_fraction_spans_unit_interval() {
        assert!(Threshold::new(0).fraction().abs() < f32::EPSILON);
        assert!((Threshold::new(255).fraction() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn threshold_serializes_as_bare_number() {
        assert_eq!(serde_json::to_string(&Threshold::new(150)).unwrap(), "150");
    }

    #[test]
    fn worker_failure_message_is_displayed_verbatim() {
        let err = OperationError::Other("transform panicked".to_owned());
        assert_eq!(err.to_string(), "transform panicked");
    }

    #[test]
    fn decode_error_keeps_typed_source() {
        let err = OperationError::from(image::load_from_memory(&[0xFF, 0x00]).unwrap_err());
        assert!(matches!(err, OperationError::ImageDecode(_)));
        assert!(err.to_string().starts_with("failed to decode image"));
    }
}
