//! agriedge-ops: Pure image operations for the agriedge workbench (sans-IO).
//!
//! Nine operations, each a deterministic function of the decoded source
//! image and (for the edge detectors) a 0–255 threshold:
//!
//! - colour: `grayscale`, `hsv`
//! - segmentation: `multiotsu`, `chanvese`, `morphsnake`
//! - edges: `sobel`, `scharr`, `prewitt`, `roberts`
//!
//! This crate has **no I/O dependencies**. Reading files, history and
//! threading live in `agriedge-session`.

pub mod chan_vese;
pub mod edge;
pub mod grayscale;
pub mod hsv;
pub mod morph_snake;
pub mod multiotsu;
pub mod registry;
pub mod types;

pub use edge::EdgeOperator;
pub use registry::{OperationDescriptor, TransformFn};
pub use types::{
    DynamicImage, GrayImage, LumaF32Image, OperationError, OperationId, Threshold,
    UnknownOperation,
};

/// Decode raw image bytes and run one operation on them.
///
/// Equivalent to [`grayscale::decode`] followed by the operation's
/// [`OperationDescriptor::run`]. Replaying the same bytes, operation and
/// threshold always yields the same pixels.
///
/// # Errors
///
/// Returns [`OperationError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`OperationError::ImageDecode`] if the image format is unrecognized.
/// Returns [`OperationError::UnsupportedColor`] if a colour operation gets
/// a single-channel image.
pub fn process(
    image_bytes: &[u8],
    operation: OperationId,
    threshold: Option<Threshold>,
) -> Result<DynamicImage, OperationError> {
    let source = grayscale::decode(image_bytes)?;
    registry::descriptor(operation).run(&source, threshold)
}
