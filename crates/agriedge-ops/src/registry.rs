//! Operation registry: identifier to transform lookup.
//!
//! Every operation is a plain function pointer behind an
//! [`OperationDescriptor`]. Dispatch is a `match` on [`OperationId`];
//! there is no per-operation type hierarchy.

use image::DynamicImage;

use crate::edge::{self, EdgeOperator};
use crate::types::{OperationError, OperationId, Threshold, UnknownOperation};

/// Signature shared by all transforms.
///
/// Non-parametric transforms ignore the threshold.
pub type TransformFn = fn(&DynamicImage, Option<Threshold>) -> Result<DynamicImage, OperationError>;

/// How to run one operation.
#[derive(Debug, Clone, Copy)]
pub struct OperationDescriptor {
    /// Which operation this describes.
    pub id: OperationId,
    /// Whether the transform reads the threshold parameter.
    pub takes_threshold: bool,
    transform: TransformFn,
}

impl OperationDescriptor {
    /// Run the transform.
    ///
    /// The threshold is dropped for operations that do not take one, so
    /// callers can pass the current control value unconditionally.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::EmptyImage`] for a zero-sized image, or
    /// whatever the transform itself reports.
    pub fn run(
        &self,
        image: &DynamicImage,
        threshold: Option<Threshold>,
    ) -> Result<DynamicImage, OperationError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(OperationError::EmptyImage);
        }
        let threshold = threshold.filter(|_| self.takes_threshold);
        (self.transform)(image, threshold)
    }
}

fn grayscale(image: &DynamicImage, _: Option<Threshold>) -> Result<DynamicImage, OperationError> {
    crate::grayscale::grayscale(image)
}

fn hsv(image: &DynamicImage, _: Option<Threshold>) -> Result<DynamicImage, OperationError> {
    crate::hsv::hue_map(image)
}

#[allow(clippy::unnecessary_wraps)]
fn multiotsu(image: &DynamicImage, _: Option<Threshold>) -> Result<DynamicImage, OperationError> {
    Ok(crate::multiotsu::segment(image))
}

#[allow(clippy::unnecessary_wraps)]
fn chanvese(image: &DynamicImage, _: Option<Threshold>) -> Result<DynamicImage, OperationError> {
    Ok(crate::chan_vese::segment(image))
}

#[allow(clippy::unnecessary_wraps)]
fn morphsnake(image: &DynamicImage, _: Option<Threshold>) -> Result<DynamicImage, OperationError> {
    Ok(crate::morph_snake::segment(image))
}

#[allow(clippy::unnecessary_wraps)]
fn sobel(image: &DynamicImage, t: Option<Threshold>) -> Result<DynamicImage, OperationError> {
    Ok(edge::detect(image, EdgeOperator::Sobel, t))
}

#[allow(clippy::unnecessary_wraps)]
fn scharr(image: &DynamicImage, t: Option<Threshold>) -> Result<DynamicImage, OperationError> {
    Ok(edge::detect(image, EdgeOperator::Scharr, t))
}

#[allow(clippy::unnecessary_wraps)]
fn prewitt(image: &DynamicImage, t: Option<Threshold>) -> Result<DynamicImage, OperationError> {
    Ok(edge::detect(image, EdgeOperator::Prewitt, t))
}

#[allow(clippy::unnecessary_wraps)]
fn roberts(image: &DynamicImage, t: Option<Threshold>) -> Result<DynamicImage, OperationError> {
    Ok(edge::detect(image, EdgeOperator::Roberts, t))
}

const fn entry(id: OperationId, transform: TransformFn) -> OperationDescriptor {
    OperationDescriptor {
        id,
        takes_threshold: id.is_parametric(),
        transform,
    }
}

static DESCRIPTORS: [OperationDescriptor; 9] = [
    entry(OperationId::Grayscale, grayscale),
    entry(OperationId::Hsv, hsv),
    entry(OperationId::MultiOtsu, multiotsu),
    entry(OperationId::ChanVese, chanvese),
    entry(OperationId::MorphSnake, morphsnake),
    entry(OperationId::Sobel, sobel),
    entry(OperationId::Scharr, scharr),
    entry(OperationId::Prewitt, prewitt),
    entry(OperationId::Roberts, roberts),
];

/// Descriptor for a known operation.
#[must_use]
pub const fn descriptor(id: OperationId) -> &'static OperationDescriptor {
    // DESCRIPTORS is in OperationId::ALL order.
    &DESCRIPTORS[id as usize]
}

/// Look up an operation by identifier string.
///
/// # Errors
///
/// Returns [`UnknownOperation`] if `name` is not one of the nine
/// built-in identifiers.
pub fn resolve(name: &str) -> Result<&'static OperationDescriptor, UnknownOperation> {
    name.parse().map(descriptor)
}

/// All registered operations.
pub fn all() -> impl Iterator<Item = &'static OperationDescriptor> {
    DESCRIPTORS.iter()
}
