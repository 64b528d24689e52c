//! Reading and writing image files.

use std::path::Path;

use agriedge_ops::grayscale::decode;
use agriedge_ops::{DynamicImage, OperationError};
use image::ImageError;

use crate::error::WorkbenchError;

/// Read and decode an image file.
///
/// # Errors
///
/// Returns [`WorkbenchError::Decode`] if the file cannot be read, is
/// empty, or is not a supported image.
pub fn read_image(path: &Path) -> Result<DynamicImage, WorkbenchError> {
    let decode_error = |source: OperationError| WorkbenchError::Decode {
        path: path.to_path_buf(),
        source,
    };
    let bytes = std::fs::read(path)
        .map_err(|e| decode_error(OperationError::ImageDecode(ImageError::IoError(e))))?;
    decode(&bytes).map_err(decode_error)
}

/// Encode an image to `path`, choosing the format from the extension.
///
/// # Errors
///
/// Returns [`WorkbenchError::Write`] if the extension is not a supported
/// format, the image cannot be encoded in it, or the file cannot be
/// written.
pub fn write_image(image: &DynamicImage, path: &Path) -> Result<(), WorkbenchError> {
    image.save(path).map_err(|source| WorkbenchError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// The file name shown for a path: its last component, or the whole path
/// if it has none.
#[must_use]
pub fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}
