//! Workbench error taxonomy.

use std::fmt;
use std::path::PathBuf;

use agriedge_ops::{OperationError, OperationId, UnknownOperation};

/// Which displayed image a save or export refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageSlot {
    /// The loaded source image preview.
    Source,
    /// The most recent operation result.
    Output,
}

impl fmt::Display for ImageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Source => "source",
            Self::Output => "output",
        })
    }
}

/// How a failure should be surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Expected and harmless; shown as a status message.
    Notice,
    /// Shown as a blocking alert. Prior state is left intact.
    Alert,
}

/// Errors reported by the workbench.
///
/// None of these are fatal: every failure leaves the session and its
/// history exactly as they were before the call.
#[derive(Debug, thiserror::Error)]
pub enum WorkbenchError {
    /// An operation was requested before any image was loaded.
    #[error("no image loaded")]
    NoImageLoaded,

    /// The operation identifier is not one of the built-in operations.
    #[error(transparent)]
    UnknownOperation(#[from] UnknownOperation),

    /// A non-parametric operation was already applied to this image.
    #[error("{0} has already been applied to this image")]
    AlreadyApplied(OperationId),

    /// The image file could not be read or decoded.
    #[error("failed to open {}: {source}", path.display())]
    Decode {
        /// The file that failed.
        path: PathBuf,
        /// Underlying read or decode failure.
        #[source]
        source: OperationError,
    },

    /// The transform itself failed.
    #[error("{operation} failed: {cause}")]
    TransformFailure {
        /// The operation that failed.
        operation: OperationId,
        /// What went wrong.
        #[source]
        cause: OperationError,
    },

    /// The image could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// The destination path.
        path: PathBuf,
        /// Underlying encode or I/O failure.
        #[source]
        source: image::ImageError,
    },

    /// Undo was requested with no earlier step to return to.
    #[error("nothing to undo")]
    NothingToUndo,

    /// Redo was requested with no later step to return to.
    #[error("nothing to redo")]
    NothingToRedo,

    /// Save or export was requested for an empty slot.
    #[error("no {0} image to save")]
    NothingToSave(ImageSlot),
}

impl WorkbenchError {
    /// Classify this error for display.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::AlreadyApplied(_)
            | Self::NothingToUndo
            | Self::NothingToRedo
            | Self::NothingToSave(_) => Severity::Notice,
            Self::NoImageLoaded
            | Self::UnknownOperation(_)
            | Self::Decode { .. }
            | Self::TransformFailure { .. }
            | Self::Write { .. } => Severity::Alert,
        }
    }
}
