//! agriedge-session: Stateful side of the agriedge workbench.
//!
//! Wraps the pure operations from `agriedge-ops` in a single-image
//! [`Workbench`] that:
//!
//! - refuses to re-apply colour and segmentation operations to the same
//!   image;
//! - runs operations on a worker thread with coarse progress, dropping
//!   results that a newer request has superseded;
//! - keeps a linear history of operation recipes and implements undo and
//!   redo by replaying them from the source file;
//! - loads, saves and exports images.

pub mod config;
pub mod error;
pub mod executor;
pub mod files;
pub mod history;
pub mod session;

pub use config::WorkbenchConfig;
pub use error::{ImageSlot, Severity, WorkbenchError};
pub use executor::{Completed, ExecutionEvent, ExecutionHandle, ExecutionToken, Executor};
pub use history::{HistoryLedger, OperationRecord};
pub use session::{FinishedApply, ImageInfo, PendingApply, SessionState, Stage, Workbench};
