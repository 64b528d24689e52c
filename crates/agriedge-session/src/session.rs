//! The workbench: session state, dispatch policy and undo/redo.
//!
//! [`Workbench`] owns everything that changes while the user works: the
//! loaded image, the non-parametric dedup set, the last edge detector
//! used, the history ledger and the two displayed slots. All of it is
//! mutated only through `&mut self`; workers never touch it.
//!
//! Dispatch is two-phase. [`Workbench::apply`] validates the request and
//! starts a worker, returning a [`PendingApply`]. Once that finishes, the
//! caller hands it back to [`Workbench::complete`], which drops it if a
//! newer request has been made since and otherwise commits it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use agriedge_ops::{DynamicImage, OperationId, Threshold, registry};
use log::{debug, info, warn};

use crate::config::WorkbenchConfig;
use crate::error::{ImageSlot, WorkbenchError};
use crate::executor::{Completed, ExecutionEvent, ExecutionHandle, ExecutionToken, Executor};
use crate::files;
use crate::history::{HistoryLedger, OperationRecord};

/// Name and size of a freshly loaded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    /// Last path component of the loaded file.
    pub file_name: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl fmt::Display for ImageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} x {})", self.file_name, self.width, self.height)
    }
}

/// Coarse UI state, used to enable or disable controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// No image loaded.
    Idle,
    /// An image is loaded but no result is displayed.
    ImageLoaded,
    /// A result is displayed.
    Processed,
}

/// Per-image dispatch state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    loaded_image: Option<PathBuf>,
    applied_nonparametric: BTreeSet<OperationId>,
    last_parametric_operation: Option<OperationId>,
}

impl SessionState {
    /// Path of the active source image.
    #[must_use]
    pub fn loaded_image(&self) -> Option<&Path> {
        self.loaded_image.as_deref()
    }

    /// Non-parametric operations already applied to the loaded image.
    #[must_use]
    pub const fn applied_nonparametric(&self) -> &BTreeSet<OperationId> {
        &self.applied_nonparametric
    }

    /// The edge detector a threshold change re-runs.
    #[must_use]
    pub const fn last_parametric_operation(&self) -> Option<OperationId> {
        self.last_parametric_operation
    }

    fn reset(&mut self, path: PathBuf) {
        self.loaded_image = Some(path);
        self.applied_nonparametric.clear();
        self.last_parametric_operation = None;
    }
}

/// An operation running in the background.
#[derive(Debug)]
#[must_use = "pass the finished result to Workbench::complete"]
pub struct PendingApply {
    record: OperationRecord,
    handle: ExecutionHandle,
}

impl PendingApply {
    /// The token identifying this request.
    pub const fn token(&self) -> ExecutionToken {
        self.handle.token()
    }

    /// What is being applied.
    pub const fn record(&self) -> &OperationRecord {
        &self.record
    }

    /// Drain available events without blocking.
    ///
    /// Progress milestones go to `on_progress`. Returns the finished
    /// request, or `self` back if the worker is still running.
    ///
    /// # Errors
    ///
    /// The `Err` side is not a failure: it hands the still-running
    /// request back to the caller.
    pub fn poll(self, mut on_progress: impl FnMut(u8)) -> Result<FinishedApply, Self> {
        while let Some(event) = self.handle.try_next() {
            match event {
                ExecutionEvent::Progress(p) => on_progress(p),
                ExecutionEvent::Finished(result) => {
                    return Ok(FinishedApply {
                        token: self.handle.token(),
                        record: self.record,
                        result,
                    });
                }
            }
        }
        Err(self)
    }

    /// Block until the worker finishes.
    pub fn wait(self, on_progress: impl FnMut(u8)) -> FinishedApply {
        let token = self.handle.token();
        let result = self.handle.wait(on_progress);
        FinishedApply {
            token,
            record: self.record,
            result,
        }
    }
}

/// A background operation that has finished, successfully or not.
#[derive(Debug)]
#[must_use = "pass the finished result to Workbench::complete"]
pub struct FinishedApply {
    token: ExecutionToken,
    record: OperationRecord,
    result: Result<Completed, WorkbenchError>,
}

impl FinishedApply {
    /// The token identifying the request.
    pub const fn token(&self) -> ExecutionToken {
        self.token
    }

    /// What was applied.
    pub const fn record(&self) -> &OperationRecord {
        &self.record
    }
}

/// Single-image workbench with replayable undo/redo history.
#[derive(Debug)]
pub struct Workbench {
    config: WorkbenchConfig,
    executor: Executor,
    state: SessionState,
    history: HistoryLedger,
    threshold: Option<Threshold>,
    source: Option<DynamicImage>,
    output: Option<Completed>,
    operations_by_file: BTreeMap<String, Vec<OperationId>>,
}

impl Workbench {
    /// A workbench with no image loaded.
    ///
    /// The threshold control starts at `config.default_threshold`.
    #[must_use]
    pub fn new(config: WorkbenchConfig) -> Self {
        Self {
            threshold: config.default_threshold,
            config,
            executor: Executor::new(),
            state: SessionState::default(),
            history: HistoryLedger::new(),
            source: None,
            output: None,
            operations_by_file: BTreeMap::new(),
        }
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &WorkbenchConfig {
        &self.config
    }

    /// Dispatch state for the loaded image.
    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// The undo history.
    #[must_use]
    pub const fn history(&self) -> &HistoryLedger {
        &self.history
    }

    /// Current threshold control value.
    #[must_use]
    pub const fn threshold(&self) -> Option<Threshold> {
        self.threshold
    }

    /// The source preview slot.
    #[must_use]
    pub const fn source(&self) -> Option<&DynamicImage> {
        self.source.as_ref()
    }

    /// The displayed result.
    #[must_use]
    pub const fn output(&self) -> Option<&Completed> {
        self.output.as_ref()
    }

    /// Coarse UI state.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match (&self.state.loaded_image, &self.output) {
            (None, _) => Stage::Idle,
            (Some(_), None) => Stage::ImageLoaded,
            (Some(_), Some(_)) => Stage::Processed,
        }
    }

    /// Whether [`undo`](Self::undo) has an earlier step to return to.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Whether [`redo`](Self::redo) has a later step to return to.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Distinct operations applied to files named `file_name`, in the
    /// order first applied. Kept across loads.
    #[must_use]
    pub fn operations_for(&self, file_name: &str) -> &[OperationId] {
        self.operations_by_file
            .get(file_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Load a new source image.
    ///
    /// On success the dispatch state and the history are reset, the
    /// result slot is emptied and any in-flight operation becomes stale.
    ///
    /// # Errors
    ///
    /// Returns [`WorkbenchError::Decode`] and leaves the session untouched
    /// if the file cannot be read or decoded.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<ImageInfo, WorkbenchError> {
        let path = path.as_ref();
        let image = files::read_image(path).inspect_err(|e| warn!("{e}"))?;
        let info = ImageInfo {
            file_name: files::display_name(path),
            width: image.width(),
            height: image.height(),
        };

        self.executor.supersede();
        self.state.reset(path.to_path_buf());
        self.history.clear();
        self.source = Some(image);
        self.output = None;
        info!("loaded {info}");
        Ok(info)
    }

    /// Start an operation on the loaded image.
    ///
    /// Any earlier pending request becomes stale. Edge detectors are
    /// remembered as the target of [`set_threshold`](Self::set_threshold)
    /// even if this run later fails. A `None` parameter runs an edge
    /// detector without binarization.
    ///
    /// # Errors
    ///
    /// Returns [`WorkbenchError::NoImageLoaded`] without an image, or
    /// [`WorkbenchError::AlreadyApplied`] for a non-parametric operation
    /// that has already been applied to this image.
    pub fn apply(
        &mut self,
        operation: OperationId,
        parameter: Option<Threshold>,
    ) -> Result<PendingApply, WorkbenchError> {
        let path = self
            .state
            .loaded_image
            .clone()
            .ok_or(WorkbenchError::NoImageLoaded)?;

        if operation.is_parametric() {
            self.state.last_parametric_operation = Some(operation);
        } else if self.state.applied_nonparametric.contains(&operation) {
            debug!("{operation} already applied to {}", path.display());
            return Err(WorkbenchError::AlreadyApplied(operation));
        }

        let record = OperationRecord::new(operation, path, parameter);
        let handle = self.executor.execute(record.clone());
        Ok(PendingApply { record, handle })
    }

    /// [`apply`](Self::apply) by identifier string.
    ///
    /// # Errors
    ///
    /// Returns [`WorkbenchError::UnknownOperation`] for an unrecognized
    /// identifier, otherwise as [`apply`](Self::apply).
    pub fn apply_named(
        &mut self,
        name: &str,
        parameter: Option<Threshold>,
    ) -> Result<PendingApply, WorkbenchError> {
        let descriptor = registry::resolve(name)?;
        self.apply(descriptor.id, parameter)
    }

    /// Commit a finished request.
    ///
    /// Returns `Ok(None)` for a stale result, which is dropped without
    /// touching any state.
    ///
    /// # Errors
    ///
    /// Returns the failure the worker reported. Nothing is committed.
    pub fn complete(
        &mut self,
        finished: FinishedApply,
    ) -> Result<Option<&Completed>, WorkbenchError> {
        let FinishedApply {
            token,
            record,
            result,
        } = finished;
        if !self.executor.is_current(token) {
            debug!(
                "discarding stale {} result (token {})",
                record.operation_id,
                token.value()
            );
            return Ok(None);
        }
        self.commit(record, result).map(Some)
    }

    /// Apply an operation and wait for it.
    ///
    /// # Errors
    ///
    /// As [`apply`](Self::apply), plus any failure of the transform.
    pub fn apply_blocking(
        &mut self,
        operation: OperationId,
        parameter: Option<Threshold>,
    ) -> Result<&Completed, WorkbenchError> {
        let pending = self.apply(operation, parameter)?;
        let FinishedApply { record, result, .. } = pending.wait(|_| {});
        self.commit(record, result)
    }

    fn commit(
        &mut self,
        record: OperationRecord,
        result: Result<Completed, WorkbenchError>,
    ) -> Result<&Completed, WorkbenchError> {
        let completed = result.inspect_err(|e| warn!("{e}"))?;
        let operation = record.operation_id;

        if !operation.is_parametric() {
            self.state.applied_nonparametric.insert(operation);
        }
        let log = self
            .operations_by_file
            .entry(files::display_name(record.source_path()))
            .or_default();
        if !log.contains(&operation) {
            log.push(operation);
        }

        let discarded = self.history.push(record);
        if discarded > 0 {
            debug!("discarded {discarded} redo entries");
        }
        info!(
            "applied {operation} in {} ms",
            completed.elapsed.as_millis()
        );
        Ok(self.output.insert(completed))
    }

    /// Change the threshold control.
    ///
    /// If an edge detector has been used on this image it is re-applied
    /// with the new value, which is a new undoable step.
    /// Running a non-edge operation in between does not forget the last
    /// edge detector; only loading an image does.
    ///
    /// # Errors
    ///
    /// As [`apply`](Self::apply).
    pub fn set_threshold(
        &mut self,
        threshold: Option<Threshold>,
    ) -> Result<Option<PendingApply>, WorkbenchError> {
        self.threshold = threshold;
        match self.state.last_parametric_operation {
            Some(operation) => self.apply(operation, threshold).map(Some),
            None => Ok(None),
        }
    }

    /// Step back one entry and replay it from its source image.
    ///
    /// Any in-flight apply becomes stale.
    ///
    /// # Errors
    ///
    /// Returns [`WorkbenchError::NothingToUndo`] at the first entry or
    /// with an empty history. If the replay fails the cursor is restored
    /// and the failure returned.
    pub fn undo(&mut self) -> Result<&Completed, WorkbenchError> {
        let previous = self.history.cursor();
        let record = self
            .history
            .step_back()
            .cloned()
            .ok_or(WorkbenchError::NothingToUndo)?;
        info!("undo to {}", record.operation_id);
        self.replay(&record, previous)
    }

    /// Step forward one entry and replay it from its source image.
    ///
    /// Any in-flight apply becomes stale.
    ///
    /// # Errors
    ///
    /// Returns [`WorkbenchError::NothingToRedo`] at the last entry. If
    /// the replay fails the cursor is restored and the failure returned.
    pub fn redo(&mut self) -> Result<&Completed, WorkbenchError> {
        let previous = self.history.cursor();
        let record = self
            .history
            .step_forward()
            .cloned()
            .ok_or(WorkbenchError::NothingToRedo)?;
        info!("redo to {}", record.operation_id);
        self.replay(&record, previous)
    }

    fn replay(
        &mut self,
        record: &OperationRecord,
        previous: Option<usize>,
    ) -> Result<&Completed, WorkbenchError> {
        self.executor.supersede();
        match self.executor.execute_sync(record) {
            Ok(completed) => Ok(self.output.insert(completed)),
            Err(e) => {
                warn!("replay failed: {e}");
                self.history.restore_cursor(previous);
                Err(e)
            }
        }
    }

    /// Empty the result slot. History is untouched.
    pub fn clear_output(&mut self) {
        self.output = None;
    }

    /// Empty the source preview slot. The loaded image stays active.
    pub fn clear_source(&mut self) {
        self.source = None;
    }

    fn slot(&self, slot: ImageSlot) -> Result<&DynamicImage, WorkbenchError> {
        match slot {
            ImageSlot::Source => self.source.as_ref(),
            ImageSlot::Output => self.output.as_ref().map(|c| &c.image),
        }
        .ok_or(WorkbenchError::NothingToSave(slot))
    }

    /// Write the result to `path`, or to the configured quick-save path.
    ///
    /// Returns the path written.
    ///
    /// # Errors
    ///
    /// Returns [`WorkbenchError::NothingToSave`] with no result, or
    /// [`WorkbenchError::Write`] if writing fails.
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf, WorkbenchError> {
        let image = self.slot(ImageSlot::Output)?;
        let target = path.unwrap_or(self.config.default_save_path.as_path());
        files::write_image(image, target).inspect_err(|e| warn!("{e}"))?;
        info!("saved {}", target.display());
        Ok(target.to_path_buf())
    }

    /// Write one slot to `path` and return a status message built from
    /// `title`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkbenchError::NothingToSave`] for an empty slot, or
    /// [`WorkbenchError::Write`] if writing fails.
    pub fn export(
        &self,
        slot: ImageSlot,
        path: &Path,
        title: &str,
    ) -> Result<String, WorkbenchError> {
        let image = self.slot(slot)?;
        files::write_image(image, path).inspect_err(|e| warn!("{e}"))?;
        info!("exported {slot} to {}", path.display());
        Ok(format!("{title} complete"))
    }

    /// Write the result to the configured exit path, if there is one.
    ///
    /// # Errors
    ///
    /// Returns [`WorkbenchError::Write`] if writing fails.
    pub fn save_on_exit(&self) -> Result<Option<PathBuf>, WorkbenchError> {
        if self.output.is_none() {
            return Ok(None);
        }
        self.save(Some(self.config.exit_save_path.as_path()))
            .map(Some)
    }
}

impl Default for Workbench {
    fn default() -> Self {
        Self::new(WorkbenchConfig::default())
    }
}
