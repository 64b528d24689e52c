//! Background execution of operations with stale-result suppression.
//!
//! Each [`Executor::execute`] call runs one operation on its own worker
//! thread and hands back an [`ExecutionHandle`] carrying a fresh
//! [`ExecutionToken`]. Only the most recently issued token is current;
//! results that arrive under an older token are stale and must be
//! dropped by the caller. Superseding is advisory: the stale worker keeps
//! running to completion, nobody looks at what it sends.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use agriedge_ops::{DynamicImage, OperationError, OperationId, Threshold, registry};
use log::{debug, warn};
use web_time::Instant;

use crate::error::WorkbenchError;
use crate::files;
use crate::history::OperationRecord;

/// Progress reported once the worker has started.
pub const PROGRESS_STARTED: u8 = 20;
/// Progress reported once the transform has returned.
pub const PROGRESS_TRANSFORMED: u8 = 60;
/// Progress reported just before the result is delivered.
pub const PROGRESS_DONE: u8 = 100;

/// Correlates a result with the request that produced it.
///
/// Tokens increase monotonically per [`Executor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExecutionToken(u64);

impl ExecutionToken {
    /// The raw counter value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

/// A successfully computed result.
#[derive(Debug, Clone)]
pub struct Completed {
    /// The operation that produced the image.
    pub operation: OperationId,
    /// The threshold it ran with.
    pub parameter: Option<Threshold>,
    /// The result image.
    pub image: DynamicImage,
    /// Wall time spent reading, decoding and transforming.
    pub elapsed: Duration,
}

/// Messages sent from a worker to its handle.
#[derive(Debug)]
pub enum ExecutionEvent {
    /// A progress milestone in percent. Monotonic within one execution.
    Progress(u8),
    /// The final outcome. Always the last event.
    Finished(Result<Completed, WorkbenchError>),
}

/// Receiving end of one execution.
#[derive(Debug)]
pub struct ExecutionHandle {
    token: ExecutionToken,
    operation: OperationId,
    events: Receiver<ExecutionEvent>,
}

impl ExecutionHandle {
    /// The token this execution was issued.
    #[must_use]
    pub const fn token(&self) -> ExecutionToken {
        self.token
    }

    /// The operation being executed.
    #[must_use]
    pub const fn operation(&self) -> OperationId {
        self.operation
    }

    /// Next pending event, without blocking.
    ///
    /// A worker that exits without reporting yields a
    /// [`TransformFailure`](WorkbenchError::TransformFailure).
    #[must_use]
    pub fn try_next(&self) -> Option<ExecutionEvent> {
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                Some(ExecutionEvent::Finished(Err(self.vanished())))
            }
        }
    }

    /// Block until the worker finishes, passing each progress milestone
    /// to `on_progress`.
    ///
    /// # Errors
    ///
    /// Returns whatever the worker reported, or a
    /// [`TransformFailure`](WorkbenchError::TransformFailure) if it
    /// exited without reporting.
    pub fn wait(self, mut on_progress: impl FnMut(u8)) -> Result<Completed, WorkbenchError> {
        while let Ok(event) = self.events.recv() {
            match event {
                ExecutionEvent::Progress(p) => on_progress(p),
                ExecutionEvent::Finished(result) => return result,
            }
        }
        Err(self.vanished())
    }

    fn vanished(&self) -> WorkbenchError {
        WorkbenchError::TransformFailure {
            operation: self.operation,
            cause: OperationError::Other("worker exited without a result".to_owned()),
        }
    }
}

/// Runs operations and tracks which execution is current.
#[derive(Debug, Default)]
pub struct Executor {
    latest: u64,
}

impl Executor {
    /// A new executor. The first issued token is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self { latest: 0 }
    }

    /// Whether `token` belongs to the most recent execution.
    #[must_use]
    pub const fn is_current(&self, token: ExecutionToken) -> bool {
        token.0 == self.latest
    }

    /// Invalidate every outstanding token without starting new work.
    pub fn supersede(&mut self) {
        self.latest += 1;
        debug!("superseded executions up to token {}", self.latest);
    }

    /// Start `record` on a worker thread.
    ///
    /// Any previously issued token becomes stale.
    pub fn execute(&mut self, record: OperationRecord) -> ExecutionHandle {
        self.latest += 1;
        let token = ExecutionToken(self.latest);
        let operation = record.operation_id;
        let (tx, events) = mpsc::channel();

        let worker_tx = tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("agriedge-{operation}-{}", token.0))
            .spawn(move || {
                let outcome = run(&record, |p| {
                    let _ = worker_tx.send(ExecutionEvent::Progress(p));
                });
                let _ = worker_tx.send(ExecutionEvent::Finished(outcome));
            });

        if let Err(e) = spawned {
            warn!("could not start worker for {operation}: {e}");
            let _ = tx.send(ExecutionEvent::Finished(Err(WorkbenchError::TransformFailure {
                operation,
                cause: OperationError::Other(format!("could not start worker: {e}")),
            })));
        }
        debug!("started {operation} as token {}", token.0);

        ExecutionHandle {
            token,
            operation,
            events,
        }
    }

    /// Run `record` on the calling thread.
    ///
    /// Does not issue a token.
    ///
    /// # Errors
    ///
    /// Returns [`WorkbenchError::Decode`] if the source file can no longer
    /// be read, or [`WorkbenchError::TransformFailure`] if the transform
    /// fails.
    #[allow(clippy::unused_self)]
    pub fn execute_sync(&self, record: &OperationRecord) -> Result<Completed, WorkbenchError> {
        run(record, |_| {})
    }
}

/// Read the record's source image and apply its transform.
fn run(record: &OperationRecord, progress: impl Fn(u8)) -> Result<Completed, WorkbenchError> {
    let start = Instant::now();
    progress(PROGRESS_STARTED);

    let source = files::read_image(record.source_path())?;
    let descriptor = registry::descriptor(record.operation_id);
    let image = panic::catch_unwind(AssertUnwindSafe(|| {
        descriptor.run(&source, record.parameter)
    }))
    .unwrap_or_else(|_| Err(OperationError::Other("transform panicked".to_owned())))
    .map_err(|cause| WorkbenchError::TransformFailure {
        operation: record.operation_id,
        cause,
    })?;
    progress(PROGRESS_TRANSFORMED);

    let completed = Completed {
        operation: record.operation_id,
        parameter: record.parameter,
        image,
        elapsed: start.elapsed(),
    };
    progress(PROGRESS_DONE);
    Ok(completed)
}
