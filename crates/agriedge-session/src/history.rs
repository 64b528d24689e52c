//! Replay-based linear undo history.
//!
//! The ledger keeps recipes, not pixels: each [`OperationRecord`] names
//! the operation, the source file and the threshold, which is enough to
//! reproduce the result exactly. Undo and redo only move the cursor; the
//! caller replays the record under it.
//!
//! Appending while the cursor is behind the tail discards the redo
//! branch. There is no history tree.

use std::path::{Path, PathBuf};

use agriedge_ops::{OperationId, Threshold};
use serde::{Deserialize, Serialize};

/// One applied operation, sufficient to replay it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Which operation ran.
    pub operation_id: OperationId,
    /// The source image it ran on.
    pub source_path: PathBuf,
    /// The threshold, for edge detectors that were given one.
    pub parameter: Option<Threshold>,
}

impl OperationRecord {
    /// Build a record, dropping the parameter for operations that do not
    /// take one.
    #[must_use]
    pub fn new(
        operation_id: OperationId,
        source_path: impl Into<PathBuf>,
        parameter: Option<Threshold>,
    ) -> Self {
        Self {
            operation_id,
            source_path: source_path.into(),
            parameter: parameter.filter(|_| operation_id.is_parametric()),
        }
    }

    /// The source image path.
    #[must_use]
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }
}

/// Ordered operation log with a cursor at the active entry.
///
/// Invariants:
/// - the cursor is `None` exactly when there are no entries;
/// - otherwise it is a valid index into the entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryLedger {
    entries: Vec<OperationRecord>,
    cursor: Option<usize>,
}

impl HistoryLedger {
    /// An empty ledger.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            cursor: None,
        }
    }

    /// All recorded entries, including any redo tail.
    #[must_use]
    pub fn entries(&self) -> &[OperationRecord] {
        &self.entries
    }

    /// Number of recorded entries.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index of the active entry, or `None` for an empty ledger.
    #[must_use]
    pub const fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// The active entry.
    #[must_use]
    pub fn current(&self) -> Option<&OperationRecord> {
        self.cursor.and_then(|i| self.entries.get(i))
    }

    /// Whether there is an earlier entry to step back to.
    ///
    /// The first entry is the floor: a ledger with one entry cannot undo.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.cursor.is_some_and(|c| c >= 1)
    }

    /// Whether there is a later entry to step forward to.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.cursor.is_some_and(|c| c + 1 < self.entries.len())
    }

    /// Append a record after the cursor, discarding any redo tail.
    ///
    /// Returns the number of discarded entries.
    pub fn push(&mut self, record: OperationRecord) -> usize {
        let keep = self.cursor.map_or(0, |c| c + 1);
        let discarded = self.entries.len() - keep;
        self.entries.truncate(keep);
        self.entries.push(record);
        self.cursor = Some(self.entries.len() - 1);
        discarded
    }

    /// Move the cursor back one entry and return the new active entry.
    pub fn step_back(&mut self) -> Option<&OperationRecord> {
        if !self.can_undo() {
            return None;
        }
        self.cursor = self.cursor.map(|c| c - 1);
        self.current()
    }

    /// Move the cursor forward one entry and return the new active entry.
    pub fn step_forward(&mut self) -> Option<&OperationRecord> {
        if !self.can_redo() {
            return None;
        }
        self.cursor = self.cursor.map(|c| c + 1);
        self.current()
    }

    /// Put the cursor back where it was before a failed replay.
    ///
    /// Out-of-range positions are ignored.
    pub(crate) fn restore_cursor(&mut self, cursor: Option<usize>) {
        if let Some(c) = cursor
            && c < self.entries.len()
        {
            self.cursor = Some(c);
        }
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }
}
