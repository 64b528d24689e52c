//! Workbench configuration.

use std::path::PathBuf;

use agriedge_ops::Threshold;
use serde::{Deserialize, Serialize};

/// Front-end defaults for the workbench.
///
/// Filter constants are fixed in `agriedge-ops` and deliberately absent
/// here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkbenchConfig {
    /// Initial threshold control value for edge detectors.
    ///
    /// `None` runs edge detectors without binarization.
    pub default_threshold: Option<Threshold>,

    /// Quick-save destination.
    pub default_save_path: PathBuf,

    /// Destination for the result when the session ends.
    pub exit_save_path: PathBuf,
}

impl WorkbenchConfig {
    /// Default quick-save file name.
    pub const DEFAULT_SAVE_PATH: &str = "output_saved.png";

    /// Default save-on-exit file name.
    pub const DEFAULT_EXIT_SAVE_PATH: &str = "output_saved_on_exit.png";
}

impl Default for WorkbenchConfig {
    fn default() -> Self {
        Self {
            default_threshold: Some(Threshold::DEFAULT),
            default_save_path: PathBuf::from(Self::DEFAULT_SAVE_PATH),
            exit_save_path: PathBuf::from(Self::DEFAULT_EXIT_SAVE_PATH),
        }
    }
}
