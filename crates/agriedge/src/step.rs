//! Scripted workbench actions, one per `--step` argument.

use std::path::PathBuf;
use std::str::FromStr;

use agriedge_ops::{OperationId, Threshold};
use agriedge_session::ImageSlot;

/// One user action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// `load=PATH`: open another image.
    Load(PathBuf),
    /// `OP` or `OP=N`: apply an operation. Edge detectors without `=N`
    /// use the current threshold control value.
    Apply {
        /// The operation.
        operation: OperationId,
        /// Explicit threshold, edge detectors only.
        threshold: Option<Threshold>,
    },
    /// `threshold=N` or `threshold=none`: move the threshold control.
    Threshold(Option<Threshold>),
    /// `undo`.
    Undo,
    /// `redo`.
    Redo,
    /// `clear-output`.
    ClearOutput,
    /// `clear-source`.
    ClearSource,
    /// `save` or `save=PATH`.
    Save(Option<PathBuf>),
    /// `export-source=PATH` or `export-output=PATH`.
    Export(ImageSlot, PathBuf),
}

impl Step {
    /// Title shown for exports, e.g. "Export Output".
    pub const fn export_title(slot: ImageSlot) -> &'static str {
        match slot {
            ImageSlot::Source => "Export Source",
            ImageSlot::Output => "Export Output",
        }
    }
}

fn parse_threshold(value: &str) -> Result<Threshold, String> {
    value
        .parse::<u8>()
        .map(Threshold::new)
        .map_err(|e| format!("invalid threshold {value:?}: {e} (expected 0-255)"))
}

fn require_path(key: &str, value: Option<&str>) -> Result<PathBuf, String> {
    match value {
        Some(v) if !v.is_empty() => Ok(PathBuf::from(v)),
        _ => Err(format!("{key} needs a path: {key}=PATH")),
    }
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = match s.split_once('=') {
            Some((k, v)) => (k, Some(v)),
            None => (s, None),
        };

        match (key, value) {
            ("undo", None) => Ok(Self::Undo),
            ("redo", None) => Ok(Self::Redo),
            ("clear-output", None) => Ok(Self::ClearOutput),
            ("clear-source", None) => Ok(Self::ClearSource),
            ("save", None) => Ok(Self::Save(None)),
            ("save", v) => require_path(key, v).map(|p| Self::Save(Some(p))),
            ("load", v) => require_path(key, v).map(Self::Load),
            ("export-source", v) => require_path(key, v).map(|p| Self::Export(ImageSlot::Source, p)),
            ("export-output", v) => require_path(key, v).map(|p| Self::Export(ImageSlot::Output, p)),
            ("threshold", Some("none")) => Ok(Self::Threshold(None)),
            ("threshold", Some(v)) => parse_threshold(v).map(|t| Self::Threshold(Some(t))),
            ("threshold", None) => Err("threshold needs a value: threshold=N".to_owned()),
            _ => {
                let operation = key.parse::<OperationId>().map_err(|e| e.to_string())?;
                let threshold = match value {
                    None => None,
                    Some(_) if !operation.is_parametric() => {
                        return Err(format!("{operation} does not take a threshold"));
                    }
                    Some(v) => Some(parse_threshold(v)?),
                };
                Ok(Self::Apply {
                    operation,
                    threshold,
                })
            }
        }
    }
}
