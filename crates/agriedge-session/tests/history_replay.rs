//! Integration test: drive a workbench end to end against PNG files on
//! disk and check the undo/redo and dispatch guarantees.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::{Path, PathBuf};

use agriedge_ops::{OperationId, Threshold};
use agriedge_session::{ImageSlot, Stage, Workbench, WorkbenchConfig, WorkbenchError};
use image::{DynamicImage, Rgb, RgbImage};
use proptest::prelude::*;
use tempfile::TempDir;

/// A small field scene: a green plant on brown soil with a soft gradient
/// so that different thresholds produce different edge maps.
fn write_scene(dir: &TempDir, name: &str, shift: u32) -> PathBuf {
    let path = dir.path().join(name);
    RgbImage::from_fn(24, 24, |x, y| {
        let plant = (6 + shift..18).contains(&x) && (5..19).contains(&y);
        let ramp = u8::try_from(x * 4 + y * 2).unwrap();
        if plant {
            Rgb([30, 170u8.saturating_add(ramp / 4), 50])
        } else {
            Rgb([110u8.saturating_add(ramp / 2), 70, 35])
        }
    })
    .save(&path)
    .unwrap();
    path
}

/// Run one operation directly on the file, outside any workbench.
fn replay(path: &Path, operation: OperationId, threshold: Option<u8>) -> DynamicImage {
    let bytes = std::fs::read(path).unwrap();
    agriedge_ops::process(&bytes, operation, threshold.map(Threshold::new)).unwrap()
}

fn displayed(bench: &Workbench) -> DynamicImage {
    bench.output().expect("a result should be displayed").image.clone()
}

#[test]
fn grayscale_then_two_sobel_thresholds_undo_redo() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_scene(&dir, "a.png", 0);
    let mut bench = Workbench::default();
    bench.load(&a).unwrap();

    bench.apply_blocking(OperationId::Grayscale, None).unwrap();
    bench
        .apply_blocking(OperationId::Sobel, Some(Threshold::new(100)))
        .unwrap();
    bench
        .apply_blocking(OperationId::Sobel, Some(Threshold::new(150)))
        .unwrap();
    assert_eq!(bench.history().len(), 3);

    let undone = bench.undo().unwrap();
    assert_eq!(undone.operation, OperationId::Sobel);
    assert_eq!(undone.parameter, Some(Threshold::new(100)));
    assert_eq!(displayed(&bench), replay(&a, OperationId::Sobel, Some(100)));

    bench.redo().unwrap();
    assert_eq!(displayed(&bench), replay(&a, OperationId::Sobel, Some(150)));
    assert!(matches!(bench.redo(), Err(WorkbenchError::NothingToRedo)));
}

#[test]
fn non_parametric_operation_applies_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut bench = Workbench::default();
    bench.load(write_scene(&dir, "a.png", 0)).unwrap();

    bench.apply_blocking(OperationId::Grayscale, None).unwrap();
    let err = bench.apply_blocking(OperationId::Grayscale, None).unwrap_err();
    assert!(matches!(
        err,
        WorkbenchError::AlreadyApplied(OperationId::Grayscale)
    ));
    assert_eq!(bench.history().len(), 1);
}

#[test]
fn every_non_parametric_operation_is_deduplicated() {
    let dir = tempfile::tempdir().unwrap();
    let mut bench = Workbench::default();
    bench.load(write_scene(&dir, "a.png", 0)).unwrap();

    let once = [
        OperationId::Grayscale,
        OperationId::Hsv,
        OperationId::MultiOtsu,
        OperationId::ChanVese,
        OperationId::MorphSnake,
    ];
    for op in once {
        bench.apply_blocking(op, None).unwrap();
    }
    for op in once {
        assert!(matches!(
            bench.apply(op, None),
            Err(WorkbenchError::AlreadyApplied(id)) if id == op
        ));
    }
    assert_eq!(bench.history().len(), once.len());
}

#[test]
fn edge_detectors_can_be_reapplied() {
    let dir = tempfile::tempdir().unwrap();
    let mut bench = Workbench::default();
    bench.load(write_scene(&dir, "a.png", 0)).unwrap();

    for _ in 0..3 {
        bench
            .apply_blocking(OperationId::Roberts, Some(Threshold::new(20)))
            .unwrap();
    }
    assert_eq!(bench.history().len(), 3);
}

#[test]
fn apply_after_undo_truncates_redo_tail() {
    let dir = tempfile::tempdir().unwrap();
    let mut bench = Workbench::default();
    bench.load(write_scene(&dir, "a.png", 0)).unwrap();

    bench.apply_blocking(OperationId::Hsv, None).unwrap();
    bench
        .apply_blocking(OperationId::Prewitt, Some(Threshold::new(40)))
        .unwrap();
    bench
        .apply_blocking(OperationId::Prewitt, Some(Threshold::new(80)))
        .unwrap();
    bench.undo().unwrap();
    bench.undo().unwrap();
    assert!(bench.can_redo());

    bench
        .apply_blocking(OperationId::Scharr, Some(Threshold::new(60)))
        .unwrap();
    assert_eq!(bench.history().len(), 2);
    assert_eq!(
        bench.history().entries()[1].operation_id,
        OperationId::Scharr
    );
    assert!(!bench.can_redo());
    assert!(matches!(bench.redo(), Err(WorkbenchError::NothingToRedo)));
}

#[test]
fn undo_after_load_reports_nothing_to_undo() {
    let dir = tempfile::tempdir().unwrap();
    let mut bench = Workbench::default();
    bench.load(write_scene(&dir, "a.png", 0)).unwrap();
    assert!(matches!(bench.undo(), Err(WorkbenchError::NothingToUndo)));

    bench.apply_blocking(OperationId::Grayscale, None).unwrap();
    assert!(matches!(bench.undo(), Err(WorkbenchError::NothingToUndo)));
}

#[test]
fn loading_resets_session_and_history() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_scene(&dir, "a.png", 0);
    let b = write_scene(&dir, "b.png", 3);
    let mut bench = Workbench::default();
    bench.load(&a).unwrap();
    bench.apply_blocking(OperationId::Grayscale, None).unwrap();
    bench
        .apply_blocking(OperationId::Sobel, Some(Threshold::new(90)))
        .unwrap();

    bench.load(&b).unwrap();
    assert_eq!(bench.state().loaded_image(), Some(b.as_path()));
    assert!(bench.state().applied_nonparametric().is_empty());
    assert_eq!(bench.state().last_parametric_operation(), None);
    assert!(bench.history().is_empty());
    assert_eq!(bench.history().cursor(), None);
    assert_eq!(bench.stage(), Stage::ImageLoaded);

    // Grayscale is available again on the new image.
    bench.apply_blocking(OperationId::Grayscale, None).unwrap();
}

#[test]
fn failed_load_keeps_previous_session() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_scene(&dir, "a.png", 0);
    let mut bench = Workbench::default();
    bench.load(&a).unwrap();
    bench.apply_blocking(OperationId::Hsv, None).unwrap();

    let err = bench.load(dir.path().join("missing.png")).unwrap_err();
    assert!(matches!(err, WorkbenchError::Decode { .. }));
    assert_eq!(bench.state().loaded_image(), Some(a.as_path()));
    assert_eq!(bench.history().len(), 1);
    assert_eq!(bench.stage(), Stage::Processed);
}

#[test]
fn threshold_change_replays_last_edge_detector() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_scene(&dir, "a.png", 0);
    let mut bench = Workbench::default();
    bench.load(&a).unwrap();
    bench
        .apply_blocking(OperationId::Scharr, Some(Threshold::new(100)))
        .unwrap();
    bench.apply_blocking(OperationId::Grayscale, None).unwrap();

    let pending = bench
        .set_threshold(Some(Threshold::new(30)))
        .unwrap()
        .expect("scharr should be re-applied");
    assert_eq!(pending.record().operation_id, OperationId::Scharr);
    let done = bench.complete(pending.wait(|_| {})).unwrap().unwrap();
    assert_eq!(done.parameter, Some(Threshold::new(30)));
    assert_eq!(bench.history().len(), 3);
    assert_eq!(displayed(&bench), replay(&a, OperationId::Scharr, Some(30)));
}

#[test]
fn operation_log_is_kept_per_file_across_loads() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_scene(&dir, "a.png", 0);
    let b = write_scene(&dir, "b.png", 2);
    let mut bench = Workbench::default();

    bench.load(&a).unwrap();
    bench.apply_blocking(OperationId::Hsv, None).unwrap();
    bench
        .apply_blocking(OperationId::Sobel, Some(Threshold::new(10)))
        .unwrap();
    bench
        .apply_blocking(OperationId::Sobel, Some(Threshold::new(20)))
        .unwrap();
    bench.load(&b).unwrap();
    bench.apply_blocking(OperationId::MultiOtsu, None).unwrap();

    assert_eq!(
        bench.operations_for("a.png"),
        &[OperationId::Hsv, OperationId::Sobel]
    );
    assert_eq!(bench.operations_for("b.png"), &[OperationId::MultiOtsu]);
    assert!(bench.operations_for("c.png").is_empty());
}

#[test]
fn save_export_and_save_on_exit() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_scene(&dir, "a.png", 0);
    let config = WorkbenchConfig {
        default_save_path: dir.path().join("quick.png"),
        exit_save_path: dir.path().join("exit.png"),
        ..WorkbenchConfig::default()
    };
    let mut bench = Workbench::new(config);
    assert_eq!(bench.save_on_exit().unwrap(), None);

    bench.load(&a).unwrap();
    bench.apply_blocking(OperationId::MultiOtsu, None).unwrap();

    let quick = bench.save(None).unwrap();
    assert_eq!(quick, dir.path().join("quick.png"));
    let saved = image::open(&quick).unwrap();
    assert_eq!(saved.to_luma8(), displayed(&bench).to_luma8());

    let custom = dir.path().join("custom.bmp");
    assert_eq!(bench.save(Some(custom.as_path())).unwrap(), custom);
    assert!(custom.exists());

    let message = bench
        .export(ImageSlot::Source, &dir.path().join("src.png"), "Export Source")
        .unwrap();
    assert_eq!(message, "Export Source complete");
    let exported = image::open(dir.path().join("src.png")).unwrap();
    assert_eq!(exported.to_rgb8(), image::open(&a).unwrap().to_rgb8());

    assert_eq!(
        bench.save_on_exit().unwrap(),
        Some(dir.path().join("exit.png"))
    );
    assert!(dir.path().join("exit.png").exists());
}

#[test]
fn write_failure_is_an_alert_and_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut bench = Workbench::default();
    bench.load(write_scene(&dir, "a.png", 0)).unwrap();
    bench.apply_blocking(OperationId::Grayscale, None).unwrap();

    let err = bench
        .save(Some(dir.path().join("no-such-dir").join("out.png").as_path()))
        .unwrap_err();
    assert!(matches!(err, WorkbenchError::Write { .. }));
    assert_eq!(err.severity(), agriedge_session::Severity::Alert);
    assert_eq!(bench.stage(), Stage::Processed);
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Edge(OperationId, u8),
    Once(OperationId),
}

fn step() -> impl Strategy<Value = Step> {
    let edge = prop::sample::select(vec![
        OperationId::Sobel,
        OperationId::Scharr,
        OperationId::Prewitt,
        OperationId::Roberts,
    ]);
    let once = prop::sample::select(vec![
        OperationId::Grayscale,
        OperationId::Hsv,
        OperationId::MultiOtsu,
    ]);
    prop_oneof![
        3 => (edge, any::<u8>()).prop_map(|(op, t)| Step::Edge(op, t)),
        1 => once.prop_map(Step::Once),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn undo_k_then_redo_k_restores_the_displayed_result(
        steps in prop::collection::vec(step(), 1..8),
        k in 0_usize..8,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let mut bench = Workbench::default();
        bench.load(write_scene(&dir, "a.png", 1)).unwrap();

        for s in steps {
            let result = match s {
                Step::Edge(op, t) => bench.apply_blocking(op, Some(Threshold::new(t))).map(|_| ()),
                Step::Once(op) => bench.apply_blocking(op, None).map(|_| ()),
            };
            prop_assert!(matches!(result, Ok(()) | Err(WorkbenchError::AlreadyApplied(_))));
        }

        let before = displayed(&bench);
        let cursor = bench.history().cursor();
        let k = k.min(cursor.unwrap_or(0));
        for _ in 0..k {
            prop_assert!(bench.undo().is_ok());
        }
        for _ in 0..k {
            prop_assert!(bench.redo().is_ok());
        }
        prop_assert_eq!(bench.history().cursor(), cursor);
        prop_assert_eq!(displayed(&bench), before);
    }
}
