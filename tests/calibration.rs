//! Loop calibration and repeat-count planning tests.

mod common;

use common::{FakeProber, FakeRunner, args_of, fake_looper};
use loopsync::{LOOP_CONTAINER, LoopPlan, LoopSyncError, optimal_repeat_count};

// ── optimal_repeat_count ───────────────────────────────────────────

#[test]
fn baseline_is_ceiling_without_detection() {
    assert_eq!(optimal_repeat_count(20.0, 6.02, false), 4);
    assert_eq!(optimal_repeat_count(24.0, 10.0, false), 3);
    assert_eq!(optimal_repeat_count(30.0, 10.0, false), 3);
}

#[test]
fn detection_prefers_closer_lower_count() {
    // 3 × 6.02 = 18.06 is 1.94 s away; 4 × 6.02 = 24.08 is 4.08 s away.
    assert_eq!(optimal_repeat_count(20.0, 6.02, true), 3);
    assert_eq!(optimal_repeat_count(24.0, 10.0, true), 2);
}

#[test]
fn detection_keeps_baseline_on_tie() {
    // 2 × 10 and 3 × 10 are both 5 s from 25.
    assert_eq!(optimal_repeat_count(25.0, 10.0, true), 3);
}

#[test]
fn exact_multiple_is_kept() {
    assert_eq!(optimal_repeat_count(30.0, 10.0, true), 3);
    assert_eq!(optimal_repeat_count(30.0, 10.0, false), 3);
}

#[test]
fn loop_longer_than_target_uses_one_copy() {
    assert_eq!(optimal_repeat_count(3.0, 10.0, true), 1);
    assert_eq!(optimal_repeat_count(3.0, 10.0, false), 1);
}

#[test]
fn degenerate_unit_yields_one() {
    assert_eq!(optimal_repeat_count(20.0, 0.0, true), 1);
    assert_eq!(optimal_repeat_count(20.0, -1.0, true), 1);
    assert_eq!(optimal_repeat_count(20.0, f64::NAN, false), 1);
}

#[test]
fn result_is_within_three_of_baseline() {
    for (target, unit) in [(100.0, 0.7), (59.9, 2.5), (7.0, 6.99), (1000.0, 3.3)] {
        let baseline = optimal_repeat_count(target, unit, false);
        let chosen = optimal_repeat_count(target, unit, true);
        assert!(chosen >= 1);
        assert!(chosen.abs_diff(baseline) <= 3, "{target}/{unit}: {chosen} vs {baseline}");
        let chosen_error = (target - f64::from(chosen) * unit).abs();
        let baseline_error = (target - f64::from(baseline) * unit).abs();
        assert!(chosen_error <= baseline_error);
    }
}

// ── LoopPlan ───────────────────────────────────────────────────────

#[test]
fn plan_reports_expected_duration() {
    let plan = LoopPlan::new(20.0, 6.02, true).unwrap();
    assert_eq!(plan.repeat_count(), 3);
    assert!((plan.expected_duration() - 18.06).abs() < 1e-9);
}

#[test]
fn plan_rejects_non_positive_durations() {
    assert!(matches!(
        LoopPlan::new(0.0, 5.0, true),
        Err(LoopSyncError::InvalidDuration { what: "target", .. })
    ));
    assert!(matches!(
        LoopPlan::new(20.0, 0.0, true),
        Err(LoopSyncError::InvalidDuration { .. })
    ));
    assert!(LoopPlan::new(f64::INFINITY, 5.0, true).is_err());
}

// ── calibration ────────────────────────────────────────────────────

#[test]
fn calibration_halves_two_copy_measurement() {
    let work_dir = tempfile::tempdir().unwrap();
    let (looper, runner) = fake_looper(
        FakeRunner::new(),
        FakeProber::new([("clip.mp4", 6.0), ("calibration.mp4", 12.04)]),
    );

    let unit = looper.calibrate("clip.mp4".as_ref(), work_dir.path());

    assert!((unit - 6.02).abs() < 1e-9);
    assert_eq!(runner.outputs(), vec!["calibration.mp4"]);

    let playlist =
        std::fs::read_to_string(work_dir.path().join("calibration.concat.txt")).unwrap();
    assert_eq!(playlist.lines().count(), 2);

    let args = args_of(&runner.commands()[0]);
    assert!(args.windows(2).any(|pair| pair == ["-fflags", "+genpts"]));
    assert!(args.windows(2).any(|pair| pair == ["-vsync", "cfr"]));
}

#[test]
fn calibration_uses_loop_container_not_clip_extension() {
    let work_dir = tempfile::tempdir().unwrap();
    let (looper, runner) = fake_looper(
        FakeRunner::new(),
        FakeProber::new([("clip.mov", 4.0), ("calibration.mp4", 8.0)]),
    );

    assert_eq!(looper.calibrate("clip.mov".as_ref(), work_dir.path()), 4.0);
    assert_eq!(runner.outputs(), vec![format!("calibration.{LOOP_CONTAINER}")]);
}

#[test]
fn calibration_is_deterministic() {
    let work_dir = tempfile::tempdir().unwrap();
    let (looper, runner) = fake_looper(
        FakeRunner::new(),
        FakeProber::new([("clip.mp4", 6.0), ("calibration.mp4", 12.04)]),
    );
    let playlist_path = work_dir.path().join("calibration.concat.txt");

    let first = looper.calibrate("clip.mp4".as_ref(), work_dir.path());
    let first_playlist = std::fs::read_to_string(&playlist_path).unwrap();
    let second = looper.calibrate("clip.mp4".as_ref(), work_dir.path());
    let second_playlist = std::fs::read_to_string(&playlist_path).unwrap();

    assert_eq!(first, second);
    assert_eq!(first_playlist, second_playlist);

    let commands = runner.commands();
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[0], commands[1]);
}

#[test]
fn calibration_falls_back_when_build_fails() {
    let work_dir = tempfile::tempdir().unwrap();
    let (looper, _runner) = fake_looper(
        FakeRunner::new().failing_output("calibration.mp4"),
        FakeProber::new([("clip.mp4", 6.0), ("calibration.mp4", 12.04)]),
    );

    assert_eq!(looper.calibrate("clip.mp4".as_ref(), work_dir.path()), 6.0);
}

#[test]
fn calibration_falls_back_when_loop_cannot_be_measured() {
    let work_dir = tempfile::tempdir().unwrap();
    let (looper, _runner) = fake_looper(FakeRunner::new(), FakeProber::new([("clip.mp4", 6.0)]));

    assert_eq!(looper.calibrate("clip.mp4".as_ref(), work_dir.path()), 6.0);
}

#[test]
fn plan_fails_when_nothing_can_be_measured() {
    let work_dir = tempfile::tempdir().unwrap();
    let (looper, _runner) = fake_looper(FakeRunner::new(), FakeProber::default());

    let result = looper.plan("clip.mp4".as_ref(), 20.0, true, work_dir.path());
    assert!(matches!(result, Err(LoopSyncError::ZeroDuration { .. })));
}

#[test]
fn plan_uses_calibrated_unit() {
    let work_dir = tempfile::tempdir().unwrap();
    let (looper, _runner) = fake_looper(
        FakeRunner::new(),
        FakeProber::new([("clip.mp4", 6.0), ("calibration.mp4", 12.04)]),
    );

    let plan = looper.plan("clip.mp4".as_ref(), 20.0, true, work_dir.path()).unwrap();
    assert_eq!(plan.repeat_count(), 3);

    let plan = looper.plan("clip.mp4".as_ref(), 20.0, false, work_dir.path()).unwrap();
    assert_eq!(plan.repeat_count(), 4);
}
