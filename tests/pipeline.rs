//! End-to-end job tests with fake collaborators.

mod common;

use std::path::Path;
use std::sync::Arc;

use common::{FakeProber, FakeRunner, RecordingProgress, args_of, fake_looper};
use loopsync::{
    CancellationToken, JobOptions, JobStage, LOOP_CONTAINER, LoopSyncError, LoopSyncJob, MediaTags,
    MusicInfo, Stage, SyncBranch, SyncPolicy,
};

fn standard_prober() -> FakeProber {
    FakeProber::new([
        ("clip.mp4", 6.0),
        ("audio.mp3", 20.0),
        ("calibration.mp4", 12.04),
        ("looped.mp4", 18.06),
    ])
}

#[test]
fn job_loops_syncs_and_delivers() {
    let out_dir = tempfile::tempdir().unwrap();
    let destination = out_dir.path().join("nested").join("result.mp4");
    let (looper, runner) = fake_looper(FakeRunner::new(), standard_prober());

    let report = LoopSyncJob::new(looper, JobOptions::new())
        .run("clip.mp4".as_ref(), "audio.mp3".as_ref(), &destination)
        .unwrap();

    assert_eq!(report.plan.repeat_count(), 3);
    assert!((report.plan.unit_duration() - 6.02).abs() < 1e-9);
    assert_eq!(report.branch, SyncBranch::CapAtVideo(18.06));
    assert_eq!(report.clip_duration, 6.0);
    assert_eq!(report.audio_duration, 20.0);
    assert_eq!(report.output, destination);
    assert!(report.work_dir.is_none());
    assert!(destination.exists());

    assert_eq!(
        runner.outputs(),
        vec!["calibration.mp4", "looped.mp4", "synced.mp4"]
    );
}

#[test]
fn calibration_and_loop_share_a_container() {
    let out_dir = tempfile::tempdir().unwrap();
    let prober = FakeProber::new([
        ("clip.webm", 6.0),
        ("audio.mp3", 20.0),
        ("calibration.mp4", 12.04),
        ("looped.mp4", 18.06),
    ]);
    let (looper, runner) = fake_looper(FakeRunner::new(), prober);

    let report = LoopSyncJob::new(looper, JobOptions::new())
        .run(
            "clip.webm".as_ref(),
            "audio.mp3".as_ref(),
            &out_dir.path().join("result.mp4"),
        )
        .unwrap();
    assert_eq!(report.plan.repeat_count(), 3);

    let extensions: Vec<String> = runner.commands()[..2]
        .iter()
        .map(|command| {
            let artifact = command.artifact.as_deref().unwrap();
            artifact.extension().unwrap().to_string_lossy().into_owned()
        })
        .collect();
    assert_eq!(extensions, [LOOP_CONTAINER, LOOP_CONTAINER]);
}

#[test]
fn job_without_loop_detection_uses_ceiling() {
    let out_dir = tempfile::tempdir().unwrap();
    let prober = FakeProber::new([
        ("clip.mp4", 6.0),
        ("audio.mp3", 20.0),
        ("calibration.mp4", 12.04),
        ("looped.mp4", 24.08),
    ]);
    let (looper, runner) = fake_looper(FakeRunner::new(), prober);

    let options = JobOptions::new()
        .with_policy(SyncPolicy::TrimToShorter)
        .with_loop_detection(false);
    let report = LoopSyncJob::new(looper, options)
        .run(
            "clip.mp4".as_ref(),
            "audio.mp3".as_ref(),
            &out_dir.path().join("result.mp4"),
        )
        .unwrap();

    assert_eq!(report.plan.repeat_count(), 4);
    assert_eq!(report.branch, SyncBranch::CapAtAudio(20.0));

    let mux = &runner.commands()[2];
    assert!(mux.has_arg("-avoid_negative_ts"));
    assert!(!mux.has_arg("-movflags"));
}

#[test]
fn unmeasurable_audio_fails_before_any_command() {
    let out_dir = tempfile::tempdir().unwrap();
    let destination = out_dir.path().join("result.mp4");
    let (looper, runner) = fake_looper(FakeRunner::new(), FakeProber::new([("clip.mp4", 6.0)]));

    let result = LoopSyncJob::new(looper, JobOptions::new()).run(
        "clip.mp4".as_ref(),
        "audio.mp3".as_ref(),
        &destination,
    );

    assert!(matches!(result, Err(LoopSyncError::ZeroDuration { .. })));
    assert!(runner.commands().is_empty());
    assert!(!destination.exists());
}

#[test]
fn unmeasurable_clip_fails_before_any_command() {
    let out_dir = tempfile::tempdir().unwrap();
    let (looper, runner) = fake_looper(FakeRunner::new(), FakeProber::new([("audio.mp3", 20.0)]));

    let result = LoopSyncJob::new(looper, JobOptions::new()).run(
        "clip.mp4".as_ref(),
        "audio.mp3".as_ref(),
        &out_dir.path().join("result.mp4"),
    );

    match result {
        Err(LoopSyncError::ZeroDuration { path }) => assert_eq!(path, Path::new("clip.mp4")),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(runner.commands().is_empty());
}

#[test]
fn failed_loop_build_delivers_nothing() {
    let out_dir = tempfile::tempdir().unwrap();
    let destination = out_dir.path().join("result.mp4");
    let (looper, runner) = fake_looper(
        FakeRunner::new().failing_output("looped.mp4"),
        standard_prober(),
    );

    let result = LoopSyncJob::new(looper, JobOptions::new()).run(
        "clip.mp4".as_ref(),
        "audio.mp3".as_ref(),
        &destination,
    );

    assert!(matches!(
        result,
        Err(LoopSyncError::StageFailed {
            stage: Stage::LoopBuild,
            ..
        })
    ));
    assert_eq!(runner.outputs(), vec!["calibration.mp4", "looped.mp4"]);
    assert!(!destination.exists());
}

#[test]
fn cancelled_job_runs_nothing() {
    let out_dir = tempfile::tempdir().unwrap();
    let (looper, runner) = fake_looper(FakeRunner::new(), standard_prober());

    let token = CancellationToken::new();
    token.cancel();

    let result = LoopSyncJob::new(looper, JobOptions::new().with_cancellation(token)).run(
        "clip.mp4".as_ref(),
        "audio.mp3".as_ref(),
        &out_dir.path().join("result.mp4"),
    );

    assert!(matches!(result, Err(LoopSyncError::Cancelled)));
    assert!(runner.commands().is_empty());
}

#[test]
fn tags_add_metadata_stage() {
    let out_dir = tempfile::tempdir().unwrap();
    let (looper, runner) = fake_looper(FakeRunner::new(), standard_prober());

    let tags = MediaTags::new("Sunset")
        .with_tags(["beach", "waves"])
        .with_music(MusicInfo::new("Tide", "Shore", "The Gulls"));
    let options = JobOptions::new().with_tags(tags);

    LoopSyncJob::new(looper, options)
        .run(
            "clip.mp4".as_ref(),
            "audio.mp3".as_ref(),
            &out_dir.path().join("result.mp4"),
        )
        .unwrap();

    assert_eq!(
        runner.outputs(),
        vec!["calibration.mp4", "looped.mp4", "synced.mp4", "tagged.mp4"]
    );
    let args = args_of(&runner.commands()[3]);
    assert!(args.contains(&"comment=Tags: beach; waves".to_string()));
    assert!(args.contains(&"artist=The Gulls".to_string()));
}

#[test]
fn kept_work_directory_is_reported() {
    let out_dir = tempfile::tempdir().unwrap();
    let (looper, _runner) = fake_looper(FakeRunner::new(), standard_prober());

    let report = LoopSyncJob::new(looper, JobOptions::new().with_keep_temp(true))
        .run(
            "clip.mp4".as_ref(),
            "audio.mp3".as_ref(),
            &out_dir.path().join("result.mp4"),
        )
        .unwrap();

    let work_dir = report.work_dir.expect("work dir should be kept");
    assert!(work_dir.join("looped.concat.txt").exists());
    assert!(work_dir.join("synced.mp4").exists());
    std::fs::remove_dir_all(work_dir).unwrap();
}

#[test]
fn progress_reports_every_stage_in_order() {
    let out_dir = tempfile::tempdir().unwrap();
    let (looper, _runner) = fake_looper(FakeRunner::new(), standard_prober());
    let progress = Arc::new(RecordingProgress::default());

    LoopSyncJob::new(looper, JobOptions::new().with_progress(progress.clone()))
        .run(
            "clip.mp4".as_ref(),
            "audio.mp3".as_ref(),
            &out_dir.path().join("result.mp4"),
        )
        .unwrap();

    assert_eq!(
        progress.stages(),
        vec![
            JobStage::Probe,
            JobStage::Calibrate,
            JobStage::BuildLoop,
            JobStage::Reconcile,
            JobStage::Tag,
            JobStage::Deliver,
            JobStage::Deliver,
        ]
    );
}
