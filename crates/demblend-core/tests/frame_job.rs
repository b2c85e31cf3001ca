//! End-to-end frame job tests against the fake tool executor.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use demblend_core::fakes::{seed_batch_folder, FakeToolExecutor, RecordingReporter};
use demblend_core::layout::SURFACE_FILE;
use demblend_core::{
    CancelToken, FinalArtifacts, Frame, FrameEvent, FrameIndex, FrameJobFactory, FrameLocator,
    FrameStatus, GlobFrameLocator, GroundTruthCatalog, Resolution, RunPolicy, SchedulerConfig,
    TaskScheduler, ToolRunner,
};
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    process: PathBuf,
    lidar: PathBuf,
}

/// Frames 2489, 2490 and 2491 with one lidar file.
fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let process = dir.path().join("processed");
    for frame in 2489..=2491 {
        seed_batch_folder(&process, Frame(frame), 2);
    }
    let lidar = dir.path().join("ILATM1B_20111012_140000.csv");
    std::fs::write(&lidar, b"69.1,-49.6,120.0\n").unwrap();
    Fixture {
        _dir: dir,
        process,
        lidar,
    }
}

fn factory(
    process: &Path,
    fake: Arc<FakeToolExecutor>,
    redo: bool,
    reporter: Arc<RecordingReporter>,
) -> FrameJobFactory {
    let policy = RunPolicy {
        redo,
        suppress_output: true,
    };
    FrameJobFactory::new(
        Arc::new(GlobFrameLocator::new(process, 2)),
        ToolRunner::new(fake, policy),
        2,
        reporter,
    )
}

fn sorted_names(folder: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(folder)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_lowest_mean_candidate_is_committed() {
    let fx = fixture();
    let batch = fx.process.join("batch_2490_2491_2");
    let fake = Arc::new(
        FakeToolExecutor::new()
            .with_mean(&batch, 0, 1.2)
            .with_mean(&batch, 1, 0.9)
            .with_mean(&batch, 2, 0.95),
    );
    let reporter = Arc::new(RecordingReporter::new());
    let jobs = factory(&fx.process, fake.clone(), false, reporter.clone());

    let outcome = jobs.job(Frame(2490), fx.lidar.clone()).run().await;

    assert_eq!(outcome.status, FrameStatus::Committed { index: 1, mean: 0.9 });
    // three candidates, blend plus diff each
    assert_eq!(fake.call_count(), 6);

    // the committed blend is the self plus next-frame mosaic
    let finals = FinalArtifacts::for_batch(&batch);
    let blended = std::fs::read_to_string(&finals.blend).unwrap();
    assert_eq!(
        blended,
        format!(
            "{}\n{}",
            batch.join(SURFACE_FILE).display(),
            fx.process.join("batch_2491_2492_2").join(SURFACE_FILE).display()
        )
    );
    assert!(std::fs::read_to_string(&finals.diff)
        .unwrap()
        .contains("# Mean difference: 0.9"));

    let events = reporter.events_for(Frame(2490));
    assert!(events.contains(&FrameEvent::CandidateSkipped { index: 3, offset: 2 }));
    assert!(events.contains(&FrameEvent::CandidateSkipped {
        index: 4,
        offset: -2
    }));
    assert_eq!(
        events.last(),
        Some(&FrameEvent::Committed { index: 1, mean: 0.9 })
    );
}

#[tokio::test]
async fn test_only_surface_and_finals_remain() {
    let fx = fixture();
    let batch = fx.process.join("batch_2490_2491_2");
    let fake = Arc::new(FakeToolExecutor::new().with_mean(&batch, 2, 0.5));
    let jobs = factory(&fx.process, fake, false, Arc::new(RecordingReporter::new()));

    let outcome = jobs.job(Frame(2490), fx.lidar.clone()).run().await;
    assert!(outcome.is_committed());

    assert_eq!(
        sorted_names(&batch),
        vec![
            "out-align-DEM.tif".to_string(),
            "out-blend-DEM-diff.csv".to_string(),
            "out-blend-DEM.tif".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_rerun_is_a_no_op() {
    let fx = fixture();
    let first = Arc::new(FakeToolExecutor::new());
    let jobs = factory(&fx.process, first, false, Arc::new(RecordingReporter::new()));
    assert!(jobs.job(Frame(2490), fx.lidar.clone()).run().await.is_committed());

    let second = Arc::new(FakeToolExecutor::new());
    let reporter = Arc::new(RecordingReporter::new());
    let jobs = factory(&fx.process, second.clone(), false, reporter.clone());
    let outcome = jobs.job(Frame(2490), fx.lidar.clone()).run().await;

    assert_eq!(outcome.status, FrameStatus::AlreadyDone);
    assert_eq!(second.call_count(), 0);
    assert_eq!(
        reporter.events_for(Frame(2490)),
        vec![FrameEvent::AlreadyDone]
    );
}

#[tokio::test]
async fn test_redo_recomputes_committed_frame() {
    let fx = fixture();
    let batch = fx.process.join("batch_2490_2491_2");
    let jobs = factory(
        &fx.process,
        Arc::new(FakeToolExecutor::new().with_mean(&batch, 0, 0.1)),
        false,
        Arc::new(RecordingReporter::new()),
    );
    assert_eq!(
        jobs.job(Frame(2490), fx.lidar.clone()).run().await.status,
        FrameStatus::Committed { index: 0, mean: 0.1 }
    );

    let fake = Arc::new(FakeToolExecutor::new().with_mean(&batch, 2, 0.2));
    let jobs = factory(&fx.process, fake.clone(), true, Arc::new(RecordingReporter::new()));
    let outcome = jobs.job(Frame(2490), fx.lidar.clone()).run().await;

    assert_eq!(outcome.status, FrameStatus::Committed { index: 2, mean: 0.2 });
    assert_eq!(fake.call_count(), 6);
    assert!(std::fs::read_to_string(FinalArtifacts::for_batch(&batch).diff)
        .unwrap()
        .contains("# Mean difference: 0.2"));
}

#[tokio::test]
async fn test_lone_frame_commits_self_blend() {
    let dir = TempDir::new().unwrap();
    let batch = seed_batch_folder(dir.path(), Frame(100), 2);
    let lidar = dir.path().join("ILVIS2_20120315_140000.TXT");
    std::fs::write(&lidar, b"").unwrap();

    let fake = Arc::new(FakeToolExecutor::new().with_mean(&batch, 0, 2.5));
    let jobs = factory(dir.path(), fake.clone(), false, Arc::new(RecordingReporter::new()));
    let outcome = jobs.job(Frame(100), lidar).run().await;

    assert_eq!(outcome.status, FrameStatus::Committed { index: 0, mean: 2.5 });
    // LVIS column layout is picked from the extension
    let diff = &fake.calls()[1];
    assert_eq!(
        diff.arg_after("--csv-format"),
        Some("5:lat 4:lon 6:height_above_datum")
    );
}

#[tokio::test]
async fn test_tool_failure_fails_frame_without_finals() {
    let fx = fixture();
    let batch = fx.process.join("batch_2490_2491_2");
    let fake = Arc::new(FakeToolExecutor::new().failing_in(&batch));
    let reporter = Arc::new(RecordingReporter::new());
    let jobs = factory(&fx.process, fake, false, reporter.clone());

    let outcome = jobs.job(Frame(2490), fx.lidar.clone()).run().await;

    match &outcome.status {
        FrameStatus::Failed { reason } => assert!(reason.contains("forced failure")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(!FinalArtifacts::for_batch(&batch).exist());
    assert!(matches!(
        reporter.events_for(Frame(2490)).last(),
        Some(FrameEvent::Failed { .. })
    ));
}

#[tokio::test]
async fn test_missing_mean_fails_frame() {
    let fx = fixture();
    let fake = Arc::new(FakeToolExecutor::new().without_mean());
    let jobs = factory(&fx.process, fake, false, Arc::new(RecordingReporter::new()));

    let outcome = jobs.job(Frame(2490), fx.lidar.clone()).run().await;
    assert!(outcome.is_failed());
}

#[tokio::test]
async fn test_missing_surface_skips_frame() {
    let fx = fixture();
    let fake = Arc::new(FakeToolExecutor::new());
    let jobs = factory(&fx.process, fake.clone(), false, Arc::new(RecordingReporter::new()));

    let outcome = jobs.job(Frame(3000), fx.lidar.clone()).run().await;

    assert!(matches!(outcome.status, FrameStatus::Skipped { .. }));
    assert_eq!(fake.call_count(), 0);
}

#[tokio::test]
async fn test_ambiguous_batch_skips_frame() {
    let fx = fixture();
    let extra = fx.process.join("batch_2490_2492_2");
    std::fs::create_dir_all(&extra).unwrap();
    std::fs::write(extra.join(SURFACE_FILE), b"dem").unwrap();

    let fake = Arc::new(FakeToolExecutor::new());
    let reporter = Arc::new(RecordingReporter::new());
    let jobs = factory(&fx.process, fake.clone(), false, reporter.clone());
    let outcome = jobs.job(Frame(2490), fx.lidar.clone()).run().await;

    match &outcome.status {
        FrameStatus::Skipped { reason } => assert!(reason.contains("found 2 batch folders")),
        other => panic!("expected skip, got {other:?}"),
    }
    assert_eq!(fake.call_count(), 0);

    let events = reporter.events_for(Frame(2490));
    match events.first() {
        Some(FrameEvent::AmbiguousBatch { folders }) => {
            assert_eq!(
                folders,
                &vec![fx.process.join("batch_2490_2491_2"), extra.clone()]
            );
        }
        other => panic!("expected ambiguous batch event, got {other:?}"),
    }
    assert!(matches!(events.last(), Some(FrameEvent::Skipped { .. })));
}

#[tokio::test]
async fn test_missing_ground_truth_file_fails_frame() {
    let fx = fixture();
    let fake = Arc::new(FakeToolExecutor::new());
    let jobs = factory(&fx.process, fake.clone(), false, Arc::new(RecordingReporter::new()));

    let gone = fx.lidar.with_file_name("ILATM1B_20111012_000000.csv");
    let outcome = jobs.job(Frame(2490), gone).run().await;

    assert!(outcome.is_failed());
    assert_eq!(fake.call_count(), 0);
}

/// Delegates to a glob locator but panics when asked for one frame.
struct PanickingLocator {
    inner: GlobFrameLocator,
    panic_on: Frame,
}

impl FrameLocator for PanickingLocator {
    fn locate(&self, frame: Frame) -> Resolution {
        if frame == self.panic_on {
            panic!("locator blew up for frame {frame}");
        }
        self.inner.locate(frame)
    }
}

fn panicking_factory(process: &Path, panic_on: Frame) -> FrameJobFactory {
    let locator = PanickingLocator {
        inner: GlobFrameLocator::new(process, 2),
        panic_on,
    };
    FrameJobFactory::new(
        Arc::new(locator),
        ToolRunner::new(Arc::new(FakeToolExecutor::new()), RunPolicy::default()),
        2,
        Arc::new(RecordingReporter::new()),
    )
}

#[tokio::test]
async fn test_panic_inside_job_fails_frame() {
    let fx = fixture();
    let jobs = panicking_factory(&fx.process, Frame(2490));

    let outcome = jobs.job(Frame(2490), fx.lidar.clone()).run().await;

    match &outcome.status {
        FrameStatus::Failed { reason } => {
            assert!(reason.contains("job panicked"), "reason: {reason}");
            assert!(reason.contains("locator blew up for frame 2490"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_panicking_frame_does_not_stop_siblings() {
    let fx = fixture();
    // far from the other frames so no sibling looks it up as a neighbor
    seed_batch_folder(&fx.process, Frame(2500), 2);
    let index = FrameIndex::from_entries([2489, 2490, 2491, 2500].map(|f| {
        (
            Frame(f),
            PathBuf::from(format!("DMS_20111012_150000_0{f}.tif")),
        )
    }));
    let catalog = GroundTruthCatalog::from_files(vec![fx.lidar.clone()]);

    for workers in [1, 3] {
        let scheduler = TaskScheduler::new(
            SchedulerConfig {
                start_frame: Frame(2489),
                stop_frame: Frame(2501),
                num_processes: workers,
                poll_interval: Duration::from_millis(10),
            },
            panicking_factory(&fx.process, Frame(2500)),
        );

        let report = scheduler.run(&index, &catalog, &CancelToken::new()).await;

        assert!(
            matches!(report.get(Frame(2500)), Some(FrameStatus::Failed { reason }) if reason.contains("job panicked")),
            "workers = {workers}"
        );
        for frame in 2489..=2491 {
            assert!(
                matches!(
                    report.get(Frame(frame)),
                    Some(FrameStatus::Committed { .. }) | Some(FrameStatus::AlreadyDone)
                ),
                "frame {frame}, workers = {workers}"
            );
        }
    }
}
