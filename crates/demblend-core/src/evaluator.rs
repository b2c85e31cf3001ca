//! Blend and score one candidate.

use std::path::{Path, PathBuf};
use tracing::info;

use demblend_tools::command::{blend_output_path, diff_output_path};
use demblend_tools::{parse_diff_report, ErrorRecord, ToolCommand, ToolRunner};

use crate::candidates::Candidate;
use crate::error::Result;
use crate::layout::candidate_prefix;

/// Files produced for candidate `index` inside a batch folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateArtifacts {
    pub index: usize,
    pub prefix: PathBuf,
    pub blend: PathBuf,
    pub diff: PathBuf,
}

impl CandidateArtifacts {
    pub fn new(batch_folder: &Path, index: usize) -> Self {
        let prefix = candidate_prefix(batch_folder, index);
        Self {
            index,
            blend: blend_output_path(&prefix),
            diff: diff_output_path(&prefix),
            prefix,
        }
    }

    /// Glob matching the tools' log files for this candidate.
    pub fn log_pattern(&self) -> String {
        format!(
            "{}*-log-*",
            glob::Pattern::escape(&self.prefix.to_string_lossy())
        )
    }
}

/// A scored candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub candidate: Candidate,
    pub artifacts: CandidateArtifacts,
    pub record: ErrorRecord,
}

impl Evaluation {
    pub fn mean(&self) -> f64 {
        self.record.mean
    }
}

/// Runs the blend and diff tools for candidates of one frame.
pub struct BlendEvaluator {
    runner: ToolRunner,
    batch_folder: PathBuf,
    ground_truth: PathBuf,
    csv_format: String,
    threads: usize,
}

impl BlendEvaluator {
    pub fn new(
        runner: ToolRunner,
        batch_folder: PathBuf,
        ground_truth: PathBuf,
        csv_format: String,
        threads: usize,
    ) -> Self {
        Self {
            runner,
            batch_folder,
            ground_truth,
            csv_format,
            threads,
        }
    }

    /// Artifacts [`evaluate`](Self::evaluate) writes for candidate `index`.
    pub fn artifacts(&self, index: usize) -> CandidateArtifacts {
        CandidateArtifacts::new(&self.batch_folder, index)
    }

    /// Blend the candidate's surfaces, diff the blend against ground truth,
    /// and read back the error record.
    ///
    /// Existing outputs are reused unless the runner's policy says redo.
    pub async fn evaluate(&self, candidate: Candidate) -> Result<Evaluation> {
        let artifacts = self.artifacts(candidate.index);

        let blend = ToolCommand::dem_mosaic(&candidate.surfaces(), self.threads, &artifacts.prefix);
        self.runner.run(&blend).await?;

        let diff = ToolCommand::geodiff(
            &artifacts.blend,
            &self.ground_truth,
            &self.csv_format,
            &artifacts.prefix,
        );
        self.runner.run(&diff).await?;

        let record = parse_diff_report(&artifacts.diff)?;
        info!(
            index = candidate.index,
            mean = record.mean,
            "current mean error to lidar"
        );

        Ok(Evaluation {
            candidate,
            artifacts,
            record,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::CandidateBuilder;
    use crate::error::BlendError;
    use crate::fakes::{seed_batch_folder, FakeToolExecutor};
    use crate::frame::Frame;
    use crate::locator::GlobFrameLocator;
    use demblend_tools::RunPolicy;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_artifact_names() {
        let artifacts = CandidateArtifacts::new(Path::new("/p/batch_1_2_2"), 2);
        assert_eq!(artifacts.blend, PathBuf::from("/p/batch_1_2_2/out-blend-2-tile-0.tif"));
        assert_eq!(artifacts.diff, PathBuf::from("/p/batch_1_2_2/out-blend-2-diff.csv"));
        assert_eq!(artifacts.log_pattern(), "/p/batch_1_2_2/out-blend-2*-log-*");
    }

    #[tokio::test]
    async fn test_evaluate_runs_blend_then_diff() {
        let dir = TempDir::new().unwrap();
        let batch = seed_batch_folder(dir.path(), Frame(10), 2);
        seed_batch_folder(dir.path(), Frame(11), 2);
        let locator = GlobFrameLocator::new(dir.path(), 2);
        let candidate = CandidateBuilder::new(&locator, Frame(10)).nth(1).unwrap();

        let fake = Arc::new(FakeToolExecutor::new().with_mean(&batch, 1, 0.42));
        let runner = ToolRunner::new(fake.clone(), RunPolicy::default());
        let lidar = dir.path().join("lidar.csv");
        let evaluator = BlendEvaluator::new(runner, batch.clone(), lidar, "1:lat".to_string(), 4);

        let evaluation = evaluator.evaluate(candidate).await.expect("evaluate");

        assert_eq!(evaluation.mean(), 0.42);
        assert!(evaluation.artifacts.blend.exists());
        assert!(evaluation.artifacts.diff.exists());

        let calls = fake.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].program, "dem_mosaic");
        // target surface is the reference and comes first
        assert_eq!(calls[0].args[1], batch.join("out-align-DEM.tif").to_string_lossy());
        assert_eq!(calls[0].arg_after("--threads"), Some("4"));
        assert_eq!(calls[1].program, "geodiff");
    }

    #[tokio::test]
    async fn test_evaluate_reuses_existing_outputs() {
        let dir = TempDir::new().unwrap();
        let batch = seed_batch_folder(dir.path(), Frame(10), 2);
        let locator = GlobFrameLocator::new(dir.path(), 2);
        let candidate = CandidateBuilder::new(&locator, Frame(10)).next().unwrap();

        let artifacts = CandidateArtifacts::new(&batch, 0);
        std::fs::write(&artifacts.blend, b"blend").unwrap();
        std::fs::write(&artifacts.diff, "# Mean difference: 3.5\n").unwrap();

        let fake = Arc::new(FakeToolExecutor::new());
        let runner = ToolRunner::new(fake.clone(), RunPolicy::default());
        let evaluator = BlendEvaluator::new(runner, batch, dir.path().join("l.csv"), String::new(), 0);

        let evaluation = evaluator.evaluate(candidate).await.expect("evaluate");
        assert_eq!(evaluation.mean(), 3.5);
        assert_eq!(fake.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_mean_fails_candidate() {
        let dir = TempDir::new().unwrap();
        let batch = seed_batch_folder(dir.path(), Frame(10), 2);
        let locator = GlobFrameLocator::new(dir.path(), 2);
        let candidate = CandidateBuilder::new(&locator, Frame(10)).next().unwrap();

        let fake = Arc::new(FakeToolExecutor::new().without_mean());
        let runner = ToolRunner::new(fake, RunPolicy::default());
        let evaluator = BlendEvaluator::new(runner, batch, dir.path().join("l.csv"), String::new(), 0);

        let err = evaluator.evaluate(candidate).await.unwrap_err();
        assert!(matches!(err, BlendError::Report(_)));
    }
}
