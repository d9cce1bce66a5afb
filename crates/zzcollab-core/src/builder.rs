//! Build-and-push execution for team image jobs.

use crate::error::EngineError;
use crate::image::ImageRef;
use crate::plan::BuildJob;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// ContainerEngine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub dockerfile: PathBuf,
    pub context: PathBuf,
    pub image: ImageRef,
    pub build_args: Vec<(String, String)>,
    /// `linux/<arch>` when the build must not use the host platform.
    pub platform: Option<String>,
}

/// Container build and publish collaborator.
pub trait ContainerEngine {
    fn build(&self, request: &BuildRequest) -> Result<(), EngineError>;
    fn tag(&self, source: &ImageRef, target: &ImageRef) -> Result<(), EngineError>;
    fn push(&self, image: &ImageRef) -> Result<(), EngineError>;
    fn pull(&self, image: &ImageRef) -> Result<(), EngineError>;
}

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub dockerfile: PathBuf,
    pub context: PathBuf,
    pub push: bool,
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum JobResult {
    /// Built locally, push not requested.
    Built,
    Pushed,
    BuildFailed { error: EngineError },
    /// The image exists locally but was not published.
    PushFailed { error: EngineError },
}

impl JobResult {
    pub fn status(&self) -> OutcomeStatus {
        match self {
            JobResult::Built | JobResult::Pushed => OutcomeStatus::Succeeded,
            JobResult::BuildFailed { .. } | JobResult::PushFailed { .. } => OutcomeStatus::Failed,
        }
    }

    pub fn error(&self) -> Option<&EngineError> {
        match self {
            JobResult::BuildFailed { error } | JobResult::PushFailed { error } => Some(error),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobResult::Built => "built",
            JobResult::Pushed => "pushed",
            JobResult::BuildFailed { .. } => "build failed",
            JobResult::PushFailed { .. } => "push failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutcome {
    pub job: BuildJob,
    pub status: OutcomeStatus,
    #[serde(flatten)]
    pub result: JobResult,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<BuildOutcome>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| o.status == OutcomeStatus::Succeeded)
    }

    pub fn failed(&self) -> impl Iterator<Item = &BuildOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Failed)
    }

    pub fn failed_variants(&self) -> Vec<&str> {
        self.failed().map(|o| o.job.variant.as_str()).collect()
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Build one job, then tag and push it if requested.
pub fn execute(engine: &dyn ContainerEngine, job: &BuildJob, opts: &BuildOptions) -> BuildOutcome {
    let start = Instant::now();
    info!(variant = %job.variant, image = %job.image, "building");
    let result = run_job(engine, job, opts);
    let duration_ms = start.elapsed().as_millis() as u64;

    match result.error() {
        Some(e) => warn!(variant = %job.variant, image = %job.image, error = %e, "job failed"),
        None => info!(variant = %job.variant, result = result.label(), duration_ms, "job finished"),
    }

    BuildOutcome {
        job: job.clone(),
        status: result.status(),
        result,
        duration_ms,
    }
}

fn run_job(engine: &dyn ContainerEngine, job: &BuildJob, opts: &BuildOptions) -> JobResult {
    let request = BuildRequest {
        dockerfile: opts.dockerfile.clone(),
        context: opts.context.clone(),
        image: job.image.clone(),
        build_args: job.build_args(),
        platform: job.platform.map(|a| a.platform()),
    };
    if let Err(error) = engine.build(&request) {
        return JobResult::BuildFailed { error };
    }
    if !opts.push {
        return JobResult::Built;
    }
    if job.published != job.image {
        if let Err(error) = engine.tag(&job.image, &job.published) {
            return JobResult::PushFailed { error };
        }
    }
    match engine.push(&job.published) {
        Ok(()) => JobResult::Pushed,
        Err(error) => JobResult::PushFailed { error },
    }
}

/// Execute every job in order. A failed job never stops the ones after it.
pub fn execute_batch(
    engine: &dyn ContainerEngine,
    jobs: &[BuildJob],
    opts: &BuildOptions,
) -> BatchReport {
    let started_at = Utc::now();
    let outcomes = jobs
        .iter()
        .fold(Vec::with_capacity(jobs.len()), |mut acc, job| {
            acc.push(execute(engine, job, opts));
            acc
        });
    BatchReport {
        started_at,
        finished_at: Utc::now(),
        outcomes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineStage;
    use crate::image::TeamCoordinates;
    use crate::plan::{resolve_build_plan, PlanRequest, VariantSelector};
    use crate::types::{Arch, BuildMode};
    use std::cell::RefCell;

    /// Records every call; fails builds whose base image matches `fail_base`
    /// and pushes whose reference matches `fail_push`.
    #[derive(Default)]
    struct FakeEngine {
        fail_base: Option<&'static str>,
        fail_push: Option<&'static str>,
        built: RefCell<Vec<String>>,
        tagged: RefCell<Vec<(String, String)>>,
        pushed: RefCell<Vec<String>>,
    }

    impl ContainerEngine for FakeEngine {
        fn build(&self, request: &BuildRequest) -> Result<(), EngineError> {
            let base = request
                .build_args
                .iter()
                .find(|(k, _)| k == "BASE_IMAGE")
                .map(|(_, v)| v.clone())
                .unwrap_or_default();
            if self.fail_base.is_some_and(|f| base.starts_with(f)) {
                return Err(EngineError::new(EngineStage::Build, "exited with status 1"));
            }
            self.built.borrow_mut().push(request.image.to_string());
            Ok(())
        }

        fn tag(&self, source: &ImageRef, target: &ImageRef) -> Result<(), EngineError> {
            self.tagged
                .borrow_mut()
                .push((source.to_string(), target.to_string()));
            Ok(())
        }

        fn push(&self, image: &ImageRef) -> Result<(), EngineError> {
            let r = image.to_string();
            if self.fail_push.is_some_and(|f| r.contains(f)) {
                return Err(EngineError::new(EngineStage::Push, "denied: requested access"));
            }
            self.pushed.borrow_mut().push(r);
            Ok(())
        }

        fn pull(&self, _image: &ImageRef) -> Result<(), EngineError> {
            Ok(())
        }
    }

    fn jobs(selector: &str, registry: Option<&str>) -> Vec<BuildJob> {
        let coords = TeamCoordinates::new("lab", "paper", None)
            .unwrap()
            .with_registry(registry)
            .unwrap();
        resolve_build_plan(&PlanRequest {
            selector: VariantSelector::parse(selector),
            mode: BuildMode::Standard,
            coords: &coords,
            base_tag: "latest".to_string(),
            arch: Arch::Amd64,
        })
        .unwrap()
    }

    fn opts(push: bool) -> BuildOptions {
        BuildOptions {
            dockerfile: PathBuf::from("Dockerfile"),
            context: PathBuf::from("."),
            push,
        }
    }

    #[test]
    fn failure_does_not_abort_batch() {
        let engine = FakeEngine {
            fail_base: Some("rocker/verse"),
            ..Default::default()
        };
        let report = execute_batch(&engine, &jobs("r-ver,verse", None), &opts(false));
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.outcomes[0].status, OutcomeStatus::Succeeded);
        assert_eq!(report.outcomes[1].status, OutcomeStatus::Failed);
        assert!(!report.is_success());
        assert_eq!(report.failed_variants(), vec!["verse"]);
        assert_eq!(*engine.built.borrow(), vec!["lab/papercore-r-ver:latest"]);
    }

    #[test]
    fn later_jobs_run_after_early_failure() {
        let engine = FakeEngine {
            fail_base: Some("rocker/r-ver"),
            ..Default::default()
        };
        let report = execute_batch(&engine, &jobs("r-ver,rstudio", None), &opts(false));
        assert_eq!(report.outcomes.len(), 2);
        assert!(matches!(report.outcomes[0].result, JobResult::BuildFailed { .. }));
        assert_eq!(report.outcomes[1].result, JobResult::Built);
        assert_eq!(*engine.built.borrow(), vec!["lab/papercore-rstudio:latest"]);
    }

    #[test]
    fn push_failure_is_distinct_from_build_failure() {
        let engine = FakeEngine {
            fail_push: Some("rstudio"),
            ..Default::default()
        };
        let report = execute_batch(&engine, &jobs("r-ver,rstudio", None), &opts(true));
        assert_eq!(report.outcomes[0].result, JobResult::Pushed);
        match &report.outcomes[1].result {
            JobResult::PushFailed { error } => assert_eq!(error.stage, EngineStage::Push),
            other => panic!("expected push failure, got {other:?}"),
        }
        // The image was still built locally.
        assert_eq!(engine.built.borrow().len(), 2);
    }

    #[test]
    fn push_to_registry_retags_first() {
        let engine = FakeEngine::default();
        let report = execute_batch(&engine, &jobs("r-ver", Some("ghcr.io")), &opts(true));
        assert!(report.is_success());
        assert_eq!(
            *engine.tagged.borrow(),
            vec![(
                "lab/papercore-r-ver:latest".to_string(),
                "ghcr.io/lab/papercore-r-ver:latest".to_string()
            )]
        );
        assert_eq!(*engine.pushed.borrow(), vec!["ghcr.io/lab/papercore-r-ver:latest"]);
    }

    #[test]
    fn no_push_without_request() {
        let engine = FakeEngine::default();
        let report = execute_batch(&engine, &jobs("all", None), &opts(false));
        assert!(report.is_success());
        assert!(engine.pushed.borrow().is_empty());
        assert!(report.outcomes.iter().all(|o| o.result == JobResult::Built));
    }

    #[test]
    fn rebuilding_same_job_is_not_an_error() {
        let engine = FakeEngine::default();
        let plan = jobs("r-ver", None);
        let first = execute_batch(&engine, &plan, &opts(false));
        let second = execute_batch(&engine, &plan, &opts(false));
        assert!(first.is_success() && second.is_success());
        assert_eq!(engine.built.borrow().len(), 2);
    }

    #[test]
    fn outcome_json_is_flat() {
        let engine = FakeEngine::default();
        let report = execute_batch(&engine, &jobs("r-ver", None), &opts(false));
        let json = serde_json::to_value(&report.outcomes[0]).unwrap();
        assert_eq!(json["status"], "succeeded");
        assert_eq!(json["result"], "built");
        assert_eq!(json["job"]["variant"], "r-ver");
    }
}
