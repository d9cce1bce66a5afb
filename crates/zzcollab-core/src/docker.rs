//! `docker` CLI implementation of the engine and registry collaborators.

use crate::builder::{BuildRequest, ContainerEngine};
use crate::error::{EngineError, EngineStage, ProbeError, Result, ZzError};
use crate::image::ImageRef;
use crate::process::{self, Completion, StdoutSink};
use crate::registry::{classify_manifest_failure, Presence, RegistryProbe};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
    probe_timeout: Duration,
    /// `None` lets builds and pushes run until docker finishes.
    build_timeout: Option<Duration>,
    stdout: StdoutSink,
}

impl DockerCli {
    pub fn new(
        program: impl Into<String>,
        probe_timeout: Duration,
        build_timeout: Option<Duration>,
    ) -> Self {
        Self {
            program: program.into(),
            probe_timeout,
            build_timeout,
            stdout: StdoutSink::Inherit,
        }
    }

    /// Like [`DockerCli::new`], but fails early if `program` cannot be found.
    pub fn detect(
        program: &str,
        probe_timeout: Duration,
        build_timeout: Option<Duration>,
    ) -> Result<Self> {
        let resolved =
            which::which(program).map_err(|_| ZzError::EngineNotFound(program.to_string()))?;
        debug!(docker = %resolved.display(), "using container engine");
        Ok(Self::new(
            resolved.to_string_lossy().into_owned(),
            probe_timeout,
            build_timeout,
        ))
    }

    /// Where build, push and pull progress output goes.
    pub fn with_stdout(mut self, sink: StdoutSink) -> Self {
        self.stdout = sink;
        self
    }

    fn run(&self, stage: EngineStage, args: Vec<String>) -> std::result::Result<(), EngineError> {
        let completion =
            process::run_streaming(&self.program, &args, None, self.build_timeout, self.stdout)
                .map_err(|e| {
                    EngineError::new(stage, format!("failed to run '{}': {e}", self.program))
                })?;
        if completion.success() {
            Ok(())
        } else {
            Err(EngineError::new(
                stage,
                format!("docker {} {}", args[0], completion.describe()),
            ))
        }
    }
}

pub fn build_args(request: &BuildRequest) -> Vec<String> {
    let mut args = vec![
        "build".to_string(),
        "-f".to_string(),
        request.dockerfile.to_string_lossy().into_owned(),
        "-t".to_string(),
        request.image.to_string(),
    ];
    if let Some(platform) = &request.platform {
        args.push("--platform".to_string());
        args.push(platform.clone());
    }
    for (key, value) in &request.build_args {
        args.push("--build-arg".to_string());
        args.push(format!("{key}={value}"));
    }
    args.push(request.context.to_string_lossy().into_owned());
    args
}

impl ContainerEngine for DockerCli {
    fn build(&self, request: &BuildRequest) -> std::result::Result<(), EngineError> {
        self.run(EngineStage::Build, build_args(request))
    }

    fn tag(&self, source: &ImageRef, target: &ImageRef) -> std::result::Result<(), EngineError> {
        self.run(
            EngineStage::Tag,
            vec!["tag".to_string(), source.to_string(), target.to_string()],
        )
    }

    fn push(&self, image: &ImageRef) -> std::result::Result<(), EngineError> {
        self.run(EngineStage::Push, vec!["push".to_string(), image.to_string()])
    }

    fn pull(&self, image: &ImageRef) -> std::result::Result<(), EngineError> {
        self.run(EngineStage::Pull, vec!["pull".to_string(), image.to_string()])
    }
}

impl RegistryProbe for DockerCli {
    fn probe(&self, image: &ImageRef) -> std::result::Result<Presence, ProbeError> {
        let reference = image.to_string();
        let args = vec!["manifest".to_string(), "inspect".to_string(), reference.clone()];
        let captured = process::run_captured(&self.program, &args, None, Some(self.probe_timeout))
            .map_err(|e| ProbeError::Unavailable {
                reference: reference.clone(),
                detail: format!("failed to run '{}': {e}", self.program),
            })?;

        let presence = match captured.completion {
            Completion::Exited { success: true, .. } => Ok(Presence::Exists),
            Completion::TimedOut(d) => Err(ProbeError::Timeout {
                reference,
                seconds: d.as_secs(),
            }),
            Completion::Exited { .. } => classify_manifest_failure(image, &captured.combined()),
        };
        debug!(image = %image, result = ?presence, "probed registry");
        presence
    }
}
