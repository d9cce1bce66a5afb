pub mod check_updates;
pub mod config;
pub mod join;
pub mod team;
pub mod variants;

use anyhow::Context as _;
use clap::Args;
use std::path::PathBuf;
use zzcollab_core::config::Config;
use zzcollab_core::docker::DockerCli;
use zzcollab_core::image::TeamCoordinates;
use zzcollab_core::process::StdoutSink;

/// Global state shared by every command.
pub struct Context {
    pub root: PathBuf,
    pub json: bool,
    /// `--docker` / `ZZCOLLAB_DOCKER`, wins over `engine.docker`.
    pub docker: Option<String>,
}

impl Context {
    pub fn config(&self) -> anyhow::Result<Config> {
        Config::load(&self.root).context("failed to load configuration")
    }

    pub fn docker(&self, config: &Config) -> anyhow::Result<DockerCli> {
        let program = self.docker.as_deref().unwrap_or(&config.engine.docker);
        let docker = DockerCli::detect(program, config.probe.timeout(), config.build.timeout())?;
        // Keep stdout clean for the JSON document.
        let sink = if self.json {
            StdoutSink::Stderr
        } else {
            StdoutSink::Inherit
        };
        Ok(docker.with_stdout(sink))
    }
}

/// Team coordinates; each falls back to the project/user config.
#[derive(Args, Debug, Clone)]
pub struct TeamArgs {
    /// Team (Docker Hub account or organization)
    #[arg(long)]
    pub team: Option<String>,

    /// Project name
    #[arg(long)]
    pub project: Option<String>,

    /// Image tag (default: build.tag, usually "latest")
    #[arg(long)]
    pub tag: Option<String>,

    /// Registry host to publish to and probe (default: build.registry)
    #[arg(long)]
    pub registry: Option<String>,
}

impl TeamArgs {
    pub fn resolve(&self, config: &Config) -> anyhow::Result<TeamCoordinates> {
        let team = self
            .team
            .as_deref()
            .or(config.team.name.as_deref())
            .context("--team is required (or set team.name in zzcollab.yaml)")?;
        let project = self
            .project
            .as_deref()
            .or(config.team.project.as_deref())
            .context("--project is required (or set team.project in zzcollab.yaml)")?;
        let tag = self.tag.as_deref().unwrap_or(&config.build.tag);
        let registry = self.registry.as_deref().or(config.build.registry.as_deref());
        let coords = TeamCoordinates::new(team, project, Some(tag))?.with_registry(registry)?;
        Ok(coords)
    }
}
