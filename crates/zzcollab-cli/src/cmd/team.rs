use super::{Context, TeamArgs};
use crate::output::{print_json, print_table};
use anyhow::Context as _;
use clap::{Args, Subcommand};
use zzcollab_core::builder::{execute_batch, BatchReport, BuildOptions};
use zzcollab_core::config::{Config, TeamConfig};
use zzcollab_core::image::TeamCoordinates;
use zzcollab_core::plan::{resolve_build_plan, PlanRequest, VariantSelector};
use zzcollab_core::team::{team_args, TeamImageSet};
use zzcollab_core::types::{Arch, BuildMode};
use zzcollab_core::variant;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Args, Debug, Clone)]
pub struct BuildFlags {
    /// Package density: fast, standard, or comprehensive (default: build.mode)
    #[arg(long)]
    pub mode: Option<BuildMode>,

    /// Tag of the rocker base images, i.e. the R version (default: build.r_version)
    #[arg(long)]
    pub r_version: Option<String>,

    /// Push each image after it builds
    #[arg(long)]
    pub push: bool,

    /// Target architecture: amd64 or arm64 (default: build.arch, then the host)
    #[arg(long)]
    pub arch: Option<Arch>,
}

#[derive(Subcommand)]
pub enum TeamSubcommand {
    /// Build the team's initial images and record the team in zzcollab.yaml
    Init {
        #[command(flatten)]
        team: TeamArgs,
        /// "all" or a comma-separated list of variants (default: build.default_variants)
        #[arg(long)]
        variants: Option<String>,
        #[command(flatten)]
        build: BuildFlags,
    },

    /// Build (or rebuild) team images without touching zzcollab.yaml
    Build {
        #[command(flatten)]
        team: TeamArgs,
        /// "all" or a comma-separated list of variants (default: build.default_variants)
        #[arg(long)]
        variants: Option<String>,
        #[command(flatten)]
        build: BuildFlags,
    },

    /// Build variants the team has not published yet
    AddVariant {
        /// Variant ids (space- or comma-separated)
        #[arg(required = true)]
        variants: Vec<String>,
        /// Build even if the variant is already published
        #[arg(long)]
        rebuild: bool,
        #[command(flatten)]
        team: TeamArgs,
        #[command(flatten)]
        build: BuildFlags,
    },

    /// Show which variants the team has published
    Status {
        #[command(flatten)]
        team: TeamArgs,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(ctx: &Context, subcmd: TeamSubcommand) -> anyhow::Result<()> {
    let config = ctx.config()?;
    match subcmd {
        TeamSubcommand::Init {
            team,
            variants,
            build,
        } => init(ctx, &config, &team, variants.as_deref(), &build),
        TeamSubcommand::Build {
            team,
            variants,
            build,
        } => {
            let coords = team.resolve(&config)?;
            let selector = selector(variants.as_deref(), &config);
            build_images(ctx, &config, &coords, selector, &build)
        }
        TeamSubcommand::AddVariant {
            variants,
            rebuild,
            team,
            build,
        } => add_variant(ctx, &config, &team, &variants, rebuild, &build),
        TeamSubcommand::Status { team } => status(ctx, &config, &team),
    }
}

fn selector(flag: Option<&str>, config: &Config) -> VariantSelector {
    match flag {
        Some(s) => VariantSelector::parse(s),
        None if config.build.default_variants.iter().any(|v| v == "all") => VariantSelector::All,
        None => VariantSelector::from_ids(config.build.default_variants.iter().cloned()),
    }
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

fn init(
    ctx: &Context,
    config: &Config,
    team: &TeamArgs,
    variants: Option<&str>,
    flags: &BuildFlags,
) -> anyhow::Result<()> {
    let coords = team.resolve(config)?;
    let selector = selector(variants, config);

    // Validate the whole plan before recording anything.
    plan(config, &coords, selector.clone(), flags)?;

    Config::save_team(
        &ctx.root,
        &TeamConfig {
            name: Some(coords.team.clone()),
            project: Some(coords.project.clone()),
            variant: None,
        },
    )
    .context("failed to record team in zzcollab.yaml")?;
    if !ctx.json {
        println!(
            "Initializing team images for {}/{} in {}",
            coords.team,
            coords.project,
            ctx.root.display()
        );
    }

    build_images(ctx, config, &coords, selector, flags)
}

// ---------------------------------------------------------------------------
// build
// ---------------------------------------------------------------------------

fn plan(
    config: &Config,
    coords: &TeamCoordinates,
    selector: VariantSelector,
    flags: &BuildFlags,
) -> anyhow::Result<Vec<zzcollab_core::plan::BuildJob>> {
    let jobs = resolve_build_plan(&PlanRequest {
        selector,
        mode: flags.mode.unwrap_or(config.build.mode),
        coords,
        base_tag: flags
            .r_version
            .clone()
            .unwrap_or_else(|| config.build.r_version.clone()),
        arch: flags.arch.unwrap_or_else(|| config.build.target_arch()),
    })?;
    Ok(jobs)
}

fn build_images(
    ctx: &Context,
    config: &Config,
    coords: &TeamCoordinates,
    selector: VariantSelector,
    flags: &BuildFlags,
) -> anyhow::Result<()> {
    let jobs = plan(config, coords, selector, flags)?;
    let docker = ctx.docker(config)?;
    let opts = BuildOptions {
        dockerfile: ctx.root.join(&config.build.dockerfile),
        context: ctx.root.join(&config.build.context),
        push: flags.push || config.build.push,
    };

    let report = execute_batch(&docker, &jobs, &opts);
    print_report(ctx, coords, &report, flags)?;

    if !report.is_success() {
        let failed = report.failed().count();
        anyhow::bail!("{failed} of {} image job(s) failed", report.outcomes.len());
    }
    Ok(())
}

fn print_report(
    ctx: &Context,
    coords: &TeamCoordinates,
    report: &BatchReport,
    flags: &BuildFlags,
) -> anyhow::Result<()> {
    if ctx.json {
        return print_json(report);
    }

    let rows: Vec<Vec<String>> = report
        .outcomes
        .iter()
        .map(|o| {
            vec![
                o.job.variant.clone(),
                o.job.published.to_string(),
                o.result.label().to_string(),
                o.result
                    .error()
                    .map(|e| first_line(&e.to_string()))
                    .unwrap_or_default(),
            ]
        })
        .collect();
    println!();
    print_table(&["VARIANT", "IMAGE", "RESULT", "DETAIL"], &rows);

    let failed = report.failed_variants();
    if !failed.is_empty() {
        println!("\nRe-run only the failed variants with:");
        println!("  {}", rerun_command(coords, &failed, flags));
    }
    Ok(())
}

fn first_line(s: &str) -> String {
    s.lines().next().unwrap_or_default().to_string()
}

fn rerun_command(coords: &TeamCoordinates, failed: &[&str], flags: &BuildFlags) -> String {
    let mut cmd = format!(
        "zzcollab team build {} --variants {}",
        team_args(coords),
        failed.join(",")
    );
    if let Some(mode) = flags.mode {
        cmd.push_str(&format!(" --mode {mode}"));
    }
    if flags.push {
        cmd.push_str(" --push");
    }
    cmd
}

// ---------------------------------------------------------------------------
// add-variant
// ---------------------------------------------------------------------------

fn add_variant(
    ctx: &Context,
    config: &Config,
    team: &TeamArgs,
    requested: &[String],
    rebuild: bool,
    flags: &BuildFlags,
) -> anyhow::Result<()> {
    let coords = team.resolve(config)?;
    let ids: Vec<String> = requested
        .iter()
        .flat_map(|s| s.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if ids.is_empty() {
        return Err(zzcollab_core::ZzError::EmptyVariantSet.into());
    }
    for id in &ids {
        variant::lookup(id)?;
    }

    let (to_build, skipped): (Vec<String>, Vec<String>) = if rebuild {
        (ids, Vec::new())
    } else {
        let docker = ctx.docker(config)?;
        let state = TeamImageSet::probe(&docker, &coords)
            .context("could not determine which variants are already published")?;
        ids.into_iter().partition(|id| !state.contains(id))
    };
    if !ctx.json {
        for id in &skipped {
            println!("  skipped: {id} (already published as {})", coords.published_image(id));
        }
    }

    if to_build.is_empty() {
        if ctx.json {
            print_json(&serde_json::json!({ "built": [], "skipped": skipped }))?;
        } else {
            println!(
                "All requested variants are already published. \
                 Use --rebuild to build them again."
            );
        }
        return Ok(());
    }

    build_images(ctx, config, &coords, VariantSelector::Explicit(to_build), flags)
}

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

fn status(ctx: &Context, config: &Config, team: &TeamArgs) -> anyhow::Result<()> {
    let coords = team.resolve(config)?;
    let docker = ctx.docker(config)?;
    let state = TeamImageSet::probe(&docker, &coords).context("could not query the registry")?;

    if ctx.json {
        return print_json(&state);
    }

    println!("Team images for {}/{}:", coords.team, coords.project);
    let rows: Vec<Vec<String>> = state
        .variants
        .iter()
        .map(|p| {
            vec![
                p.variant.clone(),
                p.image.to_string(),
                if p.present { "published" } else { "missing" }.to_string(),
            ]
        })
        .collect();
    print_table(&["VARIANT", "IMAGE", "STATUS"], &rows);

    let missing = state.missing();
    if !missing.is_empty() && missing.len() < state.variants.len() {
        println!("\nAdd missing variants with: {}", add_variant_command(&coords, &missing));
    }
    Ok(())
}

fn add_variant_command(coords: &TeamCoordinates, missing: &[&str]) -> String {
    format!(
        "zzcollab team add-variant {} {}",
        missing.join(","),
        team_args(coords)
    )
}
