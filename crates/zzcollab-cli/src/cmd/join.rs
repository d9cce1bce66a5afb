use super::{Context, TeamArgs};
use crate::output::print_json;
use anyhow::Context as _;
use clap::Args;
use tracing::info;
use zzcollab_core::builder::ContainerEngine;
use zzcollab_core::config::{Config, TeamConfig};
use zzcollab_core::team::{check_availability, AvailabilityResult};
use zzcollab_core::ZzError;

#[derive(Args, Debug)]
pub struct JoinArgs {
    #[command(flatten)]
    pub team: TeamArgs,

    /// Variant to work in (default: team.variant, then the first build.default_variants entry)
    #[arg(long)]
    pub variant: Option<String>,

    /// Record the team but do not pull the image
    #[arg(long)]
    pub no_pull: bool,
}

/// `zzcollab join`: join a team project using one of its published images.
pub fn run(ctx: &Context, args: JoinArgs) -> anyhow::Result<()> {
    let config = ctx.config()?;
    let coords = args.team.resolve(&config)?;
    let variant = requested_variant(args.variant.as_deref(), &config)?;
    let docker = ctx.docker(&config)?;

    let result = match check_availability(&docker, &coords, &variant) {
        Ok(result) => result,
        Err(ZzError::Probe(e)) => {
            if ctx.json {
                print_json(&serde_json::json!({ "outcome": "probe_error", "error": e }))?;
            }
            anyhow::bail!(
                "could not determine whether `{variant}` is published ({e}); \
                 this is a registry problem, not a missing image. \
                 Check your login and network, then retry"
            );
        }
        Err(e) => return Err(e.into()),
    };

    match &result {
        AvailabilityResult::Available { image, .. } => {
            if !args.no_pull {
                if !ctx.json {
                    println!("Pulling {image}...");
                }
                docker.pull(image)?;
            }
            Config::save_team(
                &ctx.root,
                &TeamConfig {
                    name: Some(coords.team.clone()),
                    project: Some(coords.project.clone()),
                    variant: Some(variant.clone()),
                },
            )
            .context("failed to record team in zzcollab.yaml")?;
            info!(variant = %variant, image = %image, "joined team");

            if ctx.json {
                print_json(&result)?;
            } else {
                println!("Joined {}/{} using {image}", coords.team, coords.project);
            }
            Ok(())
        }
        AvailabilityResult::Unavailable {
            image,
            team_images,
            remediation,
            ..
        } => {
            if ctx.json {
                print_json(&result)?;
            } else {
                println!(
                    "Variant `{variant}` is not published for this team ({image} not found)."
                );
                let available = team_images.available();
                if available.is_empty() {
                    println!("The team has not published any images yet.");
                } else {
                    println!("Available variants: {}", available.join(", "));
                }
                println!("\nTo continue: {remediation}");
            }
            anyhow::bail!(
                "variant `{variant}` is not available for {}/{}",
                coords.team,
                coords.project
            )
        }
    }
}

fn requested_variant(flag: Option<&str>, config: &Config) -> anyhow::Result<String> {
    flag.map(str::to_string)
        .or_else(|| config.team.variant.clone())
        .or_else(|| config.build.default_variants.first().cloned())
        .filter(|v| v != "all")
        .context("--variant is required")
}
