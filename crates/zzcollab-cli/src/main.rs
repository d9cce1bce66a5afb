mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, team::TeamSubcommand, Context};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "zzcollab",
    about = "Team Docker images and template freshness for reproducible research projects",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from zzcollab.yaml or .git/)
    #[arg(long, global = true, env = "ZZCOLLAB_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Docker binary to invoke (overrides engine.docker)
    #[arg(long, global = true, env = "ZZCOLLAB_DOCKER")]
    docker: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the image variants a team can build
    Variants,

    /// Build, extend, and inspect a team's images (team lead)
    Team {
        #[command(subcommand)]
        subcommand: TeamSubcommand,
    },

    /// Join a team project using one of its published images
    Join(cmd::join::JoinArgs),

    /// Check generated files for outdated version stamps
    CheckUpdates(cmd::check_updates::CheckUpdatesArgs),

    /// Inspect and validate the merged configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let ctx = Context {
        root,
        json: cli.json,
        docker: cli.docker,
    };

    let result = match cli.command {
        Commands::Variants => cmd::variants::run(&ctx),
        Commands::Team { subcommand } => cmd::team::run(&ctx, subcommand),
        Commands::Join(args) => cmd::join::run(&ctx, args),
        Commands::CheckUpdates(args) => cmd::check_updates::run(&ctx, args),
        Commands::Config { subcommand } => cmd::config::run(&ctx, subcommand),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
