use super::Context;
use crate::output::print_json;
use clap::Subcommand;
use zzcollab_core::config::WarnLevel;
use zzcollab_core::paths;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the merged configuration (defaults, user file, project file)
    Show,

    /// Print the configuration files that are read, in merge order
    Path,

    /// Validate the merged configuration for common mistakes
    Validate,
}

pub fn run(ctx: &Context, subcmd: ConfigSubcommand) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(ctx),
        ConfigSubcommand::Path => path(ctx),
        ConfigSubcommand::Validate => validate(ctx),
    }
}

fn show(ctx: &Context) -> anyhow::Result<()> {
    let config = ctx.config()?;
    if ctx.json {
        return print_json(&config);
    }
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}

fn path(ctx: &Context) -> anyhow::Result<()> {
    let user = paths::user_config_path().ok();
    let project = paths::project_config_path(&ctx.root);
    if ctx.json {
        return print_json(&serde_json::json!({
            "user": user,
            "project": project,
        }));
    }
    let describe = |p: &std::path::Path| {
        let state = if p.is_file() { "" } else { " (missing)" };
        format!("{}{state}", p.display())
    };
    match &user {
        Some(p) => println!("user:    {}", describe(p)),
        None => println!("user:    (no home directory)"),
    }
    println!("project: {}", describe(&project));
    Ok(())
}

fn validate(ctx: &Context) -> anyhow::Result<()> {
    let config = ctx.config()?;
    let warnings = config.validate();

    if ctx.json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}
