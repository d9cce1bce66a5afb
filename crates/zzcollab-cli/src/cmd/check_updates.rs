use super::Context;
use crate::output::{print_json, print_table};
use clap::Args;
use std::path::PathBuf;
use zzcollab_core::freshness::{
    scan_dirs, scan_tree, FreshnessVerdict, ScanOptions, ScanReport, DEFAULT_MAX_DEPTH,
};

#[derive(Args, Debug)]
pub struct CheckUpdatesArgs {
    /// Workspaces to check (default: the project root)
    pub dirs: Vec<PathBuf>,

    /// Discover workspaces under this directory instead
    #[arg(long, conflicts_with = "dirs")]
    pub scan: Option<PathBuf>,

    /// How many directory levels `--scan` descends
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    pub max_depth: usize,

    /// Version to compare stamps against (default: this binary's version)
    #[arg(long)]
    pub current_version: Option<String>,
}

/// `zzcollab check-updates`: report generated files whose stamp differs
/// from the current version.
pub fn run(ctx: &Context, args: CheckUpdatesArgs) -> anyhow::Result<()> {
    let mut opts =
        ScanOptions::new(args.current_version.unwrap_or_else(zzcollab_core::tool_version));
    opts.max_depth = args.max_depth;

    let report = match &args.scan {
        Some(parent) => scan_tree(parent, &opts)?,
        None if args.dirs.is_empty() => scan_dirs(std::slice::from_ref(&ctx.root), &opts),
        None => scan_dirs(&args.dirs, &opts),
    };

    if ctx.json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }

    if report.needs_attention() {
        let stale: usize = report
            .workspaces
            .iter()
            .filter(|w| w.needs_attention())
            .count();
        anyhow::bail!(
            "{stale} workspace(s) are unreadable or have files that do not match {}",
            report.current_version
        );
    }
    Ok(())
}

fn print_report(report: &ScanReport) {
    if report.workspaces.is_empty() {
        println!("No zzcollab workspaces found.");
        return;
    }

    for ws in &report.workspaces {
        println!("{}", ws.workspace.display());
        if let Some(error) = &ws.error {
            println!("  error: {error}\n");
            continue;
        }
        if ws.files.is_empty() {
            println!("  no generated files found\n");
            continue;
        }
        let rows: Vec<Vec<String>> = ws
            .files
            .iter()
            .map(|f| {
                vec![
                    f.file.path.display().to_string(),
                    f.file.owner.clone(),
                    f.file.version.clone().unwrap_or_else(|| "-".to_string()),
                    match &f.error {
                        Some(e) => format!("{} ({e})", f.verdict.as_str()),
                        None => f.verdict.as_str().to_string(),
                    },
                ]
            })
            .collect();
        print_table(&["FILE", "OWNER", "STAMP", "VERDICT"], &rows);

        let outdated = ws.count(FreshnessVerdict::Outdated);
        let unstamped = ws.count(FreshnessVerdict::Unstamped);
        if ws.needs_attention() {
            println!(
                "  {outdated} outdated, {unstamped} unstamped (current {}); \
                 regenerate with zzcollab\n",
                ws.current_version
            );
        } else {
            println!("  up to date ({})\n", ws.current_version);
        }
    }
}
