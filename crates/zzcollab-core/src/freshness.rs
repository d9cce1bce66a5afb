//! Template freshness: compare version stamps in generated files against the
//! running tool's version.
//!
//! Each known template file carries a one-line stamp such as
//! `# zzcollab Makefile v1.4.0`. A stamp equal to the current version is
//! current; any other stamp is outdated, even one that looks newer. There is
//! no version ordering here, only string equality.

use crate::error::Result;
use crate::paths::{workspace_marker, SCAN_SKIP_DIRS, WORKSPACE_SIGNATURE};
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

pub const DEFAULT_MAX_DEPTH: usize = 3;

// ---------------------------------------------------------------------------
// Template catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateKind {
    /// Path relative to the workspace root.
    pub path: &'static str,
    pub owner: &'static str,
    /// Text preceding the version on the stamp line.
    pub stamp_prefix: &'static str,
    /// Owned by another tool: reported, never counted.
    pub foreign: bool,
}

pub static TEMPLATES: &[TemplateKind] = &[
    TemplateKind {
        path: "Makefile",
        owner: "Makefile",
        stamp_prefix: "# zzcollab Makefile",
        foreign: false,
    },
    TemplateKind {
        path: ".Rprofile",
        owner: ".Rprofile",
        stamp_prefix: "# zzcollab .Rprofile",
        foreign: false,
    },
    TemplateKind {
        path: "Dockerfile",
        owner: "Dockerfile",
        stamp_prefix: "# zzcollab Dockerfile",
        foreign: false,
    },
    TemplateKind {
        path: ".github/workflows/r-package.yml",
        owner: "workflow",
        stamp_prefix: "# zzcollab workflow",
        foreign: false,
    },
    TemplateKind {
        path: ".zzvim-R.vim",
        owner: "zzvim-R",
        stamp_prefix: "\" zzvim-R",
        foreign: true,
    },
];

static STAMP_RES: OnceLock<Vec<Regex>> = OnceLock::new();

fn stamp_re(index: usize) -> &'static Regex {
    let all = STAMP_RES.get_or_init(|| {
        TEMPLATES
            .iter()
            .map(|t| {
                let pattern = format!(
                    r"^\s*{}\s+(v[0-9][0-9A-Za-z.+-]*)",
                    regex::escape(t.stamp_prefix)
                );
                Regex::new(&pattern).unwrap()
            })
            .collect()
    });
    &all[index]
}

/// Version from the first stamp line of `content`, if any.
pub fn extract_stamp(kind: &TemplateKind, content: &str) -> Option<String> {
    let index = TEMPLATES.iter().position(|t| t == kind)?;
    let re = stamp_re(index);
    content
        .lines()
        .find_map(|line| re.captures(line))
        .map(|caps| caps[1].to_string())
}

// ---------------------------------------------------------------------------
// Verdicts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FreshnessVerdict {
    Current,
    Outdated,
    Unstamped,
    /// Another tool's file; never affects the workspace result.
    Informational,
}

impl FreshnessVerdict {
    pub fn as_str(self) -> &'static str {
        match self {
            FreshnessVerdict::Current => "current",
            FreshnessVerdict::Outdated => "outdated",
            FreshnessVerdict::Unstamped => "unstamped",
            FreshnessVerdict::Informational => "informational",
        }
    }

    pub fn needs_attention(self) -> bool {
        matches!(self, FreshnessVerdict::Outdated | FreshnessVerdict::Unstamped)
    }
}

pub fn classify(stamp: Option<&str>, current: &str, foreign: bool) -> FreshnessVerdict {
    if foreign {
        return FreshnessVerdict::Informational;
    }
    match stamp {
        None => FreshnessVerdict::Unstamped,
        Some(v) if v == current => FreshnessVerdict::Current,
        Some(_) => FreshnessVerdict::Outdated,
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Snapshot of one template file at scan time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateFile {
    pub path: PathBuf,
    pub owner: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    #[serde(flatten)]
    pub file: TemplateFile,
    pub verdict: FreshnessVerdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceReport {
    pub workspace: PathBuf,
    pub current_version: String,
    pub files: Vec<FileReport>,
    /// Set when the workspace itself could not be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkspaceReport {
    pub fn needs_attention(&self) -> bool {
        self.error.is_some() || self.files.iter().any(|f| f.verdict.needs_attention())
    }

    pub fn count(&self, verdict: FreshnessVerdict) -> usize {
        self.files.iter().filter(|f| f.verdict == verdict).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub current_version: String,
    pub workspaces: Vec<WorkspaceReport>,
}

impl ScanReport {
    pub fn needs_attention(&self) -> bool {
        self.workspaces.iter().any(WorkspaceReport::needs_attention)
    }
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub current_version: String,
    pub max_depth: usize,
}

impl ScanOptions {
    pub fn new(current_version: impl Into<String>) -> Self {
        Self {
            current_version: current_version.into(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

// ---------------------------------------------------------------------------
// Scanning
// ---------------------------------------------------------------------------

/// Classify every known template present in `workspace`. Missing templates
/// are skipped; unreadable ones are reported as unstamped. A workspace that
/// is missing or not a readable directory is reported with an error.
pub fn scan_workspace(workspace: &Path, opts: &ScanOptions) -> WorkspaceReport {
    if let Err(e) = std::fs::read_dir(workspace) {
        warn!(workspace = %workspace.display(), error = %e, "cannot read workspace");
        return WorkspaceReport {
            workspace: workspace.to_path_buf(),
            current_version: opts.current_version.clone(),
            files: Vec::new(),
            error: Some(format!("cannot read workspace: {e}")),
        };
    }

    let mut files = Vec::new();
    for kind in TEMPLATES {
        let path = workspace.join(kind.path);
        if std::fs::symlink_metadata(&path).is_err() {
            continue;
        }
        let (version, error) = match std::fs::read(&path) {
            Ok(bytes) => (extract_stamp(kind, &String::from_utf8_lossy(&bytes)), None),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read template file");
                (None, Some(e.to_string()))
            }
        };
        let verdict = classify(version.as_deref(), &opts.current_version, kind.foreign);
        debug!(path = %path.display(), verdict = verdict.as_str(), "classified");
        files.push(FileReport {
            file: TemplateFile {
                path: PathBuf::from(kind.path),
                owner: kind.owner.to_string(),
                version,
            },
            verdict,
            error,
        });
    }
    WorkspaceReport {
        workspace: workspace.to_path_buf(),
        current_version: opts.current_version.clone(),
        files,
        error: None,
    }
}

/// Scan an explicit list of workspaces, each independently.
pub fn scan_dirs(dirs: &[PathBuf], opts: &ScanOptions) -> ScanReport {
    ScanReport {
        current_version: opts.current_version.clone(),
        workspaces: dirs.iter().map(|d| scan_workspace(d, opts)).collect(),
    }
}

/// Discover workspaces under `parent` and scan each one.
pub fn scan_tree(parent: &Path, opts: &ScanOptions) -> Result<ScanReport> {
    let dirs = discover_workspaces(parent, opts.max_depth)?;
    Ok(scan_dirs(&dirs, opts))
}

pub fn is_workspace(dir: &Path) -> bool {
    let marker = workspace_marker(dir);
    marker.is_file()
        && std::fs::read(&marker)
            .map(|b| String::from_utf8_lossy(&b).contains(WORKSPACE_SIGNATURE))
            .unwrap_or(false)
}

/// Directories at most `max_depth` levels below `parent` (itself at depth 0)
/// that carry the workspace marker, sorted by path. A discovered workspace is
/// not descended into.
pub fn discover_workspaces(parent: &Path, max_depth: usize) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    if is_workspace(parent) {
        found.push(parent.to_path_buf());
        return Ok(found);
    }
    // The parent itself must be readable; deeper failures are skipped.
    let entries = subdirs(parent)?;
    if max_depth > 0 {
        for dir in entries {
            walk(&dir, 1, max_depth, &mut found);
        }
    }
    found.sort();
    Ok(found)
}

fn walk(dir: &Path, depth: usize, max_depth: usize, found: &mut Vec<PathBuf>) {
    if is_workspace(dir) {
        found.push(dir.to_path_buf());
        return;
    }
    if depth >= max_depth {
        return;
    }
    match subdirs(dir) {
        Ok(children) => {
            for child in children {
                walk(&child, depth + 1, max_depth, found);
            }
        }
        Err(e) => warn!(dir = %dir.display(), error = %e, "skipping unreadable directory"),
    }
}

fn subdirs(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') || SCAN_SKIP_DIRS.contains(&&*name) {
            continue;
        }
        out.push(entry.path());
    }
    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CURRENT: &str = "v1.0.0";

    fn kind(owner: &str) -> &'static TemplateKind {
        TEMPLATES.iter().find(|t| t.owner == owner).unwrap()
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn makefile(version: &str) -> String {
        format!("# zzcollab Makefile {version}\n# project uses zzcollab\n\nall:\n\t@echo ok\n")
    }

    fn verdict_of<'a>(report: &'a WorkspaceReport, owner: &str) -> &'a FileReport {
        report.files.iter().find(|f| f.file.owner == owner).unwrap()
    }

    #[test]
    fn exact_match_is_current() {
        assert_eq!(classify(Some("v1.0.0"), CURRENT, false), FreshnessVerdict::Current);
    }

    #[test]
    fn older_stamp_is_outdated() {
        assert_eq!(classify(Some("v0.9.0"), CURRENT, false), FreshnessVerdict::Outdated);
    }

    #[test]
    fn newer_stamp_is_still_outdated() {
        assert_eq!(classify(Some("v1.1.0"), CURRENT, false), FreshnessVerdict::Outdated);
    }

    #[test]
    fn missing_stamp_is_unstamped() {
        assert_eq!(classify(None, CURRENT, false), FreshnessVerdict::Unstamped);
    }

    #[test]
    fn foreign_is_always_informational() {
        for stamp in [None, Some("v0.1.0"), Some(CURRENT)] {
            assert_eq!(classify(stamp, CURRENT, true), FreshnessVerdict::Informational);
        }
    }

    #[test]
    fn extract_stamp_per_file_type() {
        assert_eq!(
            extract_stamp(kind("Makefile"), "# zzcollab Makefile v1.2.3\n"),
            Some("v1.2.3".to_string())
        );
        assert_eq!(
            extract_stamp(
                kind(".Rprofile"),
                "options(x = 1)\n  # zzcollab .Rprofile v2.0.0-rc.1\n"
            ),
            Some("v2.0.0-rc.1".to_string())
        );
        assert_eq!(
            extract_stamp(kind("zzvim-R"), "\" zzvim-R v0.4.0\nlet g:x = 1\n"),
            Some("v0.4.0".to_string())
        );
        // Another file type's stamp does not count.
        assert_eq!(
            extract_stamp(kind("Dockerfile"), "# zzcollab Makefile v1.2.3\n"),
            None
        );
        assert_eq!(extract_stamp(kind("Makefile"), "# zzcollab Makefile\n"), None);
    }

    #[test]
    fn first_stamp_wins() {
        let content = "# zzcollab Makefile v1.0.0\n# zzcollab Makefile v0.1.0\n";
        assert_eq!(extract_stamp(kind("Makefile"), content), Some("v1.0.0".to_string()));
    }

    #[test]
    fn scan_workspace_classifies_present_files_only() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "Makefile", &makefile("v1.0.0"));
        write(dir.path(), "Dockerfile", "# zzcollab Dockerfile v0.9.0\nFROM rocker/r-ver\n");
        write(dir.path(), ".Rprofile", "options(repos = 'https://cloud.r-project.org')\n");

        let report = scan_workspace(dir.path(), &ScanOptions::new(CURRENT));
        assert_eq!(report.files.len(), 3);
        assert_eq!(verdict_of(&report, "Makefile").verdict, FreshnessVerdict::Current);
        assert_eq!(verdict_of(&report, "Dockerfile").verdict, FreshnessVerdict::Outdated);
        assert_eq!(
            verdict_of(&report, "Dockerfile").file.version.as_deref(),
            Some("v0.9.0")
        );
        assert_eq!(verdict_of(&report, ".Rprofile").verdict, FreshnessVerdict::Unstamped);
        assert!(report.needs_attention());
        assert_eq!(report.count(FreshnessVerdict::Outdated), 1);
    }

    #[test]
    fn fully_current_workspace_passes() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "Makefile", &makefile(CURRENT));
        write(
            dir.path(),
            ".github/workflows/r-package.yml",
            "# zzcollab workflow v1.0.0\non: push\n",
        );
        let report = scan_workspace(dir.path(), &ScanOptions::new(CURRENT));
        assert_eq!(report.files.len(), 2);
        assert!(!report.needs_attention());
    }

    #[test]
    fn foreign_file_never_flips_result() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "Makefile", &makefile(CURRENT));
        write(dir.path(), ".zzvim-R.vim", "\" zzvim-R v0.0.1\n");
        let report = scan_workspace(dir.path(), &ScanOptions::new(CURRENT));
        let vim = verdict_of(&report, "zzvim-R");
        assert_eq!(vim.verdict, FreshnessVerdict::Informational);
        assert_eq!(vim.file.version.as_deref(), Some("v0.0.1"));
        assert!(!report.needs_attention());

        write(dir.path(), ".zzvim-R.vim", "let g:nothing = 1\n");
        let report = scan_workspace(dir.path(), &ScanOptions::new(CURRENT));
        assert!(!report.needs_attention());
    }

    #[test]
    fn unreadable_file_is_unstamped() {
        let dir = TempDir::new().unwrap();
        // A directory where a file is expected cannot be read as one.
        std::fs::create_dir_all(dir.path().join("Dockerfile")).unwrap();
        let report = scan_workspace(dir.path(), &ScanOptions::new(CURRENT));
        let docker = verdict_of(&report, "Dockerfile");
        assert_eq!(docker.verdict, FreshnessVerdict::Unstamped);
        assert!(docker.error.is_some());
        assert!(report.needs_attention());
    }

    #[test]
    fn missing_workspace_needs_attention() {
        let dir = TempDir::new().unwrap();
        let report = scan_workspace(&dir.path().join("no-such"), &ScanOptions::new(CURRENT));
        assert!(report.files.is_empty());
        assert!(report.error.is_some());
        assert!(report.needs_attention());
    }

    #[test]
    fn file_given_as_workspace_needs_attention() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "notes.txt", "hello\n");
        let report = scan_workspace(&dir.path().join("notes.txt"), &ScanOptions::new(CURRENT));
        assert!(report.error.is_some());
        assert!(report.needs_attention());
    }

    #[test]
    fn workspaces_are_reported_independently() {
        let parent = TempDir::new().unwrap();
        write(parent.path(), "alpha/Makefile", &makefile(CURRENT));
        write(parent.path(), "beta/Makefile", &makefile(CURRENT));
        write(parent.path(), "beta/Dockerfile", "# zzcollab Dockerfile v0.9.0\n");

        let report = scan_tree(parent.path(), &ScanOptions::new(CURRENT)).unwrap();
        assert_eq!(report.workspaces.len(), 2);
        assert!(report.needs_attention());

        let alpha = &report.workspaces[0];
        let beta = &report.workspaces[1];
        assert!(alpha.workspace.ends_with("alpha"));
        assert!(!alpha.needs_attention());
        assert_eq!(alpha.files.len(), 1);
        assert!(alpha.files.iter().all(|f| f.file.owner != "Dockerfile"));
        assert!(beta.needs_attention());
        assert_eq!(verdict_of(beta, "Dockerfile").verdict, FreshnessVerdict::Outdated);
    }

    #[test]
    fn discovery_requires_signature() {
        let parent = TempDir::new().unwrap();
        write(parent.path(), "real/Makefile", &makefile(CURRENT));
        write(parent.path(), "other/Makefile", "all:\n\tcc main.c\n");
        let found = discover_workspaces(parent.path(), DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(found, vec![parent.path().join("real")]);
    }

    #[test]
    fn discovery_respects_depth_and_skips() {
        let parent = TempDir::new().unwrap();
        write(parent.path(), "a/b/c/Makefile", &makefile(CURRENT));
        write(parent.path(), "a/b/c/d/Makefile", &makefile(CURRENT));
        write(parent.path(), ".hidden/Makefile", &makefile(CURRENT));
        write(parent.path(), "renv/Makefile", &makefile(CURRENT));

        let found = discover_workspaces(parent.path(), 3).unwrap();
        assert_eq!(found, vec![parent.path().join("a/b/c")]);

        let shallow = discover_workspaces(parent.path(), 2).unwrap();
        assert!(shallow.is_empty());
    }

    #[test]
    fn parent_that_is_a_workspace_is_returned_alone() {
        let parent = TempDir::new().unwrap();
        write(parent.path(), "Makefile", &makefile(CURRENT));
        write(parent.path(), "sub/Makefile", &makefile(CURRENT));
        let found = discover_workspaces(parent.path(), 3).unwrap();
        assert_eq!(found, vec![parent.path().to_path_buf()]);
    }

    #[test]
    fn missing_parent_is_error() {
        let parent = TempDir::new().unwrap();
        assert!(discover_workspaces(&parent.path().join("nope"), 3).is_err());
    }
}
