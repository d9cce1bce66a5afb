use crate::error::{Result, ZzError};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// File and directory constants
// ---------------------------------------------------------------------------

pub const PROJECT_CONFIG_FILE: &str = "zzcollab.yaml";
pub const USER_CONFIG_DIR: &str = ".zzcollab";
pub const USER_CONFIG_FILE: &str = "config.yaml";

pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";

/// File whose presence (with [`WORKSPACE_SIGNATURE`] inside) marks a workspace.
pub const WORKSPACE_MARKER: &str = "Makefile";
pub const WORKSPACE_SIGNATURE: &str = "zzcollab";

/// Directory names never descended into while discovering workspaces.
pub const SCAN_SKIP_DIRS: &[&str] = &["renv", "node_modules", "target"];

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn project_config_path(root: &Path) -> PathBuf {
    root.join(PROJECT_CONFIG_FILE)
}

pub fn user_config_dir() -> Result<PathBuf> {
    let home = home::home_dir().ok_or(ZzError::HomeNotFound)?;
    Ok(home.join(USER_CONFIG_DIR))
}

pub fn user_config_path() -> Result<PathBuf> {
    Ok(user_config_dir()?.join(USER_CONFIG_FILE))
}

pub fn workspace_marker(workspace: &Path) -> PathBuf {
    workspace.join(WORKSPACE_MARKER)
}
