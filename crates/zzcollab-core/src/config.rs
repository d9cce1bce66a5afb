use crate::error::Result;
use crate::image::{validate_component, validate_registry, validate_tag, DEFAULT_TAG};
use crate::paths;
use crate::types::{Arch, BuildMode};
use crate::variant;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// TeamConfig
// ---------------------------------------------------------------------------

/// Team coordinates remembered by `team init` and `join`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

// ---------------------------------------------------------------------------
// BuildConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub mode: BuildMode,
    #[serde(default = "default_tag")]
    pub tag: String,
    /// Tag of the rocker base images.
    #[serde(default = "default_tag")]
    pub r_version: String,
    #[serde(default = "default_dockerfile")]
    pub dockerfile: PathBuf,
    #[serde(default = "default_context")]
    pub context: PathBuf,
    #[serde(default)]
    pub push: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    #[serde(default = "default_variants")]
    pub default_variants: Vec<String>,
    /// 0 disables the timeout.
    #[serde(default)]
    pub timeout_seconds: u64,
    /// Target architecture; the host architecture when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<Arch>,
}

fn default_tag() -> String {
    DEFAULT_TAG.to_string()
}

fn default_dockerfile() -> PathBuf {
    PathBuf::from(paths::DEFAULT_DOCKERFILE)
}

fn default_context() -> PathBuf {
    PathBuf::from(".")
}

fn default_variants() -> Vec<String> {
    vec!["r-ver".to_string()]
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            mode: BuildMode::default(),
            tag: default_tag(),
            r_version: default_tag(),
            dockerfile: default_dockerfile(),
            context: default_context(),
            push: false,
            registry: None,
            default_variants: default_variants(),
            timeout_seconds: 0,
            arch: None,
        }
    }
}

impl BuildConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }

    pub fn target_arch(&self) -> Arch {
        self.arch.unwrap_or_else(Arch::host)
    }
}

// ---------------------------------------------------------------------------
// ProbeConfig / EngineConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_probe_timeout")]
    pub timeout_seconds: u64,
}

fn default_probe_timeout() -> u64 {
    30
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_probe_timeout(),
        }
    }
}

impl ProbeConfig {
    /// Probes always run under a timeout; 0 is treated as one second.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_docker")]
    pub docker: String,
}

fn default_docker() -> String {
    "docker".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            docker: default_docker(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub team: TeamConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl Config {
    /// Defaults, then `~/.zzcollab/config.yaml`, then `<root>/zzcollab.yaml`.
    pub fn load(root: &Path) -> Result<Self> {
        let user = paths::user_config_path().ok();
        Self::load_layers(user.as_deref(), &paths::project_config_path(root))
    }

    /// Merge the given YAML files (missing files are skipped), later wins.
    pub fn load_layers(user: Option<&Path>, project: &Path) -> Result<Self> {
        let mut merged = Value::Mapping(Mapping::new());
        for path in user.into_iter().chain(std::iter::once(project)) {
            if let Some(data) = crate::io::read_optional(path)? {
                let layer: Value = serde_yaml::from_str(&data)?;
                merge(&mut merged, layer);
            }
        }
        Ok(serde_yaml::from_value(merged)?)
    }

    /// Record team coordinates in the project config, keeping every other key.
    pub fn save_team(root: &Path, team: &TeamConfig) -> Result<()> {
        let path = paths::project_config_path(root);
        let mut doc = match crate::io::read_optional(&path)? {
            Some(data) => serde_yaml::from_str(&data)?,
            None => Value::Mapping(Mapping::new()),
        };
        if !doc.is_mapping() {
            doc = Value::Mapping(Mapping::new());
        }
        merge(&mut doc, serde_yaml::to_value(TeamSection { team })?);
        let data = serde_yaml::to_string(&doc)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut error = |message: String| {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message,
            })
        };

        if let Some(name) = &self.team.name {
            if let Err(e) = validate_component("team name", name) {
                error(format!("team.name: {e}"));
            }
        }
        if let Some(project) = &self.team.project {
            if let Err(e) = validate_component("project name", project) {
                error(format!("team.project: {e}"));
            }
        }
        if let Some(v) = &self.team.variant {
            if let Err(e) = variant::lookup(v) {
                error(format!("team.variant: {e}"));
            }
        }
        for v in &self.build.default_variants {
            if v != "all" {
                if let Err(e) = variant::lookup(v) {
                    error(format!("build.default_variants: {e}"));
                }
            }
        }
        if let Err(e) = validate_tag(&self.build.tag) {
            error(format!("build.tag: {e}"));
        }
        if let Err(e) = validate_tag(&self.build.r_version) {
            error(format!("build.r_version: {e}"));
        }
        if let Some(registry) = &self.build.registry {
            if let Err(e) = validate_registry(registry) {
                error(format!("build.registry: {e}"));
            }
        }

        if self.build.default_variants.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "build.default_variants is empty: team builds will need --variants"
                    .to_string(),
            });
        }
        if self.probe.timeout_seconds == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "probe.timeout_seconds is 0; using 1s".to_string(),
            });
        }
        if self.engine.docker.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "engine.docker is empty".to_string(),
            });
        }

        warnings
    }
}

#[derive(Serialize)]
struct TeamSection<'a> {
    team: &'a TeamConfig,
}

/// Deep-merge `overlay` into `base`. Mappings merge key by key; any other
/// value replaces what was there.
fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        // An empty YAML document leaves the layer below untouched.
        (_, Value::Null) => {}
        (base, overlay) => *base = overlay,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
