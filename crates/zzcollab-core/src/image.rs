use crate::error::{Result, ZzError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

pub const DEFAULT_TAG: &str = "latest";

// ---------------------------------------------------------------------------
// ImageRef
// ---------------------------------------------------------------------------

/// A fully-qualified image reference: `[registry/]repository:tag`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    pub repository: String,
    pub tag: String,
}

impl ImageRef {
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            registry: None,
            repository: repository.into(),
            tag: tag.into(),
        }
    }

    /// Same repository and tag, qualified with a registry host.
    pub fn with_registry(&self, registry: &str) -> Result<ImageRef> {
        validate_registry(registry)?;
        Ok(ImageRef {
            registry: Some(registry.to_string()),
            ..self.clone()
        })
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(registry) = &self.registry {
            write!(f, "{registry}/")?;
        }
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

// ---------------------------------------------------------------------------
// Name validation
// ---------------------------------------------------------------------------

static COMPONENT_RE: OnceLock<Regex> = OnceLock::new();
static TAG_RE: OnceLock<Regex> = OnceLock::new();
static REGISTRY_RE: OnceLock<Regex> = OnceLock::new();

fn component_re() -> &'static Regex {
    COMPONENT_RE.get_or_init(|| Regex::new(r"^[a-z0-9]+(?:[._-][a-z0-9]+)*$").unwrap())
}

fn tag_re() -> &'static Regex {
    TAG_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}$").unwrap())
}

fn registry_re() -> &'static Regex {
    REGISTRY_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9.-]+(?::[0-9]+)?$").unwrap())
}

/// Validate a team or project name as a Docker repository path component.
pub fn validate_component(kind: &'static str, value: &str) -> Result<()> {
    if value.is_empty() || value.len() > 64 {
        return Err(ZzError::InvalidName {
            kind,
            value: value.to_string(),
            reason: "must be 1-64 characters",
        });
    }
    if !component_re().is_match(value) {
        return Err(ZzError::InvalidName {
            kind,
            value: value.to_string(),
            reason: "must be lowercase alphanumeric, separated by single '.', '_' or '-'",
        });
    }
    Ok(())
}

pub fn validate_tag(value: &str) -> Result<()> {
    if !tag_re().is_match(value) {
        return Err(ZzError::InvalidName {
            kind: "tag",
            value: value.to_string(),
            reason: "must start with [A-Za-z0-9_] and be at most 128 of [A-Za-z0-9_.-]",
        });
    }
    Ok(())
}

pub fn validate_registry(value: &str) -> Result<()> {
    if !registry_re().is_match(value) {
        return Err(ZzError::InvalidImageRef(value.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// TeamCoordinates
// ---------------------------------------------------------------------------

/// Validated (team, project, version) triple that names a team's images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamCoordinates {
    pub team: String,
    pub project: String,
    pub version: String,
    /// Registry host the team publishes to; `None` means the engine default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
}

impl TeamCoordinates {
    pub fn new(team: &str, project: &str, version: Option<&str>) -> Result<Self> {
        validate_component("team name", team)?;
        validate_component("project name", project)?;
        let version = version.unwrap_or(DEFAULT_TAG);
        validate_tag(version)?;
        Ok(Self {
            team: team.to_string(),
            project: project.to_string(),
            version: version.to_string(),
            registry: None,
        })
    }

    pub fn with_registry(mut self, registry: Option<&str>) -> Result<Self> {
        if let Some(r) = registry {
            validate_registry(r)?;
        }
        self.registry = registry.map(str::to_string);
        Ok(self)
    }

    /// Local tag of the team image for `variant`: `team/{project}core-{variant}:{version}`.
    pub fn local_image(&self, variant: &str) -> ImageRef {
        ImageRef::new(
            format!("{}/{}core-{}", self.team, self.project, variant),
            self.version.clone(),
        )
    }

    /// Reference that team members pull and probes query.
    pub fn published_image(&self, variant: &str) -> ImageRef {
        let local = self.local_image(variant);
        match &self.registry {
            Some(registry) => ImageRef {
                registry: Some(registry.clone()),
                ..local
            },
            None => local,
        }
    }
}
