use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ZzError {
    #[error("unknown variant '{id}' (known variants: {known})")]
    UnknownVariant { id: String, known: String },

    #[error("no variants requested: pass --variants all or a comma-separated list")]
    EmptyVariantSet,

    #[error("invalid {kind} '{value}': {reason}")]
    InvalidName {
        kind: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("invalid build mode '{0}': expected fast, standard, or comprehensive")]
    InvalidBuildMode(String),

    #[error("invalid architecture '{0}': expected amd64 or arm64")]
    InvalidArch(String),

    #[error("invalid image reference '{0}'")]
    InvalidImageRef(String),

    #[error("registry probe failed: {0}")]
    Probe(#[from] ProbeError),

    #[error("container engine '{0}' not found on PATH")]
    EngineNotFound(String),

    #[error("home directory not found: set HOME environment variable")]
    HomeNotFound,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ZzError {
    /// True for errors raised before any external call was made.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ZzError::UnknownVariant { .. }
                | ZzError::EmptyVariantSet
                | ZzError::InvalidName { .. }
                | ZzError::InvalidBuildMode(_)
                | ZzError::InvalidArch(_)
                | ZzError::InvalidImageRef(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ZzError>;

// ---------------------------------------------------------------------------
// ProbeError
// ---------------------------------------------------------------------------

/// A registry query that could not decide between present and absent.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeError {
    #[error("{reference}: timed out after {seconds}s")]
    Timeout { reference: String, seconds: u64 },

    #[error("{reference}: authentication failed: {detail}")]
    Auth { reference: String, detail: String },

    #[error("{reference}: rate limited by registry: {detail}")]
    RateLimited { reference: String, detail: String },

    #[error("{reference}: registry client unavailable: {detail}")]
    Unavailable { reference: String, detail: String },

    #[error("{reference}: {detail}")]
    Other { reference: String, detail: String },
}

impl ProbeError {
    pub fn reference(&self) -> &str {
        match self {
            ProbeError::Timeout { reference, .. }
            | ProbeError::Auth { reference, .. }
            | ProbeError::RateLimited { reference, .. }
            | ProbeError::Unavailable { reference, .. }
            | ProbeError::Other { reference, .. } => reference,
        }
    }
}

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStage {
    Build,
    Tag,
    Push,
    Pull,
}

impl fmt::Display for EngineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EngineStage::Build => "build",
            EngineStage::Tag => "tag",
            EngineStage::Push => "push",
            EngineStage::Pull => "pull",
        })
    }
}

/// Failure of a single container-engine invocation. Recorded per job.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{stage} failed: {message}")]
pub struct EngineError {
    pub stage: EngineStage,
    pub message: String,
}

impl EngineError {
    pub fn new(stage: EngineStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}
