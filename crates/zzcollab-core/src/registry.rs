use crate::error::ProbeError;
use crate::image::ImageRef;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Exists,
    Absent,
}

/// Read-only manifest query against a container registry.
///
/// Implementations must not download image layers. Anything other than a
/// definite "present" or "absent" answer is a [`ProbeError`].
pub trait RegistryProbe {
    fn probe(&self, image: &ImageRef) -> Result<Presence, ProbeError>;
}

const ABSENT_MARKERS: &[&str] = &[
    "no such manifest",
    "manifest unknown",
    "manifest_unknown",
    "name_unknown",
    "404 not found",
];

const AUTH_MARKERS: &[&str] = &[
    "unauthorized",
    "denied",
    "authentication required",
    "no basic auth credentials",
    "error getting credentials",
    "credential",
    "executable file not found",
];

const RATE_LIMIT_MARKERS: &[&str] = &["toomanyrequests", "rate limit", "too many requests"];

/// Map a failed manifest query's diagnostic output to absent or an error.
///
/// Rate-limit and auth markers are checked before the absent markers, since
/// some registries report "not found" for private repositories and a broken
/// credential helper reports "executable file not found".
pub fn classify_manifest_failure(image: &ImageRef, output: &str) -> Result<Presence, ProbeError> {
    let lower = output.to_lowercase();
    let detail = first_line(output);
    let reference = image.to_string();

    if RATE_LIMIT_MARKERS.iter().any(|m| lower.contains(m)) {
        return Err(ProbeError::RateLimited { reference, detail });
    }
    if AUTH_MARKERS.iter().any(|m| lower.contains(m)) {
        return Err(ProbeError::Auth { reference, detail });
    }
    if ABSENT_MARKERS.iter().any(|m| lower.contains(m)) {
        return Ok(Presence::Absent);
    }
    Err(ProbeError::Other { reference, detail })
}

fn first_line(output: &str) -> String {
    let line = output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("no diagnostic output");
    line.chars().take(300).collect()
}
