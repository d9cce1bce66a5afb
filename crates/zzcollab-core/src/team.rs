//! Team image state and availability negotiation.
//!
//! The registry is the only source of truth for which variants a team has
//! published. Nothing here is cached: every call probes again, so a variant
//! pushed a moment ago is visible to the next query.

use crate::error::Result;
use crate::image::{ImageRef, TeamCoordinates, DEFAULT_TAG};
use crate::registry::{Presence, RegistryProbe};
use crate::variant;
use serde::Serialize;
use tracing::debug;

// ---------------------------------------------------------------------------
// TeamImageSet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantPresence {
    pub variant: String,
    pub image: ImageRef,
    pub present: bool,
}

/// Snapshot of which catalog variants exist in the registry for a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamImageSet {
    pub coords: TeamCoordinates,
    pub variants: Vec<VariantPresence>,
}

impl TeamImageSet {
    /// Probe every catalog variant's published tag, in catalog order.
    /// The first probe error aborts the snapshot.
    pub fn probe(registry: &dyn RegistryProbe, coords: &TeamCoordinates) -> Result<Self> {
        let mut variants = Vec::new();
        for v in variant::all_variants() {
            let image = coords.published_image(v.id);
            let present = registry.probe(&image)? == Presence::Exists;
            variants.push(VariantPresence {
                variant: v.id.to_string(),
                image,
                present,
            });
        }
        Ok(Self {
            coords: coords.clone(),
            variants,
        })
    }

    pub fn available(&self) -> Vec<&str> {
        self.variants
            .iter()
            .filter(|p| p.present)
            .map(|p| p.variant.as_str())
            .collect()
    }

    pub fn missing(&self) -> Vec<&str> {
        self.variants
            .iter()
            .filter(|p| !p.present)
            .map(|p| p.variant.as_str())
            .collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.variants.iter().any(|p| p.variant == id && p.present)
    }
}

// ---------------------------------------------------------------------------
// Availability
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AvailabilityResult {
    Available {
        variant: String,
        image: ImageRef,
    },
    Unavailable {
        variant: String,
        image: ImageRef,
        team_images: TeamImageSet,
        remediation: String,
    },
}

impl AvailabilityResult {
    pub fn is_available(&self) -> bool {
        matches!(self, AvailabilityResult::Available { .. })
    }
}

/// Decide whether a team member may join with `requested`.
///
/// An existing tag is answered after a single probe. An absent tag triggers a
/// full catalog probe so the caller can be offered alternatives. A probe error
/// at any point is returned as `Err`, never as `Unavailable`.
pub fn check_availability(
    registry: &dyn RegistryProbe,
    coords: &TeamCoordinates,
    requested: &str,
) -> Result<AvailabilityResult> {
    variant::lookup(requested)?;
    let image = coords.published_image(requested);

    if registry.probe(&image)? == Presence::Exists {
        debug!(variant = requested, image = %image, "variant available");
        return Ok(AvailabilityResult::Available {
            variant: requested.to_string(),
            image,
        });
    }

    let team_images = TeamImageSet::probe(registry, coords)?;
    let remediation = remediation(coords, requested, &team_images);
    debug!(variant = requested, available = ?team_images.available(), "variant unavailable");
    Ok(AvailabilityResult::Unavailable {
        variant: requested.to_string(),
        image,
        team_images,
        remediation,
    })
}

/// Instruction telling a team member how to get unblocked.
pub fn remediation(coords: &TeamCoordinates, requested: &str, set: &TeamImageSet) -> String {
    let team_args = team_args(coords);
    match set.available().first() {
        Some(alt) => format!(
            "ask the team lead to build `{requested}` \
             (`zzcollab team add-variant {requested} {team_args}`), \
             or request: `zzcollab join {team_args} --variant {alt}`"
        ),
        None => format!(
            "no team images are published yet; ask the team lead to run \
             `zzcollab team init {team_args} --variants {requested} --push`"
        ),
    }
}

/// `--team`/`--project` flags, plus `--tag` and `--registry` when they differ
/// from the defaults, reproducing `coords` on another command line.
pub fn team_args(coords: &TeamCoordinates) -> String {
    let mut args = format!("--team {} --project {}", coords.team, coords.project);
    if coords.version != DEFAULT_TAG {
        args.push_str(&format!(" --tag {}", coords.version));
    }
    if let Some(registry) = &coords.registry {
        args.push_str(&format!(" --registry {registry}"));
    }
    args
}
