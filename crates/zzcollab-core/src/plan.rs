use crate::error::{Result, ZzError};
use crate::image::{validate_tag, ImageRef, TeamCoordinates};
use crate::types::{Arch, BuildMode};
use crate::variant::{self, Variant};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// VariantSelector
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantSelector {
    /// Every catalog variant, expanded when the plan is resolved.
    All,
    Explicit(Vec<String>),
}

impl VariantSelector {
    /// `all`, or a comma-separated list of variant ids.
    pub fn parse(input: &str) -> Self {
        if input.trim() == "all" {
            return VariantSelector::All;
        }
        VariantSelector::Explicit(
            input
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        VariantSelector::Explicit(ids.into_iter().map(Into::into).collect())
    }
}

// ---------------------------------------------------------------------------
// BuildJob
// ---------------------------------------------------------------------------

/// One image to build. Never mutated after the resolver creates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildJob {
    pub variant: String,
    pub base_image: ImageRef,
    pub mode: BuildMode,
    /// Forced platform when the variant has no native image for the target arch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Arch>,
    /// Local tag produced by the build.
    pub image: ImageRef,
    /// Reference the image is pushed to and probed at.
    pub published: ImageRef,
}

impl BuildJob {
    pub fn build_args(&self) -> Vec<(String, String)> {
        vec![
            ("BASE_IMAGE".to_string(), self.base_image.to_string()),
            ("VARIANT".to_string(), self.variant.clone()),
            (
                "PACKAGE_MODE".to_string(),
                self.mode.package_density().to_string(),
            ),
            ("R_PACKAGES".to_string(), self.mode.packages().join(" ")),
        ]
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PlanRequest<'a> {
    pub selector: VariantSelector,
    pub mode: BuildMode,
    pub coords: &'a TeamCoordinates,
    /// Tag of the rocker base images, i.e. the R version.
    pub base_tag: String,
    pub arch: Arch,
}

/// Turn a variant selection into build jobs, in catalog order.
///
/// All ids are validated before any job is created: an unknown id or an
/// empty explicit selection yields an error and no plan.
pub fn resolve_build_plan(req: &PlanRequest<'_>) -> Result<Vec<BuildJob>> {
    validate_tag(&req.base_tag)?;

    let variants: Vec<&'static Variant> = match &req.selector {
        VariantSelector::All => variant::all_variants().iter().collect(),
        VariantSelector::Explicit(ids) => {
            if ids.is_empty() {
                return Err(ZzError::EmptyVariantSet);
            }
            let mut resolved = ids
                .iter()
                .map(|id| variant::lookup(id))
                .collect::<Result<Vec<_>>>()?;
            resolved.sort_by_key(|v| variant::position(v.id));
            resolved.dedup_by_key(|v| v.id);
            resolved
        }
    };

    let jobs = variants
        .into_iter()
        .map(|v| job_for(v, req))
        .collect::<Vec<_>>();
    debug!(count = jobs.len(), mode = %req.mode, "resolved build plan");
    Ok(jobs)
}

fn job_for(v: &Variant, req: &PlanRequest<'_>) -> BuildJob {
    let platform = if v.supports(req.arch) {
        None
    } else {
        // Catalog entries always support amd64.
        warn!(
            variant = v.id,
            arch = %req.arch,
            "no native base image for this architecture, building for linux/amd64 under emulation"
        );
        Some(Arch::Amd64)
    };
    BuildJob {
        variant: v.id.to_string(),
        base_image: ImageRef::new(v.base_image, req.base_tag.clone()),
        mode: req.mode,
        platform,
        image: req.coords.local_image(v.id),
        published: req.coords.published_image(v.id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords() -> TeamCoordinates {
        TeamCoordinates::new("lab", "paper", None).unwrap()
    }

    fn request(
        coords: &TeamCoordinates,
        selector: VariantSelector,
        mode: BuildMode,
    ) -> PlanRequest<'_> {
        PlanRequest {
            selector,
            mode,
            coords,
            base_tag: "4.4.1".to_string(),
            arch: Arch::Amd64,
        }
    }

    #[test]
    fn single_variant_yields_one_job() {
        let c = coords();
        for id in variant::variant_ids() {
            let req = request(&c, VariantSelector::from_ids([id]), BuildMode::Fast);
            let jobs = resolve_build_plan(&req).unwrap();
            assert_eq!(jobs.len(), 1);
            assert_eq!(jobs[0].variant, id);
            let tag = jobs[0].image.to_string();
            assert!(tag.contains("lab"), "{tag}");
            assert!(tag.contains("paper"), "{tag}");
        }
    }

    #[test]
    fn all_expands_to_catalog_in_order() {
        let c = coords();
        for mode in BuildMode::all() {
            let jobs = resolve_build_plan(&request(&c, VariantSelector::All, *mode)).unwrap();
            let ids: Vec<&str> = jobs.iter().map(|j| j.variant.as_str()).collect();
            assert_eq!(ids, variant::variant_ids());
            assert!(jobs.iter().all(|j| j.mode == *mode));
        }
    }

    #[test]
    fn unknown_variant_rejects_whole_plan() {
        let c = coords();
        let sel = VariantSelector::from_ids(["r-ver", "nonesuch"]);
        let err = resolve_build_plan(&request(&c, sel, BuildMode::Standard)).unwrap_err();
        assert!(matches!(err, ZzError::UnknownVariant { ref id, .. } if id == "nonesuch"));
    }

    #[test]
    fn empty_selection_is_error() {
        let c = coords();
        let sel = VariantSelector::Explicit(vec![]);
        let err = resolve_build_plan(&request(&c, sel, BuildMode::Standard)).unwrap_err();
        assert!(matches!(err, ZzError::EmptyVariantSet));
        assert_eq!(VariantSelector::parse(" , "), VariantSelector::Explicit(vec![]));
    }

    #[test]
    fn explicit_selection_follows_catalog_order_and_dedups() {
        let c = coords();
        let sel = VariantSelector::parse("verse, r-ver,verse");
        let jobs = resolve_build_plan(&request(&c, sel, BuildMode::Standard)).unwrap();
        let ids: Vec<&str> = jobs.iter().map(|j| j.variant.as_str()).collect();
        assert_eq!(ids, vec!["r-ver", "verse"]);
    }

    #[test]
    fn plan_is_deterministic() {
        let c = coords();
        let req = request(&c, VariantSelector::All, BuildMode::Standard);
        let a = resolve_build_plan(&req).unwrap();
        let b = resolve_build_plan(&req).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn amd64_only_variant_forces_platform_on_arm() {
        let c = coords();
        let mut req = request(&c, VariantSelector::parse("r-ver,verse"), BuildMode::Standard);
        req.arch = Arch::Arm64;
        let jobs = resolve_build_plan(&req).unwrap();
        assert_eq!(jobs[0].platform, None);
        assert_eq!(jobs[1].platform, Some(Arch::Amd64));
    }

    #[test]
    fn build_args_carry_base_image_and_density() {
        let c = coords();
        let req = request(&c, VariantSelector::parse("rstudio"), BuildMode::Comprehensive);
        let jobs = resolve_build_plan(&req).unwrap();
        let args = jobs[0].build_args();
        assert!(args.contains(&("BASE_IMAGE".to_string(), "rocker/rstudio:4.4.1".to_string())));
        assert!(args.contains(&("PACKAGE_MODE".to_string(), "comprehensive".to_string())));
    }

    #[test]
    fn invalid_base_tag_rejected() {
        let c = coords();
        let mut req = request(&c, VariantSelector::All, BuildMode::Standard);
        req.base_tag = "bad tag".to_string();
        assert!(resolve_build_plan(&req).unwrap_err().is_validation());
    }

    #[test]
    fn parse_all_sentinel() {
        assert_eq!(VariantSelector::parse("all"), VariantSelector::All);
        assert_eq!(
            VariantSelector::parse("r-ver,rstudio"),
            VariantSelector::from_ids(["r-ver", "rstudio"])
        );
    }
}
