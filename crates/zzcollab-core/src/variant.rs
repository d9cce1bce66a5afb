//! Static catalog of team image variants.
//!
//! Order is user-facing: listings, "all" expansion, and availability reports
//! all follow it.

use crate::error::{Result, ZzError};
use crate::types::Arch;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Variant {
    pub id: &'static str,
    /// Short role label shown in listings.
    pub role: &'static str,
    /// Base image repository; the tag comes from the configured R version.
    pub base_image: &'static str,
    pub arch: &'static [Arch],
    pub description: &'static str,
}

impl Variant {
    pub fn supports(&self, arch: Arch) -> bool {
        self.arch.contains(&arch)
    }
}

static CATALOG: &[Variant] = &[
    Variant {
        id: "r-ver",
        role: "shell",
        base_image: "rocker/r-ver",
        arch: &[Arch::Amd64, Arch::Arm64],
        description: "Minimal R on Ubuntu, command-line development",
    },
    Variant {
        id: "rstudio",
        role: "ide",
        base_image: "rocker/rstudio",
        arch: &[Arch::Amd64, Arch::Arm64],
        description: "RStudio Server on top of r-ver",
    },
    Variant {
        id: "tidyverse",
        role: "tidyverse",
        base_image: "rocker/tidyverse",
        arch: &[Arch::Amd64],
        description: "RStudio plus the tidyverse and database drivers",
    },
    Variant {
        id: "verse",
        role: "publishing",
        base_image: "rocker/verse",
        arch: &[Arch::Amd64],
        description: "tidyverse plus TeX and publishing toolchain",
    },
];

pub fn all_variants() -> &'static [Variant] {
    CATALOG
}

pub fn variant_ids() -> Vec<&'static str> {
    CATALOG.iter().map(|v| v.id).collect()
}

pub fn lookup(id: &str) -> Result<&'static Variant> {
    CATALOG
        .iter()
        .find(|v| v.id == id)
        .ok_or_else(|| ZzError::UnknownVariant {
            id: id.to_string(),
            known: variant_ids().join(", "),
        })
}

/// Position of a variant in catalog order.
pub fn position(id: &str) -> Option<usize> {
    CATALOG.iter().position(|v| v.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_order_is_stable() {
        assert_eq!(variant_ids(), vec!["r-ver", "rstudio", "tidyverse", "verse"]);
    }

    #[test]
    fn lookup_known_variant() {
        let v = lookup("verse").unwrap();
        assert_eq!(v.base_image, "rocker/verse");
        assert!(v.supports(Arch::Amd64));
        assert!(!v.supports(Arch::Arm64));
    }

    #[test]
    fn lookup_unknown_lists_known_ids() {
        let err = lookup("shiny").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("shiny"));
        assert!(msg.contains("r-ver, rstudio, tidyverse, verse"));
        assert!(err.is_validation());
    }

    #[test]
    fn ids_are_unique() {
        let ids = variant_ids();
        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), ids.len());
    }
}
